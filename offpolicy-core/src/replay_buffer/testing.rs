//! In-memory column storage used by the buffer tests.
use super::{BatchBase, StackedObsBatch};

/// Rows of `f32` vectors.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct VecBatch {
    pub rows: Vec<Vec<f32>>,
}

impl BatchBase for VecBatch {
    fn new(capacity: usize) -> Self {
        Self {
            rows: vec![Vec::new(); capacity],
        }
    }

    fn push(&mut self, ix: usize, data: Self) {
        let capacity = self.rows.len();
        for (k, row) in data.rows.into_iter().enumerate() {
            self.rows[(ix + k) % capacity] = row;
        }
    }

    fn sample(&self, ixs: &[usize]) -> Self {
        Self {
            rows: ixs.iter().map(|&ix| self.rows[ix].clone()).collect(),
        }
    }
}

/// Rows of `n_frames` concatenated frame vectors of equal length.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct StackedVecBatch {
    pub rows: Vec<Vec<f32>>,
    pub n_frames: usize,
}

impl BatchBase for StackedVecBatch {
    fn new(capacity: usize) -> Self {
        Self {
            rows: vec![Vec::new(); capacity],
            n_frames: 0,
        }
    }

    fn push(&mut self, ix: usize, data: Self) {
        self.n_frames = data.n_frames;
        let capacity = self.rows.len();
        for (k, row) in data.rows.into_iter().enumerate() {
            self.rows[(ix + k) % capacity] = row;
        }
    }

    fn sample(&self, ixs: &[usize]) -> Self {
        Self {
            rows: ixs.iter().map(|&ix| self.rows[ix].clone()).collect(),
            n_frames: self.n_frames,
        }
    }
}

impl StackedObsBatch for StackedVecBatch {
    type Frame = VecBatch;

    fn n_frames(&self) -> usize {
        self.n_frames
    }

    fn frame(&self, f: usize) -> VecBatch {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let frame_len = row.len() / self.n_frames;
                row[f * frame_len..(f + 1) * frame_len].to_vec()
            })
            .collect();
        VecBatch { rows }
    }

    fn from_frames(frames: &[VecBatch]) -> Self {
        let n_rows = frames[0].rows.len();
        let rows = (0..n_rows)
            .map(|i| {
                frames
                    .iter()
                    .flat_map(|frame| frame.rows[i].iter().copied())
                    .collect()
            })
            .collect();
        Self {
            rows,
            n_frames: frames.len(),
        }
    }
}
