use candle_core::{Device, IndexOp, Tensor};
use offpolicy_core::replay_buffer::{BatchBase, StackedObsBatch};

/// Column storage backed by a single [`Tensor`].
///
/// The leading dimension is the row axis; the remaining dimensions are the
/// shape of one record, inferred from the first data pushed. For stacked
/// observations the second dimension is the frame axis, ordered oldest to
/// newest.
#[derive(Clone, Debug)]
pub struct TensorBatch {
    buf: Option<Tensor>,
    capacity: usize,
}

impl TensorBatch {
    /// Wraps a tensor whose leading dimension is the row axis.
    pub fn from_tensor(t: Tensor) -> Self {
        let capacity = t.dims()[0];
        Self {
            buf: Some(t),
            capacity,
        }
    }

    /// Moves the storage to the given device.
    pub fn to(&mut self, device: &Device) -> candle_core::Result<()> {
        if let Some(buf) = &self.buf {
            self.buf = Some(buf.to_device(device)?);
        }
        Ok(())
    }
}

impl BatchBase for TensorBatch {
    fn new(capacity: usize) -> Self {
        Self {
            buf: None,
            capacity,
        }
    }

    /// Pushes given data.
    ///
    /// If the internal buffer is empty, it is initialized with the shape
    /// `[capacity, data.dims()[1..]]`.
    fn push(&mut self, index: usize, data: Self) {
        let data = match data.buf {
            Some(data) => data,
            None => return,
        };
        let batch_size = data.dims()[0];
        if batch_size == 0 {
            return;
        }

        if self.buf.is_none() {
            let mut shape = data.dims().to_vec();
            shape[0] = self.capacity;
            let dtype = data.dtype();
            self.buf = Some(Tensor::zeros(shape, dtype, &Device::Cpu).unwrap());
        }

        if index + batch_size > self.capacity {
            let head = self.capacity - index;
            let data1 = data.i((..head,)).unwrap();
            let data2 = data.i((head..,)).unwrap();
            let buf = self.buf.as_mut().unwrap();
            buf.slice_set(&data1, 0, index).unwrap();
            buf.slice_set(&data2, 0, 0).unwrap();
        } else {
            self.buf
                .as_mut()
                .unwrap()
                .slice_set(&data, 0, index)
                .unwrap();
        }
    }

    fn sample(&self, ixs: &[usize]) -> Self {
        let capacity = ixs.len();
        let ixs = {
            let device = self.buf.as_ref().unwrap().device();
            let ixs = ixs.iter().map(|x| *x as u32).collect();
            Tensor::from_vec(ixs, (capacity,), device).unwrap()
        };
        let buf = Some(self.buf.as_ref().unwrap().index_select(&ixs, 0).unwrap());
        Self { buf, capacity }
    }
}

impl StackedObsBatch for TensorBatch {
    type Frame = TensorBatch;

    fn n_frames(&self) -> usize {
        match &self.buf {
            Some(buf) => buf.dims()[1],
            None => 0,
        }
    }

    fn frame(&self, f: usize) -> Self::Frame {
        Self::from_tensor(self.buf.as_ref().unwrap().i((.., f)).unwrap())
    }

    fn from_frames(frames: &[Self::Frame]) -> Self {
        let frames: Vec<Tensor> = frames
            .iter()
            .map(|frame| frame.buf.as_ref().unwrap().clone())
            .collect();
        Self::from_tensor(Tensor::stack(&frames, 1).unwrap())
    }
}

impl From<TensorBatch> for Tensor {
    fn from(b: TensorBatch) -> Self {
        b.buf.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_wraps_and_sample_gathers() -> candle_core::Result<()> {
        let mut batch = TensorBatch::new(4);
        let data = Tensor::from_slice(&[1.0f32, 2.0, 3.0], (3, 1), &Device::Cpu)?;
        batch.push(0, TensorBatch::from_tensor(data));
        let data = Tensor::from_slice(&[4.0f32, 5.0], (2, 1), &Device::Cpu)?;
        batch.push(3, TensorBatch::from_tensor(data));

        // Rows are now [5, 2, 3, 4].
        let t: Tensor = batch.sample(&[0, 3, 2]).into();
        assert_eq!(t.to_vec2::<f32>()?, vec![vec![5.0], vec![4.0], vec![3.0]]);
        Ok(())
    }

    #[test]
    fn frame_split_and_stack_roundtrip() -> candle_core::Result<()> {
        let t = Tensor::from_slice(
            &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0],
            (2, 3),
            &Device::Cpu,
        )?;
        let stacked = TensorBatch::from_tensor(t.clone());
        assert_eq!(stacked.n_frames(), 3);

        let frames: Vec<TensorBatch> = (0..3).map(|f| stacked.frame(f)).collect();
        let rebuilt: Tensor = TensorBatch::from_frames(&frames).into();
        assert_eq!(rebuilt.to_vec2::<f32>()?, t.to_vec2::<f32>()?);
        Ok(())
    }
}
