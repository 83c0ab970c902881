//! Frame-deduplicated observation storage.
use super::{
    batch::{BatchBase, NStepBatch, NullBatch, StepBatch},
    config::FrameReplayBufferConfig,
    RingReplayBuffer,
};
use crate::{ExperienceBufferBase, ReplayBufferBase};
use anyhow::Result;
use log::{info, trace};

/// An observation batch made of a fixed number of stacked frames.
///
/// The stack is ordered oldest to newest: `frame(n_frames() - 1)` is the
/// frame observed at the step itself, the earlier slots are history.
pub trait StackedObsBatch: BatchBase {
    /// Storage type of a single frame.
    type Frame: BatchBase;

    /// Number of frames per stacked observation.
    fn n_frames(&self) -> usize;

    /// Extracts frame `f` of every row.
    fn frame(&self, f: usize) -> Self::Frame;

    /// Stacks per-frame batches (oldest first) back into observations.
    fn from_frames(frames: &[Self::Frame]) -> Self;
}

/// A replay buffer that stores each observation frame once.
///
/// Stacked observations of consecutive timesteps overlap in all but one
/// frame, so only the newest frame of each step is written. Frames live in
/// a `[T + n_frames - 1, B]` store where the stack of time `t` occupies
/// positions `t ..= t + n_frames - 1`; the `n_frames - 1` leading positions
/// are a margin holding the history of time 0, mirrored from the tail
/// whenever the cursor wraps. Stacks are reconstructed on read.
///
/// Everything else (actions, rewards, sampling, n-step returns) is
/// delegated to a [`RingReplayBuffer`] with a null observation column.
pub struct FrameReplayBuffer<O, A>
where
    O: StackedObsBatch,
    A: BatchBase,
{
    base: RingReplayBuffer<NullBatch, A>,

    /// One frame per row, `(T + n_frames - 1) * B` rows.
    frames: O::Frame,

    /// Number of frames per stacked observation.
    n_frames: usize,
}

impl<O, A> FrameReplayBuffer<O, A>
where
    O: StackedObsBatch,
    A: BatchBase,
{
    /// Gathers the stacked observations at the given `(t, b)` pairs.
    fn stacked(&self, t_idxs: &[usize], b_idxs: &[usize]) -> O {
        let nb = self.base.n_envs();
        let frames: Vec<O::Frame> = (0..self.n_frames)
            .map(|f| {
                let ixs: Vec<usize> = t_idxs
                    .iter()
                    .zip(b_idxs.iter())
                    .map(|(&t, &b)| (t + f) * nb + b)
                    .collect();
                self.frames.sample(&ixs)
            })
            .collect();
        O::from_frames(&frames)
    }

    /// Reconstructs the stacked observation of environment `b` at time `t`.
    ///
    /// `t` must be a currently valid index, see
    /// [`valid_t_indices`](Self::valid_t_indices).
    pub fn stacked_obs(&self, t: usize, b: usize) -> O {
        self.stacked(&[t], &[b])
    }

    /// Enumerates the time indices currently valid as "now".
    pub fn valid_t_indices(&self) -> Vec<usize> {
        self.base.valid_t_indices()
    }
}

impl<O, A> ExperienceBufferBase for FrameReplayBuffer<O, A>
where
    O: StackedObsBatch,
    A: BatchBase,
{
    type Item = StepBatch<O, A>;

    fn push(&mut self, tr: Self::Item) -> Result<Vec<usize>> {
        let nb = self.base.n_envs();
        let fm1 = self.n_frames - 1;
        let t_prev = self.base.cursor();
        let obs = tr.obs;

        let idxs = self.base.push(StepBatch {
            obs: NullBatch,
            act: tr.act,
            reward: tr.reward,
            done: tr.done,
        })?;

        // Only the newest frame of each step is new data.
        let newest = obs.frame(fm1);
        for (k, &t_abs) in idxs.iter().enumerate() {
            let rows: Vec<usize> = (k * nb..(k + 1) * nb).collect();
            self.frames.push((t_abs + fm1) * nb, newest.sample(&rows));
        }

        if fm1 > 0 {
            if t_prev == 0 {
                // First write at the front: the margin gets the history
                // frames carried by the incoming stacks.
                let first: Vec<usize> = (0..nb).collect();
                for f in 0..fm1 {
                    self.frames.push(f * nb, obs.frame(f).sample(&first));
                }
            } else if self.base.cursor() < t_prev {
                // The cursor wrapped: the tail frames become the history of
                // the front rows about to be overwritten.
                trace!("Frame buffer wrapped, mirroring tail frames");
                let cap = self.base.capacity();
                let tail: Vec<usize> = (cap * nb..(cap + fm1) * nb).collect();
                let tail_frames = self.frames.sample(&tail);
                self.frames.push(0, tail_frames);
            }
        }

        Ok(idxs)
    }

    fn len(&self) -> usize {
        self.base.len()
    }
}

impl<O, A> ReplayBufferBase for FrameReplayBuffer<O, A>
where
    O: StackedObsBatch,
    A: BatchBase,
{
    type Config = FrameReplayBufferConfig;
    type Batch = NStepBatch<O, A>;

    fn build(config: &Self::Config) -> Result<Self> {
        let n_frames = config.n_frames.max(1);
        let mut base: RingReplayBuffer<NullBatch, A> =
            RingReplayBuffer::build(&config.ring)?;
        // A stack reaching back n_frames - 1 steps needs that many
        // timesteps ahead of the cursor excluded as well.
        base.raise_off_forward((n_frames - 1).max(1));
        info!("Frame-deduplicated observation store: n_frames = {}", n_frames);

        let rows = (config.ring.capacity + n_frames - 1) * config.ring.n_envs;
        Ok(Self {
            base,
            frames: <O::Frame as BatchBase>::new(rows),
            n_frames,
        })
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        let (t_idxs, b_idxs) = self.base.sample_idxs(size)?;
        let core = self.base.assemble(&t_idxs, &b_idxs);

        let cap = self.base.capacity();
        let n = self.base.n_step();
        let next_t: Vec<usize> = t_idxs.iter().map(|&t| (t + n) % cap).collect();

        Ok(NStepBatch {
            obs: self.stacked(&t_idxs, &b_idxs),
            prev_act: core.prev_act,
            prev_reward: core.prev_reward,
            act: core.act,
            return_: core.return_,
            done: core.done,
            done_n: core.done_n,
            next_obs: self.stacked(&next_t, &b_idxs),
            next_prev_act: core.next_prev_act,
            next_prev_reward: core.next_prev_reward,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{StackedVecBatch, VecBatch};
    use super::super::RingReplayBufferConfig;
    use super::*;
    use crate::TransitionBatch as _;

    const N_FRAMES: usize = 3;

    fn config(capacity: usize, n_envs: usize, n_step: usize) -> FrameReplayBufferConfig {
        FrameReplayBufferConfig::default()
            .n_frames(N_FRAMES)
            .ring(
                RingReplayBufferConfig::default()
                    .capacity(capacity)
                    .n_envs(n_envs)
                    .n_step_return(n_step)
                    .discount(1.0),
            )
    }

    /// Frame value of the stream of environment `b` at global time `g`.
    fn frame_value(g: isize, b: usize) -> f32 {
        g as f32 + 1000.0 * b as f32
    }

    fn stack_at(g: usize, b: usize) -> Vec<f32> {
        (0..N_FRAMES)
            .map(|f| frame_value(g as isize - (N_FRAMES - 1 - f) as isize, b))
            .collect()
    }

    fn slab(
        ts: std::ops::Range<usize>,
        n_envs: usize,
    ) -> StepBatch<StackedVecBatch, VecBatch> {
        let mut obs = Vec::new();
        let mut act = Vec::new();
        let mut reward = Vec::new();
        for g in ts {
            for b in 0..n_envs {
                obs.push(stack_at(g, b));
                act.push(vec![g as f32]);
                reward.push(g as f32);
            }
        }
        let done = vec![0i8; reward.len()];
        StepBatch {
            obs: StackedVecBatch {
                rows: obs,
                n_frames: N_FRAMES,
            },
            act: VecBatch { rows: act },
            reward,
            done,
        }
    }

    #[test]
    fn reconstructs_prologue_stacks() {
        let mut buffer: FrameReplayBuffer<StackedVecBatch, VecBatch> =
            FrameReplayBuffer::build(&config(8, 2, 1)).unwrap();
        buffer.push(slab(0..5, 2)).unwrap();
        for b in 0..2 {
            for g in 0..5 {
                assert_eq!(buffer.stacked_obs(g, b).rows[0], stack_at(g, b));
            }
        }
    }

    #[test]
    fn reconstructs_stacks_across_wrap() {
        let n_envs = 2;
        let mut buffer: FrameReplayBuffer<StackedVecBatch, VecBatch> =
            FrameReplayBuffer::build(&config(8, n_envs, 2)).unwrap();
        buffer.push(slab(0..5, n_envs)).unwrap();
        buffer.push(slab(5..9, n_envs)).unwrap();
        buffer.push(slab(9..12, n_envs)).unwrap();

        // Slot t holds the latest global time g with g % 8 == t.
        let latest = |t: usize| -> usize {
            let mut g = t;
            while g + 8 < 12 {
                g += 8;
            }
            g
        };
        // n_step = 2 behind the cursor, n_frames - 1 = 2 at and ahead of it.
        assert_eq!(buffer.valid_t_indices(), vec![0, 1, 6, 7]);
        for t in buffer.valid_t_indices() {
            for b in 0..n_envs {
                assert_eq!(
                    buffer.stacked_obs(t, b).rows[0],
                    stack_at(latest(t), b),
                    "slot {}, env {}",
                    t,
                    b
                );
            }
        }
    }

    #[test]
    fn batches_carry_reconstructed_observations() {
        let n_envs = 2;
        let mut buffer: FrameReplayBuffer<StackedVecBatch, VecBatch> =
            FrameReplayBuffer::build(&config(10, n_envs, 2)).unwrap();
        buffer.push(slab(0..7, n_envs)).unwrap();

        let batch = buffer.batch(64).unwrap();
        assert_eq!(batch.len(), 64);
        for i in 0..batch.len() {
            let g = batch.act.rows[i][0] as usize;
            let b = ((batch.obs.rows[i][0] - batch.act.rows[i][0]
                + (N_FRAMES - 1) as f32)
                / 1000.0)
                .round() as usize;
            assert_eq!(batch.obs.rows[i], stack_at(g, b));
            assert_eq!(batch.next_obs.rows[i], stack_at(g + 2, b));
            // discount = 1, n_step = 2.
            assert_eq!(batch.return_[i], (g + g + 1) as f32);
        }
    }

    #[test]
    fn single_frame_stacks_degenerate_to_plain_storage() {
        let mut buffer: FrameReplayBuffer<StackedVecBatch, VecBatch> =
            FrameReplayBuffer::build(
                &FrameReplayBufferConfig::default().n_frames(1).ring(
                    RingReplayBufferConfig::default()
                        .capacity(6)
                        .n_envs(1)
                        .n_step_return(1)
                        .discount(1.0),
                ),
            )
            .unwrap();
        let mut tr = slab(0..4, 1);
        tr.obs = StackedVecBatch {
            rows: (0..4).map(|g| vec![g as f32]).collect(),
            n_frames: 1,
        };
        buffer.push(tr).unwrap();
        for g in 0..3 {
            assert_eq!(buffer.stacked_obs(g, 0).rows[0], vec![g as f32]);
        }
    }
}
