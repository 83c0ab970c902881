//! Base circular transition store.
use super::{
    batch::{BatchBase, NStepBatch, StepBatch},
    config::RingReplayBufferConfig,
    nstep::NStepReturn,
};
use crate::{error::OffPolicyError, ExperienceBufferBase, ReplayBufferBase};
use anyhow::Result;
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A circular transition store over a time axis `T` and an environment
/// axis `B`.
///
/// Columns are stored flat in time-major order: the cell of environment `b`
/// at time `t` lives at row `t * B + b`. Writing past capacity wraps and
/// overwrites the oldest data.
///
/// An index is valid as "now" only outside two exclusion zones around the
/// write cursor, recomputed from the cursor on every sample call:
///
/// * the `off_backward` timesteps behind the cursor, whose n-step forward
///   data is not yet (or no longer) in place;
/// * the cursor itself and the `off_forward - 1` timesteps ahead of it,
///   whose backward history has been overwritten.
pub struct RingReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    /// Capacity of the time axis.
    capacity: usize,

    /// Number of parallel environments.
    n_envs: usize,

    /// Write cursor on the time axis.
    t: usize,

    /// Whether the cursor has wrapped at least once.
    full: bool,

    /// Timesteps behind the cursor excluded from sampling.
    off_backward: usize,

    /// Timesteps at and ahead of the cursor excluded from sampling.
    off_forward: usize,

    nstep: NStepReturn,

    /// Storage for observations.
    obs: O,

    /// Storage for actions.
    act: A,

    /// Storage for rewards.
    reward: Vec<f32>,

    /// Storage for episode-end flags.
    done: Vec<i8>,

    rng: StdRng,
}

impl<O, A> RingReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    #[inline]
    fn push_reward(&mut self, ix: usize, b: &[f32]) {
        let mut j = ix;
        let rows = self.capacity * self.n_envs;
        for r in b.iter() {
            self.reward[j] = *r;
            j += 1;
            if j == rows {
                j = 0;
            }
        }
    }

    #[inline]
    fn push_done(&mut self, ix: usize, b: &[i8]) {
        let mut j = ix;
        let rows = self.capacity * self.n_envs;
        for d in b.iter() {
            self.done[j] = *d;
            j += 1;
            if j == rows {
                j = 0;
            }
        }
    }

    /// Capacity of the time axis.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of parallel environments.
    pub fn n_envs(&self) -> usize {
        self.n_envs
    }

    /// Current write cursor on the time axis.
    pub fn cursor(&self) -> usize {
        self.t
    }

    /// Whether the cursor has wrapped at least once.
    pub fn is_full(&self) -> bool {
        self.full
    }

    pub(crate) fn n_step(&self) -> usize {
        self.nstep.n_step
    }

    /// Raises the forward exclusion zone, e.g. for frame-stacked
    /// observations whose history spans several timesteps.
    pub(crate) fn raise_off_forward(&mut self, v: usize) {
        self.off_forward = self.off_forward.max(v);
    }

    /// Enumerates the time indices currently valid as "now", in increasing
    /// order. Mostly useful for diagnostics and tests; sampling draws
    /// directly without materializing this set.
    pub fn valid_t_indices(&self) -> Vec<usize> {
        let (t, b, f) = (self.t, self.off_backward, self.off_forward);
        if self.full {
            let high = self.capacity.saturating_sub(b + f);
            let mut ixs: Vec<usize> = (0..high)
                .map(|x| {
                    if x as isize >= t as isize - b as isize {
                        x + t.min(b) + f
                    } else {
                        x
                    }
                })
                .collect();
            ixs.sort_unstable();
            ixs
        } else {
            (0..t.saturating_sub(b)).collect()
        }
    }

    /// Draws `size` independent uniform `(t, b)` pairs from the valid set.
    ///
    /// Candidates are drawn from a contiguous range and shifted past the
    /// exclusion window around the cursor, so no rejection loop is needed.
    pub(crate) fn sample_idxs(&mut self, size: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        let (t, b, f) = (self.t, self.off_backward, self.off_forward);
        let high = if self.full {
            self.capacity.saturating_sub(b + f)
        } else {
            t.saturating_sub(b)
        };
        if high == 0 {
            return Err(OffPolicyError::NotEnoughSamples {
                stored: if self.full { self.capacity } else { t },
                required: if self.full { b + f + 1 } else { b + 1 },
            }
            .into());
        }

        let mut t_idxs = Vec::with_capacity(size);
        let mut b_idxs = Vec::with_capacity(size);
        for _ in 0..size {
            let mut x = self.rng.gen_range(0..high);
            if self.full && x as isize >= t as isize - b as isize {
                x += t.min(b) + f;
            }
            t_idxs.push(x);
            b_idxs.push(self.rng.gen_range(0..self.n_envs));
        }

        Ok((t_idxs, b_idxs))
    }

    /// Assembles the records at the given `(t, b)` pairs, including their
    /// n-step returns and the "now"/"next" input bundles.
    pub(crate) fn assemble(&self, t_idxs: &[usize], b_idxs: &[usize]) -> NStepBatch<O, A> {
        let cap = self.capacity;
        let nb = self.n_envs;
        let n = self.nstep.n_step;

        let flat = |dt: usize| -> Vec<usize> {
            t_idxs
                .iter()
                .zip(b_idxs.iter())
                .map(|(&t, &b)| ((t + dt) % cap) * nb + b)
                .collect()
        };
        let ixs_now = flat(0);
        let ixs_prev = flat(cap - 1);
        let ixs_next = flat(n);
        let ixs_next_prev = flat(n + cap - 1);

        let mut return_ = Vec::with_capacity(t_idxs.len());
        let mut done_n = Vec::with_capacity(t_idxs.len());
        for (&t, &b) in t_idxs.iter().zip(b_idxs.iter()) {
            let (r, d) = self
                .nstep
                .compute(&self.reward, &self.done, cap, nb, t, b);
            return_.push(r);
            done_n.push(d as i8);
        }

        NStepBatch {
            obs: self.obs.sample(&ixs_now),
            prev_act: self.act.sample(&ixs_prev),
            prev_reward: ixs_prev.iter().map(|&ix| self.reward[ix]).collect(),
            act: self.act.sample(&ixs_now),
            return_,
            done: ixs_now.iter().map(|&ix| self.done[ix]).collect(),
            done_n,
            next_obs: self.obs.sample(&ixs_next),
            next_prev_act: self.act.sample(&ixs_next_prev),
            next_prev_reward: ixs_next_prev.iter().map(|&ix| self.reward[ix]).collect(),
        }
    }

    /// Sum of all rewards currently stored.
    pub fn sum_rewards(&self) -> f32 {
        self.reward.iter().sum()
    }

    /// Number of episode-end flags currently stored.
    pub fn num_done_flags(&self) -> usize {
        self.done.iter().map(|d| *d as usize).sum()
    }
}

impl<O, A> ExperienceBufferBase for RingReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Item = StepBatch<O, A>;

    /// Writes a `[T', B]` slab at the cursor, advancing it by `T'` mod `T`.
    ///
    /// Returns the absolute time indices written.
    fn push(&mut self, tr: Self::Item) -> Result<Vec<usize>> {
        let rows = tr.len();
        if rows == 0 || rows % self.n_envs != 0 {
            return Err(OffPolicyError::InvalidSlabLength {
                len: rows,
                n_envs: self.n_envs,
            }
            .into());
        }
        let t_new = rows / self.n_envs;
        // A slab longer than the ring would overwrite its own head and
        // return duplicate indices.
        if t_new > self.capacity {
            return Err(OffPolicyError::SlabExceedsCapacity {
                steps: t_new,
                capacity: self.capacity,
            }
            .into());
        }
        let ix = self.t * self.n_envs;

        self.obs.push(ix, tr.obs);
        self.act.push(ix, tr.act);
        self.push_reward(ix, &tr.reward);
        self.push_done(ix, &tr.done);

        let idxs = (0..t_new).map(|k| (self.t + k) % self.capacity).collect();
        if self.t + t_new >= self.capacity {
            self.full = true;
        }
        self.t = (self.t + t_new) % self.capacity;

        Ok(idxs)
    }

    fn len(&self) -> usize {
        let t_filled = if self.full { self.capacity } else { self.t };
        t_filled * self.n_envs
    }
}

impl<O, A> ReplayBufferBase for RingReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Config = RingReplayBufferConfig;
    type Batch = NStepBatch<O, A>;

    fn build(config: &Self::Config) -> Result<Self> {
        let capacity = config.capacity;
        let n_envs = config.n_envs;
        let n_step = config.n_step_return.max(1);
        info!(
            "Ring replay buffer: T = {}, B = {}, n_step = {}",
            capacity, n_envs, n_step
        );

        Ok(Self {
            capacity,
            n_envs,
            t: 0,
            full: false,
            off_backward: n_step,
            off_forward: 1,
            nstep: NStepReturn {
                n_step,
                discount: config.discount,
            },
            obs: O::new(capacity * n_envs),
            act: A::new(capacity * n_envs),
            reward: vec![0.; capacity * n_envs],
            done: vec![0; capacity * n_envs],
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        let (t_idxs, b_idxs) = self.sample_idxs(size)?;
        Ok(self.assemble(&t_idxs, &b_idxs))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::VecBatch;
    use super::*;
    use crate::TransitionBatch as _;

    fn config(capacity: usize, n_envs: usize, n_step: usize) -> RingReplayBufferConfig {
        RingReplayBufferConfig::default()
            .capacity(capacity)
            .n_envs(n_envs)
            .n_step_return(n_step)
            .discount(1.0)
    }

    fn slab(ts: std::ops::Range<usize>, n_envs: usize) -> StepBatch<VecBatch, VecBatch> {
        // obs row = [t + 10*b], act row = [t], reward = t, no terminals.
        let mut obs = Vec::new();
        let mut act = Vec::new();
        let mut reward = Vec::new();
        for t in ts {
            for b in 0..n_envs {
                obs.push(vec![(t + 10 * b) as f32]);
                act.push(vec![t as f32]);
                reward.push(t as f32);
            }
        }
        let done = vec![0i8; reward.len()];
        StepBatch {
            obs: VecBatch { rows: obs },
            act: VecBatch { rows: act },
            reward,
            done,
        }
    }

    #[test]
    fn sampling_before_enough_rows_fails() {
        let mut buffer: RingReplayBuffer<VecBatch, VecBatch> =
            RingReplayBuffer::build(&config(8, 1, 2)).unwrap();
        assert!(buffer.batch(4).is_err());
        buffer.push(slab(0..2, 1)).unwrap();
        // t = 2, off_backward = 2: still nothing valid.
        assert!(buffer.batch(4).is_err());
        buffer.push(slab(2..3, 1)).unwrap();
        assert!(buffer.batch(4).is_ok());
    }

    #[test]
    fn append_returns_written_indices_and_wraps() {
        let mut buffer: RingReplayBuffer<VecBatch, VecBatch> =
            RingReplayBuffer::build(&config(5, 2, 1)).unwrap();
        let idxs = buffer.push(slab(0..3, 2)).unwrap();
        assert_eq!(idxs, vec![0, 1, 2]);
        assert!(!buffer.is_full());
        let idxs = buffer.push(slab(3..6, 2)).unwrap();
        assert_eq!(idxs, vec![3, 4, 0]);
        assert!(buffer.is_full());
        assert_eq!(buffer.cursor(), 1);
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn exclusion_zones_before_wrap() {
        let mut buffer: RingReplayBuffer<VecBatch, VecBatch> =
            RingReplayBuffer::build(&config(10, 1, 2)).unwrap();
        buffer.push(slab(0..6, 1)).unwrap();
        // t = 6, off_backward = 2: valid "now" indices are 0..4.
        assert_eq!(buffer.valid_t_indices(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn exclusion_zones_after_wrap() {
        let mut buffer: RingReplayBuffer<VecBatch, VecBatch> =
            RingReplayBuffer::build(&config(10, 1, 2)).unwrap();
        buffer.push(slab(0..13, 1)).unwrap();
        // Cursor at 3: indices within off_backward behind it ({1, 2}) and
        // off_forward at it ({3}) are excluded.
        assert_eq!(buffer.valid_t_indices(), vec![0, 4, 5, 6, 7, 8, 9]);
        let (t_idxs, _) = buffer.sample_idxs(200).unwrap();
        for t in t_idxs {
            assert!(!(1..=3).contains(&t), "sampled excluded index {}", t);
        }
    }

    #[test]
    fn assembled_records_are_consistent() {
        let mut buffer: RingReplayBuffer<VecBatch, VecBatch> =
            RingReplayBuffer::build(&config(8, 2, 2)).unwrap();
        buffer.push(slab(0..6, 2)).unwrap();
        let batch = buffer.batch(64).unwrap();
        assert_eq!(batch.len(), 64);
        for i in 0..batch.len() {
            let t = batch.act.rows[i][0] as usize;
            let obs = batch.obs.rows[i][0] as usize;
            let b = (obs - t) / 10;
            // n_step = 2, discount = 1: return is the sum of two rewards.
            assert_eq!(batch.return_[i], (t + t + 1) as f32);
            assert_eq!(batch.done_n[i], 0);
            assert_eq!(batch.next_obs.rows[i][0], (t + 2 + 10 * b) as f32);
            assert_eq!(batch.next_prev_reward[i], (t + 1) as f32);
            if t > 0 {
                assert_eq!(batch.prev_act.rows[i][0], (t - 1) as f32);
                assert_eq!(batch.prev_reward[i], (t - 1) as f32);
            }
        }
    }

    #[test]
    fn oversized_slab_is_rejected() {
        let mut buffer: RingReplayBuffer<VecBatch, VecBatch> =
            RingReplayBuffer::build(&config(4, 1, 1)).unwrap();
        let err = buffer.push(slab(0..6, 1)).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<OffPolicyError>(),
            Some(OffPolicyError::SlabExceedsCapacity {
                steps: 6,
                capacity: 4
            })
        ));
        // The rejected slab must not have moved the cursor.
        assert_eq!(buffer.cursor(), 0);
        assert!(buffer.push(slab(0..4, 1)).is_ok());
    }

    #[test]
    fn done_truncates_return() {
        let mut buffer: RingReplayBuffer<VecBatch, VecBatch> =
            RingReplayBuffer::build(&config(8, 1, 3)).unwrap();
        let mut tr = slab(0..6, 1);
        tr.reward = vec![1.0; 6];
        tr.done[2] = 1;
        buffer.push(tr).unwrap();
        let batch = buffer.batch(32).unwrap();
        for i in 0..batch.len() {
            let t = batch.act.rows[i][0] as usize;
            match t {
                0 => {
                    assert_eq!(batch.return_[i], 3.0);
                    assert_eq!(batch.done_n[i], 1);
                }
                1 => {
                    assert_eq!(batch.return_[i], 2.0);
                    assert_eq!(batch.done_n[i], 1);
                }
                2 => {
                    // Terminal at offset 0: the reward of the terminal step
                    // itself is still counted.
                    assert_eq!(batch.return_[i], 1.0);
                    assert_eq!(batch.done_n[i], 1);
                }
                _ => assert_eq!(batch.done_n[i], 0),
            }
        }
    }
}
