//! Batch storage and record types of the replay buffers.
use crate::TransitionBatch;

/// Basic operations of column storage in a replay buffer.
///
/// A `BatchBase` holds a fixed number of rows. Shape and dtype of a row are
/// inferred from the first data pushed, so buffers can be built from a
/// configuration alone.
pub trait BatchBase: Clone {
    /// Creates storage with the given number of rows.
    fn new(capacity: usize) -> Self;

    /// Writes `data` starting at row `ix`, wrapping at `capacity`.
    fn push(&mut self, ix: usize, data: Self);

    /// Gathers the rows at `ixs` into a new batch.
    fn sample(&self, ixs: &[usize]) -> Self;
}

/// Column storage holding nothing.
///
/// Used as the observation column of the base ring buffer when observations
/// are kept in a frame-deduplicated store instead.
#[derive(Clone, Debug, Default)]
pub struct NullBatch;

impl BatchBase for NullBatch {
    fn new(_capacity: usize) -> Self {
        Self
    }

    fn push(&mut self, _ix: usize, _data: Self) {}

    fn sample(&self, _ixs: &[usize]) -> Self {
        Self
    }
}

/// A `[T', B]` slab of freshly sampled environment steps, flattened
/// time-major: row `k*B + b` holds the step of environment `b` at the
/// slab-local time `k`.
pub struct StepBatch<O, A> {
    /// Observations.
    pub obs: O,

    /// Actions.
    pub act: A,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Episode-end flags.
    pub done: Vec<i8>,
}

impl<O, A> StepBatch<O, A> {
    /// The number of rows (`T' * B`) in the slab.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the slab holds no rows.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}

/// A batch of transitions with n-step returns.
///
/// This is the record type shared by the DDPG and SAC loops; their field
/// sets coincide, so a single statically declared shape serves both.
pub struct NStepBatch<O, A> {
    /// Observations at the sampled indices.
    pub obs: O,

    /// Actions one step before the sampled indices.
    pub prev_act: A,

    /// Rewards one step before the sampled indices.
    pub prev_reward: Vec<f32>,

    /// Actions at the sampled indices.
    pub act: A,

    /// Discounted n-step returns.
    pub return_: Vec<f32>,

    /// Episode-end flags at the sampled indices.
    pub done: Vec<i8>,

    /// Whether the episode ended within the n-step horizon.
    pub done_n: Vec<i8>,

    /// Observations `n_step` ahead.
    pub next_obs: O,

    /// Actions one step before the "next" indices.
    pub next_prev_act: A,

    /// Rewards one step before the "next" indices.
    pub next_prev_reward: Vec<f32>,
}

impl<O, A> TransitionBatch for NStepBatch<O, A> {
    type ObsBatch = O;
    type ActBatch = A;

    fn len(&self) -> usize {
        self.return_.len()
    }

    fn obs(&self) -> &Self::ObsBatch {
        &self.obs
    }

    fn prev_act(&self) -> &Self::ActBatch {
        &self.prev_act
    }

    fn prev_reward(&self) -> &Vec<f32> {
        &self.prev_reward
    }

    fn act(&self) -> &Self::ActBatch {
        &self.act
    }

    fn return_(&self) -> &Vec<f32> {
        &self.return_
    }

    fn done(&self) -> &Vec<i8> {
        &self.done
    }

    fn done_n(&self) -> &Vec<i8> {
        &self.done_n
    }

    fn next_obs(&self) -> &Self::ObsBatch {
        &self.next_obs
    }

    fn next_prev_act(&self) -> &Self::ActBatch {
        &self.next_prev_act
    }

    fn next_prev_reward(&self) -> &Vec<f32> {
        &self.next_prev_reward
    }
}
