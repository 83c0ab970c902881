//! Errors in the library.
use thiserror::Error;

/// Errors raised by the replay buffers and training loops.
#[derive(Debug, Error)]
pub enum OffPolicyError {
    /// A record does not contain the requested key.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// A record value has a type other than the requested one.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// The buffer holds no index outside the exclusion zones yet.
    #[error("no valid index to sample: {stored} rows stored, {required} required")]
    NotEnoughSamples {
        /// Rows currently stored on the time axis.
        stored: usize,
        /// Rows required before sampling can start.
        required: usize,
    },

    /// An appended slab does not split evenly into `[T', B]` rows.
    #[error("slab of {len} rows is not a multiple of n_envs = {n_envs}")]
    InvalidSlabLength {
        /// Number of rows in the slab.
        len: usize,
        /// Number of parallel environments.
        n_envs: usize,
    },

    /// An appended slab carries more timesteps than the time capacity.
    #[error("slab of {steps} timesteps exceeds the time capacity {capacity}")]
    SlabExceedsCapacity {
        /// Timesteps in the slab.
        steps: usize,
        /// Capacity of the time axis.
        capacity: usize,
    },

    /// The training batch size must divide the data consumed per optimize call.
    #[error(
        "batch size {batch_size} does not divide training_ratio * sampler_batch_size = {total}"
    )]
    IndivisibleTrainingRatio {
        /// `training_ratio * sampler_batch_size`.
        total: usize,
        /// Configured training batch size.
        batch_size: usize,
    },

    /// Recurrent (memory-based) models are not supported by this core.
    #[error("recurrent models are not supported")]
    RecurrentNotSupported,
}
