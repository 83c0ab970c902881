//! Circular replay buffers over a time axis and a parallel-environment axis.
//!
//! [`RingReplayBuffer`] is the base store: a fixed-capacity ring over `T`
//! timesteps and `B` environments with uniform sampling of valid indices and
//! per-sample n-step return assembly. [`FrameReplayBuffer`] wraps it for
//! stacked-frame observations, storing one raw frame per write and
//! reconstructing the stack on read.
mod base;
mod batch;
mod config;
mod frame;
mod nstep;
#[cfg(test)]
pub(crate) mod testing;
pub use base::RingReplayBuffer;
pub use batch::{BatchBase, NStepBatch, NullBatch, StepBatch};
pub use config::{FrameReplayBufferConfig, RingReplayBufferConfig};
pub use frame::{FrameReplayBuffer, StackedObsBatch};
pub use nstep::NStepReturn;
