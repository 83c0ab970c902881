#![warn(missing_docs)]
//! Core abstractions for off-policy reinforcement learning.
//!
//! This crate provides the backend-agnostic pieces of the training stack:
//!
//! * [`ReplayBufferBase`] and [`ExperienceBufferBase`], the traits an agent
//!   samples from and a sampler pushes into;
//! * [`replay_buffer`], circular `[T, B]` transition stores with uniform
//!   sampling, n-step returns and optional frame deduplication;
//! * [`TransitionBatch`], the record interface consumed by agents;
//! * [`record`], a container of scalar and array metrics emitted by
//!   training steps.
//!
//! Gradient-based agents live in backend crates built on top of these
//! traits.
mod base;
pub mod error;
pub mod record;
pub mod replay_buffer;
pub use base::{ExperienceBufferBase, ReplayBufferBase, TransitionBatch};
pub use error::OffPolicyError;
pub use record::{Record, RecordValue};
