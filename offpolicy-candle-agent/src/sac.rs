//! Soft actor critic (SAC) agent.
mod actor;
mod base;
mod config;
mod critic;
mod value;
pub use actor::Actor;
pub use base::Sac;
pub use config::{ActionPrior, SacConfig};
pub use critic::Critic;
pub use value::ValueNet;
