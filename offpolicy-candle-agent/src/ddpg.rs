//! Deep deterministic policy gradient (DDPG) agent.
mod actor;
mod base;
mod config;
mod critic;
pub use actor::{Actor, ActorConfig};
pub use base::Ddpg;
pub use config::DdpgConfig;
pub use critic::{Critic, CriticConfig};
