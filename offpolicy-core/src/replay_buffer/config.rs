//! Configurations of the replay buffers.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`RingReplayBuffer`](super::RingReplayBuffer).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RingReplayBufferConfig {
    /// Capacity of the time axis (`T`).
    pub capacity: usize,

    /// Number of parallel environments (`B`).
    pub n_envs: usize,

    /// Horizon of the n-step return.
    pub n_step_return: usize,

    /// Discount factor used by the n-step return assembler.
    pub discount: f32,

    /// Seed of the sampling RNG.
    pub seed: u64,
}

impl Default for RingReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            n_envs: 1,
            n_step_return: 1,
            discount: 0.99,
            seed: 42,
        }
    }
}

impl RingReplayBufferConfig {
    /// Sets the capacity of the time axis.
    pub fn capacity(mut self, v: usize) -> Self {
        self.capacity = v;
        self
    }

    /// Sets the number of parallel environments.
    pub fn n_envs(mut self, v: usize) -> Self {
        self.n_envs = v;
        self
    }

    /// Sets the n-step return horizon.
    pub fn n_step_return(mut self, v: usize) -> Self {
        self.n_step_return = v;
        self
    }

    /// Sets the discount factor.
    pub fn discount(mut self, v: f32) -> Self {
        self.discount = v;
        self
    }

    /// Sets the seed of the sampling RNG.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Configuration of [`FrameReplayBuffer`](super::FrameReplayBuffer).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FrameReplayBufferConfig {
    /// Configuration of the underlying ring buffer.
    pub ring: RingReplayBufferConfig,

    /// Number of frames per stacked observation.
    pub n_frames: usize,
}

impl Default for FrameReplayBufferConfig {
    fn default() -> Self {
        Self {
            ring: RingReplayBufferConfig::default(),
            n_frames: 4,
        }
    }
}

impl FrameReplayBufferConfig {
    /// Sets the configuration of the underlying ring buffer.
    pub fn ring(mut self, v: RingReplayBufferConfig) -> Self {
        self.ring = v;
        self
    }

    /// Sets the number of frames per stacked observation.
    pub fn n_frames(mut self, v: usize) -> Self {
        self.n_frames = v;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn yaml_roundtrip() {
        let dir = TempDir::new("replay_config").unwrap();
        let path = dir.path().join("ring.yaml");
        let config = RingReplayBufferConfig::default()
            .capacity(512)
            .n_envs(8)
            .n_step_return(3)
            .discount(0.95);
        config.save(&path).unwrap();
        let loaded = RingReplayBufferConfig::load(&path).unwrap();
        assert_eq!(config, loaded);
    }
}
