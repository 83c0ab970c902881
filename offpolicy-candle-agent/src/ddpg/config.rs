//! Configuration of the DDPG agent.
use super::{ActorConfig, CriticConfig};
use crate::{
    model::{SubModel1, SubModel2},
    util::OutDim,
    Device,
};
use anyhow::Result;
use candle_core::Tensor;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt::{self, Debug},
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Constructs [`Ddpg`](super::Ddpg).
#[derive(Deserialize, Serialize)]
pub struct DdpgConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    pub(super) actor_config: ActorConfig<P::Config>,
    pub(super) critic_config: CriticConfig<Q::Config>,
    pub(super) gamma: f64,
    pub(super) tau: f64,
    pub(super) n_step_return: usize,
    pub(super) policy_update_interval: usize,
    pub(super) target_update_interval: usize,
    pub(super) q_target_clip: f64,
    pub(super) clip_grad_norm: f64,
    pub(super) min_transitions_warmup: usize,
    pub(super) batch_size: usize,
    pub(super) sampler_batch_size: usize,
    pub(super) training_ratio: usize,
    pub(super) mid_batch_reset: bool,
    pub(super) recurrent: bool,
    pub device: Option<Device>,
}

// Derived impls would bound `Q` and `P` themselves; only their configs
// need to be comparable and printable.
impl<Q, P> Debug for DdpgConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdpgConfig")
            .field("actor_config", &self.actor_config)
            .field("critic_config", &self.critic_config)
            .field("gamma", &self.gamma)
            .field("tau", &self.tau)
            .field("n_step_return", &self.n_step_return)
            .field("policy_update_interval", &self.policy_update_interval)
            .field("target_update_interval", &self.target_update_interval)
            .field("q_target_clip", &self.q_target_clip)
            .field("clip_grad_norm", &self.clip_grad_norm)
            .field("min_transitions_warmup", &self.min_transitions_warmup)
            .field("batch_size", &self.batch_size)
            .field("sampler_batch_size", &self.sampler_batch_size)
            .field("training_ratio", &self.training_ratio)
            .field("mid_batch_reset", &self.mid_batch_reset)
            .field("recurrent", &self.recurrent)
            .field("device", &self.device)
            .finish()
    }
}

impl<Q, P> PartialEq for DdpgConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.actor_config == other.actor_config
            && self.critic_config == other.critic_config
            && self.gamma == other.gamma
            && self.tau == other.tau
            && self.n_step_return == other.n_step_return
            && self.policy_update_interval == other.policy_update_interval
            && self.target_update_interval == other.target_update_interval
            && self.q_target_clip == other.q_target_clip
            && self.clip_grad_norm == other.clip_grad_norm
            && self.min_transitions_warmup == other.min_transitions_warmup
            && self.batch_size == other.batch_size
            && self.sampler_batch_size == other.sampler_batch_size
            && self.training_ratio == other.training_ratio
            && self.mid_batch_reset == other.mid_batch_reset
            && self.recurrent == other.recurrent
            && self.device == other.device
    }
}

impl<Q, P> Clone for DdpgConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            actor_config: self.actor_config.clone(),
            critic_config: self.critic_config.clone(),
            gamma: self.gamma,
            tau: self.tau,
            n_step_return: self.n_step_return,
            policy_update_interval: self.policy_update_interval,
            target_update_interval: self.target_update_interval,
            q_target_clip: self.q_target_clip,
            clip_grad_norm: self.clip_grad_norm,
            min_transitions_warmup: self.min_transitions_warmup,
            batch_size: self.batch_size,
            sampler_batch_size: self.sampler_batch_size,
            training_ratio: self.training_ratio,
            mid_batch_reset: self.mid_batch_reset,
            recurrent: self.recurrent,
            device: self.device,
        }
    }
}

impl<Q, P> Default for DdpgConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            gamma: 0.99,
            tau: 0.01,
            n_step_return: 1,
            policy_update_interval: 1,
            target_update_interval: 1,
            q_target_clip: 1e6,
            clip_grad_norm: 1e6,
            min_transitions_warmup: 10_000,
            batch_size: 64,
            sampler_batch_size: 64,
            training_ratio: 64,
            mid_batch_reset: true,
            recurrent: false,
            device: None,
        }
    }
}

impl<Q, P> DdpgConfig<Q, P>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Configuration of the actor.
    pub fn actor_config(mut self, v: ActorConfig<P::Config>) -> Self {
        self.actor_config = v;
        self
    }

    /// Configuration of the critic.
    pub fn critic_config(mut self, v: CriticConfig<Q::Config>) -> Self {
        self.critic_config = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Horizon of the n-step return stored in the replay buffer.
    ///
    /// Must match the buffer's configuration; it determines the discount
    /// applied to the bootstrap term.
    pub fn n_step_return(mut self, v: usize) -> Self {
        self.n_step_return = v;
        self
    }

    /// The actor is updated once every this many critic updates.
    pub fn policy_update_interval(mut self, v: usize) -> Self {
        self.policy_update_interval = v;
        self
    }

    /// Target networks are updated once every this many critic updates.
    pub fn target_update_interval(mut self, v: usize) -> Self {
        self.target_update_interval = v;
        self
    }

    /// Bootstrap targets are clamped into `[-v, v]`.
    pub fn q_target_clip(mut self, v: f64) -> Self {
        self.q_target_clip = v;
        self
    }

    /// Maximum gradient norm per parameter group.
    pub fn clip_grad_norm(mut self, v: f64) -> Self {
        self.clip_grad_norm = v;
        self
    }

    /// Interval before starting optimization.
    pub fn min_transitions_warmup(mut self, v: usize) -> Self {
        self.min_transitions_warmup = v;
        self
    }

    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Number of transitions ingested per optimize call.
    pub fn sampler_batch_size(mut self, v: usize) -> Self {
        self.sampler_batch_size = v;
        self
    }

    /// Ratio of consumed to generated transitions.
    ///
    /// Together with the sampler batch size this determines the number of
    /// updates per optimize call.
    pub fn training_ratio(mut self, v: usize) -> Self {
        self.training_ratio = v;
        self
    }

    /// Whether environments reset immediately on episode end.
    ///
    /// When `false`, batches are masked by a validity mask derived from the
    /// done flags.
    pub fn mid_batch_reset(mut self, v: bool) -> Self {
        self.mid_batch_reset = v;
        self
    }

    /// Requests a recurrent policy, which this loop does not support.
    pub fn recurrent(mut self, v: bool) -> Self {
        self.recurrent = v;
        self
    }

    /// Device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = Some(v);
        self
    }

    /// Constructs [`DdpgConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of DDPG agent from {}", path_.to_str().unwrap());
        Ok(b)
    }

    /// Saves [`DdpgConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of DDPG agent into {}", path_.to_str().unwrap());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp, MlpConfig};
    use tempdir::TempDir;

    #[test]
    fn yaml_roundtrip() -> Result<()> {
        let dir = TempDir::new("ddpg_config")?;
        let path = dir.path().join("ddpg.yaml");
        let config = DdpgConfig::<Mlp, Mlp>::default()
            .actor_config(ActorConfig::default().mu_config(MlpConfig::new(3, vec![16], 2, false)))
            .critic_config(
                CriticConfig::default().q_config(MlpConfig::new(5, vec![16], 1, false)),
            )
            .policy_update_interval(2)
            .device(Device::Cpu);
        config.save(&path)?;
        let loaded = DdpgConfig::<Mlp, Mlp>::load(&path)?;
        assert_eq!(config, loaded);
        Ok(())
    }
}
