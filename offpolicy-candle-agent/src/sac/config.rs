//! Configuration of the SAC agent.
use crate::{
    model::{SubModel1, SubModel2},
    opt::OptimizerConfig,
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

/// Prior density added to the value target.
///
/// `Uniform` contributes nothing; `Gaussian` adds the log density of a unit
/// Gaussian evaluated at the squashed action.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub enum ActionPrior {
    /// Uniform prior over the action space.
    Uniform,

    /// Unit Gaussian prior.
    Gaussian,
}

/// Constructs [`Sac`](super::Sac).
///
/// Unlike the DDPG agent, all four networks share a single optimizer, so the
/// network configurations are held here directly next to one
/// [`OptimizerConfig`].
#[derive(Deserialize, Serialize)]
pub struct SacConfig<Q, P, V>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    pub(super) pi_config: Option<P::Config>,
    pub(super) q_config: Option<Q::Config>,
    pub(super) v_config: Option<V::Config>,
    pub(super) opt_config: OptimizerConfig,
    pub(super) gamma: f64,
    pub(super) tau: f64,
    pub(super) n_step_return: usize,
    pub(super) target_update_interval: usize,
    pub(super) reward_scale: f64,
    pub(super) reparameterize: bool,
    pub(super) action_prior: ActionPrior,
    pub(super) policy_output_regularization: f64,
    pub(super) clip_grad_norm: f64,
    pub(super) min_lstd: f64,
    pub(super) max_lstd: f64,
    pub(super) epsilon: f64,
    pub(super) min_transitions_warmup: usize,
    pub(super) batch_size: usize,
    pub(super) sampler_batch_size: usize,
    pub(super) training_ratio: usize,
    pub(super) mid_batch_reset: bool,
    pub(super) recurrent: bool,
    pub device: Option<Device>,
}

// Derived impls would bound `Q`, `P` and `V` themselves; only their
// configs need to be comparable and printable.
impl<Q, P, V> Debug for SacConfig<Q, P, V>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SacConfig")
            .field("pi_config", &self.pi_config)
            .field("q_config", &self.q_config)
            .field("v_config", &self.v_config)
            .field("opt_config", &self.opt_config)
            .field("gamma", &self.gamma)
            .field("tau", &self.tau)
            .field("n_step_return", &self.n_step_return)
            .field("target_update_interval", &self.target_update_interval)
            .field("reward_scale", &self.reward_scale)
            .field("reparameterize", &self.reparameterize)
            .field("action_prior", &self.action_prior)
            .field(
                "policy_output_regularization",
                &self.policy_output_regularization,
            )
            .field("clip_grad_norm", &self.clip_grad_norm)
            .field("min_lstd", &self.min_lstd)
            .field("max_lstd", &self.max_lstd)
            .field("epsilon", &self.epsilon)
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

impl<Q, P, V> PartialEq for SacConfig<Q, P, V>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.pi_config == other.pi_config
            && self.q_config == other.q_config
            && self.v_config == other.v_config
            && self.opt_config == other.opt_config
            && self.gamma == other.gamma
            && self.tau == other.tau
            && self.n_step_return == other.n_step_return
            && self.target_update_interval == other.target_update_interval
            && self.reward_scale == other.reward_scale
            && self.reparameterize == other.reparameterize
            && self.action_prior == other.action_prior
            && self.policy_output_regularization == other.policy_output_regularization
            && self.clip_grad_norm == other.clip_grad_norm
            && self.min_lstd == other.min_lstd
            && self.max_lstd == other.max_lstd
            && self.epsilon == other.epsilon
            && self.min_transitions_warmup == other.min_transitions_warmup
            && self.batch_size == other.batch_size
            && self.sampler_batch_size == other.sampler_batch_size
            && self.training_ratio == other.training_ratio
            && self.mid_batch_reset == other.mid_batch_reset
            && self.recurrent == other.recurrent
            && self.device == other.device
    }
}

impl<Q, P, V> Clone for SacConfig<Q, P, V>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            pi_config: self.pi_config.clone(),
            q_config: self.q_config.clone(),
            v_config: self.v_config.clone(),
            opt_config: self.opt_config.clone(),
            gamma: self.gamma,
            tau: self.tau,
            n_step_return: self.n_step_return,
            target_update_interval: self.target_update_interval,
            reward_scale: self.reward_scale,
            reparameterize: self.reparameterize,
            action_prior: self.action_prior,
            policy_output_regularization: self.policy_output_regularization,
            clip_grad_norm: self.clip_grad_norm,
            min_lstd: self.min_lstd,
            max_lstd: self.max_lstd,
            epsilon: self.epsilon,
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

impl<Q, P, V> Default for SacConfig<Q, P, V>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            pi_config: None,
            q_config: None,
            v_config: None,
            opt_config: OptimizerConfig::Adam { lr: 3e-4 },
            gamma: 0.99,
            tau: 0.005,
            n_step_return: 1,
            target_update_interval: 1,
            reward_scale: 1.0,
            reparameterize: true,
            action_prior: ActionPrior::Uniform,
            policy_output_regularization: 0.001,
            clip_grad_norm: 1e6,
            min_lstd: -20.0,
            max_lstd: 2.0,
            epsilon: 1e-4,
            min_transitions_warmup: 10_000,
            batch_size: 256,
            sampler_batch_size: 256,
            training_ratio: 256,
            mid_batch_reset: true,
            recurrent: false,
            device: None,
        }
    }
}

impl<Q, P, V> SacConfig<Q, P, V>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    /// Configuration of the policy network.
    pub fn pi_config(mut self, v: P::Config) -> Self {
        self.pi_config = Some(v);
        self
    }

    /// Configuration of the action-value networks.
    ///
    /// Both critics are built from this one configuration, with independent
    /// parameters.
    pub fn q_config(mut self, v: Q::Config) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Configuration of the state-value network.
    pub fn v_config(mut self, v: V::Config) -> Self {
        self.v_config = Some(v);
        self
    }

    /// Configuration of the shared optimizer.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets soft update coefficient of the target state-value network.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Horizon of the n-step return stored in the replay buffer.
    pub fn n_step_return(mut self, v: usize) -> Self {
        self.n_step_return = v;
        self
    }

    /// The target network is updated once every this many updates.
    pub fn target_update_interval(mut self, v: usize) -> Self {
        self.target_update_interval = v;
        self
    }

    /// Scale applied to the returns in the action-value targets.
    pub fn reward_scale(mut self, v: f64) -> Self {
        self.reward_scale = v;
        self
    }

    /// Whether the policy loss differentiates through the sampled action.
    ///
    /// When `false`, a score-function estimator is used instead.
    pub fn reparameterize(mut self, v: bool) -> Self {
        self.reparameterize = v;
        self
    }

    /// Prior density added to the value target.
    pub fn action_prior(mut self, v: ActionPrior) -> Self {
        self.action_prior = v;
        self
    }

    /// Coefficient of the squared-output penalty on the policy heads.
    pub fn policy_output_regularization(mut self, v: f64) -> Self {
        self.policy_output_regularization = v;
        self
    }

    /// Maximum gradient norm per parameter group.
    pub fn clip_grad_norm(mut self, v: f64) -> Self {
        self.clip_grad_norm = v;
        self
    }

    /// Clamp range of the log standard deviation of the policy.
    pub fn lstd_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_lstd = min;
        self.max_lstd = max;
        self
    }

    /// Numerical floor inside the squashing correction.
    pub fn epsilon(mut self, v: f64) -> Self {
        self.epsilon = v;
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
    pub fn training_ratio(mut self, v: usize) -> Self {
        self.training_ratio = v;
        self
    }

    /// Whether environments reset immediately on episode end.
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

    /// Constructs [`SacConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of SAC agent from {}", path_.to_str().unwrap());
        Ok(b)
    }

    /// Saves [`SacConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of SAC agent into {}", path_.to_str().unwrap());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp, Mlp2, MlpConfig};
    use tempdir::TempDir;

    #[test]
    fn yaml_roundtrip() -> Result<()> {
        let dir = TempDir::new("sac_config")?;
        let path = dir.path().join("sac.yaml");
        let config = SacConfig::<Mlp, Mlp2, Mlp>::default()
            .pi_config(MlpConfig::new(3, vec![16], 2, false))
            .q_config(MlpConfig::new(5, vec![16], 1, false))
            .v_config(MlpConfig::new(3, vec![16], 1, false))
            .action_prior(ActionPrior::Gaussian)
            .reward_scale(5.0)
            .device(Device::Cpu);
        config.save(&path)?;
        let loaded = SacConfig::<Mlp, Mlp2, Mlp>::load(&path)?;
        assert_eq!(config, loaded);
        Ok(())
    }
}
