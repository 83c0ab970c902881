//! Optimization loop of the DDPG agent.
use super::{Actor, Critic, DdpgConfig};
use crate::{
    model::{AgentInputs, SubModel1, SubModel2},
    util::{track, valid_mean, vec_to_tensor, OutDim, SharedParams},
};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use log::info;
use offpolicy_core::{
    ExperienceBufferBase, OffPolicyError, Record, RecordValue, ReplayBufferBase, TransitionBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, fs, marker::PhantomData, path::Path};

/// Deep deterministic policy gradient agent.
///
/// Holds a deterministic policy `P`, an action-value network `Q`, and soft
/// target copies of both. Each `opt()` call consumes `training_ratio *
/// sampler_batch_size` transitions from the replay buffer, split into
/// minibatch updates of `batch_size`.
pub struct Ddpg<Q, P, R>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    pub(super) critic: Critic<Q>,
    pub(super) critic_tgt: Critic<Q>,
    pub(super) actor: Actor<P>,
    pub(super) actor_tgt: Actor<P>,
    gamma: f64,
    tau: f64,
    n_step_return: usize,
    policy_update_interval: usize,
    target_update_interval: usize,
    q_target_clip: f64,
    clip_grad_norm: f64,
    min_transitions_warmup: usize,
    batch_size: usize,
    updates_per_opt: usize,
    mid_batch_reset: bool,

    // Cumulative number of minibatch updates of the critic.
    update_counter: usize,

    // Cumulative number of actor updates.
    n_actor_opts: usize,

    device: Device,
    phantom: PhantomData<R>,
}

impl<Q, P, R> Ddpg<Q, P, R>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    Q::Input1: From<AgentInputs>,
    Q::Input2: From<Tensor>,
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    P::Input: From<AgentInputs>,
    R: ExperienceBufferBase + ReplayBufferBase,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: Into<Tensor> + Clone,
    <R::Batch as TransitionBatch>::ActBatch: Into<Tensor> + Clone,
{
    /// Constructs the agent, including target copies of both networks.
    pub fn build(config: DdpgConfig<Q, P>) -> Result<Self> {
        if config.recurrent {
            return Err(OffPolicyError::RecurrentNotSupported.into());
        }
        let total = config.training_ratio * config.sampler_batch_size;
        if total % config.batch_size != 0 {
            return Err(OffPolicyError::IndivisibleTrainingRatio {
                total,
                batch_size: config.batch_size,
            }
            .into());
        }
        let updates_per_opt = total / config.batch_size;

        let device: Device = config
            .device
            .context("No device is given for the DDPG agent")?
            .into();
        let actor = Actor::build(config.actor_config, device.clone())?;
        let actor_tgt = actor.clone();
        let critic = Critic::build(config.critic_config, device.clone())?;
        let critic_tgt = critic.clone();

        info!("Built a DDPG agent ({} updates per opt)", updates_per_opt);

        Ok(Self {
            critic,
            critic_tgt,
            actor,
            actor_tgt,
            gamma: config.gamma,
            tau: config.tau,
            n_step_return: config.n_step_return,
            policy_update_interval: config.policy_update_interval,
            target_update_interval: config.target_update_interval,
            q_target_clip: config.q_target_clip,
            clip_grad_norm: config.clip_grad_norm,
            min_transitions_warmup: config.min_transitions_warmup,
            batch_size: config.batch_size,
            updates_per_opt,
            mid_batch_reset: config.mid_batch_reset,
            update_counter: 0,
            n_actor_opts: 0,
            device,
            phantom: PhantomData,
        })
    }

    /// Moves the "now" or "next" columns of a batch onto the device as an
    /// input bundle.
    fn agent_inputs(&self, batch: &R::Batch, next: bool) -> Result<AgentInputs> {
        let (obs, prev_act, prev_reward) = if next {
            (
                batch.next_obs().clone(),
                batch.next_prev_act().clone(),
                batch.next_prev_reward().clone(),
            )
        } else {
            (
                batch.obs().clone(),
                batch.prev_act().clone(),
                batch.prev_reward().clone(),
            )
        };
        let obs = Into::<Tensor>::into(obs).to_device(&self.device)?;
        let prev_act = Into::<Tensor>::into(prev_act).to_device(&self.device)?;
        let prev_reward = vec_to_tensor::<f32, f32>(prev_reward, false)?
            .unsqueeze(1)?
            .to_device(&self.device)?;
        Ok(AgentInputs::new(obs, prev_act, prev_reward))
    }

    /// Validity mask of a batch.
    ///
    /// With mid-batch resets every sample is valid. Without them, samples at
    /// episode ends are excluded from the loss means.
    fn valid_mask(&self, batch: &R::Batch) -> Result<Option<Tensor>> {
        if self.mid_batch_reset {
            return Ok(None);
        }
        let valid: Vec<f32> = batch.done().iter().map(|d| 1.0 - *d as f32).collect();
        Ok(Some(
            vec_to_tensor::<f32, f32>(valid, false)?.to_device(&self.device)?,
        ))
    }

    fn update_critic(&mut self, batch: &R::Batch) -> Result<(f32, f32, f32)> {
        let valid = self.valid_mask(batch)?;
        let y = {
            let inputs = self.agent_inputs(batch, true)?;
            let act_next = self.actor_tgt.forward(&inputs.clone().into());
            let q_next = self
                .critic_tgt
                .forward(&inputs.into(), &act_next.into())
                .squeeze(1)?;
            let return_ = vec_to_tensor::<f32, f32>(batch.return_().clone(), false)?
                .to_device(&self.device)?;
            let not_done_n: Vec<f32> = batch.done_n().iter().map(|d| 1.0 - *d as f32).collect();
            let not_done_n =
                vec_to_tensor::<f32, f32>(not_done_n, false)?.to_device(&self.device)?;
            let disc = self.gamma.powi(self.n_step_return as i32);
            (return_ + (not_done_n * (disc * q_next)?)?)?
                .clamp(-self.q_target_clip, self.q_target_clip)?
                .detach()
        };
        let q = {
            let inputs = self.agent_inputs(batch, false)?;
            let act = Into::<Tensor>::into(batch.act().clone()).to_device(&self.device)?;
            self.critic
                .forward(&inputs.into(), &act.into())
                .squeeze(1)?
        };
        let q_mean = q.mean_all()?.to_scalar::<f32>()?;
        let loss = valid_mean(&(0.5 * (y - q)?.sqr()?)?, valid.as_ref())?;
        let norm = self.critic.opt_with_clip(&loss, self.clip_grad_norm)?;
        Ok((loss.to_scalar::<f32>()?, norm, q_mean))
    }

    fn update_actor(&mut self, batch: &R::Batch) -> Result<(f32, f32)> {
        let valid = self.valid_mask(batch)?;
        let inputs = self.agent_inputs(batch, false)?;
        let act = self.actor.forward(&inputs.clone().into());
        let q = self
            .critic
            .forward(&inputs.into(), &act.into())
            .squeeze(1)?;
        let loss = valid_mean(&q, valid.as_ref())?.neg()?;
        let norm = self.actor.opt_with_clip(&loss, self.clip_grad_norm)?;
        Ok((loss.to_scalar::<f32>()?, norm))
    }

    fn update_target(&mut self) -> Result<()> {
        track(self.critic_tgt.varmap(), self.critic.varmap(), self.tau)?;
        track(self.actor_tgt.varmap(), self.actor.varmap(), self.tau)?;
        Ok(())
    }

    /// Runs one optimization round against the replay buffer.
    ///
    /// Returns `None` until the buffer holds `min_transitions_warmup`
    /// transitions. Otherwise performs `updates_per_opt` critic updates,
    /// interleaving actor and target updates at their intervals, and returns
    /// averaged losses and gradient norms plus the per-update mean of the
    /// action values.
    pub fn opt(&mut self, buffer: &mut R) -> Result<Option<Record>> {
        if buffer.len() < self.min_transitions_warmup {
            return Ok(None);
        }

        let mut loss_critic = 0f32;
        let mut grad_norm_critic = 0f32;
        let mut loss_actor = 0f32;
        let mut grad_norm_actor = 0f32;
        let mut n_actor = 0;
        let mut q_means = Vec::with_capacity(self.updates_per_opt);

        for _ in 0..self.updates_per_opt {
            self.update_counter += 1;
            let batch = buffer.batch(self.batch_size)?;

            let (l, n, q_mean) = self.update_critic(&batch)?;
            loss_critic += l;
            grad_norm_critic += n;
            q_means.push(q_mean);

            if self.update_counter % self.policy_update_interval == 0 {
                let (l, n) = self.update_actor(&batch)?;
                loss_actor += l;
                grad_norm_actor += n;
                n_actor += 1;
            }

            if self.update_counter % self.target_update_interval == 0 {
                self.update_target()?;
            }
        }
        self.n_actor_opts += n_actor;

        let mut record = Record::from_slice(&[
            (
                "loss_critic",
                RecordValue::Scalar(loss_critic / self.updates_per_opt as f32),
            ),
            (
                "grad_norm_critic",
                RecordValue::Scalar(grad_norm_critic / self.updates_per_opt as f32),
            ),
        ]);
        record.insert("q", RecordValue::Array1(q_means));
        if n_actor > 0 {
            record.insert("loss_actor", RecordValue::Scalar(loss_actor / n_actor as f32));
            record.insert(
                "grad_norm_actor",
                RecordValue::Scalar(grad_norm_actor / n_actor as f32),
            );
        }
        Ok(Some(record))
    }

    /// Pushes freshly sampled steps into the buffer, then runs `opt()`.
    pub fn opt_with_samples(&mut self, buffer: &mut R, item: Option<R::Item>) -> Result<Option<Record>> {
        if let Some(item) = item {
            buffer.push(item)?;
        }
        self.opt(buffer)
    }

    /// Saves all four networks under `path`.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;
        self.critic.save(path.join("critic.safetensors"))?;
        self.critic_tgt.save(path.join("critic_tgt.safetensors"))?;
        self.actor.save(path.join("actor.safetensors"))?;
        self.actor_tgt.save(path.join("actor_tgt.safetensors"))?;
        Ok(())
    }

    /// Loads all four networks from `path`.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.critic.load(path.join("critic.safetensors"))?;
        self.critic_tgt.load(path.join("critic_tgt.safetensors"))?;
        self.actor.load(path.join("actor.safetensors"))?;
        self.actor_tgt.load(path.join("actor_tgt.safetensors"))?;
        Ok(())
    }

    /// Copies the policy parameters into shared storage for samplers.
    pub fn publish_model(&self, shared: &SharedParams) -> Result<()> {
        shared.publish(self.actor.varmap())
    }

    /// Overwrites the policy parameters with the shared ones.
    pub fn sync_model(&mut self, shared: &SharedParams) -> Result<()> {
        shared.pull(self.actor.varmap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ddpg::{ActorConfig, CriticConfig},
        mlp::{Mlp, MlpConfig},
        TensorBatch,
    };
    use offpolicy_core::replay_buffer::{RingReplayBuffer, RingReplayBufferConfig, StepBatch};
    use tempdir::TempDir;

    type Buffer = RingReplayBuffer<TensorBatch, TensorBatch>;
    type Agent = Ddpg<Mlp, Mlp, Buffer>;

    const OBS_DIM: usize = 3;
    const ACT_DIM: usize = 2;

    fn config(warmup: usize) -> DdpgConfig<Mlp, Mlp> {
        DdpgConfig::default()
            .actor_config(
                ActorConfig::default()
                    .mu_config(MlpConfig::new(OBS_DIM as _, vec![16], ACT_DIM as _, false)),
            )
            .critic_config(
                CriticConfig::default()
                    .q_config(MlpConfig::new((OBS_DIM + ACT_DIM) as _, vec![16], 1, false)),
            )
            .min_transitions_warmup(warmup)
            .batch_size(4)
            .sampler_batch_size(10)
            .training_ratio(4)
            .device(crate::Device::Cpu)
    }

    fn push_steps(buffer: &mut Buffer, n: usize) -> Result<()> {
        let device = Device::Cpu;
        let obs = TensorBatch::from_tensor(Tensor::randn(0f32, 1f32, (n, OBS_DIM), &device)?);
        let act = TensorBatch::from_tensor(Tensor::randn(0f32, 1f32, (n, ACT_DIM), &device)?);
        buffer.push(StepBatch {
            obs,
            act,
            reward: vec![1.0; n],
            done: vec![0; n],
        })?;
        Ok(())
    }

    #[test]
    fn warmup_gates_optimization() -> Result<()> {
        let mut agent = Agent::build(config(32))?;
        let mut buffer = Buffer::build(&RingReplayBufferConfig::default().capacity(64))?;

        push_steps(&mut buffer, 16)?;
        assert!(agent.opt(&mut buffer)?.is_none());
        assert_eq!(agent.update_counter, 0);

        push_steps(&mut buffer, 16)?;
        let record = agent.opt(&mut buffer)?.expect("should optimize");
        assert!(record.get_scalar("loss_critic")?.is_finite());
        assert!(record.get_scalar("grad_norm_critic")?.is_finite());
        Ok(())
    }

    #[test]
    fn actor_updates_follow_policy_interval() -> Result<()> {
        // training_ratio 4 * sampler_batch_size 10 / batch_size 4 = 10 updates.
        let mut agent = Agent::build(config(8).policy_update_interval(2))?;
        let mut buffer = Buffer::build(&RingReplayBufferConfig::default().capacity(64))?;
        push_steps(&mut buffer, 32)?;

        let record = agent.opt(&mut buffer)?.expect("should optimize");
        assert_eq!(agent.update_counter, 10);
        assert_eq!(agent.n_actor_opts, 5);
        assert!(record.get_scalar("loss_actor")?.is_finite());

        // One mean action value per minibatch update.
        let q = record.get_array1("q")?;
        assert_eq!(q.len(), 10);
        assert!(q.iter().all(|v| v.is_finite()));
        Ok(())
    }

    #[test]
    fn target_networks_track_the_online_networks() -> Result<()> {
        let mut agent = Agent::build(config(8).tau(1.0))?;
        let mut buffer = Buffer::build(&RingReplayBufferConfig::default().capacity(64))?;
        push_steps(&mut buffer, 32)?;
        agent.opt(&mut buffer)?.expect("should optimize");

        // tau = 1 makes the target a hard copy of the online network.
        let obs = Tensor::randn(0f32, 1f32, (5, OBS_DIM), &Device::Cpu)?;
        let a = agent.actor.forward(&obs.clone());
        let a_tgt = agent.actor_tgt.forward(&obs);
        let diff = (a - a_tgt)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-6);
        Ok(())
    }

    #[test]
    fn build_rejects_indivisible_training_ratio() {
        // `err()` instead of `unwrap_err()`; the agent itself is not `Debug`.
        let err = Agent::build(config(8).batch_size(3)).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<OffPolicyError>(),
            Some(OffPolicyError::IndivisibleTrainingRatio { total: 40, batch_size: 3 })
        ));
    }

    #[test]
    fn build_rejects_recurrent_policies() {
        let err = Agent::build(config(8).recurrent(true)).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<OffPolicyError>(),
            Some(OffPolicyError::RecurrentNotSupported)
        ));
    }

    #[test]
    fn save_load_roundtrip() -> Result<()> {
        let dir = TempDir::new("ddpg_agent")?;
        let agent = Agent::build(config(8))?;
        agent.save(dir.path())?;

        let mut restored = Agent::build(config(8))?;
        restored.load(dir.path())?;

        let obs = Tensor::randn(0f32, 1f32, (5, OBS_DIM), &Device::Cpu)?;
        let a = agent.actor.forward(&obs.clone());
        let b = restored.actor.forward(&obs);
        let diff = (a - b)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-6);
        Ok(())
    }

    #[test]
    fn shared_params_roundtrip() -> Result<()> {
        let agent = Agent::build(config(8))?;
        let mut other = Agent::build(config(8))?;
        let shared = SharedParams::new(agent.actor.varmap())?;

        agent.publish_model(&shared)?;
        other.sync_model(&shared)?;

        let obs = Tensor::randn(0f32, 1f32, (5, OBS_DIM), &Device::Cpu)?;
        let a = agent.actor.forward(&obs.clone());
        let b = other.actor.forward(&obs);
        let diff = (a - b)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-6);
        Ok(())
    }
}
