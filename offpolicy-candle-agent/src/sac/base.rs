//! Optimization loop of the SAC agent.
use super::{ActionPrior, Actor, Critic, SacConfig, ValueNet};
use crate::{
    model::{AgentInputs, SubModel1, SubModel2},
    opt::Optimizer,
    util::{
        clip_grad_norm, merge_grads, retain_grads, track, valid_mean, vec_to_tensor, OutDim,
        SharedParams,
    },
};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor, Var, D};
use log::info;
use offpolicy_core::{
    ExperienceBufferBase, OffPolicyError, Record, RecordValue, ReplayBufferBase, TransitionBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, fs, marker::PhantomData, path::Path};

/// Log density of a unit Gaussian, summed over the last axis.
pub(super) fn normal_logp(x: &Tensor) -> Result<Tensor> {
    let c = -0.5 * (2.0 * std::f64::consts::PI).ln();
    Ok(((0.5 * x.sqr()?)?.neg()? + c)?.sum(D::Minus1)?)
}

/// Regression target of the state-value network: the entropy-regularized
/// value of the sampled action under the smaller of the two critics.
pub(super) fn value_target(
    min_q: &Tensor,
    log_pi: &Tensor,
    prior_log_pi: Option<&Tensor>,
) -> Result<Tensor> {
    let t = (min_q - log_pi)?;
    let t = match prior_log_pi {
        Some(p) => (t + p)?,
        None => t,
    };
    Ok(t.detach())
}

#[derive(Default)]
struct UpdateStats {
    loss_q1: f32,
    loss_q2: f32,
    loss_value: f32,
    loss_actor: f32,
    grad_norm_q1: f32,
    grad_norm_q2: f32,
    grad_norm_value: f32,
    grad_norm_actor: f32,

    // Per-update value statistics, reported as arrays rather than averaged.
    q1: f32,
    q2: f32,
    value: f32,
    q_mean_diff: f32,
}

impl UpdateStats {
    fn accumulate(&mut self, other: &UpdateStats) {
        self.loss_q1 += other.loss_q1;
        self.loss_q2 += other.loss_q2;
        self.loss_value += other.loss_value;
        self.loss_actor += other.loss_actor;
        self.grad_norm_q1 += other.grad_norm_q1;
        self.grad_norm_q2 += other.grad_norm_q2;
        self.grad_norm_value += other.grad_norm_value;
        self.grad_norm_actor += other.grad_norm_actor;
    }
}

/// Soft actor critic agent.
///
/// Holds a squashed Gaussian policy `P`, two action-value networks `Q`, a
/// state-value network `V`, and a soft target copy of the latter. All four
/// online networks are updated in a single step of one shared optimizer,
/// with each loss restricted to the gradients of its own network.
pub struct Sac<Q, P, V, R>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    pub(super) critic1: Critic<Q>,
    pub(super) critic2: Critic<Q>,
    pub(super) actor: Actor<P>,
    pub(super) value: ValueNet<V>,
    pub(super) value_tgt: ValueNet<V>,
    opt: Optimizer,

    // Parameter groups of the shared optimizer.
    vars_q1: Vec<Var>,
    vars_q2: Vec<Var>,
    vars_pi: Vec<Var>,
    vars_v: Vec<Var>,
    vars_all: Vec<Var>,

    gamma: f64,
    tau: f64,
    n_step_return: usize,
    target_update_interval: usize,
    reward_scale: f64,
    reparameterize: bool,
    action_prior: ActionPrior,
    policy_output_regularization: f64,
    clip_grad_norm: f64,
    min_lstd: f64,
    max_lstd: f64,
    epsilon: f64,
    min_transitions_warmup: usize,
    batch_size: usize,
    updates_per_opt: usize,
    mid_batch_reset: bool,

    // Cumulative number of minibatch updates.
    update_counter: usize,

    device: Device,
    phantom: PhantomData<R>,
}

impl<Q, P, V, R> Sac<Q, P, V, R>
where
    Q: SubModel2<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    Q::Input1: From<AgentInputs>,
    Q::Input2: From<Tensor>,
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    P::Input: From<AgentInputs>,
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
    V::Input: From<AgentInputs>,
    R: ExperienceBufferBase + ReplayBufferBase,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: Into<Tensor> + Clone,
    <R::Batch as TransitionBatch>::ActBatch: Into<Tensor> + Clone,
{
    /// Constructs the agent and the shared optimizer over all four networks.
    pub fn build(config: SacConfig<Q, P, V>) -> Result<Self> {
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
            .context("No device is given for the SAC agent")?
            .into();
        let q_config = config.q_config.context("q_config is not set.")?;
        let pi_config = config.pi_config.context("pi_config is not set.")?;
        let v_config = config.v_config.context("v_config is not set.")?;
        let critic1 = Critic::build(q_config.clone(), device.clone())?;
        let critic2 = Critic::build(q_config, device.clone())?;
        let actor = Actor::build(pi_config, device.clone())?;
        let value = ValueNet::build(v_config, device.clone())?;
        let value_tgt = value.clone();

        let vars_q1 = critic1.varmap().all_vars();
        let vars_q2 = critic2.varmap().all_vars();
        let vars_pi = actor.varmap().all_vars();
        let vars_v = value.varmap().all_vars();
        let vars_all: Vec<Var> = vars_q1
            .iter()
            .chain(vars_q2.iter())
            .chain(vars_pi.iter())
            .chain(vars_v.iter())
            .cloned()
            .collect();
        let opt = config.opt_config.build(vars_all.clone())?;

        info!("Built a SAC agent ({} updates per opt)", updates_per_opt);

        Ok(Self {
            critic1,
            critic2,
            actor,
            value,
            value_tgt,
            opt,
            vars_q1,
            vars_q2,
            vars_pi,
            vars_v,
            vars_all,
            gamma: config.gamma,
            tau: config.tau,
            n_step_return: config.n_step_return,
            target_update_interval: config.target_update_interval,
            reward_scale: config.reward_scale,
            reparameterize: config.reparameterize,
            action_prior: config.action_prior,
            policy_output_regularization: config.policy_output_regularization,
            clip_grad_norm: config.clip_grad_norm,
            min_lstd: config.min_lstd,
            max_lstd: config.max_lstd,
            epsilon: config.epsilon,
            min_transitions_warmup: config.min_transitions_warmup,
            batch_size: config.batch_size,
            updates_per_opt,
            mid_batch_reset: config.mid_batch_reset,
            update_counter: 0,
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

    fn valid_mask(&self, batch: &R::Batch) -> Result<Option<Tensor>> {
        if self.mid_batch_reset {
            return Ok(None);
        }
        let valid: Vec<f32> = batch.done().iter().map(|d| 1.0 - *d as f32).collect();
        Ok(Some(
            vec_to_tensor::<f32, f32>(valid, false)?.to_device(&self.device)?,
        ))
    }

    /// Samples a squashed action and its log probability.
    ///
    /// Returns `(action, log_pi, mean, lstd)`. Without reparameterization the
    /// action is detached after the log probability is taken, so policy
    /// gradients flow only through `log_pi`.
    fn action_logp(&self, input: &P::Input) -> Result<(Tensor, Tensor, Tensor, Tensor)> {
        let (mean, lstd) = self.actor.forward(input);
        let lstd = lstd.clamp(self.min_lstd, self.max_lstd)?;
        let std = lstd.exp()?;
        let z = Tensor::randn(0f32, 1f32, mean.dims(), mean.device())?;
        let act = ((&std * &z)? + &mean)?.tanh()?;
        let squash_corr = ((1f64 - act.sqr()?)? + self.epsilon)?.log()?.sum(D::Minus1)?;
        let log_pi = ((normal_logp(&z)? - lstd.sum(D::Minus1)?)? - squash_corr)?;
        let act = if self.reparameterize { act } else { act.detach() };
        Ok((act, log_pi, mean, lstd))
    }

    fn update(&mut self, batch: &R::Batch) -> Result<UpdateStats> {
        let valid = self.valid_mask(batch)?;

        // Bootstrap target shared by both critics.
        let y = {
            let next = self.agent_inputs(batch, true)?;
            let v_next = self.value_tgt.forward(&next.into()).squeeze(1)?;
            let return_ = vec_to_tensor::<f32, f32>(batch.return_().clone(), false)?
                .to_device(&self.device)?;
            let not_done_n: Vec<f32> = batch.done_n().iter().map(|d| 1.0 - *d as f32).collect();
            let not_done_n =
                vec_to_tensor::<f32, f32>(not_done_n, false)?.to_device(&self.device)?;
            let disc = self.gamma.powi(self.n_step_return as i32);
            ((self.reward_scale * return_)? + (not_done_n * (disc * v_next)?)?)?.detach()
        };

        let inputs = self.agent_inputs(batch, false)?;
        let act = Into::<Tensor>::into(batch.act().clone()).to_device(&self.device)?;
        let q1 = self
            .critic1
            .forward(&inputs.clone().into(), &act.clone().into())
            .squeeze(1)?;
        let q2 = self
            .critic2
            .forward(&inputs.clone().into(), &act.into())
            .squeeze(1)?;
        let q1_mean = q1.mean_all()?.to_scalar::<f32>()?;
        let q2_mean = q2.mean_all()?.to_scalar::<f32>()?;
        let loss_q1 = valid_mean(&(0.5 * (q1 - &y)?.sqr()?)?, valid.as_ref())?;
        let loss_q2 = valid_mean(&(0.5 * (q2 - &y)?.sqr()?)?, valid.as_ref())?;

        // Value and policy losses use a fresh action from the current policy.
        let (act_new, log_pi, mean, lstd) = self.action_logp(&inputs.clone().into())?;
        let prior_log_pi = match self.action_prior {
            ActionPrior::Uniform => None,
            ActionPrior::Gaussian => Some(normal_logp(&act_new)?),
        };
        let q1_new = self
            .critic1
            .forward(&inputs.clone().into(), &act_new.clone().into())
            .squeeze(1)?;
        let q2_new = self
            .critic2
            .forward(&inputs.clone().into(), &act_new.into())
            .squeeze(1)?;
        let min_q = q1_new.minimum(&q2_new)?;

        let v = self.value.forward(&inputs.clone().into()).squeeze(1)?;
        let value_mean = v.mean_all()?.to_scalar::<f32>()?;
        let v_tgt = value_target(&min_q, &log_pi, prior_log_pi.as_ref())?;
        let loss_value = valid_mean(&(0.5 * (&v - &v_tgt)?.sqr()?)?, valid.as_ref())?;

        let pi_losses = if self.reparameterize {
            (&log_pi - &min_q)?
        } else {
            let adv = (&v - &v_tgt)?.detach();
            (&log_pi * &adv)?
        };
        let mut loss_actor = valid_mean(&pi_losses, valid.as_ref())?;
        if self.policy_output_regularization > 0.0 {
            let reg = ((self.policy_output_regularization * 0.5)
                * (mean.sqr()? + lstd.sqr()?)?.sum(D::Minus1)?)?;
            loss_actor = (loss_actor + valid_mean(&reg, valid.as_ref())?)?;
        }

        // One shared step; each loss keeps the gradients of its own network.
        let mut grads = loss_q1.backward()?;
        retain_grads(&mut grads, &self.vars_all, &self.vars_q1);
        let grad_norm_q1 = clip_grad_norm(&mut grads, &self.vars_q1, self.clip_grad_norm)?;

        let mut grads_q2 = loss_q2.backward()?;
        retain_grads(&mut grads_q2, &self.vars_all, &self.vars_q2);
        let grad_norm_q2 = clip_grad_norm(&mut grads_q2, &self.vars_q2, self.clip_grad_norm)?;
        merge_grads(&mut grads, &mut grads_q2, &self.vars_q2);

        let mut grads_v = loss_value.backward()?;
        retain_grads(&mut grads_v, &self.vars_all, &self.vars_v);
        let grad_norm_value = clip_grad_norm(&mut grads_v, &self.vars_v, self.clip_grad_norm)?;
        merge_grads(&mut grads, &mut grads_v, &self.vars_v);

        let mut grads_pi = loss_actor.backward()?;
        retain_grads(&mut grads_pi, &self.vars_all, &self.vars_pi);
        let grad_norm_actor = clip_grad_norm(&mut grads_pi, &self.vars_pi, self.clip_grad_norm)?;
        merge_grads(&mut grads, &mut grads_pi, &self.vars_pi);

        self.opt.step(&grads)?;

        Ok(UpdateStats {
            loss_q1: loss_q1.to_scalar::<f32>()?,
            loss_q2: loss_q2.to_scalar::<f32>()?,
            loss_value: loss_value.to_scalar::<f32>()?,
            loss_actor: loss_actor.to_scalar::<f32>()?,
            grad_norm_q1,
            grad_norm_q2,
            grad_norm_value,
            grad_norm_actor,
            q1: q1_mean,
            q2: q2_mean,
            value: value_mean,
            q_mean_diff: q1_mean - q2_mean,
        })
    }

    /// Runs one optimization round against the replay buffer.
    ///
    /// Returns `None` until the buffer holds `min_transitions_warmup`
    /// transitions. Otherwise performs `updates_per_opt` updates of all four
    /// networks, tracking the target state-value network at its interval, and
    /// returns averaged losses and gradient norms plus per-update means of
    /// the action and state values.
    pub fn opt(&mut self, buffer: &mut R) -> Result<Option<Record>> {
        if buffer.len() < self.min_transitions_warmup {
            return Ok(None);
        }

        let mut acc = UpdateStats::default();
        let mut q1s = Vec::with_capacity(self.updates_per_opt);
        let mut q2s = Vec::with_capacity(self.updates_per_opt);
        let mut values = Vec::with_capacity(self.updates_per_opt);
        let mut q_mean_diffs = Vec::with_capacity(self.updates_per_opt);
        for _ in 0..self.updates_per_opt {
            self.update_counter += 1;
            let batch = buffer.batch(self.batch_size)?;
            let stats = self.update(&batch)?;
            q1s.push(stats.q1);
            q2s.push(stats.q2);
            values.push(stats.value);
            q_mean_diffs.push(stats.q_mean_diff);
            acc.accumulate(&stats);

            if self.update_counter % self.target_update_interval == 0 {
                track(self.value_tgt.varmap(), self.value.varmap(), self.tau)?;
            }
        }

        let k = self.updates_per_opt as f32;
        let mut record = Record::from_slice(&[
            ("loss_q1", RecordValue::Scalar(acc.loss_q1 / k)),
            ("loss_q2", RecordValue::Scalar(acc.loss_q2 / k)),
            ("loss_value", RecordValue::Scalar(acc.loss_value / k)),
            ("loss_actor", RecordValue::Scalar(acc.loss_actor / k)),
            ("grad_norm_q1", RecordValue::Scalar(acc.grad_norm_q1 / k)),
            ("grad_norm_q2", RecordValue::Scalar(acc.grad_norm_q2 / k)),
            (
                "grad_norm_value",
                RecordValue::Scalar(acc.grad_norm_value / k),
            ),
            (
                "grad_norm_actor",
                RecordValue::Scalar(acc.grad_norm_actor / k),
            ),
        ]);
        record.insert("q1", RecordValue::Array1(q1s));
        record.insert("q2", RecordValue::Array1(q2s));
        record.insert("value", RecordValue::Array1(values));
        record.insert("q_mean_diff", RecordValue::Array1(q_mean_diffs));
        Ok(Some(record))
    }

    /// Pushes freshly sampled steps into the buffer, then runs `opt()`.
    pub fn opt_with_samples(&mut self, buffer: &mut R, item: Option<R::Item>) -> Result<Option<Record>> {
        if let Some(item) = item {
            buffer.push(item)?;
        }
        self.opt(buffer)
    }

    /// Saves all five networks under `path`.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;
        self.critic1.save(path.join("critic1.safetensors"))?;
        self.critic2.save(path.join("critic2.safetensors"))?;
        self.actor.save(path.join("actor.safetensors"))?;
        self.value.save(path.join("value.safetensors"))?;
        self.value_tgt.save(path.join("value_tgt.safetensors"))?;
        Ok(())
    }

    /// Loads all five networks from `path`.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.critic1.load(path.join("critic1.safetensors"))?;
        self.critic2.load(path.join("critic2.safetensors"))?;
        self.actor.load(path.join("actor.safetensors"))?;
        self.value.load(path.join("value.safetensors"))?;
        self.value_tgt.load(path.join("value_tgt.safetensors"))?;
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
        mlp::{Mlp, Mlp2, MlpConfig},
        TensorBatch,
    };
    use offpolicy_core::replay_buffer::{RingReplayBuffer, RingReplayBufferConfig, StepBatch};
    use tempdir::TempDir;

    type Buffer = RingReplayBuffer<TensorBatch, TensorBatch>;
    type Agent = Sac<Mlp, Mlp2, Mlp, Buffer>;

    const OBS_DIM: usize = 3;
    const ACT_DIM: usize = 2;

    fn config(warmup: usize) -> SacConfig<Mlp, Mlp2, Mlp> {
        SacConfig::default()
            .pi_config(MlpConfig::new(OBS_DIM as _, vec![16], ACT_DIM as _, false))
            .q_config(MlpConfig::new((OBS_DIM + ACT_DIM) as _, vec![16], 1, false))
            .v_config(MlpConfig::new(OBS_DIM as _, vec![16], 1, false))
            .min_transitions_warmup(warmup)
            .batch_size(4)
            .sampler_batch_size(8)
            .training_ratio(2)
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
    fn value_target_uses_min_critic() -> Result<()> {
        let device = Device::Cpu;
        let q1 = Tensor::from_slice(&[1.0f32, 5.0], (2,), &device)?;
        let q2 = Tensor::from_slice(&[2.0f32, 3.0], (2,), &device)?;
        let log_pi = Tensor::from_slice(&[0.5f32, 0.5], (2,), &device)?;

        let min_q = q1.minimum(&q2)?;
        let tgt = value_target(&min_q, &log_pi, None)?;
        assert_eq!(tgt.to_vec1::<f32>()?, vec![0.5, 2.5]);
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
        // updates_per_opt = 2 * 8 / 4 = 4.
        let record = agent.opt(&mut buffer)?.expect("should optimize");
        assert_eq!(agent.update_counter, 4);
        for key in [
            "loss_q1",
            "loss_q2",
            "loss_value",
            "loss_actor",
            "grad_norm_q1",
            "grad_norm_q2",
            "grad_norm_value",
            "grad_norm_actor",
        ] {
            assert!(record.get_scalar(key)?.is_finite(), "{} not finite", key);
        }

        // One entry per minibatch update.
        for key in ["q1", "q2", "value", "q_mean_diff"] {
            let arr = record.get_array1(key)?;
            assert_eq!(arr.len(), 4, "{} has wrong length", key);
            assert!(arr.iter().all(|v| v.is_finite()), "{} not finite", key);
        }
        Ok(())
    }

    #[test]
    fn target_value_net_tracks_the_online_net() -> Result<()> {
        let mut agent = Agent::build(config(8).tau(1.0))?;
        let mut buffer = Buffer::build(&RingReplayBufferConfig::default().capacity(64))?;
        push_steps(&mut buffer, 32)?;
        agent.opt(&mut buffer)?.expect("should optimize");

        // tau = 1 makes the target a hard copy of the online network.
        let obs = Tensor::randn(0f32, 1f32, (5, OBS_DIM), &Device::Cpu)?;
        let v = agent.value.forward(&obs.clone());
        let v_tgt = agent.value_tgt.forward(&obs);
        let diff = (v - v_tgt)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-6);
        Ok(())
    }

    #[test]
    fn score_function_estimator_runs() -> Result<()> {
        let mut agent = Agent::build(
            config(8)
                .reparameterize(false)
                .action_prior(ActionPrior::Gaussian),
        )?;
        let mut buffer = Buffer::build(&RingReplayBufferConfig::default().capacity(64))?;
        push_steps(&mut buffer, 32)?;

        let record = agent.opt(&mut buffer)?.expect("should optimize");
        assert!(record.get_scalar("loss_actor")?.is_finite());
        Ok(())
    }

    #[test]
    fn build_rejects_indivisible_training_ratio() {
        // `err()` instead of `unwrap_err()`; the agent itself is not `Debug`.
        let err = Agent::build(config(8).batch_size(3)).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<OffPolicyError>(),
            Some(OffPolicyError::IndivisibleTrainingRatio { total: 16, batch_size: 3 })
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
        let dir = TempDir::new("sac_agent")?;
        let agent = Agent::build(config(8))?;
        agent.save(dir.path())?;

        let mut restored = Agent::build(config(8))?;
        restored.load(dir.path())?;

        let obs = Tensor::randn(0f32, 1f32, (5, OBS_DIM), &Device::Cpu)?;
        let (mean_a, _) = agent.actor.forward(&obs.clone());
        let (mean_b, _) = restored.actor.forward(&obs);
        let diff = (mean_a - mean_b)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-6);
        Ok(())
    }
}
