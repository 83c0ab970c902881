//! Deterministic policy of the DDPG agent.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::{clip_grad_norm, track, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Actor`].
pub struct ActorConfig<P: OutDim> {
    pub(super) mu_config: Option<P>,
    pub(super) opt_config: OptimizerConfig,
}

impl<P: OutDim> Default for ActorConfig<P> {
    fn default() -> Self {
        Self {
            mu_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<P> ActorConfig<P>
where
    P: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the configuration of the policy network.
    pub fn mu_config(mut self, v: P) -> Self {
        self.mu_config = Some(v);
        self
    }

    /// Sets output dimension of the model.
    pub fn out_dim(mut self, v: i64) -> Self {
        match &mut self.mu_config {
            None => {}
            Some(mu_config) => mu_config.set_out_dim(v),
        };
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`ActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Deterministic policy for DDPG agents.
///
/// Maps an observation bundle to an action vector.
pub struct Actor<P>
where
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    device: Device,
    varmap: VarMap,

    // Dimension of the action vector.
    out_dim: i64,

    mu_config: P::Config,
    mu: P,

    opt_config: OptimizerConfig,
    opt: Optimizer,
}

impl<P> Actor<P>
where
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`Actor`].
    pub fn build(config: ActorConfig<P::Config>, device: Device) -> Result<Actor<P>> {
        let mu_config = config.mu_config.context("mu_config is not set.")?;
        let out_dim = mu_config.get_out_dim();
        let varmap = VarMap::new();
        let mu = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            P::build(vb, mu_config.clone())
        };
        let opt_config = config.opt_config;

        Ok(Actor::_build(
            device, out_dim, opt_config, mu_config, mu, varmap, None,
        ))
    }

    fn _build(
        device: Device,
        out_dim: i64,
        opt_config: OptimizerConfig,
        mu_config: P::Config,
        mu: P,
        varmap: VarMap,
        varmap_src: Option<&VarMap>,
    ) -> Self {
        let opt = opt_config.build(varmap.all_vars()).unwrap();

        // Value copy; the new varmap must stay independent storage.
        if let Some(varmap_src) = varmap_src {
            track(&varmap, varmap_src, 1.0).unwrap();
        }

        Self {
            device,
            out_dim,
            opt_config,
            varmap,
            opt,
            mu,
            mu_config,
        }
    }

    /// Outputs an action given an observation.
    pub fn forward(&self, x: &P::Input) -> Tensor {
        let a = self.mu.forward(x);
        debug_assert_eq!(a.dims()[1], self.out_dim as usize);
        a
    }

    /// Backpropagates `loss`, clips the gradient norm of the policy
    /// parameters, and steps the optimizer.
    ///
    /// Returns the gradient norm before clipping.
    pub fn opt_with_clip(&mut self, loss: &Tensor, max_norm: f64) -> Result<f32> {
        let mut grads = loss.backward()?;
        let norm = clip_grad_norm(&mut grads, &self.varmap.all_vars(), max_norm)?;
        self.opt.step(&grads)?;
        Ok(norm)
    }

    /// Variables of the policy network.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save actor to {:?}", path.as_ref());
        Ok(())
    }

    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load actor from {:?}", path.as_ref());
        Ok(())
    }
}

impl<P> Clone for Actor<P>
where
    P: SubModel1<Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn clone(&self) -> Self {
        let device = self.device.clone();
        let opt_config = self.opt_config.clone();
        let varmap = VarMap::new();
        let mu_config = self.mu_config.clone();
        let mu = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            P::build(vb, mu_config.clone())
        };
        let out_dim = self.out_dim;

        Self::_build(
            device,
            out_dim,
            opt_config,
            mu_config,
            mu,
            varmap,
            Some(&self.varmap),
        )
    }
}
