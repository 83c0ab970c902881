//! Stochastic policy of the SAC agent.
use crate::{model::SubModel1, util::OutDim};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Squashed Gaussian policy for SAC agents.
///
/// The wrapped network outputs the mean and the raw log standard deviation
/// of the pre-squash Gaussian. Sampling, squashing, and log-probabilities are
/// handled by the agent; parameters are optimized by the agent's shared
/// optimizer, so this wrapper owns none.
pub struct Actor<P>
where
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    varmap: VarMap,

    // Dimension of the action vector.
    out_dim: i64,

    pi: P,
}

impl<P> Actor<P>
where
    P: SubModel1<Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`Actor`].
    pub fn build(pi_config: P::Config, device: Device) -> Result<Actor<P>> {
        let out_dim = pi_config.get_out_dim();
        let varmap = VarMap::new();
        let pi = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            P::build(vb, pi_config)
        };

        Ok(Self {
            varmap,
            out_dim,
            pi,
        })
    }

    /// Outputs the mean and the raw log standard deviation of the policy
    /// distribution.
    pub fn forward(&self, x: &P::Input) -> (Tensor, Tensor) {
        let (mean, lstd) = self.pi.forward(x);
        debug_assert_eq!(mean.dims()[1], self.out_dim as usize);
        (mean, lstd)
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
