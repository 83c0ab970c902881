//! State-value network of the SAC agent.
use crate::{model::SubModel1, util::track};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// State-value function for SAC agents.
///
/// The agent keeps a soft target copy of this network and bootstraps the
/// action-value targets from it. `Clone` builds a fresh network and copies
/// the parameters, which is how the target copy is created.
pub struct ValueNet<V>
where
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Clone,
{
    device: Device,
    varmap: VarMap,
    v_config: V::Config,
    v: V,
}

impl<V> ValueNet<V>
where
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`ValueNet`].
    pub fn build(v_config: V::Config, device: Device) -> Result<ValueNet<V>> {
        let varmap = VarMap::new();
        let v = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            V::build(vb, v_config.clone())
        };

        Ok(Self {
            device,
            varmap,
            v_config,
            v,
        })
    }

    /// Outputs the state value of an observation bundle.
    pub fn forward(&self, x: &V::Input) -> Tensor {
        self.v.forward(x)
    }

    /// Variables of the state-value network.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save value net to {:?}", path.as_ref());
        Ok(())
    }

    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load value net from {:?}", path.as_ref());
        Ok(())
    }
}

impl<V> Clone for ValueNet<V>
where
    V: SubModel1<Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Clone,
{
    fn clone(&self) -> Self {
        let device = self.device.clone();
        let varmap = VarMap::new();
        let v_config = self.v_config.clone();
        let v = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            V::build(vb, v_config.clone())
        };
        // Value copy; the new varmap must stay independent storage.
        track(&varmap, &self.varmap, 1.0).unwrap();

        Self {
            device,
            varmap,
            v_config,
            v,
        }
    }
}
