//! Sharing model parameters between a learner and readers.
use anyhow::{Context, Result};
use candle_core::Tensor;
use candle_nn::VarMap;
use log::trace;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Model parameters keyed by their variable names.
pub struct NamedTensors {
    tensors: HashMap<String, Tensor>,
}

impl NamedTensors {
    /// Detached copies of all variables in `varmap`.
    pub fn copy_from(varmap: &VarMap) -> Result<Self> {
        let data = varmap.data().lock().unwrap();
        let mut tensors = HashMap::new();
        for (k, v) in data.iter() {
            tensors.insert(k.clone(), v.as_tensor().copy()?);
        }
        Ok(Self { tensors })
    }

    /// Writes the stored parameters into the variables of `varmap`.
    pub fn copy_to(&self, varmap: &VarMap) -> Result<()> {
        let data = varmap.data().lock().unwrap();
        for (k, v) in data.iter() {
            let src = self
                .tensors
                .get(k)
                .with_context(|| format!("No shared parameter named {}", k))?;
            v.set(src)?;
        }
        Ok(())
    }

    /// Number of stored parameter tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Returns `true` if no parameters are stored.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

/// Handle to a parameter set shared between a learner and readers.
///
/// [`publish`](Self::publish) and [`pull`](Self::pull) each perform the whole
/// copy inside a single lock scope, so a reader never observes a partially
/// written parameter set. The handle is created at setup and passed
/// explicitly to every party that needs it.
#[derive(Clone)]
pub struct SharedParams {
    inner: Arc<Mutex<NamedTensors>>,
}

impl SharedParams {
    /// Creates the handle, seeded with the current parameters of `varmap`.
    pub fn new(varmap: &VarMap) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(NamedTensors::copy_from(varmap)?)),
        })
    }

    /// Replaces the shared parameter set with a copy of `varmap`.
    pub fn publish(&self, varmap: &VarMap) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        *guard = NamedTensors::copy_from(varmap)?;
        trace!("Published {} parameter tensors", guard.len());
        Ok(())
    }

    /// Copies the shared parameter set into `varmap`.
    pub fn pull(&self, varmap: &VarMap) -> Result<()> {
        let guard = self.inner.lock().unwrap();
        guard.copy_to(varmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::Init;

    fn varmap_with(name: &str, value: &[f32]) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((value.len(),), name, init, DType::F32, &Device::Cpu)?;
        let t = Tensor::from_slice(value, (value.len(),), &Device::Cpu)?;
        vm.data().lock().unwrap().get(name).unwrap().set(&t)?;
        Ok(vm)
    }

    #[test]
    fn publish_then_pull_copies_parameters() -> Result<()> {
        let learner = varmap_with("w", &[1.0, 2.0, 3.0])?;
        let reader = varmap_with("w", &[0.0, 0.0, 0.0])?;

        let shared = SharedParams::new(&reader)?;
        shared.publish(&learner)?;
        shared.pull(&reader)?;

        let got: Vec<f32> = reader.data().lock().unwrap()["w"]
            .as_tensor()
            .to_vec1()?;
        assert_eq!(got, vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn pull_into_unknown_variable_fails() -> Result<()> {
        let learner = varmap_with("w", &[1.0])?;
        let reader = varmap_with("other", &[0.0])?;

        let shared = SharedParams::new(&learner)?;
        assert!(shared.pull(&reader).is_err());
        Ok(())
    }
}
