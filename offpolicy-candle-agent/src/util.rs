//! Utilities.
use anyhow::Result;
use candle_core::{backprop::GradStore, Tensor, Var, WithDType};
use candle_nn::VarMap;
use log::trace;
use num_traits::AsPrimitive;
use std::{collections::HashSet, convert::TryFrom};
mod named_tensors;
pub use named_tensors::{NamedTensors, SharedParams};

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("dest");
    let dest = dest.data().lock().unwrap();
    trace!("src");
    let src = src.data().lock().unwrap();

    dest.iter().for_each(|(k_dest, v_dest)| {
        let v_src = src.get(k_dest).unwrap();
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src).unwrap() + (1.0 - tau) * t_dest).unwrap();
        v_dest.set(&t_dest).unwrap();
    });

    Ok(())
}

/// Rescales the gradients of `vars` in `grads` so that their global L2 norm
/// does not exceed `max_norm`.
///
/// Returns the norm before rescaling.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> Result<f32> {
    let mut sum_sq = 0f32;
    for var in vars.iter() {
        if let Some(grad) = grads.get(var) {
            sum_sq += grad.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }
    let norm = sum_sq.sqrt();

    if norm as f64 > max_norm {
        let scale = max_norm / (norm as f64 + 1e-6);
        for var in vars.iter() {
            if let Some(grad) = grads.get(var) {
                let clipped = (scale * grad)?;
                grads.insert(var, clipped);
            }
        }
    }

    Ok(norm)
}

/// Restricts `grads` to the gradients of `keep`, removing the entries of
/// every other variable in `all`.
///
/// A backward pass populates gradients for every variable the loss touches;
/// when several losses share one optimizer, each loss's store must be
/// restricted to its own parameter group before clipping and merging.
pub fn retain_grads(grads: &mut GradStore, all: &[Var], keep: &[Var]) {
    let keep: HashSet<_> = keep.iter().map(|v| v.id()).collect();
    for var in all.iter() {
        if !keep.contains(&var.id()) {
            grads.remove(var);
        }
    }
}

/// Moves the gradients of `vars` from `src` into `dst`.
pub fn merge_grads(dst: &mut GradStore, src: &mut GradStore, vars: &[Var]) {
    for var in vars.iter() {
        if let Some(grad) = src.remove(var) {
            dst.insert(var, grad);
        }
    }
}

/// Mean of `t` restricted to the entries where `valid` is one.
///
/// `valid` being `None` means all entries count.
pub fn valid_mean(t: &Tensor, valid: Option<&Tensor>) -> Result<Tensor> {
    match valid {
        None => Ok(t.mean_all()?),
        Some(valid) => Ok(((t * valid)?.sum_all()? / valid.sum_all()?)?),
    }
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> i64;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: i64);
}

pub fn vec_to_tensor<T1, T2>(v: Vec<T1>, add_batch_dim: bool) -> Result<Tensor>
where
    T1: AsPrimitive<T2>,
    T2: WithDType,
{
    let v = v.iter().map(|e| e.as_()).collect::<Vec<_>>();
    let t: Tensor = TryFrom::<Vec<T2>>::try_from(v)?;

    match add_batch_dim {
        true => Ok(t.unsqueeze(0)?),
        false => Ok(t),
    }
}

#[test]
fn test_track() -> Result<()> {
    use candle_core::{DType, Device};
    use candle_nn::Init;

    let tau = 0.7;
    let t_src = Tensor::from_slice(&[1.0f32, 2.0, 3.0], (3,), &Device::Cpu)?;
    let t_dest = Tensor::from_slice(&[4.0f32, 5.0, 6.0], (3,), &Device::Cpu)?;
    let t = ((tau * &t_src).unwrap() + (1.0 - tau) * &t_dest).unwrap();

    let init = Init::Randn {
        mean: 0.0,
        stdev: 1.0,
    };
    let vm_src = {
        let vm = VarMap::new();
        vm.get((3,), "var1", init, DType::F32, &Device::Cpu)?;
        vm.data().lock().unwrap().get("var1").unwrap().set(&t_src)?;
        vm
    };
    let vm_dest = {
        let vm = VarMap::new();
        vm.get((3,), "var1", init, DType::F32, &Device::Cpu)?;
        vm.data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .set(&t_dest)?;
        vm
    };
    track(&vm_dest, &vm_src, tau)?;

    let t_ = vm_dest
        .data()
        .lock()
        .unwrap()
        .get("var1")
        .unwrap()
        .as_tensor()
        .clone();

    assert!((t - t_)?.abs()?.sum(0)?.to_scalar::<f32>()? < 1e-6);

    Ok(())
}

#[test]
fn test_track_hard_copy_and_identity() -> Result<()> {
    use candle_core::{DType, Device};
    use candle_nn::Init;

    let init = Init::Randn {
        mean: 0.0,
        stdev: 1.0,
    };
    let vm_src = VarMap::new();
    vm_src.get((4,), "w", init, DType::F32, &Device::Cpu)?;
    let vm_dest = VarMap::new();
    vm_dest.get((4,), "w", init, DType::F32, &Device::Cpu)?;

    let dest_before = vm_dest.data().lock().unwrap()["w"].as_tensor().copy()?;

    // tau = 0 leaves the target untouched.
    track(&vm_dest, &vm_src, 0.0)?;
    let dest_after = vm_dest.data().lock().unwrap()["w"].as_tensor().copy()?;
    assert!((dest_before - &dest_after)?.abs()?.sum(0)?.to_scalar::<f32>()? < 1e-6);

    // tau = 1 is a hard copy.
    track(&vm_dest, &vm_src, 1.0)?;
    let src = vm_src.data().lock().unwrap()["w"].as_tensor().copy()?;
    let dest = vm_dest.data().lock().unwrap()["w"].as_tensor().copy()?;
    assert!((src - dest)?.abs()?.sum(0)?.to_scalar::<f32>()? < 1e-6);

    Ok(())
}

#[test]
fn test_clip_grad_norm() -> Result<()> {
    use candle_core::Device;

    let var = Var::from_tensor(&Tensor::from_slice(&[3.0f32, 4.0], (2,), &Device::Cpu)?)?;
    let loss = (0.5 * var.as_tensor().sqr()?.sum_all()?)?;
    let mut grads = loss.backward()?;
    let vars = vec![var];

    // d(loss)/d(var) = var = [3, 4], norm 5.
    let norm = clip_grad_norm(&mut grads, &vars, 1.0)?;
    assert!((norm - 5.0).abs() < 1e-5);

    let clipped = grads.get(&vars[0]).unwrap();
    let clipped_norm = clipped.sqr()?.sum_all()?.to_scalar::<f32>()?.sqrt();
    assert!((clipped_norm - 1.0).abs() < 1e-3);

    Ok(())
}

#[test]
fn test_valid_mean() -> Result<()> {
    use candle_core::Device;

    let t = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], (4,), &Device::Cpu)?;
    let valid = Tensor::from_slice(&[1.0f32, 0.0, 1.0, 0.0], (4,), &Device::Cpu)?;

    let m = valid_mean(&t, None)?.to_scalar::<f32>()?;
    assert!((m - 2.5).abs() < 1e-6);

    let m = valid_mean(&t, Some(&valid))?.to_scalar::<f32>()?;
    assert!((m - 2.0).abs() < 1e-6);

    Ok(())
}
