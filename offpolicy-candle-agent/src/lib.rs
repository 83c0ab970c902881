//! Off-policy training loops implemented with [candle](https://crates.io/crates/candle-core).
//!
//! This crate provides the gradient-based half of the training stack: the
//! [`ddpg`] and [`sac`] optimization loops, consuming batches from the replay
//! buffers of [`offpolicy_core`], plus the pieces they are built from
//! (submodel traits, optimizer wrapper, target-network tracking, tensor
//! column storage).
pub mod ddpg;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod sac;
mod tensor_batch;
pub mod util;
use serde::{Deserialize, Serialize};
pub use tensor_batch::TensorBatch;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support
/// serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl From<Device> for candle_core::Device {
    fn from(device: Device) -> Self {
        match device {
            Device::Cpu => candle_core::Device::Cpu,
            Device::Cuda(n) => candle_core::Device::new_cuda(n).unwrap(),
        }
    }
}
