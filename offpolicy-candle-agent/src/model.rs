//! Interfaces of the neural networks used by the agents.
use candle_core::Tensor;
use candle_nn::VarBuilder;

/// Neural network model not owning its [`VarMap`](candle_nn::VarMap)
/// internally.
pub trait SubModel1 {
    /// Configuration from which [`SubModel1`] is constructed.
    type Config;

    /// Input of the [`SubModel1`].
    type Input;

    /// Output of the [`SubModel1`].
    type Output;

    /// Builds [`SubModel1`] with [`VarBuilder`] and [`SubModel1::Config`].
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// A generalized forward function.
    fn forward(&self, input: &Self::Input) -> Self::Output;
}

/// Neural network model not owning its [`VarMap`](candle_nn::VarMap)
/// internally.
///
/// The difference from [`SubModel1`] is that this trait takes two inputs.
pub trait SubModel2 {
    /// Configuration from which [`SubModel2`] is constructed.
    type Config;

    /// Input of the [`SubModel2`].
    type Input1;

    /// Input of the [`SubModel2`].
    type Input2;

    /// Output of the [`SubModel2`].
    type Output;

    /// Builds [`SubModel2`].
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// A generalized forward function.
    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output;
}

/// The "now" or "next" input bundle handed to policy and value networks:
/// the observation plus the action and reward of the preceding step.
///
/// Feedforward networks conditioning only on the observation take a plain
/// [`Tensor`] input; the `From` impl below drops the previous-step extras
/// for them.
#[derive(Clone)]
pub struct AgentInputs {
    /// Observations.
    pub obs: Tensor,

    /// Actions of the preceding step.
    pub prev_act: Tensor,

    /// Rewards of the preceding step.
    pub prev_reward: Tensor,
}

impl AgentInputs {
    /// Creates the input bundle.
    pub fn new(obs: Tensor, prev_act: Tensor, prev_reward: Tensor) -> Self {
        Self {
            obs,
            prev_act,
            prev_reward,
        }
    }
}

impl From<AgentInputs> for Tensor {
    fn from(inputs: AgentInputs) -> Self {
        inputs.obs
    }
}
