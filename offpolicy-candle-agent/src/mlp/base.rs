use super::{mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`], including the
/// output layer.
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut in_out_pairs: Vec<(i64, i64)> = (0..config.units.len() - 1)
        .map(|i| (config.units[i], config.units[i + 1]))
        .collect();
    in_out_pairs.insert(0, (config.in_dim, config.units[0]));
    in_out_pairs.push((*config.units.last().unwrap(), config.out_dim));
    let vs = vs.pp(prefix);

    Ok(in_out_pairs
        .iter()
        .enumerate()
        .map(|(i, &(in_dim, out_dim))| {
            linear(in_dim as _, out_dim as _, vs.pp(format!("ln{}", i))).unwrap()
        })
        .collect())
}

/// Multilayer perceptron with ReLU activation function.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

fn _build(vs: VarBuilder, config: MlpConfig) -> Mlp {
    let device = vs.device().clone();
    let layers = create_linear_layers("mlp", vs, &config).unwrap();

    Mlp {
        config,
        device,
        layers,
    }
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Tensor {
        let xs = xs.to_device(&self.device).unwrap();
        let xs = mlp_forward(xs, &self.layers);

        match self.config.activation_out {
            false => xs,
            true => xs.relu().unwrap(),
        }
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        _build(vs, config)
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output {
        let input1: Tensor = input1.to_device(&self.device).unwrap();
        let input2: Tensor = input2.to_device(&self.device).unwrap();
        let input = Tensor::cat(&[input1, input2], D::Minus1).unwrap();
        let xs = mlp_forward(input, &self.layers);

        match self.config.activation_out {
            false => xs,
            true => xs.relu().unwrap(),
        }
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        _build(vs, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::{VarBuilder, VarMap};

    #[test]
    fn forward_shapes() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp: Mlp = SubModel1::build(vb, MlpConfig::new(3, vec![8, 8], 2, false));

        let xs = Tensor::zeros((5, 3), DType::F32, &Device::Cpu)?;
        let ys = SubModel1::forward(&mlp, &xs);
        assert_eq!(ys.dims(), [5, 2]);
        Ok(())
    }

    #[test]
    fn forward2_concatenates_inputs() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp: Mlp = SubModel2::build(vb, MlpConfig::new(5, vec![8], 1, false));

        let obs = Tensor::zeros((4, 3), DType::F32, &Device::Cpu)?;
        let act = Tensor::zeros((4, 2), DType::F32, &Device::Cpu)?;
        let ys = SubModel2::forward(&mlp, &obs, &act);
        assert_eq!(ys.dims(), [4, 1]);
        Ok(())
    }
}
