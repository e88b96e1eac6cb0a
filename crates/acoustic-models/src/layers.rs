//! Слои с входом в формате channels-last: (batch, time, features).
//!
//! Conv1d и пулинг Candle работают в формате (batch, channels, time),
//! поэтому каждый слой транспонирует вход сам.

use candle_core::{Module, ModuleT, Result, Tensor, D};
use candle_nn::{BatchNorm, BatchNormConfig, Conv1d, Conv1dConfig, Linear, VarBuilder};
use tracing::debug;

use acoustic_core::{Activation, BorderMode, Conv1dGeometry};

/// Применить активацию.
pub fn activate(x: &Tensor, activation: Activation) -> Result<Tensor> {
    match activation {
        Activation::Tanh => x.tanh(),
        Activation::Relu => x.relu(),
        Activation::Sigmoid => candle_nn::ops::sigmoid(x),
        Activation::Linear => Ok(x.clone()),
    }
}

// -----------------------------------------------------------------------
// Conv1D
// -----------------------------------------------------------------------

/// Conv1D по оси времени с паддингом same/valid как в Keras.
///
/// Паддинг для `same` добавляется явно (асимметрично, лишний элемент справа),
/// поэтому длина выхода всегда совпадает с [`Conv1dGeometry::output_length`].
pub struct TemporalConv {
    conv: Conv1d,
    geometry: Conv1dGeometry,
    activation: Activation,
    in_channels: usize,
    filters: usize,
}

impl TemporalConv {
    pub fn load(
        in_channels: usize,
        filters: usize,
        geometry: Conv1dGeometry,
        activation: Activation,
        vb: VarBuilder,
    ) -> Result<Self> {
        let cfg = Conv1dConfig {
            padding: 0,
            stride: geometry.stride(),
            dilation: geometry.dilation(),
            groups: 1,
            ..Default::default()
        };
        let conv = candle_nn::conv1d(in_channels, filters, geometry.kernel_size(), cfg, vb)?;
        debug!(
            "Conv1D: {} → {} (kernel={}, stride={}, {})",
            in_channels,
            filters,
            geometry.kernel_size(),
            geometry.stride(),
            geometry.border_mode()
        );
        Ok(Self {
            conv,
            geometry,
            activation,
            in_channels,
            filters,
        })
    }

    /// (batch, time, in_channels) → (batch, time', filters).
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (_b, t, _c) = x.dims3()?;
        if self.geometry.border_mode() == BorderMode::Valid && t < self.geometry.effective_size() {
            candle_core::bail!(
                "Conv1D (valid): вход из {} фреймов короче ядра ({})",
                t,
                self.geometry.effective_size()
            );
        }

        let h = x.transpose(1, 2)?;
        let (left, right) = self.geometry.padding(t);
        let h = if left + right > 0 {
            h.pad_with_zeros(2, left, right)?
        } else {
            h
        };
        let h = self.conv.forward(&h.contiguous()?)?;
        activate(&h.transpose(1, 2)?, self.activation)
    }

    pub fn geometry(&self) -> Conv1dGeometry {
        self.geometry
    }

    pub fn filters(&self) -> usize {
        self.filters
    }

    pub fn param_count(&self) -> usize {
        self.filters * self.in_channels * self.geometry.kernel_size() + self.filters
    }
}

// -----------------------------------------------------------------------
// MaxPooling1D
// -----------------------------------------------------------------------

/// MaxPooling1D по оси времени.
pub struct MaxPool1d {
    geometry: Conv1dGeometry,
}

impl MaxPool1d {
    pub fn new(geometry: Conv1dGeometry) -> Self {
        Self { geometry }
    }

    /// (batch, time, channels) → (batch, time', channels).
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (_b, t, _c) = x.dims3()?;
        if self.geometry.border_mode() == BorderMode::Valid && t < self.geometry.kernel_size() {
            candle_core::bail!(
                "MaxPooling1D (valid): вход из {} фреймов короче окна ({})",
                t,
                self.geometry.kernel_size()
            );
        }

        let h = x.transpose(1, 2)?;
        // Повтор крайних значений вместо -inf: каждое окно на краю содержит
        // хотя бы один настоящий элемент, максимум не меняется.
        let (left, right) = self.geometry.padding(t);
        let h = if left + right > 0 {
            h.pad_with_same(2, left, right)?
        } else {
            h
        };

        // (batch, channels, time) → (batch, channels, 1, time) для max_pool2d
        let h = h.unsqueeze(2)?.contiguous()?;
        let h = h.max_pool2d_with_stride(
            (1, self.geometry.kernel_size()),
            (1, self.geometry.stride()),
        )?;
        h.squeeze(2)?.transpose(1, 2)
    }

    pub fn geometry(&self) -> Conv1dGeometry {
        self.geometry
    }
}

// -----------------------------------------------------------------------
// BatchNormalization
// -----------------------------------------------------------------------

/// BatchNorm по последнему измерению (Keras: eps=1e-3, momentum=0.99).
pub struct TimeBatchNorm {
    bn: BatchNorm,
    features: usize,
}

impl TimeBatchNorm {
    pub fn load(features: usize, vb: VarBuilder) -> Result<Self> {
        // momentum в Candle: вес нового батча, т.е. 1 - momentum Keras.
        let cfg = BatchNormConfig {
            eps: 1e-3,
            remove_mean: true,
            affine: true,
            momentum: 0.01,
        };
        let bn = candle_nn::batch_norm(features, cfg, vb)?;
        Ok(Self { bn, features })
    }

    /// (batch, time, features) → (batch, time, features).
    pub fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let h = x.transpose(1, 2)?.contiguous()?;
        let h = self.bn.forward_t(&h, train)?;
        h.transpose(1, 2)
    }

    pub fn features(&self) -> usize {
        self.features
    }

    /// gamma, beta, moving_mean, moving_variance.
    pub fn param_count(&self) -> usize {
        4 * self.features
    }
}

// -----------------------------------------------------------------------
// TimeDistributed(Dense) + softmax
// -----------------------------------------------------------------------

/// Выходная голова: TimeDistributed(Dense(output_dim)) → softmax.
pub struct OutputHead {
    dense: Linear,
    in_features: usize,
    output_dim: usize,
}

impl OutputHead {
    pub fn load(in_features: usize, output_dim: usize, vb: VarBuilder) -> Result<Self> {
        let dense = candle_nn::linear(in_features, output_dim, vb)?;
        Ok(Self {
            dense,
            in_features,
            output_dim,
        })
    }

    /// (batch, time, in_features) → (batch, time, output_dim), softmax по словарю.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let logits = self.dense.forward(x)?;
        candle_nn::ops::softmax(&logits, D::Minus1)
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn param_count(&self) -> usize {
        self.in_features * self.output_dim + self.output_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn vb_cpu(varmap: &VarMap) -> VarBuilder<'_> {
        VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu)
    }

    #[test]
    fn test_activate() {
        let x = Tensor::new(&[-1f32, 0.0, 2.0], &Device::Cpu).unwrap();
        let relu: Vec<f32> = activate(&x, Activation::Relu).unwrap().to_vec1().unwrap();
        assert_eq!(relu, vec![0.0, 0.0, 2.0]);
        let sig: Vec<f32> = activate(&x, Activation::Sigmoid).unwrap().to_vec1().unwrap();
        assert!((sig[1] - 0.5).abs() < 1e-6);
        let lin: Vec<f32> = activate(&x, Activation::Linear).unwrap().to_vec1().unwrap();
        assert_eq!(lin, vec![-1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_conv_output_length_matches_geometry() {
        let varmap = VarMap::new();
        let vb = vb_cpu(&varmap);
        for (i, mode) in [BorderMode::Same, BorderMode::Valid].into_iter().enumerate() {
            for stride in 1..4 {
                let geometry = Conv1dGeometry::new(5, mode, stride, 2).unwrap();
                let conv = TemporalConv::load(
                    6,
                    4,
                    geometry,
                    Activation::Relu,
                    vb.pp(format!("conv_{i}_{stride}")),
                )
                .unwrap();
                let x = Tensor::randn(0f32, 1.0, (2, 37, 6), &Device::Cpu).unwrap();
                let y = conv.forward(&x).unwrap();
                let expected = geometry.output_length(Some(37)).unwrap().unwrap() as usize;
                assert_eq!(y.dims(), &[2, expected, 4]);
            }
        }
    }

    #[test]
    fn test_conv_valid_rejects_short_input() {
        let varmap = VarMap::new();
        let geometry = Conv1dGeometry::conv(11, BorderMode::Valid, 1).unwrap();
        let conv = TemporalConv::load(3, 2, geometry, Activation::Relu, vb_cpu(&varmap)).unwrap();
        let x = Tensor::zeros((1, 5, 3), DType::F32, &Device::Cpu).unwrap();
        assert!(conv.forward(&x).is_err());
    }

    #[test]
    fn test_max_pool_same_keeps_length() {
        let pool = MaxPool1d::new(Conv1dGeometry::conv(2, BorderMode::Same, 1).unwrap());
        // (1, 4, 1): [1, 3, 2, 0] → окна [1,3] [3,2] [2,0] [0,0]
        let x = Tensor::new(&[1f32, 3.0, 2.0, 0.0], &Device::Cpu)
            .unwrap()
            .reshape((1, 4, 1))
            .unwrap();
        let y = pool.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 4, 1]);
        let values: Vec<f32> = y.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(values, vec![3.0, 3.0, 2.0, 0.0]);
    }

    #[test]
    fn test_batch_norm_eval_uses_running_stats() {
        let varmap = VarMap::new();
        let bn = TimeBatchNorm::load(3, vb_cpu(&varmap)).unwrap();
        let x = Tensor::ones((2, 4, 3), DType::F32, &Device::Cpu).unwrap();
        // running_mean = 0, running_var = 1 → x / sqrt(1 + eps)
        let y = bn.forward_t(&x, false).unwrap();
        let values: Vec<f32> = y.flatten_all().unwrap().to_vec1().unwrap();
        let expected = 1.0 / (1.0f32 + 1e-3).sqrt();
        assert!(values.iter().all(|v| (v - expected).abs() < 1e-5));
        assert_eq!(bn.param_count(), 12);
    }

    #[test]
    fn test_output_head_is_distribution() {
        let varmap = VarMap::new();
        let head = OutputHead::load(8, 29, vb_cpu(&varmap)).unwrap();
        let x = Tensor::randn(0f32, 1.0, (2, 5, 8), &Device::Cpu).unwrap();
        let y = head.forward(&x).unwrap();
        assert_eq!(y.dims(), &[2, 5, 29]);
        let sums: Vec<f32> = y.sum(D::Minus1).unwrap().flatten_all().unwrap().to_vec1().unwrap();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-5));
        assert_eq!(head.param_count(), 8 * 29 + 29);
    }
}
