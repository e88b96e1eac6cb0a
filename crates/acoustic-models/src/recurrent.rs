//! Рекуррентные слои: GRU, SimpleRNN и двунаправленная обёртка.
//!
//! Весовые ключи в формате PyTorch:
//! - `weight_ih`: [G*hidden, input]
//! - `weight_hh`: [G*hidden, hidden]
//! - `bias_ih`, `bias_hh`: [G*hidden]
//!
//! где G = 3 для GRU (гейты r, z, n) и G = 1 для SimpleRNN.
//! Все слои возвращают полную последовательность (return_sequences=True)
//! и стартуют с нулевого скрытого состояния.

use candle_core::{Result, Tensor, D};
use candle_nn::{Init, VarBuilder};
use tracing::debug;

use acoustic_core::Activation;

use crate::layers::activate;

/// Общий интерфейс рекуррентных слоёв.
pub trait Recurrent {
    /// (batch, time, input) → (batch, time, output_dim).
    fn forward(&self, x: &Tensor) -> Result<Tensor>;

    /// Ширина выхода на каждом шаге.
    fn output_dim(&self) -> usize;

    /// Количество скаляров в весах.
    fn param_count(&self) -> usize;

    /// Тип слоя для сводки.
    fn kind(&self) -> &'static str;
}

/// Загрузить четвёрку весов с равномерной инициализацией U(-1/√h, 1/√h).
fn load_weights(
    gates: usize,
    input_size: usize,
    hidden_size: usize,
    vb: &VarBuilder,
) -> Result<(Tensor, Tensor, Tensor, Tensor)> {
    let bound = 1.0 / (hidden_size as f64).sqrt();
    let init = Init::Uniform {
        lo: -bound,
        up: bound,
    };
    let rows = gates * hidden_size;
    let weight_ih = vb.get_with_hints((rows, input_size), "weight_ih", init)?;
    let weight_hh = vb.get_with_hints((rows, hidden_size), "weight_hh", init)?;
    let bias_ih = vb.get_with_hints(rows, "bias_ih", init)?;
    let bias_hh = vb.get_with_hints(rows, "bias_hh", init)?;
    Ok((weight_ih, weight_hh, bias_ih, bias_hh))
}

/// Входная проекция сразу для всех шагов: (batch, time, input) → (batch, time, G*hidden).
fn project_inputs(x: &Tensor, weight_ih: &Tensor, bias_ih: &Tensor) -> Result<Tensor> {
    let (b, t, input) = x.dims3()?;
    let rows = weight_ih.dim(0)?;
    x.reshape((b * t, input))?
        .matmul(&weight_ih.t()?)?
        .broadcast_add(bias_ih)?
        .reshape((b, t, rows))
}

/// Собрать выходы шагов в (batch, time, hidden).
fn stack_steps(outputs: &[Tensor], x: &Tensor, hidden_size: usize) -> Result<Tensor> {
    if outputs.is_empty() {
        let b = x.dim(0)?;
        return Tensor::zeros((b, 0, hidden_size), x.dtype(), x.device());
    }
    Tensor::stack(outputs, 1)
}

// -----------------------------------------------------------------------
// GRU
// -----------------------------------------------------------------------

/// GRU (вариант reset_after, как в PyTorch и CuDNN).
///
/// ```text
/// r = σ(W_ir x + b_ir + W_hr h + b_hr)
/// z = σ(W_iz x + b_iz + W_hz h + b_hz)
/// n = act(W_in x + b_in + r ⊙ (W_hn h + b_hn))
/// h = (1 - z) ⊙ n + z ⊙ h
/// ```
pub struct GruLayer {
    weight_ih: Tensor,
    weight_hh: Tensor,
    bias_ih: Tensor,
    bias_hh: Tensor,
    input_size: usize,
    hidden_size: usize,
    activation: Activation,
}

impl GruLayer {
    pub fn load(
        input_size: usize,
        hidden_size: usize,
        activation: Activation,
        vb: VarBuilder,
    ) -> Result<Self> {
        let (weight_ih, weight_hh, bias_ih, bias_hh) =
            load_weights(3, input_size, hidden_size, &vb)?;
        debug!("GRU: {} → {} ({})", input_size, hidden_size, activation);
        Ok(Self {
            weight_ih,
            weight_hh,
            bias_ih,
            bias_hh,
            input_size,
            hidden_size,
            activation,
        })
    }

    /// Один шаг: gx [batch, 3*hidden] (уже спроецированный вход), h [batch, hidden].
    fn step(&self, gx: &Tensor, h: &Tensor, weight_hh_t: &Tensor) -> Result<Tensor> {
        let hs = self.hidden_size;
        let gh = h.matmul(weight_hh_t)?.broadcast_add(&self.bias_hh)?;

        let r = candle_nn::ops::sigmoid(
            &(gx.narrow(D::Minus1, 0, hs)? + gh.narrow(D::Minus1, 0, hs)?)?,
        )?;
        let z = candle_nn::ops::sigmoid(
            &(gx.narrow(D::Minus1, hs, hs)? + gh.narrow(D::Minus1, hs, hs)?)?,
        )?;
        let n_in = (gx.narrow(D::Minus1, 2 * hs, hs)? + (r * gh.narrow(D::Minus1, 2 * hs, hs)?)?)?;
        let n = activate(&n_in, self.activation)?;

        // h_new = n + z ⊙ (h - n)
        let delta = (h - &n)?;
        n + (z * delta)?
    }
}

impl Recurrent for GruLayer {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (b, t, _) = x.dims3()?;
        let gx = project_inputs(x, &self.weight_ih, &self.bias_ih)?;
        let weight_hh_t = self.weight_hh.t()?;

        let mut h = Tensor::zeros((b, self.hidden_size), x.dtype(), x.device())?;
        let mut outputs = Vec::with_capacity(t);
        for step in 0..t {
            let gx_t = gx.narrow(1, step, 1)?.squeeze(1)?;
            h = self.step(&gx_t, &h, &weight_hh_t)?;
            outputs.push(h.clone());
        }
        stack_steps(&outputs, x, self.hidden_size)
    }

    fn output_dim(&self) -> usize {
        self.hidden_size
    }

    fn param_count(&self) -> usize {
        let rows = 3 * self.hidden_size;
        rows * self.input_size + rows * self.hidden_size + 2 * rows
    }

    fn kind(&self) -> &'static str {
        "GRU"
    }
}

// -----------------------------------------------------------------------
// SimpleRNN
// -----------------------------------------------------------------------

/// Элмановская RNN: `h = act(W_ih x + b_ih + W_hh h + b_hh)`.
pub struct SimpleRnnLayer {
    weight_ih: Tensor,
    weight_hh: Tensor,
    bias_ih: Tensor,
    bias_hh: Tensor,
    input_size: usize,
    hidden_size: usize,
    activation: Activation,
}

impl SimpleRnnLayer {
    pub fn load(
        input_size: usize,
        hidden_size: usize,
        activation: Activation,
        vb: VarBuilder,
    ) -> Result<Self> {
        let (weight_ih, weight_hh, bias_ih, bias_hh) =
            load_weights(1, input_size, hidden_size, &vb)?;
        debug!("SimpleRNN: {} → {} ({})", input_size, hidden_size, activation);
        Ok(Self {
            weight_ih,
            weight_hh,
            bias_ih,
            bias_hh,
            input_size,
            hidden_size,
            activation,
        })
    }
}

impl Recurrent for SimpleRnnLayer {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (b, t, _) = x.dims3()?;
        let gx = project_inputs(x, &self.weight_ih, &self.bias_ih)?;
        let weight_hh_t = self.weight_hh.t()?;

        let mut h = Tensor::zeros((b, self.hidden_size), x.dtype(), x.device())?;
        let mut outputs = Vec::with_capacity(t);
        for step in 0..t {
            let gx_t = gx.narrow(1, step, 1)?.squeeze(1)?;
            let gh = h.matmul(&weight_hh_t)?.broadcast_add(&self.bias_hh)?;
            h = activate(&(gx_t + gh)?, self.activation)?;
            outputs.push(h.clone());
        }
        stack_steps(&outputs, x, self.hidden_size)
    }

    fn output_dim(&self) -> usize {
        self.hidden_size
    }

    fn param_count(&self) -> usize {
        self.hidden_size * self.input_size
            + self.hidden_size * self.hidden_size
            + 2 * self.hidden_size
    }

    fn kind(&self) -> &'static str {
        "SimpleRNN"
    }
}

// -----------------------------------------------------------------------
// Bidirectional
// -----------------------------------------------------------------------

/// Развернуть последовательность по оси времени.
fn reverse_time(x: &Tensor) -> Result<Tensor> {
    let t = x.dim(1)?;
    let idx: Vec<u32> = (0..t as u32).rev().collect();
    let idx = Tensor::new(idx.as_slice(), x.device())?;
    x.index_select(&idx, 1)
}

/// Двунаправленная обёртка, merge_mode = "concat".
///
/// Ключи весов: `forward.*` и `backward.*`.
pub struct Bidirectional<R: Recurrent> {
    forward: R,
    backward: R,
}

impl<R: Recurrent> Bidirectional<R> {
    pub fn new(forward: R, backward: R) -> Self {
        Self { forward, backward }
    }
}

impl Bidirectional<GruLayer> {
    pub fn gru(
        input_size: usize,
        hidden_size: usize,
        activation: Activation,
        vb: VarBuilder,
    ) -> Result<Self> {
        let forward = GruLayer::load(input_size, hidden_size, activation, vb.pp("forward"))?;
        let backward = GruLayer::load(input_size, hidden_size, activation, vb.pp("backward"))?;
        Ok(Self::new(forward, backward))
    }
}

impl<R: Recurrent> Recurrent for Bidirectional<R> {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let fwd = self.forward.forward(x)?;
        if x.dim(1)? == 0 {
            let bwd = self.backward.forward(x)?;
            return Tensor::cat(&[&fwd, &bwd], D::Minus1);
        }
        let bwd = self.backward.forward(&reverse_time(x)?)?;
        let bwd = reverse_time(&bwd)?;
        Tensor::cat(&[&fwd, &bwd], D::Minus1)
    }

    fn output_dim(&self) -> usize {
        self.forward.output_dim() + self.backward.output_dim()
    }

    fn param_count(&self) -> usize {
        self.forward.param_count() + self.backward.param_count()
    }

    fn kind(&self) -> &'static str {
        "Bidirectional"
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

    fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
        (a - b)
            .unwrap()
            .abs()
            .unwrap()
            .flatten_all()
            .unwrap()
            .max(0)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap()
    }

    #[test]
    fn test_gru_shapes_and_params() {
        let varmap = VarMap::new();
        let gru = GruLayer::load(13, 16, Activation::Tanh, vb_cpu(&varmap)).unwrap();
        let x = Tensor::randn(0f32, 1.0, (2, 9, 13), &Device::Cpu).unwrap();
        let y = gru.forward(&x).unwrap();
        assert_eq!(y.dims(), &[2, 9, 16]);
        assert_eq!(gru.param_count(), 3 * (13 * 16 + 16 * 16 + 2 * 16));

        let stored: usize = varmap.all_vars().iter().map(|v| v.elem_count()).sum();
        assert_eq!(stored, gru.param_count());
    }

    #[test]
    fn test_gru_is_causal() {
        // Выход на шаге t не зависит от входов после t.
        let varmap = VarMap::new();
        let gru = GruLayer::load(4, 8, Activation::Tanh, vb_cpu(&varmap)).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 6, 4), &Device::Cpu).unwrap();
        let prefix = x.narrow(1, 0, 3).unwrap();

        let full = gru.forward(&x).unwrap().narrow(1, 0, 3).unwrap();
        let short = gru.forward(&prefix).unwrap();
        assert!(max_abs_diff(&full, &short) < 1e-5);
    }

    #[test]
    fn test_gru_zero_weights_keep_state_at_half_mix() {
        // При нулевых весах: r = z = 0.5, n = tanh(0) = 0, h = 0.5 * h_prev = 0.
        let varmap = VarMap::new();
        let gru = GruLayer::load(3, 5, Activation::Tanh, vb_cpu(&varmap)).unwrap();
        for var in varmap.all_vars() {
            var.set(&var.as_tensor().zeros_like().unwrap()).unwrap();
        }
        let x = Tensor::randn(0f32, 1.0, (1, 4, 3), &Device::Cpu).unwrap();
        let y = gru.forward(&x).unwrap();
        let values: Vec<f32> = y.flatten_all().unwrap().to_vec1().unwrap();
        assert!(values.iter().all(|v| v.abs() < 1e-7));
    }

    #[test]
    fn test_simple_rnn_relu_non_negative() {
        let varmap = VarMap::new();
        let rnn = SimpleRnnLayer::load(6, 10, Activation::Relu, vb_cpu(&varmap)).unwrap();
        let x = Tensor::randn(0f32, 1.0, (3, 7, 6), &Device::Cpu).unwrap();
        let y = rnn.forward(&x).unwrap();
        assert_eq!(y.dims(), &[3, 7, 10]);
        let min = y.flatten_all().unwrap().min(0).unwrap().to_scalar::<f32>().unwrap();
        assert!(min >= 0.0);
        assert_eq!(rnn.param_count(), 10 * 6 + 10 * 10 + 20);
    }

    #[test]
    fn test_empty_sequence() {
        let varmap = VarMap::new();
        let gru = GruLayer::load(4, 8, Activation::Tanh, vb_cpu(&varmap)).unwrap();
        let x = Tensor::zeros((2, 0, 4), DType::F32, &Device::Cpu).unwrap();
        assert_eq!(gru.forward(&x).unwrap().dims(), &[2, 0, 8]);
    }

    #[test]
    fn test_bidirectional_backward_reads_reversed_input() {
        let varmap = VarMap::new();
        let vb = vb_cpu(&varmap);
        let bi = Bidirectional::gru(4, 6, Activation::Tanh, vb.pp("bi")).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 5, 4), &Device::Cpu).unwrap();
        let y = bi.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 5, 12]);
        assert_eq!(bi.output_dim(), 12);

        // Обратная половина на последнем шаге = backward-GRU после одного шага
        // по последнему фрейму.
        let last = x.narrow(1, 4, 1).unwrap();
        let one_step = bi.backward.forward(&last).unwrap();
        let bwd_last = y.narrow(1, 4, 1).unwrap().narrow(2, 6, 6).unwrap();
        assert!(max_abs_diff(&one_step, &bwd_last) < 1e-5);

        // Прямая половина совпадает с forward-GRU.
        let fwd = bi.forward.forward(&x).unwrap();
        let fwd_half = y.narrow(2, 0, 6).unwrap();
        assert!(max_abs_diff(&fwd, &fwd_half) < 1e-5);
    }
}
