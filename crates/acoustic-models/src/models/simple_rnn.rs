//! GRU(output_dim) → softmax.

use candle_core::{Tensor, D};
use candle_nn::VarBuilder;

use acoustic_core::{
    AcousticModel, Activation, AmResult, Architecture, ModelSummary, SimpleRnnConfig,
};

use super::{check_features, recurrent_summary, softmax_summary};
use crate::recurrent::{GruLayer, Recurrent};

/// Самая простая модель: один GRU-слой шириной в словарь.
pub struct SimpleRnnModel {
    rnn: GruLayer,
    config: SimpleRnnConfig,
}

impl SimpleRnnModel {
    pub fn load(config: &SimpleRnnConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let rnn = GruLayer::load(
            config.input_dim,
            config.output_dim,
            Activation::Tanh,
            vb.pp("rnn"),
        )?;
        Ok(Self {
            rnn,
            config: config.clone(),
        })
    }
}

impl AcousticModel for SimpleRnnModel {
    fn architecture(&self) -> Architecture {
        Architecture::SimpleRnn
    }

    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn output_dim(&self) -> usize {
        self.config.output_dim
    }

    fn forward_t(&self, features: &Tensor, _train: bool) -> AmResult<Tensor> {
        check_features(features, self.config.input_dim)?;
        let h = self.rnn.forward(features)?;
        Ok(candle_nn::ops::softmax(&h, D::Minus1)?)
    }

    fn summary(&self) -> ModelSummary {
        let mut summary = ModelSummary::new(self.architecture(), self.config.input_dim);
        summary.push(recurrent_summary("rnn", &self.rnn));
        summary.push(softmax_summary(self.config.output_dim));
        summary
    }
}
