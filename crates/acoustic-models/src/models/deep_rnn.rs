//! [GRU(sigmoid) → BatchNorm] × recur_layers → TimeDistributed(Dense) → softmax.

use candle_core::Tensor;
use candle_nn::VarBuilder;

use acoustic_core::{
    AcousticModel, Activation, AmError, AmResult, Architecture, DeepRnnConfig, ModelSummary,
};

use super::{
    bn_summary, check_features, head_summary, recurrent_summary, softmax_summary, trace_shape,
};
use crate::layers::{OutputHead, TimeBatchNorm};
use crate::recurrent::{GruLayer, Recurrent};

/// Стек GRU-слоёв; ключи весов `rnn{i}` и `bn_rnn{i}`.
pub struct DeepRnnModel {
    layers: Vec<(GruLayer, TimeBatchNorm)>,
    head: OutputHead,
    config: DeepRnnConfig,
}

impl DeepRnnModel {
    pub fn load(config: &DeepRnnConfig, vb: VarBuilder) -> AmResult<Self> {
        if config.recur_layers == 0 {
            return Err(AmError::InvalidArgument(
                "deep_rnn: recur_layers должен быть > 0".into(),
            ));
        }

        let mut layers = Vec::with_capacity(config.recur_layers);
        let mut in_dim = config.input_dim;
        for i in 0..config.recur_layers {
            let rnn = GruLayer::load(
                in_dim,
                config.units,
                Activation::Sigmoid,
                vb.pp(format!("rnn{i}")),
            )?;
            let bn = TimeBatchNorm::load(config.units, vb.pp(format!("bn_rnn{i}")))?;
            layers.push((rnn, bn));
            in_dim = config.units;
        }
        let head = OutputHead::load(config.units, config.output_dim, vb.pp("time_dense"))?;

        Ok(Self {
            layers,
            head,
            config: config.clone(),
        })
    }
}

impl AcousticModel for DeepRnnModel {
    fn architecture(&self) -> Architecture {
        Architecture::DeepRnn
    }

    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn output_dim(&self) -> usize {
        self.config.output_dim
    }

    fn forward_t(&self, features: &Tensor, train: bool) -> AmResult<Tensor> {
        check_features(features, self.config.input_dim)?;

        let mut h = features.clone();
        for (i, (rnn, bn)) in self.layers.iter().enumerate() {
            h = rnn.forward(&h)?;
            h = bn.forward_t(&h, train)?;
            trace_shape(&format!("rnn{i}"), &h);
        }

        Ok(self.head.forward(&h)?)
    }

    fn summary(&self) -> ModelSummary {
        let mut summary = ModelSummary::new(self.architecture(), self.config.input_dim);
        for (i, (rnn, bn)) in self.layers.iter().enumerate() {
            summary.push(recurrent_summary(format!("rnn{i}"), rnn));
            summary.push(bn_summary(format!("bn_rnn{i}"), bn));
        }
        summary.push(head_summary(&self.head));
        summary.push(softmax_summary(self.config.output_dim));
        summary
    }
}
