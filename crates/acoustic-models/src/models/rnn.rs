//! GRU(units, activation) → BatchNorm → TimeDistributed(Dense) → softmax.

use candle_core::Tensor;
use candle_nn::VarBuilder;

use acoustic_core::{AcousticModel, AmResult, Architecture, ModelSummary, RnnConfig};

use super::{
    bn_summary, check_features, head_summary, recurrent_summary, softmax_summary, trace_shape,
};
use crate::layers::{OutputHead, TimeBatchNorm};
use crate::recurrent::{GruLayer, Recurrent};

pub struct RnnModel {
    rnn: GruLayer,
    bn_rnn: TimeBatchNorm,
    head: OutputHead,
    config: RnnConfig,
}

impl RnnModel {
    pub fn load(config: &RnnConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let rnn = GruLayer::load(config.input_dim, config.units, config.activation, vb.pp("rnn"))?;
        let bn_rnn = TimeBatchNorm::load(config.units, vb.pp("bn_rnn"))?;
        let head = OutputHead::load(config.units, config.output_dim, vb.pp("time_dense"))?;
        Ok(Self {
            rnn,
            bn_rnn,
            head,
            config: config.clone(),
        })
    }
}

impl AcousticModel for RnnModel {
    fn architecture(&self) -> Architecture {
        Architecture::Rnn
    }

    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn output_dim(&self) -> usize {
        self.config.output_dim
    }

    fn forward_t(&self, features: &Tensor, train: bool) -> AmResult<Tensor> {
        check_features(features, self.config.input_dim)?;
        let h = self.rnn.forward(features)?;
        trace_shape("rnn", &h);
        let h = self.bn_rnn.forward_t(&h, train)?;
        Ok(self.head.forward(&h)?)
    }

    fn summary(&self) -> ModelSummary {
        let mut summary = ModelSummary::new(self.architecture(), self.config.input_dim);
        summary.push(recurrent_summary("rnn", &self.rnn));
        summary.push(bn_summary("bn_rnn", &self.bn_rnn));
        summary.push(head_summary(&self.head));
        summary.push(softmax_summary(self.config.output_dim));
        summary
    }
}
