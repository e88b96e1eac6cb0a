//! Conv1D → BatchNorm → SimpleRNN → BatchNorm → TimeDistributed(Dense) → softmax.

use candle_core::Tensor;
use candle_nn::VarBuilder;

use acoustic_core::{AcousticModel, Activation, AmResult, Architecture, CnnRnnConfig, ModelSummary};

use super::{
    bn_summary, check_features, conv_summary, head_summary, recurrent_summary, softmax_summary,
    trace_shape,
};
use crate::layers::{OutputHead, TemporalConv, TimeBatchNorm};
use crate::recurrent::{Recurrent, SimpleRnnLayer};

/// Свёрточный фронтенд + простая RNN.
///
/// Длина выхода по времени определяется свёрткой (см. `conv.geometry()`).
pub struct CnnRnnModel {
    conv: TemporalConv,
    bn_conv: TimeBatchNorm,
    rnn: SimpleRnnLayer,
    bn_rnn: TimeBatchNorm,
    head: OutputHead,
    config: CnnRnnConfig,
}

impl CnnRnnModel {
    pub fn load(config: &CnnRnnConfig, vb: VarBuilder) -> AmResult<Self> {
        let geometry = config.conv.geometry()?;
        let filters = config.conv.filters;

        let conv = TemporalConv::load(
            config.input_dim,
            filters,
            geometry,
            Activation::Relu,
            vb.pp("conv1d"),
        )?;
        let bn_conv = TimeBatchNorm::load(filters, vb.pp("bn_conv_1d"))?;
        let rnn = SimpleRnnLayer::load(filters, config.units, Activation::Relu, vb.pp("rnn"))?;
        let bn_rnn = TimeBatchNorm::load(config.units, vb.pp("bn_rnn"))?;
        let head = OutputHead::load(config.units, config.output_dim, vb.pp("time_dense"))?;

        Ok(Self {
            conv,
            bn_conv,
            rnn,
            bn_rnn,
            head,
            config: config.clone(),
        })
    }
}

impl AcousticModel for CnnRnnModel {
    fn architecture(&self) -> Architecture {
        Architecture::CnnRnn
    }

    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn output_dim(&self) -> usize {
        self.config.output_dim
    }

    fn forward_t(&self, features: &Tensor, train: bool) -> AmResult<Tensor> {
        check_features(features, self.config.input_dim)?;

        let h = self.conv.forward(features)?;
        trace_shape("conv1d", &h);
        let h = self.bn_conv.forward_t(&h, train)?;

        let h = self.rnn.forward(&h)?;
        trace_shape("rnn", &h);
        let h = self.bn_rnn.forward_t(&h, train)?;

        Ok(self.head.forward(&h)?)
    }

    fn summary(&self) -> ModelSummary {
        let mut summary = ModelSummary::new(self.architecture(), self.config.input_dim);
        summary.push(conv_summary("conv1d", &self.conv));
        summary.push(bn_summary("bn_conv_1d", &self.bn_conv));
        summary.push(recurrent_summary("rnn", &self.rnn));
        summary.push(bn_summary("bn_rnn", &self.bn_rnn));
        summary.push(head_summary(&self.head));
        summary.push(softmax_summary(self.config.output_dim));
        summary
    }
}
