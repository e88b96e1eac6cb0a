//! Bidirectional(GRU, concat) → TimeDistributed(Dense) → softmax.

use candle_core::Tensor;
use candle_nn::VarBuilder;

use acoustic_core::{
    AcousticModel, Activation, AmResult, Architecture, BidirectionalRnnConfig, ModelSummary,
};

use super::{check_features, head_summary, recurrent_summary, softmax_summary};
use crate::layers::OutputHead;
use crate::recurrent::{Bidirectional, GruLayer, Recurrent};

pub struct BidirectionalRnnModel {
    bidir_rnn: Bidirectional<GruLayer>,
    head: OutputHead,
    config: BidirectionalRnnConfig,
}

impl BidirectionalRnnModel {
    pub fn load(config: &BidirectionalRnnConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let bidir_rnn = Bidirectional::gru(
            config.input_dim,
            config.units,
            Activation::Tanh,
            vb.pp("bidir_rnn"),
        )?;
        let head =
            OutputHead::load(bidir_rnn.output_dim(), config.output_dim, vb.pp("time_dense"))?;
        Ok(Self {
            bidir_rnn,
            head,
            config: config.clone(),
        })
    }
}

impl AcousticModel for BidirectionalRnnModel {
    fn architecture(&self) -> Architecture {
        Architecture::BidirectionalRnn
    }

    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn output_dim(&self) -> usize {
        self.config.output_dim
    }

    fn forward_t(&self, features: &Tensor, _train: bool) -> AmResult<Tensor> {
        check_features(features, self.config.input_dim)?;
        let h = self.bidir_rnn.forward(features)?;
        Ok(self.head.forward(&h)?)
    }

    fn summary(&self) -> ModelSummary {
        let mut summary = ModelSummary::new(self.architecture(), self.config.input_dim);
        summary.push(recurrent_summary("bidir_rnn", &self.bidir_rnn));
        summary.push(head_summary(&self.head));
        summary.push(softmax_summary(self.config.output_dim));
        summary
    }
}
