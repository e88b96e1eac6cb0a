//! Составные модели: свёрточный фронтенд + несколько рекуррентных блоков
//! с BatchNorm и Dropout.
//!
//! - [`FinalModel`]: Conv1D → MaxPool → BN → 2 × [GRU → BN → Dropout]
//! - [`FinalDeepModel`]: Conv1D → BN → N × [BiGRU → Dropout → BN]
//!
//! Обе завершаются TimeDistributed(Dense) → softmax.

use candle_core::{ModuleT, Tensor};
use candle_nn::{Dropout, VarBuilder};

use acoustic_core::config::pool_geometry;
use acoustic_core::{
    AcousticModel, Activation, AmError, AmResult, Architecture, FinalConfig, FinalDeepConfig,
    LayerSummary, ModelSummary,
};

use super::{
    bn_summary, check_features, conv_summary, head_summary, recurrent_summary, softmax_summary,
    trace_shape,
};
use crate::layers::{MaxPool1d, OutputHead, TemporalConv, TimeBatchNorm};
use crate::recurrent::{Bidirectional, GruLayer, Recurrent};

/// Количество GRU-блоков в [`FinalModel`].
const FINAL_RECUR_LAYERS: usize = 2;

// -----------------------------------------------------------------------
// FinalModel
// -----------------------------------------------------------------------

/// Рекуррентный блок: GRU → BatchNorm → Dropout.
struct GruBlock {
    rnn: GruLayer,
    bn: TimeBatchNorm,
}

pub struct FinalModel {
    conv: TemporalConv,
    pool: MaxPool1d,
    bn_conv: TimeBatchNorm,
    blocks: Vec<GruBlock>,
    dropout: Dropout,
    head: OutputHead,
    config: FinalConfig,
}

impl FinalModel {
    pub fn load(config: &FinalConfig, vb: VarBuilder) -> AmResult<Self> {
        let filters = config.conv.filters;
        let conv = TemporalConv::load(
            config.input_dim,
            filters,
            config.conv.geometry()?,
            Activation::Relu,
            vb.pp("conv1d"),
        )?;
        let pool = MaxPool1d::new(pool_geometry(config.pool_size)?);
        let bn_conv = TimeBatchNorm::load(filters, vb.pp("bn_conv_1d"))?;

        let mut blocks = Vec::with_capacity(FINAL_RECUR_LAYERS);
        let mut in_dim = filters;
        for i in 1..=FINAL_RECUR_LAYERS {
            let rnn = GruLayer::load(
                in_dim,
                config.units,
                Activation::Relu,
                vb.pp(format!("rnn_{i}")),
            )?;
            let bn = TimeBatchNorm::load(config.units, vb.pp(format!("bn_rnn_{i}")))?;
            blocks.push(GruBlock { rnn, bn });
            in_dim = config.units;
        }
        let head = OutputHead::load(config.units, config.output_dim, vb.pp("time_dense"))?;

        Ok(Self {
            conv,
            pool,
            bn_conv,
            blocks,
            dropout: Dropout::new(config.dropout),
            head,
            config: config.clone(),
        })
    }
}

impl AcousticModel for FinalModel {
    fn architecture(&self) -> Architecture {
        Architecture::Final
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
        let h = self.pool.forward(&h)?;
        let mut h = self.bn_conv.forward_t(&h, train)?;

        for (i, block) in self.blocks.iter().enumerate() {
            h = block.rnn.forward(&h)?;
            h = block.bn.forward_t(&h, train)?;
            h = self.dropout.forward_t(&h, train)?;
            trace_shape(&format!("rnn_{}", i + 1), &h);
        }

        Ok(self.head.forward(&h)?)
    }

    fn summary(&self) -> ModelSummary {
        let mut summary = ModelSummary::new(self.architecture(), self.config.input_dim);
        summary.push(conv_summary("conv1d", &self.conv));
        let mut pool = LayerSummary::new("max_pooling1d", "MaxPooling1D", self.conv.filters(), 0);
        if !self.pool.geometry().preserves_length() {
            pool = pool.reducing_time();
        }
        summary.push(pool);
        summary.push(bn_summary("bn_conv_1d", &self.bn_conv));
        for (i, block) in self.blocks.iter().enumerate() {
            let n = i + 1;
            summary.push(recurrent_summary(format!("rnn_{n}"), &block.rnn));
            summary.push(bn_summary(format!("bn_rnn_{n}"), &block.bn));
            summary.push(LayerSummary::new(
                format!("dropout_{n}"),
                "Dropout",
                self.config.units,
                0,
            ));
        }
        summary.push(head_summary(&self.head));
        summary.push(softmax_summary(self.config.output_dim));
        summary
    }
}

// -----------------------------------------------------------------------
// FinalDeepModel
// -----------------------------------------------------------------------

/// Двунаправленный блок: BiGRU → Dropout → BatchNorm.
struct BiGruBlock {
    rnn: Bidirectional<GruLayer>,
    bn: TimeBatchNorm,
}

pub struct FinalDeepModel {
    conv: TemporalConv,
    bn_conv: TimeBatchNorm,
    blocks: Vec<BiGruBlock>,
    dropout: Dropout,
    head: OutputHead,
    config: FinalDeepConfig,
}

impl FinalDeepModel {
    pub fn load(config: &FinalDeepConfig, vb: VarBuilder) -> AmResult<Self> {
        if config.recur_layers == 0 {
            return Err(AmError::InvalidArgument(
                "final_deep: recur_layers должен быть > 0".into(),
            ));
        }

        let filters = config.conv.filters;
        let conv = TemporalConv::load(
            config.input_dim,
            filters,
            config.conv.geometry()?,
            Activation::Relu,
            vb.pp("cnn_1d"),
        )?;
        let bn_conv = TimeBatchNorm::load(filters, vb.pp("batch_norm_cnn"))?;

        let mut blocks = Vec::with_capacity(config.recur_layers);
        let mut in_dim = filters;
        for i in 1..=config.recur_layers {
            let rnn = Bidirectional::gru(
                in_dim,
                config.units,
                Activation::Relu,
                vb.pp(format!("rnn{i}")),
            )?;
            let bn = TimeBatchNorm::load(rnn.output_dim(), vb.pp(format!("bn_rnn{i}")))?;
            in_dim = rnn.output_dim();
            blocks.push(BiGruBlock { rnn, bn });
        }
        let head = OutputHead::load(in_dim, config.output_dim, vb.pp("time_dense"))?;

        Ok(Self {
            conv,
            bn_conv,
            blocks,
            dropout: Dropout::new(config.dropout),
            head,
            config: config.clone(),
        })
    }
}

impl AcousticModel for FinalDeepModel {
    fn architecture(&self) -> Architecture {
        Architecture::FinalDeep
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
        trace_shape("cnn_1d", &h);
        let mut h = self.bn_conv.forward_t(&h, train)?;

        for (i, block) in self.blocks.iter().enumerate() {
            h = block.rnn.forward(&h)?;
            h = self.dropout.forward_t(&h, train)?;
            h = block.bn.forward_t(&h, train)?;
            trace_shape(&format!("rnn{}", i + 1), &h);
        }

        Ok(self.head.forward(&h)?)
    }

    fn summary(&self) -> ModelSummary {
        let mut summary = ModelSummary::new(self.architecture(), self.config.input_dim);
        summary.push(conv_summary("cnn_1d", &self.conv));
        summary.push(bn_summary("batch_norm_cnn", &self.bn_conv));
        for (i, block) in self.blocks.iter().enumerate() {
            let n = i + 1;
            summary.push(recurrent_summary(format!("rnn{n}"), &block.rnn));
            summary.push(LayerSummary::new(
                format!("dropout_rnn{n}"),
                "Dropout",
                block.rnn.output_dim(),
                0,
            ));
            summary.push(bn_summary(format!("bn_rnn{n}"), &block.bn));
        }
        summary.push(head_summary(&self.head));
        summary.push(softmax_summary(self.config.output_dim));
        summary
    }
}
