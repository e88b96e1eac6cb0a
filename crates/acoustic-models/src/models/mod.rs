//! Архитектуры акустических моделей.
//!
//! Каждая модель принимает признаки (batch, time, input_dim) и возвращает
//! softmax-вероятности (batch, time', output_dim). Имена весов совпадают с
//! именами слоёв Keras.

mod bidirectional;
mod cnn_rnn;
mod deep_rnn;
mod final_model;
mod rnn;
mod simple_rnn;

pub use bidirectional::BidirectionalRnnModel;
pub use cnn_rnn::CnnRnnModel;
pub use deep_rnn::DeepRnnModel;
pub use final_model::{FinalDeepModel, FinalModel};
pub use rnn::RnnModel;
pub use simple_rnn::SimpleRnnModel;

use candle_core::Tensor;
use tracing::debug;

use acoustic_core::{debug as am_debug, AmError, AmResult, LayerSummary};

use crate::layers::{OutputHead, TemporalConv, TimeBatchNorm};
use crate::recurrent::Recurrent;

/// Проверить форму входа: (batch, time, input_dim).
pub(crate) fn check_features(features: &Tensor, input_dim: usize) -> AmResult<()> {
    match features.dims() {
        [_, _, d] if *d == input_dim => Ok(()),
        dims => Err(AmError::Config(format!(
            "ожидается вход (batch, time, {input_dim}), получено {dims:?}"
        ))),
    }
}

/// Отладочный вывод формы после слоя (`ACOUSTIC_DEBUG=1`).
pub(crate) fn trace_shape(stage: &str, x: &Tensor) {
    if am_debug::enabled() {
        debug!("{stage}: {:?}", x.dims());
    }
}

pub(crate) fn recurrent_summary(name: impl Into<String>, layer: &impl Recurrent) -> LayerSummary {
    LayerSummary::new(name, layer.kind(), layer.output_dim(), layer.param_count())
}

pub(crate) fn softmax_summary(output_dim: usize) -> LayerSummary {
    LayerSummary::new("softmax", "Activation", output_dim, 0)
}

pub(crate) fn conv_summary(name: impl Into<String>, conv: &TemporalConv) -> LayerSummary {
    let summary = LayerSummary::new(name, "Conv1D", conv.filters(), conv.param_count());
    if conv.geometry().preserves_length() {
        summary
    } else {
        summary.reducing_time()
    }
}

pub(crate) fn bn_summary(name: impl Into<String>, bn: &TimeBatchNorm) -> LayerSummary {
    LayerSummary::new(name, "BatchNormalization", bn.features(), bn.param_count())
}

pub(crate) fn head_summary(head: &OutputHead) -> LayerSummary {
    LayerSummary::new(
        "time_dense",
        "TimeDistributed(Dense)",
        head.output_dim(),
        head.param_count(),
    )
}
