//! Единый trait для всех акустических моделей.

use candle_core::Tensor;

use crate::error::AmResult;
use crate::model_registry::Architecture;
use crate::types::ModelSummary;

/// Акустическая модель: признаки по фреймам → распределения по символам.
///
/// # Пример
/// ```ignore
/// let built = acoustic_models::build(&config, vb)?;
/// let probs = built.model.forward(&features)?; // (batch, time', output_dim)
/// let frames = built.output_length.frames(time);
/// ```
pub trait AcousticModel: Send {
    /// Архитектура модели.
    fn architecture(&self) -> Architecture;

    /// Размерность входных признаков.
    fn input_dim(&self) -> usize;

    /// Размер словаря на выходе (включая CTC blank).
    fn output_dim(&self) -> usize;

    /// Прямой проход.
    ///
    /// * `features`: (batch, time, input_dim).
    /// * `train`: режим обучения: dropout активен, BatchNorm считает
    ///   статистики по батчу.
    ///
    /// Возвращает softmax-вероятности (batch, time', output_dim).
    fn forward_t(&self, features: &Tensor, train: bool) -> AmResult<Tensor>;

    /// Прямой проход в режиме инференса.
    fn forward(&self, features: &Tensor) -> AmResult<Tensor> {
        self.forward_t(features, false)
    }

    /// Послойная сводка.
    fn summary(&self) -> ModelSummary;
}
