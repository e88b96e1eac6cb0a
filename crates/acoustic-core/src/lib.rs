//! # acoustic-core
//!
//! Базовые типы, конфигурации и ошибки для акустических моделей.
//!
//! - Арифметика длины по оси времени ([`cnn_output_length`], [`LengthProjection`])
//! - Конфигурации архитектур ([`ArchitectureConfig`])
//! - Унифицированная обработка ошибок через [`AmError`]
//! - Trait [`AcousticModel`]: единый интерфейс для всех архитектур
//! - Реестр архитектур [`Architecture`]

pub mod config;
pub mod debug;
pub mod error;
pub mod length;
pub mod model_registry;
pub mod traits;
pub mod types;

pub use config::{
    ArchitectureConfig, BidirectionalRnnConfig, CnnRnnConfig, ConvConfig, DeepRnnConfig,
    FinalConfig, FinalDeepConfig, RnnConfig, SimpleRnnConfig,
};
pub use config::{DEFAULT_OUTPUT_DIM, MFCC_DIM, SPECTROGRAM_DIM};
pub use error::{AmError, AmResult};
pub use length::{cnn_output_length, BorderMode, Conv1dGeometry, LengthProjection};
pub use model_registry::Architecture;
pub use traits::AcousticModel;
pub use types::{Activation, LayerSummary, ModelSummary};
