//! Конфигурации архитектур.
//!
//! `config.json` модели: это [`ArchitectureConfig`] с тегом `architecture`:
//!
//! ```json
//! {
//!   "architecture": "cnn_rnn",
//!   "input_dim": 161,
//!   "conv": { "filters": 200, "kernel_size": 11, "stride": 2, "border_mode": "valid" },
//!   "units": 200
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AmError, AmResult};
use crate::length::{BorderMode, Conv1dGeometry, LengthProjection};
use crate::model_registry::Architecture;
use crate::types::Activation;

/// Размер словаря по умолчанию: 28 символов + CTC blank.
pub const DEFAULT_OUTPUT_DIM: usize = 29;

/// Размерность спектрограммы (n_fft = 320 → 161 бин).
pub const SPECTROGRAM_DIM: usize = 161;

/// Размерность MFCC-признаков.
pub const MFCC_DIM: usize = 13;

fn default_output_dim() -> usize {
    DEFAULT_OUTPUT_DIM
}

fn default_dilation() -> usize {
    1
}

fn default_pool_size() -> usize {
    2
}

fn default_final_dropout() -> f32 {
    0.25
}

fn default_final_deep_dropout() -> f32 {
    0.2
}

fn default_final_deep_layers() -> usize {
    3
}

/// Параметры Conv1D по оси времени.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvConfig {
    /// Количество фильтров (выходных каналов).
    pub filters: usize,
    /// Ширина ядра.
    pub kernel_size: usize,
    /// Шаг свёртки.
    #[serde(alias = "conv_stride")]
    pub stride: usize,
    /// Режим паддинга.
    #[serde(alias = "conv_border_mode")]
    pub border_mode: BorderMode,
    #[serde(default = "default_dilation")]
    pub dilation: usize,
}

impl ConvConfig {
    /// Типичная свёртка: 200 фильтров, ядро 11, stride 2, valid.
    pub fn standard() -> Self {
        Self {
            filters: 200,
            kernel_size: 11,
            stride: 2,
            border_mode: BorderMode::Valid,
            dilation: 1,
        }
    }

    /// Геометрия окна (с проверкой параметров).
    pub fn geometry(&self) -> AmResult<Conv1dGeometry> {
        Conv1dGeometry::new(self.kernel_size, self.border_mode, self.stride, self.dilation)
    }
}

/// GRU(output_dim) → softmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleRnnConfig {
    pub input_dim: usize,
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
}

/// GRU(units, activation) → BatchNorm → Dense → softmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RnnConfig {
    pub input_dim: usize,
    pub units: usize,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
}

/// Conv1D → BatchNorm → SimpleRNN → BatchNorm → Dense → softmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CnnRnnConfig {
    pub input_dim: usize,
    pub conv: ConvConfig,
    pub units: usize,
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
}

/// [GRU → BatchNorm] × recur_layers → Dense → softmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepRnnConfig {
    pub input_dim: usize,
    pub units: usize,
    pub recur_layers: usize,
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
}

/// Bidirectional(GRU) → Dense → softmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidirectionalRnnConfig {
    pub input_dim: usize,
    pub units: usize,
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
}

/// Conv1D → MaxPool → BatchNorm → 2 × [GRU → BatchNorm → Dropout] → Dense → softmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalConfig {
    pub input_dim: usize,
    pub conv: ConvConfig,
    pub units: usize,
    /// Окно MaxPooling1D (stride 1, same).
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_final_dropout")]
    pub dropout: f32,
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
}

/// Conv1D → BatchNorm → N × [BiGRU → Dropout → BatchNorm] → Dense → softmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDeepConfig {
    pub input_dim: usize,
    pub conv: ConvConfig,
    pub units: usize,
    #[serde(default = "default_final_deep_layers")]
    pub recur_layers: usize,
    #[serde(default = "default_final_deep_dropout")]
    pub dropout: f32,
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
}

/// Конфигурация любой из архитектур.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "architecture", rename_all = "snake_case")]
pub enum ArchitectureConfig {
    SimpleRnn(SimpleRnnConfig),
    Rnn(RnnConfig),
    CnnRnn(CnnRnnConfig),
    DeepRnn(DeepRnnConfig),
    BidirectionalRnn(BidirectionalRnnConfig),
    Final(FinalConfig),
    FinalDeep(FinalDeepConfig),
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self::preset(Architecture::Final, SPECTROGRAM_DIM)
    }
}

impl ArchitectureConfig {
    /// Типичные гиперпараметры для архитектуры.
    pub fn preset(architecture: Architecture, input_dim: usize) -> Self {
        let units = 200;
        let output_dim = DEFAULT_OUTPUT_DIM;
        match architecture {
            Architecture::SimpleRnn => Self::SimpleRnn(SimpleRnnConfig { input_dim, output_dim }),
            Architecture::Rnn => Self::Rnn(RnnConfig {
                input_dim,
                units,
                activation: Activation::Relu,
                output_dim,
            }),
            Architecture::CnnRnn => Self::CnnRnn(CnnRnnConfig {
                input_dim,
                conv: ConvConfig::standard(),
                units,
                output_dim,
            }),
            Architecture::DeepRnn => Self::DeepRnn(DeepRnnConfig {
                input_dim,
                units,
                recur_layers: 2,
                output_dim,
            }),
            Architecture::BidirectionalRnn => {
                Self::BidirectionalRnn(BidirectionalRnnConfig { input_dim, units, output_dim })
            }
            Architecture::Final => Self::Final(FinalConfig {
                input_dim,
                conv: ConvConfig::standard(),
                units,
                pool_size: default_pool_size(),
                dropout: default_final_dropout(),
                output_dim,
            }),
            Architecture::FinalDeep => Self::FinalDeep(FinalDeepConfig {
                input_dim,
                conv: ConvConfig::standard(),
                units,
                recur_layers: default_final_deep_layers(),
                dropout: default_final_deep_dropout(),
                output_dim,
            }),
        }
    }

    /// Загрузить из JSON-файла.
    pub fn from_file(path: impl AsRef<Path>) -> AmResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        debug!(
            "Конфигурация {} из {:?}: input_dim={}, output_dim={}",
            config.architecture().as_str(),
            path,
            config.input_dim(),
            config.output_dim()
        );
        Ok(config)
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            Self::SimpleRnn(_) => Architecture::SimpleRnn,
            Self::Rnn(_) => Architecture::Rnn,
            Self::CnnRnn(_) => Architecture::CnnRnn,
            Self::DeepRnn(_) => Architecture::DeepRnn,
            Self::BidirectionalRnn(_) => Architecture::BidirectionalRnn,
            Self::Final(_) => Architecture::Final,
            Self::FinalDeep(_) => Architecture::FinalDeep,
        }
    }

    pub fn input_dim(&self) -> usize {
        match self {
            Self::SimpleRnn(c) => c.input_dim,
            Self::Rnn(c) => c.input_dim,
            Self::CnnRnn(c) => c.input_dim,
            Self::DeepRnn(c) => c.input_dim,
            Self::BidirectionalRnn(c) => c.input_dim,
            Self::Final(c) => c.input_dim,
            Self::FinalDeep(c) => c.input_dim,
        }
    }

    pub fn output_dim(&self) -> usize {
        match self {
            Self::SimpleRnn(c) => c.output_dim,
            Self::Rnn(c) => c.output_dim,
            Self::CnnRnn(c) => c.output_dim,
            Self::DeepRnn(c) => c.output_dim,
            Self::BidirectionalRnn(c) => c.output_dim,
            Self::Final(c) => c.output_dim,
            Self::FinalDeep(c) => c.output_dim,
        }
    }

    /// Свёрточная часть, если она есть.
    pub fn conv(&self) -> Option<&ConvConfig> {
        match self {
            Self::CnnRnn(c) => Some(&c.conv),
            Self::Final(c) => Some(&c.conv),
            Self::FinalDeep(c) => Some(&c.conv),
            _ => None,
        }
    }

    /// Проверить гиперпараметры.
    pub fn validate(&self) -> AmResult<()> {
        positive("input_dim", self.input_dim())?;
        positive("output_dim", self.output_dim())?;
        if let Some(conv) = self.conv() {
            positive("filters", conv.filters)?;
            conv.geometry()?;
        }
        match self {
            Self::SimpleRnn(_) => {}
            Self::Rnn(c) => positive("units", c.units)?,
            Self::CnnRnn(c) => positive("units", c.units)?,
            Self::DeepRnn(c) => {
                positive("units", c.units)?;
                positive("recur_layers", c.recur_layers)?;
            }
            Self::BidirectionalRnn(c) => positive("units", c.units)?,
            Self::Final(c) => {
                positive("units", c.units)?;
                positive("pool_size", c.pool_size)?;
                dropout_rate(c.dropout)?;
            }
            Self::FinalDeep(c) => {
                positive("units", c.units)?;
                positive("recur_layers", c.recur_layers)?;
                dropout_rate(c.dropout)?;
            }
        }
        Ok(())
    }

    /// Проекция длины по оси времени для этой архитектуры.
    pub fn length_projection(&self) -> AmResult<LengthProjection> {
        let projection = match self {
            Self::CnnRnn(c) => LengthProjection::identity().then(c.conv.geometry()?),
            Self::Final(c) => LengthProjection::identity()
                .then(c.conv.geometry()?)
                .then(pool_geometry(c.pool_size)?),
            Self::FinalDeep(c) => LengthProjection::identity().then(c.conv.geometry()?),
            _ => LengthProjection::identity(),
        };
        Ok(projection)
    }
}

/// Геометрия MaxPooling1D(pool_size, strides=1, padding=same).
pub fn pool_geometry(pool_size: usize) -> AmResult<Conv1dGeometry> {
    Conv1dGeometry::conv(pool_size, BorderMode::Same, 1)
}

fn positive(name: &str, value: usize) -> AmResult<()> {
    if value == 0 {
        return Err(AmError::InvalidArgument(format!("{name} должен быть > 0")));
    }
    Ok(())
}

fn dropout_rate(rate: f32) -> AmResult<()> {
    if !(0.0..1.0).contains(&rate) {
        return Err(AmError::InvalidArgument(format!(
            "dropout должен быть в [0, 1), получено {rate}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for arch in Architecture::all() {
            let config = ArchitectureConfig::preset(*arch, MFCC_DIM);
            config.validate().unwrap();
            assert_eq!(config.architecture(), *arch);
            assert_eq!(config.input_dim(), MFCC_DIM);
            assert_eq!(config.output_dim(), DEFAULT_OUTPUT_DIM);
            assert_eq!(config.conv().is_some(), arch.reduces_time());
        }
    }

    #[test]
    fn test_parse_tagged_json_with_defaults() {
        let json = r#"{
            "architecture": "cnn_rnn",
            "input_dim": 161,
            "conv": {
                "filters": 200,
                "kernel_size": 11,
                "conv_stride": 2,
                "conv_border_mode": "valid"
            },
            "units": 200
        }"#;
        let config: ArchitectureConfig = serde_json::from_str(json).unwrap();
        let ArchitectureConfig::CnnRnn(c) = &config else {
            panic!("ожидалась cnn_rnn, получено {:?}", config.architecture());
        };
        assert_eq!(c.output_dim, DEFAULT_OUTPUT_DIM);
        assert_eq!(c.conv.dilation, 1);
        assert_eq!(c.conv.border_mode, BorderMode::Valid);
        assert_eq!(config.length_projection().unwrap().apply(Some(100)).unwrap(), Some(45));
    }

    #[test]
    fn test_unsupported_border_mode_in_json() {
        let json = r#"{
            "architecture": "final_deep",
            "input_dim": 13,
            "conv": { "filters": 8, "kernel_size": 3, "stride": 1, "border_mode": "full" },
            "units": 16
        }"#;
        assert!(serde_json::from_str::<ArchitectureConfig>(json).is_err());
    }

    #[test]
    fn test_json_roundtrip_preserves_config() {
        let config = ArchitectureConfig::preset(Architecture::FinalDeep, SPECTROGRAM_DIM);
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"architecture\": \"final_deep\""));
        let parsed: ArchitectureConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file_reads_and_validates() {
        let dir =
            std::env::temp_dir().join(format!("acoustic-core-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let path = dir.join("config.json");
        let config = ArchitectureConfig::preset(Architecture::CnnRnn, MFCC_DIM);
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(ArchitectureConfig::from_file(&path).unwrap(), config);

        let bad = path.with_file_name("bad.json");
        let json = r#"{
            "architecture": "deep_rnn",
            "input_dim": 13,
            "units": 8,
            "recur_layers": 0
        }"#;
        std::fs::write(&bad, json).unwrap();
        let err = ArchitectureConfig::from_file(&bad).unwrap_err();
        assert!(matches!(err, AmError::InvalidArgument(_)));

        let missing = ArchitectureConfig::from_file(dir.join("missing.json")).unwrap_err();
        assert!(matches!(missing, AmError::Io(_)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = DeepRnnConfig {
            input_dim: 13,
            units: 32,
            recur_layers: 0,
            output_dim: 29,
        };
        let err = ArchitectureConfig::DeepRnn(config.clone()).validate().unwrap_err();
        assert!(matches!(err, AmError::InvalidArgument(_)));

        config.recur_layers = 2;
        config.units = 0;
        assert!(ArchitectureConfig::DeepRnn(config).validate().is_err());

        let mut fin = match ArchitectureConfig::preset(Architecture::Final, 13) {
            ArchitectureConfig::Final(c) => c,
            _ => unreachable!(),
        };
        fin.dropout = 1.0;
        assert!(ArchitectureConfig::Final(fin.clone()).validate().is_err());
        fin.dropout = 0.25;
        fin.conv.stride = 0;
        assert!(ArchitectureConfig::Final(fin).validate().is_err());
    }

    #[test]
    fn test_length_projection_per_architecture() {
        let rnn = ArchitectureConfig::preset(Architecture::BidirectionalRnn, 13);
        assert!(rnn.length_projection().unwrap().is_identity());

        // Пулинг same/stride 1 не меняет длину.
        let fin = ArchitectureConfig::preset(Architecture::Final, 13);
        let projection = fin.length_projection().unwrap();
        assert_eq!(projection.stages().len(), 2);
        assert_eq!(projection.apply(Some(100)).unwrap(), Some(45));
        assert_eq!(projection.apply(None).unwrap(), None);
    }
}
