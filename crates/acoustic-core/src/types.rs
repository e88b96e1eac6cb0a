//! Общие типы: функции активации и сводка модели.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AmError;
use crate::model_registry::Architecture;

// ---------------------------------------------------------------------------
// Активации
// ---------------------------------------------------------------------------

/// Функция активации слоя (имена как в Keras).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Tanh,
    Relu,
    Sigmoid,
    /// Тождественная функция.
    Linear,
}

impl Activation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Tanh => "tanh",
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Linear => "linear",
        }
    }
}

impl FromStr for Activation {
    type Err = AmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tanh" => Ok(Activation::Tanh),
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "linear" => Ok(Activation::Linear),
            other => Err(AmError::InvalidArgument(format!(
                "неподдерживаемая активация '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Сводка модели
// ---------------------------------------------------------------------------

/// Один слой в сводке.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSummary {
    /// Имя слоя (префикс весов).
    pub name: String,
    /// Тип слоя (`Conv1D`, `GRU`, `BatchNormalization`, ...).
    pub kind: String,
    /// Ширина признаков на выходе.
    pub output_features: usize,
    /// Количество скаляров в весах слоя.
    pub params: usize,
    /// Меняет ли слой ось времени.
    pub reduces_time: bool,
}

impl LayerSummary {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        output_features: usize,
        params: usize,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            output_features,
            params,
            reduces_time: false,
        }
    }

    pub fn reducing_time(mut self) -> Self {
        self.reduces_time = true;
        self
    }
}

/// Сводка по слоям, аналог `model.summary()` из Keras.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub architecture: Architecture,
    pub input_dim: usize,
    pub layers: Vec<LayerSummary>,
}

impl ModelSummary {
    pub fn new(architecture: Architecture, input_dim: usize) -> Self {
        Self {
            architecture,
            input_dim,
            layers: Vec::new(),
        }
    }

    pub fn push(&mut self, layer: LayerSummary) {
        self.layers.push(layer);
    }

    /// Общее количество параметров.
    pub fn total_params(&self) -> usize {
        self.layers.iter().map(|l| l.params).sum()
    }

    /// Ширина выхода последнего слоя.
    pub fn output_features(&self) -> usize {
        self.layers
            .last()
            .map(|l| l.output_features)
            .unwrap_or(self.input_dim)
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model: {} ({})", self.architecture, self.architecture.as_str())?;
        writeln!(f, "{:<28} {:<22} {:>14}", "Layer (type)", "Output Shape", "Param #")?;
        writeln!(f, "{}", "=".repeat(66))?;
        writeln!(
            f,
            "{:<28} {:<22} {:>14}",
            "the_input (InputLayer)",
            format!("(None, T, {})", self.input_dim),
            0
        )?;

        let mut time = "T".to_string();
        for layer in &self.layers {
            if layer.reduces_time {
                time = "T'".to_string();
            }
            writeln!(
                f,
                "{:<28} {:<22} {:>14}",
                format!("{} ({})", layer.name, layer.kind),
                format!("(None, {}, {})", time, layer.output_features),
                layer.params
            )?;
        }
        writeln!(f, "{}", "=".repeat(66))?;
        write!(f, "Total params: {}", self.total_params())
    }
}
