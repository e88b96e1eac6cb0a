//! Реестр поддерживаемых архитектур акустических моделей.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Архитектура акустической модели.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// Один GRU-слой с шириной словаря и softmax.
    SimpleRnn,
    /// GRU → BatchNorm → TimeDistributed(Dense).
    Rnn,
    /// Conv1D → BatchNorm → SimpleRNN → BatchNorm → Dense.
    CnnRnn,
    /// Стек GRU-слоёв с BatchNorm после каждого.
    DeepRnn,
    /// Двунаправленный GRU (concat).
    BidirectionalRnn,
    /// Conv1D + MaxPool + два GRU-блока с BatchNorm и Dropout.
    Final,
    /// Conv1D + три двунаправленных GRU-блока с Dropout и BatchNorm.
    FinalDeep,
}

impl Architecture {
    /// Все поддерживаемые архитектуры.
    pub fn all() -> &'static [Architecture] {
        &[
            Architecture::SimpleRnn,
            Architecture::Rnn,
            Architecture::CnnRnn,
            Architecture::DeepRnn,
            Architecture::BidirectionalRnn,
            Architecture::Final,
            Architecture::FinalDeep,
        ]
    }

    /// Строковый идентификатор (совпадает с тегом в config.json).
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::SimpleRnn => "simple_rnn",
            Architecture::Rnn => "rnn",
            Architecture::CnnRnn => "cnn_rnn",
            Architecture::DeepRnn => "deep_rnn",
            Architecture::BidirectionalRnn => "bidirectional_rnn",
            Architecture::Final => "final",
            Architecture::FinalDeep => "final_deep",
        }
    }

    /// Человекочитаемое название.
    pub fn display_name(&self) -> &'static str {
        match self {
            Architecture::SimpleRnn => "Simple RNN",
            Architecture::Rnn => "RNN + TimeDistributed Dense",
            Architecture::CnnRnn => "CNN + RNN",
            Architecture::DeepRnn => "Deep RNN",
            Architecture::BidirectionalRnn => "Bidirectional RNN",
            Architecture::Final => "CNN + Pool + Deep GRU",
            Architecture::FinalDeep => "CNN + Deep Bidirectional GRU",
        }
    }

    /// Меняет ли архитектура длину по оси времени.
    pub fn reduces_time(&self) -> bool {
        matches!(
            self,
            Architecture::CnnRnn | Architecture::Final | Architecture::FinalDeep
        )
    }

    /// Парсинг из строки (CLI-совместимо).
    pub fn from_str_loose(s: &str) -> Option<Architecture> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "simple_rnn" | "simple" => Some(Architecture::SimpleRnn),
            "rnn" | "rnn_model" => Some(Architecture::Rnn),
            "cnn_rnn" | "cnn" => Some(Architecture::CnnRnn),
            "deep_rnn" | "deep" => Some(Architecture::DeepRnn),
            "bidirectional_rnn" | "bidirectional" | "birnn" => Some(Architecture::BidirectionalRnn),
            "final" | "final_model" => Some(Architecture::Final),
            "final_deep" | "final_model_2" | "final_2" => Some(Architecture::FinalDeep),
            _ => None,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_str_roundtrips_through_loose_parser() {
        for arch in Architecture::all() {
            assert_eq!(Architecture::from_str_loose(arch.as_str()), Some(*arch));
        }
    }

    #[test]
    fn test_loose_aliases() {
        assert_eq!(Architecture::from_str_loose("CNN-RNN"), Some(Architecture::CnnRnn));
        assert_eq!(Architecture::from_str_loose("final_model_2"), Some(Architecture::FinalDeep));
        assert_eq!(Architecture::from_str_loose("transformer"), None);
    }

    #[test]
    fn test_reduces_time() {
        assert!(!Architecture::BidirectionalRnn.reduces_time());
        assert!(Architecture::Final.reduces_time());
    }
}
