//! Длина последовательности по оси времени после свёртки и пулинга.
//!
//! Арифметика совпадает с `Conv1D`/`MaxPooling1D` из Keras для режимов
//! `same` и `valid`. Длина представлена как `Option<i64>`: `None` означает
//! «неизвестна» и проходит через все стадии без изменений, а отрицательный
//! результат режима `valid` (ядро длиннее входа) не обрезается до нуля.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AmError, AmResult};

/// Режим паддинга скользящего окна.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderMode {
    /// Симметричный паддинг, длина сохраняется (до учёта stride).
    Same,
    /// Без паддинга, длина уменьшается на `effective_size - 1`.
    Valid,
}

impl BorderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorderMode::Same => "same",
            BorderMode::Valid => "valid",
        }
    }
}

impl FromStr for BorderMode {
    type Err = AmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same" => Ok(BorderMode::Same),
            "valid" => Ok(BorderMode::Valid),
            other => Err(AmError::InvalidArgument(format!(
                "border_mode должен быть 'same' или 'valid', получено '{other}'"
            ))),
        }
    }
}

impl fmt::Display for BorderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Геометрия одномерного окна (свёртка или пулинг) вдоль оси времени.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv1dGeometry {
    kernel_size: usize,
    border_mode: BorderMode,
    stride: usize,
    dilation: usize,
}

impl Conv1dGeometry {
    /// Создать геометрию; `kernel_size`, `stride` и `dilation` должны быть > 0,
    /// а размах ядра должен помещаться в `i64`.
    pub fn new(
        kernel_size: usize,
        border_mode: BorderMode,
        stride: usize,
        dilation: usize,
    ) -> AmResult<Self> {
        for (name, value) in [
            ("filter_size", kernel_size),
            ("stride", stride),
            ("dilation", dilation),
        ] {
            if value == 0 {
                return Err(AmError::InvalidArgument(format!(
                    "{name} должен быть положительным"
                )));
            }
        }
        if i64::try_from(stride).is_err() {
            return Err(AmError::InvalidArgument(format!(
                "stride {stride} не помещается в i64"
            )));
        }
        let span = (kernel_size - 1)
            .checked_mul(dilation - 1)
            .and_then(|extra| extra.checked_add(kernel_size))
            .filter(|&span| i64::try_from(span).is_ok());
        if span.is_none() {
            return Err(AmError::InvalidArgument(format!(
                "размах ядра переполняется: filter_size={kernel_size}, dilation={dilation}"
            )));
        }
        Ok(Self {
            kernel_size,
            border_mode,
            stride,
            dilation,
        })
    }

    /// Свёртка без dilation.
    pub fn conv(kernel_size: usize, border_mode: BorderMode, stride: usize) -> AmResult<Self> {
        Self::new(kernel_size, border_mode, stride, 1)
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn border_mode(&self) -> BorderMode {
        self.border_mode
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn dilation(&self) -> usize {
        self.dilation
    }

    /// Размах ядра с учётом dilation: `k + (k - 1) * (d - 1)`.
    pub fn effective_size(&self) -> usize {
        self.kernel_size + (self.kernel_size - 1) * (self.dilation - 1)
    }

    /// Длина на выходе всегда равна длине на входе.
    pub fn preserves_length(&self) -> bool {
        self.stride == 1 && (self.border_mode == BorderMode::Same || self.effective_size() == 1)
    }

    /// Выходная длина для входной длины `input_length`.
    ///
    /// Ошибка `InvalidArgument`, если длина выходит за пределы `i64`.
    pub fn output_length(&self, input_length: Option<i64>) -> AmResult<Option<i64>> {
        let Some(input_length) = input_length else {
            return Ok(None);
        };
        // Оба значения проверены в `new`.
        let shrink = self.effective_size() as i64 - 1;
        let stride = self.stride as i64;
        let length = match self.border_mode {
            BorderMode::Same => input_length,
            BorderMode::Valid => input_length.checked_sub(shrink).ok_or_else(|| {
                AmError::InvalidArgument(format!(
                    "длина {input_length} переполняется при ядре {}",
                    self.effective_size()
                ))
            })?,
        };
        // Потолок деления: floor плюс единица при ненулевом остатке.
        let ceil = length.div_euclid(stride) + i64::from(length.rem_euclid(stride) != 0);
        Ok(Some(ceil))
    }

    /// Паддинг (слева, справа) для входа длины `input_len`.
    ///
    /// Для `same` лишний элемент при нечётном паддинге уходит вправо, как в Keras.
    pub fn padding(&self, input_len: usize) -> (usize, usize) {
        match self.border_mode {
            BorderMode::Valid => (0, 0),
            BorderMode::Same => {
                let out_len = input_len.div_ceil(self.stride);
                let needed = (out_len.saturating_sub(1) * self.stride + self.effective_size())
                    .saturating_sub(input_len);
                let left = needed / 2;
                (left, needed - left)
            }
        }
    }
}

/// Длина выходной последовательности после 1D-свёртки по времени.
///
/// Неизвестная длина возвращается как `None` без проверки остальных
/// аргументов.
pub fn cnn_output_length(
    input_length: Option<i64>,
    filter_size: usize,
    border_mode: &str,
    stride: usize,
    dilation: usize,
) -> AmResult<Option<i64>> {
    if input_length.is_none() {
        return Ok(None);
    }
    let border_mode: BorderMode = border_mode.parse()?;
    let geometry = Conv1dGeometry::new(filter_size, border_mode, stride, dilation)?;
    geometry.output_length(input_length)
}

/// Цепочка операций, меняющих ось времени; пустая цепочка: тождество.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LengthProjection {
    stages: Vec<Conv1dGeometry>,
}

impl LengthProjection {
    pub fn identity() -> Self {
        Self::default()
    }

    /// Добавить стадию в конец цепочки.
    pub fn then(mut self, stage: Conv1dGeometry) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[Conv1dGeometry] {
        &self.stages
    }

    pub fn is_identity(&self) -> bool {
        self.stages.is_empty()
    }

    /// Применить все стадии по порядку.
    pub fn apply(&self, input_length: Option<i64>) -> AmResult<Option<i64>> {
        self.stages
            .iter()
            .try_fold(input_length, |length, stage| stage.output_length(length))
    }

    /// Число выходных фреймов для известной входной длины.
    ///
    /// `None`, если конфигурация не помещается во вход (длина ≤ 0)
    /// или длина не представима в `i64`.
    pub fn frames(&self, input_frames: usize) -> Option<usize> {
        let input_frames = i64::try_from(input_frames).ok()?;
        self.apply(Some(input_frames))
            .ok()
            .flatten()
            .filter(|&n| n > 0)
            .map(|n| n as usize)
    }
}
