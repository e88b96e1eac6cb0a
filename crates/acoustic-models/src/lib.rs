//! Акустические модели для CTC-распознавания речи на Candle.
//!
//! Семь архитектур: от одного GRU-слоя до свёрточного фронтенда с
//! несколькими двунаправленными GRU-блоками. Каждая модель строится
//! вместе со своей проекцией длины по оси времени ([`BuiltModel`]).

pub mod builder;
pub mod layers;
pub mod models;
pub mod recurrent;

pub use builder::{build, init, load, save, BuiltModel, CONFIG_FILE, WEIGHTS_FILE};
pub use models::{
    BidirectionalRnnModel, CnnRnnModel, DeepRnnModel, FinalDeepModel, FinalModel, RnnModel,
    SimpleRnnModel,
};
