//! Построение, загрузка и сохранение моделей.
//!
//! Результат построения: [`BuiltModel`]: модель вместе с проекцией длины
//! по оси времени, которая нужна CTC-декодеру и подсчёту потерь.

use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use tracing::{debug, info, warn};

use acoustic_core::{
    AcousticModel, AmError, AmResult, ArchitectureConfig, LengthProjection,
};

use crate::models::{
    BidirectionalRnnModel, CnnRnnModel, DeepRnnModel, FinalDeepModel, FinalModel, RnnModel,
    SimpleRnnModel,
};

/// Имя файла конфигурации в директории модели.
pub const CONFIG_FILE: &str = "config.json";

/// Имя файла весов в директории модели.
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Модель и её проекция длины.
pub struct BuiltModel {
    pub model: Box<dyn AcousticModel>,
    pub output_length: LengthProjection,
}

impl BuiltModel {
    /// Число выходных фреймов для входа из `input_frames` фреймов.
    ///
    /// `None`, если свёртка не помещается во вход.
    pub fn output_frames(&self, input_frames: usize) -> Option<usize> {
        let frames = self.output_length.frames(input_frames);
        if frames.is_none() {
            let projected = i64::try_from(input_frames)
                .ok()
                .and_then(|n| self.output_length.apply(Some(n)).ok().flatten());
            warn!(
                "{}: вход из {} фреймов слишком короткий (длина после свёртки {:?})",
                self.model.architecture().as_str(),
                input_frames,
                projected,
            );
        }
        frames
    }
}

/// Построить модель по конфигурации; веса берутся из `vb`.
pub fn build(config: &ArchitectureConfig, vb: VarBuilder) -> AmResult<BuiltModel> {
    config.validate()?;
    let output_length = config.length_projection()?;

    let model: Box<dyn AcousticModel> = match config {
        ArchitectureConfig::SimpleRnn(c) => Box::new(SimpleRnnModel::load(c, vb)?),
        ArchitectureConfig::Rnn(c) => Box::new(RnnModel::load(c, vb)?),
        ArchitectureConfig::CnnRnn(c) => Box::new(CnnRnnModel::load(c, vb)?),
        ArchitectureConfig::DeepRnn(c) => Box::new(DeepRnnModel::load(c, vb)?),
        ArchitectureConfig::BidirectionalRnn(c) => Box::new(BidirectionalRnnModel::load(c, vb)?),
        ArchitectureConfig::Final(c) => Box::new(FinalModel::load(c, vb)?),
        ArchitectureConfig::FinalDeep(c) => Box::new(FinalDeepModel::load(c, vb)?),
    };

    let summary = model.summary();
    info!(
        "{}: {} → {} классов, {} параметров",
        config.architecture().as_str(),
        config.input_dim(),
        config.output_dim(),
        summary.total_params(),
    );
    debug!("\n{summary}");

    Ok(BuiltModel {
        model,
        output_length,
    })
}

/// Создать модель со свежими весами в новом [`VarMap`].
///
/// `VarMap` нужен для обучения и последующего [`save`].
pub fn init(config: &ArchitectureConfig, device: &Device) -> AmResult<(BuiltModel, VarMap)> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let built = build(config, vb)?;
    Ok((built, varmap))
}

/// Загрузить модель из директории.
///
/// Ожидаемые файлы:
/// - `model.safetensors`: веса
/// - `config.json`: конфигурация (если нет, используется конфигурация по умолчанию)
pub fn load(
    model_dir: impl AsRef<Path>,
    device: &Device,
) -> AmResult<(BuiltModel, ArchitectureConfig)> {
    let model_dir = model_dir.as_ref();
    info!("Загрузка модели из {:?}", model_dir);

    let config = load_config(model_dir)?;

    let weights_path = model_dir.join(WEIGHTS_FILE);
    if !weights_path.exists() {
        return Err(AmError::Model(format!(
            "Файл {WEIGHTS_FILE} не найден в {:?}",
            model_dir
        )));
    }

    let start = Instant::now();
    // Рекуррентные слои считаются пошагово, держим F32 на всех устройствах.
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };
    let built = build(&config, vb)?;
    info!(
        "{}: модель загружена за {:.2}с",
        config.architecture().as_str(),
        start.elapsed().as_secs_f64()
    );

    Ok((built, config))
}

/// Сохранить конфигурацию и веса в директорию.
pub fn save(
    model_dir: impl AsRef<Path>,
    config: &ArchitectureConfig,
    varmap: &VarMap,
) -> AmResult<PathBuf> {
    let model_dir = model_dir.as_ref();
    std::fs::create_dir_all(model_dir)?;

    let config_json = serde_json::to_string_pretty(config)?;
    std::fs::write(model_dir.join(CONFIG_FILE), config_json)?;

    let weights_path = model_dir.join(WEIGHTS_FILE);
    varmap.save(&weights_path)?;

    info!(
        "{}: сохранено в {:?} ({} тензоров)",
        config.architecture().as_str(),
        model_dir,
        varmap.all_vars().len()
    );
    Ok(weights_path)
}

/// Загрузить конфигурацию из config.json.
fn load_config(model_dir: &Path) -> AmResult<ArchitectureConfig> {
    let config_path = model_dir.join(CONFIG_FILE);
    if config_path.exists() {
        ArchitectureConfig::from_file(&config_path)
    } else {
        info!("{CONFIG_FILE} не найден, использую конфигурацию по умолчанию");
        Ok(ArchitectureConfig::default())
    }
}
