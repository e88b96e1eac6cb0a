//! Интеграционные тесты: все архитектуры на CPU со случайными весами.

use std::path::PathBuf;

use acoustic_core::{
    AmError, Architecture, ArchitectureConfig, BorderMode, ConvConfig, MFCC_DIM,
};
use acoustic_models::{init, load, save};
use candle_core::{DType, Device, Tensor, D};

const UNITS: usize = 16;
const FRAMES: usize = 60;

fn small_conv(border_mode: BorderMode, stride: usize) -> ConvConfig {
    ConvConfig {
        filters: 8,
        kernel_size: 11,
        stride,
        border_mode,
        dilation: 1,
    }
}

/// Конфигурация с уменьшенными размерами для быстрых тестов.
fn small_config(arch: Architecture) -> ArchitectureConfig {
    let mut config = ArchitectureConfig::preset(arch, MFCC_DIM);
    match &mut config {
        ArchitectureConfig::SimpleRnn(_) => {}
        ArchitectureConfig::Rnn(c) => c.units = UNITS,
        ArchitectureConfig::CnnRnn(c) => {
            c.units = UNITS;
            c.conv = small_conv(BorderMode::Valid, 2);
        }
        ArchitectureConfig::DeepRnn(c) => {
            c.units = UNITS;
            c.recur_layers = 3;
        }
        ArchitectureConfig::BidirectionalRnn(c) => c.units = UNITS,
        ArchitectureConfig::Final(c) => {
            c.units = UNITS;
            c.conv = small_conv(BorderMode::Valid, 2);
        }
        ArchitectureConfig::FinalDeep(c) => {
            c.units = UNITS;
            c.conv = small_conv(BorderMode::Same, 2);
        }
    }
    config
}

fn features(batch: usize, frames: usize) -> Tensor {
    Tensor::randn(0f32, 1.0, (batch, frames, MFCC_DIM), &Device::Cpu).unwrap()
}

fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
    (a - b)
        .unwrap()
        .abs()
        .unwrap()
        .flatten_all()
        .unwrap()
        .max(0)
        .unwrap()
        .to_scalar::<f32>()
        .unwrap()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("acoustic-models-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn test_every_architecture_matches_its_projection() {
    for arch in Architecture::all() {
        let config = small_config(*arch);
        let (built, _varmap) = init(&config, &Device::Cpu).unwrap();

        let probs = built.model.forward(&features(2, FRAMES)).unwrap();
        let expected = built.output_frames(FRAMES).unwrap();
        assert_eq!(
            probs.dims(),
            &[2, expected, 29],
            "{}: форма выхода не совпадает с проекцией",
            arch.as_str()
        );
        assert_eq!(built.output_length.is_identity(), !arch.reduces_time());

        let sums: Vec<f32> = probs
            .sum(D::Minus1)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-4), "{}", arch.as_str());
    }
}

#[test]
fn test_summary_counts_every_stored_scalar() {
    for arch in Architecture::all() {
        let config = small_config(*arch);
        let (built, varmap) = init(&config, &Device::Cpu).unwrap();

        let summary = built.model.summary();
        let stored: usize = varmap.all_vars().iter().map(|v| v.elem_count()).sum();
        assert_eq!(summary.total_params(), stored, "{}", arch.as_str());
        assert_eq!(summary.output_features(), 29);
        assert_eq!(summary.architecture, *arch);
    }
}

#[test]
fn test_cnn_rnn_reference_lengths() {
    let mut config = match ArchitectureConfig::preset(Architecture::CnnRnn, MFCC_DIM) {
        ArchitectureConfig::CnnRnn(c) => c,
        _ => unreachable!(),
    };
    config.units = UNITS;
    config.conv = small_conv(BorderMode::Valid, 2);

    let (built, _) = init(&ArchitectureConfig::CnnRnn(config.clone()), &Device::Cpu).unwrap();
    assert_eq!(built.output_length.apply(Some(100)).unwrap(), Some(45));
    assert_eq!(built.model.forward(&features(1, 100)).unwrap().dim(1).unwrap(), 45);

    config.conv.border_mode = BorderMode::Same;
    let (built, _) = init(&ArchitectureConfig::CnnRnn(config), &Device::Cpu).unwrap();
    assert_eq!(built.output_length.apply(Some(100)).unwrap(), Some(50));
    assert_eq!(built.model.forward(&features(1, 100)).unwrap().dim(1).unwrap(), 50);
}

#[test]
fn test_final_same_unit_stride_keeps_length() {
    let mut config = small_config(Architecture::Final);
    if let ArchitectureConfig::Final(c) = &mut config {
        c.conv = small_conv(BorderMode::Same, 1);
    }
    let (built, _) = init(&config, &Device::Cpu).unwrap();
    let probs = built.model.forward(&features(1, 37)).unwrap();
    assert_eq!(probs.dims(), &[1, 37, 29]);
    assert_eq!(built.output_frames(37), Some(37));
}

#[test]
fn test_dilated_convolution_length() {
    let mut config = small_config(Architecture::CnnRnn);
    if let ArchitectureConfig::CnnRnn(c) = &mut config {
        c.conv = ConvConfig {
            filters: 8,
            kernel_size: 3,
            stride: 1,
            border_mode: BorderMode::Valid,
            dilation: 2,
        };
    }
    let (built, _) = init(&config, &Device::Cpu).unwrap();
    assert_eq!(built.output_length.apply(Some(50)).unwrap(), Some(46));
    assert_eq!(built.model.forward(&features(1, 50)).unwrap().dim(1).unwrap(), 46);
}

#[test]
fn test_wrong_feature_dim_is_rejected() {
    let (built, _) = init(&small_config(Architecture::Rnn), &Device::Cpu).unwrap();
    let bad = Tensor::zeros((1, 10, MFCC_DIM + 1), DType::F32, &Device::Cpu).unwrap();
    let err = built.model.forward(&bad).unwrap_err();
    assert!(matches!(err, AmError::Config(_)));

    let flat = Tensor::zeros((10, MFCC_DIM), DType::F32, &Device::Cpu).unwrap();
    assert!(built.model.forward(&flat).is_err());
}

#[test]
fn test_input_shorter_than_kernel() {
    let (built, _) = init(&small_config(Architecture::CnnRnn), &Device::Cpu).unwrap();
    assert_eq!(built.output_frames(5), None);
    assert!(built.model.forward(&features(1, 5)).is_err());
}

#[test]
fn test_invalid_config_is_rejected_before_building() {
    let mut config = small_config(Architecture::DeepRnn);
    if let ArchitectureConfig::DeepRnn(c) = &mut config {
        c.recur_layers = 0;
    }
    let err = init(&config, &Device::Cpu).err().unwrap();
    assert!(matches!(err, AmError::InvalidArgument(_)));
}

#[test]
fn test_inference_is_deterministic_and_train_mode_runs() {
    let (built, _) = init(&small_config(Architecture::FinalDeep), &Device::Cpu).unwrap();
    let x = features(3, 40);

    let a = built.model.forward(&x).unwrap();
    let b = built.model.forward(&x).unwrap();
    assert!(max_abs_diff(&a, &b) < 1e-6);

    let trained = built.model.forward_t(&x, true).unwrap();
    assert_eq!(trained.dims(), a.dims());
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = scratch_dir("roundtrip");
    let config = small_config(Architecture::Final);
    let (built, varmap) = init(&config, &Device::Cpu).unwrap();
    save(&dir, &config, &varmap).unwrap();

    let (reloaded, reloaded_config) = load(&dir, &Device::Cpu).unwrap();
    assert_eq!(reloaded_config, config);
    assert_eq!(reloaded.output_length, built.output_length);

    let x = features(1, 30);
    let before = built.model.forward(&x).unwrap();
    let after = reloaded.model.forward(&x).unwrap();
    assert!(max_abs_diff(&before, &after) < 1e-6);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_load_without_weights_fails() {
    let dir = scratch_dir("missing-weights");
    std::fs::create_dir_all(&dir).unwrap();
    let err = load(&dir, &Device::Cpu).err().unwrap();
    assert!(matches!(err, AmError::Model(_)));
    let _ = std::fs::remove_dir_all(&dir);
}
