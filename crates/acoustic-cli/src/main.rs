//! CLI для акустических моделей: сводка, длина выхода, инициализация весов
//! и пробный прямой проход.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;

use acoustic_core::{cnn_output_length, Architecture, ArchitectureConfig, SPECTROGRAM_DIM};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Архитектура для CLI.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ArchArg {
    /// GRU(output_dim) → softmax
    SimpleRnn,
    /// GRU → BatchNorm → Dense
    Rnn,
    /// Conv1D → SimpleRNN
    CnnRnn,
    /// Стек GRU
    DeepRnn,
    /// Двунаправленный GRU
    BidirectionalRnn,
    /// Conv1D + MaxPool + 2 × GRU
    Final,
    /// Conv1D + 3 × BiGRU
    FinalDeep,
}

impl ArchArg {
    fn to_architecture(self) -> Architecture {
        match self {
            ArchArg::SimpleRnn => Architecture::SimpleRnn,
            ArchArg::Rnn => Architecture::Rnn,
            ArchArg::CnnRnn => Architecture::CnnRnn,
            ArchArg::DeepRnn => Architecture::DeepRnn,
            ArchArg::BidirectionalRnn => Architecture::BidirectionalRnn,
            ArchArg::Final => Architecture::Final,
            ArchArg::FinalDeep => Architecture::FinalDeep,
        }
    }
}

#[derive(Parser)]
#[command(name = "acoustic")]
#[command(author, version, about = "Acoustic models for CTC speech recognition", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the layer summary of an architecture
    Summary {
        /// Архитектура (пресет); игнорируется, если задан --config
        #[arg(long, value_enum, default_value = "final")]
        arch: ArchArg,

        /// Путь к config.json
        #[arg(long)]
        config: Option<PathBuf>,

        /// Размерность входных признаков для пресета (161: спектрограмма, 13: MFCC)
        #[arg(long, default_value_t = SPECTROGRAM_DIM)]
        input_dim: usize,

        /// Показать длину выхода для входа из N фреймов
        #[arg(long)]
        frames: Option<usize>,
    },

    /// Compute the output length of a 1D convolution along time
    OutputLength {
        /// Входная длина; не задана: «неизвестна»
        #[arg(long)]
        length: Option<i64>,

        #[arg(long)]
        filter_size: usize,

        /// same или valid
        #[arg(long)]
        border_mode: String,

        #[arg(long, default_value_t = 1)]
        stride: usize,

        #[arg(long, default_value_t = 1)]
        dilation: usize,
    },

    /// Initialize random weights and save config.json + model.safetensors
    Init {
        #[arg(long, value_enum, default_value = "final")]
        arch: ArchArg,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = SPECTROGRAM_DIM)]
        input_dim: usize,

        /// Директория для сохранения
        #[arg(long)]
        out: PathBuf,
    },

    /// Run a forward pass on random features
    Forward {
        /// Директория модели
        #[arg(long)]
        model: PathBuf,

        /// Количество входных фреймов
        #[arg(long, default_value_t = 200)]
        frames: usize,

        #[arg(long, default_value_t = 1)]
        batch: usize,

        /// Device to use (cpu, metal, cuda)
        #[arg(long, default_value = "cpu")]
        device: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Summary {
            arch,
            config,
            input_dim,
            frames,
        } => run_summary(resolve_config(arch, config.as_deref(), input_dim)?, frames),

        Commands::OutputLength {
            length,
            filter_size,
            border_mode,
            stride,
            dilation,
        } => {
            let out = cnn_output_length(length, filter_size, &border_mode, stride, dilation)?;
            match out {
                Some(n) => println!("{n}"),
                None => println!("None"),
            }
            Ok(())
        }

        Commands::Init {
            arch,
            config,
            input_dim,
            out,
        } => run_init(resolve_config(arch, config.as_deref(), input_dim)?, &out),

        Commands::Forward {
            model,
            frames,
            batch,
            device,
        } => run_forward(&model, frames, batch, &device),
    }
}

/// Конфигурация из файла или пресет архитектуры.
fn resolve_config(
    arch: ArchArg,
    config: Option<&Path>,
    input_dim: usize,
) -> Result<ArchitectureConfig> {
    match config {
        Some(path) => ArchitectureConfig::from_file(path)
            .with_context(|| format!("не удалось прочитать конфигурацию {}", path.display())),
        None => Ok(ArchitectureConfig::preset(arch.to_architecture(), input_dim)),
    }
}

fn run_summary(config: ArchitectureConfig, frames: Option<usize>) -> Result<()> {
    let (built, _varmap) = acoustic_models::init(&config, &candle_core::Device::Cpu)?;
    println!("{}", built.model.summary());

    if let Some(frames) = frames {
        match built.output_length.apply(Some(i64::try_from(frames)?))? {
            Some(n) => println!("Output length: {frames} → {n} frames"),
            None => println!("Output length: unknown"),
        }
    }
    Ok(())
}

fn run_init(config: ArchitectureConfig, out: &Path) -> Result<()> {
    let (built, varmap) = acoustic_models::init(&config, &candle_core::Device::Cpu)?;
    let weights = acoustic_models::save(out, &config, &varmap)?;
    println!(
        "💾 {} ({} параметров) сохранена в {}",
        config.architecture(),
        built.model.summary().total_params(),
        weights.display()
    );
    Ok(())
}

fn run_forward(model_dir: &Path, frames: usize, batch: usize, device: &str) -> Result<()> {
    let device = create_device(device)?;
    let start = Instant::now();
    let (built, config) = acoustic_models::load(model_dir, &device)?;
    info!("🧠 {} загружена за {:.2}s", config.architecture(), start.elapsed().as_secs_f32());

    let features =
        candle_core::Tensor::randn(0f32, 1.0, (batch, frames, config.input_dim()), &device)?;
    let forward_start = Instant::now();
    let probs = built.model.forward(&features)?;
    println!(
        "   Вход: {:?} → выход: {:?} за {:.3}s",
        features.dims(),
        probs.dims(),
        forward_start.elapsed().as_secs_f32()
    );
    match built.output_frames(frames) {
        Some(n) => println!("   Фреймов на выходе: {n}"),
        None => println!("   Вход слишком короткий для свёртки"),
    }
    Ok(())
}

fn create_device(device: &str) -> Result<candle_core::Device> {
    match device {
        "metal" => Ok(candle_core::Device::new_metal(0)?),
        "cuda" => Ok(candle_core::Device::new_cuda(0)?),
        "cpu" => Ok(candle_core::Device::Cpu),
        other => anyhow::bail!("Неизвестное устройство: {other} (cpu, metal, cuda)"),
    }
}
