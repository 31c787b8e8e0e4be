// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `sample`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, enum, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use crate::application::{
    sample_use_case::SampleRequest,
    train_use_case::{Accelerator, TrainConfig},
};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the character LSTM on a text file
    Train(TrainArgs),

    /// Generate text from a trained checkpoint
    Sample(SampleArgs),
}

/// Execution device as spelled on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceArg {
    Cpu,
    Gpu,
}

impl From<DeviceArg> for Accelerator {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu => Accelerator::Cpu,
            DeviceArg::Gpu => Accelerator::Gpu,
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// UTF-8 text file to learn from
    #[arg(long, default_value = "data/input.txt")]
    pub input_file: String,

    /// Directory for checkpoints and metrics.csv
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Checkpoint metadata file (lstm_iterNNNNNN.json) to continue from
    #[arg(long)]
    pub resume_from: Option<String>,

    /// Width of the LSTM cell and hidden state
    #[arg(long, default_value_t = 128)]
    pub hidden_width: usize,

    /// Number of stacked LSTM layers
    #[arg(long, default_value_t = 2)]
    pub num_layers: usize,

    /// Dropout between layers, in [0, 1)
    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    /// Timesteps in one batch
    #[arg(long, default_value_t = 100)]
    pub batch_seq_length: usize,

    /// Timesteps a gradient may travel back (truncation window)
    #[arg(long, default_value_t = 50)]
    pub window_length: usize,

    /// Number of parallel text streams per batch
    #[arg(long, default_value_t = 50)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 50)]
    pub max_epochs: usize,

    #[arg(long, default_value_t = 2e-3)]
    pub learning_rate: f64,

    /// Factor applied to the learning rate at the end of each epoch
    #[arg(long, default_value_t = 0.97)]
    pub learning_rate_decay: f64,

    /// First epoch whose end triggers the decay
    #[arg(long, default_value_t = 10)]
    pub decay_start_epoch: usize,

    /// Averaging factor of RMSProp's squared-gradient estimate
    #[arg(long, default_value_t = 0.95)]
    pub rmsprop_decay: f64,

    /// Clip every gradient element to [-grad_clip, grad_clip]; 0 disables
    #[arg(long, default_value_t = 5.0)]
    pub grad_clip: f64,

    #[arg(long, default_value_t = 0.95)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 0.05)]
    pub val_fraction: f64,

    /// Validate, sample and checkpoint every N iterations
    #[arg(long, default_value_t = 1000)]
    pub eval_interval: usize,

    /// Print a progress line every N iterations
    #[arg(long, default_value_t = 1)]
    pub print_interval: usize,

    #[arg(long, default_value_t = 123)]
    pub seed: u64,

    /// Characters generated at every checkpoint
    #[arg(long, default_value_t = 200)]
    pub sample_length: usize,

    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            input_file:          a.input_file,
            checkpoint_dir:      a.checkpoint_dir,
            resume_from:         a.resume_from,
            hidden_width:        a.hidden_width,
            num_layers:          a.num_layers,
            dropout:             a.dropout,
            batch_seq_length:    a.batch_seq_length,
            window_length:       a.window_length,
            batch_size:          a.batch_size,
            max_epochs:          a.max_epochs,
            learning_rate:       a.learning_rate,
            learning_rate_decay: a.learning_rate_decay,
            decay_start_epoch:   a.decay_start_epoch,
            rmsprop_decay:       a.rmsprop_decay,
            grad_clip:           a.grad_clip,
            train_fraction:      a.train_fraction,
            val_fraction:        a.val_fraction,
            eval_interval:       a.eval_interval,
            print_interval:      a.print_interval,
            seed:                a.seed,
            sample_length:       a.sample_length,
            device:              a.device.into(),
        }
    }
}

/// All arguments for the `sample` command
#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Checkpoint metadata file; defaults to the newest in --checkpoint-dir
    #[arg(long)]
    pub checkpoint: Option<String>,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Text to warm the model up with; printed before the generated text
    #[arg(long, default_value = "")]
    pub primer: String,

    /// Number of characters to generate
    #[arg(long, default_value_t = 500)]
    pub length: usize,

    /// Sample with this temperature instead of taking the argmax
    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long, default_value_t = 123)]
    pub seed: u64,
}

impl From<SampleArgs> for SampleRequest {
    fn from(a: SampleArgs) -> Self {
        SampleRequest {
            checkpoint:     a.checkpoint,
            checkpoint_dir: a.checkpoint_dir,
            primer:         a.primer,
            length:         a.length,
            temperature:    a.temperature,
            seed:           a.seed,
        }
    }
}
