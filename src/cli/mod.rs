// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`  — trains the LSTM on a text file
//   2. `sample` — loads a checkpoint and generates text
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, SampleArgs, TrainArgs};

use crate::ml::trainer::RunOutcome;

#[derive(Parser, Debug)]
#[command(
    name = "char-lstm",
    version = "0.1.0",
    about = "Train a character-level LSTM with truncated BPTT, then sample from it."
)]
pub struct Cli {
    /// The subcommand to run (train or sample)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)  => run_train(args),
            Commands::Sample(args) => run_sample(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on: {}", args.input_file);

    let use_case = TrainUseCase::new(args.into());
    match use_case.execute()? {
        RunOutcome::Completed => println!("Training complete."),
        RunOutcome::Diverged { iteration, loss } => {
            println!("Training stopped at iteration {iteration}: loss {loss:.4} diverged.")
        }
    }
    Ok(())
}

fn run_sample(args: SampleArgs) -> Result<()> {
    use crate::application::sample_use_case::SampleUseCase;

    let text = SampleUseCase::new(args.into()).execute()?;
    println!("{text}");
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    use crate::application::train_use_case::{Accelerator, TrainConfig};

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::parse_from(["char-lstm", "train"]);
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        assert_eq!(TrainConfig::from(args), TrainConfig::default());
    }

    #[test]
    fn test_train_flags_parsed() {
        let cli = Cli::parse_from([
            "char-lstm", "train",
            "--window-length", "7",
            "--device", "gpu",
            "--resume-from", "ckpt/lstm_iter000010.json",
        ]);
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        let cfg = TrainConfig::from(args);
        assert_eq!(cfg.window_length, 7);
        assert_eq!(cfg.device, Accelerator::Gpu);
        assert_eq!(cfg.resume_from.as_deref(), Some("ckpt/lstm_iter000010.json"));
    }
}
