// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration        (this layer)
//   Step 2: Load the corpus text              (Layer 4 - data)
//   Step 3: Build vocabulary + split batches  (Layer 4 - data)
//   Step 4: Check the resume checkpoint       (Layer 6 - infra)
//   Step 5: Prepare the checkpoint directory  (Layer 6 - infra)
//   Step 6: Run the training schedule         (Layer 5 - ml)
//
// Everything that can fail because of bad input (flags,
// corpus, checkpoint vocabulary) fails before a model is built.
//
// Reference: Rust Book §9 (Error Handling)
//            Burn Book §5 (Training)

use anyhow::{ensure, Result};
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::data::{dataset::CharSplitLoader, loader::CorpusLoader, splitter::SplitFractions};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::trainer::{run_training, RunOutcome};

/// Where the training computation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    #[default]
    Cpu,
    Gpu,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so every checkpoint carries the exact settings it
// was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub input_file:          String,
    pub checkpoint_dir:      String,
    pub resume_from:         Option<String>,
    pub hidden_width:        usize,
    pub num_layers:          usize,
    pub dropout:             f64,
    /// Timesteps per batch (S)
    pub batch_seq_length:    usize,
    /// Timesteps per truncation window
    pub window_length:       usize,
    pub batch_size:          usize,
    pub max_epochs:          usize,
    pub learning_rate:       f64,
    pub learning_rate_decay: f64,
    pub decay_start_epoch:   usize,
    pub rmsprop_decay:       f64,
    pub grad_clip:           f64,
    pub train_fraction:      f64,
    pub val_fraction:        f64,
    pub eval_interval:       usize,
    pub print_interval:      usize,
    pub seed:                u64,
    pub sample_length:       usize,
    pub device:              Accelerator,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            input_file:          "data/input.txt".to_string(),
            checkpoint_dir:      "checkpoints".to_string(),
            resume_from:         None,
            hidden_width:        128,
            num_layers:          2,
            dropout:             0.0,
            batch_seq_length:    100,
            window_length:       50,
            batch_size:          50,
            max_epochs:          50,
            learning_rate:       2e-3,
            learning_rate_decay: 0.97,
            decay_start_epoch:   10,
            rmsprop_decay:       0.95,
            grad_clip:           5.0,
            train_fraction:      0.95,
            val_fraction:        0.05,
            eval_interval:       1000,
            print_interval:      1,
            seed:                123,
            sample_length:       200,
            device:              Accelerator::Cpu,
        }
    }
}

impl TrainConfig {
    /// Reject values no training run can work with
    pub fn validate(&self) -> Result<()> {
        ensure!(self.hidden_width > 0, "hidden width must be positive");
        ensure!(self.num_layers > 0, "need at least one LSTM layer");
        ensure!(
            (0.0..1.0).contains(&self.dropout),
            "dropout must lie in [0, 1), got {}", self.dropout
        );
        ensure!(self.batch_seq_length > 0, "batch sequence length must be positive");
        ensure!(self.window_length > 0, "window length must be positive");
        ensure!(self.batch_size > 0, "batch size must be positive");
        ensure!(self.max_epochs > 0, "max epochs must be positive");
        ensure!(self.learning_rate > 0.0, "learning rate must be positive");
        ensure!(
            self.learning_rate_decay > 0.0 && self.learning_rate_decay <= 1.0,
            "learning rate decay must lie in (0, 1], got {}", self.learning_rate_decay
        );
        ensure!(
            self.rmsprop_decay > 0.0 && self.rmsprop_decay < 1.0,
            "RMSProp decay must lie in (0, 1), got {}", self.rmsprop_decay
        );
        ensure!(self.eval_interval > 0, "eval interval must be positive");
        ensure!(self.print_interval > 0, "print interval must be positive");
        SplitFractions::new(self.train_fraction, self.val_fraction)?;
        Ok(())
    }

    /// Take the model hyperparameters of the run being resumed.
    /// The rebuilt model uses them, so the saved config has to as well.
    pub fn adopt_architecture(&mut self, checkpoint: &TrainConfig) {
        if self.hidden_width != checkpoint.hidden_width
            || self.num_layers != checkpoint.num_layers
            || self.dropout != checkpoint.dropout
        {
            tracing::warn!(
                "Using the checkpoint's architecture ({} layers × {}, dropout {}) instead of {} layers × {}, dropout {}",
                checkpoint.num_layers, checkpoint.hidden_width, checkpoint.dropout,
                self.num_layers, self.hidden_width, self.dropout
            );
        }
        self.hidden_width = checkpoint.hidden_width;
        self.num_layers   = checkpoint.num_layers;
        self.dropout      = checkpoint.dropout;
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<RunOutcome> {
        let mut cfg = self.config.clone();

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Load the corpus ───────────────────────────────────────────
        let text = CorpusLoader::new(&cfg.input_file).load()?;

        // ── Step 3: Vocabulary and batches ────────────────────────────────────
        let fractions = SplitFractions::new(cfg.train_fraction, cfg.val_fraction)?;
        let loader    = CharSplitLoader::from_text(&text, cfg.batch_size, cfg.batch_seq_length, fractions)?;

        // ── Step 4: Resume checks ─────────────────────────────────────────────
        // The vocabulary must match before anything is built on top of it
        let resume = cfg.resume_from.as_ref().map(PathBuf::from);
        if let Some(path) = &resume {
            tracing::info!("Resuming from '{}'", path.display());
            let meta = CheckpointManager::load_meta(path)?;
            loader.vocabulary().ensure_matches(&meta.vocabulary)?;
            cfg.adopt_architecture(&meta.config);
        }

        // ── Step 5: Checkpoint directory ──────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Train (Layer 5) ───────────────────────────────────────────
        let outcome = run_training(&cfg, loader, resume, ckpt)?;
        if let RunOutcome::Diverged { iteration, loss } = outcome {
            tracing::warn!("Run stopped at iteration {} after loss {:.4}", iteration, loss);
        }
        Ok(outcome)
    }
}
