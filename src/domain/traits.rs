// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The two seams of the training system:
//
//   BatchSource  — where minibatches come from. The engine
//                  and evaluator only see this trait, so tests
//                  can feed them hand-built batches.
//
//   TrainSession — one training run as seen by the schedule
//                  loop. The real implementation wraps the
//                  burn model, optimizer and checkpoints; tests
//                  drive the schedule with scripted sessions.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::path::PathBuf;

use anyhow::Result;

use crate::domain::batch::{Batch, Split};
use crate::domain::progress::{StepReport, TrainingProgress};

// ─── BatchSource ──────────────────────────────────────────────────────────────
/// Produces fixed-size (X, Y) minibatches per split.
///
/// Implementations:
///   - CharSplitLoader → batches cut from a text corpus
pub trait BatchSource {
    /// The batch under the split's cursor; the cursor then advances
    /// and wraps back to the first batch after the last one.
    fn next_batch(&mut self, split: Split) -> Result<Batch>;

    /// Move the split's cursor back to its first batch
    fn reset_cursor(&mut self, split: Split);

    /// Number of batches in the split
    fn size_of_split(&self, split: Split) -> usize;
}

// ─── TrainSession ─────────────────────────────────────────────────────────────
/// One training run, driven iteration by iteration by the schedule.
pub trait TrainSession {
    /// Called before the first iteration of every epoch
    fn begin_epoch(&mut self, epoch: usize);

    /// One feval on the next training batch plus one optimizer update
    fn train_step(&mut self) -> Result<StepReport>;

    /// Average per-timestep loss over the validation split,
    /// or None when the split is empty
    fn validation_loss(&mut self) -> Result<Option<f64>>;

    /// A short text generated by the current model
    fn sample(&mut self) -> Result<String>;

    /// Persist the model together with `progress`; returns the artifact path
    fn checkpoint(&mut self, progress: &TrainingProgress) -> Result<PathBuf>;

    /// Set the learning rate used by subsequent steps
    fn set_learning_rate(&mut self, learning_rate: f64);
}
