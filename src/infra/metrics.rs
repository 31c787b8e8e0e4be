// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row every time the model is evaluated on
// the validation split.
//
// Metrics recorded per evaluation:
//   - iteration:  training iterations completed so far
//   - epoch:      fractional epoch (iteration / batches per epoch)
//   - train_loss: loss of the most recent training step
//   - val_loss:   average per-timestep loss on the validation split
//                 (empty when the run has no validation batches)
//
// Output file: <checkpoint_dir>/metrics.csv
//
// Example CSV output:
//   iteration,epoch,train_loss,val_loss
//   1000,0.500,1.843210,1.901276
//   2000,1.000,1.512044,1.640912
//   ...
//
// A resumed run appends to the same file, so the curve of a
// run that was stopped and restarted stays in one place.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "iteration,epoch,train_loss,val_loss";

/// One row of the metrics CSV
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub iteration:  usize,
    pub epoch:      f64,
    pub train_loss: f64,

    /// None when the validation split is empty
    pub val_loss:   Option<f64>,
}

impl EvalMetrics {
    pub fn new(iteration: usize, epoch: f64, train_loss: f64, val_loss: Option<f64>) -> Self {
        Self { iteration, epoch, train_loss, val_loss }
    }
}

/// Appends evaluation metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EvalMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let val = m.val_loss.map(|v| format!("{v:.6}")).unwrap_or_default();
        writeln!(f, "{},{:.3},{:.6},{}", m.iteration, m.epoch, m.train_loss, val)?;

        tracing::debug!(
            "Logged metrics at iteration {}: train_loss={:.4}, val_loss={:?}",
            m.iteration,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_appended_after_single_header() {
        let dir = tempfile::tempdir().unwrap();

        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EvalMetrics::new(10, 0.5, 1.25, Some(1.5))).unwrap();

        // Reopening must not write a second header
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EvalMetrics::new(20, 1.0, 1.0, None)).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![HEADER, "10,0.500,1.250000,1.500000", "20,1.000,1.000000,"]);
    }
}
