// ============================================================
// Layer 3 — Training Progress
// ============================================================
// Everything about "where the run is" that must survive a
// restart: iteration counter, fractional epoch, the loss
// histories and the current learning rate.
//
// Stored inside every checkpoint so a resumed run picks up
// its histories and schedule where they left off.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result of one training step (one feval plus optimizer update)
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Summed NLL divided by the number of timesteps in the batch
    pub loss: f64,

    /// Length of every truncation window processed, in order
    pub windows: Vec<usize>,

    /// L2 norm of the gradient after clipping
    pub grad_norm: f64,

    /// L2 norm of the parameters before the update
    pub param_norm: f64,
}

impl StepReport {
    pub fn grad_to_param_ratio(&self) -> f64 {
        if self.param_norm > 0.0 {
            self.grad_norm / self.param_norm
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingProgress {
    /// Last completed iteration (1-based, 0 before training)
    pub iteration: usize,

    /// iteration / iterations_per_epoch
    pub epoch: f64,

    /// train_losses[i] is the loss of iteration i + 1
    pub train_losses: Vec<f64>,

    /// iteration → validation loss
    pub val_losses: BTreeMap<usize, f64>,

    pub best_val_loss: Option<f64>,

    pub learning_rate: f64,
}

impl TrainingProgress {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            iteration: 0,
            epoch: 0.0,
            train_losses: Vec::new(),
            val_losses: BTreeMap::new(),
            best_val_loss: None,
            learning_rate,
        }
    }

    pub fn record_train(&mut self, iteration: usize, iterations_per_epoch: usize, loss: f64) {
        self.iteration = iteration;
        self.epoch     = iteration as f64 / iterations_per_epoch.max(1) as f64;
        self.train_losses.push(loss);
    }

    /// Record a validation loss; returns true when it is the best so far.
    pub fn record_val(&mut self, iteration: usize, loss: f64) -> bool {
        self.val_losses.insert(iteration, loss);
        let improved = self.best_val_loss.map_or(true, |best| loss < best);
        if improved {
            self.best_val_loss = Some(loss);
        }
        improved
    }

    pub fn first_train_loss(&self) -> Option<f64> {
        self.train_losses.first().copied()
    }
}
