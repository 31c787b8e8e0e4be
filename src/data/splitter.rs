// ============================================================
// Layer 4 — Train/Validation/Test Splitter
// ============================================================
// Decides how many of the corpus batches go to each split.
//
// The corpus is NOT shuffled: a character model is trained on
// contiguous text, so the splits are consecutive runs of
// batches in the order train, val, test.
//
// Batch counts:
//   ntrain = floor(n * train_fraction)
//   ntest  = floor(n * test_fraction)    test = 1 - train - val
//   nval   = n - ntrain - ntest          (rounding leftovers)
//
// Reference: Rust Book §8 (Vectors)

use crate::domain::error::CharLstmError;

// Tolerance for fractions like 0.95 + 0.05 that sum to 1 + ε
const FRACTION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitFractions {
    pub train: f64,
    pub val:   f64,
}

impl SplitFractions {
    pub fn new(train: f64, val: f64) -> Result<Self, CharLstmError> {
        let in_unit = |x: f64| (0.0..=1.0).contains(&x);
        if !in_unit(train) || !in_unit(val) || train + val > 1.0 + FRACTION_EPSILON {
            return Err(CharLstmError::InvalidSplit { train, val });
        }
        Ok(Self { train, val })
    }

    pub fn test(&self) -> f64 {
        (1.0 - self.train - self.val).max(0.0)
    }
}

/// Number of batches per split, indexed by `Split::index()`.
pub fn split_batches(total: usize, fractions: SplitFractions) -> [usize; 3] {
    let ntrain = floor_count(total, fractions.train);
    let ntest  = floor_count(total, fractions.test()).min(total - ntrain);
    let nval   = total - ntrain - ntest;

    tracing::debug!(
        "Batch split: {} train, {} val, {} test (of {})",
        ntrain, nval, ntest, total
    );

    [ntrain, nval, ntest]
}

fn floor_count(total: usize, fraction: f64) -> usize {
    ((total as f64 * fraction) + FRACTION_EPSILON).floor() as usize
}
