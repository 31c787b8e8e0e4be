// ============================================================
// Layer 3 — Batches and Splits
// ============================================================
// A Batch is a pair of id matrices (X, Y), both of shape
// [batch_size, seq_len], stored row-major as plain Vec<u32>.
// Y is X shifted one position to the left: the target at
// every position is the next character.
//
// The engine consumes a batch one timestep (column) at a
// time, so column accessors are the main API here.

use std::fmt;

use anyhow::Result;

use serde::{Deserialize, Serialize};

/// The three corpus partitions, numbered like the batch source contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Split {
    Train = 1,
    Val   = 2,
    Test  = 3,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    /// Zero-based position, for indexing per-split arrays
    pub fn index(self) -> usize {
        self as usize - 1
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Split::Train => "train",
            Split::Val   => "val",
            Split::Test  => "test",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    inputs:     Vec<u32>,
    targets:    Vec<u32>,
    batch_size: usize,
    seq_len:    usize,
}

impl Batch {
    pub fn new(inputs: Vec<u32>, targets: Vec<u32>, batch_size: usize, seq_len: usize) -> Result<Self> {
        let cells = batch_size * seq_len;
        anyhow::ensure!(
            inputs.len() == cells && targets.len() == cells,
            "batch of {}x{} needs {} ids, got {} inputs and {} targets",
            batch_size, seq_len, cells, inputs.len(), targets.len()
        );
        Ok(Self { inputs, targets, batch_size, seq_len })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn input(&self, row: usize, t: usize) -> u32 {
        self.inputs[row * self.seq_len + t]
    }

    pub fn target(&self, row: usize, t: usize) -> u32 {
        self.targets[row * self.seq_len + t]
    }

    /// X[:, t]: the ids fed to the model at timestep t
    pub fn input_column(&self, t: usize) -> Vec<u32> {
        (0..self.batch_size).map(|row| self.input(row, t)).collect()
    }

    /// Y[:, t]: the ids the model should predict at timestep t
    pub fn target_column(&self, t: usize) -> Vec<u32> {
        (0..self.batch_size).map(|row| self.target(row, t)).collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_are_read_row_major() {
        // rows: [0 1 2] and [3 4 5]
        let batch = Batch::new(vec![0, 1, 2, 3, 4, 5], vec![1, 2, 9, 4, 5, 9], 2, 3).unwrap();
        assert_eq!(batch.input_column(0), vec![0, 3]);
        assert_eq!(batch.input_column(2), vec![2, 5]);
        assert_eq!(batch.target_column(1), vec![2, 5]);
    }

    #[test]
    fn test_split_numbering() {
        assert_eq!(Split::Train as u8, 1);
        assert_eq!(Split::Test.index(), 2);
        assert_eq!(Split::Val.to_string(), "val");
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        assert!(Batch::new(vec![0, 1, 2], vec![1, 2, 3], 2, 2).is_err());
        assert!(Batch::new(vec![0, 1, 2, 3], vec![1, 2, 3], 2, 2).is_err());
    }
}
