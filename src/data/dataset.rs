// ============================================================
// Layer 4 — Character Split Loader
// ============================================================
// Cuts an encoded corpus into (X, Y) minibatches and serves
// them per split through the BatchSource trait.
//
// Layout: the corpus is divided into `batch_size` contiguous
// streams, one per batch row. Batch k holds columns
// [k*S, (k+1)*S) of every stream, so row r of batch k+1
// continues exactly where row r of batch k stopped. That is
// what makes carrying the hidden state from one batch to the
// next meaningful.
//
//   stream 0: |-- batch 0 --|-- batch 1 --|-- batch 2 --| ...
//   stream 1: |-- batch 0 --|-- batch 1 --|-- batch 2 --| ...
//
// Targets are read one character ahead of the inputs, so the
// corpus needs batch_size * S * n + 1 characters for n batches.
//
// Each split keeps its own cursor; reading past the last
// batch of a split wraps to its first batch.

use anyhow::Result;

use crate::data::splitter::{split_batches, SplitFractions};
use crate::domain::batch::{Batch, Split};
use crate::domain::error::CharLstmError;
use crate::domain::traits::BatchSource;
use crate::domain::vocab::Vocabulary;

pub struct CharSplitLoader {
    vocab:   Vocabulary,
    splits:  [Vec<Batch>; 3],
    cursors: [usize; 3],
}

impl CharSplitLoader {
    pub fn from_text(
        text:       &str,
        batch_size: usize,
        seq_len:    usize,
        fractions:  SplitFractions,
    ) -> Result<Self> {
        let vocab = Vocabulary::from_text(text);
        let ids   = vocab.encode(text)?;

        let per_batch = batch_size * seq_len;
        let n_batches = if per_batch == 0 { 0 } else { ids.len().saturating_sub(1) / per_batch };
        if n_batches == 0 {
            return Err(CharLstmError::CorpusTooSmall {
                characters: ids.len(),
                needed:     per_batch + 1,
            }
            .into());
        }

        let stream_len = n_batches * seq_len;
        let batches = (0..n_batches)
            .map(|k| cut_batch(&ids, k, batch_size, seq_len, stream_len))
            .collect::<Result<Vec<Batch>>>()?;

        let sizes = split_batches(n_batches, fractions);
        if sizes[Split::Train.index()] == 0 {
            return Err(CharLstmError::EmptySplit(Split::Train).into());
        }

        let mut rest  = batches;
        let test      = rest.split_off(sizes[0] + sizes[1]);
        let val       = rest.split_off(sizes[0]);
        let train     = rest;

        tracing::info!(
            "Vocabulary: {} symbols | batches: {} train, {} val, {} test ({}x{} each)",
            vocab.len(), train.len(), val.len(), test.len(), batch_size, seq_len
        );

        Ok(Self {
            vocab,
            splits:  [train, val, test],
            cursors: [0; 3],
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Advance the split's cursor by `n` batches without reading them
    pub fn skip(&mut self, split: Split, n: usize) {
        let size = self.size_of_split(split);
        if size > 0 {
            let i = split.index();
            self.cursors[i] = (self.cursors[i] + n) % size;
        }
    }
}

fn cut_batch(ids: &[u32], k: usize, batch_size: usize, seq_len: usize, stream_len: usize) -> Result<Batch> {
    let mut inputs  = Vec::with_capacity(batch_size * seq_len);
    let mut targets = Vec::with_capacity(batch_size * seq_len);
    for row in 0..batch_size {
        let start = row * stream_len + k * seq_len;
        inputs.extend_from_slice(&ids[start..start + seq_len]);
        targets.extend_from_slice(&ids[start + 1..start + seq_len + 1]);
    }
    Batch::new(inputs, targets, batch_size, seq_len)
}

impl BatchSource for CharSplitLoader {
    fn next_batch(&mut self, split: Split) -> Result<Batch> {
        let i       = split.index();
        let batches = &self.splits[i];
        if batches.is_empty() {
            return Err(CharLstmError::EmptySplit(split).into());
        }
        let batch = batches[self.cursors[i]].clone();
        self.cursors[i] = (self.cursors[i] + 1) % batches.len();
        Ok(batch)
    }

    fn reset_cursor(&mut self, split: Split) {
        self.cursors[split.index()] = 0;
    }

    fn size_of_split(&self, split: Split) -> usize {
        self.splits[split.index()].len()
    }
}
