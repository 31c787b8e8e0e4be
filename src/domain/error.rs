// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// The failures the rest of the system needs to tell apart.
// Everything else travels as a plain anyhow::Error with
// context attached at the point of failure.
//
// Callers that need to react to a specific failure (tests,
// the resume path) use `err.downcast_ref::<CharLstmError>()`.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::batch::Split;

#[derive(Debug, Error)]
pub enum CharLstmError {
    /// The checkpoint was trained on a different character set
    #[error(
        "vocabulary mismatch: checkpoint has {checkpoint_size} symbols, corpus has {corpus_size} \
         (first difference: {first_difference})"
    )]
    VocabularyMismatch {
        checkpoint_size:  usize,
        corpus_size:      usize,
        first_difference: String,
    },

    #[error("symbol {0:?} is not in the vocabulary")]
    UnknownSymbol(char),

    #[error("id {id} is outside the vocabulary of {size} symbols")]
    UnknownId { id: u32, size: usize },

    /// Missing, unreadable, empty or too-small corpus file
    #[error("corpus '{path}': {reason}")]
    Corpus { path: PathBuf, reason: String },

    #[error("corpus of {characters} characters is too small: one batch needs {needed}")]
    CorpusTooSmall { characters: usize, needed: usize },

    #[error("invalid split fractions: train={train}, val={val} (each in [0, 1], sum at most 1)")]
    InvalidSplit { train: f64, val: f64 },

    #[error("split {0} has no batches")]
    EmptySplit(Split),
}
