// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads the training text from a single UTF-8 file.
//
// There is exactly one corpus, so every problem here is fatal
// and is reported before any model is constructed:
//   - the file is missing or unreadable
//   - the bytes are not valid UTF-8
//   - the file is empty
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use std::{fs, path::PathBuf};

use anyhow::Result;

use crate::domain::error::CharLstmError;

pub struct CorpusLoader {
    /// Path to the corpus text file
    path: PathBuf,
}

impl CorpusLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the whole corpus into memory
    pub fn load(&self) -> Result<String> {
        let corpus_error = |reason: String| CharLstmError::Corpus {
            path: self.path.clone(),
            reason,
        };

        if !self.path.is_file() {
            return Err(corpus_error("file does not exist".to_string()).into());
        }

        let bytes = fs::read(&self.path).map_err(|e| corpus_error(e.to_string()))?;
        let text  = String::from_utf8(bytes)
            .map_err(|e| corpus_error(format!("not valid UTF-8: {e}")))?;

        if text.is_empty() {
            return Err(corpus_error("file is empty".to_string()).into());
        }

        tracing::info!(
            "Loaded corpus '{}' ({} characters)",
            self.path.display(),
            text.chars().count()
        );
        Ok(text)
    }
}
