// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores complete training snapshots.
//
// What gets saved per checkpoint (one per validation):
//   1. lstm_iter{N}.mpk.gz — model weights, written by burn's
//                            DefaultRecorder (named MessagePack,
//                            gzip, full precision)
//   2. lstm_iter{N}.json   — everything else needed to rebuild
//                            and continue the run:
//                              • vocabulary (ordered symbols)
//                              • full TrainConfig
//                              • TrainingProgress (iteration,
//                                epoch, loss histories, lr)
//                              • name of the weights file
//   3. latest_checkpoint.json — name of the newest metadata file
//
// The weights alone can't be loaded: the model has to be
// rebuilt with the checkpoint's vocabulary size, hidden width
// and layer count before the record fits into it.
//
// File naming convention (N zero-padded to 6 digits):
//   checkpoints/
//     lstm_iter000500.mpk.gz
//     lstm_iter000500.json
//     lstm_iter001000.mpk.gz
//     lstm_iter001000.json
//     latest_checkpoint.json
//     metrics.csv
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{DefaultRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::domain::{progress::TrainingProgress, vocab::Vocabulary};
use crate::ml::model::{CharLstm, CharLstmConfig};

const LATEST_FILE: &str = "latest_checkpoint.json";

// Extension appended by DefaultRecorder; the stem passed to it must not contain dots
const WEIGHTS_EXTENSION: &str = "mpk.gz";

/// Contents of the JSON half of a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub vocabulary:   Vocabulary,
    pub config:       TrainConfig,
    pub progress:     TrainingProgress,
    /// File name of the weights, relative to the metadata file
    pub weights_file: String,
}

impl CheckpointMeta {
    /// Architecture the stored weights belong to
    pub fn model_config(&self) -> CharLstmConfig {
        CharLstmConfig::new(
            self.vocabulary.len(),
            self.config.hidden_width,
            self.config.num_layers,
        )
        .with_dropout(self.config.dropout)
    }
}

/// Writes checkpoints into one directory and reads them back.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save weights and metadata for the current iteration.
    /// Returns the path of the metadata file.
    pub fn save<B: Backend>(
        &self,
        model:      &CharLstm<B>,
        vocabulary: &Vocabulary,
        config:     &TrainConfig,
        progress:   &TrainingProgress,
    ) -> Result<PathBuf> {
        let stem = format!("lstm_iter{:06}", progress.iteration);

        // Recorder adds the extension itself
        let weights_path = self.dir.join(&stem);
        DefaultRecorder::new()
            .record(model.clone().into_record(), weights_path.clone())
            .with_context(|| {
                format!("Failed to save weights to '{}'", weights_path.display())
            })?;

        let meta = CheckpointMeta {
            vocabulary:   vocabulary.clone(),
            config:       config.clone(),
            progress:     progress.clone(),
            weights_file: format!("{stem}.{WEIGHTS_EXTENSION}"),
        };
        let meta_path = self.dir.join(format!("{stem}.json"));
        fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)
            .with_context(|| format!("Cannot write '{}'", meta_path.display()))?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&format!("{stem}.json"))?)
            .with_context(|| format!("Failed to write {LATEST_FILE}"))?;

        tracing::debug!("Saved checkpoint '{}'", meta_path.display());
        Ok(meta_path)
    }

    /// Path of the newest checkpoint written into this directory
    pub fn latest(&self) -> Result<PathBuf> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot find '{}'. Have you run 'train' first?",
                path.display()
            )
        })?;
        let name: String = serde_json::from_str(&s)
            .with_context(|| format!("Malformed '{}'", path.display()))?;
        Ok(self.dir.join(name))
    }

    pub fn load_meta(path: &Path) -> Result<CheckpointMeta> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;
        let meta: CheckpointMeta = serde_json::from_str(&json)
            .with_context(|| format!("Malformed checkpoint metadata '{}'", path.display()))?;
        anyhow::ensure!(
            !meta.vocabulary.is_empty(),
            "Checkpoint '{}' has an empty vocabulary", path.display()
        );
        Ok(meta)
    }

    /// Rebuild the model stored at `path` (a metadata file).
    ///
    /// With `active` set, the checkpoint's vocabulary must equal it;
    /// otherwise a `VocabularyMismatch` error is returned before any
    /// weights are read.
    pub fn load<B: Backend>(
        path:   &Path,
        active: Option<&Vocabulary>,
        device: &B::Device,
    ) -> Result<(CheckpointMeta, CharLstm<B>)> {
        let meta = Self::load_meta(path)?;
        if let Some(vocab) = active {
            vocab.ensure_matches(&meta.vocabulary)?;
        }

        let stem = meta
            .weights_file
            .strip_suffix(&format!(".{WEIGHTS_EXTENSION}"))
            .unwrap_or(&meta.weights_file)
            .to_string();
        let weights_path = path.parent().unwrap_or_else(|| Path::new(".")).join(stem);

        let record = DefaultRecorder::new()
            .load(weights_path.clone(), device)
            .with_context(|| {
                format!("Cannot load weights '{}'", weights_path.display())
            })?;
        let model = meta.model_config().init::<B>(device).load_record(record);

        tracing::info!(
            "Loaded checkpoint '{}' (iteration {}, {} layers × {})",
            path.display(),
            meta.progress.iteration,
            meta.config.num_layers,
            meta.config.hidden_width,
        );
        Ok((meta, model))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::domain::error::CharLstmError;

    type TestBackend = NdArray;

    fn setup(dir: &Path) -> (CheckpointManager, CharLstm<TestBackend>, Vocabulary, TrainConfig) {
        let vocab  = Vocabulary::from_text("abcd");
        let config = TrainConfig { hidden_width: 7, num_layers: 2, ..TrainConfig::default() };
        let model  = CharLstmConfig::new(vocab.len(), 7, 2).init::<TestBackend>(&Default::default());
        (CheckpointManager::new(dir).unwrap(), model, vocab, config)
    }

    #[test]
    fn test_round_trip_reproduces_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, model, vocab, config) = setup(dir.path());

        let mut progress = TrainingProgress::new(1e-3);
        progress.record_train(42, 10, 1.5);
        progress.record_val(42, 1.7);
        let path = ckpt.save(&model, &vocab, &config, &progress).unwrap();
        assert!(path.ends_with("lstm_iter000042.json"));
        assert!(dir.path().join("lstm_iter000042.mpk.gz").exists());

        let (meta, loaded) =
            CheckpointManager::load::<TestBackend>(&path, Some(&vocab), &Default::default()).unwrap();
        assert_eq!(meta.vocabulary, vocab);
        assert_eq!(meta.progress.iteration, 42);
        assert_eq!(meta.progress.val_losses.get(&42), Some(&1.7));

        let a = model.step(&[0, 3], &model.zero_state(2)).unwrap().log_probs;
        let b = loaded.step(&[0, 3], &loaded.zero_state(2)).unwrap().log_probs;
        let diff = (a - b).abs().max().into_scalar().elem::<f32>();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_vocabulary_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, model, vocab, config) = setup(dir.path());
        let path = ckpt.save(&model, &vocab, &config, &TrainingProgress::new(1e-3)).unwrap();

        let other = Vocabulary::from_text("abce");
        let err = CheckpointManager::load::<TestBackend>(&path, Some(&other), &Default::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CharLstmError>(),
            Some(CharLstmError::VocabularyMismatch { .. })
        ));
    }

    #[test]
    fn test_latest_points_to_newest() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, model, vocab, config) = setup(dir.path());
        assert!(ckpt.latest().is_err());

        let mut progress = TrainingProgress::new(1e-3);
        progress.record_train(5, 10, 2.0);
        ckpt.save(&model, &vocab, &config, &progress).unwrap();
        progress.record_train(10, 10, 1.9);
        let newest = ckpt.save(&model, &vocab, &config, &progress).unwrap();

        assert_eq!(ckpt.latest().unwrap(), newest);
        let meta = CheckpointManager::load_meta(&newest).unwrap();
        assert_eq!(meta.config.hidden_width, 7);
        assert_eq!(meta.model_config().vocab_size, 4);
    }

    #[test]
    fn test_empty_vocabulary_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, model, vocab, config) = setup(dir.path());
        let path = ckpt.save(&model, &vocab, &config, &TrainingProgress::new(1e-3)).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        json["vocabulary"] = serde_json::json!([]);
        fs::write(&path, json.to_string()).unwrap();

        let err = CheckpointManager::load_meta(&path).unwrap_err();
        assert!(err.to_string().contains("empty vocabulary"));
    }
}
