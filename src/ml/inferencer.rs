// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Loads a checkpoint onto the CPU backend and generates text.
use anyhow::Result;
use std::path::Path;
use burn::backend::{ndarray::NdArrayDevice, NdArray};
use rand::{rngs::StdRng, SeedableRng};

use crate::domain::vocab::Vocabulary;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::CharLstm;
use crate::ml::sampler::{Sampler, SamplingStrategy};

type InferBackend = NdArray;

pub struct Inferencer {
    model:      CharLstm<InferBackend>,
    vocabulary: Vocabulary,
}

impl Inferencer {
    pub fn from_checkpoint(path: &Path) -> Result<Self> {
        let device = NdArrayDevice::Cpu;
        let (meta, model) = CheckpointManager::load::<InferBackend>(path, None, &device)?;
        tracing::info!("Model loaded from checkpoint (iteration {})", meta.progress.iteration);
        Ok(Self { model, vocabulary: meta.vocabulary })
    }

    /// The primer followed by `length` generated characters.
    pub fn generate(
        &self,
        primer:   &str,
        length:   usize,
        strategy: SamplingStrategy,
        seed:     u64,
    ) -> Result<String> {
        let primer_ids = self.vocabulary.encode(primer)?;
        let mut rng    = StdRng::seed_from_u64(seed);
        let ids = Sampler::new(strategy).generate_from_primer(&self.model, &primer_ids, length, &mut rng)?;

        let text = self.vocabulary.decode(&ids)?;
        tracing::debug!("Generated {} characters after a {}-character primer", length, primer_ids.len());
        Ok(format!("{primer}{text}"))
    }
}
