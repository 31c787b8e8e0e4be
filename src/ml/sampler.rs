// ============================================================
// Layer 5 — Sampler
// ============================================================
// Autoregressive decoding with a trained model:
//
//   state = zeros (batch size 1)
//   id    = seed token
//   repeat `length` times:
//     log_probs, state = model.step([id], state)
//     id = pick(log_probs)      ← argmax or temperature draw
//     emit id
//
// The seed token itself is NOT part of the output.
//
// Pass the inference model (`model.valid()`) so that dropout
// is off and no autodiff graph is recorded.

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::activation::softmax};
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};

use crate::ml::model::{CharLstm, LstmState};

/// Id fed to the model when no primer text is given
pub const DEFAULT_SEED_TOKEN: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SamplingStrategy {
    /// Always the most likely next character
    #[default]
    Argmax,
    /// Draw from softmax(log_probs / t); t < 1 sharpens, t > 1 flattens
    Temperature(f64),
}

pub struct Sampler {
    strategy: SamplingStrategy,
}

impl Sampler {
    pub fn new(strategy: SamplingStrategy) -> Self {
        Self { strategy }
    }

    /// `length` ids generated after `seed_token`
    pub fn generate<B: Backend, R: Rng>(
        &self,
        model:      &CharLstm<B>,
        seed_token: u32,
        length:     usize,
        rng:        &mut R,
    ) -> Result<Vec<u32>> {
        self.continue_from(model, model.zero_state(1), seed_token, length, rng)
    }

    /// Warm the state on `primer[..n-1]`, then generate after `primer[n-1]`.
    /// An empty primer falls back to the default seed token.
    pub fn generate_from_primer<B: Backend, R: Rng>(
        &self,
        model:  &CharLstm<B>,
        primer: &[u32],
        length: usize,
        rng:    &mut R,
    ) -> Result<Vec<u32>> {
        let Some((&last, warmup)) = primer.split_last() else {
            return self.generate(model, DEFAULT_SEED_TOKEN, length, rng);
        };
        if let Some(&id) = primer.iter().find(|&&id| id as usize >= model.vocab_size) {
            anyhow::bail!("primer id {} outside vocabulary of {}", id, model.vocab_size);
        }

        let mut state = model.zero_state(1);
        for &id in warmup {
            state = model.step(&[id], &state)?.state;
        }
        self.continue_from(model, state, last, length, rng)
    }

    fn continue_from<B: Backend, R: Rng>(
        &self,
        model:     &CharLstm<B>,
        mut state: LstmState<B>,
        mut id:    u32,
        length:    usize,
        rng:       &mut R,
    ) -> Result<Vec<u32>> {
        anyhow::ensure!(
            (id as usize) < model.vocab_size,
            "seed token {} outside vocabulary of {}", id, model.vocab_size
        );

        let mut out = Vec::with_capacity(length);
        for _ in 0..length {
            let step = model.step(&[id], &state)?;
            id    = self.pick(step.log_probs, rng)?;
            state = step.state;
            out.push(id);
        }
        Ok(out)
    }

    fn pick<B: Backend, R: Rng>(&self, log_probs: Tensor<B, 2>, rng: &mut R) -> Result<u32> {
        match self.strategy {
            SamplingStrategy::Argmax => {
                let id = log_probs.argmax(1).into_scalar().elem::<i64>();
                Ok(id as u32)
            }
            SamplingStrategy::Temperature(t) => {
                anyhow::ensure!(t > 0.0, "temperature must be positive, got {}", t);
                let probs = softmax(log_probs.div_scalar(t), 1)
                    .into_data()
                    .to_vec::<f32>()
                    .map_err(|e| anyhow::anyhow!("{:?}", e))
                    .context("Failed to read sampling distribution")?;
                let dist = WeightedIndex::new(&probs)
                    .context("Sampling distribution has no positive weight")?;
                Ok(dist.sample(rng) as u32)
            }
        }
    }
}
