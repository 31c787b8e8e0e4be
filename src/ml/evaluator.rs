// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Average per-timestep loss of a model over a whole split.
//
// Differences from training:
//   - takes the inference model (`model.valid()`), so dropout
//     is off and no autodiff graph is built
//   - every batch starts from a zero state; nothing is carried
//     from one batch to the next
//   - parameters and the engine's carried state are untouched

use anyhow::Result;
use burn::prelude::*;

use crate::domain::batch::Split;
use crate::domain::traits::BatchSource;
use crate::ml::model::{nll_loss, CharLstm};

/// Mean loss over every batch of `split`, or None if the split is empty.
pub fn evaluate_split<B: Backend, S: BatchSource>(
    model:  &CharLstm<B>,
    source: &mut S,
    split:  Split,
) -> Result<Option<f64>> {
    let n_batches = source.size_of_split(split);
    if n_batches == 0 {
        tracing::warn!("Split {} has no batches, skipping evaluation", split);
        return Ok(None);
    }

    source.reset_cursor(split);

    let mut loss_sum = 0.0f64;
    for _ in 0..n_batches {
        let batch     = source.next_batch(split)?;
        let mut state = model.zero_state(batch.batch_size());
        let mut batch_loss = 0.0f64;
        for t in 0..batch.seq_len() {
            let out = model.step(&batch.input_column(t), &state)?;
            batch_loss += nll_loss(out.log_probs, &batch.target_column(t))
                .into_scalar()
                .elem::<f64>();
            state = out.state;
        }
        loss_sum += batch_loss / batch.seq_len() as f64;
    }

    let avg = loss_sum / n_batches as f64;
    tracing::debug!("Evaluated {} batches of split {}: loss={:.4}", n_batches, split, avg);
    Ok(Some(avg))
}
