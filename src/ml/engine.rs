// ============================================================
// Layer 5 — Truncated BPTT Engine
// ============================================================
// Owns everything that changes during training: the model,
// the optimizer, the learning rate and the recurrent state
// carried from one truncation window to the next.
//
// One feval over a batch of S timesteps:
//
//   windows = [0..W) [W..2W) ... [kW..S)     (last one shorter)
//
//   for each window:
//     forward  — step the model once per timestep, starting
//                from the carried state
//     loss     — batch-mean NLL per timestep, summed, / S
//     backward — loss.backward(); the carried state was
//                detached, so no gradient leaves the window
//     carry    — the window's final state (values only)
//
//   clip every gradient element to [-clip, clip]
//
// The state keeps flowing across windows AND across batches
// until reset_state() is called at the start of an epoch.
//
// Key Burn insight:
//   - Each window is its own autodiff graph; gradients of the
//     separate graphs are summed with a GradientsAccumulator
//   - `.detach()` on the carried state is the truncation

use anyhow::Result;
use burn::{
    optim::{GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::domain::batch::Batch;
use crate::domain::progress::StepReport;
use crate::ml::gradients::clip_gradients;
use crate::ml::model::{nll_loss, CharLstm, LstmState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Timesteps per truncation window
    pub window_length: usize,
    /// Elementwise gradient bound; non-positive disables clipping
    pub clip_value:    f64,
}

/// Consecutive [start, end) spans of at most `window_length` covering `0..seq_len`.
pub fn window_spans(seq_len: usize, window_length: usize) -> Result<Vec<std::ops::Range<usize>>> {
    anyhow::ensure!(window_length > 0, "window length must be positive");
    Ok((0..seq_len)
        .step_by(window_length)
        .map(|start| start..(start + window_length).min(seq_len))
        .collect())
}

pub struct TbpttEngine<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<CharLstm<B>, B>,
{
    model:         CharLstm<B>,
    optim:         O,
    settings:      EngineSettings,
    learning_rate: f64,
    carried:       Option<LstmState<B>>,
}

impl<B, O> TbpttEngine<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<CharLstm<B>, B>,
{
    pub fn new(model: CharLstm<B>, optim: O, settings: EngineSettings, learning_rate: f64) -> Self {
        Self { model, optim, settings, learning_rate, carried: None }
    }

    pub fn model(&self) -> &CharLstm<B> {
        &self.model
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    /// State that the next window will start from; None means zeros
    pub fn carried_state(&self) -> Option<&LstmState<B>> {
        self.carried.as_ref()
    }

    /// Forget the carried state; the next window starts from zeros
    pub fn reset_state(&mut self) {
        self.carried = None;
    }

    /// Forward and backward over every window of `batch`.
    ///
    /// Returns the normalized loss, the window lengths and the clipped
    /// gradients. Parameters are not touched; the carried state is.
    pub fn feval(&mut self, batch: &Batch) -> Result<(StepReport, GradientsParams)> {
        let seq_len = batch.seq_len();
        anyhow::ensure!(seq_len > 0, "batch has no timesteps");
        let spans = window_spans(seq_len, self.settings.window_length)?;

        let mut state = match self.carried.take() {
            Some(s) if s.batch_size() == batch.batch_size() => s,
            Some(_) => {
                tracing::warn!("Batch size changed, carried state reset to zeros");
                self.model.zero_state(batch.batch_size())
            }
            None => self.model.zero_state(batch.batch_size()),
        };

        let mut accumulator = GradientsAccumulator::<CharLstm<B>>::new();
        let mut total_loss  = 0.0f64;
        let mut windows     = Vec::new();
        let device          = self.model.device();

        for span in spans {
            let mut window_loss = Tensor::<B, 1>::zeros([1], &device);
            for t in span.clone() {
                let out = self.model.step(&batch.input_column(t), &state)?;
                window_loss = window_loss + nll_loss(out.log_probs, &batch.target_column(t));
                state = out.state;
            }
            let window_loss = window_loss.div_scalar(seq_len as f64);
            total_loss += window_loss.clone().into_scalar().elem::<f64>();

            let grads = GradientsParams::from_grads(window_loss.backward(), &self.model);
            accumulator.accumulate(&self.model, grads);

            // Values cross the window boundary, gradients do not
            state = state.detach();
            windows.push(span.len());
        }
        self.carried = Some(state);

        let mut grads = accumulator.grads();
        let stats     = clip_gradients(&self.model, &mut grads, self.settings.clip_value);

        tracing::trace!(
            "feval: loss={:.6} windows={:?} grad_norm={:.4e}",
            total_loss, windows, stats.grad_norm
        );

        let report = StepReport {
            loss: total_loss,
            windows,
            grad_norm: stats.grad_norm,
            param_norm: stats.param_norm,
        };
        Ok((report, grads))
    }

    /// feval followed by one optimizer update of the parameters
    pub fn train_step(&mut self, batch: &Batch) -> Result<StepReport> {
        let (report, grads) = self.feval(batch)?;
        self.model = self.optim.step(self.learning_rate, self.model.clone(), grads);
        Ok(report)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        module::AutodiffModule,
        optim::RmsPropConfig,
    };

    use crate::ml::model::CharLstmConfig;

    type TestBackend = Autodiff<NdArray>;

    // Vocabulary {a, b, c} → ids {0, 1, 2}; two rows of 7 timesteps
    fn abc_batch() -> Batch {
        let x = vec![0, 1, 2, 0, 1, 2, 0, 2, 1, 0, 2, 1, 0, 2];
        let y = vec![1, 2, 0, 1, 2, 0, 1, 1, 0, 2, 1, 0, 2, 1];
        Batch::new(x, y, 2, 7).unwrap()
    }

    fn engine(clip: f64) -> TbpttEngine<TestBackend, impl Optimizer<CharLstm<TestBackend>, TestBackend>> {
        TestBackend::seed(7);
        let model = CharLstmConfig::new(3, 6, 2).init::<TestBackend>(&Default::default());
        let optim = RmsPropConfig::new().with_alpha(0.95).with_epsilon(1e-8).init();
        let settings = EngineSettings { window_length: 3, clip_value: clip };
        TbpttEngine::new(model, optim, settings, 2e-3)
    }

    fn max_diff<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> f32 {
        (a - b).abs().max().into_scalar().elem::<f32>()
    }

    /// Loss and final state of an untruncated pass, optionally resetting at window starts
    fn reference_pass<B: Backend>(
        model: &CharLstm<B>,
        batch: &Batch,
        reset_every: Option<usize>,
    ) -> (f64, LstmState<B>) {
        run_pass(model, batch, model.zero_state(batch.batch_size()), reset_every)
    }

    fn continue_pass<B: Backend>(model: &CharLstm<B>, batch: &Batch, state: LstmState<B>) -> (f64, LstmState<B>) {
        run_pass(model, batch, state, None)
    }

    fn run_pass<B: Backend>(
        model: &CharLstm<B>,
        batch: &Batch,
        mut state: LstmState<B>,
        reset_every: Option<usize>,
    ) -> (f64, LstmState<B>) {
        let mut total = 0.0;
        for t in 0..batch.seq_len() {
            if let Some(w) = reset_every {
                if t % w == 0 {
                    state = model.zero_state(batch.batch_size());
                }
            }
            let out = model.step(&batch.input_column(t), &state).unwrap();
            total += nll_loss(out.log_probs, &batch.target_column(t)).into_scalar().elem::<f64>();
            state = out.state;
        }
        (total / batch.seq_len() as f64, state)
    }

    #[test]
    fn test_window_spans_with_remainder() {
        assert_eq!(window_spans(7, 3).unwrap(), vec![0..3, 3..6, 6..7]);
        assert_eq!(window_spans(6, 3).unwrap(), vec![0..3, 3..6]);
        assert_eq!(window_spans(2, 5).unwrap(), vec![0..2]);
        assert!(window_spans(0, 3).unwrap().is_empty());
    }

    #[test]
    fn test_zero_window_length_is_an_error() {
        assert!(window_spans(7, 0).is_err());

        let model = CharLstmConfig::new(3, 6, 1).init::<TestBackend>(&Default::default());
        let optim = RmsPropConfig::new().init();
        let settings = EngineSettings { window_length: 0, clip_value: 5.0 };
        let mut e = TbpttEngine::new(model, optim, settings, 2e-3);
        assert!(e.train_step(&abc_batch()).is_err());
    }

    #[test]
    fn test_seven_steps_make_three_windows() {
        let mut e  = engine(5.0);
        let report = e.train_step(&abc_batch()).unwrap();
        assert_eq!(report.windows, vec![3, 3, 1]);
    }

    #[test]
    fn test_state_threads_across_all_windows() {
        let mut e  = engine(5.0);
        let batch  = abc_batch();
        let before = e.model().valid();

        e.feval(&batch).unwrap();
        let carried = e.carried_state().unwrap().clone();

        let (_, threaded) = reference_pass(&before, &batch, None);
        let (_, reset)    = reference_pass(&before, &batch, Some(3));

        for (layer, (c, r)) in carried.layers.iter().zip(&threaded.layers).enumerate() {
            let d = max_diff(c.hidden.clone().inner(), r.hidden.clone());
            assert!(d < 1e-5, "layer {layer} hidden differs by {d}");
            let d = max_diff(c.cell.clone().inner(), r.cell.clone());
            assert!(d < 1e-5, "layer {layer} cell differs by {d}");
        }

        // Resetting at window boundaries would have produced a different state
        let top = carried.layers.len() - 1;
        let d   = max_diff(carried.layers[top].hidden.clone().inner(), reset.layers[top].hidden.clone());
        assert!(d > 1e-6);
    }

    #[test]
    fn test_loss_is_nll_over_timesteps() {
        let mut e  = engine(5.0);
        let batch  = abc_batch();
        let before = e.model().valid();

        let (report, _) = e.feval(&batch).unwrap();
        let (expected, _) = reference_pass(&before, &batch, None);
        assert!((report.loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_state_carries_into_next_batch() {
        // feval leaves the parameters alone, so two fevals equal one long pass
        let mut e  = engine(5.0);
        let batch  = abc_batch();
        let before = e.model().valid();

        e.feval(&batch).unwrap();
        e.feval(&batch).unwrap();
        let carried = e.carried_state().unwrap().clone();

        let (_, first)  = reference_pass(&before, &batch, None);
        let (_, second) = continue_pass(&before, &batch, first);
        let top = carried.layers.len() - 1;
        let d   = max_diff(carried.layers[top].hidden.clone().inner(), second.layers[top].hidden.clone());
        assert!(d < 1e-5);

        e.reset_state();
        assert!(e.carried_state().is_none());
    }

    #[test]
    fn test_clipped_gradients_within_bound() {
        let mut e       = engine(1e-4);
        let (report, _) = e.feval(&abc_batch()).unwrap();
        let n_params: usize = e.model().num_params();
        // Every element lies in [-1e-4, 1e-4], so the norm is bounded by sqrt(n) * 1e-4
        assert!(report.grad_norm <= (n_params as f64).sqrt() * 1e-4 + 1e-9);
    }

    #[test]
    fn test_train_step_updates_parameters() {
        let mut e   = engine(5.0);
        let before  = e.model().valid().decoder.weight.val();
        e.train_step(&abc_batch()).unwrap();
        let after   = e.model().valid().decoder.weight.val();
        assert!(max_diff(before, after) > 0.0);
    }

    #[test]
    fn test_training_lowers_loss_on_repeated_batch() {
        let mut e = engine(5.0);
        e.set_learning_rate(1e-2);
        let batch = abc_batch();
        let first = e.train_step(&batch).unwrap().loss;
        let mut last = first;
        for _ in 0..30 {
            e.reset_state();
            last = e.train_step(&batch).unwrap().loss;
        }
        assert!(last < first, "loss went from {first} to {last}");
    }
}
