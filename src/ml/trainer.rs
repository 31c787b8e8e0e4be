// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Iteration-based training schedule over a TrainSession.
//
// One iteration = one training batch = one engine step:
//
//   for iteration in start+1 ..= batches_per_epoch * max_epochs:
//     epoch start?       → session.begin_epoch (state reset)
//     step               → session.train_step
//     divergence guard   → halt on NaN/inf or loss > 3× first loss
//     every print_every  → progress line on stdout
//     epoch end?         → learning-rate decay once past decay_start
//     every eval_every   → validation loss, sample text,
//       (and at the end)   checkpoint + metrics row
//
// The schedule only talks to the TrainSession trait; LstmSession
// is the burn-backed implementation used by the CLI.
//
// Key Burn insight:
//   - Training uses Autodiff<NdArray> (or Autodiff<Wgpu>)
//   - Evaluation and sampling use model.valid(), the same
//     weights on the inner backend with dropout disabled
//
// Reference: Burn Book §5, Tieleman & Hinton (2012) RMSProp

use anyhow::Result;
use std::{path::PathBuf, time::Instant};
use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    module::AutodiffModule,
    optim::{Optimizer, RmsPropConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::application::train_use_case::{Accelerator, TrainConfig};
use crate::data::dataset::CharSplitLoader;
use crate::domain::{
    batch::Split,
    progress::{StepReport, TrainingProgress},
    traits::{BatchSource, TrainSession},
    vocab::Vocabulary,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EvalMetrics, MetricsLogger},
};
use crate::ml::{
    engine::{EngineSettings, TbpttEngine},
    evaluator::evaluate_split,
    model::{CharLstm, CharLstmConfig},
    sampler::{Sampler, SamplingStrategy, DEFAULT_SEED_TOKEN},
};

// ─── Schedule ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    /// Number of training batches, one iteration each
    pub iterations_per_epoch: usize,
    pub max_epochs:           usize,
    pub eval_interval:        usize,
    pub print_interval:       usize,
    pub learning_rate_decay:  f64,
    /// Decay applies at the end of every epoch >= this one
    pub decay_start_epoch:    usize,
}

impl Schedule {
    pub fn from_config(cfg: &TrainConfig, iterations_per_epoch: usize) -> Self {
        Self {
            iterations_per_epoch,
            max_epochs:          cfg.max_epochs,
            eval_interval:       cfg.eval_interval,
            print_interval:      cfg.print_interval,
            learning_rate_decay: cfg.learning_rate_decay,
            decay_start_epoch:   cfg.decay_start_epoch,
        }
    }

    pub fn total_iterations(&self) -> usize {
        self.iterations_per_epoch * self.max_epochs
    }
}

// ─── Divergence Guard ─────────────────────────────────────────────────────────
/// Stops a run whose loss is no longer a number or has blown up
/// relative to the first loss of the run.
#[derive(Debug, Clone)]
pub struct DivergenceGuard {
    factor:     f64,
    first_loss: Option<f64>,
}

impl DivergenceGuard {
    pub const DEFAULT_FACTOR: f64 = 3.0;

    /// `first_loss` is known when resuming; otherwise the first checked loss becomes it
    pub fn new(first_loss: Option<f64>) -> Self {
        Self { factor: Self::DEFAULT_FACTOR, first_loss }
    }

    pub fn is_diverged(&mut self, loss: f64) -> bool {
        if !loss.is_finite() {
            return true;
        }
        let first = *self.first_loss.get_or_insert(loss);
        loss > self.factor * first
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    Completed,
    Diverged { iteration: usize, loss: f64 },
}

// ─── Schedule Loop ────────────────────────────────────────────────────────────
/// Run iterations `progress.iteration + 1 ..= total`, updating `progress` in place.
pub fn run_schedule<S: TrainSession>(
    session:  &mut S,
    schedule: &Schedule,
    progress: &mut TrainingProgress,
) -> Result<RunOutcome> {
    let total          = schedule.total_iterations();
    let per_epoch      = schedule.iterations_per_epoch.max(1);
    let eval_every     = schedule.eval_interval.max(1);
    let print_every    = schedule.print_interval.max(1);
    let start          = progress.iteration;
    let mut guard      = DivergenceGuard::new(progress.first_train_loss());
    let mut learning_rate = progress.learning_rate;
    session.set_learning_rate(learning_rate);

    if start >= total {
        tracing::info!("Already at iteration {} of {}, nothing to train", start, total);
        return Ok(RunOutcome::Completed);
    }
    tracing::info!("Training iterations {}..={} ({} per epoch)", start + 1, total, per_epoch);

    for iteration in (start + 1)..=total {
        // A resumed run re-enters its epoch with a fresh state
        if (iteration - 1) % per_epoch == 0 || iteration == start + 1 {
            session.begin_epoch((iteration - 1) / per_epoch + 1);
        }

        let timer  = Instant::now();
        let report = session.train_step()?;
        let secs   = timer.elapsed().as_secs_f64();

        if report.loss.is_finite() {
            progress.record_train(iteration, per_epoch, report.loss);
        }
        if guard.is_diverged(report.loss) {
            tracing::warn!(
                "Loss is exploding ({:.4} at iteration {}), aborting",
                report.loss, iteration
            );
            return Ok(RunOutcome::Diverged { iteration, loss: report.loss });
        }

        if iteration % print_every == 0 {
            print_progress(iteration, total, progress.epoch, &report, secs);
        }

        // ── Learning-rate decay at epoch end ──────────────────────────────────
        if iteration % per_epoch == 0 {
            let finished = iteration / per_epoch;
            if schedule.learning_rate_decay < 1.0 && finished >= schedule.decay_start_epoch {
                learning_rate *= schedule.learning_rate_decay;
                session.set_learning_rate(learning_rate);
                progress.learning_rate = learning_rate;
                tracing::info!(
                    "Decayed learning rate by a factor {} to {:.6e}",
                    schedule.learning_rate_decay, learning_rate
                );
            }
        }

        if iteration % eval_every == 0 || iteration == total {
            evaluate_and_checkpoint(session, progress)?;
        }
    }

    tracing::info!("Training complete!");
    Ok(RunOutcome::Completed)
}

fn print_progress(iteration: usize, total: usize, epoch: f64, report: &StepReport, secs: f64) {
    println!(
        "{}/{} (epoch {:.3}), train_loss = {:.8}, grad/param norm = {:.4e}, time/batch = {:.4}s",
        iteration,
        total,
        epoch,
        report.loss,
        report.grad_to_param_ratio(),
        secs,
    );
}

fn evaluate_and_checkpoint<S: TrainSession>(
    session:  &mut S,
    progress: &mut TrainingProgress,
) -> Result<()> {
    if let Some(val_loss) = session.validation_loss()? {
        let best = progress.record_val(progress.iteration, val_loss);
        println!(
            "validation loss = {:.4}{}",
            val_loss,
            if best { " (best so far)" } else { "" }
        );
    }

    let text = session.sample()?;
    println!("---- sample ----\n{}\n----------------", text);

    let path = session.checkpoint(progress)?;
    tracing::info!("Checkpoint saved: '{}'", path.display());
    Ok(())
}

// ─── LstmSession ──────────────────────────────────────────────────────────────
/// TrainSession backed by a burn model, the corpus loader and the
/// checkpoint directory.
pub struct LstmSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<CharLstm<B>, B>,
{
    engine:  TbpttEngine<B, O>,
    loader:  CharSplitLoader,
    ckpt:    CheckpointManager,
    metrics: MetricsLogger,
    vocab:   Vocabulary,
    config:  TrainConfig,
    sampler: Sampler,
    rng:     StdRng,
}

impl<B, O> TrainSession for LstmSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<CharLstm<B>, B>,
{
    fn begin_epoch(&mut self, epoch: usize) {
        tracing::debug!("Epoch {}: recurrent state reset", epoch);
        self.engine.reset_state();
    }

    fn train_step(&mut self) -> Result<StepReport> {
        let batch = self.loader.next_batch(Split::Train)?;
        self.engine.train_step(&batch)
    }

    fn validation_loss(&mut self) -> Result<Option<f64>> {
        evaluate_split(&self.engine.model().valid(), &mut self.loader, Split::Val)
    }

    fn sample(&mut self) -> Result<String> {
        let ids = self.sampler.generate(
            &self.engine.model().valid(),
            DEFAULT_SEED_TOKEN,
            self.config.sample_length,
            &mut self.rng,
        )?;
        Ok(self.vocab.decode(&ids)?)
    }

    fn checkpoint(&mut self, progress: &TrainingProgress) -> Result<PathBuf> {
        let path = self.ckpt.save(self.engine.model(), &self.vocab, &self.config, progress)?;

        let train_loss = progress.train_losses.last().copied().unwrap_or(f64::NAN);
        let val_loss   = progress.val_losses.get(&progress.iteration).copied();
        self.metrics.log(&EvalMetrics::new(progress.iteration, progress.epoch, train_loss, val_loss))?;
        Ok(path)
    }

    fn set_learning_rate(&mut self, learning_rate: f64) {
        self.engine.set_learning_rate(learning_rate);
    }
}

// ─── Entry Point ──────────────────────────────────────────────────────────────
/// Pick the backend for `cfg.device` and train.
///
/// `resume` is the metadata path of a checkpoint whose vocabulary
/// has already been checked against the loader's.
pub fn run_training(
    cfg:    &TrainConfig,
    loader: CharSplitLoader,
    resume: Option<PathBuf>,
    ckpt:   CheckpointManager,
) -> Result<RunOutcome> {
    match cfg.device {
        Accelerator::Gpu => {
            #[cfg(feature = "wgpu")]
            {
                let device = burn::backend::wgpu::WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                return train_loop::<Autodiff<burn::backend::Wgpu>>(cfg, loader, resume, ckpt, device);
            }
            #[cfg(not(feature = "wgpu"))]
            tracing::warn!("GPU requested but built without the `wgpu` feature, using the CPU");
        }
        Accelerator::Cpu => {}
    }

    let device = NdArrayDevice::Cpu;
    tracing::info!("Using NdArray device: {:?}", device);
    train_loop::<Autodiff<NdArray>>(cfg, loader, resume, ckpt, device)
}

fn train_loop<B: AutodiffBackend>(
    cfg:        &TrainConfig,
    mut loader: CharSplitLoader,
    resume:     Option<PathBuf>,
    ckpt:       CheckpointManager,
    device:     B::Device,
) -> Result<RunOutcome> {
    B::seed(cfg.seed);
    let vocab = loader.vocabulary().clone();

    // ── Build or restore the model ────────────────────────────────────────────
    let (model, mut progress) = match resume {
        Some(path) => {
            let (meta, model) = CheckpointManager::load::<B>(&path, Some(&vocab), &device)?;
            (model, meta.progress)
        }
        None => {
            let model = CharLstmConfig::new(vocab.len(), cfg.hidden_width, cfg.num_layers)
                .with_dropout(cfg.dropout)
                .init::<B>(&device);
            (model, TrainingProgress::new(cfg.learning_rate))
        }
    };
    tracing::info!(
        "Model ready: {} layers × {} hidden, {} parameters",
        model.num_layers(), model.hidden_width, model.num_params()
    );

    // ── RMSProp optimiser ─────────────────────────────────────────────────────
    // v = α*v + (1-α)*g²
    // θ = θ - lr * g / (√v + ε)
    let optim = RmsPropConfig::new()
        .with_alpha(cfg.rmsprop_decay as f32)
        .with_epsilon(1e-8)
        .init();

    let settings = EngineSettings {
        window_length: cfg.window_length,
        clip_value:    cfg.grad_clip,
    };
    let engine = TbpttEngine::new(model, optim, settings, progress.learning_rate);

    // Continue with the batch after the last one the checkpoint saw
    let per_epoch = loader.size_of_split(Split::Train);
    loader.skip(Split::Train, progress.iteration % per_epoch.max(1));

    let schedule = Schedule::from_config(cfg, per_epoch);
    let metrics  = MetricsLogger::new(ckpt.dir())?;
    let mut session = LstmSession {
        engine,
        loader,
        ckpt,
        metrics,
        vocab,
        config:  cfg.clone(),
        sampler: Sampler::new(SamplingStrategy::Argmax),
        rng:     StdRng::seed_from_u64(cfg.seed),
    };

    run_schedule(&mut session, &schedule, &mut progress)
}
