// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn framework specific code for
// the model, its training and its use.
//
// What's in this layer:
//
//   model.rs      — The character-level LSTM
//                   • one-hot inputs (no embedding parameters)
//                   • stacked LSTM cells, gates i, f, o, g
//                   • dropout between layers
//                   • linear decoder + log-softmax
//                   • step(ids, state) → (log_probs, state)
//
//   gradients.rs  — Elementwise gradient clipping and the
//                   gradient / parameter norms
//
//   engine.rs     — Truncated BPTT: windows, state carry,
//                   gradient accumulation, RMSProp step
//
//   evaluator.rs  — Average loss over a whole split
//
//   sampler.rs    — Argmax / temperature text generation
//
//   trainer.rs    — The iteration schedule: lr decay,
//                   validation cadence, checkpoints, the
//                   divergence guard and backend selection
//
//   inferencer.rs — Loads a checkpoint for the `sample` command
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Hochreiter & Schmidhuber (1997) Long Short-Term Memory

/// Multi-layer character LSTM
pub mod model;

/// Gradient clipping over a GradientsParams buffer
pub mod gradients;

/// Truncated backpropagation-through-time engine
pub mod engine;

/// Split evaluation in inference mode
pub mod evaluator;

/// Autoregressive decoding strategies
pub mod sampler;

/// Training schedule, session and entry point
pub mod trainer;

/// Inference engine: loads a checkpoint and generates text
pub mod inferencer;
