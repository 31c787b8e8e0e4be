// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles the concerns that touch the file system but don't
// belong to any one business layer:
//
//   checkpoint.rs — Saving and loading training snapshots
//                   Uses Burn's DefaultRecorder for the
//                   weights and a JSON file for vocabulary,
//                   TrainConfig and training progress, so a
//                   run can be resumed or sampled from later.
//
//   metrics.rs    — Validation metrics logging
//                   Appends one CSV row per evaluation for
//                   plotting learning curves.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Validation metrics CSV logger
pub mod metrics;
