// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from the raw corpus file
// all the way to tensors on the device.
//
// The pipeline flows in this order:
//
//   input.txt
//       │
//       ▼
//   CorpusLoader      → reads the file, validates the text
//       │
//       ▼
//   Vocabulary        → characters → dense ids (domain layer)
//       │
//       ▼
//   CharSplitLoader   → (X, Y) batches per train/val/test split
//       │
//       ▼
//   CharBatcher       → id columns → one-hot / index tensors
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads and validates the corpus text file
pub mod loader;

/// Batch counts per split from the configured fractions
pub mod splitter;

/// Stream-layout minibatches served through BatchSource
pub mod dataset;

/// Turns id columns into burn tensors
pub mod batcher;
