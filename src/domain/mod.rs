// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that define the core concepts
// of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Think of this layer as the "dictionary" of the system:
// it defines what things ARE, not how they work.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Character ↔ id mapping built from the corpus
pub mod vocab;

// (X, Y) minibatches and the train/val/test split identifiers
pub mod batch;

// Step results and the resumable training history
pub mod progress;

// Typed failures (vocabulary mismatch, corpus problems, ...)
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
