//! Three-way merge over directory trees.
//!
//! Compares a `base` tree (common ancestor), a `local` tree (the live,
//! possibly edited collection) and a `target` tree (the snapshot being
//! rolled back to), and classifies every file path in their union.
//!
//! ## Entry point
//!
//! ```ignore
//! use snapvault_core::merge::MergeEngine;
//!
//! let outcome = MergeEngine::new().merge(&base, &local, &target);
//! for path in &outcome.safe_restores { /* write target content */ }
//! ```
//!
//! ## Guarantees
//!
//! - **Purity**: no filesystem access; the caller decides what to apply.
//! - **Determinism**: paths are visited in sorted order, so output lists are sorted.
//! - **No opinion on absence**: a path missing from the target is never
//!   classified for deletion.
//! - **Clean base**: when `local == base` every path is a no-op or a simple restore.

pub mod engine;
pub mod model;

pub use engine::MergeEngine;
pub use model::{MergeOutcome, PathClassification};
