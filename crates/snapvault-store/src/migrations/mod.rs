//! Schema migrations for the catalog and registry databases.
//!
//! Applied steps are recorded in `schema_version` with a fingerprint of
//! their SQL; re-applying a set is a no-op, and an applied step whose
//! embedded SQL has since changed is refused.

mod checksums;
mod embedded;
mod runner;

pub use embedded::{Migration, MigrationSet};
pub use runner::apply;
