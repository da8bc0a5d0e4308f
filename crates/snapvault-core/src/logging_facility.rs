//! Logging for snapvault, built on `tracing`.
//!
//! - `init(profile)` installs the process subscriber once (stderr only, so
//!   `--json` output on stdout stays parseable)
//! - `log_op_start!`, `log_op_end!` and `log_op_error!` mark operation
//!   boundaries with the field names in [`schema`]
//! - [`test_capture`] records events in memory for assertions
//!
//! ```rust
//! use snapvault_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod schema;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
