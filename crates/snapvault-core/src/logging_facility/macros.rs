//! Operation boundary macros.
//!
//! Each vault operation logs one `start` event and exactly one closing
//! event, `end` or `end_error`. Extra `key = value` fields (usually
//! `collection`) are passed straight through to `tracing`.

/// Shared body of the boundary macros.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_op_event {
    ($level:ident, $event:expr, $op:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $event,
            $($($field)*)?
        )
    };
}

/// Opening event of an operation.
///
/// ```
/// # use snapvault_core::log_op_start;
/// log_op_start!("create_snapshot", collection = "skills");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_event!(
            info,
            $crate::logging_facility::schema::EVENT_START,
            $op
            $(, $($field)*)?
        )
    };
}

/// Closing event of a successful operation.
///
/// ```
/// # use snapvault_core::log_op_end;
/// log_op_end!("prune", duration_ms = 3, collection = "skills");
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_event!(
            info,
            $crate::logging_facility::schema::EVENT_END,
            $op,
            duration_ms = $duration
            $(, $($field)*)?
        )
    };
}

/// Closing event of a failed operation, tagged with the error's kind and
/// stable code.
///
/// `$err` is anything that converts into `ExError`; it is cloned, so a
/// borrowed error can still be returned afterwards.
///
/// ```
/// # use snapvault_core::{log_op_error, errors::VaultError};
/// let err = VaultError::Cancelled;
/// log_op_error!("intelligent_rollback", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = ($err).clone().into();
        $crate::__log_op_event!(
            error,
            $crate::logging_facility::schema::EVENT_END_ERROR,
            $op,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            error = %ex_err
            $(, $($field)*)?
        )
    }};
}
