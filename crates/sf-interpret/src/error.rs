use sf_core::diagnostics::report_error;
use sf_core::error::Error;
use sf_core::ir::OpId;

/// Create a simple interpretation error
pub fn interpretation_error(message: impl Into<String>) -> Error {
    report_error(message)
}

/// Create an interpretation error pointing at the op being executed
pub fn interpretation_error_at(op: OpId, message: impl Into<String>) -> Error {
    report_error(format!("{} [{}]", message.into(), op))
}

/// Create a generic error (when we don't have specific error information)
pub fn generic_error(message: impl Into<eyre::Report>) -> Error {
    Error::from(message.into())
}

/// Macro to return early with an interpretation error
#[macro_export]
macro_rules! interp_bail {
    ($message:expr) => {
        return Err($crate::error::interpretation_error($message))
    };
    ($message:expr, $op:expr) => {
        return Err($crate::error::interpretation_error_at($op, $message))
    };
}

/// Macro to ensure a condition is true, or return an interpretation error
#[macro_export]
macro_rules! interp_ensure {
    ($cond:expr, $message:expr) => {
        if !($cond) {
            $crate::interp_bail!($message);
        }
    };
    ($cond:expr, $message:expr, $op:expr) => {
        if !($cond) {
            $crate::interp_bail!($message, $op);
        }
    };
}
