use sf_core::diagnostics::report_internal;
use sf_core::error::Error;
use sf_core::ir::OpId;

/// Broken invariant inside the lowering itself.
pub fn lowering_error(op: OpId, message: impl Into<String>) -> Error {
    Error::internal_at(op, message)
}

/// Structured input that does not match the shape the lowering expects.
pub fn contract_error(op: OpId, message: impl Into<String>) -> Error {
    Error::contract_at(op, message)
}

/// Record `error` with the global diagnostics manager before it leaves the pass.
pub fn report(error: Error) -> Error {
    report_internal("lower", error)
}

/// Create a generic error (when we don't have specific error information)
pub fn generic_error(message: impl Into<eyre::Report>) -> Error {
    Error::from(message.into())
}

/// Return early with an internal lowering error pointing at `op`.
#[macro_export]
macro_rules! lower_bail {
    ($op:expr, $($arg:tt)*) => {
        return Err($crate::error::lowering_error($op, format!($($arg)*)))
    };
}

/// Ensure a lowering invariant holds, or return an internal error pointing at `op`.
#[macro_export]
macro_rules! lower_ensure {
    ($cond:expr, $op:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::lower_bail!($op, $($arg)*);
        }
    };
}

/// Return early with an input-contract error pointing at `op`.
#[macro_export]
macro_rules! contract_bail {
    ($op:expr, $($arg:tt)*) => {
        return Err($crate::error::contract_error($op, format!($($arg)*)))
    };
}
