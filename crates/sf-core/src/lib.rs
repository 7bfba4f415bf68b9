#[macro_use]
pub mod macros;

pub mod cfg;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod pretty;
pub mod rtti;
pub mod span;
pub mod ty;

// Re-export commonly used items for convenience
pub use tracing;

pub use ir::{BlockId, Function, FunctionSig, Module, OpId, OpKind, RegionId, ValueId};
pub use ty::Ty;

// Alias for error types
pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
