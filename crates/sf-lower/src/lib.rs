//! Lowering of structured IR into a flat control-flow graph.
//!
//! The driver in [`pass`] walks the top level of a function body, rewriting the first
//! structured op it finds. Each rewrite inlines the construct's regions in place, so nested
//! constructs surface at the top level only after their parent registered the jump and unwind
//! targets they need.

pub mod cleanup;
pub mod context;
pub mod error;
pub mod options;
pub mod pass;

mod closure;
mod control_flow;
mod exceptions;
mod function;
mod invoke;
mod jumps;
mod resumable;

pub use cleanup::{prune_unreachable_blocks, relocate_constants};
pub use context::{Destination, LoweringContext, TryPlacement};
pub use options::{CaptureStorage, LoweringOptions, UnwindStrategy};
pub use pass::{lower_function, lower_module, lower_module_parallel, LoweringStats};
