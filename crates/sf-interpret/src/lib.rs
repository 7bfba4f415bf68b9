//! Simulator for lowered control-flow graphs.
//!
//! Executes the primitive vocabulary the lowering produces, with a small heap for variables,
//! one in-flight exception and scripted host functions, so that path properties of lowered
//! functions can be checked by running them.

pub mod engine;
pub mod error;
pub mod host;
pub mod value;

pub use engine::{Interpreter, InterpreterOptions, Outcome};
pub use host::{CallRecord, Host, HostResult};
pub use value::{Pointer, RtValue, Thrown};
