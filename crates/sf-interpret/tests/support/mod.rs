#![allow(dead_code)]

use sf_core::ir::{Function, Module};
use sf_core::rtti::RttiTable;
use sf_interpret::{Host, Interpreter, Outcome, RtValue};
use sf_lower::{lower_module, LoweringOptions, UnwindStrategy};
use std::sync::Once;

static TRACING: Once = Once::new();

/// `RUST_LOG=sf_interpret=trace` prints every executed op.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn lowered(functions: Vec<Function>) -> Module {
    lowered_with(functions, RttiTable::new(), &LoweringOptions::default())
}

pub fn lowered_with(functions: Vec<Function>, rtti: RttiTable, options: &LoweringOptions) -> Module {
    init_tracing();
    let mut module = Module::new("test");
    module.functions = functions;
    module.rtti = rtti;
    lower_module(&mut module, options).expect("lowering should succeed");
    module
}

pub fn strategies() -> [LoweringOptions; 2] {
    [UnwindStrategy::ChainToParent, UnwindStrategy::CatchAndRethrow]
        .map(|strategy| LoweringOptions::default().with_unwind_strategy(strategy))
}

/// Run `name` and hand back the outcome together with the host call trace.
pub fn run(module: &Module, host: Host, name: &str, args: Vec<RtValue>) -> (Outcome, Vec<String>) {
    let mut interp = Interpreter::new(module, host);
    let outcome = interp.run(name, args).expect("simulation should succeed");
    let trace = interp.host().trace().into_iter().map(str::to_string).collect();
    (outcome, trace)
}

pub fn names(trace: &[&str]) -> Vec<String> {
    trace.iter().map(|name| name.to_string()).collect()
}
