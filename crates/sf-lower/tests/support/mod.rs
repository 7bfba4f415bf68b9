#![allow(dead_code)]

use sf_core::ir::{BlockId, Function, OpId, OpKind};
use sf_core::rtti::RttiTable;
use sf_lower::{lower_function, LoweringOptions, LoweringStats};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber once; `RUST_LOG=sf_lower=debug` shows the rewrites.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn lower(func: Function) -> (Function, LoweringStats) {
    lower_with(func, &RttiTable::new(), &LoweringOptions::default())
}

pub fn lower_with(
    mut func: Function,
    rtti: &RttiTable,
    options: &LoweringOptions,
) -> (Function, LoweringStats) {
    init_tracing();
    let stats = lower_function(&mut func, rtti, options).expect("lowering should succeed");
    (func, stats)
}

/// Every op left in the body, in layout order.
pub fn body_ops(func: &Function) -> Vec<OpId> {
    func.body_blocks()
        .iter()
        .flat_map(|block| func.block(*block).ops.iter().copied())
        .collect()
}

pub fn count(func: &Function, pred: impl Fn(&OpKind) -> bool) -> usize {
    body_ops(func)
        .into_iter()
        .filter(|op| pred(func.kind(*op)))
        .count()
}

/// Calls to `name`, plain or invoked.
pub fn calls_to(func: &Function, name: &str) -> usize {
    count(func, |kind| match kind {
        OpKind::CallInternal { callee } => callee == name,
        OpKind::Invoke {
            callee: sf_core::ir::Callee::Symbol(callee),
            ..
        } => callee == name,
        _ => false,
    })
}

pub fn terminators(func: &Function) -> Vec<OpKind> {
    func.body_blocks()
        .iter()
        .filter_map(|block| func.terminator(*block))
        .map(|term| func.kind(term).clone())
        .collect()
}

/// The block whose first op satisfies `pred`.
pub fn block_starting_with(func: &Function, pred: impl Fn(&OpKind) -> bool) -> Option<BlockId> {
    func.body_blocks().iter().copied().find(|block| {
        func.block(*block)
            .ops
            .first()
            .is_some_and(|op| pred(func.kind(*op)))
    })
}

pub fn assert_flat(func: &Function) {
    for op in body_ops(func) {
        assert!(
            !func.kind(op).is_structured(),
            "structured op left behind: {}",
            func.kind(op)
        );
    }
    sf_core::ir::verify_lowered(func).expect("lowered function should verify");
}

pub fn terminators_of(func: &Function, block: BlockId) -> Option<OpKind> {
    func.terminator(block).map(|term| func.kind(term).clone())
}
