use pretty_assertions::assert_eq;
use sf_core::ir::{Function, FunctionBuilder, FunctionSig, OpKind};
use sf_core::rtti::RttiTable;
use sf_core::ty::Ty;
use sf_lower::{CaptureStorage, LoweringOptions};

mod support;

/// `gen(state)`: yields 10, then 20, then returns 30.
fn generator() -> Function {
    let mut b = FunctionBuilder::new("gen", FunctionSig::new(vec![Ty::I32], Ty::I32));
    b.entry();
    let state = b.param(0);
    let start = b.new_body_block();
    b.switch_state(state, start);
    b.set_cursor(start);
    b.call("step0", vec![], &[]);
    let first = b.const_i32(10);
    b.yield_ret_val(first);
    b.state_label();
    b.call("step1", vec![], &[]);
    let second = b.const_i32(20);
    b.yield_ret_val(second);
    b.state_label();
    b.call("step2", vec![], &[]);
    let last = b.const_i32(30);
    b.ret_val(last);
    b.exit();
    b.finish()
}

fn first_callee(func: &Function, block: sf_core::BlockId) -> Option<String> {
    func.block(block)
        .ops
        .iter()
        .find_map(|op| match func.kind(*op) {
            OpKind::CallInternal { callee } => Some(callee.clone()),
            _ => None,
        })
}

#[test]
fn dispatch_maps_states_to_labels_in_order() {
    let (func, stats) = support::lower(generator());
    support::assert_flat(&func);
    assert_eq!(stats.state_labels, 2);

    let entry = func.entry_block().unwrap();
    let Some(OpKind::SwitchInt { default, cases }) = support::terminators_of(&func, entry) else {
        panic!("entry should end in the state dispatch");
    };
    let targets: Vec<(i64, Option<String>)> = cases
        .iter()
        .map(|(state, block)| (*state, first_callee(&func, *block)))
        .collect();
    assert_eq!(
        targets,
        vec![
            (0, Some("step0".to_string())),
            (1, Some("step1".to_string())),
            (2, Some("step2".to_string())),
        ]
    );
    assert!(matches!(
        support::terminators_of(&func, default),
        Some(OpKind::ReturnInternal)
    ));
}

#[test]
fn dispatch_without_labels_is_a_plain_branch() {
    let mut b = FunctionBuilder::new("plain", FunctionSig::new(vec![Ty::I32], Ty::Void));
    b.entry();
    let state = b.param(0);
    let start = b.new_body_block();
    b.switch_state(state, start);
    b.set_cursor(start);
    b.call("work", vec![], &[]);
    b.exit();
    let (func, _) = support::lower(b.finish());
    support::assert_flat(&func);

    let entry = func.entry_block().unwrap();
    assert_eq!(
        support::terminators_of(&func, entry),
        Some(OpKind::Br { target: start })
    );
}

fn capture_pair() -> (Function, sf_core::ValueId) {
    let mut b = FunctionBuilder::new("make_closure", FunctionSig::new(vec![Ty::I32], Ty::Void));
    b.entry();
    let x = b.param(0);
    let y = b.variable(Ty::F64);
    let init = b.const_f64(2.5);
    b.store(init, y);
    let env = b.capture(vec![x, y], vec![Ty::I32, Ty::F64]);
    b.call("consume", vec![env], &[]);
    b.exit();
    (b.finish(), env)
}

fn mnemonics_from(func: &Function, start: sf_core::OpId) -> Vec<String> {
    let block = func.op(start).parent.unwrap();
    func.block(block)
        .ops
        .iter()
        .skip_while(|op| **op != start)
        .map(|op| func.kind(*op).to_string())
        .collect()
}

#[test]
fn capture_stores_each_field_and_loads_references() {
    let (func, env) = capture_pair();
    let (func, _) = support::lower_with(
        func,
        &RttiTable::new(),
        &LoweringOptions::default().with_capture_storage(CaptureStorage::Heap),
    );
    support::assert_flat(&func);

    let sf_core::ir::ValueDef::OpResult { op: alloc, .. } = func.value(env).def else {
        panic!("environment is an op result");
    };
    assert_eq!(
        mnemonics_from(&func, alloc)[..7],
        [
            "variable heap",
            "property_ref .0",
            "store",
            "load",
            "property_ref .1",
            "store",
            "call_internal @consume",
        ]
        .map(String::from)
    );
}

#[test]
fn stack_capture_storage_is_honoured() {
    let (func, env) = capture_pair();
    let (func, _) = support::lower_with(
        func,
        &RttiTable::new(),
        &LoweringOptions::default().with_capture_storage(CaptureStorage::Stack),
    );
    let sf_core::ir::ValueDef::OpResult { op: alloc, .. } = func.value(env).def else {
        panic!("environment is an op result");
    };
    assert_eq!(func.kind(alloc), &OpKind::Variable { in_heap: false });
    assert_eq!(
        func.value_ty(env),
        &Ty::reference(Ty::Tuple(vec![Ty::I32, Ty::F64]))
    );
}
