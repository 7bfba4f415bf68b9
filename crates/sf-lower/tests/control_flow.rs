use sf_core::ir::{FunctionBuilder, FunctionSig, OpKind};
use sf_core::rtti::RttiTable;
use sf_core::ty::{BinOp, Ty};
use sf_lower::{lower_function, LoweringOptions};

mod support;

#[test]
fn if_else_with_values_threads_results_through_continuation() {
    let mut b = FunctionBuilder::new("pick", FunctionSig::new(vec![Ty::Bool], Ty::I32));
    b.entry();
    let flag = b.param(0);
    let picked = b.if_else_values(
        flag,
        &[Ty::I32],
        |b| vec![b.const_i32(1)],
        |b| vec![b.const_i32(2)],
    );
    b.ret_val(picked[0]);
    b.exit();
    let (func, stats) = support::lower(b.finish());

    support::assert_flat(&func);
    assert_eq!(support::count(&func, |k| matches!(k, OpKind::CondBr { .. })), 1);
    let join = func
        .body_blocks()
        .iter()
        .skip(1)
        .copied()
        .find(|block| func.block(*block).args.len() == 1)
        .expect("continuation takes the if result");
    assert_eq!(func.value_ty(func.block(join).args[0]), &Ty::I32);
    assert!(stats.constructs >= 4);
}

#[test]
fn if_with_results_needs_else() {
    let mut b = FunctionBuilder::new("broken", FunctionSig::new(vec![Ty::Bool], Ty::Void));
    b.entry();
    let flag = b.param(0);
    let op = b.if_then(flag, |_| {});
    let mut func = b.finish();
    let result = func.create_op(OpKind::Undef, vec![], &[Ty::I32], 0);
    func.op_mut(op).results = func.op(result).results.clone();

    let err = lower_function(&mut func, &RttiTable::new(), &LoweringOptions::default())
        .unwrap_err();
    assert!(matches!(err, sf_core::Error::Contract { .. }), "{err}");
}

#[test]
fn non_bool_conditions_are_truthified() {
    let mut b = FunctionBuilder::new("count", FunctionSig::new(vec![Ty::I32], Ty::Void));
    b.entry();
    let n = b.param(0);
    b.while_loop(None, |_| n, |b| {
        b.call("tick", vec![], &[]);
    });
    b.exit();
    let (func, _) = support::lower(b.finish());

    support::assert_flat(&func);
    assert_eq!(support::count(&func, |k| matches!(k, OpKind::Cast)), 1);
}

#[test]
fn for_loop_without_condition_branches_straight_to_body() {
    let mut b = FunctionBuilder::new("spin", FunctionSig::void());
    b.entry();
    b.for_loop(
        None,
        |_| None,
        |b| {
            b.call("work", vec![], &[]);
            b.brk(None);
        },
        |b| {
            b.call("step", vec![], &[]);
        },
    );
    b.exit();
    let (func, _) = support::lower(b.finish());

    support::assert_flat(&func);
    assert_eq!(support::count(&func, |k| matches!(k, OpKind::CondBr { .. })), 0);
    assert_eq!(support::calls_to(&func, "work"), 1);
    assert_eq!(support::calls_to(&func, "step"), 1);
}

#[test]
fn carried_while_passes_values_on_both_edges() {
    let mut b = FunctionBuilder::new("sum", FunctionSig::new(vec![Ty::I32], Ty::I32));
    b.entry();
    let limit = b.param(0);
    let zero = b.const_i32(0);
    let results = b.while_carried(
        None,
        vec![zero],
        |b, args| {
            let more = b.binary(BinOp::Lt, args[0], limit);
            (more, args)
        },
        |b, args| {
            let one = b.const_i32(1);
            vec![b.binary(BinOp::Add, args[0], one)]
        },
    );
    b.ret_val(results[0]);
    b.exit();
    let (func, _) = support::lower(b.finish());

    support::assert_flat(&func);
    let cond_br = support::terminators(&func)
        .into_iter()
        .find(|k| matches!(k, OpKind::CondBr { .. }))
        .unwrap();
    let OpKind::CondBr { then_args, .. } = cond_br else {
        unreachable!()
    };
    assert_eq!(then_args, 1);
}

#[test]
fn labeled_break_skips_inner_loop() {
    let mut b = FunctionBuilder::new("nested", FunctionSig::new(vec![Ty::Bool], Ty::Void));
    b.entry();
    let flag = b.param(0);
    b.while_loop(
        Some("outer"),
        |_| flag,
        |b| {
            b.while_loop(
                None,
                |_| flag,
                |b| {
                    b.brk(Some("outer"));
                },
            );
            b.call("after_inner", vec![], &[]);
        },
    );
    b.call("after_outer", vec![], &[]);
    b.exit();
    let (func, _) = support::lower(b.finish());
    support::assert_flat(&func);

    let after_outer = support::block_starting_with(&func, |k| {
        matches!(k, OpKind::CallInternal { callee } if callee == "after_outer")
    })
    .expect("continuation of the outer loop starts with the call");
    let preds = func.predecessors();
    // the outer condition and the labeled break both land here
    assert_eq!(preds[&after_outer].len(), 2);
}

#[test]
fn continue_naming_a_labeled_block_restarts_it() {
    let mut b = FunctionBuilder::new("retry", FunctionSig::new(vec![Ty::Bool], Ty::Void));
    b.entry();
    let flag = b.param(0);
    b.labeled("again", |b| {
        b.call("attempt", vec![], &[]);
        b.if_then(flag, |b| {
            b.cont(Some("again"));
        });
    });
    b.exit();
    let (func, _) = support::lower(b.finish());
    support::assert_flat(&func);

    let attempt = support::block_starting_with(&func, |k| {
        matches!(k, OpKind::CallInternal { callee } if callee == "attempt")
    })
    .unwrap();
    assert_eq!(func.predecessors()[&attempt].len(), 2);
}

#[test]
fn continue_naming_a_switch_is_rejected() {
    let mut b = FunctionBuilder::new("bad", FunctionSig::void());
    b.entry();
    b.switch(Some("sw"), |b| {
        b.cont(Some("sw"));
    });
    b.exit();
    let mut func = b.finish();
    let err = lower_function(&mut func, &RttiTable::new(), &LoweringOptions::default())
        .unwrap_err();
    assert!(matches!(err, sf_core::Error::Contract { .. }), "{err}");
}

#[test]
fn break_outside_any_construct_is_an_internal_error() {
    let mut b = FunctionBuilder::new("stray", FunctionSig::void());
    b.entry();
    let op = b.brk(None);
    b.exit();
    let mut func = b.finish();
    let err = lower_function(&mut func, &RttiTable::new(), &LoweringOptions::default())
        .unwrap_err();
    assert!(err.is_internal());
    assert_eq!(err.op(), Some(op));
}

#[test]
fn switch_break_and_merge_reach_the_same_continuation() {
    let mut b = FunctionBuilder::new("sw", FunctionSig::new(vec![Ty::Bool], Ty::Void));
    b.entry();
    let flag = b.param(0);
    b.switch(None, |b| {
        b.if_then(flag, |b| {
            b.brk(None);
        });
        b.call("fallthrough", vec![], &[]);
    });
    b.call("done", vec![], &[]);
    b.exit();
    let (func, _) = support::lower(b.finish());
    support::assert_flat(&func);

    let done = support::block_starting_with(&func, |k| {
        matches!(k, OpKind::CallInternal { callee } if callee == "done")
    })
    .unwrap();
    assert_eq!(func.predecessors()[&done].len(), 2);
}

#[test]
fn do_while_enters_the_body_before_the_condition() {
    let mut b = FunctionBuilder::new("repeat", FunctionSig::new(vec![Ty::Bool], Ty::Void));
    b.entry();
    let flag = b.param(0);
    b.do_while(
        None,
        |b| {
            b.call("work", vec![], &[]);
        },
        |_| flag,
    );
    b.call("after", vec![], &[]);
    b.exit();
    let (func, _) = support::lower(b.finish());
    support::assert_flat(&func);

    let work = support::block_starting_with(&func, |k| {
        matches!(k, OpKind::CallInternal { callee } if callee == "work")
    })
    .unwrap();
    let after = support::block_starting_with(&func, |k| {
        matches!(k, OpKind::CallInternal { callee } if callee == "after")
    })
    .unwrap();
    assert_eq!(
        support::terminators_of(&func, func.body_blocks()[0]),
        Some(OpKind::Br { target: work })
    );
    let cond_br = support::terminators(&func)
        .into_iter()
        .find(|k| matches!(k, OpKind::CondBr { .. }))
        .unwrap();
    assert_eq!(
        cond_br,
        OpKind::CondBr {
            then_dest: work,
            else_dest: after,
            then_args: 0,
        }
    );
}

#[test]
fn do_while_continue_goes_to_the_condition() {
    let mut b = FunctionBuilder::new("skip", FunctionSig::new(vec![Ty::Bool], Ty::Void));
    b.entry();
    let flag = b.param(0);
    b.do_while(
        None,
        |b| {
            b.if_then(flag, |b| {
                b.cont(None);
            });
            b.call("work", vec![], &[]);
        },
        |b| {
            b.call("check", vec![], &[]);
            flag
        },
    );
    b.exit();
    let (func, _) = support::lower(b.finish());
    support::assert_flat(&func);

    let check = support::block_starting_with(&func, |k| {
        matches!(k, OpKind::CallInternal { callee } if callee == "check")
    })
    .unwrap();
    // the end of the body and the continue
    assert_eq!(func.predecessors()[&check].len(), 2);
}

#[test]
fn jumps_in_a_loop_carrying_values_are_rejected() {
    let mut b = FunctionBuilder::new("sum", FunctionSig::new(vec![Ty::I32], Ty::I32));
    b.entry();
    let limit = b.param(0);
    let zero = b.const_i32(0);
    let results = b.while_carried(
        None,
        vec![zero],
        |b, args| {
            let more = b.binary(BinOp::Lt, args[0], limit);
            (more, args)
        },
        |b, args| {
            let three = b.const_i32(3);
            let hit = b.binary(BinOp::Eq, args[0], three);
            b.if_then(hit, |b| {
                b.brk(None);
            });
            let one = b.const_i32(1);
            vec![b.binary(BinOp::Add, args[0], one)]
        },
    );
    b.ret_val(results[0]);
    b.exit();
    let mut func = b.finish();

    let err = lower_function(&mut func, &RttiTable::new(), &LoweringOptions::default())
        .unwrap_err();
    assert!(matches!(err, sf_core::Error::Contract { .. }), "{err}");
}
