use pretty_assertions::assert_eq;
use sf_core::ir::{Function, FunctionBuilder, FunctionSig};
use sf_core::rtti::RttiTable;
use sf_core::ty::{BinOp, Ty};
use sf_interpret::{Host, Outcome, RtValue, Thrown};
use sf_lower::LoweringOptions;

mod support;

use support::names;

/// try { risky() } catch (err) { handle(err) } finally { marker() } after()
fn guarded() -> Function {
    let mut b = FunctionBuilder::new("guarded", FunctionSig::void());
    b.entry();
    let err = b.variable(Ty::Any);
    b.try_catch(
        |b| {
            b.call("risky", vec![], &[]);
        },
        |b| {
            b.catch(None, err);
            let caught = b.load(err);
            b.call("handle", vec![caught], &[]);
        },
        |b| {
            b.call("marker", vec![], &[]);
        },
    );
    b.call("after", vec![], &[]);
    b.exit();
    b.finish()
}

fn io_error() -> Ty {
    Ty::Named("IoError".into())
}

/// try { read() } catch (IoError e) { recover() } finally { close() } after()
fn typed() -> Function {
    let mut b = FunctionBuilder::new("typed", FunctionSig::void());
    b.entry();
    let err = b.variable(io_error());
    b.try_catch(
        |b| {
            b.call("read", vec![], &[]);
        },
        |b| {
            b.catch(Some(io_error()), err);
            b.call("recover", vec![], &[]);
        },
        |b| {
            b.call("close", vec![], &[]);
        },
    );
    b.call("after", vec![], &[]);
    b.exit();
    b.finish()
}

/// try { try { risky() } finally { inner_finally() } } catch (err) {} after()
fn nested() -> Function {
    let mut b = FunctionBuilder::new("nested", FunctionSig::void());
    b.entry();
    let err = b.variable(Ty::Any);
    b.try_catch(
        |b| {
            b.try_finally(
                |b| {
                    b.call("risky", vec![], &[]);
                },
                |b| {
                    b.call("inner_finally", vec![], &[]);
                },
            );
        },
        |b| {
            b.catch(None, err);
        },
        |_| {},
    );
    b.call("after", vec![], &[]);
    b.exit();
    b.finish()
}

#[test]
fn normal_path_runs_finally_once() {
    for options in support::strategies() {
        let module = support::lowered_with(vec![guarded()], RttiTable::new(), &options);
        let (outcome, trace) = support::run(&module, Host::new(), "guarded", vec![]);
        assert_eq!(outcome, Outcome::Returned(None));
        assert_eq!(trace, names(&["risky", "marker", "after"]));
    }
}

#[test]
fn caught_exception_reaches_the_catch_then_finally() {
    let module = support::lowered(vec![guarded()]);
    let mut host = Host::new();
    host.throwing("risky", Ty::String, RtValue::from("boom"));

    let mut interp = sf_interpret::Interpreter::new(&module, host);
    let outcome = interp.run("guarded", vec![]).unwrap();
    assert_eq!(outcome, Outcome::Returned(None));
    assert_eq!(interp.host().trace(), vec!["risky", "handle", "marker", "after"]);
    assert_eq!(interp.host().calls()[1].args, vec![RtValue::from("boom")]);
}

#[test]
fn exception_from_the_catch_runs_the_cleanup_and_leaves() {
    for options in support::strategies() {
        let module = support::lowered_with(vec![guarded()], RttiTable::new(), &options);
        let mut host = Host::new();
        host.throwing("risky", Ty::String, RtValue::from("boom"))
            .throwing("handle", Ty::I32, RtValue::Int(7));

        let (outcome, trace) = support::run(&module, host, "guarded", vec![]);
        assert_eq!(outcome, Outcome::Threw(Thrown::new(Ty::I32, 7i64)));
        assert_eq!(trace, names(&["risky", "handle", "marker"]));
    }
}

#[test]
fn typed_catch_matches_its_type() {
    let mut rtti = RttiTable::new();
    rtti.register(io_error());
    let module = support::lowered_with(vec![typed()], rtti, &LoweringOptions::default());

    let mut host = Host::new();
    host.throwing("read", io_error(), RtValue::from("disk"));
    let (outcome, trace) = support::run(&module, host, "typed", vec![]);
    assert_eq!(outcome, Outcome::Returned(None));
    assert_eq!(trace, names(&["read", "recover", "close", "after"]));
}

#[test]
fn typed_catch_mismatch_runs_finally_and_rethrows() {
    let mut rtti = RttiTable::new();
    rtti.register(io_error());
    let module = support::lowered_with(vec![typed()], rtti, &LoweringOptions::default());

    let timeout = Ty::Named("Timeout".into());
    let mut host = Host::new();
    host.throwing("read", timeout.clone(), RtValue::Int(30));
    let (outcome, trace) = support::run(&module, host, "typed", vec![]);
    assert_eq!(outcome, Outcome::Threw(Thrown::new(timeout, 30i64)));
    assert_eq!(trace, names(&["read", "close"]));
}

/// try { read() } catch (IoError e) { recover() } with no finally, optionally wrapped in
/// try { .. } catch (err) { outer_catch() }; after()
fn typed_bare(nested: bool) -> Function {
    let mut b = FunctionBuilder::new("bare", FunctionSig::void());
    b.entry();
    let err = b.variable(io_error());
    let inner = move |b: &mut FunctionBuilder| {
        b.try_catch(
            |b| {
                b.call("read", vec![], &[]);
            },
            |b| {
                b.catch(Some(io_error()), err);
                b.call("recover", vec![], &[]);
            },
            |_| {},
        );
    };
    if nested {
        let any = b.variable(Ty::Any);
        b.try_catch(
            inner,
            |b| {
                b.catch(None, any);
                b.call("outer_catch", vec![], &[]);
            },
            |_| {},
        );
    } else {
        inner(&mut b);
    }
    b.call("after", vec![], &[]);
    b.exit();
    b.finish()
}

fn timeout_host() -> (Host, Ty) {
    let timeout = Ty::Named("Timeout".into());
    let mut host = Host::new();
    host.throwing("read", timeout.clone(), RtValue::Int(30));
    (host, timeout)
}

#[test]
fn typed_mismatch_without_finally_reaches_the_outer_catch() {
    for options in support::strategies() {
        let mut rtti = RttiTable::new();
        rtti.register(io_error());
        let module = support::lowered_with(vec![typed_bare(true)], rtti, &options);

        let (host, _) = timeout_host();
        let (outcome, trace) = support::run(&module, host, "bare", vec![]);
        assert_eq!(outcome, Outcome::Returned(None));
        assert_eq!(trace, names(&["read", "outer_catch", "after"]));
    }
}

#[test]
fn typed_mismatch_without_finally_leaves_the_function() {
    let mut rtti = RttiTable::new();
    rtti.register(io_error());
    let module = support::lowered_with(vec![typed_bare(false)], rtti, &LoweringOptions::default());

    let (host, timeout) = timeout_host();
    let (outcome, trace) = support::run(&module, host, "bare", vec![]);
    assert_eq!(outcome, Outcome::Threw(Thrown::new(timeout, 30i64)));
    assert_eq!(trace, names(&["read"]));

    let mut host = Host::new();
    host.throwing("read", io_error(), RtValue::from("disk"));
    let (outcome, trace) = support::run(&module, host, "bare", vec![]);
    assert_eq!(outcome, Outcome::Returned(None));
    assert_eq!(trace, names(&["read", "recover", "after"]));
}

#[test]
fn inner_finally_runs_before_the_outer_catch() {
    for options in support::strategies() {
        let module = support::lowered_with(vec![nested()], RttiTable::new(), &options);

        let (outcome, trace) = support::run(&module, Host::new(), "nested", vec![]);
        assert_eq!(outcome, Outcome::Returned(None));
        assert_eq!(trace, names(&["risky", "inner_finally", "after"]));

        let mut host = Host::new();
        host.throwing("risky", Ty::String, RtValue::from("deep"));
        let (outcome, trace) = support::run(&module, host, "nested", vec![]);
        assert_eq!(outcome, Outcome::Returned(None), "{:?}", options.unwind_strategy);
        assert_eq!(trace, names(&["risky", "inner_finally", "after"]));
    }
}

#[test]
fn typed_throw_in_body_is_caught_and_returned() {
    let mut b = FunctionBuilder::new("rescue", FunctionSig::new(vec![], Ty::I32));
    b.entry();
    let err = b.variable(Ty::I32);
    b.try_catch(
        |b| {
            let value = b.const_i32(41);
            b.throw(value);
        },
        |b| {
            b.catch(Some(Ty::I32), err);
            let caught = b.load(err);
            let one = b.const_i32(1);
            let next = b.binary(BinOp::Add, caught, one);
            b.ret_val(next);
        },
        |_| {},
    );
    let zero = b.const_i32(0);
    b.ret_val(zero);
    b.exit();

    let mut rtti = RttiTable::new();
    rtti.register(Ty::I32);
    let module = support::lowered_with(vec![b.finish()], rtti, &LoweringOptions::default());
    let (outcome, trace) = support::run(&module, Host::new(), "rescue", vec![]);
    assert_eq!(outcome, Outcome::Returned(Some(RtValue::Int(42))));
    assert!(trace.is_empty());
}

#[test]
fn return_through_finally_keeps_the_value() {
    let mut b = FunctionBuilder::new("early", FunctionSig::new(vec![Ty::Bool], Ty::I32));
    b.entry();
    let flag = b.param(0);
    b.try_finally(
        |b| {
            b.if_then(flag, |b| {
                let one = b.const_i32(1);
                b.ret_val(one);
            });
        },
        |b| {
            b.call("marker", vec![], &[]);
        },
    );
    let two = b.const_i32(2);
    b.ret_val(two);
    b.exit();
    let module = support::lowered(vec![b.finish()]);

    for (flag, expected) in [(true, 1), (false, 2)] {
        let (outcome, trace) = support::run(&module, Host::new(), "early", vec![RtValue::Bool(flag)]);
        assert_eq!(outcome, Outcome::Returned(Some(RtValue::Int(expected))));
        assert_eq!(trace, names(&["marker"]));
    }
}

#[test]
fn uncaught_throw_leaves_the_function() {
    let mut b = FunctionBuilder::new("fail", FunctionSig::void());
    b.entry();
    let message = b.const_str("bad");
    b.throw(message);
    b.call("never", vec![], &[]);
    b.exit();
    let module = support::lowered(vec![b.finish()]);

    let (outcome, trace) = support::run(&module, Host::new(), "fail", vec![]);
    assert_eq!(outcome, Outcome::Threw(Thrown::new(Ty::String, "bad")));
    assert!(trace.is_empty());
}

#[test]
fn exceptions_cross_module_calls() {
    let mut inner = FunctionBuilder::new("inner", FunctionSig::void());
    inner.entry();
    let message = inner.const_str("bad");
    inner.throw(message);
    inner.exit();

    let mut outer = FunctionBuilder::new("outer", FunctionSig::void());
    outer.entry();
    let err = outer.variable(Ty::Any);
    outer.try_catch(
        |b| {
            b.call("inner", vec![], &[]);
        },
        |b| {
            b.catch(None, err);
            let caught = b.load(err);
            b.call("report", vec![caught], &[]);
        },
        |_| {},
    );
    outer.exit();

    let module = support::lowered(vec![inner.finish(), outer.finish()]);
    let mut interp = sf_interpret::Interpreter::new(&module, Host::new());
    assert_eq!(interp.run("outer", vec![]).unwrap(), Outcome::Returned(None));
    assert_eq!(interp.host().trace(), vec!["report"]);
    assert_eq!(interp.host().calls()[0].args, vec![RtValue::from("bad")]);
}
