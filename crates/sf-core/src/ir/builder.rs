//! Construction of structured input functions.
//!
//! Region-building helpers take closures that emit the region body; a region whose last block
//! is left without a terminator gets the construct's default one (`Yield`, `Merge`, ...).

use crate::ir::{BlockId, Function, FunctionSig, OpId, OpKind, RegionId, ValueId};
use crate::span::Span;
use crate::ty::{BinOp, ConstValue, Ty};

pub struct FunctionBuilder {
    func: Function,
    cursor: BlockId,
    ret_slot: Option<ValueId>,
    span: Option<Span>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, sig: FunctionSig) -> Self {
        let func = Function::new(name, sig);
        let cursor = func.body_blocks()[0];
        Self {
            func,
            cursor,
            ret_slot: None,
            span: None,
        }
    }

    pub fn func(&self) -> &Function {
        &self.func
    }

    pub fn finish(self) -> Function {
        self.func
    }

    pub fn param(&self, index: usize) -> ValueId {
        self.func.block(self.func.body_blocks()[0]).args[index]
    }

    pub fn cursor(&self) -> BlockId {
        self.cursor
    }

    pub fn set_cursor(&mut self, block: BlockId) {
        self.cursor = block;
    }

    /// Span attached to every op built from now on.
    pub fn set_span(&mut self, span: Option<Span>) {
        self.span = span;
    }

    /// A new empty block appended to the function body.
    pub fn new_body_block(&mut self) -> BlockId {
        let block = self.func.new_block(&[]);
        self.func.append_block(self.func.body, block);
        block
    }

    pub fn op(&mut self, kind: OpKind, operands: Vec<ValueId>, result_tys: &[Ty]) -> OpId {
        self.op_with_regions(kind, operands, result_tys, 0)
    }

    fn op_with_regions(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_tys: &[Ty],
        num_regions: usize,
    ) -> OpId {
        let op = self.func.create_op(kind, operands, result_tys, num_regions);
        self.func.set_span(op, self.span);
        self.func.append_op(self.cursor, op);
        op
    }

    fn value_op(&mut self, kind: OpKind, operands: Vec<ValueId>, ty: Ty) -> ValueId {
        let op = self.op(kind, operands, &[ty]);
        self.func.op(op).results[0]
    }

    fn build_region<R>(
        &mut self,
        region: RegionId,
        arg_tys: &[Ty],
        f: impl FnOnce(&mut Self, Vec<ValueId>) -> R,
    ) -> (R, BlockId) {
        let block = self.func.new_block(arg_tys);
        self.func.append_block(region, block);
        let args = self.func.block(block).args.clone();
        let saved = std::mem::replace(&mut self.cursor, block);
        let result = f(self, args);
        let last = std::mem::replace(&mut self.cursor, saved);
        (result, last)
    }

    fn terminate(&mut self, block: BlockId, kind: OpKind, operands: Vec<ValueId>) {
        if self.func.terminator(block).is_none() {
            let op = self.func.emit_at_end(block, kind, operands, &[]);
            self.func.set_span(op, self.span);
        }
    }

    fn region(&self, op: OpId, index: usize) -> RegionId {
        self.func.op(op).regions[index]
    }

    /// Function prologue. Returns the return-value slot for non-void functions.
    pub fn entry(&mut self) -> Option<ValueId> {
        let ret = self.func.sig.ret.clone();
        let result_tys = if ret.is_void() {
            vec![]
        } else {
            vec![Ty::reference(ret)]
        };
        let op = self.op(OpKind::Entry, vec![], &result_tys);
        self.ret_slot = self.func.result(op);
        self.ret_slot
    }

    pub fn ret_slot(&self) -> Option<ValueId> {
        self.ret_slot
    }

    pub fn exit(&mut self) -> OpId {
        self.op(OpKind::Exit, vec![], &[])
    }

    pub fn constant(&mut self, value: ConstValue, ty: Ty) -> ValueId {
        self.value_op(OpKind::Constant(value), vec![], ty)
    }

    pub fn const_i32(&mut self, value: i32) -> ValueId {
        self.constant(ConstValue::Int(value as i64), Ty::I32)
    }

    pub fn const_i64(&mut self, value: i64) -> ValueId {
        self.constant(ConstValue::Int(value), Ty::I64)
    }

    pub fn const_bool(&mut self, value: bool) -> ValueId {
        self.constant(ConstValue::Bool(value), Ty::Bool)
    }

    pub fn const_f64(&mut self, value: f64) -> ValueId {
        self.constant(ConstValue::Float(value), Ty::F64)
    }

    pub fn const_str(&mut self, value: &str) -> ValueId {
        self.constant(ConstValue::Str(value.to_string()), Ty::String)
    }

    pub fn func_ref(&mut self, name: &str, ty: Ty) -> ValueId {
        self.constant(ConstValue::FuncRef(name.to_string()), ty)
    }

    pub fn null(&mut self) -> ValueId {
        self.value_op(OpKind::Null, vec![], Ty::Null)
    }

    /// A stack slot of type `ref<ty>`.
    pub fn variable(&mut self, ty: Ty) -> ValueId {
        self.value_op(OpKind::Variable { in_heap: false }, vec![], Ty::reference(ty))
    }

    pub fn variable_init(&mut self, ty: Ty, init: ValueId) -> ValueId {
        self.value_op(
            OpKind::Variable { in_heap: false },
            vec![init],
            Ty::reference(ty),
        )
    }

    pub fn load(&mut self, ptr: ValueId) -> ValueId {
        let ty = self
            .func
            .value_ty(ptr)
            .pointee()
            .cloned()
            .unwrap_or(Ty::Any);
        self.value_op(OpKind::Load, vec![ptr], ty)
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) -> OpId {
        self.op(OpKind::Store, vec![value, ptr], &[])
    }

    pub fn binary(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = op.result_ty(self.func.value_ty(lhs));
        self.value_op(OpKind::Binary(op), vec![lhs, rhs], ty)
    }

    pub fn call(&mut self, callee: &str, args: Vec<ValueId>, result_tys: &[Ty]) -> Vec<ValueId> {
        let op = self.op(
            OpKind::Call {
                callee: callee.to_string(),
            },
            args,
            result_tys,
        );
        self.func.op(op).results.clone()
    }

    pub fn call_indirect(
        &mut self,
        callee: ValueId,
        args: Vec<ValueId>,
        result_tys: &[Ty],
    ) -> Vec<ValueId> {
        let mut operands = vec![callee];
        operands.extend(args);
        let op = self.op(OpKind::CallIndirect, operands, result_tys);
        self.func.op(op).results.clone()
    }

    pub fn throw(&mut self, value: ValueId) -> OpId {
        self.op(OpKind::Throw, vec![value], &[])
    }

    pub fn ret(&mut self) -> OpId {
        self.op(OpKind::Return, vec![], &[])
    }

    /// `return value` through the slot created by [`Self::entry`].
    pub fn ret_val(&mut self, value: ValueId) -> OpId {
        let operands = std::iter::once(value).chain(self.ret_slot).collect();
        self.op(OpKind::ReturnVal, operands, &[])
    }

    pub fn yield_ret_val(&mut self, value: ValueId) -> OpId {
        let operands = std::iter::once(value).chain(self.ret_slot).collect();
        self.op(OpKind::YieldReturnVal, operands, &[])
    }

    pub fn brk(&mut self, label: Option<&str>) -> OpId {
        self.op(
            OpKind::Break {
                label: label.map(str::to_string),
            },
            vec![],
            &[],
        )
    }

    pub fn cont(&mut self, label: Option<&str>) -> OpId {
        self.op(
            OpKind::Continue {
                label: label.map(str::to_string),
            },
            vec![],
            &[],
        )
    }

    pub fn if_then(&mut self, cond: ValueId, then: impl FnOnce(&mut Self)) -> OpId {
        let op = self.op_with_regions(OpKind::If, vec![cond], &[], 2);
        let (_, last) = self.build_region(self.region(op, 0), &[], |b, _| then(b));
        self.terminate(last, OpKind::Yield, vec![]);
        op
    }

    pub fn if_else(
        &mut self,
        cond: ValueId,
        then: impl FnOnce(&mut Self),
        otherwise: impl FnOnce(&mut Self),
    ) -> OpId {
        let op = self.op_with_regions(OpKind::If, vec![cond], &[], 2);
        let (_, last) = self.build_region(self.region(op, 0), &[], |b, _| then(b));
        self.terminate(last, OpKind::Yield, vec![]);
        let (_, last) = self.build_region(self.region(op, 1), &[], |b, _| otherwise(b));
        self.terminate(last, OpKind::Yield, vec![]);
        op
    }

    /// `if` producing values: each branch returns the values it yields.
    pub fn if_else_values(
        &mut self,
        cond: ValueId,
        result_tys: &[Ty],
        then: impl FnOnce(&mut Self) -> Vec<ValueId>,
        otherwise: impl FnOnce(&mut Self) -> Vec<ValueId>,
    ) -> Vec<ValueId> {
        let op = self.op_with_regions(OpKind::If, vec![cond], result_tys, 2);
        let (values, last) = self.build_region(self.region(op, 0), &[], |b, _| then(b));
        self.terminate(last, OpKind::Yield, values);
        let (values, last) = self.build_region(self.region(op, 1), &[], |b, _| otherwise(b));
        self.terminate(last, OpKind::Yield, values);
        self.func.op(op).results.clone()
    }

    pub fn while_loop(
        &mut self,
        label: Option<&str>,
        cond: impl FnOnce(&mut Self) -> ValueId,
        body: impl FnOnce(&mut Self),
    ) -> OpId {
        let kind = OpKind::While {
            label: label.map(str::to_string),
        };
        let op = self.op_with_regions(kind, vec![], &[], 2);
        let (flag, last) = self.build_region(self.region(op, 0), &[], |b, _| cond(b));
        self.terminate(last, OpKind::Condition, vec![flag]);
        let (_, last) = self.build_region(self.region(op, 1), &[], |b, _| body(b));
        self.terminate(last, OpKind::Yield, vec![]);
        op
    }

    /// `while` threading loop-carried values. `cond` receives the current values and returns
    /// the flag plus the values forwarded to the body (and to the loop results on exit);
    /// `body` returns the next iteration's values.
    pub fn while_carried(
        &mut self,
        label: Option<&str>,
        inits: Vec<ValueId>,
        cond: impl FnOnce(&mut Self, Vec<ValueId>) -> (ValueId, Vec<ValueId>),
        body: impl FnOnce(&mut Self, Vec<ValueId>) -> Vec<ValueId>,
    ) -> Vec<ValueId> {
        let tys: Vec<Ty> = inits.iter().map(|v| self.func.value_ty(*v).clone()).collect();
        let kind = OpKind::While {
            label: label.map(str::to_string),
        };
        let op = self.op_with_regions(kind, inits, &tys, 2);
        let ((flag, forwarded), last) = self.build_region(self.region(op, 0), &tys, cond);
        let operands = std::iter::once(flag).chain(forwarded).collect();
        self.terminate(last, OpKind::Condition, operands);
        let (next, last) = self.build_region(self.region(op, 1), &tys, body);
        self.terminate(last, OpKind::Yield, next);
        self.func.op(op).results.clone()
    }

    pub fn do_while(
        &mut self,
        label: Option<&str>,
        body: impl FnOnce(&mut Self),
        cond: impl FnOnce(&mut Self) -> ValueId,
    ) -> OpId {
        let kind = OpKind::DoWhile {
            label: label.map(str::to_string),
        };
        let op = self.op_with_regions(kind, vec![], &[], 2);
        let (_, last) = self.build_region(self.region(op, 0), &[], |b, _| body(b));
        self.terminate(last, OpKind::Yield, vec![]);
        let (flag, last) = self.build_region(self.region(op, 1), &[], |b, _| cond(b));
        self.terminate(last, OpKind::Condition, vec![flag]);
        op
    }

    /// `for (; cond; incr) body`. A `cond` returning `None` means "no condition".
    pub fn for_loop(
        &mut self,
        label: Option<&str>,
        cond: impl FnOnce(&mut Self) -> Option<ValueId>,
        body: impl FnOnce(&mut Self),
        incr: impl FnOnce(&mut Self),
    ) -> OpId {
        let kind = OpKind::For {
            label: label.map(str::to_string),
        };
        let op = self.op_with_regions(kind, vec![], &[], 3);
        let (flag, last) = self.build_region(self.region(op, 0), &[], |b, _| cond(b));
        match flag {
            Some(flag) => self.terminate(last, OpKind::Condition, vec![flag]),
            None => self.terminate(last, OpKind::NoCondition, vec![]),
        }
        let (_, last) = self.build_region(self.region(op, 1), &[], |b, _| body(b));
        self.terminate(last, OpKind::Yield, vec![]);
        let (_, last) = self.build_region(self.region(op, 2), &[], |b, _| incr(b));
        self.terminate(last, OpKind::Yield, vec![]);
        op
    }

    /// A switch whose cases are already expanded into the region body.
    pub fn switch(&mut self, label: Option<&str>, body: impl FnOnce(&mut Self)) -> OpId {
        let kind = OpKind::Switch {
            label: label.map(str::to_string),
        };
        let op = self.op_with_regions(kind, vec![], &[], 1);
        let (_, last) = self.build_region(self.region(op, 0), &[], |b, _| body(b));
        self.terminate(last, OpKind::Merge, vec![]);
        op
    }

    pub fn labeled(&mut self, label: &str, body: impl FnOnce(&mut Self)) -> OpId {
        let kind = OpKind::Label {
            label: label.to_string(),
        };
        let op = self.op_with_regions(kind, vec![], &[], 1);
        let (_, last) = self.build_region(self.region(op, 0), &[], |b, _| body(b));
        self.terminate(last, OpKind::Merge, vec![]);
        op
    }

    /// `try { body } catch { catches } finally { finally }`. An empty closure leaves the
    /// clause without operations.
    pub fn try_catch(
        &mut self,
        body: impl FnOnce(&mut Self),
        catches: impl FnOnce(&mut Self),
        finally: impl FnOnce(&mut Self),
    ) -> OpId {
        let op = self.op_with_regions(OpKind::Try, vec![], &[], 3);
        let (_, last) = self.build_region(self.region(op, 0), &[], |b, _| body(b));
        self.terminate(last, OpKind::Yield, vec![]);
        let (_, last) = self.build_region(self.region(op, 1), &[], |b, _| catches(b));
        self.terminate(last, OpKind::Yield, vec![]);
        let (_, last) = self.build_region(self.region(op, 2), &[], |b, _| finally(b));
        self.terminate(last, OpKind::Yield, vec![]);
        op
    }

    pub fn try_finally(
        &mut self,
        body: impl FnOnce(&mut Self),
        finally: impl FnOnce(&mut Self),
    ) -> OpId {
        self.try_catch(body, |_| {}, finally)
    }

    /// Bind the caught exception to `var` (a `ref<T>`). `None` catches everything.
    pub fn catch(&mut self, catch_type: Option<Ty>, var: ValueId) -> OpId {
        self.op(OpKind::Catch { catch_type }, vec![var], &[])
    }

    /// Closure environment holding `values`; `field_tys` gives the stored type of each field.
    pub fn capture(&mut self, values: Vec<ValueId>, field_tys: Vec<Ty>) -> ValueId {
        self.value_op(
            OpKind::Capture,
            values,
            Ty::reference(Ty::Tuple(field_tys)),
        )
    }

    pub fn state_label(&mut self) -> OpId {
        self.op(OpKind::StateLabel, vec![], &[])
    }

    pub fn switch_state(&mut self, state: ValueId, default_dest: BlockId) -> OpId {
        self.op(OpKind::SwitchState { default_dest }, vec![state], &[])
    }
}
