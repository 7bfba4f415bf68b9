//! Call/invoke selection.
//!
//! A call-like op inside a try has an unwind target by the time it reaches the top level; it
//! becomes an `Invoke` ending its block. Everything else is a plain call.

use crate::pass::Lowerer;
use sf_core::ir::{Callee, OpId, OpKind};
use sf_core::{trace, Result};

impl Lowerer<'_> {
    pub(crate) fn lower_call(&mut self, op: OpId) -> Result<()> {
        let callee = match self.func.kind(op) {
            OpKind::Call { callee } => Callee::Symbol(callee.clone()),
            _ => Callee::Indirect,
        };
        let Some(unwind) = self.ctx.unwind_target(op) else {
            let kind = match callee {
                Callee::Symbol(callee) => OpKind::CallInternal { callee },
                Callee::Indirect => OpKind::CallIndirectInternal,
            };
            self.func.replace_kind(op, kind);
            return Ok(());
        };

        let normal = self.cut_after(op)?;
        self.func.replace_kind(
            op,
            OpKind::Invoke {
                callee,
                normal,
                unwind,
            },
        );
        self.stats.invokes += 1;
        trace!(op = %op, normal = %normal, unwind = %unwind, "invoke");
        Ok(())
    }

    pub(crate) fn lower_throw(&mut self, op: OpId) -> Result<()> {
        let kind = match self.ctx.unwind_target(op) {
            Some(unwind) => OpKind::ThrowUnwind { unwind },
            None => OpKind::ThrowCall,
        };
        self.func.replace_kind(op, kind);
        self.cut_rest(op)
    }
}

#[cfg(test)]
mod tests {
    use crate::options::LoweringOptions;
    use sf_core::ir::{FunctionBuilder, FunctionSig, OpKind};
    use sf_core::rtti::RttiTable;
    use sf_core::ty::Ty;

    #[test]
    fn calls_outside_try_stay_plain() {
        let mut b = FunctionBuilder::new("f", FunctionSig::void());
        b.entry();
        let callee = b.func_ref("g", Ty::function(vec![], Ty::Void));
        b.call_indirect(callee, vec![], &[]);
        b.call("h", vec![], &[]);
        b.exit();
        let mut func = b.finish();
        crate::lower_function(&mut func, &RttiTable::new(), &LoweringOptions::default()).unwrap();

        let kinds: Vec<&OpKind> = func
            .body_blocks()
            .iter()
            .flat_map(|block| func.block(*block).ops.iter())
            .map(|op| func.kind(*op))
            .collect();
        assert!(kinds.iter().any(|k| matches!(k, OpKind::CallIndirectInternal)));
        assert!(kinds
            .iter()
            .any(|k| matches!(k, OpKind::CallInternal { callee } if callee == "h")));
        assert!(!kinds.iter().any(|k| matches!(k, OpKind::Invoke { .. })));
    }

    #[test]
    fn throw_in_try_unwinds_to_the_landing_pad() {
        let mut b = FunctionBuilder::new("f", FunctionSig::void());
        b.entry();
        let var = b.variable(Ty::Any);
        b.try_catch(
            |b| {
                let code = b.const_i32(7);
                b.throw(code);
            },
            |b| {
                b.catch(None, var);
            },
            |_| {},
        );
        b.exit();
        let mut func = b.finish();
        crate::lower_function(&mut func, &RttiTable::new(), &LoweringOptions::default()).unwrap();

        let pads: Vec<_> = func
            .body_blocks()
            .iter()
            .copied()
            .filter(|block| {
                func.block(*block)
                    .ops
                    .first()
                    .is_some_and(|op| matches!(func.kind(*op), OpKind::LandingPad { .. }))
            })
            .collect();
        assert_eq!(pads.len(), 1);
        let throws: Vec<_> = func
            .body_blocks()
            .iter()
            .filter_map(|block| func.terminator(*block))
            .filter_map(|term| match func.kind(term) {
                OpKind::ThrowUnwind { unwind } => Some(*unwind),
                _ => None,
            })
            .collect();
        assert_eq!(throws, pads);
    }
}
