use crate::error::Error;
use crate::ir::{Function, OpKind};
use crate::Result;

/// Check that `func` is a flat CFG: one terminator per block, no structured ops left, every
/// successor a live body block, and no nested region still holding blocks.
pub fn verify_lowered(func: &Function) -> Result<()> {
    let body = func.body_blocks();
    if body.is_empty() {
        return Err(Error::internal(format!("`{}` has an empty body", func.name)));
    }

    for block in body {
        let data = func.block(*block);
        if !data.live {
            return Err(Error::internal(format!("dead {} left in body", block)));
        }
        let Some((last, init)) = data.ops.split_last() else {
            return Err(Error::internal(format!("{} has no terminator", block)));
        };
        if !func.kind(*last).is_terminator() {
            return Err(Error::internal_at(
                *last,
                format!("{} does not end in a terminator", block),
            ));
        }
        if let Some(stray) = init.iter().find(|op| func.kind(**op).is_terminator()) {
            return Err(Error::internal_at(
                *stray,
                format!("terminator in the middle of {}", block),
            ));
        }

        for op in &data.ops {
            let op_data = func.op(*op);
            if op_data.kind.is_structured() {
                return Err(Error::internal_at(
                    *op,
                    format!("structured `{}` survived lowering", op_data.kind),
                ));
            }
            if op_data.regions.iter().any(|r| !func.region(*r).blocks.is_empty()) {
                return Err(Error::internal_at(*op, "nested region still owns blocks"));
            }
            for succ in op_data.kind.successors() {
                let target = func.block(succ);
                if !target.live || target.parent != Some(func.body) {
                    return Err(Error::internal_at(
                        *op,
                        format!("successor {} is not a live body block", succ),
                    ));
                }
            }
            if let OpKind::CondBr {
                then_dest,
                else_dest,
                then_args,
            } = &op_data.kind
            {
                let then_arity = func.block(*then_dest).args.len();
                let else_arity = func.block(*else_dest).args.len();
                if *then_args as usize != then_arity
                    || op_data.operands.len() != 1 + then_arity + else_arity
                {
                    return Err(Error::internal_at(*op, "branch arguments do not match targets"));
                }
            }
            if let OpKind::Br { target } = &op_data.kind {
                if func.block(*target).args.len() != op_data.operands.len() {
                    return Err(Error::internal_at(*op, "branch arguments do not match target"));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, FunctionSig};

    #[test]
    fn structured_input_is_rejected() {
        let mut b = FunctionBuilder::new("structured", FunctionSig::void());
        b.exit();
        let func = b.finish();
        let err = verify_lowered(&func).unwrap_err();
        assert!(err.to_string().contains("structured"), "{err}");
    }

    #[test]
    fn flat_function_passes() {
        let mut func = Function::new("flat", FunctionSig::void());
        let entry = func.entry_block().unwrap();
        let exit = func.new_block(&[]);
        func.append_block(func.body, exit);
        func.emit_at_end(entry, OpKind::Br { target: exit }, vec![], &[]);
        func.emit_at_end(exit, OpKind::ReturnInternal, vec![], &[]);
        verify_lowered(&func).unwrap();

        let dangling = func.new_block(&[]);
        func.emit_at_end(dangling, OpKind::Unreachable, vec![], &[]);
        let last = *func.block(exit).ops.last().unwrap();
        func.replace_kind(last, OpKind::Br { target: dangling });
        assert!(verify_lowered(&func).unwrap_err().is_internal());
    }
}
