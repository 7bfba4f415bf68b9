//! Function prologue/epilogue and the returns that reach the single return block.

use crate::context::Destination;
use crate::contract_bail;
use crate::pass::Lowerer;
use sf_core::ir::{BlockId, OpId, OpKind};
use sf_core::ty::{ConstValue, Ty};
use sf_core::{debug, Result};

impl Lowerer<'_> {
    /// `Entry` becomes the return slot allocation (when the function returns a value) and
    /// creates the return block at the end of the body.
    pub(crate) fn lower_entry(&mut self, op: OpId) -> Result<()> {
        let slot = self.func.result(op);
        match slot {
            Some(_) => self
                .func
                .replace_kind(op, OpKind::Variable { in_heap: false }),
            None => self.func.erase_op(op)?,
        }

        let ret_block = self.func.new_block(&[]);
        self.func.append_block(self.func.body, ret_block);
        match slot {
            Some(slot) => {
                let ret_ty = self.func.sig.ret.clone();
                let load = self
                    .func
                    .emit_at_end(ret_block, OpKind::Load, vec![slot], &[ret_ty]);
                let value = self.func.op(load).results[0];
                self.func
                    .emit_at_end(ret_block, OpKind::ReturnInternal, vec![value], &[]);
            }
            None => {
                self.func
                    .emit_at_end(ret_block, OpKind::ReturnInternal, vec![], &[]);
            }
        }
        debug!(block = %ret_block, "return block created");
        self.ctx.set_return_block(ret_block);
        Ok(())
    }

    pub(crate) fn lower_exit(&mut self, op: OpId) -> Result<()> {
        let ret_block = self.ctx.return_block(op)?;
        self.make_branch(op, ret_block, vec![]);
        Ok(())
    }

    pub(crate) fn lower_return(&mut self, op: OpId) -> Result<()> {
        let dest = self.ctx.jump(op).unwrap_or(Destination::Return);
        self.leave(op, dest)
    }

    pub(crate) fn lower_return_val(&mut self, op: OpId) -> Result<()> {
        self.store_return_value(op)?;
        self.lower_return(op)
    }

    /// Generator-terminal value: store it and suspend through the return block. A suspension
    /// inside try/finally does not run the finally.
    pub(crate) fn lower_yield_return_val(&mut self, op: OpId) -> Result<()> {
        self.store_return_value(op)?;
        let ret_block = self.ctx.return_block(op)?;
        self.make_branch(op, ret_block, vec![]);
        self.cut_rest(op)
    }

    fn store_return_value(&mut self, op: OpId) -> Result<()> {
        let operands = self.func.op(op).operands.clone();
        let [value, slot] = operands[..] else {
            contract_bail!(op, "expected (value, slot) operands, found {}", operands.len());
        };
        self.func
            .emit_before(op, OpKind::Store, vec![value, slot], &[])?;
        Ok(())
    }

    /// Replace `op` with a transfer to `dest`, closing the catches it leaves and routing
    /// through a finally when `dest` says so. Whatever followed `op` is cut off.
    pub(crate) fn leave(&mut self, op: OpId, dest: Destination) -> Result<()> {
        for _ in 0..self.ctx.catch_depth(op) {
            self.func.emit_before(op, OpKind::EndCatch, vec![], &[])?;
        }
        let target = match dest {
            Destination::Block(block) => block,
            Destination::Return => self.ctx.return_block(op)?,
            Destination::Finally { try_op, code } => {
                let route = self.ctx.finally_route(try_op)?;
                let (slot, entry) = (route.slot, route.entry);
                let value = self.const_i32_before(op, code)?;
                self.func
                    .emit_before(op, OpKind::Store, vec![value, slot], &[])?;
                entry
            }
        };
        self.make_branch(op, target, vec![]);
        self.cut_rest(op)
    }

    /// A block that performs the transfer `dest` on its own; used as a switch target.
    pub(crate) fn destination_block(
        &mut self,
        user: OpId,
        dest: Destination,
        before: BlockId,
    ) -> Result<BlockId> {
        match dest {
            Destination::Block(block) => Ok(block),
            Destination::Return => self.ctx.return_block(user),
            Destination::Finally { try_op, code } => {
                let route = self.ctx.finally_route(try_op)?;
                let (slot, entry) = (route.slot, route.entry);
                let block = self.func.new_block(&[]);
                let value = self.func.emit_at_end(
                    block,
                    OpKind::Constant(ConstValue::Int(code)),
                    vec![],
                    &[Ty::I32],
                );
                let value = self.func.op(value).results[0];
                self.func
                    .emit_at_end(block, OpKind::Store, vec![value, slot], &[]);
                self.func
                    .emit_at_end(block, OpKind::Br { target: entry }, vec![], &[]);
                self.func.splice_before(before, vec![block])?;
                Ok(block)
            }
        }
    }
}
