//! Resume-state labels and the dispatch that jumps to them.

use crate::contract_bail;
use crate::pass::Lowerer;
use sf_core::ir::{OpId, OpKind};
use sf_core::{debug, Result};

impl Lowerer<'_> {
    /// The code after a state label becomes the entry of that state.
    pub(crate) fn lower_state_label(&mut self, op: OpId) -> Result<()> {
        let resume = self.cut_after(op)?;
        self.make_branch(op, resume, vec![]);
        self.ctx.push_state_label(resume);
        self.stats.state_labels += 1;
        debug!(op = %op, state = self.ctx.state_labels().len(), block = %resume, "state label");
        Ok(())
    }

    /// Replace the deferred `SwitchState` ops once every state label is known.
    ///
    /// State 0 is the normal entry, state `i` resumes at the `i`-th label; anything else ends
    /// up in the return block.
    pub(crate) fn finish_dispatch(&mut self) -> Result<()> {
        for op in self.ctx.take_pending_dispatch() {
            if !self.func.op(op).live {
                continue;
            }
            let OpKind::SwitchState { default_dest } = *self.func.kind(op) else {
                continue;
            };
            let labels = self.ctx.state_labels().to_vec();
            if labels.is_empty() {
                self.make_branch(op, default_dest, vec![]);
                continue;
            }
            let Some(&state) = self.func.op(op).operands.first() else {
                contract_bail!(op, "state dispatch without a state operand");
            };
            let default = self.ctx.return_block(op)?;
            let cases = std::iter::once(default_dest)
                .chain(labels)
                .enumerate()
                .map(|(index, block)| (index as i64, block))
                .collect();
            self.func.replace_kind(op, OpKind::SwitchInt { default, cases });
            self.func.set_operands(op, vec![state]);
            debug!(op = %op, states = self.ctx.state_labels().len(), "state dispatch built");
        }
        Ok(())
    }
}
