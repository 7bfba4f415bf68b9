//! break / continue binding.

use crate::context::Destination;
use crate::contract_bail;
use crate::pass::Lowerer;
use sf_core::ir::{BlockId, OpId, OpKind};
use sf_core::Result;

/// Where the jumps bound to a construct go.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JumpTargets {
    pub break_to: BlockId,
    /// `None` for constructs a `continue` cannot name.
    pub continue_to: Option<BlockId>,
}

/// Bindings hidden by the constructs between the scan root and the current op.
#[derive(Debug, Clone, Copy, Default)]
struct Shadow {
    unlabeled_break: bool,
    unlabeled_continue: bool,
    same_label: bool,
}

impl Shadow {
    fn enter(self, nested: &OpKind, label: Option<&str>) -> Self {
        Self {
            unlabeled_break: self.unlabeled_break || nested.is_breakable(),
            unlabeled_continue: self.unlabeled_continue || nested.is_loop(),
            same_label: self.same_label
                || (label.is_some() && nested.construct_label() == label),
        }
    }
}

impl Lowerer<'_> {
    /// Bind every break/continue under `blocks` that refers to `construct`.
    ///
    /// Unlabeled jumps bind to the nearest loop (or switch, for break); a labeled jump binds to
    /// the nearest construct carrying its label, looking through everything in between.
    pub(crate) fn register_jumps(
        &mut self,
        construct: &OpKind,
        blocks: &[BlockId],
        targets: JumpTargets,
    ) -> Result<()> {
        let mut found = Vec::new();
        self.collect_jumps(construct, blocks, Shadow::default(), &mut found);
        for op in found {
            let dest = match self.func.kind(op) {
                OpKind::Break { .. } => targets.break_to,
                _ => match targets.continue_to {
                    Some(block) => block,
                    None => contract_bail!(op, "`continue` names a switch"),
                },
            };
            // jumps carry no values, so they cannot feed a loop that threads them
            if !self.func.block(dest).args.is_empty() {
                contract_bail!(
                    op,
                    "jump into {} which expects {} carried values",
                    dest,
                    self.func.block(dest).args.len()
                );
            }
            self.ctx.register_jump(op, Destination::Block(dest));
        }
        Ok(())
    }

    fn collect_jumps(
        &self,
        construct: &OpKind,
        blocks: &[BlockId],
        shadow: Shadow,
        found: &mut Vec<OpId>,
    ) {
        let label = construct.construct_label();
        for block in blocks {
            for op in &self.func.block(*block).ops {
                let kind = self.func.kind(*op);
                let binds = match kind {
                    OpKind::Break { label: None } => {
                        construct.is_breakable() && !shadow.unlabeled_break
                    }
                    OpKind::Continue { label: None } => {
                        construct.is_loop() && !shadow.unlabeled_continue
                    }
                    OpKind::Break { label: Some(name) } | OpKind::Continue { label: Some(name) } => {
                        label == Some(name.as_str()) && !shadow.same_label
                    }
                    _ => false,
                };
                if binds {
                    found.push(*op);
                }

                let regions = &self.func.op(*op).regions;
                if regions.is_empty() {
                    continue;
                }
                let inner = shadow.enter(kind, label);
                for region in regions {
                    let nested = &self.func.region(*region).blocks;
                    self.collect_jumps(construct, nested, inner, found);
                }
            }
        }
    }

    pub(crate) fn lower_jump(&mut self, op: OpId) -> Result<()> {
        let dest = self.ctx.resolve_jump(op)?;
        self.leave(op, dest)
    }
}
