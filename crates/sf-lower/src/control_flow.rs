//! if / while / do-while / for / switch / labeled block.
//!
//! Every construct follows the same shape: split its block right after the op, lay the
//! regions out between the two halves, turn the region terminators into branches and finally
//! replace the op itself with the branch into the first region.

use crate::contract_bail;
use crate::jumps::JumpTargets;
use crate::pass::Lowerer;
use sf_core::ir::{BlockId, OpId, OpKind, RegionId, ValueId};
use sf_core::{debug, Result};

impl Lowerer<'_> {
    /// Move the blocks of `region` in front of `anchor`, returning them in layout order.
    pub(crate) fn inline_region(
        &mut self,
        region: RegionId,
        anchor: BlockId,
    ) -> Result<Vec<BlockId>> {
        let blocks = self.func.take_region(region);
        self.func.splice_before(anchor, blocks.clone())?;
        Ok(blocks)
    }

    /// Top-level terminators of `blocks` whose kind satisfies `pred`.
    pub(crate) fn terminators_where(
        &self,
        blocks: &[BlockId],
        pred: impl Fn(&OpKind) -> bool,
    ) -> Vec<OpId> {
        blocks
            .iter()
            .filter_map(|block| self.func.terminator(*block))
            .filter(|term| pred(self.func.kind(*term)))
            .collect()
    }

    /// Split after the construct and give the continuation one argument per construct result,
    /// rerouting every use of the results to those arguments.
    fn continuation(&mut self, op: OpId) -> Result<BlockId> {
        let cont = self.cut_after(op)?;
        let results = self.func.op(op).results.clone();
        for result in results {
            let ty = self.func.value_ty(result).clone();
            let arg = self.func.add_block_arg(cont, ty);
            self.func.replace_all_uses(result, arg);
        }
        Ok(cont)
    }

    /// Erase the construct and end its block with a branch to `target`.
    pub(crate) fn replace_with_branch(&mut self, op: OpId, target: BlockId, args: Vec<ValueId>) -> Result<()> {
        let before = self.parent_block(op)?;
        self.func.erase_op(op)?;
        self.func.emit_at_end(before, OpKind::Br { target }, args, &[]);
        Ok(())
    }

    fn region_of(&self, op: OpId, index: usize) -> Result<RegionId> {
        match self.func.op(op).regions.get(index) {
            Some(region) => Ok(*region),
            None => contract_bail!(op, "missing region #{}", index),
        }
    }

    fn entry_of(&self, op: OpId, blocks: &[BlockId], what: &str) -> Result<BlockId> {
        match blocks.first() {
            Some(block) => Ok(*block),
            None => contract_bail!(op, "empty {} region", what),
        }
    }

    /// `Condition(cond, args..)` becomes a conditional branch passing `args` to either side.
    fn lower_condition(&mut self, term: OpId, then_dest: BlockId, else_dest: BlockId) -> Result<()> {
        let operands = self.func.op(term).operands.clone();
        let Some((cond, args)) = operands.split_first() else {
            contract_bail!(term, "condition without a flag");
        };
        let flag = self.truthify(term, *cond)?;
        let mut branch_operands = vec![flag];
        branch_operands.extend_from_slice(args);
        branch_operands.extend_from_slice(args);
        self.func.replace_kind(
            term,
            OpKind::CondBr {
                then_dest,
                else_dest,
                then_args: args.len() as u32,
            },
        );
        self.func.set_operands(term, branch_operands);
        Ok(())
    }

    /// Region yields forward their operands to `target`.
    fn yields_to(&mut self, blocks: &[BlockId], target: BlockId) {
        for term in self.terminators_where(blocks, |kind| matches!(kind, OpKind::Yield)) {
            let args = self.func.op(term).operands.clone();
            self.make_branch(term, target, args);
        }
    }

    pub(crate) fn lower_if(&mut self, op: OpId) -> Result<()> {
        let Some(&cond) = self.func.op(op).operands.first() else {
            contract_bail!(op, "if without a condition");
        };
        let then_region = self.region_of(op, 0)?;
        let else_region = self.region_of(op, 1)?;
        let has_results = !self.func.op(op).results.is_empty();

        let flag = self.truthify(op, cond)?;
        let cont = self.continuation(op)?;
        let then_blocks = self.inline_region(then_region, cont)?;
        let else_blocks = self.inline_region(else_region, cont)?;
        if has_results && else_blocks.is_empty() {
            contract_bail!(op, "if with results needs an else region");
        }

        let then_entry = then_blocks.first().copied().unwrap_or(cont);
        let else_entry = else_blocks.first().copied().unwrap_or(cont);
        self.yields_to(&then_blocks, cont);
        self.yields_to(&else_blocks, cont);

        let before = self.parent_block(op)?;
        self.func.erase_op(op)?;
        self.func.emit_at_end(
            before,
            OpKind::CondBr {
                then_dest: then_entry,
                else_dest: else_entry,
                then_args: 0,
            },
            vec![flag],
            &[],
        );
        debug!(op = %op, then = %then_entry, els = %else_entry, cont = %cont, "if lowered");
        Ok(())
    }

    pub(crate) fn lower_while(&mut self, op: OpId) -> Result<()> {
        let kind = self.func.kind(op).clone();
        let inits = self.func.op(op).operands.clone();
        let cond_region = self.region_of(op, 0)?;
        let body_region = self.region_of(op, 1)?;

        let cont = self.continuation(op)?;
        let cond_blocks = self.inline_region(cond_region, cont)?;
        let body_blocks = self.inline_region(body_region, cont)?;
        let cond_entry = self.entry_of(op, &cond_blocks, "condition")?;
        let body_entry = self.entry_of(op, &body_blocks, "loop body")?;

        let scope: Vec<BlockId> = cond_blocks.iter().chain(&body_blocks).copied().collect();
        self.register_jumps(
            &kind,
            &scope,
            JumpTargets {
                break_to: cont,
                continue_to: Some(cond_entry),
            },
        )?;

        for term in self.terminators_where(&cond_blocks, |k| matches!(k, OpKind::Condition)) {
            self.lower_condition(term, body_entry, cont)?;
        }
        self.yields_to(&body_blocks, cond_entry);
        self.replace_with_branch(op, cond_entry, inits)?;
        debug!(op = %op, cond = %cond_entry, body = %body_entry, cont = %cont, "while lowered");
        Ok(())
    }

    pub(crate) fn lower_do_while(&mut self, op: OpId) -> Result<()> {
        let kind = self.func.kind(op).clone();
        let inits = self.func.op(op).operands.clone();
        let body_region = self.region_of(op, 0)?;
        let cond_region = self.region_of(op, 1)?;

        let cont = self.continuation(op)?;
        let body_blocks = self.inline_region(body_region, cont)?;
        let cond_blocks = self.inline_region(cond_region, cont)?;
        let body_entry = self.entry_of(op, &body_blocks, "loop body")?;
        let cond_entry = self.entry_of(op, &cond_blocks, "condition")?;

        let scope: Vec<BlockId> = body_blocks.iter().chain(&cond_blocks).copied().collect();
        self.register_jumps(
            &kind,
            &scope,
            JumpTargets {
                break_to: cont,
                continue_to: Some(cond_entry),
            },
        )?;

        self.yields_to(&body_blocks, cond_entry);
        for term in self.terminators_where(&cond_blocks, |k| matches!(k, OpKind::Condition)) {
            self.lower_condition(term, body_entry, cont)?;
        }
        self.replace_with_branch(op, body_entry, inits)?;
        debug!(op = %op, body = %body_entry, cond = %cond_entry, cont = %cont, "do-while lowered");
        Ok(())
    }

    pub(crate) fn lower_for(&mut self, op: OpId) -> Result<()> {
        let kind = self.func.kind(op).clone();
        let cond_region = self.region_of(op, 0)?;
        let body_region = self.region_of(op, 1)?;
        let incr_region = self.region_of(op, 2)?;

        let cont = self.continuation(op)?;
        let cond_blocks = self.inline_region(cond_region, cont)?;
        let body_blocks = self.inline_region(body_region, cont)?;
        let incr_blocks = self.inline_region(incr_region, cont)?;
        let cond_entry = self.entry_of(op, &cond_blocks, "condition")?;
        let body_entry = self.entry_of(op, &body_blocks, "loop body")?;
        let incr_entry = incr_blocks.first().copied().unwrap_or(cond_entry);

        let scope: Vec<BlockId> = cond_blocks
            .iter()
            .chain(&body_blocks)
            .chain(&incr_blocks)
            .copied()
            .collect();
        self.register_jumps(
            &kind,
            &scope,
            JumpTargets {
                break_to: cont,
                continue_to: Some(incr_entry),
            },
        )?;

        for term in self.terminators_where(&cond_blocks, |k| {
            matches!(k, OpKind::Condition | OpKind::NoCondition)
        }) {
            if matches!(self.func.kind(term), OpKind::NoCondition) {
                self.make_branch(term, body_entry, vec![]);
            } else {
                self.lower_condition(term, body_entry, cont)?;
            }
        }
        self.yields_to(&body_blocks, incr_entry);
        self.yields_to(&incr_blocks, cond_entry);
        self.replace_with_branch(op, cond_entry, vec![])?;
        debug!(op = %op, cond = %cond_entry, body = %body_entry, incr = %incr_entry, cont = %cont, "for lowered");
        Ok(())
    }

    /// Switch and labeled block: one region ending in `Merge`.
    pub(crate) fn lower_merge_construct(&mut self, op: OpId) -> Result<()> {
        let kind = self.func.kind(op).clone();
        let body_region = self.region_of(op, 0)?;

        let cont = self.continuation(op)?;
        let blocks = self.inline_region(body_region, cont)?;
        let entry = blocks.first().copied().unwrap_or(cont);
        // a labeled continue naming a labeled block restarts the block
        let continue_to = matches!(kind, OpKind::Label { .. }).then_some(entry);
        self.register_jumps(
            &kind,
            &blocks,
            JumpTargets {
                break_to: cont,
                continue_to,
            },
        )?;

        for term in self.terminators_where(&blocks, |k| matches!(k, OpKind::Merge)) {
            self.make_branch(term, cont, vec![]);
        }
        self.replace_with_branch(op, entry, vec![])?;
        debug!(op = %op, kind = %kind, entry = %entry, cont = %cont, "merge construct lowered");
        Ok(())
    }
}
