//! try / catch / finally.
//!
//! Layout after lowering, all between the block holding the try and its continuation:
//!
//! ```text
//! body.. | landing pad, [begin catch, mismatch] | catches.. | finally.. | cleanup pad | finally clone..
//! ```
//!
//! The body and the catches leave through the finally; exceptions raised in the body go to the
//! landing pad, exceptions raised in the catches (or not matching the catch type) go to the
//! cleanup pad, which runs the finally clone and passes the exception on.

use crate::context::{Destination, FinallyRoute, TryPads, TryPlacement};
use crate::error::lowering_error;
use crate::{contract_bail, lower_ensure};
use crate::options::UnwindStrategy;
use crate::pass::Lowerer;
use sf_core::ir::walk::WalkControl;
use sf_core::ir::{BlockId, OpId, OpKind, RegionId, ValueId};
use sf_core::rtti::TypeToken;
use sf_core::ty::Ty;
use sf_core::{debug, trace, Result};

/// What the finally clone does once it ran.
#[derive(Debug, Clone, Copy)]
enum CleanupExit {
    /// `EndCleanup` towards the parent pad, or out of the function.
    Chain(Option<BlockId>),
    /// Rethrow the caught exception to the parent pad.
    Rethrow(BlockId),
}

impl Lowerer<'_> {
    pub(crate) fn lower_try(&mut self, op: OpId) -> Result<()> {
        let [body_region, catches_region, finally_region] = self.func.op(op).regions[..] else {
            contract_bail!(op, "try needs body, catch and finally regions");
        };

        for (region, placement) in [
            (body_region, TryPlacement::Body),
            (catches_region, TryPlacement::Catches),
            (finally_region, TryPlacement::Finally),
        ] {
            for inner in self.nested_ops(region, |kind| matches!(kind, OpKind::Try)) {
                self.ctx.set_parent_try(inner, op, placement);
            }
        }

        let catch_has_ops = self.region_has_ops(catches_region);
        let finally_has_ops = self.region_has_ops(finally_region);
        let parent = self.ctx.parent_landing(op);

        let catch_ops =
            self.nested_ops(catches_region, |kind| matches!(kind, OpKind::Catch { .. }));
        let catch_type = match catch_ops.first().map(|c| self.func.kind(*c)) {
            Some(OpKind::Catch { catch_type }) => catch_type.clone(),
            _ => None,
        };
        let token = match &catch_type {
            Some(ty) => match self.rtti.type_token(ty) {
                Some(token) => Some(token),
                None => contract_bail!(op, "no type info registered for catch type {}", ty),
            },
            None => None,
        };

        let body_ops = self.func.ops_in_region(body_region);
        let catches_ops = self.func.ops_in_region(catches_region);
        let body_escapes = self.escaping_jumps(&body_ops);
        let catch_escapes = self.escaping_jumps(&catches_ops);
        for escaping in &catch_escapes {
            self.ctx.enter_catch(*escaping);
        }

        let cont = self.cut_after(op)?;

        let clone = if finally_has_ops {
            let (blocks, map) = self.func.deep_clone_region(finally_region);
            self.ctx.copy_for_clone(&map);
            self.stats.cleanup_clones += 1;
            blocks
        } else {
            Vec::new()
        };

        let body_blocks = self.inline_region(body_region, cont)?;
        let Some(&body_entry) = body_blocks.first() else {
            contract_bail!(op, "empty try body");
        };
        let catches_blocks = self.keep_or_discard(catches_region, catch_has_ops);
        let finally_blocks = self.keep_or_discard(finally_region, finally_has_ops);

        // the cleanup pad exists whenever there is a finally to run, even if nothing can throw
        let cleanup = match clone.first() {
            Some(&clone_entry) => {
                let exit = match (self.options.unwind_strategy, parent) {
                    (UnwindStrategy::CatchAndRethrow, Some(parent)) => CleanupExit::Rethrow(parent),
                    _ => CleanupExit::Chain(parent),
                };
                let pad = self.build_cleanup_pad(&clone, clone_entry, exit);
                let mut blocks = vec![pad];
                blocks.extend(clone.iter().copied());
                Some((pad, blocks))
            }
            None => None,
        };
        let cleanup_pad = cleanup.as_ref().map(|(pad, _)| *pad);

        let landing = match catches_blocks.first() {
            Some(&catch_entry) => {
                let (pad, pad_blocks, payload) =
                    self.build_landing_pad(catch_entry, catch_type, token, cleanup_pad, parent);
                for catch_op in &catch_ops {
                    self.ctx.bind_catch(*catch_op, payload);
                }
                self.func.splice_before(cont, pad_blocks)?;
                Some(pad)
            }
            None => cleanup_pad,
        };
        self.func.splice_before(cont, catches_blocks.clone())?;
        self.func.splice_before(cont, finally_blocks.clone())?;
        if let Some((_, blocks)) = cleanup {
            self.func.splice_before(cont, blocks)?;
        }
        self.stats.landing_pads += usize::from(catch_has_ops) + usize::from(cleanup_pad.is_some());

        if let Some(landing) = landing {
            for call in self.call_likes(&body_ops) {
                self.ctx.register_unwind(call, landing);
            }
        }
        if let Some(pad) = cleanup_pad {
            for call in self.call_likes(&catches_ops) {
                self.ctx.register_unwind(call, pad);
            }
        }
        self.ctx.set_pads(
            op,
            TryPads {
                landing,
                cleanup: cleanup_pad,
            },
        );

        let exit = finally_blocks.first().copied().unwrap_or(cont);
        let escapes: Vec<OpId> = body_escapes.into_iter().chain(catch_escapes).collect();
        let slot = match finally_blocks.first() {
            Some(&finally_entry) if !escapes.is_empty() => {
                Some(self.route_through_finally(op, finally_entry, &escapes)?)
            }
            _ => None,
        };

        for term in self.terminators_where(&body_blocks, |kind| matches!(kind, OpKind::Yield)) {
            self.complete_normally(term, slot)?;
            self.make_branch(term, exit, vec![]);
        }
        for term in self.terminators_where(&catches_blocks, |kind| matches!(kind, OpKind::Yield)) {
            self.func.emit_before(term, OpKind::EndCatch, vec![], &[])?;
            self.complete_normally(term, slot)?;
            self.make_branch(term, exit, vec![]);
        }
        for term in self.terminators_where(&finally_blocks, |kind| matches!(kind, OpKind::Yield)) {
            self.finish_finally(op, term, slot, cont)?;
        }

        self.replace_with_branch(op, body_entry, vec![])?;
        debug!(
            op = %op,
            body = %body_entry,
            landing = ?landing,
            cleanup = ?cleanup_pad,
            routed = escapes.len(),
            "try lowered"
        );
        Ok(())
    }

    /// `Catch` binds the landing pad payload to its variable.
    pub(crate) fn lower_catch(&mut self, op: OpId) -> Result<()> {
        let payload = self.ctx.catch_binding(op)?;
        let Some(&var) = self.func.op(op).operands.first() else {
            contract_bail!(op, "catch without a variable");
        };
        self.func.replace_kind(op, OpKind::SaveCatchVar);
        self.func.set_operands(op, vec![payload, var]);
        Ok(())
    }

    /// Ops under `region` matching `pred`, without looking inside them.
    fn nested_ops(&self, region: RegionId, pred: impl Fn(&OpKind) -> bool) -> Vec<OpId> {
        let mut found = Vec::new();
        self.func.walk_region(region, &mut |op| {
            if pred(self.func.kind(op)) {
                found.push(op);
                WalkControl::Skip
            } else {
                WalkControl::Descend
            }
        });
        found
    }

    fn region_has_ops(&self, region: RegionId) -> bool {
        self.func
            .shallow_ops(region)
            .iter()
            .any(|op| !self.func.kind(*op).is_terminator())
    }

    fn keep_or_discard(&mut self, region: RegionId, keep: bool) -> Vec<BlockId> {
        let blocks = self.func.take_region(region);
        if keep {
            blocks
        } else {
            self.func.discard_blocks(blocks);
            Vec::new()
        }
    }

    fn call_likes(&self, ops: &[OpId]) -> Vec<OpId> {
        ops.iter()
            .copied()
            .filter(|op| self.func.kind(*op).is_call_like())
            .collect()
    }

    /// Returns and the break/continue ops already bound to a construct outside the try.
    fn escaping_jumps(&self, ops: &[OpId]) -> Vec<OpId> {
        ops.iter()
            .copied()
            .filter(|op| match self.func.kind(*op) {
                OpKind::Return | OpKind::ReturnVal => true,
                OpKind::Break { .. } | OpKind::Continue { .. } => self.ctx.jump(*op).is_some(),
                _ => false,
            })
            .collect()
    }

    fn build_cleanup_pad(
        &mut self,
        clone: &[BlockId],
        clone_entry: BlockId,
        exit: CleanupExit,
    ) -> BlockId {
        let pad = self.func.new_block(&[]);
        let rethrow = matches!(exit, CleanupExit::Rethrow(_));
        let landing = self.func.emit_at_end(
            pad,
            OpKind::LandingPad {
                cleanup: !rethrow,
                catch_type: None,
            },
            vec![],
            &[Ty::Any],
        );
        let exception = self.func.op(landing).results[0];
        if rethrow {
            self.func
                .emit_at_end(pad, OpKind::BeginCatch, vec![exception], &[Ty::Any]);
        } else {
            self.func.emit_at_end(pad, OpKind::BeginCleanup, vec![], &[]);
        }
        self.func
            .emit_at_end(pad, OpKind::Br { target: clone_entry }, vec![], &[]);

        let kind = match exit {
            CleanupExit::Chain(unwind) => OpKind::EndCleanup { unwind },
            CleanupExit::Rethrow(unwind) => OpKind::ThrowUnwind { unwind },
        };
        for term in self.terminators_where(clone, |kind| matches!(kind, OpKind::Yield)) {
            self.func.replace_kind(term, kind.clone());
            self.func.set_operands(term, vec![exception]);
        }
        trace!(pad = %pad, ?exit, "cleanup pad built");
        pad
    }

    /// Landing pad in front of the catches. Returns the pad, every block it needs and the
    /// payload handed to the catch clauses.
    fn build_landing_pad(
        &mut self,
        catch_entry: BlockId,
        catch_type: Option<Ty>,
        token: Option<TypeToken>,
        cleanup_pad: Option<BlockId>,
        parent: Option<BlockId>,
    ) -> (BlockId, Vec<BlockId>, ValueId) {
        let pad = self.func.new_block(&[]);
        let landing = self.func.emit_at_end(
            pad,
            OpKind::LandingPad {
                cleanup: false,
                catch_type: token,
            },
            vec![],
            &[Ty::Any],
        );
        let exception = self.func.op(landing).results[0];
        let payload_ty = catch_type.unwrap_or(Ty::Any);

        let Some(token) = token else {
            let begin = self
                .func
                .emit_at_end(pad, OpKind::BeginCatch, vec![exception], &[payload_ty]);
            let payload = self.func.op(begin).results[0];
            self.func
                .emit_at_end(pad, OpKind::Br { target: catch_entry }, vec![], &[]);
            return (pad, vec![pad], payload);
        };

        let matched = self.func.emit_at_end(
            pad,
            OpKind::CompareCatchType { token },
            vec![exception],
            &[Ty::Bool],
        );
        let matched = self.func.op(matched).results[0];

        let begin_block = self.func.new_block(&[]);
        let begin = self
            .func
            .emit_at_end(begin_block, OpKind::BeginCatch, vec![exception], &[payload_ty]);
        let payload = self.func.op(begin).results[0];
        self.func
            .emit_at_end(begin_block, OpKind::Br { target: catch_entry }, vec![], &[]);

        let mismatch = self.func.new_block(&[]);
        match (cleanup_pad, parent) {
            (Some(cleanup), _) => {
                self.func
                    .emit_at_end(mismatch, OpKind::Br { target: cleanup }, vec![], &[]);
            }
            (None, Some(unwind)) => {
                self.func
                    .emit_at_end(mismatch, OpKind::ThrowUnwind { unwind }, vec![exception], &[]);
            }
            (None, None) => {
                self.func
                    .emit_at_end(mismatch, OpKind::ThrowCall, vec![exception], &[]);
            }
        }

        self.func.emit_at_end(
            pad,
            OpKind::CondBr {
                then_dest: begin_block,
                else_dest: mismatch,
                then_args: 0,
            },
            vec![matched],
            &[],
        );
        (pad, vec![pad, begin_block, mismatch], payload)
    }

    /// Give every escaping op a route code and allocate the completion slot.
    fn route_through_finally(
        &mut self,
        op: OpId,
        finally_entry: BlockId,
        escapes: &[OpId],
    ) -> Result<ValueId> {
        let entry = self
            .func
            .entry_block()
            .ok_or_else(|| lowering_error(op, "function body has no entry block"))?;
        let slot_op = self.func.create_op(
            OpKind::Variable { in_heap: false },
            vec![],
            &[Ty::reference(Ty::I32)],
            0,
        );
        self.func.insert_op_at_start(entry, slot_op);
        let slot = self.func.op(slot_op).results[0];

        let mut cases: Vec<(i64, Destination)> = Vec::new();
        for escaping in escapes {
            let previous = self.ctx.jump(*escaping).unwrap_or(Destination::Return);
            let code = match cases.iter().find(|(_, dest)| *dest == previous) {
                Some((code, _)) => *code,
                None => {
                    let code = cases.len() as i64 + 1;
                    cases.push((code, previous));
                    code
                }
            };
            self.ctx
                .register_jump(*escaping, Destination::Finally { try_op: op, code });
        }
        debug!(op = %op, routes = cases.len(), "finally routes assigned");
        self.ctx.set_finally_route(
            op,
            FinallyRoute {
                slot,
                entry: finally_entry,
                cases,
            },
        );
        Ok(slot)
    }

    /// Record "fell through" in the completion slot, when there is one.
    fn complete_normally(&mut self, term: OpId, slot: Option<ValueId>) -> Result<()> {
        if let Some(slot) = slot {
            let zero = self.const_i32_before(term, 0)?;
            self.func
                .emit_before(term, OpKind::Store, vec![zero, slot], &[])?;
        }
        Ok(())
    }

    /// The normal finally copy continues after the try, or wherever the slot says.
    fn finish_finally(
        &mut self,
        op: OpId,
        term: OpId,
        slot: Option<ValueId>,
        cont: BlockId,
    ) -> Result<()> {
        let Some(slot) = slot else {
            self.make_branch(term, cont, vec![]);
            return Ok(());
        };
        let code = self
            .func
            .emit_before(term, OpKind::Load, vec![slot], &[Ty::I32])?;
        let code = self.func.op(code).results[0];
        let routes = self.ctx.finally_route(op)?.cases.clone();
        lower_ensure!(!routes.is_empty(), op, "completion slot without any route");
        let mut cases = Vec::with_capacity(routes.len());
        for (value, dest) in routes {
            cases.push((value, self.destination_block(op, dest, cont)?));
        }
        self.func.replace_kind(term, OpKind::SwitchInt { default: cont, cases });
        self.func.set_operands(term, vec![code]);
        Ok(())
    }
}
