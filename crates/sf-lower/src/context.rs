//! Per-function side tables shared by the rewriters.
//!
//! Entries are registered by an enclosing construct before the ops they describe reach the
//! top level, and looked up when those ops are rewritten. A missing entry is a lowering bug.

use crate::error::{contract_error, lowering_error};
use sf_core::ir::{BlockId, CloneMap, OpId, ValueId};
use sf_core::{trace, Result};
use std::collections::HashMap;

/// Where a non-local jump ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Block(BlockId),
    /// Run the finally of `try_op` first; `code` selects where its exit continues.
    Finally { try_op: OpId, code: i64 },
    /// The function return block.
    Return,
}

/// Which region of the enclosing try an inner try sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPlacement {
    Body,
    Catches,
    Finally,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TryPads {
    /// Where exceptions raised in the try body go.
    pub landing: Option<BlockId>,
    /// Entry of the cleanup clone of the finally region.
    pub cleanup: Option<BlockId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinallyRoute {
    /// `ref<i32>` recording why the finally was entered; 0 means fall through.
    pub slot: ValueId,
    pub entry: BlockId,
    pub cases: Vec<(i64, Destination)>,
}

#[derive(Debug, Default)]
pub struct LoweringContext {
    jumps: HashMap<OpId, Destination>,
    unwind: HashMap<OpId, BlockId>,
    catch_depth: HashMap<OpId, usize>,
    nesting: HashMap<OpId, (OpId, TryPlacement)>,
    pads: HashMap<OpId, TryPads>,
    catch_bindings: HashMap<OpId, ValueId>,
    finally_routes: HashMap<OpId, FinallyRoute>,
    return_block: Option<BlockId>,
    state_labels: Vec<BlockId>,
    pending_dispatch: Vec<OpId>,
}

impl LoweringContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_jump(&mut self, op: OpId, dest: Destination) {
        trace!(op = %op, ?dest, "jump registered");
        self.jumps.insert(op, dest);
    }

    pub fn jump(&self, op: OpId) -> Option<Destination> {
        self.jumps.get(&op).copied()
    }

    pub fn resolve_jump(&self, op: OpId) -> Result<Destination> {
        self.jump(op)
            .ok_or_else(|| lowering_error(op, "no jump target registered"))
    }

    pub fn register_unwind(&mut self, op: OpId, landing: BlockId) {
        trace!(op = %op, landing = %landing, "unwind registered");
        self.unwind.insert(op, landing);
    }

    pub fn unwind_target(&self, op: OpId) -> Option<BlockId> {
        self.unwind.get(&op).copied()
    }

    /// Note that `op` leaves one more active catch.
    pub fn enter_catch(&mut self, op: OpId) {
        *self.catch_depth.entry(op).or_default() += 1;
    }

    pub fn catch_depth(&self, op: OpId) -> usize {
        self.catch_depth.get(&op).copied().unwrap_or(0)
    }

    pub fn set_parent_try(&mut self, child: OpId, parent: OpId, placement: TryPlacement) {
        self.nesting.insert(child, (parent, placement));
    }

    pub fn parent_try(&self, child: OpId) -> Option<(OpId, TryPlacement)> {
        self.nesting.get(&child).copied()
    }

    pub fn set_pads(&mut self, try_op: OpId, pads: TryPads) {
        self.pads.insert(try_op, pads);
    }

    pub fn pads(&self, try_op: OpId) -> TryPads {
        self.pads.get(&try_op).copied().unwrap_or_default()
    }

    /// The pad an exception escaping `try_op` unwinds to, or `None` when it leaves the function.
    ///
    /// Tries nested in a parent body go to the parent landing pad, tries in a parent catch go
    /// to the parent cleanup clone, and tries in a parent finally skip the parent entirely.
    pub fn parent_landing(&self, try_op: OpId) -> Option<BlockId> {
        let mut current = try_op;
        while let Some((parent, placement)) = self.parent_try(current) {
            let pads = self.pads(parent);
            let found = match placement {
                TryPlacement::Body => pads.landing,
                TryPlacement::Catches => pads.cleanup,
                TryPlacement::Finally => None,
            };
            if found.is_some() {
                return found;
            }
            current = parent;
        }
        None
    }

    pub fn bind_catch(&mut self, catch_op: OpId, payload: ValueId) {
        self.catch_bindings.insert(catch_op, payload);
    }

    pub fn catch_binding(&self, catch_op: OpId) -> Result<ValueId> {
        self.catch_bindings
            .get(&catch_op)
            .copied()
            .ok_or_else(|| lowering_error(catch_op, "catch clause has no landing pad payload"))
    }

    pub fn set_finally_route(&mut self, try_op: OpId, route: FinallyRoute) {
        self.finally_routes.insert(try_op, route);
    }

    pub fn finally_route(&self, try_op: OpId) -> Result<&FinallyRoute> {
        self.finally_routes
            .get(&try_op)
            .ok_or_else(|| lowering_error(try_op, "finally has no completion slot"))
    }

    pub fn set_return_block(&mut self, block: BlockId) {
        self.return_block = Some(block);
    }

    pub fn return_block(&self, user: OpId) -> Result<BlockId> {
        self.return_block
            .ok_or_else(|| contract_error(user, "function has no entry op to create the return block"))
    }

    pub fn push_state_label(&mut self, block: BlockId) {
        self.state_labels.push(block);
    }

    pub fn state_labels(&self) -> &[BlockId] {
        &self.state_labels
    }

    pub fn defer_dispatch(&mut self, op: OpId) {
        if !self.pending_dispatch.contains(&op) {
            self.pending_dispatch.push(op);
        }
    }

    pub fn take_pending_dispatch(&mut self) -> Vec<OpId> {
        std::mem::take(&mut self.pending_dispatch)
    }

    /// Give every cloned op the table entries of its original.
    pub fn copy_for_clone(&mut self, map: &CloneMap) {
        for (old, new) in &map.ops {
            if let Some(dest) = self.jumps.get(old).copied() {
                self.jumps.insert(*new, dest);
            }
            if let Some(landing) = self.unwind.get(old).copied() {
                self.unwind.insert(*new, landing);
            }
            if let Some(depth) = self.catch_depth.get(old).copied() {
                self.catch_depth.insert(*new, depth);
            }
            if let Some(parent) = self.nesting.get(old).copied() {
                self.nesting.insert(*new, parent);
            }
            if let Some(payload) = self.catch_bindings.get(old).copied() {
                self.catch_bindings.insert(*new, payload);
            }
        }
    }
}
