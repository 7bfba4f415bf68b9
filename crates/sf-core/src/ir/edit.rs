//! In-place editing of a [`Function`]: node creation, insertion, block splitting, region
//! ownership transfer and deep cloning.

use crate::error::Error;
use crate::ir::{
    BlockData, BlockId, Function, OpData, OpId, OpKind, RegionData, RegionId, ValueData, ValueDef,
    ValueId,
};
use crate::span::Span;
use crate::ty::Ty;
use crate::Result;
use std::collections::HashMap;

/// Old-to-new mapping produced by [`Function::deep_clone_region`].
#[derive(Debug, Clone, Default)]
pub struct CloneMap {
    pub ops: HashMap<OpId, OpId>,
    pub blocks: HashMap<BlockId, BlockId>,
    pub values: HashMap<ValueId, ValueId>,
}

impl CloneMap {
    pub fn value(&self, value: ValueId) -> ValueId {
        self.values.get(&value).copied().unwrap_or(value)
    }

    pub fn block(&self, block: BlockId) -> BlockId {
        self.blocks.get(&block).copied().unwrap_or(block)
    }
}

impl Function {
    fn new_value(&mut self, ty: Ty, def: ValueDef) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData { ty, def });
        id
    }

    pub fn new_region(&mut self, parent: Option<OpId>) -> RegionId {
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(RegionData {
            blocks: Vec::new(),
            parent,
        });
        id
    }

    /// A detached block with one argument per type.
    pub fn new_block(&mut self, arg_tys: &[Ty]) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockData {
            ops: Vec::new(),
            args: Vec::new(),
            parent: None,
            live: true,
        });
        for ty in arg_tys {
            self.add_block_arg(id, ty.clone());
        }
        id
    }

    pub fn add_block_arg(&mut self, block: BlockId, ty: Ty) -> ValueId {
        let index = self.block(block).args.len() as u32;
        let value = self.new_value(ty, ValueDef::BlockArg { block, index });
        self.block_mut(block).args.push(value);
        value
    }

    /// A detached op with fresh results and `num_regions` empty regions.
    pub fn create_op(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_tys: &[Ty],
        num_regions: usize,
    ) -> OpId {
        let id = OpId(self.ops.len() as u32);
        self.ops.push(OpData {
            kind,
            operands,
            results: Vec::new(),
            regions: Vec::new(),
            parent: None,
            span: None,
            live: true,
        });
        for (index, ty) in result_tys.iter().enumerate() {
            let value = self.new_value(
                ty.clone(),
                ValueDef::OpResult {
                    op: id,
                    index: index as u32,
                },
            );
            self.op_mut(id).results.push(value);
        }
        for _ in 0..num_regions {
            let region = self.new_region(Some(id));
            self.op_mut(id).regions.push(region);
        }
        id
    }

    pub fn set_span(&mut self, op: OpId, span: Option<Span>) {
        self.op_mut(op).span = span;
    }

    pub fn append_block(&mut self, region: RegionId, block: BlockId) {
        self.block_mut(block).parent = Some(region);
        self.region_mut(region).blocks.push(block);
    }

    fn position_in_region(&self, block: BlockId) -> Result<(RegionId, usize)> {
        let region = self
            .block(block)
            .parent
            .ok_or_else(|| Error::internal(format!("{} is not attached to a region", block)))?;
        let pos = self
            .region(region)
            .blocks
            .iter()
            .position(|b| *b == block)
            .ok_or_else(|| Error::internal(format!("{} missing from {}", block, region)))?;
        Ok((region, pos))
    }

    fn position_in_block(&self, op: OpId) -> Result<(BlockId, usize)> {
        let block = self
            .op(op)
            .parent
            .ok_or_else(|| Error::internal_at(op, "operation is not attached to a block"))?;
        let pos = self
            .block(block)
            .ops
            .iter()
            .position(|o| *o == op)
            .ok_or_else(|| Error::internal_at(op, format!("operation missing from {}", block)))?;
        Ok((block, pos))
    }

    pub fn insert_block_after(&mut self, anchor: BlockId, block: BlockId) -> Result<()> {
        let (region, pos) = self.position_in_region(anchor)?;
        self.block_mut(block).parent = Some(region);
        self.region_mut(region).blocks.insert(pos + 1, block);
        Ok(())
    }

    /// Move detached `blocks` into the anchor's region, right before `anchor`.
    ///
    /// Every block must have been taken out of its previous region first; a block can only
    /// ever be owned by one region.
    pub fn splice_before(&mut self, anchor: BlockId, blocks: Vec<BlockId>) -> Result<()> {
        let (region, pos) = self.position_in_region(anchor)?;
        for block in &blocks {
            if let Some(owner) = self.block(*block).parent {
                return Err(Error::internal(format!(
                    "{} is still owned by {} and cannot be spliced",
                    block, owner
                )));
            }
            self.block_mut(*block).parent = Some(region);
        }
        self.region_mut(region).blocks.splice(pos..pos, blocks);
        Ok(())
    }

    /// Detach every block of `region`, leaving it empty.
    pub fn take_region(&mut self, region: RegionId) -> Vec<BlockId> {
        let blocks = std::mem::take(&mut self.region_mut(region).blocks);
        for block in &blocks {
            self.block_mut(*block).parent = None;
        }
        blocks
    }

    pub fn append_op(&mut self, block: BlockId, op: OpId) {
        self.op_mut(op).parent = Some(block);
        self.block_mut(block).ops.push(op);
    }

    pub fn insert_op_before(&mut self, anchor: OpId, op: OpId) -> Result<()> {
        let (block, pos) = self.position_in_block(anchor)?;
        self.op_mut(op).parent = Some(block);
        self.block_mut(block).ops.insert(pos, op);
        Ok(())
    }

    pub fn insert_op_after(&mut self, anchor: OpId, op: OpId) -> Result<()> {
        let (block, pos) = self.position_in_block(anchor)?;
        self.op_mut(op).parent = Some(block);
        self.block_mut(block).ops.insert(pos + 1, op);
        Ok(())
    }

    pub fn insert_op_at_start(&mut self, block: BlockId, op: OpId) {
        self.op_mut(op).parent = Some(block);
        self.block_mut(block).ops.insert(0, op);
    }

    /// Create an op and place it before `anchor`. Returns the new op.
    pub fn emit_before(
        &mut self,
        anchor: OpId,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_tys: &[Ty],
    ) -> Result<OpId> {
        let op = self.create_op(kind, operands, result_tys, 0);
        self.op_mut(op).span = self.op(anchor).span;
        self.insert_op_before(anchor, op)?;
        Ok(op)
    }

    /// Create an op and append it to `block`. Returns the new op.
    pub fn emit_at_end(
        &mut self,
        block: BlockId,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_tys: &[Ty],
    ) -> OpId {
        let op = self.create_op(kind, operands, result_tys, 0);
        self.append_op(block, op);
        op
    }

    pub fn detach_op(&mut self, op: OpId) -> Result<()> {
        let (block, pos) = self.position_in_block(op)?;
        self.block_mut(block).ops.remove(pos);
        self.op_mut(op).parent = None;
        Ok(())
    }

    /// Move every op after `op` into a fresh block laid out right after `op`'s block.
    pub fn split_after(&mut self, op: OpId) -> Result<BlockId> {
        let (block, pos) = self.position_in_block(op)?;
        let tail = self.block_mut(block).ops.split_off(pos + 1);
        let new_block = self.new_block(&[]);
        for moved in &tail {
            self.op_mut(*moved).parent = Some(new_block);
        }
        self.block_mut(new_block).ops = tail;
        self.insert_block_after(block, new_block)?;
        Ok(new_block)
    }

    /// Detach and kill `op` together with everything nested in its regions.
    pub fn erase_op(&mut self, op: OpId) -> Result<()> {
        if self.op(op).parent.is_some() {
            self.detach_op(op)?;
        }
        self.kill_op(op);
        Ok(())
    }

    fn kill_op(&mut self, op: OpId) {
        self.op_mut(op).live = false;
        let regions = self.op(op).regions.clone();
        for region in regions {
            for block in self.take_region(region) {
                self.kill_block(block);
            }
        }
    }

    fn kill_block(&mut self, block: BlockId) {
        self.block_mut(block).live = false;
        let ops = std::mem::take(&mut self.block_mut(block).ops);
        for op in ops {
            self.op_mut(op).parent = None;
            self.kill_op(op);
        }
    }

    /// Remove `block` from its region and kill its contents.
    pub fn erase_block(&mut self, block: BlockId) -> Result<()> {
        if self.block(block).parent.is_some() {
            let (region, pos) = self.position_in_region(block)?;
            self.region_mut(region).blocks.remove(pos);
            self.block_mut(block).parent = None;
        }
        self.kill_block(block);
        Ok(())
    }

    /// Kill detached blocks, e.g. a region that was taken but is not needed.
    pub fn discard_blocks(&mut self, blocks: Vec<BlockId>) {
        for block in blocks {
            self.kill_block(block);
        }
    }

    /// Swap the kind of `op` in place; operands, results and position are kept.
    pub fn replace_kind(&mut self, op: OpId, kind: OpKind) {
        self.op_mut(op).kind = kind;
    }

    pub fn set_operands(&mut self, op: OpId, operands: Vec<ValueId>) {
        self.op_mut(op).operands = operands;
    }

    pub fn replace_all_uses(&mut self, from: ValueId, to: ValueId) {
        for data in self.ops.iter_mut().filter(|data| data.live) {
            for operand in data.operands.iter_mut() {
                if *operand == from {
                    *operand = to;
                }
            }
        }
    }

    /// The terminator of `block`, if its last op is one.
    pub fn terminator(&self, block: BlockId) -> Option<OpId> {
        let last = *self.block(block).ops.last()?;
        self.kind(last).is_terminator().then_some(last)
    }

    /// Copy `region` and everything nested in it. The copies are detached and returned in
    /// layout order; ops referenced from outside the region keep their original operands.
    pub fn deep_clone_region(&mut self, region: RegionId) -> (Vec<BlockId>, CloneMap) {
        let mut map = CloneMap::default();
        let blocks = self.region(region).blocks.clone();
        let mut cloned = Vec::with_capacity(blocks.len());
        // first pass creates every node so forward references resolve in the second
        for block in &blocks {
            cloned.push(self.clone_block_shallow(*block, &mut map));
        }
        let ops: Vec<(OpId, OpId)> = map.ops.iter().map(|(k, v)| (*k, *v)).collect();
        for (_, new_op) in ops {
            let data = self.op_mut(new_op);
            for operand in data.operands.iter_mut() {
                if let Some(mapped) = map.values.get(operand) {
                    *operand = *mapped;
                }
            }
            for succ in data.kind.successors_mut() {
                if let Some(mapped) = map.blocks.get(succ) {
                    *succ = *mapped;
                }
            }
        }
        (cloned, map)
    }

    fn clone_block_shallow(&mut self, block: BlockId, map: &mut CloneMap) -> BlockId {
        let arg_tys: Vec<Ty> = self
            .block(block)
            .args
            .iter()
            .map(|arg| self.value_ty(*arg).clone())
            .collect();
        let new_block = self.new_block(&arg_tys);
        map.blocks.insert(block, new_block);
        let old_args = self.block(block).args.clone();
        let new_args = self.block(new_block).args.clone();
        map.values.extend(old_args.into_iter().zip(new_args));

        let ops = self.block(block).ops.clone();
        for op in ops {
            let new_op = self.clone_op_shallow(op, map);
            self.append_op(new_block, new_op);
        }
        new_block
    }

    fn clone_op_shallow(&mut self, op: OpId, map: &mut CloneMap) -> OpId {
        let data = self.op(op).clone();
        let result_tys: Vec<Ty> = data
            .results
            .iter()
            .map(|value| self.value_ty(*value).clone())
            .collect();
        let new_op = self.create_op(data.kind, data.operands, &result_tys, data.regions.len());
        self.op_mut(new_op).span = data.span;
        map.ops.insert(op, new_op);
        let new_results = self.op(new_op).results.clone();
        map.values.extend(data.results.into_iter().zip(new_results));

        let new_regions = self.op(new_op).regions.clone();
        for (old_region, new_region) in data.regions.into_iter().zip(new_regions) {
            let blocks = self.region(old_region).blocks.clone();
            for block in blocks {
                let new_block = self.clone_block_shallow(block, map);
                self.append_block(new_region, new_block);
            }
        }
        new_op
    }
}
