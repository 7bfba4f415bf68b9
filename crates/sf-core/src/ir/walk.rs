use crate::ir::{BlockId, Function, OpId, RegionId};
use std::collections::HashMap;

/// Returned by walk callbacks to decide whether nested regions are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Descend,
    Skip,
}

impl Function {
    /// Pre-order walk over every op nested in `region`.
    pub fn walk_region(&self, region: RegionId, visit: &mut impl FnMut(OpId) -> WalkControl) {
        for block in &self.region(region).blocks {
            for op in &self.block(*block).ops {
                if visit(*op) == WalkControl::Descend {
                    for nested in &self.op(*op).regions {
                        self.walk_region(*nested, visit);
                    }
                }
            }
        }
    }

    /// Every op nested in `region`, pre-order.
    pub fn ops_in_region(&self, region: RegionId) -> Vec<OpId> {
        let mut ops = Vec::new();
        self.walk_region(region, &mut |op| {
            ops.push(op);
            WalkControl::Descend
        });
        ops
    }

    /// Ops sitting directly in the top-level blocks of `region`.
    pub fn shallow_ops(&self, region: RegionId) -> Vec<OpId> {
        self.region(region)
            .blocks
            .iter()
            .flat_map(|block| self.block(*block).ops.iter().copied())
            .collect()
    }

    /// Predecessor lists for the live blocks of the function body.
    pub fn predecessors(&self) -> HashMap<BlockId, Vec<BlockId>> {
        let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for block in self.body_blocks() {
            preds.entry(*block).or_default();
        }
        for block in self.body_blocks() {
            let Some(term) = self.terminator(*block) else {
                continue;
            };
            for succ in self.kind(term).successors() {
                let entry = preds.entry(succ).or_default();
                if !entry.contains(block) {
                    entry.push(*block);
                }
            }
        }
        preds
    }
}
