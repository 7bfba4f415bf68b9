//! Post-lowering tidying of the flat body.

use sf_core::ir::{Function, OpId, OpKind, ValueId};
use sf_core::ty::{ConstKey, Ty};
use sf_core::{debug, Result};
use std::collections::HashMap;

/// Remove non-entry blocks nobody branches to whose whole body is empty, a lone `Br` or a
/// lone `Unreachable`. Repeats until nothing changes and returns how many were removed.
pub fn prune_unreachable_blocks(func: &mut Function) -> Result<usize> {
    let mut removed = 0;
    loop {
        let preds = func.predecessors();
        let entry = func.entry_block();
        let dead: Vec<_> = func
            .body_blocks()
            .iter()
            .copied()
            .filter(|block| Some(*block) != entry)
            .filter(|block| preds.get(block).map_or(true, |p| p.is_empty()))
            .filter(|block| match func.block(*block).ops.as_slice() {
                [] => true,
                [only] => matches!(func.kind(*only), OpKind::Br { .. } | OpKind::Unreachable),
                _ => false,
            })
            .collect();
        if dead.is_empty() {
            break;
        }
        removed += dead.len();
        for block in dead {
            func.erase_block(block)?;
        }
    }
    if removed > 0 {
        debug!(function = %func.name, removed, "pruned unreachable blocks");
    }
    Ok(removed)
}

/// Move every constant of the body into the leading constant run of the entry block, one op per
/// distinct `(type, value)`. Returns how many constants were moved or merged.
pub fn relocate_constants(func: &mut Function) -> Result<usize> {
    let Some(entry) = func.entry_block() else {
        return Ok(0);
    };
    let leading: Vec<OpId> = func
        .block(entry)
        .ops
        .iter()
        .copied()
        .take_while(|op| matches!(func.kind(*op), OpKind::Constant(_)))
        .collect();

    let mut seen: HashMap<(Ty, ConstKey), ValueId> = HashMap::new();
    let mut changed = 0;
    for op in &leading {
        if merge_into(func, &mut seen, *op)? {
            changed += 1;
        }
    }

    let Some(&anchor) = func.block(entry).ops.get(seen.len()) else {
        return Ok(changed);
    };
    let rest: Vec<OpId> = func
        .body_blocks()
        .iter()
        .flat_map(|block| func.block(*block).ops.iter().copied())
        .filter(|op| !leading.contains(op))
        .filter(|op| matches!(func.kind(*op), OpKind::Constant(_)))
        .collect();
    for op in rest {
        if !merge_into(func, &mut seen, op)? {
            func.detach_op(op)?;
            func.insert_op_before(anchor, op)?;
        }
        changed += 1;
    }
    if changed > 0 {
        debug!(function = %func.name, changed, "relocated constants");
    }
    Ok(changed)
}

/// Erase `op` in favour of an equal constant seen before, or remember it. Returns whether it
/// was merged.
fn merge_into(
    func: &mut Function,
    seen: &mut HashMap<(Ty, ConstKey), ValueId>,
    op: OpId,
) -> Result<bool> {
    let OpKind::Constant(value) = func.kind(op) else {
        return Ok(false);
    };
    let result = func.op(op).results[0];
    let key = (func.value_ty(result).clone(), value.key());
    match seen.get(&key) {
        Some(&existing) => {
            func.replace_all_uses(result, existing);
            func.erase_op(op)?;
            Ok(true)
        }
        None => {
            seen.insert(key, result);
            Ok(false)
        }
    }
}
