use crate::cleanup::{prune_unreachable_blocks, relocate_constants};
use crate::context::LoweringContext;
use crate::error::{contract_error, generic_error, lowering_error, report};
use crate::lower_bail;
use crate::options::LoweringOptions;
use sf_core::ir::{verify_lowered, BlockId, Function, Module, OpId, OpKind, ValueId};
use sf_core::rtti::TypeInfoResolver;
use sf_core::ty::{ConstValue, Ty};
use sf_core::{debug, info, Result};

/// Counters describing what one function's lowering did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoweringStats {
    pub function: String,
    pub constructs: usize,
    pub invokes: usize,
    pub landing_pads: usize,
    pub cleanup_clones: usize,
    pub state_labels: usize,
    pub pruned_blocks: usize,
    pub relocated_constants: usize,
}

/// Rewriting state for one function. The construct rewriters live in sibling modules as
/// further `impl` blocks.
pub(crate) struct Lowerer<'a> {
    pub(crate) func: &'a mut Function,
    pub(crate) ctx: LoweringContext,
    pub(crate) options: &'a LoweringOptions,
    pub(crate) rtti: &'a dyn TypeInfoResolver,
    pub(crate) stats: LoweringStats,
}

impl<'a> Lowerer<'a> {
    fn new(
        func: &'a mut Function,
        rtti: &'a dyn TypeInfoResolver,
        options: &'a LoweringOptions,
    ) -> Self {
        let stats = LoweringStats {
            function: func.name.clone(),
            ..Default::default()
        };
        Self {
            func,
            ctx: LoweringContext::new(),
            options,
            rtti,
            stats,
        }
    }

    fn run(&mut self) -> Result<()> {
        let mut cursor = 0;
        while let Some((index, op)) = self.next_structured(cursor) {
            cursor = index;
            self.lower_op(op)?;
        }
        self.finish_dispatch()
    }

    /// The first structured op at the top level, starting from block `from`. Resume-state
    /// dispatch is deferred until every state label has been seen.
    fn next_structured(&mut self, from: usize) -> Option<(usize, OpId)> {
        let mut deferred = Vec::new();
        let mut found = None;
        'blocks: for (index, block) in self.func.body_blocks().iter().enumerate().skip(from) {
            for op in &self.func.block(*block).ops {
                match self.func.kind(*op) {
                    OpKind::SwitchState { .. } => deferred.push(*op),
                    kind if kind.is_structured() => {
                        found = Some((index, *op));
                        break 'blocks;
                    }
                    _ => {}
                }
            }
        }
        for op in deferred {
            self.ctx.defer_dispatch(op);
        }
        found
    }

    fn lower_op(&mut self, op: OpId) -> Result<()> {
        let kind = self.func.kind(op).clone();
        debug!(op = %op, kind = %kind.mnemonic(), "lowering");
        self.stats.constructs += 1;
        match kind {
            OpKind::Entry => self.lower_entry(op),
            OpKind::Exit => self.lower_exit(op),
            OpKind::Return => self.lower_return(op),
            OpKind::ReturnVal => self.lower_return_val(op),
            OpKind::YieldReturnVal => self.lower_yield_return_val(op),
            OpKind::If => self.lower_if(op),
            OpKind::While { .. } => self.lower_while(op),
            OpKind::DoWhile { .. } => self.lower_do_while(op),
            OpKind::For { .. } => self.lower_for(op),
            OpKind::Switch { .. } | OpKind::Label { .. } => self.lower_merge_construct(op),
            OpKind::Break { .. } | OpKind::Continue { .. } => self.lower_jump(op),
            OpKind::Try => self.lower_try(op),
            OpKind::Catch { .. } => self.lower_catch(op),
            OpKind::Throw => self.lower_throw(op),
            OpKind::Call { .. } | OpKind::CallIndirect => self.lower_call(op),
            OpKind::StateLabel => self.lower_state_label(op),
            OpKind::Capture => self.lower_capture(op),
            OpKind::SwitchState { .. } => lower_bail!(op, "dispatch reached eagerly"),
            OpKind::Yield | OpKind::Condition | OpKind::NoCondition | OpKind::Merge => Err(
                contract_error(op, format!("`{}` outside of its construct", kind.mnemonic())),
            ),
            _ => Ok(()),
        }
    }

    /// Split after `op` so nothing follows it in its block. The returned block is
    /// unreachable unless something else branches to it.
    pub(crate) fn cut_after(&mut self, op: OpId) -> Result<BlockId> {
        self.func.split_after(op)
    }

    /// Like [`Self::cut_after`], but only when something actually follows `op`.
    pub(crate) fn cut_rest(&mut self, op: OpId) -> Result<()> {
        let block = self.parent_block(op)?;
        if self.func.block(block).ops.last() != Some(&op) {
            self.func.split_after(op)?;
        }
        Ok(())
    }

    /// Turn `op` into an unconditional branch.
    pub(crate) fn make_branch(&mut self, op: OpId, target: BlockId, args: Vec<ValueId>) {
        self.func.replace_kind(op, OpKind::Br { target });
        self.func.set_operands(op, args);
    }

    pub(crate) fn parent_block(&self, op: OpId) -> Result<BlockId> {
        self.func
            .op(op)
            .parent
            .ok_or_else(|| lowering_error(op, "operation is detached"))
    }

    /// `value` as a `bool`, inserting a cast before `anchor` when needed.
    pub(crate) fn truthify(&mut self, anchor: OpId, value: ValueId) -> Result<ValueId> {
        if *self.func.value_ty(value) == Ty::Bool {
            return Ok(value);
        }
        let cast = self
            .func
            .emit_before(anchor, OpKind::Cast, vec![value], &[Ty::Bool])?;
        Ok(self.func.op(cast).results[0])
    }

    /// Create an op right after `anchor`, inheriting its span.
    pub(crate) fn emit_after(
        &mut self,
        anchor: OpId,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_tys: &[Ty],
    ) -> Result<OpId> {
        let op = self.func.create_op(kind, operands, result_tys, 0);
        let span = self.func.op(anchor).span;
        self.func.set_span(op, span);
        self.func.insert_op_after(anchor, op)?;
        Ok(op)
    }

    /// An `i32` constant placed before `anchor`.
    pub(crate) fn const_i32_before(&mut self, anchor: OpId, value: i64) -> Result<ValueId> {
        let op = self.func.emit_before(
            anchor,
            OpKind::Constant(ConstValue::Int(value)),
            vec![],
            &[Ty::I32],
        )?;
        Ok(self.func.op(op).results[0])
    }
}

/// Lower every structured op in `func` and run the cleanup pass and verifier as configured.
pub fn lower_function(
    func: &mut Function,
    rtti: &dyn TypeInfoResolver,
    options: &LoweringOptions,
) -> Result<LoweringStats> {
    let span = tracing::debug_span!("lower_function", name = %func.name);
    let _guard = span.enter();

    let mut stats = {
        let mut lowerer = Lowerer::new(func, rtti, options);
        lowerer.run().map_err(report)?;
        lowerer.stats
    };

    if options.run_cleanup {
        stats.pruned_blocks = prune_unreachable_blocks(func).map_err(report)?;
        if options.relocate_constants {
            stats.relocated_constants = relocate_constants(func).map_err(report)?;
        }
    }
    if options.verify {
        verify_lowered(func).map_err(report)?;
    }

    info!(
        function = %func.name,
        constructs = stats.constructs,
        invokes = stats.invokes,
        blocks = func.body_blocks().len(),
        "lowered"
    );
    Ok(stats)
}

/// Lower the functions of `module` one after another. Stops at the first failure.
pub fn lower_module(module: &mut Module, options: &LoweringOptions) -> Result<Vec<LoweringStats>> {
    let Module { functions, rtti, .. } = module;
    functions
        .iter_mut()
        .map(|func| lower_function(func, &*rtti, options))
        .collect()
}

/// Lower the functions of `module` on scoped worker threads. Each function gets its own
/// context; only the RTTI table and options are shared, read-only.
pub fn lower_module_parallel(
    module: &mut Module,
    options: &LoweringOptions,
) -> Result<Vec<LoweringStats>> {
    let Module { functions, rtti, .. } = module;
    if functions.is_empty() {
        return Ok(Vec::new());
    }
    let rtti: &dyn TypeInfoResolver = &*rtti;
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let chunk = functions.len().div_ceil(workers).max(1);
    debug!(functions = functions.len(), workers, "lowering module in parallel");

    let per_chunk: Vec<Vec<Result<LoweringStats>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = functions
            .chunks_mut(chunk)
            .map(|funcs| {
                scope.spawn(move || {
                    funcs
                        .iter_mut()
                        .map(|func| lower_function(func, rtti, options))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    vec![Err(generic_error(eyre::eyre!("lowering worker panicked")))]
                })
            })
            .collect()
    });
    per_chunk.into_iter().flatten().collect()
}
