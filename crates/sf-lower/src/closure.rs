use crate::contract_bail;
use crate::options::CaptureStorage;
use crate::pass::Lowerer;
use sf_core::ir::{OpId, OpKind};
use sf_core::ty::Ty;
use sf_core::{trace, Result};

impl Lowerer<'_> {
    /// `Capture(values..)` allocates the environment tuple and stores each value into its
    /// field. A `ref<T>` captured into a `T` field is loaded first.
    pub(crate) fn lower_capture(&mut self, op: OpId) -> Result<()> {
        let Some(env) = self.func.result(op) else {
            contract_bail!(op, "capture without an environment result");
        };
        let fields = match self.func.value_ty(env).pointee() {
            Some(Ty::Tuple(fields)) => fields.clone(),
            _ => contract_bail!(op, "capture result must be a reference to a tuple"),
        };
        let values = self.func.op(op).operands.clone();
        if values.len() != fields.len() {
            contract_bail!(
                op,
                "{} captured values for {} environment fields",
                values.len(),
                fields.len()
            );
        }

        let in_heap = self.options.capture_storage == CaptureStorage::Heap;
        self.func.replace_kind(op, OpKind::Variable { in_heap });
        self.func.set_operands(op, vec![]);

        let mut anchor = op;
        for (index, (value, field)) in values.into_iter().zip(fields).enumerate() {
            let stored = if self.func.value_ty(value).pointee() == Some(&field) {
                anchor = self.emit_after(anchor, OpKind::Load, vec![value], &[field.clone()])?;
                self.func.op(anchor).results[0]
            } else {
                value
            };
            let index = index as u32;
            anchor = self.emit_after(
                anchor,
                OpKind::PropertyRef { index },
                vec![env],
                &[Ty::reference(field)],
            )?;
            let field_ref = self.func.op(anchor).results[0];
            anchor = self.emit_after(anchor, OpKind::Store, vec![stored, field_ref], &[])?;
        }
        trace!(op = %op, in_heap, "capture lowered");
        Ok(())
    }
}
