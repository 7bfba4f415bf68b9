use crate::ir::{BlockId, Function, Module, OpId, RegionId, ValueId};
use crate::pretty::{PrettyCtx, PrettyPrintable};
use itertools::Itertools;
use std::fmt::{self, Formatter};

impl Function {
    fn fmt_value(&self, value: ValueId, ctx: &PrettyCtx<'_>) -> String {
        if ctx.options.show_types {
            format!("{}: {}", value, self.value_ty(value))
        } else {
            value.to_string()
        }
    }

    fn fmt_block(
        &self,
        block: BlockId,
        f: &mut Formatter<'_>,
        ctx: &mut PrettyCtx<'_>,
    ) -> fmt::Result {
        let data = self.block(block);
        if data.args.is_empty() {
            ctx.writeln(f, format!("{}:", block))?;
        } else {
            let args = data.args.iter().map(|arg| self.fmt_value(*arg, ctx)).join(", ");
            ctx.writeln(f, format!("{}({}):", block, args))?;
        }
        ctx.with_indent(|ctx| {
            for op in &data.ops {
                self.fmt_op(*op, f, ctx)?;
            }
            Ok(())
        })
    }

    fn fmt_op(&self, op: OpId, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        let data = self.op(op);
        let mut line = String::new();
        if !data.results.is_empty() {
            line.push_str(&data.results.iter().map(|r| self.fmt_value(*r, ctx)).join(", "));
            line.push_str(" = ");
        }
        line.push_str(&data.kind.to_string());
        if !data.operands.is_empty() {
            line.push_str(&format!("({})", data.operands.iter().join(", ")));
        }
        if ctx.options.show_spans {
            if let Some(span) = &data.span {
                line.push_str(&format!(" @ {}", span));
            }
        }
        if data.regions.is_empty() {
            return ctx.writeln(f, line);
        }
        ctx.writeln(f, format!("{} {{", line))?;
        for (index, region) in data.regions.iter().enumerate() {
            if index > 0 {
                ctx.writeln(f, "} {")?;
            }
            ctx.with_indent(|ctx| self.fmt_region(*region, f, ctx))?;
        }
        ctx.writeln(f, "}")
    }

    fn fmt_region(
        &self,
        region: RegionId,
        f: &mut Formatter<'_>,
        ctx: &mut PrettyCtx<'_>,
    ) -> fmt::Result {
        for block in &self.region(region).blocks {
            self.fmt_block(*block, f, ctx)?;
        }
        Ok(())
    }
}

impl PrettyPrintable for Function {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        ctx.writeln(
            f,
            format!(
                "fn {}({}) -> {} {{",
                self.name,
                self.sig.params.iter().join(", "),
                self.sig.ret
            ),
        )?;
        ctx.with_indent(|ctx| self.fmt_region(self.body, f, ctx))?;
        ctx.writeln(f, "}")
    }
}

impl PrettyPrintable for Module {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        ctx.writeln(f, format!("module {}", self.name))?;
        for func in &self.functions {
            func.fmt_pretty(f, ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{FunctionBuilder, FunctionSig};
    use crate::pretty::{pretty, PrettyOptions};
    use crate::ty::Ty;

    #[test]
    fn prints_nested_regions() {
        let mut b = FunctionBuilder::new("show", FunctionSig::new(vec![Ty::Bool], Ty::Void));
        let flag = b.param(0);
        b.if_then(flag, |b| {
            b.call("log", vec![], &[]);
        });
        b.exit();
        let func = b.finish();
        let text = pretty(&func, PrettyOptions::default()).to_string();
        assert!(text.starts_with("fn show(bool) -> void {"), "{text}");
        assert!(text.contains("if(%0) {"), "{text}");
        assert!(text.contains("call @log"), "{text}");
        assert!(text.trim_end().ends_with('}'));
    }
}
