use crate::ir::BlockId;
use crate::rtti::TypeToken;
use crate::ty::{BinOp, ConstValue, Ty};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    Symbol(String),
    /// Callee is the first operand.
    Indirect,
}

/// Every operation the IR can hold. The first group is the structured input vocabulary and
/// must be gone after lowering; the second group is what code emission consumes.
///
/// Region layouts: `If` = [then, else], `While` = [cond, body], `DoWhile` = [body, cond],
/// `For` = [cond, body, incr], `Switch`/`Label` = [body], `Try` = [body, catches, finally].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpKind {
    // structured
    Entry,
    Exit,
    Return,
    /// Operands: [value, slot].
    ReturnVal,
    /// Operands: [value, slot]. Suspends a resumable function.
    YieldReturnVal,
    If,
    While { label: Option<String> },
    DoWhile { label: Option<String> },
    For { label: Option<String> },
    Switch { label: Option<String> },
    Label { label: String },
    Break { label: Option<String> },
    Continue { label: Option<String> },
    Yield,
    /// Operands: [cond, args..].
    Condition,
    NoCondition,
    Merge,
    Try,
    /// Operand: the variable receiving the exception payload.
    Catch { catch_type: Option<Ty> },
    Throw,
    Call { callee: String },
    CallIndirect,
    StateLabel,
    /// Operand: the resume state.
    SwitchState { default_dest: BlockId },
    Capture,

    // primitive
    Constant(ConstValue),
    Variable { in_heap: bool },
    Load,
    /// Operands: [value, ptr].
    Store,
    PropertyRef { index: u32 },
    Cast,
    Binary(BinOp),
    Null,
    Undef,
    CallInternal { callee: String },
    CallIndirectInternal,
    LandingPad { cleanup: bool, catch_type: Option<TypeToken> },
    CompareCatchType { token: TypeToken },
    BeginCatch,
    EndCatch,
    /// Operands: [payload, var].
    SaveCatchVar,
    BeginCleanup,

    // primitive terminators
    Br { target: BlockId },
    /// Operands: [cond, then args.., else args..].
    CondBr { then_dest: BlockId, else_dest: BlockId, then_args: u32 },
    SwitchInt { default: BlockId, cases: Vec<(i64, BlockId)> },
    Invoke { callee: Callee, normal: BlockId, unwind: BlockId },
    ThrowUnwind { unwind: BlockId },
    ThrowCall,
    EndCleanup { unwind: Option<BlockId> },
    ReturnInternal,
    Unreachable,
}

impl OpKind {
    /// Kinds that the lowering must eliminate.
    pub fn is_structured(&self) -> bool {
        use OpKind::*;
        matches!(
            self,
            Entry
                | Exit
                | Return
                | ReturnVal
                | YieldReturnVal
                | If
                | While { .. }
                | DoWhile { .. }
                | For { .. }
                | Switch { .. }
                | Label { .. }
                | Break { .. }
                | Continue { .. }
                | Yield
                | Condition
                | NoCondition
                | Merge
                | Try
                | Catch { .. }
                | Throw
                | Call { .. }
                | CallIndirect
                | StateLabel
                | SwitchState { .. }
                | Capture
        )
    }

    pub fn is_terminator(&self) -> bool {
        use OpKind::*;
        matches!(
            self,
            Exit | Yield
                | Condition
                | NoCondition
                | Merge
                | SwitchState { .. }
                | Br { .. }
                | CondBr { .. }
                | SwitchInt { .. }
                | Invoke { .. }
                | ThrowUnwind { .. }
                | ThrowCall
                | EndCleanup { .. }
                | ReturnInternal
                | Unreachable
        )
    }

    /// Loop kinds accept unlabeled `continue`.
    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            OpKind::While { .. } | OpKind::DoWhile { .. } | OpKind::For { .. }
        )
    }

    /// Constructs that accept unlabeled `break`.
    pub fn is_breakable(&self) -> bool {
        self.is_loop() || matches!(self, OpKind::Switch { .. })
    }

    /// The label of a loop, switch or labeled block.
    pub fn construct_label(&self) -> Option<&str> {
        match self {
            OpKind::While { label }
            | OpKind::DoWhile { label }
            | OpKind::For { label }
            | OpKind::Switch { label } => label.as_deref(),
            OpKind::Label { label } => Some(label),
            _ => None,
        }
    }

    pub fn is_call_like(&self) -> bool {
        matches!(self, OpKind::Call { .. } | OpKind::CallIndirect | OpKind::Throw)
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            OpKind::Br { target } => vec![*target],
            OpKind::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![*then_dest, *else_dest],
            OpKind::SwitchInt { default, cases } => std::iter::once(*default)
                .chain(cases.iter().map(|(_, dest)| *dest))
                .collect(),
            OpKind::Invoke { normal, unwind, .. } => vec![*normal, *unwind],
            OpKind::ThrowUnwind { unwind } => vec![*unwind],
            OpKind::EndCleanup { unwind } => unwind.iter().copied().collect(),
            OpKind::SwitchState { default_dest } => vec![*default_dest],
            _ => Vec::new(),
        }
    }

    pub fn successors_mut(&mut self) -> Vec<&mut BlockId> {
        match self {
            OpKind::Br { target } => vec![target],
            OpKind::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![then_dest, else_dest],
            OpKind::SwitchInt { default, cases } => std::iter::once(default)
                .chain(cases.iter_mut().map(|(_, dest)| dest))
                .collect(),
            OpKind::Invoke { normal, unwind, .. } => vec![normal, unwind],
            OpKind::ThrowUnwind { unwind } => vec![unwind],
            OpKind::EndCleanup { unwind } => unwind.iter_mut().collect(),
            OpKind::SwitchState { default_dest } => vec![default_dest],
            _ => Vec::new(),
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        use OpKind::*;
        match self {
            Entry => "entry",
            Exit => "exit",
            Return => "return",
            ReturnVal => "return_val",
            YieldReturnVal => "yield_return_val",
            If => "if",
            While { .. } => "while",
            DoWhile { .. } => "do_while",
            For { .. } => "for",
            Switch { .. } => "switch",
            Label { .. } => "label",
            Break { .. } => "break",
            Continue { .. } => "continue",
            Yield => "yield",
            Condition => "condition",
            NoCondition => "no_condition",
            Merge => "merge",
            Try => "try",
            Catch { .. } => "catch",
            Throw => "throw",
            Call { .. } => "call",
            CallIndirect => "call_indirect",
            StateLabel => "state_label",
            SwitchState { .. } => "switch_state",
            Capture => "capture",
            Constant(_) => "constant",
            Variable { .. } => "variable",
            Load => "load",
            Store => "store",
            PropertyRef { .. } => "property_ref",
            Cast => "cast",
            Binary(_) => "binary",
            Null => "null",
            Undef => "undef",
            CallInternal { .. } => "call_internal",
            CallIndirectInternal => "call_indirect_internal",
            LandingPad { .. } => "landing_pad",
            CompareCatchType { .. } => "compare_catch_type",
            BeginCatch => "begin_catch",
            EndCatch => "end_catch",
            SaveCatchVar => "save_catch_var",
            BeginCleanup => "begin_cleanup",
            Br { .. } => "br",
            CondBr { .. } => "cond_br",
            SwitchInt { .. } => "switch_int",
            Invoke { .. } => "invoke",
            ThrowUnwind { .. } => "throw_unwind",
            ThrowCall => "throw_call",
            EndCleanup { .. } => "end_cleanup",
            ReturnInternal => "return_internal",
            Unreachable => "unreachable",
        }
    }
}

impl Display for OpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        match self {
            OpKind::While { label: Some(label) }
            | OpKind::DoWhile { label: Some(label) }
            | OpKind::For { label: Some(label) }
            | OpKind::Switch { label: Some(label) }
            | OpKind::Break { label: Some(label) }
            | OpKind::Continue { label: Some(label) }
            | OpKind::Label { label } => write!(f, " '{}", label),
            OpKind::Catch {
                catch_type: Some(ty),
            } => write!(f, " <{}>", ty),
            OpKind::Call { callee } | OpKind::CallInternal { callee } => write!(f, " @{}", callee),
            OpKind::SwitchState { default_dest } => write!(f, " default {}", default_dest),
            OpKind::Constant(value) => write!(f, " {}", value),
            OpKind::Variable { in_heap: true } => write!(f, " heap"),
            OpKind::PropertyRef { index } => write!(f, " .{}", index),
            OpKind::Binary(op) => write!(f, " {}", op),
            OpKind::LandingPad {
                cleanup,
                catch_type,
            } => {
                if *cleanup {
                    write!(f, " cleanup")?;
                }
                match catch_type {
                    Some(token) => write!(f, " catch {}", token),
                    None if !cleanup => write!(f, " catch all"),
                    None => Ok(()),
                }
            }
            OpKind::CompareCatchType { token } => write!(f, " {}", token),
            OpKind::Br { target } => write!(f, " {}", target),
            OpKind::CondBr {
                then_dest,
                else_dest,
                ..
            } => write!(f, " {}, {}", then_dest, else_dest),
            OpKind::SwitchInt { default, cases } => {
                write!(f, " default {}", default)?;
                for (value, dest) in cases {
                    write!(f, ", {} => {}", value, dest)?;
                }
                Ok(())
            }
            OpKind::Invoke {
                callee,
                normal,
                unwind,
            } => {
                if let Callee::Symbol(name) = callee {
                    write!(f, " @{}", name)?;
                }
                write!(f, " to {} unwind {}", normal, unwind)
            }
            OpKind::ThrowUnwind { unwind } => write!(f, " unwind {}", unwind),
            OpKind::EndCleanup {
                unwind: Some(unwind),
            } => write!(f, " unwind {}", unwind),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_terminators_are_structured() {
        for kind in [
            OpKind::Yield,
            OpKind::Condition,
            OpKind::NoCondition,
            OpKind::Merge,
            OpKind::Exit,
        ] {
            assert!(kind.is_terminator(), "{kind}");
            assert!(kind.is_structured(), "{kind}");
        }
        assert!(!OpKind::Br { target: BlockId(0) }.is_structured());
        assert!(!OpKind::Break { label: None }.is_terminator());
    }

    #[test]
    fn switch_successors_include_default_first() {
        let mut kind = OpKind::SwitchInt {
            default: BlockId(1),
            cases: vec![(0, BlockId(2)), (1, BlockId(3))],
        };
        assert_eq!(kind.successors(), vec![BlockId(1), BlockId(2), BlockId(3)]);
        for succ in kind.successors_mut() {
            succ.0 += 10;
        }
        assert_eq!(kind.successors(), vec![BlockId(11), BlockId(12), BlockId(13)]);
    }
}
