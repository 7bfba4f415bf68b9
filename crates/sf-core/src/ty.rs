use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Types carried by IR values. Layout and class types live with the type subsystem;
/// the lowering only needs enough structure to see references, tuples and functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Void,
    Bool,
    I32,
    I64,
    F64,
    String,
    /// Exception pad tokens and other backend handles.
    Opaque,
    Null,
    Any,
    Ref(Box<Ty>),
    Tuple(Vec<Ty>),
    Function { params: Vec<Ty>, ret: Box<Ty> },
    Named(String),
}

impl Ty {
    pub fn reference(inner: Ty) -> Ty {
        Ty::Ref(Box::new(inner))
    }

    pub fn function(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Function {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Void)
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Ty::Ref(_))
    }

    pub fn pointee(&self) -> Option<&Ty> {
        match self {
            Ty::Ref(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn tuple_field(&self, index: usize) -> Option<&Ty> {
        match self {
            Ty::Tuple(fields) => fields.get(index),
            _ => None,
        }
    }
}

impl Display for Ty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "void"),
            Ty::Bool => write!(f, "bool"),
            Ty::I32 => write!(f, "i32"),
            Ty::I64 => write!(f, "i64"),
            Ty::F64 => write!(f, "f64"),
            Ty::String => write!(f, "string"),
            Ty::Opaque => write!(f, "opaque"),
            Ty::Null => write!(f, "null"),
            Ty::Any => write!(f, "any"),
            Ty::Ref(inner) => write!(f, "ref<{}>", inner),
            Ty::Tuple(fields) => write!(f, "tuple<{}>", fields.iter().join(", ")),
            Ty::Function { params, ret } => write!(f, "fn({}) -> {}", params.iter().join(", "), ret),
            Ty::Named(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::From)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    #[from(ignore)]
    FuncRef(String),
}

impl ConstValue {
    /// Hashable identity used when deduplicating materialized constants.
    pub fn key(&self) -> ConstKey {
        match self {
            ConstValue::Bool(v) => ConstKey::Bool(*v),
            ConstValue::Int(v) => ConstKey::Int(*v),
            ConstValue::Float(v) => ConstKey::Float(v.to_bits()),
            ConstValue::Str(v) => ConstKey::Str(v.clone()),
            ConstValue::FuncRef(v) => ConstKey::FuncRef(v.clone()),
        }
    }
}

impl Display for ConstValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bool(v) => write!(f, "{}", v),
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{:?}", v),
            ConstValue::Str(v) => write!(f, "\"{}\"", crate::pretty::escape_string(v)),
            ConstValue::FuncRef(v) => write!(f, "@{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    FuncRef(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum BinOp {
    #[display("add")]
    Add,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
    #[display("div")]
    Div,
    #[display("rem")]
    Rem,
    #[display("eq")]
    Eq,
    #[display("ne")]
    Ne,
    #[display("lt")]
    Lt,
    #[display("le")]
    Le,
    #[display("gt")]
    Gt,
    #[display("ge")]
    Ge,
    #[display("and")]
    And,
    #[display("or")]
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn result_ty(self, operand: &Ty) -> Ty {
        if self.is_comparison() || matches!(self, BinOp::And | BinOp::Or) {
            Ty::Bool
        } else {
            operand.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nested_types() {
        let ty = Ty::reference(Ty::Tuple(vec![Ty::I32, Ty::reference(Ty::F64)]));
        assert_eq!(ty.to_string(), "ref<tuple<i32, ref<f64>>>");
        assert_eq!(
            Ty::function(vec![Ty::I32], Ty::Void).to_string(),
            "fn(i32) -> void"
        );
    }

    #[test]
    fn float_keys_compare_by_bits() {
        assert_eq!(ConstValue::Float(1.5).key(), ConstValue::Float(1.5).key());
        assert_ne!(ConstValue::Float(0.0).key(), ConstValue::Float(-0.0).key());
        assert_eq!(ConstValue::from(3i64), ConstValue::Int(3));
    }
}
