use itertools::Itertools;
use sf_core::ty::{ConstValue, Ty};
use std::fmt::{self, Display, Formatter};

/// Address of a heap cell, optionally narrowed to a tuple field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    pub cell: usize,
    pub path: Vec<u32>,
}

impl Pointer {
    pub fn field(&self, index: u32) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        Self {
            cell: self.cell,
            path,
        }
    }
}

/// An exception travelling through the simulated function.
#[derive(Debug, Clone, PartialEq)]
pub struct Thrown {
    pub ty: Ty,
    pub payload: RtValue,
}

impl Thrown {
    pub fn new(ty: Ty, payload: impl Into<RtValue>) -> Self {
        Self {
            ty,
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RtValue {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Null,
    Undef,
    Ref(Pointer),
    Tuple(Vec<RtValue>),
    Fn(String),
    Exception(Box<Thrown>),
}

impl RtValue {
    /// Initial contents of a freshly allocated `ty`.
    pub fn default_for(ty: &Ty) -> Self {
        match ty {
            Ty::Tuple(fields) => RtValue::Tuple(fields.iter().map(RtValue::default_for).collect()),
            _ => RtValue::Undef,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RtValue::Int(v) => Some(*v),
            RtValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            RtValue::Bool(v) => *v,
            RtValue::Int(v) => *v != 0,
            RtValue::Float(v) => *v != 0.0,
            RtValue::Str(v) => !v.is_empty(),
            RtValue::Null | RtValue::Undef | RtValue::Unit => false,
            RtValue::Ref(_) | RtValue::Tuple(_) | RtValue::Fn(_) | RtValue::Exception(_) => true,
        }
    }
}

impl From<&ConstValue> for RtValue {
    fn from(value: &ConstValue) -> Self {
        match value {
            ConstValue::Bool(v) => RtValue::Bool(*v),
            ConstValue::Int(v) => RtValue::Int(*v),
            ConstValue::Float(v) => RtValue::Float(*v),
            ConstValue::Str(v) => RtValue::Str(v.clone()),
            ConstValue::FuncRef(name) => RtValue::Fn(name.clone()),
        }
    }
}

impl From<i64> for RtValue {
    fn from(value: i64) -> Self {
        RtValue::Int(value)
    }
}

impl From<bool> for RtValue {
    fn from(value: bool) -> Self {
        RtValue::Bool(value)
    }
}

impl From<f64> for RtValue {
    fn from(value: f64) -> Self {
        RtValue::Float(value)
    }
}

impl From<&str> for RtValue {
    fn from(value: &str) -> Self {
        RtValue::Str(value.to_string())
    }
}

impl Display for RtValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RtValue::Unit => write!(f, "()"),
            RtValue::Bool(v) => write!(f, "{}", v),
            RtValue::Int(v) => write!(f, "{}", v),
            RtValue::Float(v) => write!(f, "{:?}", v),
            RtValue::Str(v) => write!(f, "{:?}", v),
            RtValue::Null => write!(f, "null"),
            RtValue::Undef => write!(f, "undef"),
            RtValue::Ref(ptr) => {
                write!(f, "&cell{}", ptr.cell)?;
                for index in &ptr.path {
                    write!(f, ".{}", index)?;
                }
                Ok(())
            }
            RtValue::Tuple(items) => write!(f, "({})", items.iter().join(", ")),
            RtValue::Fn(name) => write!(f, "@{}", name),
            RtValue::Exception(thrown) => write!(f, "exception<{}>({})", thrown.ty, thrown.payload),
        }
    }
}
