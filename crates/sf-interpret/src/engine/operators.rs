use crate::value::RtValue;
use sf_core::ty::{BinOp, Ty};
use std::cmp::Ordering;

fn compare(op: BinOp, ordering: Option<Ordering>) -> Option<RtValue> {
    let ordering = ordering?;
    let result = match op {
        BinOp::Eq => ordering == Ordering::Equal,
        BinOp::Ne => ordering != Ordering::Equal,
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => return None,
    };
    Some(RtValue::Bool(result))
}

/// Evaluate `lhs op rhs`, or `None` when the operation is undefined for these operands.
pub(super) fn binary(op: BinOp, lhs: &RtValue, rhs: &RtValue) -> Option<RtValue> {
    match (lhs, rhs) {
        (RtValue::Int(a), RtValue::Int(b)) => {
            let (a, b) = (*a, *b);
            match op {
                BinOp::Add => Some(RtValue::Int(a.wrapping_add(b))),
                BinOp::Sub => Some(RtValue::Int(a.wrapping_sub(b))),
                BinOp::Mul => Some(RtValue::Int(a.wrapping_mul(b))),
                BinOp::Div => a.checked_div(b).map(RtValue::Int),
                BinOp::Rem => a.checked_rem(b).map(RtValue::Int),
                BinOp::And => Some(RtValue::Bool(a != 0 && b != 0)),
                BinOp::Or => Some(RtValue::Bool(a != 0 || b != 0)),
                _ => compare(op, Some(a.cmp(&b))),
            }
        }
        (RtValue::Float(a), RtValue::Float(b)) => {
            let (a, b) = (*a, *b);
            match op {
                BinOp::Add => Some(RtValue::Float(a + b)),
                BinOp::Sub => Some(RtValue::Float(a - b)),
                BinOp::Mul => Some(RtValue::Float(a * b)),
                BinOp::Div => Some(RtValue::Float(a / b)),
                BinOp::Rem => Some(RtValue::Float(a % b)),
                BinOp::And | BinOp::Or => None,
                _ => compare(op, a.partial_cmp(&b)),
            }
        }
        (RtValue::Bool(a), RtValue::Bool(b)) => match op {
            BinOp::And => Some(RtValue::Bool(*a && *b)),
            BinOp::Or => Some(RtValue::Bool(*a || *b)),
            BinOp::Eq | BinOp::Ne => compare(op, Some(a.cmp(b))),
            _ => None,
        },
        (RtValue::Str(a), RtValue::Str(b)) => match op {
            BinOp::Add => Some(RtValue::Str(format!("{}{}", a, b))),
            BinOp::And | BinOp::Or => None,
            _ if op.is_comparison() => compare(op, Some(a.cmp(b))),
            _ => None,
        },
        _ => match op {
            BinOp::Eq => Some(RtValue::Bool(lhs == rhs)),
            BinOp::Ne => Some(RtValue::Bool(lhs != rhs)),
            _ => None,
        },
    }
}

/// Convert `value` to `ty`. Casting to `bool` tests truthiness; numeric casts convert between
/// integers and floats; anything else passes through unchanged.
pub(super) fn cast(value: RtValue, ty: &Ty) -> RtValue {
    match (ty, value) {
        (Ty::Bool, value) => RtValue::Bool(value.truthy()),
        (Ty::I32 | Ty::I64, RtValue::Float(v)) => RtValue::Int(v as i64),
        (Ty::I32 | Ty::I64, RtValue::Bool(v)) => RtValue::Int(v as i64),
        (Ty::F64, RtValue::Int(v)) => RtValue::Float(v as f64),
        (_, value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_and_comparison() {
        let (a, b) = (RtValue::Int(7), RtValue::Int(2));
        assert_eq!(binary(BinOp::Sub, &a, &b), Some(RtValue::Int(5)));
        assert_eq!(binary(BinOp::Rem, &a, &b), Some(RtValue::Int(1)));
        assert_eq!(binary(BinOp::Ge, &a, &b), Some(RtValue::Bool(true)));
        assert_eq!(binary(BinOp::Div, &a, &RtValue::Int(0)), None);
    }

    #[test]
    fn mixed_operands_only_compare_for_equality() {
        let (a, b) = (RtValue::Int(1), RtValue::Str("1".into()));
        assert_eq!(binary(BinOp::Eq, &a, &b), Some(RtValue::Bool(false)));
        assert_eq!(binary(BinOp::Add, &a, &b), None);
    }

    #[test]
    fn casts_to_bool_use_truthiness() {
        assert_eq!(cast(RtValue::Int(3), &Ty::Bool), RtValue::Bool(true));
        assert_eq!(cast(RtValue::Null, &Ty::Bool), RtValue::Bool(false));
        assert_eq!(cast(RtValue::Float(2.9), &Ty::I32), RtValue::Int(2));
    }
}
