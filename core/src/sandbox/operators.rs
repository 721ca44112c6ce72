//! Binary operators

use super::errors::{type_error, EvalResult};
use super::interp::Interpreter;
use super::values::{ObjKind, Val};
use crate::syntax::ast::BinaryOp;

/// Objects take part in `+` and comparisons through their string form
fn to_primitive(value: &Val) -> Val {
    match value {
        Val::Array(_)
        | Val::Object(_)
        | Val::Function(_)
        | Val::Class(_)
        | Val::Native(_)
        | Val::Element(_)
        | Val::RegExp(_) => Val::Str(value.to_js_string()),
        other => other.clone(),
    }
}

/// `a < b`; `None` when either side is NaN
fn less_than(l: &Val, r: &Val) -> Option<bool> {
    let (l, r) = (to_primitive(l), to_primitive(r));
    if let (Val::Str(a), Val::Str(b)) = (&l, &r) {
        return Some(a < b);
    }
    let (a, b) = (l.to_number(), r.to_number());
    if a.is_nan() || b.is_nan() {
        None
    } else {
        Some(a < b)
    }
}

impl Interpreter {
    pub fn binary_op(&mut self, op: BinaryOp, l: &Val, r: &Val) -> EvalResult {
        let num = |f: fn(f64, f64) -> f64| Val::Num(f(l.to_number(), r.to_number()));
        Ok(match op {
            BinaryOp::Add => {
                let (lp, rp) = (to_primitive(l), to_primitive(r));
                match (&lp, &rp) {
                    (Val::Str(a), _) => Val::Str(format!("{}{}", a, rp.to_js_string())),
                    (_, Val::Str(b)) => Val::Str(format!("{}{}", lp.to_js_string(), b)),
                    _ => Val::Num(lp.to_number() + rp.to_number()),
                }
            }
            BinaryOp::Sub => num(|a, b| a - b),
            BinaryOp::Mul => num(|a, b| a * b),
            BinaryOp::Div => num(|a, b| a / b),
            BinaryOp::Rem => num(|a, b| a % b),
            BinaryOp::Exp => num(f64::powf),
            BinaryOp::Eq => Val::Bool(l.loose_eq(r)),
            BinaryOp::NotEq => Val::Bool(!l.loose_eq(r)),
            BinaryOp::StrictEq => Val::Bool(l.strict_eq(r)),
            BinaryOp::StrictNotEq => Val::Bool(!l.strict_eq(r)),
            BinaryOp::Lt => Val::Bool(less_than(l, r).unwrap_or(false)),
            BinaryOp::Gt => Val::Bool(less_than(r, l).unwrap_or(false)),
            BinaryOp::LtEq => Val::Bool(less_than(r, l).map(|gt| !gt).unwrap_or(false)),
            BinaryOp::GtEq => Val::Bool(less_than(l, r).map(|lt| !lt).unwrap_or(false)),
            BinaryOp::BitAnd => Val::Num((l.to_int32() & r.to_int32()) as f64),
            BinaryOp::BitOr => Val::Num((l.to_int32() | r.to_int32()) as f64),
            BinaryOp::BitXor => Val::Num((l.to_int32() ^ r.to_int32()) as f64),
            BinaryOp::Shl => Val::Num(l.to_int32().wrapping_shl(r.to_uint32() & 31) as f64),
            BinaryOp::Shr => Val::Num((l.to_int32() >> (r.to_uint32() & 31)) as f64),
            BinaryOp::UShr => Val::Num((l.to_uint32() >> (r.to_uint32() & 31)) as f64),
            BinaryOp::In => Val::Bool(self.has_property(r, &l.to_property_key())?),
            BinaryOp::Instanceof => Val::Bool(self.instance_of(l, r)?),
        })
    }

    pub fn instance_of(&mut self, value: &Val, ctor: &Val) -> Result<bool, super::errors::Control> {
        match ctor {
            Val::Class(class) => Ok(match value {
                Val::Object(obj) => obj
                    .borrow()
                    .class
                    .as_ref()
                    .map(|c| c.extends(class))
                    .unwrap_or(false),
                _ => false,
            }),
            Val::Native(native) => Ok(match native.name.as_str() {
                "Error" => matches!(value, Val::Object(o) if o.borrow().kind == ObjKind::Error),
                "Array" => matches!(value, Val::Array(_)),
                "Object" => matches!(
                    value,
                    Val::Object(_) | Val::Array(_) | Val::Function(_) | Val::Class(_) | Val::Native(_)
                ),
                "Function" => value.is_callable(),
                _ => false,
            }),
            Val::Function(_) => Ok(false),
            other => type_error(format!(
                "Right-hand side of 'instanceof' is not callable ({})",
                other.describe()
            )),
        }
    }
}
