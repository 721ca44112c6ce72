//! Error names, control signals and helpers for building thrown values

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::values::{ObjKind, Object, Props, Val};

/* ===================== Error Names ===================== */

pub const ERROR: &str = "Error";
pub const TYPE_ERROR: &str = "TypeError";
pub const REFERENCE_ERROR: &str = "ReferenceError";
pub const RANGE_ERROR: &str = "RangeError";
pub const SYNTAX_ERROR: &str = "SyntaxError";

/// Message used when the step budget runs out
pub const BUDGET_EXCEEDED: &str = "execution budget exceeded";

/* ===================== Control Flow ===================== */

/// Abrupt completion
///
/// Expressions only ever produce `Throw`, `Abort` and (inside an optional
/// chain) `ShortCircuit`; statements add the loop and function signals.
#[derive(Debug, Clone)]
pub enum Control {
    Return(Val),
    Break,
    Continue,
    Throw(Val),
    /// A nullish `?.` link; caught by the enclosing optional chain
    ShortCircuit,
    /// Uncatchable stop (step budget)
    Abort(String),
}

pub type EvalResult = Result<Val, Control>;

/* ===================== Error Info ===================== */

/// Name and message of a thrown value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Describe any thrown value
    pub fn from_thrown(value: &Val) -> Self {
        if let Val::Object(obj) = value {
            let obj = obj.borrow();
            if obj.kind == ObjKind::Error || obj.props.contains_key("message") {
                let name = obj
                    .props
                    .get("name")
                    .map(|v| v.to_js_string())
                    .unwrap_or_else(|| ERROR.to_string());
                let message = obj
                    .props
                    .get("message")
                    .map(|v| v.to_js_string())
                    .unwrap_or_default();
                return Self::new(name, message);
            }
        }
        Self::new("Uncaught", value.inspect())
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Build an error object
pub fn error_value(name: &str, message: impl Into<String>) -> Val {
    let mut props = Props::new();
    props.insert("name".to_string(), Val::str(name));
    props.insert("message".to_string(), Val::Str(message.into()));
    Val::Object(Rc::new(RefCell::new(Object {
        props,
        class: None,
        kind: ObjKind::Error,
    })))
}

/// `Err(Control::Throw(..))` with a fresh error object
pub fn throw<T>(name: &str, message: impl Into<String>) -> Result<T, Control> {
    Err(Control::Throw(error_value(name, message)))
}

pub fn type_error<T>(message: impl Into<String>) -> Result<T, Control> {
    throw(TYPE_ERROR, message)
}

pub fn reference_error<T>(message: impl Into<String>) -> Result<T, Control> {
    throw(REFERENCE_ERROR, message)
}

pub fn range_error<T>(message: impl Into<String>) -> Result<T, Control> {
    throw(RANGE_ERROR, message)
}

pub fn syntax_error<T>(message: impl Into<String>) -> Result<T, Control> {
    throw(SYNTAX_ERROR, message)
}
