//! Runtime value types

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::env::Scope;
use super::errors::EvalResult;
use super::interp::Interpreter;
use super::regexp::RegExpVal;
use crate::syntax::ast::{format_number, ClassField, Function};
use crate::syntax::grow_stack;

pub type Props = IndexMap<String, Val>;
pub type ObjRef = Rc<RefCell<Object>>;
pub type ArrRef = Rc<RefCell<Vec<Val>>>;

/// Native function body: `(interpreter, this, args)`
pub type NativeImpl = dyn Fn(&mut Interpreter, Val, Vec<Val>) -> EvalResult;

/// Runtime value
#[derive(Clone)]
pub enum Val {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Symbol(Rc<str>),
    Array(ArrRef),
    Object(ObjRef),
    Function(Rc<Closure>),
    Class(Rc<ClassVal>),
    Native(Rc<NativeFn>),
    Element(Rc<Element>),
    RegExp(Rc<RegExpVal>),
}

/* ===================== Heap Types ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    Plain,
    Error,
}

pub struct Object {
    pub props: Props,
    /// Set for class instances; methods resolve through it
    pub class: Option<Rc<ClassVal>>,
    pub kind: ObjKind,
}

impl Object {
    pub fn new(props: Props) -> Self {
        Self {
            props,
            class: None,
            kind: ObjKind::Plain,
        }
    }
}

/// A user function or arrow together with its defining scope
pub struct Closure {
    pub func: Rc<Function>,
    pub scope: Scope,
    /// Declared name, or the binding an anonymous function was assigned to
    pub name: String,
    /// Static properties (`Card.defaultProps = ...`)
    pub props: RefCell<Props>,
}

impl Closure {
    pub fn new(func: Rc<Function>, scope: Scope) -> Self {
        let name = func.name.clone().unwrap_or_default();
        Self::named(func, scope, name)
    }

    pub fn named(func: Rc<Function>, scope: Scope, name: String) -> Self {
        Self {
            func,
            scope,
            name,
            props: RefCell::new(Props::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct ClassVal {
    pub name: String,
    pub parent: Option<Val>,
    pub constructor: Option<Rc<Function>>,
    pub methods: Props,
    pub statics: RefCell<Props>,
    pub fields: Vec<ClassField>,
    pub scope: Scope,
    /// Built-in base classes initialise instances natively
    pub native_init: Option<Box<NativeImpl>>,
}

impl ClassVal {
    /// Own or inherited instance method
    pub fn find_method(&self, name: &str) -> Option<Val> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        match &self.parent {
            Some(Val::Class(parent)) => parent.find_method(name),
            _ => None,
        }
    }

    /// Whether `ancestor` is this class or one of its bases
    pub fn extends(self: &Rc<Self>, ancestor: &Rc<ClassVal>) -> bool {
        if Rc::ptr_eq(self, ancestor) {
            return true;
        }
        match &self.parent {
            Some(Val::Class(parent)) => parent.extends(ancestor),
            _ => false,
        }
    }

    /// Whether the chain reaches a base carrying a `render` method
    pub fn is_component_class(&self) -> bool {
        self.find_method("render").is_some()
    }
}

pub struct NativeFn {
    pub name: String,
    pub func: Box<NativeImpl>,
    pub props: RefCell<Props>,
}

/// Result of `createElement`
pub struct Element {
    /// Tag string, component value, fragment symbol or wrapper object
    pub kind: Val,
    pub props: ObjRef,
    pub key: Option<String>,
    pub ref_val: Val,
}

/* ===================== Constructors ===================== */

impl Val {
    pub fn str(s: impl Into<String>) -> Val {
        Val::Str(s.into())
    }

    pub fn array(items: Vec<Val>) -> Val {
        Val::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: Props) -> Val {
        Val::Object(Rc::new(RefCell::new(Object::new(props))))
    }

    pub fn native<F>(name: &str, func: F) -> Val
    where
        F: Fn(&mut Interpreter, Val, Vec<Val>) -> EvalResult + 'static,
    {
        Val::Native(Rc::new(NativeFn {
            name: name.to_string(),
            func: Box::new(func),
            props: RefCell::new(Props::new()),
        }))
    }

    pub fn regexp(re: RegExpVal) -> Val {
        Val::RegExp(Rc::new(re))
    }

    /// Native function carrying static members (`Array.isArray`, `Number.isInteger`)
    pub fn native_with_props<F>(name: &str, func: F, props: Props) -> Val
    where
        F: Fn(&mut Interpreter, Val, Vec<Val>) -> EvalResult + 'static,
    {
        Val::Native(Rc::new(NativeFn {
            name: name.to_string(),
            func: Box::new(func),
            props: RefCell::new(props),
        }))
    }
}

/* ===================== Conversions ===================== */

impl Val {
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Undefined | Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Val::Undefined | Val::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Val::Function(_) | Val::Class(_) | Val::Native(_))
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Val::Undefined => "undefined",
            Val::Null => "object",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::Symbol(_) => "symbol",
            Val::Function(_) | Val::Class(_) | Val::Native(_) => "function",
            Val::Array(_) | Val::Object(_) | Val::Element(_) | Val::RegExp(_) => "object",
        }
    }

    /// Short description used in type errors (`InvalidComponentType(object)`)
    pub fn describe(&self) -> String {
        match self {
            Val::Null => "null".to_string(),
            Val::Array(_) => "array".to_string(),
            Val::Element(_) => "element".to_string(),
            other => other.type_of().to_string(),
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Val::Undefined => f64::NAN,
            Val::Null => 0.0,
            Val::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Val::Num(n) => *n,
            Val::Str(s) => parse_number_str(s),
            Val::Array(_) => parse_number_str(&self.to_js_string()),
            _ => f64::NAN,
        }
    }

    /// ToInt32 for bitwise operators
    pub fn to_int32(&self) -> i32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        let n = n.trunc() % 4_294_967_296.0;
        let n = if n < 0.0 { n + 4_294_967_296.0 } else { n };
        (n as u32) as i32
    }

    pub fn to_uint32(&self) -> u32 {
        self.to_int32() as u32
    }

    /// ToString
    pub fn to_js_string(&self) -> String {
        match self {
            Val::Undefined => "undefined".to_string(),
            Val::Null => "null".to_string(),
            Val::Bool(b) => b.to_string(),
            Val::Num(n) => format_number(*n),
            Val::Str(s) => s.clone(),
            Val::Symbol(desc) => format!("Symbol({})", desc),
            Val::Array(items) => join_items(items, &mut Vec::new()),
            Val::Object(obj) => {
                let obj = obj.borrow();
                if obj.kind == ObjKind::Error {
                    let name = obj
                        .props
                        .get("name")
                        .map(|v| v.to_js_string())
                        .unwrap_or_else(|| "Error".to_string());
                    let message = obj
                        .props
                        .get("message")
                        .map(|v| v.to_js_string())
                        .unwrap_or_default();
                    if message.is_empty() {
                        name
                    } else {
                        format!("{}: {}", name, message)
                    }
                } else {
                    "[object Object]".to_string()
                }
            }
            Val::Function(f) => format!("function {}() {{ [code] }}", f.name()),
            Val::Class(c) => format!("class {} {{ }}", c.name),
            Val::Native(n) => format!("function {}() {{ [native code] }}", n.name),
            Val::Element(_) => "[object Object]".to_string(),
            Val::RegExp(re) => format!("/{}/{}", re.source, re.flags),
        }
    }

    /// Property key form of a value (`obj[1]` and `obj["1"]` are the same key)
    pub fn to_property_key(&self) -> String {
        self.to_js_string()
    }
}

/// `Array.prototype.join(",")`; an array already being joined prints as empty
fn join_items(items: &ArrRef, joining: &mut Vec<*const RefCell<Vec<Val>>>) -> String {
    let id = Rc::as_ptr(items);
    if joining.contains(&id) {
        return String::new();
    }
    joining.push(id);
    let joined = grow_stack(|| {
        items
            .borrow()
            .iter()
            .map(|v| match v {
                Val::Undefined | Val::Null => String::new(),
                Val::Array(inner) => join_items(inner, joining),
                other => other.to_js_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    });
    joining.pop();
    joined
}

/// JavaScript string-to-number conversion
pub fn parse_number_str(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    let (sign, body) = match t.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, t.strip_prefix('+').unwrap_or(t)),
    };
    let radix = |prefix_lower: &str, prefix_upper: &str, radix: u32| {
        body.strip_prefix(prefix_lower)
            .or_else(|| body.strip_prefix(prefix_upper))
            .map(|digits| {
                u64::from_str_radix(digits, radix)
                    .map(|v| v as f64)
                    .unwrap_or(f64::NAN)
            })
    };
    if let Some(v) = radix("0x", "0X", 16)
        .or_else(|| radix("0b", "0B", 2))
        .or_else(|| radix("0o", "0O", 8))
    {
        // signed hex literals are NaN in JavaScript
        return if sign < 0.0 || t.starts_with('+') {
            f64::NAN
        } else {
            v
        };
    }
    if body == "Infinity" {
        return sign * f64::INFINITY;
    }
    let valid = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !valid || body.starts_with(['e', 'E']) {
        return f64::NAN;
    }
    body.parse::<f64>().map(|v| sign * v).unwrap_or(f64::NAN)
}

/* ===================== Equality ===================== */

impl Val {
    /// `===`
    pub fn strict_eq(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Undefined, Val::Undefined) | (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Num(a), Val::Num(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::Symbol(a), Val::Symbol(b)) => Rc::ptr_eq(a, b) || a == b,
            (Val::Array(a), Val::Array(b)) => Rc::ptr_eq(a, b),
            (Val::Object(a), Val::Object(b)) => Rc::ptr_eq(a, b),
            (Val::Function(a), Val::Function(b)) => Rc::ptr_eq(a, b),
            (Val::Class(a), Val::Class(b)) => Rc::ptr_eq(a, b),
            (Val::Native(a), Val::Native(b)) => Rc::ptr_eq(a, b),
            (Val::Element(a), Val::Element(b)) => Rc::ptr_eq(a, b),
            (Val::RegExp(a), Val::RegExp(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// SameValueZero (`includes`, hook dependency comparison)
    pub fn same_value_zero(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Num(a), Val::Num(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_eq(other),
        }
    }

    /// `==`
    pub fn loose_eq(&self, other: &Val) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Val::Num(_), Val::Str(_)) | (Val::Str(_), Val::Num(_)) => {
                self.to_number() == other.to_number()
            }
            (Val::Bool(_), _) => Val::Num(self.to_number()).loose_eq(other),
            (_, Val::Bool(_)) => self.loose_eq(&Val::Num(other.to_number())),
            (Val::Array(_) | Val::Object(_), Val::Num(_) | Val::Str(_)) => {
                Val::Str(self.to_js_string()).loose_eq(other)
            }
            (Val::Num(_) | Val::Str(_), Val::Array(_) | Val::Object(_)) => {
                self.loose_eq(&Val::Str(other.to_js_string()))
            }
            _ => self.strict_eq(other),
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        self.same_value_zero(other)
    }
}

/* ===================== Formatting ===================== */

impl Val {
    /// Console-style rendering
    pub fn inspect(&self) -> String {
        self.inspect_at(0)
    }

    fn inspect_at(&self, depth: usize) -> String {
        match self {
            Val::Str(s) if depth > 0 => format!("'{}'", s),
            Val::Array(items) => {
                if depth > 2 {
                    return "[Array]".to_string();
                }
                let items = items.borrow();
                if items.is_empty() {
                    return "[]".to_string();
                }
                let parts: Vec<String> = items.iter().map(|v| v.inspect_at(depth + 1)).collect();
                format!("[ {} ]", parts.join(", "))
            }
            Val::Object(obj) => {
                let obj = obj.borrow();
                if obj.kind == ObjKind::Error {
                    drop(obj);
                    return self.to_js_string();
                }
                if depth > 2 {
                    return "[Object]".to_string();
                }
                if obj.props.is_empty() {
                    return "{}".to_string();
                }
                let parts: Vec<String> = obj
                    .props
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.inspect_at(depth + 1)))
                    .collect();
                format!("{{ {} }}", parts.join(", "))
            }
            Val::Function(f) => format!("[Function: {}]", f.name()),
            Val::Native(n) => format!("[Function: {}]", n.name),
            Val::Class(c) => format!("[class {}]", c.name),
            Val::Element(el) => match &el.kind {
                Val::Str(tag) => format!("<{} />", tag),
                other => format!("<{} />", other.component_name()),
            },
            other => other.to_js_string(),
        }
    }

    /// Display name of a component value
    pub fn component_name(&self) -> String {
        match self {
            Val::Function(f) if !f.name().is_empty() => f.name().to_string(),
            Val::Class(c) => c.name.clone(),
            Val::Native(n) => n.name.clone(),
            Val::Str(s) => s.clone(),
            _ => "Anonymous".to_string(),
        }
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Undefined => write!(f, "Undefined"),
            Val::Null => write!(f, "Null"),
            Val::Bool(b) => write!(f, "Bool({})", b),
            Val::Num(n) => write!(f, "Num({})", n),
            Val::Str(s) => write!(f, "Str({:?})", s),
            other => write!(f, "{}", other.inspect()),
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}
