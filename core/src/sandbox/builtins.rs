//! Pure builtin library and prototype methods
//!
//! Globals are exposed only through the primitive table; each factory here
//! builds a fresh value for one interpreter. Prototype methods are built once
//! per interpreter in [`Protos`] and resolved by name on property access.

use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;

use super::errors::{error_value, range_error, type_error, Control, EvalResult, ERROR};
use super::interp::{ConsoleLevel, Interpreter};
use super::json;
use super::regexp::{expand_replacement, RegExpMatch, RegExpVal};
use super::values::{ArrRef, Props, Val};
use crate::syntax::ast::format_number;
use crate::syntax::grow_stack;

/* ===================== Helpers ===================== */

fn arg(args: &[Val], i: usize) -> Val {
    args.get(i).cloned().unwrap_or(Val::Undefined)
}

fn this_array(this: &Val, method: &str) -> Result<ArrRef, Control> {
    match this {
        Val::Array(items) => Ok(items.clone()),
        other => type_error(format!(
            "Array.prototype.{} called on {}",
            method,
            other.describe()
        )),
    }
}

fn this_string(this: &Val) -> String {
    match this {
        Val::Str(s) => s.clone(),
        other => other.to_js_string(),
    }
}

/// Relative index (`slice(-2)`) clamped to `0..=len`
fn relative_index(value: &Val, len: usize, default: usize) -> usize {
    if matches!(value, Val::Undefined) {
        return default;
    }
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

fn to_usize(value: &Val, default: usize) -> usize {
    match value {
        Val::Undefined => default,
        other => {
            let n = other.to_number();
            if n.is_nan() || n < 0.0 {
                0
            } else {
                n.trunc() as usize
            }
        }
    }
}

/// Character index of `needle` in `hay` at or after char `from`
fn char_index_of(hay: &str, needle: &str, from: usize) -> Option<usize> {
    let chars: Vec<char> = hay.chars().collect();
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() {
        return Some(from.min(chars.len()));
    }
    if needle.len() > chars.len() {
        return None;
    }
    (from..=chars.len() - needle.len()).find(|&i| chars[i..i + needle.len()] == needle[..])
}

/// A pattern argument as a RegExp; other values compile as pattern text
fn to_regexp(value: &Val, flags: &str) -> Result<Rc<RegExpVal>, Control> {
    match value {
        Val::RegExp(re) => Ok(re.clone()),
        Val::Undefined => RegExpVal::compile("", flags).map(Rc::new),
        other => RegExpVal::compile(&other.to_js_string(), flags).map(Rc::new),
    }
}

fn this_regexp(this: &Val, method: &str) -> Result<Rc<RegExpVal>, Control> {
    match this {
        Val::RegExp(re) => Ok(re.clone()),
        other => type_error(format!(
            "RegExp.prototype.{} called on {}",
            method,
            other.describe()
        )),
    }
}

fn optional_str(value: &Option<String>) -> Val {
    value.clone().map(Val::Str).unwrap_or(Val::Undefined)
}

/// `exec` result: the match followed by its groups
fn match_array(found: &RegExpMatch) -> Val {
    let mut items = vec![Val::str(&found.text)];
    items.extend(found.groups.iter().map(optional_str));
    Val::array(items)
}

fn object_with(entries: Vec<(&str, Val)>) -> Val {
    let mut props = Props::new();
    for (k, v) in entries {
        props.insert(k.to_string(), v);
    }
    Val::object(props)
}

fn props_with(entries: Vec<(&str, Val)>) -> Props {
    let mut props = Props::new();
    for (k, v) in entries {
        props.insert(k.to_string(), v);
    }
    props
}

/* ===================== Globals ===================== */

pub fn console(_: &mut Interpreter) -> Val {
    let level_fn = |name: &str, level: ConsoleLevel| {
        Val::native(name, move |interp, _, args| {
            interp.log(level, &args);
            Ok(Val::Undefined)
        })
    };
    object_with(vec![
        ("log", level_fn("log", ConsoleLevel::Log)),
        ("info", level_fn("info", ConsoleLevel::Info)),
        ("warn", level_fn("warn", ConsoleLevel::Warn)),
        ("error", level_fn("error", ConsoleLevel::Error)),
        ("debug", level_fn("debug", ConsoleLevel::Debug)),
    ])
}

pub fn math(_: &mut Interpreter) -> Val {
    fn unary(name: &str, f: fn(f64) -> f64) -> (&str, Val) {
        (
            name,
            Val::native(name, move |_, _, args| Ok(Val::Num(f(arg(&args, 0).to_number())))),
        )
    }
    let mut entries = vec![
        ("PI", Val::Num(std::f64::consts::PI)),
        ("E", Val::Num(std::f64::consts::E)),
        ("LN2", Val::Num(std::f64::consts::LN_2)),
        ("LN10", Val::Num(std::f64::consts::LN_10)),
        ("SQRT2", Val::Num(std::f64::consts::SQRT_2)),
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        unary("abs", f64::abs),
        unary("sqrt", f64::sqrt),
        unary("cbrt", f64::cbrt),
        unary("trunc", f64::trunc),
        unary("log", f64::ln),
        unary("log2", f64::log2),
        unary("log10", f64::log10),
        unary("exp", f64::exp),
        unary("sin", f64::sin),
        unary("cos", f64::cos),
        unary("tan", f64::tan),
        unary("atan", f64::atan),
        // JavaScript rounds .5 towards +Infinity
        unary("round", |x| (x + 0.5).floor()),
        unary("sign", |x| {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }),
    ];
    entries.push((
        "pow",
        Val::native("pow", |_, _, args| {
            Ok(Val::Num(arg(&args, 0).to_number().powf(arg(&args, 1).to_number())))
        }),
    ));
    entries.push((
        "atan2",
        Val::native("atan2", |_, _, args| {
            Ok(Val::Num(arg(&args, 0).to_number().atan2(arg(&args, 1).to_number())))
        }),
    ));
    entries.push((
        "hypot",
        Val::native("hypot", |_, _, args| {
            Ok(Val::Num(args.iter().map(|a| a.to_number().powi(2)).sum::<f64>().sqrt()))
        }),
    ));
    entries.push((
        "max",
        Val::native("max", |_, _, args| {
            let mut out = f64::NEG_INFINITY;
            for a in &args {
                let n = a.to_number();
                if n.is_nan() {
                    return Ok(Val::Num(f64::NAN));
                }
                out = out.max(n);
            }
            Ok(Val::Num(out))
        }),
    ));
    entries.push((
        "min",
        Val::native("min", |_, _, args| {
            let mut out = f64::INFINITY;
            for a in &args {
                let n = a.to_number();
                if n.is_nan() {
                    return Ok(Val::Num(f64::NAN));
                }
                out = out.min(n);
            }
            Ok(Val::Num(out))
        }),
    ));
    entries.push((
        "random",
        Val::native("random", |interp, _, _| Ok(Val::Num(interp.random()))),
    ));
    object_with(entries)
}

pub fn json_object(_: &mut Interpreter) -> Val {
    object_with(vec![
        (
            "stringify",
            Val::native("stringify", |_, _, args| {
                json::stringify(&arg(&args, 0), &arg(&args, 2))
            }),
        ),
        (
            "parse",
            Val::native("parse", |_, _, args| json::parse(&arg(&args, 0).to_js_string())),
        ),
    ])
}

pub fn object_ctor(_: &mut Interpreter) -> Val {
    let statics = props_with(vec![
        (
            "keys",
            Val::native("keys", |interp, _, args| {
                let keys = interp.own_keys(&arg(&args, 0));
                Ok(Val::array(keys.into_iter().map(Val::Str).collect()))
            }),
        ),
        (
            "values",
            Val::native("values", |interp, _, args| {
                let target = arg(&args, 0);
                let mut out = Vec::new();
                for key in interp.own_keys(&target) {
                    out.push(interp.get_prop(&target, &key)?);
                }
                Ok(Val::array(out))
            }),
        ),
        (
            "entries",
            Val::native("entries", |interp, _, args| {
                let target = arg(&args, 0);
                let mut out = Vec::new();
                for key in interp.own_keys(&target) {
                    let value = interp.get_prop(&target, &key)?;
                    out.push(Val::array(vec![Val::Str(key), value]));
                }
                Ok(Val::array(out))
            }),
        ),
        (
            "assign",
            Val::native("assign", |interp, _, args| {
                let target = arg(&args, 0);
                if target.is_nullish() {
                    return type_error("Cannot convert undefined or null to object");
                }
                for source in args.iter().skip(1) {
                    for key in interp.own_keys(source) {
                        let value = interp.get_prop(source, &key)?;
                        interp.set_prop(&target, &key, value)?;
                    }
                }
                Ok(target)
            }),
        ),
        (
            "fromEntries",
            Val::native("fromEntries", |interp, _, args| {
                let mut props = Props::new();
                for entry in interp.iterate(&arg(&args, 0))? {
                    let pair = interp.iterate(&entry)?;
                    let key = pair.first().cloned().unwrap_or(Val::Undefined);
                    let value = pair.get(1).cloned().unwrap_or(Val::Undefined);
                    props.insert(key.to_property_key(), value);
                }
                Ok(Val::object(props))
            }),
        ),
        ("freeze", Val::native("freeze", |_, _, args| Ok(arg(&args, 0)))),
        (
            "is",
            Val::native("is", |_, _, args| {
                let (a, b) = (arg(&args, 0), arg(&args, 1));
                Ok(Val::Bool(match (&a, &b) {
                    (Val::Num(x), Val::Num(y)) => {
                        (x.is_nan() && y.is_nan())
                            || (x == y && x.is_sign_negative() == y.is_sign_negative())
                    }
                    _ => a.strict_eq(&b),
                }))
            }),
        ),
    ]);
    Val::native_with_props(
        "Object",
        |_, _, args| {
            Ok(match arg(&args, 0) {
                v if v.is_nullish() => Val::object(Props::new()),
                v => v,
            })
        },
        statics,
    )
}

pub fn array_ctor(_: &mut Interpreter) -> Val {
    let statics = props_with(vec![
        (
            "isArray",
            Val::native("isArray", |_, _, args| {
                Ok(Val::Bool(matches!(arg(&args, 0), Val::Array(_))))
            }),
        ),
        (
            "of",
            Val::native("of", |_, _, args| Ok(Val::array(args))),
        ),
        (
            "from",
            Val::native("from", |interp, _, args| {
                let source = arg(&args, 0);
                let items = match &source {
                    Val::Array(_) | Val::Str(_) => interp.iterate(&source)?,
                    Val::Object(_) => {
                        let len = to_usize(&interp.get_prop(&source, "length")?, 0);
                        if len > 10_000_000 {
                            return range_error("Invalid array length");
                        }
                        let mut out = Vec::with_capacity(len);
                        for i in 0..len {
                            out.push(interp.get_prop(&source, &i.to_string())?);
                        }
                        out
                    }
                    _ => Vec::new(),
                };
                let map_fn = arg(&args, 1);
                if map_fn.is_callable() {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.into_iter().enumerate() {
                        out.push(interp.call(&map_fn, Val::Undefined, vec![item, Val::Num(i as f64)])?);
                    }
                    return Ok(Val::array(out));
                }
                Ok(Val::array(items))
            }),
        ),
    ]);
    Val::native_with_props(
        "Array",
        |_, _, args| {
            if let [Val::Num(n)] = args.as_slice() {
                if *n < 0.0 || n.fract() != 0.0 || *n > 1e7 {
                    return range_error("Invalid array length");
                }
                return Ok(Val::array(vec![Val::Undefined; *n as usize]));
            }
            Ok(Val::array(args))
        },
        statics,
    )
}

pub fn string_ctor(_: &mut Interpreter) -> Val {
    let statics = props_with(vec![(
        "fromCharCode",
        Val::native("fromCharCode", |_, _, args| {
            Ok(Val::Str(
                args.iter()
                    .filter_map(|a| char::from_u32(a.to_number() as u32))
                    .collect(),
            ))
        }),
    )]);
    Val::native_with_props(
        "String",
        |_, _, args| {
            Ok(match args.first() {
                Some(v) => Val::Str(v.to_js_string()),
                None => Val::str(""),
            })
        },
        statics,
    )
}

pub fn number_ctor(_: &mut Interpreter) -> Val {
    let statics = props_with(vec![
        ("MAX_SAFE_INTEGER", Val::Num(9_007_199_254_740_991.0)),
        ("MIN_SAFE_INTEGER", Val::Num(-9_007_199_254_740_991.0)),
        ("EPSILON", Val::Num(f64::EPSILON)),
        ("MAX_VALUE", Val::Num(f64::MAX)),
        ("POSITIVE_INFINITY", Val::Num(f64::INFINITY)),
        ("NEGATIVE_INFINITY", Val::Num(f64::NEG_INFINITY)),
        ("NaN", Val::Num(f64::NAN)),
        (
            "isInteger",
            Val::native("isInteger", |_, _, args| {
                Ok(Val::Bool(
                    matches!(arg(&args, 0), Val::Num(n) if n.is_finite() && n.fract() == 0.0),
                ))
            }),
        ),
        (
            "isSafeInteger",
            Val::native("isSafeInteger", |_, _, args| {
                Ok(Val::Bool(matches!(arg(&args, 0), Val::Num(n)
                    if n.is_finite() && n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0)))
            }),
        ),
        (
            "isFinite",
            Val::native("isFinite", |_, _, args| {
                Ok(Val::Bool(matches!(arg(&args, 0), Val::Num(n) if n.is_finite())))
            }),
        ),
        (
            "isNaN",
            Val::native("isNaN", |_, _, args| {
                Ok(Val::Bool(matches!(arg(&args, 0), Val::Num(n) if n.is_nan())))
            }),
        ),
        ("parseFloat", parse_float_native()),
        ("parseInt", parse_int_native()),
    ]);
    Val::native_with_props(
        "Number",
        |_, _, args| {
            Ok(Val::Num(match args.first() {
                Some(v) => v.to_number(),
                None => 0.0,
            }))
        },
        statics,
    )
}

pub fn boolean_ctor(_: &mut Interpreter) -> Val {
    Val::native("Boolean", |_, _, args| Ok(Val::Bool(arg(&args, 0).is_truthy())))
}

pub fn error_ctor(_: &mut Interpreter) -> Val {
    Val::native(ERROR, |_, _, args| {
        let message = match arg(&args, 0) {
            Val::Undefined => String::new(),
            other => other.to_js_string(),
        };
        Ok(error_value(ERROR, message))
    })
}

pub fn regexp_ctor(_: &mut Interpreter) -> Val {
    Val::native("RegExp", |_, _, args| {
        let pattern = arg(&args, 0);
        let source = match &pattern {
            Val::RegExp(re) => re.source.clone(),
            Val::Undefined => String::new(),
            other => other.to_js_string(),
        };
        let flags = match (&pattern, arg(&args, 1)) {
            (Val::RegExp(re), Val::Undefined) => re.flags.clone(),
            (_, Val::Undefined) => String::new(),
            (_, flags) => flags.to_js_string(),
        };
        RegExpVal::compile(&source, &flags).map(Val::regexp)
    })
}

pub fn is_nan(_: &mut Interpreter) -> Val {
    Val::native("isNaN", |_, _, args| Ok(Val::Bool(arg(&args, 0).to_number().is_nan())))
}

pub fn parse_float(_: &mut Interpreter) -> Val {
    parse_float_native()
}

pub fn parse_int(_: &mut Interpreter) -> Val {
    parse_int_native()
}

fn parse_float_native() -> Val {
    Val::native("parseFloat", |_, _, args| {
        Ok(Val::Num(parse_float_prefix(&arg(&args, 0).to_js_string())))
    })
}

fn parse_int_native() -> Val {
    Val::native("parseInt", |_, _, args| {
        let radix = match arg(&args, 1) {
            Val::Undefined => 0,
            other => other.to_int32(),
        };
        Ok(Val::Num(parse_int_prefix(&arg(&args, 0).to_js_string(), radix)))
    })
}

fn parse_float_prefix(s: &str) -> f64 {
    let t = s.trim_start();
    let (sign, body) = match t.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, t.strip_prefix('+').unwrap_or(t)),
    };
    if body.starts_with("Infinity") {
        return sign * f64::INFINITY;
    }
    let bytes = body.as_bytes();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return f64::NAN;
    }
    // optional exponent
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }
    body[..end].parse::<f64>().map(|v| sign * v).unwrap_or(f64::NAN)
}

fn parse_int_prefix(s: &str, radix: i32) -> f64 {
    let t = s.trim_start();
    let (sign, mut body) = match t.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, t.strip_prefix('+').unwrap_or(t)),
    };
    let mut radix = radix as u32;
    if radix == 0 || radix == 16 {
        if let Some(rest) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
            body = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    let mut any = false;
    for c in body.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                value = value * radix as f64 + d as f64;
                any = true;
            }
            None => break,
        }
    }
    if any {
        sign * value
    } else {
        f64::NAN
    }
}

/* ===================== Prototype Methods ===================== */

type MethodTable = HashMap<String, Val>;

/// Per-interpreter prototype method tables
pub struct Protos {
    string: MethodTable,
    array: MethodTable,
    number: MethodTable,
    function: MethodTable,
    object: MethodTable,
    regexp: MethodTable,
}

impl Protos {
    pub fn new() -> Self {
        Self {
            string: string_methods(),
            array: array_methods(),
            number: number_methods(),
            function: function_methods(),
            object: object_methods(),
            regexp: regexp_methods(),
        }
    }

    fn find(table: &MethodTable, key: &str) -> Val {
        table.get(key).cloned().unwrap_or(Val::Undefined)
    }

    pub fn string_method(&self, key: &str) -> Val {
        Self::find(&self.string, key)
    }

    pub fn array_method(&self, key: &str) -> Val {
        Self::find(&self.array, key)
    }

    pub fn number_method(&self, key: &str) -> Val {
        Self::find(&self.number, key)
    }

    pub fn function_method(&self, key: &str) -> Val {
        Self::find(&self.function, key)
    }

    pub fn object_method(&self, key: &str) -> Val {
        Self::find(&self.object, key)
    }

    pub fn regexp_method(&self, key: &str) -> Val {
        Self::find(&self.regexp, key)
    }
}

impl Default for Protos {
    fn default() -> Self {
        Self::new()
    }
}

fn table(entries: Vec<Val>) -> MethodTable {
    let mut out = MethodTable::new();
    for v in entries {
        if let Val::Native(native) = &v {
            out.insert(native.name.clone(), v.clone());
        }
    }
    out
}

fn object_methods() -> MethodTable {
    table(vec![
        Val::native("hasOwnProperty", |interp, this, args| {
            let key = arg(&args, 0).to_property_key();
            Ok(Val::Bool(interp.own_keys(&this).contains(&key)))
        }),
        Val::native("toString", |_, this, _| Ok(Val::Str(this.to_js_string()))),
    ])
}

fn regexp_methods() -> MethodTable {
    table(vec![
        Val::native("test", |_, this, args| {
            let re = this_regexp(&this, "test")?;
            Ok(Val::Bool(re.exec(&arg(&args, 0).to_js_string()).is_some()))
        }),
        Val::native("exec", |_, this, args| {
            let re = this_regexp(&this, "exec")?;
            Ok(re
                .exec(&arg(&args, 0).to_js_string())
                .map(|found| match_array(&found))
                .unwrap_or(Val::Null))
        }),
        Val::native("toString", |_, this, _| Ok(Val::Str(this.to_js_string()))),
    ])
}

fn function_methods() -> MethodTable {
    table(vec![
        Val::native("call", |interp, this, args| {
            let mut args = args.into_iter();
            let receiver = args.next().unwrap_or(Val::Undefined);
            interp.call(&this, receiver, args.collect())
        }),
        Val::native("apply", |interp, this, args| {
            let receiver = arg(&args, 0);
            let list = match arg(&args, 1) {
                v if v.is_nullish() => Vec::new(),
                v => interp.iterate(&v)?,
            };
            interp.call(&this, receiver, list)
        }),
        Val::native("bind", |_, this, args| {
            let mut args = args.into_iter();
            let receiver = args.next().unwrap_or(Val::Undefined);
            let bound: Vec<Val> = args.collect();
            let target = this.clone();
            let name = format!("bound {}", target.component_name());
            Ok(Val::native(&name, move |interp, _, more| {
                let mut all = bound.clone();
                all.extend(more);
                interp.call(&target, receiver.clone(), all)
            }))
        }),
        Val::native("toString", |_, this, _| Ok(Val::Str(this.to_js_string()))),
    ])
}

fn number_methods() -> MethodTable {
    table(vec![
        Val::native("toFixed", |_, this, args| {
            let n = this.to_number();
            let digits = to_usize(&arg(&args, 0), 0);
            if digits > 100 {
                return range_error("toFixed() digits argument must be between 0 and 100");
            }
            if !n.is_finite() || n.abs() >= 1e21 {
                return Ok(Val::Str(format_number(n)));
            }
            Ok(Val::Str(format!("{:.*}", digits, n)))
        }),
        Val::native("toString", |_, this, args| {
            let n = this.to_number();
            let radix = to_usize(&arg(&args, 0), 10);
            if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
                return Ok(Val::Str(format_number(n)));
            }
            if !(2..=36).contains(&radix) {
                return range_error("toString() radix must be between 2 and 36");
            }
            let mut value = n.abs() as u64;
            let mut digits = Vec::new();
            loop {
                let d = (value % radix as u64) as u32;
                digits.push(char::from_digit(d, radix as u32).unwrap_or('0'));
                value /= radix as u64;
                if value == 0 {
                    break;
                }
            }
            if n < 0.0 {
                digits.push('-');
            }
            Ok(Val::Str(digits.into_iter().rev().collect()))
        }),
        Val::native("toLocaleString", |_, this, _| {
            Ok(Val::Str(locale_format(this.to_number())))
        }),
        Val::native("valueOf", |_, this, _| Ok(Val::Num(this.to_number()))),
    ])
}

/// en-US grouping with at most three fraction digits
fn locale_format(n: f64) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let rounded = (n * 1000.0).round() / 1000.0;
    let text = format_number(rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text.clone(), None),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if rounded < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

fn string_methods() -> MethodTable {
    table(vec![
        Val::native("charAt", |_, this, args| {
            let s = this_string(&this);
            let i = to_usize(&arg(&args, 0), 0);
            Ok(Val::Str(s.chars().nth(i).map(|c| c.to_string()).unwrap_or_default()))
        }),
        Val::native("charCodeAt", |_, this, args| {
            let s = this_string(&this);
            let i = to_usize(&arg(&args, 0), 0);
            Ok(Val::Num(s.chars().nth(i).map(|c| c as u32 as f64).unwrap_or(f64::NAN)))
        }),
        Val::native("at", |_, this, args| {
            let chars: Vec<char> = this_string(&this).chars().collect();
            let n = arg(&args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let i = if n < 0.0 { chars.len() as f64 + n } else { n };
            if i < 0.0 {
                return Ok(Val::Undefined);
            }
            Ok(chars
                .get(i as usize)
                .map(|c| Val::Str(c.to_string()))
                .unwrap_or(Val::Undefined))
        }),
        Val::native("indexOf", |_, this, args| {
            let s = this_string(&this);
            let needle = arg(&args, 0).to_js_string();
            let from = to_usize(&arg(&args, 1), 0);
            Ok(Val::Num(
                char_index_of(&s, &needle, from).map(|i| i as f64).unwrap_or(-1.0),
            ))
        }),
        Val::native("lastIndexOf", |_, this, args| {
            let s = this_string(&this);
            let needle = arg(&args, 0).to_js_string();
            let found = s.rfind(&needle).map(|byte| s[..byte].chars().count() as f64);
            Ok(Val::Num(found.unwrap_or(-1.0)))
        }),
        Val::native("includes", |_, this, args| {
            let s = this_string(&this);
            Ok(Val::Bool(s.contains(&arg(&args, 0).to_js_string())))
        }),
        Val::native("startsWith", |_, this, args| {
            let s = this_string(&this);
            Ok(Val::Bool(s.starts_with(&arg(&args, 0).to_js_string())))
        }),
        Val::native("endsWith", |_, this, args| {
            let s = this_string(&this);
            Ok(Val::Bool(s.ends_with(&arg(&args, 0).to_js_string())))
        }),
        Val::native("slice", |_, this, args| {
            let chars: Vec<char> = this_string(&this).chars().collect();
            let start = relative_index(&arg(&args, 0), chars.len(), 0);
            let end = relative_index(&arg(&args, 1), chars.len(), chars.len());
            Ok(Val::Str(if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            }))
        }),
        Val::native("substring", |_, this, args| {
            let chars: Vec<char> = this_string(&this).chars().collect();
            let a = to_usize(&arg(&args, 0), 0).min(chars.len());
            let b = to_usize(&arg(&args, 1), chars.len()).min(chars.len());
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Ok(Val::Str(chars[start..end].iter().collect()))
        }),
        Val::native("toUpperCase", |_, this, _| Ok(Val::Str(this_string(&this).to_uppercase()))),
        Val::native("toLowerCase", |_, this, _| Ok(Val::Str(this_string(&this).to_lowercase()))),
        Val::native("trim", |_, this, _| Ok(Val::str(this_string(&this).trim()))),
        Val::native("trimStart", |_, this, _| Ok(Val::str(this_string(&this).trim_start()))),
        Val::native("trimEnd", |_, this, _| Ok(Val::str(this_string(&this).trim_end()))),
        Val::native("split", |_, this, args| {
            let s = this_string(&this);
            let limit = to_usize(&arg(&args, 1), usize::MAX);
            let parts: Vec<Val> = match arg(&args, 0) {
                Val::Undefined => vec![Val::Str(s)],
                Val::RegExp(re) => re.split(&s).iter().map(optional_str).collect(),
                sep => {
                    let sep = sep.to_js_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Val::Str(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Val::str).collect()
                    }
                }
            };
            Ok(Val::array(parts.into_iter().take(limit).collect()))
        }),
        Val::native("replace", |interp, this, args| {
            replace_impl(interp, &this_string(&this), &args, false)
        }),
        Val::native("replaceAll", |interp, this, args| {
            replace_impl(interp, &this_string(&this), &args, true)
        }),
        Val::native("match", |_, this, args| {
            let s = this_string(&this);
            let re = to_regexp(&arg(&args, 0), "")?;
            if !re.global() {
                return Ok(re.exec(&s).map(|found| match_array(&found)).unwrap_or(Val::Null));
            }
            re.last_index.set(0);
            let found = re.match_all(&s);
            if found.is_empty() {
                return Ok(Val::Null);
            }
            Ok(Val::array(found.into_iter().map(|m| Val::Str(m.text)).collect()))
        }),
        Val::native("matchAll", |_, this, args| {
            let s = this_string(&this);
            let re = to_regexp(&arg(&args, 0), "g")?;
            if !re.global() {
                return type_error("String.prototype.matchAll called with a non-global RegExp argument");
            }
            Ok(Val::array(re.match_all(&s).iter().map(match_array).collect()))
        }),
        Val::native("search", |_, this, args| {
            let s = this_string(&this);
            let re = to_regexp(&arg(&args, 0), "")?;
            Ok(Val::Num(re.match_from(&s, 0).map_or(-1.0, |m| m.index as f64)))
        }),
        Val::native("repeat", |_, this, args| {
            let n = arg(&args, 0).to_number();
            if n < 0.0 || !n.is_finite() {
                return range_error(format!("Invalid count value: {}", format_number(n)));
            }
            let s = this_string(&this);
            if s.len().saturating_mul(n as usize) > 1 << 24 {
                return range_error("Invalid string length");
            }
            Ok(Val::Str(s.repeat(n as usize)))
        }),
        Val::native("padStart", |_, this, args| pad_impl(&this, &args, true)),
        Val::native("padEnd", |_, this, args| pad_impl(&this, &args, false)),
        Val::native("concat", |_, this, args| {
            let mut s = this_string(&this);
            for a in &args {
                s.push_str(&a.to_js_string());
            }
            Ok(Val::Str(s))
        }),
        Val::native("toString", |_, this, _| Ok(Val::Str(this_string(&this)))),
        Val::native("valueOf", |_, this, _| Ok(Val::Str(this_string(&this)))),
    ])
}

fn pad_impl(this: &Val, args: &[Val], start: bool) -> EvalResult {
    let s = this_string(this);
    let target = to_usize(&arg(args, 0), 0).min(1 << 20);
    let fill = match arg(args, 1) {
        Val::Undefined => " ".to_string(),
        other => other.to_js_string(),
    };
    let len = s.chars().count();
    if target <= len || fill.is_empty() {
        return Ok(Val::Str(s));
    }
    let padding: String = fill.chars().cycle().take(target - len).collect();
    Ok(Val::Str(if start {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }))
}

fn replace_impl(interp: &mut Interpreter, s: &str, args: &[Val], all: bool) -> EvalResult {
    let replacement = arg(args, 1);
    let matches = match arg(args, 0) {
        Val::RegExp(re) if re.global() => {
            re.last_index.set(0);
            re.match_all(s)
        }
        Val::RegExp(_) if all => {
            return type_error("replaceAll must be called with a global RegExp");
        }
        Val::RegExp(re) => re.exec(s).into_iter().collect(),
        pattern => literal_matches(s, &pattern.to_js_string(), all),
    };
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for found in &matches {
        out.push_str(&s[last..found.bytes.start]);
        let piece = if replacement.is_callable() {
            let mut call_args = vec![Val::str(&found.text)];
            call_args.extend(found.groups.iter().map(optional_str));
            call_args.push(Val::Num(found.index as f64));
            call_args.push(Val::str(s));
            if !found.named.is_empty() {
                let named = found
                    .named
                    .iter()
                    .map(|(name, value)| (name.clone(), optional_str(value)))
                    .collect();
                call_args.push(Val::object(named));
            }
            interp.call(&replacement, Val::Undefined, call_args)?.to_js_string()
        } else {
            expand_replacement(&replacement.to_js_string(), found, s)
        };
        out.push_str(&piece);
        last = found.bytes.end;
    }
    out.push_str(&s[last..]);
    Ok(Val::Str(out))
}

/// Substring hits of `pattern`; an empty pattern matches before every char and at the end
fn literal_matches(s: &str, pattern: &str, all: bool) -> Vec<RegExpMatch> {
    let ranges: Vec<Range<usize>> = if pattern.is_empty() {
        s.char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(s.len()))
            .map(|i| i..i)
            .collect()
    } else {
        s.match_indices(pattern).map(|(i, m)| i..i + m.len()).collect()
    };
    let limit = if all { usize::MAX } else { 1 };
    ranges
        .into_iter()
        .take(limit)
        .map(|bytes| RegExpMatch::literal(s, bytes))
        .collect()
}

fn array_methods() -> MethodTable {
    table(vec![
        Val::native("push", |_, this, args| {
            let items = this_array(&this, "push")?;
            let mut items = items.borrow_mut();
            items.extend(args);
            Ok(Val::Num(items.len() as f64))
        }),
        Val::native("pop", |_, this, _| {
            let items = this_array(&this, "pop")?;
            let popped = items.borrow_mut().pop();
            Ok(popped.unwrap_or(Val::Undefined))
        }),
        Val::native("shift", |_, this, _| {
            let items = this_array(&this, "shift")?;
            let mut items = items.borrow_mut();
            Ok(if items.is_empty() {
                Val::Undefined
            } else {
                items.remove(0)
            })
        }),
        Val::native("unshift", |_, this, args| {
            let items = this_array(&this, "unshift")?;
            let mut items = items.borrow_mut();
            for (i, v) in args.into_iter().enumerate() {
                items.insert(i, v);
            }
            Ok(Val::Num(items.len() as f64))
        }),
        Val::native("slice", |_, this, args| {
            let items = this_array(&this, "slice")?;
            let items = items.borrow();
            let start = relative_index(&arg(&args, 0), items.len(), 0);
            let end = relative_index(&arg(&args, 1), items.len(), items.len());
            Ok(Val::array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            }))
        }),
        Val::native("splice", |_, this, args| {
            let items = this_array(&this, "splice")?;
            let mut items = items.borrow_mut();
            let len = items.len();
            let start = relative_index(&arg(&args, 0), len, 0);
            let count = if args.len() < 2 {
                len - start
            } else {
                to_usize(&arg(&args, 1), 0).min(len - start)
            };
            let inserted: Vec<Val> = args.into_iter().skip(2).collect();
            let removed: Vec<Val> = items.splice(start..start + count, inserted).collect();
            Ok(Val::array(removed))
        }),
        Val::native("concat", |_, this, args| {
            let items = this_array(&this, "concat")?;
            let mut out = items.borrow().clone();
            for a in args {
                match a {
                    Val::Array(more) => out.extend(more.borrow().iter().cloned()),
                    other => out.push(other),
                }
            }
            Ok(Val::array(out))
        }),
        Val::native("join", |_, this, args| {
            let items = this_array(&this, "join")?;
            let sep = match arg(&args, 0) {
                Val::Undefined => ",".to_string(),
                other => other.to_js_string(),
            };
            let parts: Vec<String> = items
                .borrow()
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                .collect();
            Ok(Val::Str(parts.join(&sep)))
        }),
        Val::native("reverse", |_, this, _| {
            let items = this_array(&this, "reverse")?;
            items.borrow_mut().reverse();
            Ok(this.clone())
        }),
        Val::native("indexOf", |_, this, args| {
            let items = this_array(&this, "indexOf")?;
            let needle = arg(&args, 0);
            let found = items.borrow().iter().position(|v| v.strict_eq(&needle));
            Ok(Val::Num(found.map(|i| i as f64).unwrap_or(-1.0)))
        }),
        Val::native("lastIndexOf", |_, this, args| {
            let items = this_array(&this, "lastIndexOf")?;
            let needle = arg(&args, 0);
            let found = items.borrow().iter().rposition(|v| v.strict_eq(&needle));
            Ok(Val::Num(found.map(|i| i as f64).unwrap_or(-1.0)))
        }),
        Val::native("includes", |_, this, args| {
            let items = this_array(&this, "includes")?;
            let needle = arg(&args, 0);
            let found = items.borrow().iter().any(|v| v.same_value_zero(&needle));
            Ok(Val::Bool(found))
        }),
        Val::native("at", |_, this, args| {
            let items = this_array(&this, "at")?;
            let items = items.borrow();
            let n = arg(&args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let i = if n < 0.0 { items.len() as f64 + n } else { n };
            if i < 0.0 {
                return Ok(Val::Undefined);
            }
            Ok(items.get(i as usize).cloned().unwrap_or(Val::Undefined))
        }),
        Val::native("fill", |_, this, args| {
            let items = this_array(&this, "fill")?;
            {
                let mut items = items.borrow_mut();
                let len = items.len();
                let start = relative_index(&arg(&args, 1), len, 0);
                let end = relative_index(&arg(&args, 2), len, len);
                for slot in items.iter_mut().take(end).skip(start) {
                    *slot = arg(&args, 0);
                }
            }
            Ok(this.clone())
        }),
        Val::native("flat", |_, this, args| {
            let items = this_array(&this, "flat")?;
            let depth = to_usize(&arg(&args, 0), 1);
            let snapshot = items.borrow().clone();
            Ok(Val::array(flatten(snapshot, depth)))
        }),
        Val::native("keys", |_, this, _| {
            let items = this_array(&this, "keys")?;
            let len = items.borrow().len();
            Ok(Val::array((0..len).map(|i| Val::Num(i as f64)).collect()))
        }),
        Val::native("entries", |_, this, _| {
            let items = this_array(&this, "entries")?;
            let snapshot = items.borrow().clone();
            Ok(Val::array(
                snapshot
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| Val::array(vec![Val::Num(i as f64), v]))
                    .collect(),
            ))
        }),
        Val::native("map", |interp, this, args| {
            let items = this_array(&this, "map")?;
            let mut out = Vec::new();
            for_each_item(interp, &this, &items, &args, |_, _, result| {
                out.push(result);
                Ok(true)
            })?;
            Ok(Val::array(out))
        }),
        Val::native("filter", |interp, this, args| {
            let items = this_array(&this, "filter")?;
            let mut out = Vec::new();
            for_each_item(interp, &this, &items, &args, |item, _, result| {
                if result.is_truthy() {
                    out.push(item);
                }
                Ok(true)
            })?;
            Ok(Val::array(out))
        }),
        Val::native("forEach", |interp, this, args| {
            let items = this_array(&this, "forEach")?;
            for_each_item(interp, &this, &items, &args, |_, _, _| Ok(true))?;
            Ok(Val::Undefined)
        }),
        Val::native("find", |interp, this, args| {
            let items = this_array(&this, "find")?;
            let mut found = Val::Undefined;
            for_each_item(interp, &this, &items, &args, |item, _, result| {
                if result.is_truthy() {
                    found = item;
                    return Ok(false);
                }
                Ok(true)
            })?;
            Ok(found)
        }),
        Val::native("findIndex", |interp, this, args| {
            let items = this_array(&this, "findIndex")?;
            let mut found = -1.0;
            for_each_item(interp, &this, &items, &args, |_, i, result| {
                if result.is_truthy() {
                    found = i as f64;
                    return Ok(false);
                }
                Ok(true)
            })?;
            Ok(Val::Num(found))
        }),
        Val::native("some", |interp, this, args| {
            let items = this_array(&this, "some")?;
            let mut any = false;
            for_each_item(interp, &this, &items, &args, |_, _, result| {
                any = result.is_truthy();
                Ok(!any)
            })?;
            Ok(Val::Bool(any))
        }),
        Val::native("every", |interp, this, args| {
            let items = this_array(&this, "every")?;
            let mut all = true;
            for_each_item(interp, &this, &items, &args, |_, _, result| {
                all = result.is_truthy();
                Ok(all)
            })?;
            Ok(Val::Bool(all))
        }),
        Val::native("flatMap", |interp, this, args| {
            let items = this_array(&this, "flatMap")?;
            let mut out = Vec::new();
            for_each_item(interp, &this, &items, &args, |_, _, result| {
                match result {
                    Val::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                    other => out.push(other),
                }
                Ok(true)
            })?;
            Ok(Val::array(out))
        }),
        Val::native("reduce", |interp, this, args| {
            let items = this_array(&this, "reduce")?;
            reduce_impl(interp, &this, &items, &args, false)
        }),
        Val::native("reduceRight", |interp, this, args| {
            let items = this_array(&this, "reduceRight")?;
            reduce_impl(interp, &this, &items, &args, true)
        }),
        Val::native("sort", |interp, this, args| {
            let items = this_array(&this, "sort")?;
            let snapshot = items.borrow().clone();
            let compare = arg(&args, 0);
            let sorted = merge_sort(interp, snapshot, &compare)?;
            *items.borrow_mut() = sorted;
            Ok(this.clone())
        }),
        Val::native("toString", |_, this, _| Ok(Val::Str(this.to_js_string()))),
    ])
}

/// Call `args[0]` with `(item, index, array)` for each element; `visit`
/// returns `false` to stop early
fn for_each_item<F>(
    interp: &mut Interpreter,
    this: &Val,
    items: &ArrRef,
    args: &[Val],
    mut visit: F,
) -> Result<(), Control>
where
    F: FnMut(Val, usize, Val) -> Result<bool, Control>,
{
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return type_error(format!("{} is not a function", callback.inspect()));
    }
    let receiver = arg(args, 1);
    let len = items.borrow().len();
    for i in 0..len {
        let Some(item) = items.borrow().get(i).cloned() else {
            break;
        };
        let result = interp.call(
            &callback,
            receiver.clone(),
            vec![item.clone(), Val::Num(i as f64), this.clone()],
        )?;
        if !visit(item, i, result)? {
            break;
        }
    }
    Ok(())
}

fn reduce_impl(
    interp: &mut Interpreter,
    this: &Val,
    items: &ArrRef,
    args: &[Val],
    from_right: bool,
) -> EvalResult {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return type_error(format!("{} is not a function", callback.inspect()));
    }
    let snapshot = items.borrow().clone();
    let mut indices: Vec<usize> = (0..snapshot.len()).collect();
    if from_right {
        indices.reverse();
    }
    let mut iter = indices.into_iter();
    let mut acc = if args.len() >= 2 {
        arg(args, 1)
    } else {
        match iter.next() {
            Some(i) => snapshot[i].clone(),
            None => return type_error("Reduce of empty array with no initial value"),
        }
    };
    for i in iter {
        acc = interp.call(
            &callback,
            Val::Undefined,
            vec![acc, snapshot[i].clone(), Val::Num(i as f64), this.clone()],
        )?;
    }
    Ok(acc)
}

fn flatten(items: Vec<Val>, depth: usize) -> Vec<Val> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Val::Array(inner) if depth > 0 => {
                let inner = inner.borrow().clone();
                out.extend(grow_stack(|| flatten(inner, depth - 1)));
            }
            other => out.push(other),
        }
    }
    out
}

/// Stable merge sort with a fallible comparator
fn merge_sort(interp: &mut Interpreter, items: Vec<Val>, compare: &Val) -> Result<Vec<Val>, Control> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut right = items;
    let left = right.drain(..right.len() / 2).collect::<Vec<_>>();
    let left = merge_sort(interp, left, compare)?;
    let right = merge_sort(interp, right, compare)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (l.peek(), r.peek()) {
        let order = if compare.is_callable() {
            interp
                .call(compare, Val::Undefined, vec![a.clone(), b.clone()])?
                .to_number()
        } else {
            default_compare(a, b)
        };
        // take from the right only when strictly smaller
        if order > 0.0 {
            if let Some(v) = r.next() {
                out.push(v);
            }
        } else if let Some(v) = l.next() {
            out.push(v);
        }
    }
    out.extend(l);
    out.extend(r);
    Ok(out)
}

/// Default sort order: undefined last, otherwise by string form
fn default_compare(a: &Val, b: &Val) -> f64 {
    match (a, b) {
        (Val::Undefined, Val::Undefined) => 0.0,
        (Val::Undefined, _) => 1.0,
        (_, Val::Undefined) => -1.0,
        _ => match a.to_js_string().cmp(&b.to_js_string()) {
            std::cmp::Ordering::Less => -1.0,
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Greater => 1.0,
        },
    }
}
