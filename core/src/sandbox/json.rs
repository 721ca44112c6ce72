//! `JSON.stringify` / `JSON.parse` over serde_json

use serde::Serialize;
use serde_json::{Map, Number, Value};

use super::errors::{throw, type_error, Control, EvalResult, SYNTAX_ERROR};
use super::values::{Props, Val};

const MAX_DEPTH: usize = 64;

/// Convert to JSON; `None` for values JSON omits (undefined, functions, symbols)
pub fn to_json(value: &Val) -> Result<Option<Value>, Control> {
    to_json_at(value, 0)
}

fn to_json_at(value: &Val, depth: usize) -> Result<Option<Value>, Control> {
    if depth > MAX_DEPTH {
        return type_error("Converting circular structure to JSON");
    }
    Ok(Some(match value {
        Val::Undefined
        | Val::Symbol(_)
        | Val::Function(_)
        | Val::Class(_)
        | Val::Native(_) => return Ok(None),
        Val::Null => Value::Null,
        Val::Bool(b) => Value::Bool(*b),
        Val::Num(n) => number_to_json(*n),
        Val::Str(s) => Value::String(s.clone()),
        Val::Array(items) => {
            let items = items.borrow();
            let mut out = Vec::with_capacity(items.len());
            for item in items.iter() {
                out.push(to_json_at(item, depth + 1)?.unwrap_or(Value::Null));
            }
            Value::Array(out)
        }
        Val::Object(obj) => {
            let obj = obj.borrow();
            let mut out = Map::new();
            for (k, v) in &obj.props {
                if let Some(v) = to_json_at(v, depth + 1)? {
                    out.insert(k.clone(), v);
                }
            }
            Value::Object(out)
        }
        Val::RegExp(_) => Value::Object(Map::new()),
        Val::Element(el) => {
            let mut out = Map::new();
            out.insert("type".into(), Value::String(el.kind.component_name()));
            out.insert(
                "key".into(),
                el.key.clone().map(Value::String).unwrap_or(Value::Null),
            );
            let props = to_json_at(&Val::Object(el.props.clone()), depth + 1)?;
            out.insert("props".into(), props.unwrap_or(Value::Null));
            Value::Object(out)
        }
    }))
}

fn number_to_json(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

pub fn from_json(value: &Value) -> Val {
    match value {
        Value::Null => Val::Null,
        Value::Bool(b) => Val::Bool(*b),
        Value::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => Val::Str(s.clone()),
        Value::Array(items) => Val::array(items.iter().map(from_json).collect()),
        Value::Object(map) => {
            let mut props = Props::new();
            for (k, v) in map {
                props.insert(k.clone(), from_json(v));
            }
            Val::object(props)
        }
    }
}

/// `JSON.stringify(value, replacer, space)`; replacers are not supported
pub fn stringify(value: &Val, space: &Val) -> EvalResult {
    let Some(json) = to_json(value)? else {
        return Ok(Val::Undefined);
    };
    let indent = match space {
        Val::Num(n) if *n >= 1.0 => " ".repeat((*n as usize).min(10)),
        Val::Str(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        return Ok(Val::Str(json.to_string()));
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if let Err(err) = json.serialize(&mut ser) {
        return type_error(err.to_string());
    }
    match String::from_utf8(buf) {
        Ok(text) => Ok(Val::Str(text)),
        Err(err) => type_error(err.to_string()),
    }
}

pub fn parse(text: &str) -> EvalResult {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(from_json(&value)),
        Err(err) => throw(SYNTAX_ERROR, format!("JSON.parse: {}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn test_stringify_omits_functions_and_keeps_integers() {
        let mut props = Props::new();
        props.insert("a".into(), Val::Num(1.0));
        props.insert("b".into(), Val::native("f", |_, _, _| Ok(Val::Undefined)));
        props.insert("c".into(), Val::array(vec![Val::Undefined, Val::Num(1.5)]));
        let out = stringify(&Val::object(props), &Val::Undefined).unwrap();
        assert_eq!(out, Val::str(r#"{"a":1,"c":[null,1.5]}"#));
    }

    #[test]
    fn test_parse_round_trips_objects_in_order() {
        let value = parse(r#"{"z": 1, "a": [true, null, "x"]}"#).unwrap();
        let Val::Object(obj) = &value else {
            panic!("Expected object, got {:?}", value);
        };
        let keys: Vec<String> = obj.borrow().props.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);

        let expected = hashmap! { "z" => "1" };
        for (k, v) in expected {
            assert_eq!(obj.borrow().props[k].to_js_string(), v);
        }
    }

    #[test]
    fn test_parse_error_is_syntax_error() {
        let Err(Control::Throw(err)) = parse("{oops") else {
            panic!("Expected throw");
        };
        assert!(err.to_js_string().starts_with("SyntaxError: JSON.parse"));
    }

    #[test]
    fn test_stringify_with_indent() {
        let value = parse(r#"{"a":[1]}"#).unwrap();
        let out = stringify(&value, &Val::Num(2.0)).unwrap();
        assert_eq!(out, Val::str("{\n  \"a\": [\n    1\n  ]\n}"));
    }
}
