//! Inline style maps
//!
//! A `style` attribute is read into an ordered list of entries. Entries with a
//! plain string value are editable; anything else (numbers, variables, spreads,
//! computed keys) is carried through as source text.

use crate::syntax::ast::{Expr, ObjProp, PropKey};
use crate::syntax::{self, Span, SyntaxError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleEntry {
    Literal { property: String, value: String },
    /// Source text of a non-editable entry; `property` is set when it has a plain key
    Verbatim {
        property: Option<String>,
        code: String,
    },
}

impl StyleEntry {
    fn property(&self) -> Option<&str> {
        match self {
            StyleEntry::Literal { property, .. } => Some(property),
            StyleEntry::Verbatim { property, .. } => property.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleMap {
    entries: Vec<StyleEntry>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[StyleEntry] {
        &self.entries
    }

    /// Read the expression inside `style={...}`; `inner` excludes the braces
    pub fn from_expression(source: &str, inner: Span) -> Result<Self, SyntaxError> {
        let expr = syntax::parse_expression_range(source, inner.start, inner.end)?;
        let Expr::Object { props, .. } = expr.unparen() else {
            let code = inner.slice(source).trim();
            return Ok(Self {
                entries: vec![StyleEntry::Verbatim {
                    property: None,
                    code: format!("...{}", code),
                }],
            });
        };

        let entries = props
            .iter()
            .map(|prop| match prop {
                ObjProp::KeyValue {
                    key, value, span, ..
                } => {
                    let property = plain_key(key);
                    match (&property, literal_value(value)) {
                        (Some(property), Some(value)) => StyleEntry::Literal {
                            property: property.clone(),
                            value,
                        },
                        _ => StyleEntry::Verbatim {
                            property,
                            code: span.slice(source).to_string(),
                        },
                    }
                }
                ObjProp::Method { key, span, .. } => StyleEntry::Verbatim {
                    property: plain_key(key),
                    code: span.slice(source).to_string(),
                },
                ObjProp::Spread { span, .. } => StyleEntry::Verbatim {
                    property: None,
                    code: span.slice(source).to_string(),
                },
            })
            .collect();
        Ok(Self { entries })
    }

    /// Read a CSS declaration list (`color: red; font-size: 12px`)
    pub fn from_css(css: &str) -> Self {
        let entries = css
            .split(';')
            .filter_map(|decl| {
                let (property, value) = decl.split_once(':')?;
                let property = property.trim();
                (!property.is_empty()).then(|| StyleEntry::Literal {
                    property: camel_case(property),
                    value: value.trim().to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    /// Lookup ignores entry order
    pub fn get(&self, property: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry {
            StyleEntry::Literal { property: p, value } if p == property => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set `property`, replacing an existing entry in place or appending
    pub fn upsert(&mut self, property: &str, value: &str) {
        let entry = StyleEntry::Literal {
            property: property.to_string(),
            value: value.to_string(),
        };
        match self.entries.iter().position(|e| e.property() == Some(property)) {
            Some(i) => {
                self.entries[i] = entry;
                // later duplicates would override the new value at runtime
                let mut seen = false;
                self.entries.retain(|e| {
                    if e.property() != Some(property) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.entries.push(entry),
        }
    }

    /// `{{property: 'value', ...}}`, the attribute value with both brace levels
    pub fn serialize(&self) -> String {
        let body = self
            .entries
            .iter()
            .map(|entry| match entry {
                StyleEntry::Literal { property, value } => {
                    format!("{}: '{}'", key_text(property), escape_single(value))
                }
                StyleEntry::Verbatim { code, .. } => code.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{{{}}}}}", body)
    }
}

fn plain_key(key: &PropKey) -> Option<String> {
    match key {
        PropKey::Ident(name) | PropKey::Str(name) => Some(name.clone()),
        PropKey::Num(_) | PropKey::Computed(_) => None,
    }
}

fn literal_value(value: &Expr) -> Option<String> {
    match value.unparen() {
        Expr::Str { v, .. } => Some(v.clone()),
        Expr::Template { quasis, exprs, .. } if exprs.is_empty() => {
            Some(quasis.concat())
        }
        _ => None,
    }
}

fn key_text(property: &str) -> String {
    let is_ident = property
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && property
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_ident {
        property.to_string()
    } else {
        format!("'{}'", escape_single(property))
    }
}

/// Body of a single-quoted string literal; line terminators and control
/// characters become escapes so the literal stays on one line
fn escape_single(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' | '\u{2029}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// `font-size` -> `fontSize`
pub fn camel_case(property: &str) -> String {
    let mut out = String::with_capacity(property.len());
    let mut upper = false;
    for c in property.chars() {
        if c == '-' {
            upper = !out.is_empty();
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_attr(code: &str) -> StyleMap {
        StyleMap::from_expression(code, Span::new(0, code.len())).unwrap()
    }

    #[test]
    fn test_literal_and_verbatim_entries() {
        let map = from_attr("{ color: \"red\", padding: 8, ...base, 'font-size': `12px` }");
        assert_eq!(map.get("color"), Some("red"));
        assert_eq!(map.get("font-size"), Some("12px"));
        assert_eq!(map.get("padding"), None);
        assert_eq!(
            map.serialize(),
            "{{color: 'red', padding: 8, ...base, 'font-size': '12px'}}"
        );
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut map = from_attr("{ color: 'red', padding: 8, margin: 0 }");
        map.upsert("padding", "12px");
        assert_eq!(map.serialize(), "{{color: 'red', padding: '12px', margin: 0}}");
        map.upsert("fontSize", "14px");
        assert_eq!(map.get("fontSize"), Some("14px"));
        assert_eq!(map.entries().len(), 4);
    }

    #[test]
    fn test_upsert_collapses_duplicates() {
        let mut map = from_attr("{ color: 'red', color: 'blue' }");
        map.upsert("color", "green");
        assert_eq!(map.serialize(), "{{color: 'green'}}");
    }

    #[test]
    fn test_non_object_style_becomes_spread() {
        let mut map = from_attr("styles.card");
        map.upsert("color", "red");
        assert_eq!(map.serialize(), "{{...styles.card, color: 'red'}}");
    }

    #[test]
    fn test_css_text_and_quoting() {
        let mut map = StyleMap::from_css("color: red; font-size: 12px;");
        map.upsert("fontFamily", "'Inter'");
        assert_eq!(
            map.serialize(),
            "{{color: 'red', fontSize: '12px', fontFamily: '\\'Inter\\''}}"
        );
        assert_eq!(camel_case("-webkit-line-clamp"), "webkitLineClamp");
    }
}
