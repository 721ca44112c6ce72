//! Source patcher
//!
//! Pure functions from `(document, address, edit)` to a new document. The
//! structural strategy re-parses the returned markup, resolves the address and
//! replaces exactly one span:
//!
//! ```text
//! Edit::Text   ─► first non-blank text child, surrounding whitespace kept
//! Edit::Style  ─► value of style={...}, or ` style={{...}}` after the tag name
//! ```
//!
//! The `patch_*` entry points never fail: on any error they log and return
//! the input unchanged. Use the `try_*` variants to see why.

pub mod heuristic;
pub mod style;

#[cfg(test)]
mod tests;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::markup::{self, AttributeValue, MarkupError};
use crate::path::{self, PathError, StructuralAddress};
use crate::syntax::Span;
use crate::types::SourceDocument;
pub use style::StyleMap;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error(transparent)]
    NotFound(#[from] PathError),

    #[error("PatchNotApplicable: {0}")]
    NotApplicable(String),

    #[error(transparent)]
    Markup(#[from] MarkupError),
}

/* ===================== Edits ===================== */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Span based, through the syntax tree
    #[default]
    Structural,
    /// Regex text search; lossy
    Heuristic,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Structural => "structural",
            Strategy::Heuristic => "heuristic",
        })
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structural" => Ok(Strategy::Structural),
            "heuristic" => Ok(Strategy::Heuristic),
            other => Err(format!(
                "unknown patch strategy '{}' (expected structural or heuristic)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Text(String),
    Style { property: String, value: String },
}

/* ===================== Entry Points ===================== */

pub fn try_apply(
    doc: &SourceDocument,
    address: &StructuralAddress,
    edit: &Edit,
    strategy: Strategy,
) -> Result<SourceDocument, PatchError> {
    match (strategy, edit) {
        (Strategy::Structural, Edit::Text(text)) => structural_text(doc, address, text),
        (Strategy::Structural, Edit::Style { property, value }) => {
            structural_style(doc, address, property, value)
        }
        (Strategy::Heuristic, Edit::Text(text)) => heuristic::patch_text(doc, address, text),
        (Strategy::Heuristic, Edit::Style { property, value }) => {
            heuristic::patch_style(doc, property, value)
        }
    }
}

/// Apply `edit`, or return `doc` unchanged when it cannot be applied
pub fn apply(
    doc: &SourceDocument,
    address: &StructuralAddress,
    edit: &Edit,
    strategy: Strategy,
) -> SourceDocument {
    match try_apply(doc, address, edit, strategy) {
        Ok(next) => next,
        Err(e) => {
            warn!(%address, %strategy, error = %e, "edit not applied");
            doc.clone()
        }
    }
}

pub fn try_patch_text(
    doc: &SourceDocument,
    address: &StructuralAddress,
    text: &str,
) -> Result<SourceDocument, PatchError> {
    structural_text(doc, address, text)
}

pub fn try_patch_style(
    doc: &SourceDocument,
    address: &StructuralAddress,
    property: &str,
    value: &str,
) -> Result<SourceDocument, PatchError> {
    structural_style(doc, address, property, value)
}

pub fn patch_text(doc: &SourceDocument, address: &StructuralAddress, text: &str) -> SourceDocument {
    apply(doc, address, &Edit::Text(text.to_string()), Strategy::Structural)
}

pub fn patch_style(
    doc: &SourceDocument,
    address: &StructuralAddress,
    property: &str,
    value: &str,
) -> SourceDocument {
    let edit = Edit::Style {
        property: property.to_string(),
        value: value.to_string(),
    };
    apply(doc, address, &edit, Strategy::Structural)
}

/* ===================== Structural ===================== */

fn structural_text(
    doc: &SourceDocument,
    address: &StructuralAddress,
    text: &str,
) -> Result<SourceDocument, PatchError> {
    let tree = markup::parse(doc.text())?;
    let element = path::resolve(address, &tree)?;
    let run = element
        .first_text()
        .ok_or_else(|| PatchError::NotApplicable(format!("<{}> has no text child", element.tag)))?;

    let span = tree.absolute(run.content_span());
    debug!(%address, start = span.start, end = span.end, "patching text");
    Ok(doc.splice(span, &escape_text(text)))
}

fn structural_style(
    doc: &SourceDocument,
    address: &StructuralAddress,
    property: &str,
    value: &str,
) -> Result<SourceDocument, PatchError> {
    if property.trim().is_empty() {
        return Err(PatchError::NotApplicable("empty style property".to_string()));
    }
    let tree = markup::parse(doc.text())?;
    let element = path::resolve(address, &tree)?;

    let (span, replacement) = match element.attr("style") {
        Some(attr) => match &attr.value {
            AttributeValue::Expression { span, .. } => {
                let outer = tree.absolute(*span);
                let inner = Span::new(outer.start + 1, outer.end - 1);
                let mut map = StyleMap::from_expression(doc.text(), inner)
                    .map_err(MarkupError::from)?;
                map.upsert(property, value);
                (outer, map.serialize())
            }
            AttributeValue::Literal { value: css, span } => {
                let mut map = StyleMap::from_css(css);
                map.upsert(property, value);
                (tree.absolute(*span), map.serialize())
            }
            AttributeValue::Bare | AttributeValue::Spread { .. } => {
                let mut map = StyleMap::new();
                map.upsert(property, value);
                (tree.absolute(attr.span), format!("style={}", map.serialize()))
            }
        },
        None => {
            let mut map = StyleMap::new();
            map.upsert(property, value);
            let at = tree.absolute(element.name_span).end;
            (Span::new(at, at), format!(" style={}", map.serialize()))
        }
    };
    debug!(%address, property, start = span.start, end = span.end, "patching style");
    Ok(doc.splice(span, &replacement))
}

/// Keep new text a plain text run
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
