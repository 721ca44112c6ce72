//! Legacy text-search patching
//!
//! Works on raw text without parsing, so it still does something when the
//! markup does not parse. It is lossy: the text edit hits the first matching
//! run after an opening tag with the addressed element's tag name, and the
//! style edit rewrites every `property: value` pair in the document.

use regex::Regex;

use super::PatchError;
use crate::path::StructuralAddress;
use crate::syntax::Span;
use crate::types::SourceDocument;

pub fn patch_text(
    doc: &SourceDocument,
    address: &StructuralAddress,
    text: &str,
) -> Result<SourceDocument, PatchError> {
    let tag = address
        .leaf_tag()
        .ok_or_else(|| PatchError::NotApplicable("empty address".to_string()))?;
    let pattern = format!(r"(?i)<{}\b[^>]*>\s*([^<>{{}}\s][^<>{{}}]*?)\s*<", regex::escape(tag));
    let re = Regex::new(&pattern).map_err(|e| PatchError::NotApplicable(e.to_string()))?;

    let group = re
        .captures(doc.text())
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| PatchError::NotApplicable(format!("no text run after <{}>", tag)))?;
    let span = Span::new(group.start(), group.end());
    Ok(doc.splice(span, &super::escape_text(text)))
}

pub fn patch_style(
    doc: &SourceDocument,
    property: &str,
    value: &str,
) -> Result<SourceDocument, PatchError> {
    let pattern = format!(r"\b{}:\s*[^;,}}]+", regex::escape(property));
    let re = Regex::new(&pattern).map_err(|e| PatchError::NotApplicable(e.to_string()))?;
    if !re.is_match(doc.text()) {
        return Err(PatchError::NotApplicable(format!(
            "no '{}:' declaration in source",
            property
        )));
    }
    let replacement = format!("{}: '{}'", property, value.replace('\'', "\\'"));
    let text = re.replace_all(doc.text(), regex::NoExpand(&replacement));
    Ok(SourceDocument::new(text.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_after_matching_tag() {
        let doc = SourceDocument::from("<div>\n  <h2>Hello</h2>\n  <p>Body</p>\n</div>");
        let address = "div[0] > p[0]".parse().unwrap();
        let next = patch_text(&doc, &address, "Changed").unwrap();
        assert_eq!(next.text(), "<div>\n  <h2>Hello</h2>\n  <p>Changed</p>\n</div>");
    }

    #[test]
    fn test_text_without_run_is_not_applicable() {
        let doc = SourceDocument::from("<div><p>{value}</p></div>");
        let address = "div[0] > p[0]".parse().unwrap();
        assert!(matches!(
            patch_text(&doc, &address, "x"),
            Err(PatchError::NotApplicable(_))
        ));
    }

    #[test]
    fn test_style_rewrites_every_declaration() {
        let doc = SourceDocument::from(
            "<a style={{ color: 'red' }}>a</a><b style={{color: \"blue\", margin: 0}}>b</b>",
        );
        let next = patch_style(&doc, "color", "green").unwrap();
        assert_eq!(
            next.text(),
            "<a style={{ color: 'green'}}>a</a><b style={{color: 'green', margin: 0}}>b</b>"
        );
    }

    #[test]
    fn test_style_missing_property() {
        let doc = SourceDocument::from("<a style={{ color: 'red' }}>a</a>");
        assert!(patch_style(&doc, "padding", "4px").is_err());
    }
}
