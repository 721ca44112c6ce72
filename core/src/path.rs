//! Structural addresses between the rendered DOM and the syntax tree
//!
//! An address is the root-to-leaf list of `{tag, index}` steps where `index`
//! counts preceding siblings with the same tag. The same address is computed
//! on the DOM side ([`address_of`]) and followed on the source side
//! ([`resolve`]):
//!
//! ```text
//! <div>                    div[0]
//!   <p>a</p>               div[0] > p[0]
//!   <span/>                div[0] > span[0]
//!   <p>b</p>    ◄────────  div[0] > p[1]
//! </div>
//! ```
//!
//! Fragments never render, so they are transparent on the source side.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::markup::{ElementNode, SyntaxTree};
use crate::render::dom::{Dom, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("NotFound: no element at {0}")]
    NotFound(String),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("node {0} is not inside the render root")]
    OutsideRoot(NodeId),

    #[error("invalid address '{0}': expected steps like div[0] > p[1]")]
    InvalidAddress(String),

    /// The address was taken from an older version of the document
    #[error("Stale: address belongs to document {found}, current document is {current}")]
    Stale { found: String, current: String },
}

impl PathError {
    pub fn stale(found: &str, current: &str) -> Self {
        let short = |digest: &str| digest.chars().take(12).collect::<String>();
        PathError::Stale {
            found: short(found),
            current: short(current),
        }
    }
}

/* ===================== Address ===================== */

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub tag: String,
    pub index: usize,
}

impl Step {
    pub fn new(tag: impl Into<String>, index: usize) -> Self {
        Self {
            tag: tag.into(),
            index,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuralAddress(pub Vec<Step>);

impl StructuralAddress {
    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tag of the addressed element
    pub fn leaf_tag(&self) -> Option<&str> {
        self.0.last().map(|s| s.tag.as_str())
    }
}

impl fmt::Display for StructuralAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{}[{}]", step.tag, step.index)?;
        }
        Ok(())
    }
}

impl FromStr for StructuralAddress {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PathError::InvalidAddress(s.to_string());
        if s.trim().is_empty() {
            return Err(invalid());
        }
        let mut steps = Vec::new();
        for part in s.split('>') {
            let part = part.trim();
            let (tag, rest) = part.split_once('[').ok_or_else(invalid)?;
            let index = rest.strip_suffix(']').ok_or_else(invalid)?;
            let tag = tag.trim();
            let valid = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
            if tag.is_empty() || !tag.chars().all(valid) {
                return Err(invalid());
            }
            let index = index.trim().parse::<usize>().map_err(|_| invalid())?;
            steps.push(Step::new(tag, index));
        }
        Ok(Self(steps))
    }
}

/* ===================== DOM Side ===================== */

/// Address of `node` relative to `root`
pub fn address_of(dom: &Dom, node: NodeId, root: NodeId) -> Result<StructuralAddress, PathError> {
    if dom.tag(node).is_none() {
        return Err(PathError::NotAnElement(node));
    }
    let mut steps = Vec::new();
    let mut current = node;
    while current != root {
        let tag = dom.tag(current).ok_or(PathError::OutsideRoot(node))?;
        let parent = dom.parent(current).ok_or(PathError::OutsideRoot(node))?;
        let index = dom
            .children(parent)
            .iter()
            .take_while(|sibling| **sibling != current)
            .filter(|sibling| dom.tag(**sibling).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
            .count();
        steps.push(Step::new(tag, index));
        current = parent;
    }
    steps.reverse();
    Ok(StructuralAddress(steps))
}

/* ===================== Source Side ===================== */

/// Follow `address` from the tree's root element
pub fn resolve<'t>(
    address: &StructuralAddress,
    tree: &'t SyntaxTree,
) -> Result<&'t ElementNode, PathError> {
    let not_found = || PathError::NotFound(address.to_string());
    let mut candidates = Vec::new();
    splice(&tree.root, &mut candidates);

    let mut found = None;
    for step in address.steps() {
        let next = candidates
            .iter()
            .copied()
            .filter(|el| el.tag.eq_ignore_ascii_case(&step.tag))
            .nth(step.index)
            .ok_or_else(not_found)?;
        candidates.clear();
        for child in next.elements() {
            splice(child, &mut candidates);
        }
        found = Some(next);
    }
    found.ok_or_else(not_found)
}

/// Push `el`, or a fragment's element children in its place
fn splice<'t>(el: &'t ElementNode, out: &mut Vec<&'t ElementNode>) {
    if el.is_fragment() {
        for child in el.elements() {
            splice(child, out);
        }
    } else {
        out.push(el);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup;

    fn sample_dom() -> (Dom, NodeId, NodeId) {
        let mut dom = Dom::new();
        let div = dom.append_element(dom.root(), "div", Vec::new());
        dom.append_element(div, "p", Vec::new());
        dom.append_element(div, "span", Vec::new());
        let second_p = dom.append_element(div, "p", Vec::new());
        let text = dom.append_text(second_p, "b");
        (dom, second_p, text)
    }

    #[test]
    fn test_address_counts_same_tag_siblings() {
        let (dom, second_p, _) = sample_dom();
        let address = address_of(&dom, second_p, dom.root()).unwrap();
        assert_eq!(address.to_string(), "div[0] > p[1]");
        assert_eq!(address.leaf_tag(), Some("p"));
    }

    #[test]
    fn test_address_of_text_node_is_rejected() {
        let (dom, _, text) = sample_dom();
        assert_eq!(
            address_of(&dom, text, dom.root()),
            Err(PathError::NotAnElement(text))
        );
    }

    #[test]
    fn test_address_outside_root() {
        let (dom, second_p, _) = sample_dom();
        let div = dom.find_by_tag("div")[0];
        let span = dom.find_by_tag("span")[0];
        assert_eq!(
            address_of(&dom, div, span),
            Err(PathError::OutsideRoot(div))
        );
        assert_eq!(address_of(&dom, second_p, div).unwrap().to_string(), "p[1]");
    }

    #[test]
    fn test_text_form_round_trip() {
        let address: StructuralAddress = " div[0] >h2[3]> my-el[1]".parse().unwrap();
        assert_eq!(
            address.steps(),
            &[Step::new("div", 0), Step::new("h2", 3), Step::new("my-el", 1)]
        );
        assert_eq!(address.to_string(), "div[0] > h2[3] > my-el[1]");
        assert_eq!(address.to_string().parse::<StructuralAddress>().unwrap(), address);

        for bad in ["", "div", "div[x]", "div[0] >", "[0]"] {
            assert!(bad.parse::<StructuralAddress>().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_resolve_matches_dom_address() {
        let (dom, second_p, _) = sample_dom();
        let tree = markup::parse("const A = () => <div><p>a</p><span/><p>b</p></div>;").unwrap();
        let address = address_of(&dom, second_p, dom.root()).unwrap();
        let node = resolve(&address, &tree).unwrap();
        assert_eq!(tree.slice(node.span), "<p>b</p>");
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let tree = markup::parse("const A = () => <DIV><P>x</P></DIV>;").unwrap();
        let address: StructuralAddress = "div[0] > p[0]".parse().unwrap();
        assert_eq!(resolve(&address, &tree).unwrap().tag, "P");
    }

    #[test]
    fn test_fragments_are_transparent() {
        let src = "const A = () => <>\n  <h1>a</h1>\n  <>\n    <h1>b</h1>\n  </>\n</>;";
        let tree = markup::parse(src).unwrap();
        let address: StructuralAddress = "h1[1]".parse().unwrap();
        let node = resolve(&address, &tree).unwrap();
        assert_eq!(tree.slice(node.span), "<h1>b</h1>");
    }

    #[test]
    fn test_resolve_mismatch_is_not_found() {
        let tree = markup::parse("const A = () => <div><p>a</p></div>;").unwrap();
        for address in ["div[0] > p[1]", "section[0]", "div[0] > p[0] > b[0]"] {
            let address: StructuralAddress = address.parse().unwrap();
            assert_eq!(
                resolve(&address, &tree),
                Err(PathError::NotFound(address.to_string()))
            );
        }
        assert!(resolve(&StructuralAddress::default(), &tree).is_err());
    }
}
