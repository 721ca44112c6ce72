//! Rendered DOM arena

use std::fmt::Write as _;

use serde::Serialize;

pub type NodeId = usize;

/// Elements with no closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// The container the component renders into
    Root,
    Element {
        tag: String,
        /// Attributes in prop order; `style` holds serialized CSS
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena of nodes; node 0 is the root container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dom {
    nodes: Vec<Node>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.push(
            parent,
            NodeKind::Element {
                tag: tag.to_string(),
                attrs,
            },
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(
            parent,
            NodeKind::Text {
                text: text.to_string(),
            },
        )
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Tag of an element node
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Concatenated text of `id` and its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for node in std::iter::once(id).chain(self.descendants(id)) {
            if let Some(Node {
                kind: NodeKind::Text { text },
                ..
            }) = self.nodes.get(node)
            {
                out.push_str(text);
            }
        }
    }

    /// Every node in document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Elements with `tag`, in document order
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.tag(*id).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    /// First element whose text content equals `text`, innermost match wins
    pub fn find_by_text(&self, text: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .rev()
            .find(|id| self.tag(*id).is_some() && self.text_content(*id) == text)
    }

    /* ===================== Serialization ===================== */

    /// HTML of everything under the root
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root()) {
            self.write_html(*child, &mut out);
        }
        out
    }

    /// Outer HTML of one node
    pub fn html_of(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        crate::syntax::grow_stack(|| self.write_node(id, out))
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Root => {
                for child in &node.children {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Text { text } => out.push_str(&escape_text(text)),
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    if value.is_empty() && name != "class" && name != "style" && name != "value" {
                        let _ = write!(out, " {}", name);
                    } else {
                        let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
                    }
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &node.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{}>", tag);
            }
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Dom, NodeId, NodeId) {
        let mut dom = Dom::new();
        let div = dom.append_element(dom.root(), "div", vec![("class".into(), "p-4".into())]);
        let h2 = dom.append_element(div, "h2", Vec::new());
        dom.append_text(h2, "a < b & c");
        dom.append_element(div, "br", Vec::new());
        let button = dom.append_element(div, "button", vec![("disabled".into(), String::new())]);
        dom.append_text(button, "Go");
        (dom, h2, button)
    }

    #[test]
    fn test_to_html_escapes_and_closes() {
        let (dom, _, _) = sample();
        assert_eq!(
            dom.to_html(),
            "<div class=\"p-4\"><h2>a &lt; b &amp; c</h2><br><button disabled>Go</button></div>"
        );
    }

    #[test]
    fn test_navigation_helpers() {
        let (dom, h2, button) = sample();
        assert_eq!(dom.tag(h2), Some("h2"));
        assert_eq!(dom.parent(h2), dom.parent(button));
        assert_eq!(dom.find_by_tag("H2"), vec![h2]);
        assert_eq!(dom.find_by_text("Go"), Some(button));
        assert_eq!(dom.attr(button, "disabled"), Some(""));
        assert_eq!(dom.text_content(dom.root()), "a < b & cGo");
    }
}
