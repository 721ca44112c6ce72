//! Editing-side view of a markup expression
//!
//! Unlike the AST, nodes here only keep what editing needs: tag names,
//! attribute spans and child order. All spans are relative to
//! [`SyntaxTree::markup`]; add [`SyntaxTree::base`] for document offsets.

use serde::Serialize;

use crate::syntax::ast::{JsxAttr, JsxAttrValue, JsxChild, JsxElement, JsxName};
use crate::syntax::{grow_stack, Span};
use crate::types::content_digest;

/* ===================== Nodes ===================== */

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeValue {
    /// `name="text"`; the span covers the quotes
    Literal { value: String, span: Span },
    /// `name={...}`; the span covers the braces, `code` is the text between them
    Expression { code: String, span: Span },
    /// `name` with no value
    Bare,
    /// `{...expr}`
    Spread { code: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    /// Empty for spreads
    pub name: String,
    pub value: AttributeValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextNode {
    pub span: Span,
    /// Exactly as written, whitespace included
    pub raw: String,
}

impl TextNode {
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Span of the text with surrounding whitespace excluded
    pub fn content_span(&self) -> Span {
        let leading = self.raw.len() - self.raw.trim_start().len();
        let trailing = self.raw.len() - self.raw.trim_end().len();
        Span::new(self.span.start + leading, self.span.end - trailing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementNode {
    /// Empty for fragments
    pub tag: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<SyntaxNode>,
    pub self_closing: bool,
    pub span: Span,
    /// `<tag ...>` including the angle brackets
    pub opening_span: Span,
    pub name_span: Span,
}

impl ElementNode {
    pub fn is_fragment(&self) -> bool {
        self.tag.is_empty()
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }

    /// First text child that is not only whitespace
    pub fn first_text(&self) -> Option<&TextNode> {
        self.children.iter().find_map(|child| match child {
            SyntaxNode::Text(text) if !text.is_blank() => Some(text),
            _ => None,
        })
    }

    pub fn elements(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(|child| match child {
            SyntaxNode::Element(el) => Some(el),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyntaxNode {
    Element(ElementNode),
    Text(TextNode),
    /// `{expr}` child; `code` is the text between the braces
    ExpressionSlot { span: Span, code: String },
}

/* ===================== Tree ===================== */

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntaxTree {
    /// Digest of the document the tree was parsed from
    pub digest: String,
    /// Byte offset of the markup inside the full document
    pub base: usize,
    /// The markup substring the spans index into
    pub markup: String,
    pub root: ElementNode,
}

impl SyntaxTree {
    /// Build from an element parsed out of `source`
    pub fn from_element(source: &str, element: &JsxElement) -> Self {
        let base = element.span.start;
        let markup = element.span.slice(source).to_string();
        let root = Builder {
            markup: &markup,
            base,
        }
        .element(element);
        Self {
            digest: content_digest(source),
            base,
            markup,
            root,
        }
    }

    /// Document offsets for a tree-relative span
    pub fn absolute(&self, span: Span) -> Span {
        span.offset(self.base)
    }

    pub fn slice(&self, span: Span) -> &str {
        span.slice(&self.markup)
    }
}

struct Builder<'a> {
    markup: &'a str,
    base: usize,
}

impl Builder<'_> {
    fn rel(&self, span: Span) -> Span {
        Span::new(span.start - self.base, span.end - self.base)
    }

    /// Text strictly inside a delimited span (`{...}`)
    fn inner(&self, span: Span) -> String {
        let span = self.rel(span);
        self.markup[span.start + 1..span.end - 1].trim().to_string()
    }

    fn element(&self, el: &JsxElement) -> ElementNode {
        grow_stack(|| self.element_node(el))
    }

    fn element_node(&self, el: &JsxElement) -> ElementNode {
        let tag = match &el.name {
            JsxName::Fragment => String::new(),
            name => name.as_str().to_string(),
        };
        ElementNode {
            tag,
            attrs: el.attrs.iter().map(|a| self.attribute(a)).collect(),
            children: el.children.iter().map(|c| self.child(c)).collect(),
            self_closing: el.self_closing,
            span: self.rel(el.span),
            opening_span: self.rel(el.opening_span),
            name_span: self.rel(el.name_span),
        }
    }

    fn attribute(&self, attr: &JsxAttr) -> Attribute {
        match attr {
            JsxAttr::Attr {
                name, value, span, ..
            } => {
                let value = match value {
                    None => AttributeValue::Bare,
                    Some(JsxAttrValue::Str { value, span }) => AttributeValue::Literal {
                        value: value.clone(),
                        span: self.rel(*span),
                    },
                    Some(JsxAttrValue::Expr { span, .. }) => AttributeValue::Expression {
                        code: self.inner(*span),
                        span: self.rel(*span),
                    },
                    Some(JsxAttrValue::Element(el)) => {
                        let span = self.rel(el.span);
                        AttributeValue::Expression {
                            code: span.slice(self.markup).to_string(),
                            span,
                        }
                    }
                };
                Attribute {
                    name: name.clone(),
                    value,
                    span: self.rel(*span),
                }
            }
            JsxAttr::Spread { span, .. } => {
                let code = self.inner(*span);
                Attribute {
                    name: String::new(),
                    value: AttributeValue::Spread {
                        code: code.trim_start_matches("...").trim().to_string(),
                    },
                    span: self.rel(*span),
                }
            }
        }
    }

    fn child(&self, child: &JsxChild) -> SyntaxNode {
        match child {
            JsxChild::Text { raw, span } => SyntaxNode::Text(TextNode {
                span: self.rel(*span),
                raw: raw.clone(),
            }),
            JsxChild::Expr { span, .. } => SyntaxNode::ExpressionSlot {
                span: self.rel(*span),
                code: self.inner(*span),
            },
            JsxChild::Element(el) => SyntaxNode::Element(self.element(el)),
        }
    }
}
