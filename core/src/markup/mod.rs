//! Syntax tree parser for the editing path
//!
//! Finds the markup a component returns and parses only that substring into a
//! [`SyntaxTree`]. Independent of the transpiler: a source that fails to
//! execute can still be edited as long as its markup parses.
//!
//! ```text
//! source ─► LocatorChain ─► Site ─► parse substring ─► SyntaxTree { base, markup, root }
//! ```

pub mod locate;
pub mod tree;

#[cfg(test)]
mod tests;

use thiserror::Error;
use tracing::debug;

use crate::syntax::ast::Expr;
use crate::syntax::{self, SyntaxError};
pub use locate::{LocatorChain, Site};
pub use tree::{Attribute, AttributeValue, ElementNode, SyntaxNode, SyntaxTree, TextNode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("NoReturnExpression: no returned markup expression found")]
    NoReturnExpression,
}

/// Parse the returned markup of `source` with the standard locator chain
pub fn parse(source: &str) -> Result<SyntaxTree, MarkupError> {
    parse_with(source, &LocatorChain::new())
}

pub fn parse_with(source: &str, chain: &LocatorChain) -> Result<SyntaxTree, MarkupError> {
    let (locator, site) = chain
        .locate(source)
        .ok_or(MarkupError::NoReturnExpression)?;

    let element = match site {
        Site::Span(span) => match syntax::parse_expression_range(source, span.start, span.end)? {
            Expr::Jsx(el) => *el,
            _ => return Err(MarkupError::NoReturnExpression),
        },
        Site::Start(start) => syntax::parse_markup_at(source, start)?,
    };
    let tree = SyntaxTree::from_element(source, &element);
    debug!(locator, base = tree.base, len = tree.markup.len(), "markup parsed");
    Ok(tree)
}
