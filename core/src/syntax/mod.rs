//! Syntax front end for component source
//!
//! A hand-written lexer and recursive-descent parser for the JavaScript subset
//! components are written in, including markup literals and erased TypeScript
//! annotations. Both the transpiler (execution path) and the markup tree
//! builder (editing path) start from the AST produced here.

pub mod ast;
pub mod lexer;
pub mod parser;

#[cfg(test)]
mod tests;

use serde::Serialize;
use thiserror::Error;

pub use ast::{offset_to_line_col, Program, Span};
pub use parser::Parser;

/// Deepest nesting of expressions, statements, markup or types accepted
pub const MAX_NESTING: usize = 512;

const RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Run `f`, moving onto a fresh stack segment when the current one runs low
///
/// Every recursive walk over the AST, the markup tree or the rendered DOM goes
/// through here.
pub fn grow_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, f)
}

/* ===================== Error Types ===================== */

/// Malformed source, positioned by byte offset and 1-based line/column
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("SyntaxError: {message} ({line}:{column})")]
pub struct SyntaxError {
    pub message: String,
    /// Byte offset into the parsed document
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = offset_to_line_col(source, offset);
        Self {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

/* ===================== Entry Points ===================== */

/// Parse a whole module
pub fn parse_module(source: &str) -> Result<Program, SyntaxError> {
    Parser::new(source)?.parse_program()
}

/// Parse `source[start..end]` as one expression; spans stay absolute
pub fn parse_expression_range(
    source: &str,
    start: usize,
    end: usize,
) -> Result<ast::Expr, SyntaxError> {
    Parser::with_range(source, start, end)?.parse_standalone_expression()
}

/// Parse the element opening at `start`; trailing source is not examined
pub fn parse_markup_at(source: &str, start: usize) -> Result<ast::JsxElement, SyntaxError> {
    Parser::with_range(source, start, source.len())?.parse_markup_at(start)
}
