//! Recursive-descent parser for component source
//!
//! Builds the span-carrying AST from [`super::ast`]. TypeScript surface syntax
//! (annotations, `interface`/`type` declarations, `as`/`satisfies`, non-null
//! `!`, generic call arguments) is consumed and discarded here, so later
//! stages never see it.
//!
//! Arrow functions and generic calls are recognised by speculative parsing:
//! the parser snapshots its position, tries the longer reading, and rewinds on
//! failure.

use std::ops::ControlFlow;
use std::rc::Rc;

use super::ast::*;
use super::lexer::{Lexer, Tok, Token};
use super::{grow_stack, SyntaxError, MAX_NESTING};

type PResult<T> = Result<T, SyntaxError>;

/// Words that can never be used as identifier references
const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "export", "extends", "finally", "for", "function", "if", "import", "in",
    "instanceof", "new", "return", "super", "switch", "this", "throw", "try", "typeof", "var",
    "void", "while", "with", "let", "true", "false", "null",
];

/// Class member modifiers that only matter to the type checker
const TS_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "readonly", "override", "abstract", "declare",
];

/// Punctuation that may appear inside generic arguments
const TYPE_PUNCT: &[&str] = &[".", ",", "|", "&", "?", ":", "=>", "=", "-"];

fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

#[derive(Clone)]
struct Snapshot {
    pos: usize,
    tok: Token,
    prev_end: usize,
    peak: usize,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    src: &'a str,
    tok: Token,
    prev_end: usize,
    /// Disallow the `in` operator (for-loop heads)
    no_in: bool,
    /// Current recursion level
    depth: usize,
    /// Deepest level reached by what was parsed since the last measurement
    /// began, counting left-leaning operator and member chains
    peak: usize,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> PResult<Self> {
        Self::with_range(src, 0, src.len())
    }

    /// Parse only `src[start..end]`; spans stay absolute
    pub fn with_range(src: &'a str, start: usize, end: usize) -> PResult<Self> {
        let mut lexer = Lexer::with_range(src, start, end);
        let tok = lexer.next_token()?;
        Ok(Self {
            lexer,
            src,
            tok,
            prev_end: start,
            no_in: false,
            depth: 0,
            peak: 0,
        })
    }

    /* ===================== Token helpers ===================== */

    fn advance(&mut self) -> PResult<Token> {
        let next = self.lexer.next_token()?;
        let prev = std::mem::replace(&mut self.tok, next);
        self.prev_end = prev.span.end;
        Ok(prev)
    }

    /// Re-lex the lookahead from the lexer's current position
    fn sync(&mut self) -> PResult<()> {
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            pos: self.lexer.pos,
            tok: self.tok.clone(),
            prev_end: self.prev_end,
            peak: self.peak,
        }
    }

    fn restore(&mut self, snap: Snapshot) {
        self.lexer.pos = snap.pos;
        self.tok = snap.tok;
        self.prev_end = snap.prev_end;
        self.peak = snap.peak;
    }

    fn peek(&mut self) -> PResult<Token> {
        let snap = self.snapshot();
        self.advance()?;
        let tok = self.tok.clone();
        self.restore(snap);
        Ok(tok)
    }

    fn at_punct(&self, p: &str) -> bool {
        self.tok.is_punct(p)
    }

    fn at_ident(&self, name: &str) -> bool {
        self.tok.is_ident(name)
    }

    fn at_eof(&self) -> bool {
        self.tok.tok == Tok::Eof
    }

    fn eat_punct(&mut self, p: &str) -> PResult<bool> {
        if self.at_punct(p) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn eat_ident(&mut self, name: &str) -> PResult<bool> {
        if self.at_ident(name) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect_punct(&mut self, p: &str) -> PResult<Span> {
        if self.at_punct(p) {
            return Ok(self.advance()?.span);
        }
        Err(self.error_here(format!("Expected '{}' but found {}", p, self.describe())))
    }

    fn expect_ident_name(&mut self) -> PResult<(String, Span)> {
        match &self.tok.tok {
            Tok::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                let span = self.advance()?.span;
                Ok((name, span))
            }
            _ => Err(self.error_here(format!("Expected identifier but found {}", self.describe()))),
        }
    }

    /// Any word, reserved or not (property names)
    fn expect_property_name(&mut self) -> PResult<String> {
        match &self.tok.tok {
            Tok::Ident(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.error_here(format!("Expected property name but found {}", self.describe()))),
        }
    }

    fn describe(&self) -> String {
        match &self.tok.tok {
            Tok::Eof => "end of input".to_string(),
            _ => format!("'{}'", self.tok.span.slice(self.src)),
        }
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> SyntaxError {
        SyntaxError::at(self.src, offset, message)
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        self.error_at(self.tok.span.start, message)
    }

    fn unexpected(&self) -> SyntaxError {
        match self.tok.tok {
            Tok::Eof => self.error_here("Unexpected end of input"),
            _ => self.error_here(format!("Unexpected token {}", self.describe())),
        }
    }

    /// Explicit `;` or an automatically inserted one
    fn consume_semicolon(&mut self) -> PResult<()> {
        if self.eat_punct(";")? {
            return Ok(());
        }
        if self.at_punct("}") || self.at_eof() || self.tok.nl_before {
            return Ok(());
        }
        Err(self.unexpected())
    }

    /// Run `f` with the `in` operator re-enabled
    fn allow_in<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let saved = std::mem::replace(&mut self.no_in, false);
        let result = f(self);
        self.no_in = saved;
        result
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    /* ===================== Nesting ===================== */

    fn too_deep(&self) -> SyntaxError {
        self.error_here(format!("Nesting too deep (limit {})", MAX_NESTING))
    }

    /// Run `f` one recursion level deeper
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.too_deep());
        }
        self.depth += 1;
        self.peak = self.peak.max(self.depth);
        let result = grow_stack(|| f(self));
        self.depth -= 1;
        result
    }

    /// Run `f` and report how many levels the tree it parsed adds below the current one
    fn measured<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<(T, usize)> {
        let outer = std::mem::replace(&mut self.peak, self.depth);
        let result = f(self);
        let height = self.peak.saturating_sub(self.depth);
        self.peak = self.peak.max(outer);
        Ok((result?, height))
    }

    /// Height of a node built over children at most `height` levels tall
    fn fold(&mut self, height: usize) -> PResult<usize> {
        let height = height + 1;
        if self.depth + height > MAX_NESTING {
            return Err(self.too_deep());
        }
        self.peak = self.peak.max(self.depth + height);
        Ok(height)
    }

    /* ===================== Program ===================== */

    pub fn parse_program(&mut self) -> PResult<Program> {
        let start = self.prev_end;
        let mut body = Vec::new();
        while !self.at_eof() {
            body.push(self.parse_statement(true)?);
        }
        Ok(Program {
            body,
            span: Span::new(start, self.lexer.end()),
        })
    }

    /// Parse a single expression that must span the whole range
    pub fn parse_standalone_expression(&mut self) -> PResult<Expr> {
        let expr = self.parse_expression()?;
        if !self.at_eof() {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    /// Parse one element whose `<` sits at `start`, ignoring what follows it
    pub fn parse_markup_at(&mut self, start: usize) -> PResult<JsxElement> {
        if self.src.as_bytes().get(start) != Some(&b'<') {
            return Err(self.error_at(start, "Expected '<' to open markup"));
        }
        self.parse_jsx_at(start)
    }

    /* ===================== Statements ===================== */

    fn parse_statement(&mut self, top_level: bool) -> PResult<Stmt> {
        self.nested(|p| p.parse_statement_inner(top_level))
    }

    fn parse_statement_inner(&mut self, top_level: bool) -> PResult<Stmt> {
        let start = self.tok.span.start;
        if let Tok::Punct(p) = self.tok.tok {
            match p {
                "{" => {
                    let body = self.parse_block()?;
                    return Ok(Stmt::Block {
                        body,
                        span: self.span_from(start),
                    });
                }
                ";" => {
                    self.advance()?;
                    return Ok(Stmt::Empty {
                        span: self.span_from(start),
                    });
                }
                _ => {}
            }
        }

        let keyword = match &self.tok.tok {
            Tok::Ident(name) => Some(name.clone()),
            _ => None,
        };
        if let Some(kw) = keyword.as_deref() {
            match kw {
                "var" | "let" | "const" => {
                    let (kind, decls) = self.parse_var_decl(true)?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::VarDecl {
                        kind,
                        decls,
                        span: self.span_from(start),
                    });
                }
                "function" => {
                    let func = self.parse_function(true)?;
                    return Ok(Stmt::Function {
                        func: Rc::new(func),
                        span: self.span_from(start),
                    });
                }
                "class" => {
                    let class = self.parse_class(true)?;
                    return Ok(Stmt::Class {
                        class: Rc::new(class),
                        span: self.span_from(start),
                    });
                }
                "if" => return self.parse_if(),
                "for" => return self.parse_for(),
                "while" => {
                    self.advance()?;
                    let test = self.parse_paren_expression()?;
                    let body = Box::new(self.parse_statement(false)?);
                    return Ok(Stmt::While {
                        test,
                        body,
                        span: self.span_from(start),
                    });
                }
                "do" => {
                    self.advance()?;
                    let body = Box::new(self.parse_statement(false)?);
                    if !self.eat_ident("while")? {
                        return Err(self.error_here("Expected 'while' after do body"));
                    }
                    let test = self.parse_paren_expression()?;
                    self.eat_punct(";")?;
                    return Ok(Stmt::DoWhile {
                        body,
                        test,
                        span: self.span_from(start),
                    });
                }
                "return" => {
                    self.advance()?;
                    let value = if self.at_punct(";")
                        || self.at_punct("}")
                        || self.at_eof()
                        || self.tok.nl_before
                    {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    self.consume_semicolon()?;
                    return Ok(Stmt::Return {
                        value,
                        span: self.span_from(start),
                    });
                }
                "break" | "continue" => {
                    self.advance()?;
                    if matches!(self.tok.tok, Tok::Ident(_)) && !self.tok.nl_before {
                        return Err(self.error_here("Labelled statements are not supported"));
                    }
                    self.consume_semicolon()?;
                    let span = self.span_from(start);
                    return Ok(if kw == "break" {
                        Stmt::Break { span }
                    } else {
                        Stmt::Continue { span }
                    });
                }
                "throw" => {
                    self.advance()?;
                    if self.tok.nl_before {
                        return Err(self.error_here("Illegal newline after throw"));
                    }
                    let value = self.parse_expression()?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::Throw {
                        value,
                        span: self.span_from(start),
                    });
                }
                "try" => return self.parse_try(),
                "switch" => return self.parse_switch(),
                "import" if top_level => return self.parse_import(),
                "export" if top_level => return self.parse_export(),
                "import" | "export" => {
                    return Err(self.error_here(format!("'{}' is only allowed at the top level", kw)))
                }
                "async" => {
                    let next = self.peek()?;
                    if next.is_ident("function") && !next.nl_before {
                        return Err(self.error_here("Async functions are not supported"));
                    }
                }
                "interface" | "type" | "enum" | "declare" => {
                    let next = self.peek()?;
                    if matches!(next.tok, Tok::Ident(_)) && !next.nl_before {
                        return self.parse_type_declaration(start);
                    }
                }
                "debugger" => {
                    self.advance()?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::Empty {
                        span: self.span_from(start),
                    });
                }
                "with" => return Err(self.error_here("'with' statements are not supported")),
                _ => {
                    if !is_reserved(kw) && self.peek()?.is_punct(":") {
                        return Err(self.error_here("Labelled statements are not supported"));
                    }
                }
            }
        }

        let expr = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr {
            expr,
            span: self.span_from(start),
        })
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.at_punct("}") {
            if self.at_eof() {
                return Err(self.error_here("Expected '}' but found end of input"));
            }
            body.push(self.parse_statement(false)?);
        }
        self.advance()?;
        Ok(body)
    }

    fn parse_paren_expression(&mut self) -> PResult<Expr> {
        self.expect_punct("(")?;
        let expr = self.allow_in(|p| p.parse_expression())?;
        self.expect_punct(")")?;
        Ok(expr)
    }

    fn parse_var_kind(&mut self) -> PResult<VarKind> {
        let kind = match &self.tok.tok {
            Tok::Ident(k) if k == "var" => VarKind::Var,
            Tok::Ident(k) if k == "let" => VarKind::Let,
            Tok::Ident(k) if k == "const" => VarKind::Const,
            _ => return Err(self.unexpected()),
        };
        self.advance()?;
        Ok(kind)
    }

    fn parse_var_decl(&mut self, require_const_init: bool) -> PResult<(VarKind, Vec<Declarator>)> {
        let kind = self.parse_var_kind()?;
        let mut decls = Vec::new();
        loop {
            let start = self.tok.span.start;
            let target = self.parse_binding_target()?;
            decls.push(self.parse_declarator_rest(kind, target, start, require_const_init)?);
            if !self.eat_punct(",")? {
                break;
            }
        }
        Ok((kind, decls))
    }

    fn parse_declarator_rest(
        &mut self,
        kind: VarKind,
        target: Pattern,
        start: usize,
        require_const_init: bool,
    ) -> PResult<Declarator> {
        self.eat_punct("!")?;
        if self.eat_punct(":")? {
            self.skip_type()?;
        }
        let init = if self.eat_punct("=")? {
            Some(self.parse_assign()?)
        } else {
            None
        };
        if init.is_none() && require_const_init {
            if kind == VarKind::Const {
                return Err(self.error_at(start, "Missing initializer in const declaration"));
            }
            if !matches!(target, Pattern::Ident { .. }) {
                return Err(self.error_at(start, "Missing initializer in destructuring declaration"));
            }
        }
        Ok(Declarator {
            target,
            init,
            span: self.span_from(start),
        })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let start = self.advance()?.span.start;
        let test = self.parse_paren_expression()?;
        let then_s = Box::new(self.parse_statement(false)?);
        let else_s = if self.eat_ident("else")? {
            Some(Box::new(self.parse_statement(false)?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            then_s,
            else_s,
            span: self.span_from(start),
        })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let start = self.advance()?.span.start;
        if self.at_ident("await") {
            return Err(self.error_here("'for await' is not supported"));
        }
        self.expect_punct("(")?;

        let mut init = None;
        if self.at_ident("var") || self.at_ident("let") || self.at_ident("const") {
            let kind = self.parse_var_kind()?;
            let target_start = self.tok.span.start;
            let target = self.parse_binding_target()?;
            if let Some(loop_kind) = self.for_each_kind() {
                self.advance()?;
                return self.finish_for_each(start, loop_kind, Some(kind), target);
            }
            self.no_in = true;
            let first = self.parse_declarator_rest(kind, target, target_start, false);
            self.no_in = false;
            let mut decls = vec![first?];
            while self.eat_punct(",")? {
                let decl_start = self.tok.span.start;
                let target = self.parse_binding_target()?;
                decls.push(self.parse_declarator_rest(kind, target, decl_start, false)?);
            }
            init = Some(Box::new(ForInit::VarDecl { kind, decls }));
        } else if !self.at_punct(";") {
            self.no_in = true;
            let expr = self.parse_expression();
            self.no_in = false;
            let expr = expr?;
            if let Some(loop_kind) = self.for_each_kind() {
                self.advance()?;
                let target = self.expr_to_pattern(expr)?;
                return self.finish_for_each(start, loop_kind, None, target);
            }
            init = Some(Box::new(ForInit::Expr(expr)));
        }

        self.expect_punct(";")?;
        let test = if self.at_punct(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.at_punct(")") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement(false)?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
            span: self.span_from(start),
        })
    }

    fn for_each_kind(&self) -> Option<ForLoopKind> {
        if self.at_ident("of") {
            Some(ForLoopKind::Of)
        } else if self.at_ident("in") {
            Some(ForLoopKind::In)
        } else {
            None
        }
    }

    fn finish_for_each(
        &mut self,
        start: usize,
        kind: ForLoopKind,
        decl: Option<VarKind>,
        target: Pattern,
    ) -> PResult<Stmt> {
        let iterable = match kind {
            ForLoopKind::Of => self.parse_assign()?,
            ForLoopKind::In => self.parse_expression()?,
        };
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement(false)?);
        Ok(Stmt::ForEach {
            kind,
            decl,
            target,
            iterable,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let start = self.advance()?.span.start;
        let block = self.parse_block()?;
        let mut handler = None;
        if self.eat_ident("catch")? {
            let param = if self.eat_punct("(")? {
                let param = self.parse_binding_target()?;
                if self.eat_punct(":")? {
                    self.skip_type()?;
                }
                self.expect_punct(")")?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block()?;
            handler = Some(CatchClause { param, body });
        }
        let finalizer = if self.eat_ident("finally")? {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error_here("Missing catch or finally after try"));
        }
        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
            span: self.span_from(start),
        })
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        let start = self.advance()?.span.start;
        let discriminant = self.parse_paren_expression()?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        while !self.eat_punct("}")? {
            let test = if self.eat_ident("case")? {
                Some(self.parse_expression()?)
            } else if self.eat_ident("default")? {
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect_punct(":")?;
            let mut body = Vec::new();
            while !self.at_ident("case") && !self.at_ident("default") && !self.at_punct("}") {
                if self.at_eof() {
                    return Err(self.unexpected());
                }
                body.push(self.parse_statement(false)?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(Stmt::Switch {
            discriminant,
            cases,
            span: self.span_from(start),
        })
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        let start = self.advance()?.span.start;
        if self.at_punct("(") || self.at_punct(".") {
            return Err(self.error_at(start, "Dynamic import is not supported"));
        }
        let source = loop {
            match &self.tok.tok {
                Tok::Str(s) => {
                    let s = s.clone();
                    self.advance()?;
                    break s;
                }
                Tok::Eof => return Err(self.error_here("Expected module source in import")),
                _ => {
                    self.advance()?;
                }
            }
        };
        self.consume_semicolon()?;
        Ok(Stmt::Import {
            source,
            span: self.span_from(start),
        })
    }

    fn parse_export(&mut self) -> PResult<Stmt> {
        let start = self.advance()?.span.start;

        if self.eat_ident("default")? {
            if self.at_ident("async") {
                return Err(self.error_here("Async functions are not supported"));
            }
            let decl = if self.at_ident("function") {
                ExportDefault::Function(Rc::new(self.parse_function(false)?))
            } else if self.at_ident("class") {
                ExportDefault::Class(Rc::new(self.parse_class(false)?))
            } else if self.at_ident("interface") {
                self.parse_type_declaration(start)?;
                return Ok(Stmt::Empty {
                    span: self.span_from(start),
                });
            } else {
                let expr = self.parse_assign()?;
                self.consume_semicolon()?;
                ExportDefault::Expr(expr)
            };
            return Ok(Stmt::ExportDefault {
                decl,
                span: self.span_from(start),
            });
        }

        if self.at_punct("{") || self.at_punct("*") {
            // export { a, b as c } [from '...'] / export * from '...'
            while !self.at_eof() {
                if self.eat_punct("}")? || self.at_punct(";") || self.tok.nl_before {
                    break;
                }
                self.advance()?;
            }
            if self.eat_ident("from")? {
                self.advance()?;
            }
            self.consume_semicolon()?;
            return Ok(Stmt::ExportNamed {
                decl: None,
                span: self.span_from(start),
            });
        }

        if self.at_ident("type") && self.peek()?.is_punct("{") {
            // export type { A, B }
            self.advance()?;
            self.skip_balanced("{", "}")?;
            if self.eat_ident("from")? {
                self.advance()?;
            }
            self.consume_semicolon()?;
            return Ok(Stmt::Empty {
                span: self.span_from(start),
            });
        }
        if self.at_ident("type") || self.at_ident("interface") || self.at_ident("enum") {
            return self.parse_type_declaration(start);
        }

        let decl = self.parse_statement(false)?;
        match decl {
            Stmt::VarDecl { .. } | Stmt::Function { .. } | Stmt::Class { .. } => {}
            Stmt::Empty { .. } => return Ok(decl),
            _ => return Err(self.error_at(decl.span().start, "Expected declaration after export")),
        }
        Ok(Stmt::ExportNamed {
            decl: Some(Box::new(decl)),
            span: self.span_from(start),
        })
    }

    /// `interface`, `type` and `declare` declarations erase to nothing
    fn parse_type_declaration(&mut self, start: usize) -> PResult<Stmt> {
        if self.at_ident("enum") {
            return Err(self.error_here("Enums are not supported"));
        }
        if self.eat_ident("declare")? {
            // declare const x: T; / declare function f(): T;
            while !self.at_eof() && !self.at_punct(";") && !self.tok.nl_before {
                if self.at_punct("{") {
                    self.skip_balanced("{", "}")?;
                } else {
                    self.advance()?;
                }
            }
            self.consume_semicolon()?;
        } else if self.eat_ident("interface")? {
            self.expect_ident_name()?;
            if self.at_punct("<") {
                self.skip_type_args()?;
            }
            while !self.at_punct("{") {
                if self.at_eof() {
                    return Err(self.unexpected());
                }
                self.advance()?;
            }
            self.skip_balanced("{", "}")?;
        } else {
            self.advance()?; // type
            self.expect_ident_name()?;
            if self.at_punct("<") {
                self.skip_type_args()?;
            }
            self.expect_punct("=")?;
            self.skip_type()?;
            self.consume_semicolon()?;
        }
        Ok(Stmt::Empty {
            span: self.span_from(start),
        })
    }

    /* ===================== Functions & Classes ===================== */

    /// `function name(params) { body }`; the name is required for declarations
    fn parse_function(&mut self, require_name: bool) -> PResult<Function> {
        let start = self.advance()?.span.start;
        if self.at_punct("*") {
            return Err(self.error_here("Generator functions are not supported"));
        }
        let name = if matches!(self.tok.tok, Tok::Ident(_)) {
            Some(self.expect_ident_name()?.0)
        } else if require_name {
            return Err(self.error_here("Function declarations require a name"));
        } else {
            None
        };
        self.parse_function_rest(name, start)
    }

    fn parse_function_rest(&mut self, name: Option<String>, start: usize) -> PResult<Function> {
        if self.at_punct("<") {
            self.skip_type_args()?;
        }
        let params = self.parse_params()?;
        if self.eat_punct(":")? {
            self.skip_type()?;
        }
        let body_start = self.tok.span.start;
        let body = self.allow_in(|p| p.parse_block())?;
        Ok(Function {
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            span: self.span_from(start),
            body_span: self.span_from(body_start),
        })
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")")? {
            params.push(self.parse_param()?);
            if !self.at_punct(")") {
                self.expect_punct(",")?;
            }
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> PResult<Param> {
        if TS_MODIFIERS.iter().any(|m| self.at_ident(m)) {
            let next = self.peek()?;
            if matches!(next.tok, Tok::Ident(_)) || next.is_punct("{") || next.is_punct("[") {
                self.advance()?;
            }
        }
        let rest = self.eat_punct("...")?;
        let start = self.tok.span.start;
        let mut pattern = self.parse_binding_target()?;
        self.eat_punct("?")?;
        if self.eat_punct(":")? {
            self.skip_type()?;
        }
        if self.eat_punct("=")? {
            let default = self.parse_assign()?;
            pattern = Pattern::Default {
                target: Box::new(pattern),
                default: Box::new(default),
                span: self.span_from(start),
            };
        }
        Ok(Param { pattern, rest })
    }

    fn parse_arrow_body(&mut self, params: Vec<Param>, start: usize) -> PResult<Expr> {
        let body_start = self.tok.span.start;
        let body = self.allow_in(|p| {
            if p.at_punct("{") {
                p.parse_block().map(FunctionBody::Block)
            } else {
                p.parse_assign().map(|e| FunctionBody::Expr(Box::new(e)))
            }
        })?;
        let span = self.span_from(start);
        Ok(Expr::Function {
            func: Rc::new(Function {
                name: None,
                params,
                body,
                is_arrow: true,
                span,
                body_span: self.span_from(body_start),
            }),
            span,
        })
    }

    /// Arrow parameter list followed by `=>`, or `None` to rewind
    fn try_arrow_params(&mut self) -> PResult<Option<Vec<Param>>> {
        let snap = self.snapshot();
        match self.arrow_head() {
            Ok(Some(params)) => {
                self.advance()?;
                Ok(Some(params))
            }
            _ => {
                self.restore(snap);
                Ok(None)
            }
        }
    }

    /// `(params): Ret` with the lookahead left on `=>`
    fn arrow_head(&mut self) -> PResult<Option<Vec<Param>>> {
        if self.at_punct("<") {
            self.skip_type_args()?;
        }
        let params = self.parse_params()?;
        if self.eat_punct(":")? {
            self.skip_type()?;
        }
        if self.at_punct("=>") && !self.tok.nl_before {
            return Ok(Some(params));
        }
        Ok(None)
    }

    fn parse_class(&mut self, require_name: bool) -> PResult<Class> {
        let start = self.advance()?.span.start;
        let name = if matches!(&self.tok.tok, Tok::Ident(n) if n != "extends" && n != "implements")
        {
            Some(self.expect_ident_name()?.0)
        } else if require_name {
            return Err(self.error_here("Class declarations require a name"));
        } else {
            None
        };
        if self.at_punct("<") {
            self.skip_type_args()?;
        }
        let extends = if self.eat_ident("extends")? {
            let base = self.parse_member_only()?;
            if self.at_punct("<") {
                self.skip_type_args()?;
            }
            Some(Box::new(base))
        } else {
            None
        };
        if self.eat_ident("implements")? {
            while !self.at_punct("{") {
                if self.at_eof() {
                    return Err(self.unexpected());
                }
                self.advance()?;
            }
        }

        self.expect_punct("{")?;
        let mut constructor = None;
        let mut methods = Vec::new();
        let mut fields = Vec::new();
        while !self.eat_punct("}")? {
            if self.eat_punct(";")? {
                continue;
            }
            if self.at_eof() {
                return Err(self.error_here("Expected '}' but found end of input"));
            }
            let member_start = self.tok.span.start;
            let mut is_static = false;
            loop {
                let is_modifier =
                    self.at_ident("static") || TS_MODIFIERS.iter().any(|m| self.at_ident(m));
                if !is_modifier {
                    break;
                }
                let next = self.peek()?;
                let names_member = next.is_punct("(")
                    || next.is_punct("=")
                    || next.is_punct(";")
                    || next.is_punct(":")
                    || next.is_punct("?")
                    || next.is_punct("}")
                    || next.nl_before;
                if names_member {
                    break;
                }
                if self.at_ident("static") {
                    is_static = true;
                }
                self.advance()?;
            }
            if self.at_ident("async") || self.at_punct("*") {
                return Err(self.error_here("Async and generator methods are not supported"));
            }
            if (self.at_ident("get") || self.at_ident("set"))
                && matches!(self.peek()?.tok, Tok::Ident(_))
            {
                return Err(self.error_here("Getters and setters are not supported"));
            }
            let name = match &self.tok.tok {
                Tok::Ident(n) => n.clone(),
                Tok::Str(s) => s.clone(),
                Tok::Num(n) => format_number(*n),
                _ => return Err(self.unexpected()),
            };
            self.advance()?;
            self.eat_punct("?")?;
            self.eat_punct("!")?;

            if self.at_punct("(") || self.at_punct("<") {
                let func = self.parse_function_rest(Some(name.clone()), member_start)?;
                if name == "constructor" && !is_static {
                    constructor = Some(Rc::new(func));
                } else {
                    methods.push(ClassMethod {
                        name,
                        func: Rc::new(func),
                        is_static,
                    });
                }
                continue;
            }

            if self.eat_punct(":")? {
                self.skip_type()?;
            }
            let value = if self.eat_punct("=")? {
                Some(self.parse_assign()?)
            } else {
                None
            };
            self.consume_semicolon()?;
            fields.push(ClassField {
                name,
                value,
                is_static,
            });
        }

        Ok(Class {
            name,
            extends,
            constructor,
            methods,
            fields,
            span: self.span_from(start),
        })
    }

    /* ===================== Patterns ===================== */

    fn parse_binding_target(&mut self) -> PResult<Pattern> {
        let start = self.tok.span.start;
        if self.at_punct("[") {
            self.advance()?;
            let mut elems = Vec::new();
            let mut rest = None;
            while !self.eat_punct("]")? {
                if self.eat_punct(",")? {
                    elems.push(None);
                    continue;
                }
                if self.eat_punct("...")? {
                    rest = Some(Box::new(self.nested(|p| p.parse_binding_target())?));
                    self.eat_punct(",")?;
                    self.expect_punct("]")?;
                    break;
                }
                elems.push(Some(self.parse_binding_element()?));
                if !self.at_punct("]") {
                    self.expect_punct(",")?;
                }
            }
            return Ok(Pattern::Array {
                elems,
                rest,
                span: self.span_from(start),
            });
        }

        if self.at_punct("{") {
            self.advance()?;
            let mut props = Vec::new();
            let mut rest = None;
            while !self.eat_punct("}")? {
                if self.eat_punct("...")? {
                    rest = Some(Box::new(self.nested(|p| p.parse_binding_target())?));
                    self.eat_punct(",")?;
                    self.expect_punct("}")?;
                    break;
                }
                let prop_start = self.tok.span.start;
                let key_tok = self.tok.clone();
                let key = self.parse_prop_key()?;
                let value = if self.eat_punct(":")? {
                    self.parse_binding_element()?
                } else {
                    let PropKey::Ident(name) = &key else {
                        return Err(self.error_at(prop_start, "Expected ':' in object pattern"));
                    };
                    if is_reserved(name) {
                        return Err(self.error_at(
                            key_tok.span.start,
                            format!("Unexpected reserved word '{}'", name),
                        ));
                    }
                    let target = Pattern::Ident {
                        name: name.clone(),
                        span: key_tok.span,
                    };
                    if self.eat_punct("=")? {
                        let default = self.parse_assign()?;
                        Pattern::Default {
                            target: Box::new(target),
                            default: Box::new(default),
                            span: self.span_from(prop_start),
                        }
                    } else {
                        target
                    }
                };
                props.push(PatternProp {
                    key,
                    value,
                    span: self.span_from(prop_start),
                });
                if !self.at_punct("}") {
                    self.expect_punct(",")?;
                }
            }
            return Ok(Pattern::Object {
                props,
                rest,
                span: self.span_from(start),
            });
        }

        let (name, span) = self.expect_ident_name()?;
        Ok(Pattern::Ident { name, span })
    }

    fn parse_binding_element(&mut self) -> PResult<Pattern> {
        let start = self.tok.span.start;
        let target = self.nested(|p| p.parse_binding_target())?;
        if self.eat_punct("=")? {
            let default = self.parse_assign()?;
            return Ok(Pattern::Default {
                target: Box::new(target),
                default: Box::new(default),
                span: self.span_from(start),
            });
        }
        Ok(target)
    }

    /// Reinterpret an already-parsed expression as an assignment target
    fn expr_to_pattern(&self, expr: Expr) -> PResult<Pattern> {
        match expr {
            Expr::Ident { name, span } => Ok(Pattern::Ident { name, span }),
            Expr::Member { span, .. } => Ok(Pattern::Member {
                expr: Box::new(expr),
                span,
            }),
            Expr::Paren { expr, .. } => match *expr {
                inner @ (Expr::Ident { .. } | Expr::Member { .. }) => self.expr_to_pattern(inner),
                other => Err(self.error_at(other.span().start, "Invalid assignment target")),
            },
            Expr::Assign {
                op: AssignOp::Assign,
                target,
                value,
                span,
            } => Ok(Pattern::Default {
                target,
                default: value,
                span,
            }),
            Expr::Array { elems, span } => {
                let mut out = Vec::new();
                let mut rest = None;
                let count = elems.len();
                for (i, elem) in elems.into_iter().enumerate() {
                    match elem {
                        None => out.push(None),
                        Some(ExprOrSpread::Expr(e)) => out.push(Some(self.expr_to_pattern(e)?)),
                        Some(ExprOrSpread::Spread(e)) => {
                            if i + 1 != count {
                                return Err(self.error_at(e.span().start, "Rest element must be last"));
                            }
                            rest = Some(Box::new(self.expr_to_pattern(e)?));
                        }
                    }
                }
                Ok(Pattern::Array {
                    elems: out,
                    rest,
                    span,
                })
            }
            Expr::Object { props, span } => {
                let mut out = Vec::new();
                let mut rest = None;
                for prop in props {
                    match prop {
                        ObjProp::KeyValue { key, value, span, .. } => out.push(PatternProp {
                            key,
                            value: self.expr_to_pattern(value)?,
                            span,
                        }),
                        ObjProp::Spread { expr, .. } => {
                            rest = Some(Box::new(self.expr_to_pattern(expr)?));
                        }
                        ObjProp::Method { span, .. } => {
                            return Err(self.error_at(span.start, "Invalid destructuring target"))
                        }
                    }
                }
                Ok(Pattern::Object {
                    props: out,
                    rest,
                    span,
                })
            }
            other => Err(self.error_at(other.span().start, "Invalid assignment target")),
        }
    }

    fn parse_prop_key(&mut self) -> PResult<PropKey> {
        let key = match &self.tok.tok {
            Tok::Ident(name) => PropKey::Ident(name.clone()),
            Tok::Str(s) => PropKey::Str(s.clone()),
            Tok::Num(n) => PropKey::Num(*n),
            Tok::Punct("[") => {
                self.advance()?;
                let expr = self.parse_assign()?;
                self.expect_punct("]")?;
                return Ok(PropKey::Computed(Box::new(expr)));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance()?;
        Ok(key)
    }

    /* ===================== Expressions ===================== */

    pub fn parse_expression(&mut self) -> PResult<Expr> {
        let start = self.tok.span.start;
        let first = self.parse_assign()?;
        if !self.at_punct(",") {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat_punct(",")? {
            exprs.push(self.parse_assign()?);
        }
        Ok(Expr::Sequence {
            exprs,
            span: self.span_from(start),
        })
    }

    fn parse_assign(&mut self) -> PResult<Expr> {
        self.nested(|p| p.parse_assign_inner())
    }

    fn parse_assign_inner(&mut self) -> PResult<Expr> {
        let start = self.tok.span.start;

        match &self.tok.tok {
            Tok::Ident(name) if name == "async" => {
                let next = self.peek()?;
                if !next.nl_before
                    && (next.is_ident("function")
                        || next.is_punct("(")
                        || matches!(next.tok, Tok::Ident(_)))
                {
                    return Err(self.error_here("Async functions are not supported"));
                }
            }
            Tok::Ident(name) if name == "yield" || name == "await" => {
                return Err(self.error_here(format!("'{}' is not supported", name)));
            }
            Tok::Ident(name) if !is_reserved(name) => {
                if self.peek()?.is_punct("=>") {
                    let (name, span) = self.expect_ident_name()?;
                    if self.tok.nl_before {
                        return Err(self.error_here("Line terminator before '=>'"));
                    }
                    self.advance()?;
                    let params = vec![Param {
                        pattern: Pattern::Ident { name, span },
                        rest: false,
                    }];
                    return self.parse_arrow_body(params, start);
                }
            }
            Tok::Punct("(") => {
                if let Some(params) = self.try_arrow_params()? {
                    return self.parse_arrow_body(params, start);
                }
            }
            _ => {}
        }

        let left = self.parse_conditional()?;

        let op = match self.tok.tok {
            Tok::Punct(p) => assign_op(p),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(left);
        };
        let target = match op {
            AssignOp::Assign => self.expr_to_pattern(left)?,
            _ => match left {
                Expr::Ident { .. } | Expr::Member { .. } | Expr::Paren { .. } => {
                    self.expr_to_pattern(left)?
                }
                other => return Err(self.error_at(other.span().start, "Invalid assignment target")),
            },
        };
        self.advance()?;
        let value = self.parse_assign()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
            span: self.span_from(start),
        })
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let start = self.tok.span.start;
        let test = self.parse_binary(0)?;
        if !self.eat_punct("?")? {
            return Ok(test);
        }
        let consequent = self.allow_in(|p| p.parse_assign())?;
        self.expect_punct(":")?;
        let alternate = self.parse_assign()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
            span: self.span_from(start),
        })
    }

    fn binary_precedence(&self) -> Option<(u8, BinOrLogical)> {
        let op = match &self.tok.tok {
            Tok::Punct(p) => *p,
            Tok::Ident(w) if w == "instanceof" => "instanceof",
            Tok::Ident(w) if w == "in" && !self.no_in => "in",
            Tok::Ident(w) if (w == "as" || w == "satisfies") && !self.tok.nl_before => "as",
            _ => return None,
        };
        let entry = match op {
            "??" => (1, BinOrLogical::Logical(LogicalOp::Nullish)),
            "||" => (2, BinOrLogical::Logical(LogicalOp::Or)),
            "&&" => (3, BinOrLogical::Logical(LogicalOp::And)),
            "|" => (4, BinOrLogical::Binary(BinaryOp::BitOr)),
            "^" => (5, BinOrLogical::Binary(BinaryOp::BitXor)),
            "&" => (6, BinOrLogical::Binary(BinaryOp::BitAnd)),
            "==" => (7, BinOrLogical::Binary(BinaryOp::Eq)),
            "!=" => (7, BinOrLogical::Binary(BinaryOp::NotEq)),
            "===" => (7, BinOrLogical::Binary(BinaryOp::StrictEq)),
            "!==" => (7, BinOrLogical::Binary(BinaryOp::StrictNotEq)),
            "<" => (8, BinOrLogical::Binary(BinaryOp::Lt)),
            "<=" => (8, BinOrLogical::Binary(BinaryOp::LtEq)),
            ">" => (8, BinOrLogical::Binary(BinaryOp::Gt)),
            ">=" => (8, BinOrLogical::Binary(BinaryOp::GtEq)),
            "instanceof" => (8, BinOrLogical::Binary(BinaryOp::Instanceof)),
            "in" => (8, BinOrLogical::Binary(BinaryOp::In)),
            "as" => (8, BinOrLogical::TypeCast),
            "<<" => (9, BinOrLogical::Binary(BinaryOp::Shl)),
            ">>" => (9, BinOrLogical::Binary(BinaryOp::Shr)),
            ">>>" => (9, BinOrLogical::Binary(BinaryOp::UShr)),
            "+" => (10, BinOrLogical::Binary(BinaryOp::Add)),
            "-" => (10, BinOrLogical::Binary(BinaryOp::Sub)),
            "*" => (11, BinOrLogical::Binary(BinaryOp::Mul)),
            "/" => (11, BinOrLogical::Binary(BinaryOp::Div)),
            "%" => (11, BinOrLogical::Binary(BinaryOp::Rem)),
            "**" => (12, BinOrLogical::Binary(BinaryOp::Exp)),
            _ => return None,
        };
        Some(entry)
    }

    /// Precedence climbing over binary and logical operators
    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let start = self.tok.span.start;
        let (mut left, mut height) = self.measured(|p| p.parse_unary())?;
        while let Some((prec, op)) = self.binary_precedence() {
            if prec < min_prec {
                break;
            }
            self.advance()?;
            if let BinOrLogical::TypeCast = op {
                self.skip_type()?;
                continue;
            }
            // `**` is right-associative
            let next_min = if prec == 12 { prec } else { prec + 1 };
            let (right, right_height) = self.measured(|p| p.parse_binary(next_min))?;
            height = self.fold(height.max(right_height))?;
            let span = self.span_from(start);
            left = match op {
                BinOrLogical::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                },
                BinOrLogical::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                },
                BinOrLogical::TypeCast => left,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.tok.span.start;
        let op = match &self.tok.tok {
            Tok::Punct("!") => Some(UnaryOp::Not),
            Tok::Punct("-") => Some(UnaryOp::Neg),
            Tok::Punct("+") => Some(UnaryOp::Plus),
            Tok::Punct("~") => Some(UnaryOp::BitNot),
            Tok::Ident(w) if w == "typeof" => Some(UnaryOp::Typeof),
            Tok::Ident(w) if w == "void" => Some(UnaryOp::Void),
            Tok::Ident(w) if w == "delete" => Some(UnaryOp::Delete),
            Tok::Ident(w) if w == "await" => {
                return Err(self.error_here("'await' is not supported"));
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance()?;
            let arg = self.nested(|p| p.parse_unary())?;
            return Ok(Expr::Unary {
                op,
                arg: Box::new(arg),
                span: self.span_from(start),
            });
        }

        if self.at_punct("++") || self.at_punct("--") {
            let increment = self.at_punct("++");
            self.advance()?;
            let target = self.nested(|p| p.parse_unary())?;
            self.check_update_target(&target)?;
            return Ok(Expr::Update {
                increment,
                prefix: true,
                target: Box::new(target),
                span: self.span_from(start),
            });
        }

        let expr = self.parse_postfix_chain()?;
        if (self.at_punct("++") || self.at_punct("--")) && !self.tok.nl_before {
            let increment = self.at_punct("++");
            self.check_update_target(&expr)?;
            self.advance()?;
            return Ok(Expr::Update {
                increment,
                prefix: false,
                target: Box::new(expr),
                span: self.span_from(start),
            });
        }
        Ok(expr)
    }

    fn check_update_target(&self, target: &Expr) -> PResult<()> {
        match target.unparen() {
            Expr::Ident { .. } | Expr::Member { .. } => Ok(()),
            other => Err(self.error_at(other.span().start, "Invalid update target")),
        }
    }

    fn parse_args(&mut self) -> PResult<Vec<ExprOrSpread>> {
        self.expect_punct("(")?;
        self.allow_in(|p| {
            let mut args = Vec::new();
            while !p.eat_punct(")")? {
                if p.eat_punct("...")? {
                    args.push(ExprOrSpread::Spread(p.parse_assign()?));
                } else {
                    args.push(ExprOrSpread::Expr(p.parse_assign()?));
                }
                if !p.at_punct(")") {
                    p.expect_punct(",")?;
                }
            }
            Ok(args)
        })
    }

    /// Primary expression followed by member accesses only (`new` callee, `extends`)
    fn parse_member_only(&mut self) -> PResult<Expr> {
        let start = self.tok.span.start;
        let (mut expr, mut height) = self.measured(|p| {
            if p.at_ident("new") {
                p.parse_new()
            } else {
                p.parse_primary()
            }
        })?;
        loop {
            if self.eat_punct(".")? {
                let name = self.expect_property_name()?;
                height = self.fold(height)?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Ident(name),
                    optional: false,
                    span: self.span_from(start),
                };
            } else if self.at_punct("[") {
                self.advance()?;
                let (prop, prop_height) = self.measured(|p| p.parse_expression())?;
                self.expect_punct("]")?;
                height = self.fold(height.max(prop_height))?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Computed(Box::new(prop)),
                    optional: false,
                    span: self.span_from(start),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_new(&mut self) -> PResult<Expr> {
        let start = self.advance()?.span.start;
        if self.at_punct(".") {
            return Err(self.error_here("'new.target' is not supported"));
        }
        let callee = self.nested(|p| p.parse_member_only())?;
        if self.at_punct("<") {
            let snap = self.snapshot();
            if self.skip_type_args().is_err() || !self.at_punct("(") {
                self.restore(snap);
            }
        }
        let args = if self.at_punct("(") {
            self.parse_args()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
            span: self.span_from(start),
        })
    }

    /// Calls, member accesses, optional chains, non-null assertions
    fn parse_postfix_chain(&mut self) -> PResult<Expr> {
        let start = self.tok.span.start;
        let (mut expr, mut height) = self.measured(|p| {
            if p.at_ident("new") {
                p.parse_new()
            } else if p.at_ident("super") {
                p.advance()?;
                if !p.at_punct("(") {
                    return Err(p.error_here("Only 'super(...)' calls are supported"));
                }
                let args = p.parse_args()?;
                Ok(Expr::SuperCall {
                    args,
                    span: p.span_from(start),
                })
            } else {
                p.parse_primary()
            }
        })?;
        let mut optional_chain = false;

        loop {
            let (step, parts) =
                self.measured(|p| p.parse_postfix_step(expr, start, &mut optional_chain))?;
            match step {
                ControlFlow::Continue(next) => {
                    height = self.fold(height.max(parts))?;
                    expr = next;
                }
                ControlFlow::Break(done) => {
                    expr = done;
                    break;
                }
            }
        }

        if optional_chain {
            mark_optional_chain(&mut expr);
        }
        Ok(expr)
    }

    /// Extend `expr` by one postfix operation, or hand it back when none follows
    fn parse_postfix_step(
        &mut self,
        expr: Expr,
        start: usize,
        optional_chain: &mut bool,
    ) -> PResult<ControlFlow<Expr, Expr>> {
        let next = match &self.tok.tok {
            Tok::Punct(".") => {
                self.advance()?;
                let name = self.expect_property_name()?;
                Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Ident(name),
                    optional: false,
                    span: self.span_from(start),
                }
            }
            Tok::Punct("?.") => {
                self.advance()?;
                *optional_chain = true;
                if self.at_punct("(") {
                    let args = self.parse_args()?;
                    Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: true,
                        span: self.span_from(start),
                    }
                } else if self.at_punct("[") {
                    self.advance()?;
                    let prop = self.parse_expression()?;
                    self.expect_punct("]")?;
                    Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(prop)),
                        optional: true,
                        span: self.span_from(start),
                    }
                } else {
                    let name = self.expect_property_name()?;
                    Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Ident(name),
                        optional: true,
                        span: self.span_from(start),
                    }
                }
            }
            Tok::Punct("[") => {
                self.advance()?;
                let prop = self.allow_in(|p| p.parse_expression())?;
                self.expect_punct("]")?;
                Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Computed(Box::new(prop)),
                    optional: false,
                    span: self.span_from(start),
                }
            }
            Tok::Punct("(") => {
                let args = self.parse_args()?;
                Expr::Call {
                    callee: Box::new(expr),
                    args,
                    optional: false,
                    span: self.span_from(start),
                }
            }
            Tok::Punct("!") if !self.tok.nl_before => {
                // non-null assertion
                self.advance()?;
                expr
            }
            Tok::Punct("<") => {
                // generic call arguments: f<T>(x)
                let snap = self.snapshot();
                if self.skip_type_args().is_ok() && self.at_punct("(") {
                    return Ok(ControlFlow::Continue(expr));
                }
                self.restore(snap);
                return Ok(ControlFlow::Break(expr));
            }
            Tok::Template { .. } if !self.tok.nl_before => {
                return Err(self.error_here("Tagged templates are not supported"));
            }
            _ => return Ok(ControlFlow::Break(expr)),
        };
        Ok(ControlFlow::Continue(next))
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.tok.span.start;
        let span = self.tok.span;
        match self.tok.tok.clone() {
            Tok::Num(v) => {
                self.advance()?;
                Ok(Expr::Num { v, span })
            }
            Tok::Str(v) => {
                self.advance()?;
                Ok(Expr::Str { v, span })
            }
            Tok::Template { quasis, exprs } => {
                self.advance()?;
                let mut parsed = Vec::with_capacity(exprs.len());
                for range in exprs {
                    let mut sub = Parser::with_range(self.src, range.start, range.end)?;
                    if sub.at_eof() {
                        return Err(self.error_at(range.start, "Empty template substitution"));
                    }
                    sub.depth = self.depth;
                    sub.peak = self.depth;
                    parsed.push(sub.parse_standalone_expression()?);
                    self.peak = self.peak.max(sub.peak);
                }
                Ok(Expr::Template {
                    quasis,
                    exprs: parsed,
                    span,
                })
            }
            Tok::Ident(name) => match name.as_str() {
                "true" | "false" => {
                    self.advance()?;
                    Ok(Expr::Bool {
                        v: name == "true",
                        span,
                    })
                }
                "null" => {
                    self.advance()?;
                    Ok(Expr::Null { span })
                }
                "this" => {
                    self.advance()?;
                    Ok(Expr::This { span })
                }
                "function" => {
                    let func = self.parse_function(false)?;
                    Ok(Expr::Function {
                        func: Rc::new(func),
                        span: self.span_from(start),
                    })
                }
                "class" => {
                    let class = self.parse_class(false)?;
                    Ok(Expr::Class {
                        class: Rc::new(class),
                        span: self.span_from(start),
                    })
                }
                "new" => self.parse_new(),
                _ if is_reserved(&name) => Err(self.unexpected()),
                _ => {
                    self.advance()?;
                    Ok(Expr::Ident { name, span })
                }
            },
            Tok::Punct("(") => {
                self.advance()?;
                let inner = self.allow_in(|p| p.parse_expression())?;
                self.expect_punct(")")?;
                Ok(Expr::Paren {
                    expr: Box::new(inner),
                    span: self.span_from(start),
                })
            }
            Tok::Punct("[") => self.parse_array_literal(),
            Tok::Punct("{") => self.parse_object_literal(),
            Tok::Punct("<") => {
                let element = self.parse_jsx_at(start)?;
                self.sync()?;
                self.prev_end = element.span.end;
                Ok(Expr::Jsx(Box::new(element)))
            }
            Tok::Punct("/") | Tok::Punct("/=") => {
                let (pattern, flags) = self.lexer.read_regex(start)?;
                let end = self.lexer.pos;
                self.sync()?;
                self.prev_end = end;
                Ok(Expr::Regex {
                    pattern,
                    flags,
                    span: Span::new(start, end),
                })
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_literal(&mut self) -> PResult<Expr> {
        let start = self.advance()?.span.start;
        let elems = self.allow_in(|p| {
            let mut elems = Vec::new();
            while !p.eat_punct("]")? {
                if p.eat_punct(",")? {
                    elems.push(None);
                    continue;
                }
                if p.eat_punct("...")? {
                    elems.push(Some(ExprOrSpread::Spread(p.parse_assign()?)));
                } else {
                    elems.push(Some(ExprOrSpread::Expr(p.parse_assign()?)));
                }
                if !p.at_punct("]") {
                    p.expect_punct(",")?;
                }
            }
            Ok(elems)
        })?;
        Ok(Expr::Array {
            elems,
            span: self.span_from(start),
        })
    }

    fn parse_object_literal(&mut self) -> PResult<Expr> {
        let start = self.advance()?.span.start;
        let props = self.allow_in(|p| {
            let mut props = Vec::new();
            while !p.eat_punct("}")? {
                props.push(p.parse_object_prop()?);
                if !p.at_punct("}") {
                    p.expect_punct(",")?;
                }
            }
            Ok(props)
        })?;
        Ok(Expr::Object {
            props,
            span: self.span_from(start),
        })
    }

    fn parse_object_prop(&mut self) -> PResult<ObjProp> {
        let start = self.tok.span.start;
        if self.eat_punct("...")? {
            let expr = self.parse_assign()?;
            return Ok(ObjProp::Spread {
                expr,
                span: self.span_from(start),
            });
        }
        if self.at_ident("async") || self.at_punct("*") {
            let next = self.peek()?;
            if !next.is_punct(":") && !next.is_punct(",") && !next.is_punct("(") && !next.is_punct("}") {
                return Err(self.error_here("Async and generator methods are not supported"));
            }
        }
        if self.at_ident("get") || self.at_ident("set") {
            let next = self.peek()?;
            if matches!(next.tok, Tok::Ident(_) | Tok::Str(_) | Tok::Num(_)) || next.is_punct("[") {
                return Err(self.error_here("Getters and setters are not supported"));
            }
        }

        let key_tok = self.tok.clone();
        let key = self.parse_prop_key()?;

        if self.at_punct("(") || self.at_punct("<") {
            let name = match &key {
                PropKey::Ident(n) | PropKey::Str(n) => Some(n.clone()),
                _ => None,
            };
            let func = self.parse_function_rest(name, start)?;
            return Ok(ObjProp::Method {
                key,
                func: Rc::new(func),
                span: self.span_from(start),
            });
        }

        if self.eat_punct(":")? {
            let value = self.parse_assign()?;
            return Ok(ObjProp::KeyValue {
                key,
                value,
                shorthand: false,
                span: self.span_from(start),
            });
        }

        // shorthand `{ a }` or cover grammar `{ a = 1 }` for destructuring assignment
        let PropKey::Ident(name) = &key else {
            return Err(self.unexpected());
        };
        if is_reserved(name) {
            return Err(self.error_at(key_tok.span.start, format!("Unexpected reserved word '{}'", name)));
        }
        let ident = Expr::Ident {
            name: name.clone(),
            span: key_tok.span,
        };
        let value = if self.eat_punct("=")? {
            let default = self.parse_assign()?;
            Expr::Assign {
                op: AssignOp::Assign,
                target: Box::new(Pattern::Ident {
                    name: name.clone(),
                    span: key_tok.span,
                }),
                value: Box::new(default),
                span: self.span_from(start),
            }
        } else {
            ident
        };
        Ok(ObjProp::KeyValue {
            key,
            value,
            shorthand: true,
            span: self.span_from(start),
        })
    }

    /* ===================== Markup ===================== */

    /// Parse an element whose `<` sits at `start`; scanning is character level
    fn parse_jsx_at(&mut self, start: usize) -> PResult<JsxElement> {
        self.lexer.pos = start + 1;
        self.lexer.skip_trivia()?;

        // <> fragment
        if self.lexer.peek_char() == Some('>') {
            self.lexer.bump_char();
            let opening_span = Span::new(start, self.lexer.pos);
            let children = self.parse_jsx_children(&JsxName::Fragment, start)?;
            return Ok(JsxElement {
                name: JsxName::Fragment,
                attrs: Vec::new(),
                children,
                self_closing: false,
                opening_span,
                name_span: Span::new(start + 1, start + 1),
                span: Span::new(start, self.lexer.pos),
            });
        }

        let name_start = self.lexer.pos;
        let name = self.read_jsx_name()?;
        let name_span = Span::new(name_start, self.lexer.pos);

        let mut attrs = Vec::new();
        let self_closing = loop {
            self.lexer.skip_trivia()?;
            let here = self.lexer.pos;
            match self.lexer.peek_char() {
                Some('/') => {
                    self.lexer.bump_char();
                    if self.lexer.peek_char() != Some('>') {
                        return Err(self.error_at(here, "Expected '>' after '/' in tag"));
                    }
                    self.lexer.bump_char();
                    break true;
                }
                Some('>') => {
                    self.lexer.bump_char();
                    break false;
                }
                Some('{') => {
                    self.lexer.bump_char();
                    self.sync()?;
                    if !self.eat_punct("...")? {
                        return Err(self.error_here("Expected '...' in spread attribute"));
                    }
                    let expr = self.parse_assign()?;
                    self.finish_jsx_container()?;
                    attrs.push(JsxAttr::Spread {
                        expr,
                        span: Span::new(here, self.lexer.pos),
                    });
                }
                Some(c) if super::lexer::is_id_start(c) => {
                    attrs.push(self.parse_jsx_attr()?);
                }
                Some(c) => {
                    return Err(self.error_at(here, format!("Unexpected character '{}' in tag", c)))
                }
                None => {
                    return Err(self.error_at(
                        start,
                        format!("Unterminated tag <{}>", name.as_str()),
                    ))
                }
            }
        };
        let opening_span = Span::new(start, self.lexer.pos);

        let children = if self_closing {
            Vec::new()
        } else {
            self.parse_jsx_children(&name, start)?
        };
        Ok(JsxElement {
            name,
            attrs,
            children,
            self_closing,
            opening_span,
            name_span,
            span: Span::new(start, self.lexer.pos),
        })
    }

    fn read_jsx_name(&mut self) -> PResult<JsxName> {
        let here = self.lexer.pos;
        let Some(first) = self.lexer.read_jsx_ident() else {
            return Err(self.error_at(here, "Expected element name"));
        };
        if self.lexer.peek_char() == Some('.') {
            let mut full = first;
            while self.lexer.peek_char() == Some('.') {
                self.lexer.bump_char();
                let seg_pos = self.lexer.pos;
                let Some(seg) = self.lexer.read_jsx_ident() else {
                    return Err(self.error_at(seg_pos, "Expected name after '.'"));
                };
                full.push('.');
                full.push_str(&seg);
            }
            return Ok(JsxName::Member(full));
        }
        if self.lexer.peek_char() == Some(':') {
            self.lexer.bump_char();
            let seg_pos = self.lexer.pos;
            let Some(local) = self.lexer.read_jsx_ident() else {
                return Err(self.error_at(seg_pos, "Expected name after ':'"));
            };
            return Ok(JsxName::Ident(format!("{}:{}", first, local)));
        }
        Ok(JsxName::Ident(first))
    }

    fn parse_jsx_attr(&mut self) -> PResult<JsxAttr> {
        let start = self.lexer.pos;
        let mut name = self.lexer.read_jsx_ident().unwrap_or_default();
        if self.lexer.peek_char() == Some(':') {
            self.lexer.bump_char();
            if let Some(local) = self.lexer.read_jsx_ident() {
                name.push(':');
                name.push_str(&local);
            }
        }
        let name_span = Span::new(start, self.lexer.pos);
        let after_name = self.lexer.pos;
        self.lexer.skip_trivia()?;
        if self.lexer.peek_char() != Some('=') {
            self.lexer.pos = after_name;
            return Ok(JsxAttr::Attr {
                name,
                name_span,
                value: None,
                span: name_span,
            });
        }
        self.lexer.bump_char();
        self.lexer.skip_trivia()?;
        let value_start = self.lexer.pos;
        let value = match self.lexer.peek_char() {
            Some('"') | Some('\'') => {
                let value = self.lexer.read_jsx_string()?;
                JsxAttrValue::Str {
                    value,
                    span: Span::new(value_start, self.lexer.pos),
                }
            }
            Some('{') => {
                self.lexer.bump_char();
                self.sync()?;
                if self.at_punct("}") {
                    return Err(self.error_at(
                        value_start,
                        "Attribute expressions must not be empty",
                    ));
                }
                let expr = self.parse_assign()?;
                self.finish_jsx_container()?;
                JsxAttrValue::Expr {
                    expr,
                    span: Span::new(value_start, self.lexer.pos),
                }
            }
            Some('<') => {
                let element = self.nested(|p| p.parse_jsx_at(value_start))?;
                JsxAttrValue::Element(Box::new(element))
            }
            _ => return Err(self.error_at(value_start, "Expected attribute value")),
        };
        Ok(JsxAttr::Attr {
            name,
            name_span,
            value: Some(value),
            span: Span::new(start, self.lexer.pos),
        })
    }

    /// The lookahead must be the closing `}`; resume character scanning after it
    fn finish_jsx_container(&mut self) -> PResult<()> {
        if !self.at_punct("}") {
            return Err(self.error_here(format!(
                "Expected '}}' to close expression but found {}",
                self.describe()
            )));
        }
        self.lexer.pos = self.tok.span.end;
        Ok(())
    }

    fn parse_jsx_children(&mut self, name: &JsxName, start: usize) -> PResult<Vec<JsxChild>> {
        let mut children = Vec::new();
        loop {
            let text_start = self.lexer.pos;
            let raw = self.lexer.read_jsx_text()?;
            if !raw.is_empty() {
                children.push(JsxChild::Text {
                    raw,
                    span: Span::new(text_start, self.lexer.pos),
                });
            }
            let here = self.lexer.pos;
            match self.lexer.peek_char() {
                None => {
                    return Err(self.error_at(
                        start,
                        match name {
                            JsxName::Fragment => "Unclosed fragment <>".to_string(),
                            other => format!("Unclosed element <{}>", other.as_str()),
                        },
                    ))
                }
                Some('{') => {
                    self.lexer.bump_char();
                    self.lexer.skip_trivia()?;
                    if self.lexer.peek_char() == Some('}') {
                        self.lexer.bump_char();
                        children.push(JsxChild::Expr {
                            expr: None,
                            span: Span::new(here, self.lexer.pos),
                        });
                        continue;
                    }
                    self.sync()?;
                    if self.at_punct("...") {
                        return Err(self.error_here("Spread children are not supported"));
                    }
                    let expr = self.parse_expression()?;
                    self.finish_jsx_container()?;
                    children.push(JsxChild::Expr {
                        expr: Some(expr),
                        span: Span::new(here, self.lexer.pos),
                    });
                }
                Some(_) => {
                    // '<'
                    self.lexer.bump_char();
                    self.lexer.skip_trivia()?;
                    if self.lexer.peek_char() == Some('/') {
                        self.lexer.bump_char();
                        self.lexer.skip_trivia()?;
                        let closing = if self.lexer.peek_char() == Some('>') {
                            JsxName::Fragment
                        } else {
                            self.read_jsx_name()?
                        };
                        if closing != *name {
                            return Err(self.error_at(
                                here,
                                match name {
                                    JsxName::Fragment => {
                                        "Expected corresponding closing tag for <>".to_string()
                                    }
                                    other => format!(
                                        "Expected corresponding closing tag for <{}>",
                                        other.as_str()
                                    ),
                                },
                            ));
                        }
                        self.lexer.skip_trivia()?;
                        if self.lexer.bump_char() != Some('>') {
                            return Err(self.error_at(here, "Expected '>' in closing tag"));
                        }
                        return Ok(children);
                    }
                    let element = self.nested(|p| p.parse_jsx_at(here))?;
                    children.push(JsxChild::Element(element));
                }
            }
        }
    }

    /* ===================== Type erasure ===================== */

    /// Consume a type expression without building anything
    fn skip_type(&mut self) -> PResult<()> {
        self.nested(|p| p.skip_type_inner())
    }

    fn skip_type_inner(&mut self) -> PResult<()> {
        if self.at_punct("|") || self.at_punct("&") {
            self.advance()?;
        }
        self.skip_type_operand()?;
        loop {
            if self.at_punct("|") || self.at_punct("&") {
                self.advance()?;
                self.skip_type_operand()?;
            } else if self.at_ident("extends") && !self.tok.nl_before {
                self.advance()?;
                self.skip_type_operand()?;
                self.expect_punct("?")?;
                self.skip_type()?;
                self.expect_punct(":")?;
                self.skip_type()?;
            } else if self.at_ident("is") && !self.tok.nl_before {
                // type predicate: x is T
                self.advance()?;
                self.skip_type_operand()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_type_operand(&mut self) -> PResult<()> {
        while ["keyof", "typeof", "unique", "readonly", "infer", "asserts"]
            .iter()
            .any(|w| self.at_ident(w))
        {
            let next = self.peek()?;
            if !matches!(next.tok, Tok::Ident(_)) && !next.is_punct("[") && !next.is_punct("(") {
                break;
            }
            self.advance()?;
        }
        match self.tok.tok.clone() {
            Tok::Punct("(") => {
                self.skip_balanced("(", ")")?;
                if self.eat_punct("=>")? {
                    self.skip_type()?;
                }
            }
            Tok::Punct("<") => {
                // generic function type: <T>(x: T) => T
                self.skip_type_args()?;
                self.skip_balanced("(", ")")?;
                self.expect_punct("=>")?;
                self.skip_type()?;
            }
            Tok::Punct("{") => self.skip_balanced("{", "}")?,
            Tok::Punct("[") => self.skip_balanced("[", "]")?,
            Tok::Punct("-") => {
                self.advance()?;
                self.advance()?;
            }
            Tok::Str(_) | Tok::Num(_) | Tok::Template { .. } => {
                self.advance()?;
            }
            Tok::Ident(w) if w == "new" => {
                self.advance()?;
                self.skip_balanced("(", ")")?;
                self.expect_punct("=>")?;
                self.skip_type()?;
            }
            Tok::Ident(_) => {
                self.advance()?;
                while self.at_punct(".") {
                    self.advance()?;
                    self.expect_property_name()?;
                }
                if self.at_punct("<") && !self.tok.nl_before {
                    self.skip_type_args()?;
                }
            }
            _ => return Err(self.error_here(format!("Expected type but found {}", self.describe()))),
        }
        // array and indexed access types
        while self.at_punct("[") && !self.tok.nl_before {
            self.skip_balanced("[", "]")?;
        }
        Ok(())
    }

    /// Skip `<...>` generic arguments or parameters
    ///
    /// Fails fast on any token that cannot appear inside a type, which is how
    /// `a < b` comparisons are told apart from `f<T>(x)` calls.
    fn skip_type_args(&mut self) -> PResult<()> {
        self.expect_punct("<")?;
        let mut depth: i32 = 1;
        loop {
            let delta = match &self.tok.tok {
                Tok::Punct("<") => 1,
                Tok::Punct(">") => -1,
                Tok::Punct(">>") => -2,
                Tok::Punct(">>>") => -3,
                Tok::Punct("(") => {
                    self.skip_balanced("(", ")")?;
                    continue;
                }
                Tok::Punct("{") => {
                    self.skip_balanced("{", "}")?;
                    continue;
                }
                Tok::Punct("[") => {
                    self.skip_balanced("[", "]")?;
                    continue;
                }
                Tok::Punct(p) if TYPE_PUNCT.contains(p) => 0,
                Tok::Ident(_) | Tok::Str(_) | Tok::Num(_) | Tok::Template { .. } => 0,
                _ => return Err(self.error_here("Malformed type arguments")),
            };
            self.advance()?;
            depth += delta;
            if depth <= 0 {
                return Ok(());
            }
        }
    }

    fn skip_balanced(&mut self, open: &str, close: &str) -> PResult<()> {
        let start = self.expect_punct(open)?.start;
        let mut depth = 1usize;
        loop {
            if self.at_eof() {
                return Err(self.error_at(start, format!("Expected '{}'", close)));
            }
            if self.at_punct(open) {
                depth += 1;
            } else if self.at_punct(close) {
                depth -= 1;
                if depth == 0 {
                    self.advance()?;
                    return Ok(());
                }
            }
            self.advance()?;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BinOrLogical {
    Binary(BinaryOp),
    Logical(LogicalOp),
    TypeCast,
}

fn assign_op(p: &str) -> Option<AssignOp> {
    let op = match p {
        "=" => AssignOp::Assign,
        "+=" => AssignOp::Arith(BinaryOp::Add),
        "-=" => AssignOp::Arith(BinaryOp::Sub),
        "*=" => AssignOp::Arith(BinaryOp::Mul),
        "/=" => AssignOp::Arith(BinaryOp::Div),
        "%=" => AssignOp::Arith(BinaryOp::Rem),
        "**=" => AssignOp::Arith(BinaryOp::Exp),
        "<<=" => AssignOp::Arith(BinaryOp::Shl),
        ">>=" => AssignOp::Arith(BinaryOp::Shr),
        ">>>=" => AssignOp::Arith(BinaryOp::UShr),
        "&=" => AssignOp::Arith(BinaryOp::BitAnd),
        "|=" => AssignOp::Arith(BinaryOp::BitOr),
        "^=" => AssignOp::Arith(BinaryOp::BitXor),
        "&&=" => AssignOp::Logical(LogicalOp::And),
        "||=" => AssignOp::Logical(LogicalOp::Or),
        "??=" => AssignOp::Logical(LogicalOp::Nullish),
        _ => return None,
    };
    Some(op)
}

/// Wrap the outermost link of a chain containing `?.` so evaluation can
/// short-circuit the whole chain at once
fn mark_optional_chain(expr: &mut Expr) {
    let span = expr.span();
    let inner = std::mem::replace(expr, Expr::Null { span });
    *expr = Expr::OptionalChain {
        expr: Box::new(inner),
        span,
    };
}
