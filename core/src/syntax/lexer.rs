//! Tokenizer for the component source language
//!
//! Produces one token at a time on demand. The parser drives markup scanning
//! directly through the character-level helpers (`peek_char`, `bump_char`,
//! `skip_trivia`) because tag bodies and text runs are not tokenized the same
//! way as ordinary code.

use super::ast::Span;
use super::{grow_stack, SyntaxError, MAX_NESTING};

/// Token payload
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    /// Identifier or keyword
    Ident(String),
    Num(f64),
    Str(String),
    /// Template literal: cooked quasis and the raw spans of `${...}` bodies
    Template {
        quasis: Vec<String>,
        exprs: Vec<Span>,
    },
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one
    pub nl_before: bool,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(&self.tok, Tok::Punct(q) if *q == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.tok, Tok::Ident(n) if n == name)
    }
}

/// Punctuators, longest first so prefix matching picks the maximal munch
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

pub fn is_id_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

pub fn is_id_continue(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

pub struct Lexer<'a> {
    src: &'a str,
    /// Current byte offset
    pub pos: usize,
    /// Exclusive scan limit
    end: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            end: src.len(),
        }
    }

    /// Lex only `src[start..end]`, keeping offsets absolute
    pub fn with_range(src: &'a str, start: usize, end: usize) -> Self {
        Self {
            src,
            pos: start,
            end: end.min(src.len()),
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn error(&self, offset: usize, message: impl Into<String>) -> SyntaxError {
        SyntaxError::at(self.src, offset, message)
    }

    /* ===================== Character helpers ===================== */

    pub fn peek_char(&self) -> Option<char> {
        if self.pos >= self.end {
            return None;
        }
        self.src[self.pos..self.end].chars().next()
    }

    fn peek_char_at(&self, ahead: usize) -> Option<char> {
        if self.pos >= self.end {
            return None;
        }
        self.src[self.pos..self.end].chars().nth(ahead)
    }

    pub fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.pos < self.end && self.src[self.pos..self.end].starts_with(s)
    }

    /// Skip whitespace and comments; returns whether a newline was crossed
    pub fn skip_trivia(&mut self) -> Result<bool, SyntaxError> {
        let mut newline = false;
        loop {
            match self.peek_char() {
                Some('\n') | Some('\r') | Some('\u{2028}') | Some('\u{2029}') => {
                    newline = true;
                    self.bump_char();
                }
                Some(c) if c.is_whitespace() => {
                    self.bump_char();
                }
                Some('/') if self.starts_with("//") => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump_char();
                    }
                }
                Some('/') if self.starts_with("/*") => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        if self.starts_with("*/") {
                            self.pos += 2;
                            break;
                        }
                        match self.bump_char() {
                            Some('\n') => newline = true,
                            Some(_) => {}
                            None => return Err(self.error(start, "Unterminated comment")),
                        }
                    }
                }
                _ => return Ok(newline),
            }
        }
    }

    /* ===================== Tokens ===================== */

    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        let nl_before = self.skip_trivia()?;
        let start = self.pos;
        let Some(c) = self.peek_char() else {
            return Ok(Token {
                tok: Tok::Eof,
                span: Span::new(self.end, self.end),
                nl_before,
            });
        };

        let tok = if is_id_start(c) {
            Tok::Ident(self.read_ident())
        } else if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).is_some_and(|d| d.is_ascii_digit()))
        {
            Tok::Num(self.read_number()?)
        } else if c == '"' || c == '\'' {
            Tok::Str(self.read_string(c)?)
        } else if c == '`' {
            self.bump_char();
            let (quasis, exprs) = self.read_template(start, 0)?;
            Tok::Template { quasis, exprs }
        } else if c == '#' {
            return Err(self.error(start, "Private class members are not supported"));
        } else {
            self.read_punct()?
        };

        Ok(Token {
            tok,
            span: Span::new(start, self.pos),
            nl_before,
        })
    }

    pub fn read_ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !is_id_continue(c) {
                break;
            }
            self.bump_char();
        }
        self.src[start..self.pos].to_string()
    }

    fn read_punct(&mut self) -> Result<Tok, SyntaxError> {
        for p in PUNCTUATORS {
            if self.starts_with(p) {
                // `a?.5:b` is a conditional, not optional chaining
                if *p == "?." && self.peek_char_at(2).is_some_and(|d| d.is_ascii_digit()) {
                    continue;
                }
                self.pos += p.len();
                return Ok(Tok::Punct(p));
            }
        }
        let c = self.peek_char().unwrap_or(' ');
        Err(self.error(self.pos, format!("Unexpected character '{}'", c)))
    }

    fn read_number(&mut self) -> Result<f64, SyntaxError> {
        let start = self.pos;
        let radix = if self.starts_with("0x") || self.starts_with("0X") {
            Some(16)
        } else if self.starts_with("0b") || self.starts_with("0B") {
            Some(2)
        } else if self.starts_with("0o") || self.starts_with("0O") {
            Some(8)
        } else {
            None
        };

        if let Some(radix) = radix {
            self.pos += 2;
            let digits_start = self.pos;
            while let Some(c) = self.peek_char() {
                if c.is_digit(radix) || c == '_' {
                    self.bump_char();
                } else {
                    break;
                }
            }
            let digits: String = self.src[digits_start..self.pos]
                .chars()
                .filter(|c| *c != '_')
                .collect();
            let value = u64::from_str_radix(&digits, radix)
                .map_err(|_| self.error(start, "Invalid number literal"))?;
            self.check_number_end(start)?;
            return Ok(value as f64);
        }

        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '_' {
                // numeric separator
            } else if c == '.' && !seen_dot && !seen_exp {
                seen_dot = true;
                text.push(c);
            } else if (c == 'e' || c == 'E') && !seen_exp {
                seen_exp = true;
                text.push(c);
                if let Some(sign @ ('+' | '-')) = self.peek_char_at(1) {
                    self.bump_char();
                    text.push(sign);
                }
            } else {
                break;
            }
            self.bump_char();
        }
        self.check_number_end(start)?;
        text.parse::<f64>()
            .map_err(|_| self.error(start, "Invalid number literal"))
    }

    fn check_number_end(&self, start: usize) -> Result<(), SyntaxError> {
        match self.peek_char() {
            Some('n') => Err(self.error(start, "BigInt literals are not supported")),
            Some(c) if is_id_start(c) => {
                Err(self.error(self.pos, "Identifier directly after number"))
            }
            _ => Ok(()),
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, SyntaxError> {
        let start = self.pos;
        self.bump_char();
        let mut out = String::new();
        loop {
            match self.bump_char() {
                None | Some('\n') => return Err(self.error(start, "Unterminated string literal")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    if let Some(ch) = self.read_escape(start)? {
                        out.push(ch);
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    /// Decode one escape sequence after a backslash; `None` for line continuations
    fn read_escape(&mut self, start: usize) -> Result<Option<char>, SyntaxError> {
        let Some(c) = self.bump_char() else {
            return Err(self.error(start, "Unterminated escape sequence"));
        };
        let ch = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' if !self.peek_char().is_some_and(|d| d.is_ascii_digit()) => '\0',
            '\r' => {
                if self.peek_char() == Some('\n') {
                    self.bump_char();
                }
                return Ok(None);
            }
            '\n' => return Ok(None),
            'x' => {
                let code = self.read_hex_digits(2, start)?;
                char::from_u32(code).ok_or_else(|| self.error(start, "Invalid escape"))?
            }
            'u' => {
                let code = if self.peek_char() == Some('{') {
                    self.bump_char();
                    let digits_start = self.pos;
                    while self.peek_char().is_some_and(|d| d.is_ascii_hexdigit()) {
                        self.bump_char();
                    }
                    let digits = &self.src[digits_start..self.pos];
                    if self.bump_char() != Some('}') {
                        return Err(self.error(start, "Invalid Unicode escape"));
                    }
                    u32::from_str_radix(digits, 16)
                        .map_err(|_| self.error(start, "Invalid Unicode escape"))?
                } else {
                    self.read_hex_digits(4, start)?
                };
                char::from_u32(code).unwrap_or('\u{fffd}')
            }
            other => other,
        };
        Ok(Some(ch))
    }

    fn read_hex_digits(&mut self, count: usize, start: usize) -> Result<u32, SyntaxError> {
        let digits_start = self.pos;
        for _ in 0..count {
            match self.bump_char() {
                Some(c) if c.is_ascii_hexdigit() => {}
                _ => return Err(self.error(start, "Invalid escape sequence")),
            }
        }
        u32::from_str_radix(&self.src[digits_start..self.pos], 16)
            .map_err(|_| self.error(start, "Invalid escape sequence"))
    }

    /// Read a template literal body; the opening backtick is already consumed
    fn read_template(
        &mut self,
        start: usize,
        depth: usize,
    ) -> Result<(Vec<String>, Vec<Span>), SyntaxError> {
        if depth > MAX_NESTING {
            return Err(self.error(start, "Template literals nested too deeply"));
        }
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let mut current = String::new();
        loop {
            if self.starts_with("${") {
                self.pos += 2;
                quasis.push(std::mem::take(&mut current));
                let expr_start = self.pos;
                self.skip_to_close_brace(start, depth)?;
                exprs.push(Span::new(expr_start, self.pos));
                self.pos += 1;
                continue;
            }
            match self.bump_char() {
                None => return Err(self.error(start, "Unterminated template literal")),
                Some('`') => {
                    quasis.push(current);
                    return Ok((quasis, exprs));
                }
                Some('\\') => {
                    if let Some(ch) = self.read_escape(start)? {
                        current.push(ch);
                    }
                }
                Some('\r') => {
                    if self.peek_char() == Some('\n') {
                        self.bump_char();
                    }
                    current.push('\n');
                }
                Some(c) => current.push(c),
            }
        }
    }

    /// Advance to the `}` closing a `${` substitution, leaving `pos` on it
    fn skip_to_close_brace(&mut self, start: usize, depth: usize) -> Result<(), SyntaxError> {
        let template_depth = depth;
        let mut depth = 0usize;
        loop {
            let Some(c) = self.peek_char() else {
                return Err(self.error(start, "Unterminated template literal"));
            };
            match c {
                '{' => {
                    depth += 1;
                    self.bump_char();
                }
                '}' => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                    self.bump_char();
                }
                '"' | '\'' => {
                    self.read_string(c)?;
                }
                '`' => {
                    let nested = self.pos;
                    self.bump_char();
                    grow_stack(|| self.read_template(nested, template_depth + 1))?;
                }
                '/' if self.starts_with("//") || self.starts_with("/*") => {
                    self.skip_trivia()?;
                }
                _ => {
                    self.bump_char();
                }
            }
        }
    }

    /// Read a regular expression literal whose opening `/` sits at `start`
    ///
    /// Returns the pattern body and the flags; `pos` ends after the flags.
    pub fn read_regex(&mut self, start: usize) -> Result<(String, String), SyntaxError> {
        self.pos = start + 1;
        let mut in_class = false;
        loop {
            match self.bump_char() {
                None | Some('\n') | Some('\r') | Some('\u{2028}') | Some('\u{2029}') => {
                    return Err(self.error(start, "Unterminated regular expression"));
                }
                Some('\\') => match self.bump_char() {
                    None | Some('\n') | Some('\r') => {
                        return Err(self.error(start, "Unterminated regular expression"));
                    }
                    Some(_) => {}
                },
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        let pattern = self.src[start + 1..self.pos - 1].to_string();
        let flags = self.read_ident();
        Ok((pattern, flags))
    }

    /* ===================== Markup helpers ===================== */

    /// Read a markup name segment (identifier characters plus `-`)
    pub fn read_jsx_ident(&mut self) -> Option<String> {
        let start = self.pos;
        match self.peek_char() {
            Some(c) if is_id_start(c) => {}
            _ => return None,
        }
        while let Some(c) = self.peek_char() {
            if is_id_continue(c) || c == '-' {
                self.bump_char();
            } else {
                break;
            }
        }
        Some(self.src[start..self.pos].to_string())
    }

    /// Read a quoted attribute value; no escape processing
    pub fn read_jsx_string(&mut self) -> Result<String, SyntaxError> {
        let start = self.pos;
        let Some(quote) = self.bump_char() else {
            return Err(self.error(start, "Expected attribute value"));
        };
        let body_start = self.pos;
        loop {
            match self.bump_char() {
                None => return Err(self.error(start, "Unterminated attribute string")),
                Some(c) if c == quote => {
                    return Ok(self.src[body_start..self.pos - 1].to_string());
                }
                Some(_) => {}
            }
        }
    }

    /// Read raw markup text up to the next `{` or `<`
    pub fn read_jsx_text(&mut self) -> Result<String, SyntaxError> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            match c {
                '{' | '<' => break,
                '}' => {
                    return Err(self.error(self.pos, "Unexpected token '}' in markup text"))
                }
                _ => {
                    self.bump_char();
                }
            }
        }
        Ok(self.src[start..self.pos].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<Tok> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.tok == Tok::Eof {
                break;
            }
            out.push(token.tok);
        }
        out
    }

    #[test]
    fn test_punctuators_use_maximal_munch() {
        let toks = lex_all("a ??= b >>> 2 ?. c");
        assert_eq!(toks[1], Tok::Punct("??="));
        assert_eq!(toks[3], Tok::Punct(">>>"));
        assert_eq!(toks[5], Tok::Punct("?."));
    }

    #[test]
    fn test_conditional_with_decimal_is_not_optional_chain() {
        let toks = lex_all("a?.5:1");
        assert_eq!(toks[1], Tok::Punct("?"));
        assert_eq!(toks[2], Tok::Num(0.5));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex_all("1_000"), vec![Tok::Num(1000.0)]);
        assert_eq!(lex_all("0xff"), vec![Tok::Num(255.0)]);
        assert_eq!(lex_all("1.5e3"), vec![Tok::Num(1500.0)]);
        assert_eq!(lex_all(".25"), vec![Tok::Num(0.25)]);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            lex_all(r#"'it\'s' "a\nb" '\u{1F600}'"#),
            vec![
                Tok::Str("it's".into()),
                Tok::Str("a\nb".into()),
                Tok::Str("\u{1F600}".into())
            ]
        );
    }

    #[test]
    fn test_template_records_substitution_spans() {
        let src = "`a${x + 1}b${ {k: 1}.k }c`";
        let toks = lex_all(src);
        let Tok::Template { quasis, exprs } = &toks[0] else {
            panic!("Expected template, got {:?}", toks[0]);
        };
        assert_eq!(quasis, &vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(exprs[0].slice(src), "x + 1");
        assert_eq!(exprs[1].slice(src), " {k: 1}.k ");
    }

    #[test]
    fn test_newline_flag() {
        let mut lexer = Lexer::new("a // c\n b");
        assert!(!lexer.next_token().unwrap().nl_before);
        assert!(lexer.next_token().unwrap().nl_before);
    }

    #[test]
    fn test_unterminated_string_reports_position() {
        let mut lexer = Lexer::new("x = 'abc");
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.offset, 4);
        assert_eq!((err.line, err.column), (1, 5));
    }

    #[test]
    fn test_regex_body_and_flags() {
        let src = r"x = /a[/\]]+\/b/gi;";
        let mut lexer = Lexer::new(src);
        let (pattern, flags) = lexer.read_regex(4).unwrap();
        assert_eq!(pattern, r"a[/\]]+\/b");
        assert_eq!(flags, "gi");
        assert_eq!(lexer.next_token().unwrap().tok, Tok::Punct(";"));
    }

    #[test]
    fn test_unterminated_regex() {
        let mut lexer = Lexer::new("/abc\n/");
        let err = lexer.read_regex(0).unwrap_err();
        assert!(err.message.contains("Unterminated regular expression"));
    }

    #[test]
    fn test_deeply_nested_templates_are_rejected() {
        let depth = 2_000;
        let src = format!("`{}x{}`", "${`".repeat(depth), "`}".repeat(depth));
        let err = Lexer::new(&src).next_token().unwrap_err();
        assert!(err.message.contains("nested too deeply"), "{}", err);
    }
}
