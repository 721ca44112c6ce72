//! Locator chain for the markup a component returns
//!
//! Locators run in order and the first hit wins:
//!
//! 1. `structural` - parse the module, pick the component with the detection
//!    chain and take the last top-level `return` of its body whose argument is
//!    markup (or an arrow's markup body)
//! 2. `textual` - scan for the first `return` outside strings and comments
//!    that is followed by an optional `(` and a `<`
//!
//! The textual locator exists for sources that do not parse as a whole, such
//! as a half-typed helper below a finished component.

use crate::syntax::ast::{Class, ExportDefault, Expr, ExprOrSpread, Function, FunctionBody, Program, Stmt};
use crate::syntax::{parse_module, Span};
use crate::transpiler::detect::{DefaultExport, Detection, DetectionChain, ModuleFacts};

/// Where a locator found the markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    /// Exact extent of a parsed markup expression
    Span(Span),
    /// Offset of the opening `<`; the extent is found by parsing from there
    Start(usize),
}

pub trait Locator: Send + Sync {
    fn id(&self) -> &'static str;

    fn locate(&self, source: &str) -> Option<Site>;
}

/* ===================== Structural ===================== */

pub struct StructuralLocator {
    chain: DetectionChain,
}

impl StructuralLocator {
    pub fn new() -> Self {
        Self {
            chain: DetectionChain::new(),
        }
    }
}

impl Default for StructuralLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Locator for StructuralLocator {
    fn id(&self) -> &'static str {
        "structural"
    }

    fn locate(&self, source: &str) -> Option<Site> {
        let program = parse_module(source).ok()?;
        let (_, detection) = self.chain.detect(&ModuleFacts::collect(&program))?;
        component_markup(&program, &detection).map(Site::Span)
    }
}

fn component_markup(program: &Program, detection: &Detection) -> Option<Span> {
    match detection {
        Detection::ExplicitReturn => {
            let value = program.body.iter().rev().find_map(|stmt| match stmt {
                Stmt::Return { value, .. } => Some(value.as_ref()),
                _ => None,
            })??;
            match value.unparen() {
                Expr::Ident { name, .. } => named_markup(&program.body, name),
                other => expr_markup(other),
            }
        }
        Detection::DefaultExport(DefaultExport::Anonymous) => {
            program.body.iter().rev().find_map(|stmt| match stmt {
                Stmt::ExportDefault { decl, .. } => match decl {
                    ExportDefault::Function(func) => function_markup(func),
                    ExportDefault::Class(class) => class_markup(class),
                    ExportDefault::Expr(expr) => expr_markup(expr),
                },
                _ => None,
            })
        }
        Detection::DefaultExport(DefaultExport::Named(name)) | Detection::Binding(name) => {
            named_markup(&program.body, name)
        }
    }
}

/// Markup of the last top-level declaration of `name`
fn named_markup(body: &[Stmt], name: &str) -> Option<Span> {
    body.iter().rev().find_map(|stmt| declaration_markup(stmt, name))
}

fn declaration_markup(stmt: &Stmt, name: &str) -> Option<Span> {
    match stmt {
        Stmt::Function { func, .. } if func.name.as_deref() == Some(name) => function_markup(func),
        Stmt::Class { class, .. } if class.name.as_deref() == Some(name) => class_markup(class),
        Stmt::VarDecl { decls, .. } => decls.iter().rev().find_map(|decl| {
            let bound = decl.target.bound_names();
            if bound.len() == 1 && bound[0] == name {
                decl.init.as_ref().and_then(expr_markup)
            } else {
                None
            }
        }),
        Stmt::ExportNamed { decl: Some(decl), .. } => declaration_markup(decl, name),
        Stmt::ExportDefault { decl, .. } => match decl {
            ExportDefault::Function(func) if func.name.as_deref() == Some(name) => {
                function_markup(func)
            }
            ExportDefault::Class(class) if class.name.as_deref() == Some(name) => {
                class_markup(class)
            }
            _ => None,
        },
        _ => None,
    }
}

fn expr_markup(expr: &Expr) -> Option<Span> {
    match expr.unparen() {
        Expr::Jsx(el) => Some(el.span),
        Expr::Function { func, .. } => function_markup(func),
        Expr::Class { class, .. } => class_markup(class),
        // memo(...) / forwardRef(...) wrappers
        Expr::Call { args, .. } => match args.first() {
            Some(ExprOrSpread::Expr(inner)) => expr_markup(inner),
            _ => None,
        },
        _ => None,
    }
}

fn function_markup(func: &Function) -> Option<Span> {
    match &func.body {
        FunctionBody::Expr(expr) => match expr.unparen() {
            Expr::Jsx(el) => Some(el.span),
            _ => None,
        },
        FunctionBody::Block(body) => body.iter().rev().find_map(|stmt| match stmt {
            Stmt::Return {
                value: Some(value), ..
            } => match value.unparen() {
                Expr::Jsx(el) => Some(el.span),
                _ => None,
            },
            _ => None,
        }),
    }
}

fn class_markup(class: &Class) -> Option<Span> {
    class
        .methods
        .iter()
        .find(|m| m.name == "render" && !m.is_static)
        .and_then(|m| function_markup(&m.func))
}

/* ===================== Textual ===================== */

pub struct TextualLocator;

impl Locator for TextualLocator {
    fn id(&self) -> &'static str {
        "textual"
    }

    fn locate(&self, source: &str) -> Option<Site> {
        let bytes = source.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    i = find_from(bytes, i, b"\n").unwrap_or(bytes.len());
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    i = find_from(bytes, i + 2, b"*/").map_or(bytes.len(), |end| end + 2);
                }
                quote @ (b'"' | b'\'' | b'`') => {
                    i = skip_string(bytes, i, quote);
                }
                b'r' if is_keyword_at(bytes, i, b"return") => {
                    let mut j = skip_ws(bytes, i + b"return".len());
                    if bytes.get(j) == Some(&b'(') {
                        j = skip_ws(bytes, j + 1);
                    }
                    if bytes.get(j) == Some(&b'<') {
                        return Some(Site::Start(j));
                    }
                    i += b"return".len();
                }
                _ => i += 1,
            }
        }
        None
    }
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Offset just past the string opened at `start`
fn skip_string(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' if quote != b'`' => return i,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
        i += 1;
    }
    i
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn is_keyword_at(bytes: &[u8], i: usize, word: &[u8]) -> bool {
    bytes.get(i..i + word.len()) == Some(word)
        && (i == 0 || !is_ident_byte(bytes[i - 1]))
        && !bytes.get(i + word.len()).is_some_and(|b| is_ident_byte(*b))
}

/* ===================== Chain ===================== */

pub struct LocatorChain {
    locators: Vec<Box<dyn Locator>>,
}

impl LocatorChain {
    pub fn new() -> Self {
        Self {
            locators: vec![Box::new(StructuralLocator::new()), Box::new(TextualLocator)],
        }
    }

    /// First locator hit and the id of the locator that produced it
    pub fn locate(&self, source: &str) -> Option<(&'static str, Site)> {
        self.locators
            .iter()
            .find_map(|l| l.locate(source).map(|site| (l.id(), site)))
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.locators.iter().map(|l| l.id())
    }
}

impl Default for LocatorChain {
    fn default() -> Self {
        Self::new()
    }
}
