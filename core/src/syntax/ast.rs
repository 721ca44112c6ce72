//! Abstract Syntax Tree node types
//!
//! Every node carries a byte [`Span`] into the text it was parsed from. Function
//! and class bodies are reference counted so the interpreter can build closures
//! without copying the tree.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

/* ===================== Spans ===================== */

/// Byte range into the parsed text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Create a span that covers both self and other
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Shift both ends by `base` bytes
    pub fn offset(&self, base: usize) -> Span {
        Span {
            start: self.start + base,
            end: self.end + base,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slice `text` with this span
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Convert byte offset to a 1-based (line, column) pair
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/* ===================== Program ===================== */

/// A parsed module: top-level statements in source order
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Variable declaration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarKind::Var => "var",
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }
}

/// For-each loop kind (in vs of)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForLoopKind {
    /// for (const k in obj) - iterates over keys
    In,
    /// for (const v of arr) - iterates over values
    Of,
}

/// Number to string the way JavaScript prints it (`1`, `0.5`, `1e+21`, `NaN`)
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return format!("{}", n);
    }
    let exp = format!("{:e}", n);
    match exp.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
        _ => exp,
    }
}

/* ===================== Patterns ===================== */

/// Binding target (declarations, parameters, destructuring assignment)
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident {
        name: String,
        span: Span,
    },
    Object {
        props: Vec<PatternProp>,
        rest: Option<Box<Pattern>>,
        span: Span,
    },
    Array {
        elems: Vec<Option<Pattern>>,
        rest: Option<Box<Pattern>>,
        span: Span,
    },
    /// `target = default`
    Default {
        target: Box<Pattern>,
        default: Box<Expr>,
        span: Span,
    },
    /// Member target, only valid on the left of an assignment
    Member {
        expr: Box<Expr>,
        span: Span,
    },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Ident { span, .. }
            | Pattern::Object { span, .. }
            | Pattern::Array { span, .. }
            | Pattern::Default { span, .. }
            | Pattern::Member { span, .. } => *span,
        }
    }

    /// Names introduced by this pattern, in source order
    pub fn bound_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Ident { name, .. } => out.push(name.clone()),
            Pattern::Object { props, rest, .. } => {
                for prop in props {
                    prop.value.collect_names(out);
                }
                if let Some(rest) = rest {
                    rest.collect_names(out);
                }
            }
            Pattern::Array { elems, rest, .. } => {
                for elem in elems.iter().flatten() {
                    elem.collect_names(out);
                }
                if let Some(rest) = rest {
                    rest.collect_names(out);
                }
            }
            Pattern::Default { target, .. } => target.collect_names(out),
            Pattern::Member { .. } => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternProp {
    pub key: PropKey,
    pub value: Pattern,
    pub span: Span,
}

/// Object property key
#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Ident(String),
    Str(String),
    Num(f64),
    Computed(Box<Expr>),
}

/* ===================== Functions & Classes ===================== */

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// Arrow function expression body
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub span: Span,
    /// Span of the body (block braces included, or the arrow expression)
    pub body_span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMethod {
    pub name: String,
    pub func: Rc<Function>,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassField {
    pub name: String,
    pub value: Option<Expr>,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: Option<String>,
    pub extends: Option<Box<Expr>>,
    pub constructor: Option<Rc<Function>>,
    pub methods: Vec<ClassMethod>,
    pub fields: Vec<ClassField>,
    pub span: Span,
}

/* ===================== Statements ===================== */

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub target: Pattern,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    VarDecl {
        kind: VarKind,
        decls: Vec<Declarator>,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Vec<Stmt>,
}

/// What follows `export default`
#[derive(Debug, Clone, PartialEq)]
pub enum ExportDefault {
    Expr(Expr),
    Function(Rc<Function>),
    Class(Rc<Class>),
}

/// Statement AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block {
        body: Vec<Stmt>,
        span: Span,
    },
    Empty {
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
    VarDecl {
        kind: VarKind,
        decls: Vec<Declarator>,
        span: Span,
    },
    Function {
        func: Rc<Function>,
        span: Span,
    },
    Class {
        class: Rc<Class>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    If {
        test: Expr,
        then_s: Box<Stmt>,
        else_s: Option<Box<Stmt>>,
        span: Span,
    },
    For {
        init: Option<Box<ForInit>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    ForEach {
        kind: ForLoopKind,
        decl: Option<VarKind>,
        target: Pattern,
        iterable: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
        span: Span,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Throw {
        value: Expr,
        span: Span,
    },
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
        span: Span,
    },
    /// `import ... from "source"` (the transpiler discards these)
    Import {
        source: String,
        span: Span,
    },
    ExportDefault {
        decl: ExportDefault,
        span: Span,
    },
    /// `export <declaration>` or `export { a, b }` (decl is `None`)
    ExportNamed {
        decl: Option<Box<Stmt>>,
        span: Span,
    },
}

impl Stmt {
    /// Get the span of this statement
    pub fn span(&self) -> Span {
        match self {
            Stmt::Block { span, .. }
            | Stmt::Empty { span }
            | Stmt::Expr { span, .. }
            | Stmt::VarDecl { span, .. }
            | Stmt::Function { span, .. }
            | Stmt::Class { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::If { span, .. }
            | Stmt::For { span, .. }
            | Stmt::ForEach { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Throw { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Import { span, .. }
            | Stmt::ExportDefault { span, .. }
            | Stmt::ExportNamed { span, .. } => *span,
        }
    }
}

/* ===================== Expressions ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    Typeof,
    Void,
    Delete,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::BitNot => "~",
            UnaryOp::Typeof => "typeof ",
            UnaryOp::Void => "void ",
            UnaryOp::Delete => "delete ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    Instanceof,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Exp => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::In => "in",
            BinaryOp::Instanceof => "instanceof",
        }
    }
}

/// Short-circuit operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,     // &&
    Or,      // ||
    Nullish, // ??
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Nullish => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Arith(BinaryOp),
    Logical(LogicalOp),
}

impl AssignOp {
    pub fn as_str(&self) -> String {
        match self {
            AssignOp::Assign => "=".to_string(),
            AssignOp::Arith(op) => format!("{}=", op.as_str()),
            AssignOp::Logical(op) => format!("{}=", op.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    Ident(String),
    Computed(Box<Expr>),
}

/// Call argument or array element
#[derive(Debug, Clone, PartialEq)]
pub enum ExprOrSpread {
    Expr(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjProp {
    KeyValue {
        key: PropKey,
        value: Expr,
        shorthand: bool,
        span: Span,
    },
    Method {
        key: PropKey,
        func: Rc<Function>,
        span: Span,
    },
    Spread {
        expr: Expr,
        span: Span,
    },
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num {
        v: f64,
        span: Span,
    },
    Str {
        v: String,
        span: Span,
    },
    Bool {
        v: bool,
        span: Span,
    },
    Null {
        span: Span,
    },
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
        span: Span,
    },
    /// `/pattern/flags`, body kept as written
    Regex {
        pattern: String,
        flags: String,
        span: Span,
    },
    Ident {
        name: String,
        span: Span,
    },
    This {
        span: Span,
    },
    Array {
        elems: Vec<Option<ExprOrSpread>>,
        span: Span,
    },
    Object {
        props: Vec<ObjProp>,
        span: Span,
    },
    Function {
        func: Rc<Function>,
        span: Span,
    },
    Class {
        class: Rc<Class>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
        span: Span,
    },
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Assign {
        op: AssignOp,
        target: Box<Pattern>,
        value: Box<Expr>,
        span: Span,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<ExprOrSpread>,
        optional: bool,
        span: Span,
    },
    New {
        callee: Box<Expr>,
        args: Vec<ExprOrSpread>,
        span: Span,
    },
    SuperCall {
        args: Vec<ExprOrSpread>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        property: MemberProp,
        optional: bool,
        span: Span,
    },
    Sequence {
        exprs: Vec<Expr>,
        span: Span,
    },
    Paren {
        expr: Box<Expr>,
        span: Span,
    },
    /// A member/call chain containing `?.`; a nullish link short-circuits
    /// the whole chain to `undefined`
    OptionalChain {
        expr: Box<Expr>,
        span: Span,
    },
    Jsx(Box<JsxElement>),
}

impl Expr {
    /// Get the span of this expression
    pub fn span(&self) -> Span {
        match self {
            Expr::Num { span, .. }
            | Expr::Str { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Null { span }
            | Expr::Template { span, .. }
            | Expr::Regex { span, .. }
            | Expr::Ident { span, .. }
            | Expr::This { span }
            | Expr::Array { span, .. }
            | Expr::Object { span, .. }
            | Expr::Function { span, .. }
            | Expr::Class { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Update { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Logical { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. }
            | Expr::SuperCall { span, .. }
            | Expr::Member { span, .. }
            | Expr::Sequence { span, .. }
            | Expr::Paren { span, .. }
            | Expr::OptionalChain { span, .. } => *span,
            Expr::Jsx(el) => el.span,
        }
    }

    /// Strip any number of enclosing parentheses
    pub fn unparen(&self) -> &Expr {
        let mut expr = self;
        while let Expr::Paren { expr: inner, .. } = expr {
            expr = inner;
        }
        expr
    }
}

/* ===================== Markup ===================== */

/// Tag name of a markup element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsxName {
    /// `<>...</>`
    Fragment,
    /// `div`, `my-element`, `Card`
    Ident(String),
    /// `Foo.Bar`
    Member(String),
}

impl JsxName {
    pub fn as_str(&self) -> &str {
        match self {
            JsxName::Fragment => "",
            JsxName::Ident(name) | JsxName::Member(name) => name,
        }
    }

    /// Lowercase single identifiers are host (DOM) tags
    pub fn is_intrinsic(&self) -> bool {
        match self {
            JsxName::Ident(name) => name
                .chars()
                .next()
                .map(|c| c.is_ascii_lowercase())
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxAttrValue {
    /// `name="text"`; span covers the quotes
    Str { value: String, span: Span },
    /// `name={expr}`; span covers the braces
    Expr { expr: Expr, span: Span },
    /// `name=<el/>`
    Element(Box<JsxElement>),
}

impl JsxAttrValue {
    pub fn span(&self) -> Span {
        match self {
            JsxAttrValue::Str { span, .. } | JsxAttrValue::Expr { span, .. } => *span,
            JsxAttrValue::Element(el) => el.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxAttr {
    Attr {
        name: String,
        name_span: Span,
        value: Option<JsxAttrValue>,
        span: Span,
    },
    /// `{...expr}`
    Spread { expr: Expr, span: Span },
}

impl JsxAttr {
    pub fn span(&self) -> Span {
        match self {
            JsxAttr::Attr { span, .. } | JsxAttr::Spread { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsxChild {
    /// Raw text between tags, exactly as written
    Text { raw: String, span: Span },
    /// `{expr}`; `expr` is `None` for `{}` and comment-only containers
    Expr { expr: Option<Expr>, span: Span },
    Element(JsxElement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsxElement {
    pub name: JsxName,
    pub attrs: Vec<JsxAttr>,
    pub children: Vec<JsxChild>,
    pub self_closing: bool,
    /// `<tag ...>` including the angle brackets
    pub opening_span: Span,
    /// Tag name inside the opening element (empty at `<` + 1 for fragments)
    pub name_span: Span,
    pub span: Span,
}
