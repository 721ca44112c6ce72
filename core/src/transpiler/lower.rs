//! Lowering: module syntax removal and markup-to-factory-call rewriting
//!
//! The output tree contains no `import`/`export` statements and no markup
//! nodes, and ends with the `return` chosen by the detection chain.

use std::rc::Rc;

use super::detect::{Detection, DetectionChain, ModuleFacts};
use super::TranspileError;
use crate::syntax::ast::*;
use crate::syntax::grow_stack;

/// A lowered module ready for the sandbox
#[derive(Debug, Clone)]
pub struct Lowered {
    pub program: Program,
    /// Id of the detection rule that chose the terminal return
    pub rule_id: &'static str,
    pub detection: Detection,
}

pub fn lower_module(program: Program, chain: &DetectionChain) -> Result<Lowered, TranspileError> {
    let Some((rule_id, detection)) = chain.detect(&ModuleFacts::collect(&program)) else {
        return Err(TranspileError::NoComponentFound);
    };

    let span = program.span;
    let mut body = Vec::with_capacity(program.body.len() + 1);
    let mut default_value: Option<Expr> = None;

    for stmt in program.body {
        match stmt {
            Stmt::Import { .. } | Stmt::ExportNamed { decl: None, .. } => {}
            Stmt::ExportNamed {
                decl: Some(decl), ..
            } => body.push(lower_stmt(*decl)),
            Stmt::ExportDefault { decl, span } => match decl {
                ExportDefault::Function(func) => {
                    let func = lower_function(func);
                    match func.name.clone() {
                        Some(name) => {
                            body.push(Stmt::Function { func, span });
                            default_value = Some(Expr::Ident { name, span });
                        }
                        None => default_value = Some(Expr::Function { func, span }),
                    }
                }
                ExportDefault::Class(class) => {
                    let class = lower_class(class);
                    match class.name.clone() {
                        Some(name) => {
                            body.push(Stmt::Class { class, span });
                            default_value = Some(Expr::Ident { name, span });
                        }
                        None => default_value = Some(Expr::Class { class, span }),
                    }
                }
                ExportDefault::Expr(expr) => default_value = Some(lower_expr(expr)),
            },
            other => body.push(lower_stmt(other)),
        }
    }

    let terminal = match &detection {
        Detection::ExplicitReturn => None,
        Detection::DefaultExport(_) => default_value,
        Detection::Binding(name) => Some(Expr::Ident {
            name: name.clone(),
            span: Span::new(span.end, span.end),
        }),
    };
    if let Some(value) = terminal {
        let ret_span = value.span();
        body.push(Stmt::Return {
            value: Some(value),
            span: ret_span,
        });
    }

    Ok(Lowered {
        program: Program { body, span },
        rule_id,
        detection,
    })
}

/* ===================== Tree rewriting ===================== */

fn take_rc<T: Clone>(rc: Rc<T>) -> T {
    Rc::try_unwrap(rc).unwrap_or_else(|shared| (*shared).clone())
}

fn lower_block(body: Vec<Stmt>) -> Vec<Stmt> {
    body.into_iter().map(lower_stmt).collect()
}

fn lower_box_expr(expr: Box<Expr>) -> Box<Expr> {
    Box::new(lower_expr(*expr))
}

pub fn lower_stmt(stmt: Stmt) -> Stmt {
    grow_stack(|| lower_stmt_inner(stmt))
}

fn lower_stmt_inner(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Block { body, span } => Stmt::Block {
            body: lower_block(body),
            span,
        },
        Stmt::Expr { expr, span } => Stmt::Expr {
            expr: lower_expr(expr),
            span,
        },
        Stmt::VarDecl { kind, decls, span } => Stmt::VarDecl {
            kind,
            decls: lower_decls(decls),
            span,
        },
        Stmt::Function { func, span } => Stmt::Function {
            func: lower_function(func),
            span,
        },
        Stmt::Class { class, span } => Stmt::Class {
            class: lower_class(class),
            span,
        },
        Stmt::Return { value, span } => Stmt::Return {
            value: value.map(lower_expr),
            span,
        },
        Stmt::If {
            test,
            then_s,
            else_s,
            span,
        } => Stmt::If {
            test: lower_expr(test),
            then_s: Box::new(lower_stmt(*then_s)),
            else_s: else_s.map(|s| Box::new(lower_stmt(*s))),
            span,
        },
        Stmt::For {
            init,
            test,
            update,
            body,
            span,
        } => Stmt::For {
            init: init.map(|init| {
                Box::new(match *init {
                    ForInit::VarDecl { kind, decls } => ForInit::VarDecl {
                        kind,
                        decls: lower_decls(decls),
                    },
                    ForInit::Expr(e) => ForInit::Expr(lower_expr(e)),
                })
            }),
            test: test.map(lower_expr),
            update: update.map(lower_expr),
            body: Box::new(lower_stmt(*body)),
            span,
        },
        Stmt::ForEach {
            kind,
            decl,
            target,
            iterable,
            body,
            span,
        } => Stmt::ForEach {
            kind,
            decl,
            target: lower_pattern(target),
            iterable: lower_expr(iterable),
            body: Box::new(lower_stmt(*body)),
            span,
        },
        Stmt::While { test, body, span } => Stmt::While {
            test: lower_expr(test),
            body: Box::new(lower_stmt(*body)),
            span,
        },
        Stmt::DoWhile { body, test, span } => Stmt::DoWhile {
            body: Box::new(lower_stmt(*body)),
            test: lower_expr(test),
            span,
        },
        Stmt::Switch {
            discriminant,
            cases,
            span,
        } => Stmt::Switch {
            discriminant: lower_expr(discriminant),
            cases: cases
                .into_iter()
                .map(|c| SwitchCase {
                    test: c.test.map(lower_expr),
                    body: lower_block(c.body),
                })
                .collect(),
            span,
        },
        Stmt::Throw { value, span } => Stmt::Throw {
            value: lower_expr(value),
            span,
        },
        Stmt::Try {
            block,
            handler,
            finalizer,
            span,
        } => Stmt::Try {
            block: lower_block(block),
            handler: handler.map(|h| CatchClause {
                param: h.param.map(lower_pattern),
                body: lower_block(h.body),
            }),
            finalizer: finalizer.map(lower_block),
            span,
        },
        Stmt::ExportNamed {
            decl: Some(decl), ..
        } => lower_stmt(*decl),
        Stmt::ExportNamed { decl: None, span } | Stmt::Import { span, .. } => Stmt::Empty { span },
        other => other,
    }
}

fn lower_decls(decls: Vec<Declarator>) -> Vec<Declarator> {
    decls
        .into_iter()
        .map(|d| Declarator {
            target: lower_pattern(d.target),
            init: d.init.map(lower_expr),
            span: d.span,
        })
        .collect()
}

fn lower_pattern(pattern: Pattern) -> Pattern {
    match pattern {
        Pattern::Object { props, rest, span } => Pattern::Object {
            props: props
                .into_iter()
                .map(|p| PatternProp {
                    key: lower_key(p.key),
                    value: lower_pattern(p.value),
                    span: p.span,
                })
                .collect(),
            rest: rest.map(|r| Box::new(lower_pattern(*r))),
            span,
        },
        Pattern::Array { elems, rest, span } => Pattern::Array {
            elems: elems.into_iter().map(|e| e.map(lower_pattern)).collect(),
            rest: rest.map(|r| Box::new(lower_pattern(*r))),
            span,
        },
        Pattern::Default {
            target,
            default,
            span,
        } => Pattern::Default {
            target: Box::new(lower_pattern(*target)),
            default: lower_box_expr(default),
            span,
        },
        Pattern::Member { expr, span } => Pattern::Member {
            expr: lower_box_expr(expr),
            span,
        },
        ident => ident,
    }
}

fn lower_key(key: PropKey) -> PropKey {
    match key {
        PropKey::Computed(e) => PropKey::Computed(lower_box_expr(e)),
        other => other,
    }
}

fn lower_function(func: Rc<Function>) -> Rc<Function> {
    let func = take_rc(func);
    Rc::new(Function {
        params: func
            .params
            .into_iter()
            .map(|p| Param {
                pattern: lower_pattern(p.pattern),
                rest: p.rest,
            })
            .collect(),
        body: match func.body {
            FunctionBody::Block(body) => FunctionBody::Block(lower_block(body)),
            FunctionBody::Expr(e) => FunctionBody::Expr(lower_box_expr(e)),
        },
        ..func
    })
}

fn lower_class(class: Rc<Class>) -> Rc<Class> {
    let class = take_rc(class);
    Rc::new(Class {
        extends: class.extends.map(lower_box_expr),
        constructor: class.constructor.map(lower_function),
        methods: class
            .methods
            .into_iter()
            .map(|m| ClassMethod {
                func: lower_function(m.func),
                ..m
            })
            .collect(),
        fields: class
            .fields
            .into_iter()
            .map(|f| ClassField {
                value: f.value.map(lower_expr),
                ..f
            })
            .collect(),
        ..class
    })
}

fn lower_args(args: Vec<ExprOrSpread>) -> Vec<ExprOrSpread> {
    args.into_iter().map(lower_arg).collect()
}

fn lower_arg(arg: ExprOrSpread) -> ExprOrSpread {
    match arg {
        ExprOrSpread::Expr(e) => ExprOrSpread::Expr(lower_expr(e)),
        ExprOrSpread::Spread(e) => ExprOrSpread::Spread(lower_expr(e)),
    }
}

pub fn lower_expr(expr: Expr) -> Expr {
    grow_stack(|| lower_expr_inner(expr))
}

fn lower_expr_inner(expr: Expr) -> Expr {
    match expr {
        Expr::Jsx(el) => lower_element(*el),
        Expr::Template {
            quasis,
            exprs,
            span,
        } => Expr::Template {
            quasis,
            exprs: exprs.into_iter().map(lower_expr).collect(),
            span,
        },
        Expr::Array { elems, span } => Expr::Array {
            elems: elems.into_iter().map(|e| e.map(lower_arg)).collect(),
            span,
        },
        Expr::Object { props, span } => Expr::Object {
            props: props.into_iter().map(lower_prop).collect(),
            span,
        },
        Expr::Function { func, span } => Expr::Function {
            func: lower_function(func),
            span,
        },
        Expr::Class { class, span } => Expr::Class {
            class: lower_class(class),
            span,
        },
        Expr::Unary { op, arg, span } => Expr::Unary {
            op,
            arg: lower_box_expr(arg),
            span,
        },
        Expr::Update {
            increment,
            prefix,
            target,
            span,
        } => Expr::Update {
            increment,
            prefix,
            target: lower_box_expr(target),
            span,
        },
        Expr::Binary {
            op,
            left,
            right,
            span,
        } => Expr::Binary {
            op,
            left: lower_box_expr(left),
            right: lower_box_expr(right),
            span,
        },
        Expr::Logical {
            op,
            left,
            right,
            span,
        } => Expr::Logical {
            op,
            left: lower_box_expr(left),
            right: lower_box_expr(right),
            span,
        },
        Expr::Assign {
            op,
            target,
            value,
            span,
        } => Expr::Assign {
            op,
            target: Box::new(lower_pattern(*target)),
            value: lower_box_expr(value),
            span,
        },
        Expr::Conditional {
            test,
            consequent,
            alternate,
            span,
        } => Expr::Conditional {
            test: lower_box_expr(test),
            consequent: lower_box_expr(consequent),
            alternate: lower_box_expr(alternate),
            span,
        },
        Expr::Call {
            callee,
            args,
            optional,
            span,
        } => Expr::Call {
            callee: lower_box_expr(callee),
            args: lower_args(args),
            optional,
            span,
        },
        Expr::New { callee, args, span } => Expr::New {
            callee: lower_box_expr(callee),
            args: lower_args(args),
            span,
        },
        Expr::SuperCall { args, span } => Expr::SuperCall {
            args: lower_args(args),
            span,
        },
        Expr::Member {
            object,
            property,
            optional,
            span,
        } => Expr::Member {
            object: lower_box_expr(object),
            property: match property {
                MemberProp::Computed(e) => MemberProp::Computed(lower_box_expr(e)),
                ident => ident,
            },
            optional,
            span,
        },
        Expr::Sequence { exprs, span } => Expr::Sequence {
            exprs: exprs.into_iter().map(lower_expr).collect(),
            span,
        },
        Expr::Paren { expr, span } => Expr::Paren {
            expr: lower_box_expr(expr),
            span,
        },
        Expr::OptionalChain { expr, span } => Expr::OptionalChain {
            expr: lower_box_expr(expr),
            span,
        },
        leaf => leaf,
    }
}

fn lower_prop(prop: ObjProp) -> ObjProp {
    match prop {
        ObjProp::KeyValue {
            key,
            value,
            shorthand,
            span,
        } => ObjProp::KeyValue {
            key: lower_key(key),
            value: lower_expr(value),
            shorthand,
            span,
        },
        ObjProp::Method { key, func, span } => ObjProp::Method {
            key: lower_key(key),
            func: lower_function(func),
            span,
        },
        ObjProp::Spread { expr, span } => ObjProp::Spread {
            expr: lower_expr(expr),
            span,
        },
    }
}

/* ===================== Markup ===================== */

fn react_member(name: &str, span: Span) -> Expr {
    Expr::Member {
        object: Box::new(Expr::Ident {
            name: "React".to_string(),
            span,
        }),
        property: MemberProp::Ident(name.to_string()),
        optional: false,
        span,
    }
}

fn element_type(name: &JsxName, span: Span) -> Expr {
    match name {
        JsxName::Fragment => react_member("Fragment", span),
        JsxName::Ident(tag) if name.is_intrinsic() || tag.contains(['-', ':']) => Expr::Str {
            v: tag.clone(),
            span,
        },
        JsxName::Ident(tag) => Expr::Ident {
            name: tag.clone(),
            span,
        },
        JsxName::Member(path) => {
            let mut parts = path.split('.');
            let head = parts.next().unwrap_or_default();
            let mut expr = Expr::Ident {
                name: head.to_string(),
                span,
            };
            for part in parts {
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Ident(part.to_string()),
                    optional: false,
                    span,
                };
            }
            expr
        }
    }
}

fn attr_key(name: &str) -> PropKey {
    if name.contains(['-', ':']) {
        PropKey::Str(name.to_string())
    } else {
        PropKey::Ident(name.to_string())
    }
}

/// `<tag a="x" {...b}>kids</tag>` → `React.createElement(tag, {a: "x", ...b}, kids)`
fn lower_element(el: JsxElement) -> Expr {
    let span = el.span;
    let tag = element_type(&el.name, el.name_span);

    let props = if el.attrs.is_empty() {
        Expr::Null { span: el.opening_span }
    } else {
        let props = el
            .attrs
            .into_iter()
            .map(|attr| match attr {
                JsxAttr::Spread { expr, span } => ObjProp::Spread {
                    expr: lower_expr(expr),
                    span,
                },
                JsxAttr::Attr {
                    name, value, span, ..
                } => {
                    let value = match value {
                        None => Expr::Bool { v: true, span },
                        Some(JsxAttrValue::Str { value, span }) => Expr::Str {
                            v: decode_entities(&value),
                            span,
                        },
                        Some(JsxAttrValue::Expr { expr, .. }) => lower_expr(expr),
                        Some(JsxAttrValue::Element(el)) => lower_element(*el),
                    };
                    ObjProp::KeyValue {
                        key: attr_key(&name),
                        value,
                        shorthand: false,
                        span,
                    }
                }
            })
            .collect();
        Expr::Object {
            props,
            span: el.opening_span,
        }
    };

    let mut args = vec![ExprOrSpread::Expr(tag), ExprOrSpread::Expr(props)];
    for child in el.children {
        match child {
            JsxChild::Text { raw, span } => {
                if let Some(text) = clean_jsx_text(&raw) {
                    args.push(ExprOrSpread::Expr(Expr::Str { v: text, span }));
                }
            }
            JsxChild::Expr { expr: None, .. } => {}
            JsxChild::Expr {
                expr: Some(expr), ..
            } => args.push(ExprOrSpread::Expr(lower_expr(expr))),
            JsxChild::Element(child) => args.push(ExprOrSpread::Expr(lower_element(child))),
        }
    }

    Expr::Call {
        callee: Box::new(react_member("createElement", span)),
        args,
        optional: false,
        span,
    }
}

/// Markup text whitespace rules
///
/// Lines are trimmed (the first keeps its leading and the last its trailing
/// whitespace), whitespace-only lines are dropped, and the rest are joined
/// with single spaces. Returns `None` when nothing remains.
pub fn clean_jsx_text(raw: &str) -> Option<String> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();
    let last_non_empty = lines
        .iter()
        .rposition(|line| line.chars().any(|c| c != ' ' && c != '\t'));

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.replace('\t', " ");
        let mut trimmed: &str = &line;
        if i != 0 {
            trimmed = trimmed.trim_start_matches(' ');
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches(' ');
        }
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        if Some(i) != last_non_empty {
            out.push(' ');
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(decode_entities(&out))
    }
}

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
    ("copy", '\u{a9}'),
    ("reg", '\u{ae}'),
    ("trade", '\u{2122}'),
    ("hellip", '\u{2026}'),
    ("mdash", '\u{2014}'),
    ("ndash", '\u{2013}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201c}'),
    ("rdquo", '\u{201d}'),
    ("bull", '\u{2022}'),
    ("middot", '\u{b7}'),
    ("times", '\u{d7}'),
    ("larr", '\u{2190}'),
    ("rarr", '\u{2192}'),
    ("lbrace", '{'),
    ("rbrace", '}'),
];

/// Decode HTML character references (`&amp;`, `&#123;`, `&#x7B;`)
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|semi| *semi <= 10).and_then(|semi| {
            let body = &tail[1..semi];
            let ch = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                NAMED_ENTITIES
                    .iter()
                    .find(|(name, _)| *name == body)
                    .map(|(_, c)| *c)
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
