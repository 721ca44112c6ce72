//! Print a (lowered) program back as JavaScript text

use crate::syntax::ast::*;
use crate::syntax::grow_stack;

const INDENT: &str = "  ";

/// Precedence levels, higher binds tighter
mod prec {
    pub const SEQUENCE: u8 = 1;
    pub const ASSIGN: u8 = 2;
    pub const CONDITIONAL: u8 = 3;
    pub const UNARY: u8 = 16;
    pub const UPDATE: u8 = 17;
    pub const CALL: u8 = 18;
    pub const PRIMARY: u8 = 20;
}

fn binary_prec(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::BitOr => 7,
        BinaryOp::BitXor => 8,
        BinaryOp::BitAnd => 9,
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 10,
        BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq
        | BinaryOp::In
        | BinaryOp::Instanceof => 11,
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 12,
        BinaryOp::Add | BinaryOp::Sub => 13,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 14,
        BinaryOp::Exp => 15,
    }
}

fn logical_prec(op: LogicalOp) -> u8 {
    match op {
        LogicalOp::Nullish => 4,
        LogicalOp::Or => 5,
        LogicalOp::And => 6,
    }
}

fn expr_prec(expr: &Expr) -> u8 {
    match expr {
        Expr::Sequence { .. } => prec::SEQUENCE,
        Expr::Assign { .. } => prec::ASSIGN,
        Expr::Function { func, .. } if func.is_arrow => prec::ASSIGN,
        Expr::Conditional { .. } => prec::CONDITIONAL,
        Expr::Logical { op, .. } => logical_prec(*op),
        Expr::Binary { op, .. } => binary_prec(*op),
        Expr::Unary { .. } => prec::UNARY,
        Expr::Update { .. } => prec::UPDATE,
        Expr::Call { .. }
        | Expr::New { .. }
        | Expr::SuperCall { .. }
        | Expr::Member { .. }
        | Expr::OptionalChain { .. } => prec::CALL,
        _ => prec::PRIMARY,
    }
}

/// JS-style string literal
pub fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if crate::syntax::lexer::is_id_start(c))
        && chars.all(crate::syntax::lexer::is_id_continue)
}

pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::default();
    for stmt in &program.body {
        printer.stmt(stmt);
    }
    printer.out
}

pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr, prec::SEQUENCE);
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn line_start(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    /* ===================== Statements ===================== */

    fn stmt(&mut self, stmt: &Stmt) {
        self.line_start();
        self.stmt_inline(stmt);
        self.push("\n");
    }

    fn block(&mut self, body: &[Stmt]) {
        if body.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{\n");
        self.depth += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.depth -= 1;
        self.line_start();
        self.push("}");
    }

    /// Statement body of if/loops: blocks stay inline, others get their own line
    fn body(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { body, .. } => {
                self.push(" ");
                self.block(body);
            }
            other => {
                self.push("\n");
                self.depth += 1;
                self.line_start();
                self.stmt_inline(other);
                self.depth -= 1;
            }
        }
    }

    fn stmt_inline(&mut self, stmt: &Stmt) {
        grow_stack(|| self.stmt_inline_inner(stmt))
    }

    fn stmt_inline_inner(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { body, .. } => self.block(body),
            Stmt::Empty { .. } => self.push(";"),
            Stmt::Expr { expr, .. } => {
                let needs_parens = matches!(
                    expr,
                    Expr::Object { .. } | Expr::Class { .. }
                ) || matches!(expr, Expr::Function { func, .. } if !func.is_arrow);
                if needs_parens {
                    self.push("(");
                    self.expr(expr, prec::SEQUENCE);
                    self.push(")");
                } else {
                    self.expr(expr, prec::SEQUENCE);
                }
                self.push(";");
            }
            Stmt::VarDecl { kind, decls, .. } => {
                self.var_decl(*kind, decls);
                self.push(";");
            }
            Stmt::Function { func, .. } => self.function(func),
            Stmt::Class { class, .. } => self.class(class),
            Stmt::Return { value, .. } => {
                self.push("return");
                if let Some(value) = value {
                    self.push(" ");
                    self.expr(value, prec::SEQUENCE);
                }
                self.push(";");
            }
            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                self.push("if (");
                self.expr(test, prec::SEQUENCE);
                self.push(")");
                self.body(then_s);
                if let Some(else_s) = else_s {
                    if matches!(**then_s, Stmt::Block { .. }) {
                        self.push(" else");
                    } else {
                        self.push("\n");
                        self.line_start();
                        self.push("else");
                    }
                    if let Stmt::If { .. } = **else_s {
                        self.push(" ");
                        self.stmt_inline(else_s);
                    } else {
                        self.body(else_s);
                    }
                }
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                self.push("for (");
                match init.as_deref() {
                    Some(ForInit::VarDecl { kind, decls }) => self.var_decl(*kind, decls),
                    Some(ForInit::Expr(e)) => self.expr(e, prec::SEQUENCE),
                    None => {}
                }
                self.push(";");
                if let Some(test) = test {
                    self.push(" ");
                    self.expr(test, prec::SEQUENCE);
                }
                self.push(";");
                if let Some(update) = update {
                    self.push(" ");
                    self.expr(update, prec::SEQUENCE);
                }
                self.push(")");
                self.body(body);
            }
            Stmt::ForEach {
                kind,
                decl,
                target,
                iterable,
                body,
                ..
            } => {
                self.push("for (");
                if let Some(decl) = decl {
                    self.push(decl.as_str());
                    self.push(" ");
                }
                self.pattern(target);
                self.push(match kind {
                    ForLoopKind::In => " in ",
                    ForLoopKind::Of => " of ",
                });
                self.expr(iterable, prec::ASSIGN);
                self.push(")");
                self.body(body);
            }
            Stmt::While { test, body, .. } => {
                self.push("while (");
                self.expr(test, prec::SEQUENCE);
                self.push(")");
                self.body(body);
            }
            Stmt::DoWhile { body, test, .. } => {
                self.push("do");
                self.body(body);
                self.push(" while (");
                self.expr(test, prec::SEQUENCE);
                self.push(");");
            }
            Stmt::Switch {
                discriminant,
                cases,
                ..
            } => {
                self.push("switch (");
                self.expr(discriminant, prec::SEQUENCE);
                self.push(") {\n");
                self.depth += 1;
                for case in cases {
                    self.line_start();
                    match &case.test {
                        Some(test) => {
                            self.push("case ");
                            self.expr(test, prec::SEQUENCE);
                            self.push(":\n");
                        }
                        None => self.push("default:\n"),
                    }
                    self.depth += 1;
                    for stmt in &case.body {
                        self.stmt(stmt);
                    }
                    self.depth -= 1;
                }
                self.depth -= 1;
                self.line_start();
                self.push("}");
            }
            Stmt::Break { .. } => self.push("break;"),
            Stmt::Continue { .. } => self.push("continue;"),
            Stmt::Throw { value, .. } => {
                self.push("throw ");
                self.expr(value, prec::SEQUENCE);
                self.push(";");
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.push("try ");
                self.block(block);
                if let Some(handler) = handler {
                    self.push(" catch ");
                    if let Some(param) = &handler.param {
                        self.push("(");
                        self.pattern(param);
                        self.push(") ");
                    }
                    self.block(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.push(" finally ");
                    self.block(finalizer);
                }
            }
            Stmt::Import { source, .. } => {
                self.push("import ");
                self.push(&quote(source));
                self.push(";");
            }
            Stmt::ExportDefault { decl, .. } => {
                self.push("export default ");
                match decl {
                    ExportDefault::Expr(e) => {
                        self.expr(e, prec::ASSIGN);
                        self.push(";");
                    }
                    ExportDefault::Function(f) => self.function(f),
                    ExportDefault::Class(c) => self.class(c),
                }
            }
            Stmt::ExportNamed { decl, .. } => match decl {
                Some(decl) => {
                    self.push("export ");
                    self.stmt_inline(decl);
                }
                None => self.push(";"),
            },
        }
    }

    fn var_decl(&mut self, kind: VarKind, decls: &[Declarator]) {
        self.push(kind.as_str());
        self.push(" ");
        for (i, decl) in decls.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.pattern(&decl.target);
            if let Some(init) = &decl.init {
                self.push(" = ");
                self.expr(init, prec::ASSIGN);
            }
        }
    }

    /* ===================== Functions & Classes ===================== */

    fn params(&mut self, params: &[Param]) {
        self.push("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            if param.rest {
                self.push("...");
            }
            self.pattern(&param.pattern);
        }
        self.push(")");
    }

    fn function(&mut self, func: &Function) {
        if func.is_arrow {
            self.params(&func.params);
            self.push(" => ");
            match &func.body {
                FunctionBody::Block(body) => self.block(body),
                FunctionBody::Expr(e) => {
                    if matches!(**e, Expr::Object { .. }) {
                        self.push("(");
                        self.expr(e, prec::ASSIGN);
                        self.push(")");
                    } else {
                        self.expr(e, prec::ASSIGN);
                    }
                }
            }
            return;
        }
        self.push("function");
        if let Some(name) = &func.name {
            self.push(" ");
            self.push(name);
        }
        self.params(&func.params);
        self.push(" ");
        if let FunctionBody::Block(body) = &func.body {
            self.block(body);
        }
    }

    fn method(&mut self, name: &str, func: &Function) {
        self.prop_name(name);
        self.params(&func.params);
        self.push(" ");
        if let FunctionBody::Block(body) = &func.body {
            self.block(body);
        }
    }

    fn prop_name(&mut self, name: &str) {
        if is_identifier_name(name) {
            self.push(name);
        } else {
            self.push(&quote(name));
        }
    }

    fn class(&mut self, class: &Class) {
        self.push("class");
        if let Some(name) = &class.name {
            self.push(" ");
            self.push(name);
        }
        if let Some(base) = &class.extends {
            self.push(" extends ");
            self.expr(base, prec::CALL);
        }
        self.push(" {\n");
        self.depth += 1;
        for field in &class.fields {
            self.line_start();
            if field.is_static {
                self.push("static ");
            }
            self.prop_name(&field.name);
            if let Some(value) = &field.value {
                self.push(" = ");
                self.expr(value, prec::ASSIGN);
            }
            self.push(";\n");
        }
        if let Some(ctor) = &class.constructor {
            self.line_start();
            self.method("constructor", ctor);
            self.push("\n");
        }
        for method in &class.methods {
            self.line_start();
            if method.is_static {
                self.push("static ");
            }
            self.method(&method.name, &method.func);
            self.push("\n");
        }
        self.depth -= 1;
        self.line_start();
        self.push("}");
    }

    /* ===================== Patterns ===================== */

    fn key(&mut self, key: &PropKey) {
        match key {
            PropKey::Ident(name) => self.push(name),
            PropKey::Str(s) => self.prop_name(s),
            PropKey::Num(n) => self.push(&format_number(*n)),
            PropKey::Computed(e) => {
                self.push("[");
                self.expr(e, prec::ASSIGN);
                self.push("]");
            }
        }
    }

    fn pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Ident { name, .. } => self.push(name),
            Pattern::Member { expr, .. } => self.expr(expr, prec::CALL),
            Pattern::Default {
                target, default, ..
            } => {
                self.pattern(target);
                self.push(" = ");
                self.expr(default, prec::ASSIGN);
            }
            Pattern::Array { elems, rest, .. } => {
                self.push("[");
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    if let Some(elem) = elem {
                        self.pattern(elem);
                    }
                }
                if matches!(elems.last(), Some(None)) {
                    self.push(",");
                }
                if let Some(rest) = rest {
                    if !elems.is_empty() {
                        self.push(", ");
                    }
                    self.push("...");
                    self.pattern(rest);
                }
                self.push("]");
            }
            Pattern::Object { props, rest, .. } => {
                self.push("{ ");
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    let shorthand = match (&prop.key, &prop.value) {
                        (PropKey::Ident(k), Pattern::Ident { name, .. }) => k == name,
                        (
                            PropKey::Ident(k),
                            Pattern::Default { target, .. },
                        ) => matches!(target.as_ref(), Pattern::Ident { name, .. } if name == k),
                        _ => false,
                    };
                    if !shorthand {
                        self.key(&prop.key);
                        self.push(": ");
                    }
                    self.pattern(&prop.value);
                }
                if let Some(rest) = rest {
                    if !props.is_empty() {
                        self.push(", ");
                    }
                    self.push("...");
                    self.pattern(rest);
                }
                self.push(" }");
            }
        }
    }

    /* ===================== Expressions ===================== */

    fn args(&mut self, args: &[ExprOrSpread]) {
        self.push("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.arg(arg);
        }
        self.push(")");
    }

    fn arg(&mut self, arg: &ExprOrSpread) {
        match arg {
            ExprOrSpread::Expr(e) => self.expr(e, prec::ASSIGN),
            ExprOrSpread::Spread(e) => {
                self.push("...");
                self.expr(e, prec::ASSIGN);
            }
        }
    }

    fn expr(&mut self, expr: &Expr, min_prec: u8) {
        grow_stack(|| {
            if expr_prec(expr) < min_prec {
                self.push("(");
                self.expr_inner(expr);
                self.push(")");
            } else {
                self.expr_inner(expr);
            }
        })
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match expr {
            Expr::Num { v, .. } => self.push(&format_number(*v)),
            Expr::Str { v, .. } => self.push(&quote(v)),
            Expr::Bool { v, .. } => self.push(if *v { "true" } else { "false" }),
            Expr::Null { .. } => self.push("null"),
            Expr::Ident { name, .. } => self.push(name),
            Expr::This { .. } => self.push("this"),
            Expr::Regex { pattern, flags, .. } => {
                self.push("/");
                self.push(pattern);
                self.push("/");
                self.push(flags);
            }
            Expr::Template { quasis, exprs, .. } => {
                self.push("`");
                for (i, quasi) in quasis.iter().enumerate() {
                    let escaped = quasi
                        .replace('\\', "\\\\")
                        .replace('`', "\\`")
                        .replace("${", "\\${");
                    self.push(&escaped);
                    if let Some(e) = exprs.get(i) {
                        self.push("${");
                        self.expr(e, prec::SEQUENCE);
                        self.push("}");
                    }
                }
                self.push("`");
            }
            Expr::Array { elems, .. } => {
                self.push("[");
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    if let Some(elem) = elem {
                        self.arg(elem);
                    }
                }
                if matches!(elems.last(), Some(None)) {
                    self.push(",");
                }
                self.push("]");
            }
            Expr::Object { props, .. } => {
                if props.is_empty() {
                    self.push("{}");
                    return;
                }
                self.push("{ ");
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    match prop {
                        ObjProp::KeyValue {
                            key,
                            value,
                            shorthand,
                            ..
                        } => {
                            if *shorthand && matches!(value, Expr::Ident { .. }) {
                                self.expr(value, prec::ASSIGN);
                            } else {
                                self.key(key);
                                self.push(": ");
                                self.expr(value, prec::ASSIGN);
                            }
                        }
                        ObjProp::Method { key, func, .. } => {
                            self.key(key);
                            self.params(&func.params);
                            self.push(" ");
                            if let FunctionBody::Block(body) = &func.body {
                                self.block(body);
                            }
                        }
                        ObjProp::Spread { expr, .. } => {
                            self.push("...");
                            self.expr(expr, prec::ASSIGN);
                        }
                    }
                }
                self.push(" }");
            }
            Expr::Function { func, .. } => self.function(func),
            Expr::Class { class, .. } => self.class(class),
            Expr::Unary { op, arg, .. } => {
                self.push(op.as_str());
                // keep `- -x` and `+ +x` apart
                if matches!(
                    (op, arg.as_ref()),
                    (UnaryOp::Neg, Expr::Unary { op: UnaryOp::Neg, .. })
                        | (UnaryOp::Plus, Expr::Unary { op: UnaryOp::Plus, .. })
                        | (UnaryOp::Neg, Expr::Update { prefix: true, increment: false, .. })
                        | (UnaryOp::Plus, Expr::Update { prefix: true, increment: true, .. })
                ) {
                    self.push(" ");
                }
                self.expr(arg, prec::UNARY);
            }
            Expr::Update {
                increment,
                prefix,
                target,
                ..
            } => {
                let op = if *increment { "++" } else { "--" };
                if *prefix {
                    self.push(op);
                    self.expr(target, prec::UNARY);
                } else {
                    self.expr(target, prec::CALL);
                    self.push(op);
                }
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let p = binary_prec(*op);
                let (lp, rp) = if *op == BinaryOp::Exp {
                    (p + 1, p)
                } else {
                    (p, p + 1)
                };
                self.expr(left, lp);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.expr(right, rp);
            }
            Expr::Logical {
                op, left, right, ..
            } => {
                let p = logical_prec(*op);
                self.expr(left, p);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.expr(right, p + 1);
            }
            Expr::Assign {
                op, target, value, ..
            } => {
                let braced = matches!(target.as_ref(), Pattern::Object { .. });
                if braced {
                    self.push("(");
                }
                self.pattern(target);
                self.push(" ");
                self.push(&op.as_str());
                self.push(" ");
                self.expr(value, prec::ASSIGN);
                if braced {
                    self.push(")");
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.expr(test, prec::CONDITIONAL + 1);
                self.push(" ? ");
                self.expr(consequent, prec::ASSIGN);
                self.push(" : ");
                self.expr(alternate, prec::ASSIGN);
            }
            Expr::Call {
                callee,
                args,
                optional,
                ..
            } => {
                self.expr(callee, prec::CALL);
                if *optional {
                    self.push("?.");
                }
                self.args(args);
            }
            Expr::New { callee, args, .. } => {
                self.push("new ");
                // `new (f())()` needs the parens around a call callee
                if matches!(callee.as_ref(), Expr::Call { .. }) {
                    self.push("(");
                    self.expr(callee, prec::SEQUENCE);
                    self.push(")");
                } else {
                    self.expr(callee, prec::CALL);
                }
                self.args(args);
            }
            Expr::SuperCall { args, .. } => {
                self.push("super");
                self.args(args);
            }
            Expr::Member {
                object,
                property,
                optional,
                ..
            } => {
                let bare_number = matches!(object.as_ref(), Expr::Num { .. });
                if bare_number {
                    self.push("(");
                    self.expr(object, prec::SEQUENCE);
                    self.push(")");
                } else {
                    self.expr(object, prec::CALL);
                }
                match property {
                    MemberProp::Ident(name) => {
                        self.push(if *optional { "?." } else { "." });
                        self.push(name);
                    }
                    MemberProp::Computed(e) => {
                        if *optional {
                            self.push("?.");
                        }
                        self.push("[");
                        self.expr(e, prec::SEQUENCE);
                        self.push("]");
                    }
                }
            }
            Expr::Sequence { exprs, .. } => {
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(e, prec::ASSIGN);
                }
            }
            Expr::Paren { expr, .. } => {
                self.push("(");
                self.expr(expr, prec::SEQUENCE);
                self.push(")");
            }
            Expr::OptionalChain { expr, .. } => self.expr_inner(expr),
            Expr::Jsx(el) => {
                // lowered programs never contain markup; print a call for completeness
                let lowered = super::lower::lower_expr(Expr::Jsx(el.clone()));
                self.expr_inner(&lowered);
            }
        }
    }
}
