//! Statement execution, hoisting and pattern binding

use std::rc::Rc;

use super::env::Scope;
use super::errors::{type_error, Control};
use super::interp::Interpreter;
use super::values::{Closure, Props, Val};
use crate::syntax::ast::*;
use crate::syntax::grow_stack;

/// How a pattern introduces its names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    Let,
    Const,
    Var,
    Param,
    /// Destructuring assignment to existing bindings
    Assign,
}

impl From<VarKind> for BindMode {
    fn from(kind: VarKind) -> Self {
        match kind {
            VarKind::Var => BindMode::Var,
            VarKind::Let => BindMode::Let,
            VarKind::Const => BindMode::Const,
        }
    }
}

impl Interpreter {
    /* ===================== Hoisting ===================== */

    /// Predeclare a statement list's bindings in `scope`
    ///
    /// Function declarations are initialised, `let`/`const`/`class` names
    /// enter the temporal dead zone, and `var` names (collected through
    /// nested blocks) are declared on the enclosing function scope.
    pub fn hoist(&mut self, stmts: &[Stmt], scope: &Scope) -> Result<(), Control> {
        for stmt in stmts {
            let stmt = match stmt {
                Stmt::ExportNamed {
                    decl: Some(decl), ..
                } => decl.as_ref(),
                other => other,
            };
            match stmt {
                Stmt::Function { func, .. } => {
                    if let Some(name) = &func.name {
                        let closure = Closure::new(func.clone(), scope.clone());
                        scope.declare(name, Val::Function(Rc::new(closure)), true);
                    }
                }
                Stmt::VarDecl {
                    kind: VarKind::Let | VarKind::Const,
                    decls,
                    ..
                } => {
                    for decl in decls {
                        for name in decl.target.bound_names() {
                            scope.declare_uninitialized(&name, true);
                        }
                    }
                }
                Stmt::Class { class, .. } => {
                    if let Some(name) = &class.name {
                        scope.declare_uninitialized(name, true);
                    }
                }
                _ => {}
            }
        }
        let mut vars = Vec::new();
        collect_var_names(stmts, &mut vars);
        for name in vars {
            scope.declare_var(&name);
        }
        Ok(())
    }

    /* ===================== Execution ===================== */

    pub fn exec_stmts(&mut self, stmts: &[Stmt], scope: &Scope) -> Result<(), Control> {
        for stmt in stmts {
            self.exec_stmt(stmt, scope)?;
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &Scope) -> Result<(), Control> {
        let block = scope.child();
        self.hoist(stmts, &block)?;
        self.exec_stmts(stmts, &block)
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt, scope: &Scope) -> Result<(), Control> {
        grow_stack(|| self.exec_stmt_inner(stmt, scope))
    }

    fn exec_stmt_inner(&mut self, stmt: &Stmt, scope: &Scope) -> Result<(), Control> {
        self.tick()?;
        match stmt {
            Stmt::Empty { .. } | Stmt::Import { .. } | Stmt::Function { .. } => Ok(()),
            Stmt::Block { body, .. } => self.exec_block(body, scope),
            Stmt::Expr { expr, .. } => {
                self.eval(expr, scope)?;
                Ok(())
            }
            Stmt::VarDecl { kind, decls, .. } => self.exec_var_decl(*kind, decls, scope),
            Stmt::Class { class, .. } => {
                let value = self.eval_class(class, scope, None)?;
                if let Some(name) = &class.name {
                    scope.initialize(name, value);
                }
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Val::Undefined,
                };
                Err(Control::Return(value))
            }
            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.exec_stmt(then_s, scope)
                } else if let Some(else_s) = else_s {
                    self.exec_stmt(else_s, scope)
                } else {
                    Ok(())
                }
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, scope),
            Stmt::ForEach {
                kind,
                decl,
                target,
                iterable,
                body,
                ..
            } => self.exec_for_each(*kind, *decl, target, iterable, body, scope),
            Stmt::While { test, body, .. } => {
                while self.eval(test, scope)?.is_truthy() {
                    self.tick()?;
                    match self.exec_stmt(body, scope) {
                        Ok(()) | Err(Control::Continue) => {}
                        Err(Control::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            Stmt::DoWhile { body, test, .. } => {
                loop {
                    self.tick()?;
                    match self.exec_stmt(body, scope) {
                        Ok(()) | Err(Control::Continue) => {}
                        Err(Control::Break) => break,
                        Err(other) => return Err(other),
                    }
                    if !self.eval(test, scope)?.is_truthy() {
                        break;
                    }
                }
                Ok(())
            }
            Stmt::Switch {
                discriminant,
                cases,
                ..
            } => self.exec_switch(discriminant, cases, scope),
            Stmt::Break { .. } => Err(Control::Break),
            Stmt::Continue { .. } => Err(Control::Continue),
            Stmt::Throw { value, .. } => {
                let value = self.eval(value, scope)?;
                Err(Control::Throw(value))
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
                ..
            } => self.exec_try(block, handler.as_ref(), finalizer.as_deref(), scope),
            Stmt::ExportDefault { decl, .. } => {
                if let ExportDefault::Expr(expr) = decl {
                    self.eval(expr, scope)?;
                }
                Ok(())
            }
            Stmt::ExportNamed { decl, .. } => match decl {
                Some(decl) => self.exec_stmt(decl, scope),
                None => Ok(()),
            },
        }
    }

    fn exec_var_decl(
        &mut self,
        kind: VarKind,
        decls: &[Declarator],
        scope: &Scope,
    ) -> Result<(), Control> {
        let mode = BindMode::from(kind);
        for decl in decls {
            match &decl.init {
                Some(init) => {
                    let value = match &decl.target {
                        Pattern::Ident { name, .. } => self.eval_named(init, name, scope)?,
                        _ => self.eval(init, scope)?,
                    };
                    self.bind_pattern(&decl.target, value, scope, mode)?;
                }
                // `var x;` keeps any existing value
                None if mode == BindMode::Var => {
                    for name in decl.target.bound_names() {
                        scope.declare_var(&name);
                    }
                }
                None => self.bind_pattern(&decl.target, Val::Undefined, scope, mode)?,
            }
        }
        Ok(())
    }

    fn exec_for(
        &mut self,
        init: Option<&ForInit>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: &Scope,
    ) -> Result<(), Control> {
        let loop_scope = scope.child();
        let per_iteration = matches!(
            init,
            Some(ForInit::VarDecl {
                kind: VarKind::Let | VarKind::Const,
                ..
            })
        );
        match init {
            Some(ForInit::VarDecl { kind, decls }) => {
                self.exec_var_decl(*kind, decls, &loop_scope)?
            }
            Some(ForInit::Expr(expr)) => {
                self.eval(expr, &loop_scope)?;
            }
            None => {}
        }

        // each iteration of a `let` loop sees its own copy of the bindings
        let mut iter_scope = if per_iteration {
            loop_scope.copy_own()
        } else {
            loop_scope
        };
        loop {
            self.tick()?;
            if let Some(test) = test {
                if !self.eval(test, &iter_scope)?.is_truthy() {
                    break;
                }
            }
            match self.exec_stmt(body, &iter_scope) {
                Ok(()) | Err(Control::Continue) => {}
                Err(Control::Break) => break,
                Err(other) => return Err(other),
            }
            if per_iteration {
                iter_scope = iter_scope.copy_own();
            }
            if let Some(update) = update {
                self.eval(update, &iter_scope)?;
            }
        }
        Ok(())
    }

    fn exec_for_each(
        &mut self,
        kind: ForLoopKind,
        decl: Option<VarKind>,
        target: &Pattern,
        iterable: &Expr,
        body: &Stmt,
        scope: &Scope,
    ) -> Result<(), Control> {
        let source = self.eval(iterable, scope)?;
        let items: Vec<Val> = match kind {
            ForLoopKind::In => {
                if source.is_nullish() {
                    return Ok(());
                }
                self.own_keys(&source).into_iter().map(Val::Str).collect()
            }
            ForLoopKind::Of => self.iterate(&source)?,
        };
        let mode = decl.map(BindMode::from).unwrap_or(BindMode::Assign);
        for item in items {
            self.tick()?;
            let iter_scope = scope.child();
            self.bind_pattern(target, item, &iter_scope, mode)?;
            match self.exec_stmt(body, &iter_scope) {
                Ok(()) | Err(Control::Continue) => {}
                Err(Control::Break) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    fn exec_switch(
        &mut self,
        discriminant: &Expr,
        cases: &[SwitchCase],
        scope: &Scope,
    ) -> Result<(), Control> {
        let value = self.eval(discriminant, scope)?;
        let block = scope.child();
        for case in cases {
            self.hoist(&case.body, &block)?;
        }

        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval(test, &block)?.strict_eq(&value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|c| c.test.is_none()));
        let Some(start) = start else {
            return Ok(());
        };
        for case in &cases[start..] {
            match self.exec_stmts(&case.body, &block) {
                Ok(()) => {}
                Err(Control::Break) => return Ok(()),
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        handler: Option<&CatchClause>,
        finalizer: Option<&[Stmt]>,
        scope: &Scope,
    ) -> Result<(), Control> {
        let mut result = self.exec_block(block, scope);
        if let Some(handler) = handler {
            if let Err(Control::Throw(thrown)) = result {
                let catch_scope = scope.child();
                if let Some(param) = &handler.param {
                    self.bind_pattern(param, thrown, &catch_scope, BindMode::Let)?;
                }
                result = self.exec_block(&handler.body, &catch_scope);
            }
        }
        if let Some(finalizer) = finalizer {
            if matches!(result, Err(Control::Abort(_))) {
                return result;
            }
            self.exec_block(finalizer, scope)?;
        }
        result
    }

    /* ===================== Patterns ===================== */

    pub fn bind_params(&mut self, params: &[Param], args: Vec<Val>, scope: &Scope) -> Result<(), Control> {
        let mut args = args.into_iter();
        for param in params {
            if param.rest {
                let rest: Vec<Val> = args.by_ref().collect();
                self.bind_pattern(&param.pattern, Val::array(rest), scope, BindMode::Param)?;
            } else {
                let value = args.next().unwrap_or(Val::Undefined);
                self.bind_pattern(&param.pattern, value, scope, BindMode::Param)?;
            }
        }
        Ok(())
    }

    pub fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Val,
        scope: &Scope,
        mode: BindMode,
    ) -> Result<(), Control> {
        match pattern {
            Pattern::Ident { name, .. } => {
                match mode {
                    BindMode::Let | BindMode::Param => scope.declare(name, value, true),
                    BindMode::Const => scope.declare(name, value, false),
                    BindMode::Var => {
                        scope.declare_var(name);
                        scope.assign(name, value)?;
                    }
                    BindMode::Assign => scope.assign(name, value)?,
                }
                Ok(())
            }
            Pattern::Default {
                target, default, ..
            } => {
                let value = match value {
                    Val::Undefined => match target.as_ref() {
                        Pattern::Ident { name, .. } => self.eval_named(default, name, scope)?,
                        _ => self.eval(default, scope)?,
                    },
                    other => other,
                };
                self.bind_pattern(target, value, scope, mode)
            }
            Pattern::Member { expr, .. } => self.assign_to_expr(expr, value, scope),
            Pattern::Object { props, rest, .. } => {
                if value.is_nullish() {
                    return type_error(format!(
                        "Cannot destructure '{}' as it is {}.",
                        value.to_js_string(),
                        value.to_js_string()
                    ));
                }
                let mut used = Vec::with_capacity(props.len());
                for prop in props {
                    let key = self.prop_key(&prop.key, scope)?;
                    let item = self.get_prop(&value, &key)?;
                    used.push(key);
                    self.bind_pattern(&prop.value, item, scope, mode)?;
                }
                if let Some(rest) = rest {
                    let mut remaining = Props::new();
                    for key in self.own_keys(&value) {
                        if !used.contains(&key) {
                            let item = self.get_prop(&value, &key)?;
                            remaining.insert(key, item);
                        }
                    }
                    self.bind_pattern(rest, Val::object(remaining), scope, mode)?;
                }
                Ok(())
            }
            Pattern::Array { elems, rest, .. } => {
                let items = self.iterate(&value)?;
                for (i, elem) in elems.iter().enumerate() {
                    if let Some(elem) = elem {
                        let item = items.get(i).cloned().unwrap_or(Val::Undefined);
                        self.bind_pattern(elem, item, scope, mode)?;
                    }
                }
                if let Some(rest) = rest {
                    let tail = items.get(elems.len()..).map(|s| s.to_vec()).unwrap_or_default();
                    self.bind_pattern(rest, Val::array(tail), scope, mode)?;
                }
                Ok(())
            }
        }
    }

    /// Values produced by iterating `value` (`for...of`, spread, array patterns)
    pub fn iterate(&mut self, value: &Val) -> Result<Vec<Val>, Control> {
        match value {
            Val::Array(items) => Ok(items.borrow().clone()),
            Val::Str(s) => Ok(s.chars().map(|c| Val::Str(c.to_string())).collect()),
            other => type_error(format!("{} is not iterable", other.inspect())),
        }
    }
}

/// `var` names declared anywhere in `stmts` outside nested functions
fn collect_var_names(stmts: &[Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        collect_var_names_stmt(stmt, out);
    }
}

fn collect_var_names_stmt(stmt: &Stmt, out: &mut Vec<String>) {
    match stmt {
        Stmt::VarDecl {
            kind: VarKind::Var,
            decls,
            ..
        } => {
            for decl in decls {
                out.extend(decl.target.bound_names());
            }
        }
        Stmt::Block { body, .. } => collect_var_names(body, out),
        Stmt::If { then_s, else_s, .. } => {
            collect_var_names_stmt(then_s, out);
            if let Some(else_s) = else_s {
                collect_var_names_stmt(else_s, out);
            }
        }
        Stmt::For { init, body, .. } => {
            if let Some(ForInit::VarDecl {
                kind: VarKind::Var,
                decls,
            }) = init.as_deref()
            {
                for decl in decls {
                    out.extend(decl.target.bound_names());
                }
            }
            collect_var_names_stmt(body, out);
        }
        Stmt::ForEach {
            decl: Some(VarKind::Var),
            target,
            body,
            ..
        } => {
            out.extend(target.bound_names());
            collect_var_names_stmt(body, out);
        }
        Stmt::ForEach { body, .. } | Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => {
            collect_var_names_stmt(body, out)
        }
        Stmt::Switch { cases, .. } => {
            for case in cases {
                collect_var_names(&case.body, out);
            }
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            collect_var_names(block, out);
            if let Some(handler) = handler {
                collect_var_names(&handler.body, out);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, out);
            }
        }
        Stmt::ExportNamed {
            decl: Some(decl), ..
        } => collect_var_names_stmt(decl, out),
        _ => {}
    }
}
