//! Expression evaluation

use std::cell::RefCell;
use std::rc::Rc;

use super::env::Scope;
use super::errors::{type_error, Control, EvalResult};
use super::interp::Interpreter;
use super::statements::BindMode;
use super::regexp::RegExpVal;
use super::values::{ClassVal, Closure, Props, Val};
use crate::syntax::ast::*;
use crate::syntax::grow_stack;
use crate::transpiler::codegen::print_expr;
use crate::transpiler::lower::lower_expr;

impl Interpreter {
    pub fn eval(&mut self, expr: &Expr, scope: &Scope) -> EvalResult {
        grow_stack(|| self.eval_expr(expr, scope))
    }

    fn eval_expr(&mut self, expr: &Expr, scope: &Scope) -> EvalResult {
        match expr {
            Expr::Num { v, .. } => Ok(Val::Num(*v)),
            Expr::Str { v, .. } => Ok(Val::Str(v.clone())),
            Expr::Bool { v, .. } => Ok(Val::Bool(*v)),
            Expr::Null { .. } => Ok(Val::Null),
            Expr::Regex { pattern, flags, .. } => RegExpVal::compile(pattern, flags).map(Val::regexp),
            Expr::Template { quasis, exprs, .. } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = exprs.get(i) {
                        let value = self.eval(expr, scope)?;
                        out.push_str(&value.to_js_string());
                    }
                }
                Ok(Val::Str(out))
            }
            Expr::Ident { name, .. } => self.eval_ident(name, scope),
            Expr::This { .. } => Ok(scope.this_val()),
            Expr::Array { elems, .. } => {
                let mut items = Vec::with_capacity(elems.len());
                for elem in elems {
                    match elem {
                        None => items.push(Val::Undefined),
                        Some(ExprOrSpread::Expr(e)) => items.push(self.eval(e, scope)?),
                        Some(ExprOrSpread::Spread(e)) => {
                            let value = self.eval(e, scope)?;
                            items.extend(self.iterate(&value)?);
                        }
                    }
                }
                Ok(Val::array(items))
            }
            Expr::Object { props, .. } => self.eval_object(props, scope),
            Expr::Function { func, .. } => Ok(self.make_closure(func, scope, None)),
            Expr::Class { class, .. } => self.eval_class(class, scope, None),
            Expr::Unary { op, arg, .. } => self.eval_unary(*op, arg, scope),
            Expr::Update {
                increment,
                prefix,
                target,
                ..
            } => {
                let old = self.eval(target, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign_to_expr(target, Val::Num(new), scope)?;
                Ok(Val::Num(if *prefix { new } else { old }))
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                self.binary_op(*op, &l, &r)
            }
            Expr::Logical {
                op, left, right, ..
            } => {
                let l = self.eval(left, scope)?;
                let short = match op {
                    LogicalOp::And => !l.is_truthy(),
                    LogicalOp::Or => l.is_truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short {
                    Ok(l)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Assign {
                op, target, value, ..
            } => self.eval_assign(*op, target, value, scope),
            Expr::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Call {
                callee,
                args,
                optional,
                ..
            } => self.eval_call(callee, args, *optional, scope),
            Expr::New { callee, args, .. } => {
                let target = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                if !target.is_callable() {
                    return type_error(format!("{} is not a constructor", print_expr(callee)));
                }
                self.construct(&target, args)
            }
            Expr::SuperCall { args, .. } => {
                let args = self.eval_args(args, scope)?;
                let Some(home) = scope.home_class() else {
                    return super::errors::throw(
                        super::errors::SYNTAX_ERROR,
                        "'super' keyword unexpected here",
                    );
                };
                let this = scope.this_val();
                if let Some(parent) = &home.parent {
                    self.initialize_parent(parent, &this, args)?;
                }
                self.init_fields(&home, &this)?;
                Ok(Val::Undefined)
            }
            Expr::Member {
                object,
                property,
                optional,
                ..
            } => {
                let target = self.eval(object, scope)?;
                if *optional && target.is_nullish() {
                    return Err(Control::ShortCircuit);
                }
                let key = self.member_key(property, scope)?;
                self.get_prop(&target, &key)
            }
            Expr::Sequence { exprs, .. } => {
                let mut last = Val::Undefined;
                for e in exprs {
                    last = self.eval(e, scope)?;
                }
                Ok(last)
            }
            Expr::Paren { expr, .. } => self.eval(expr, scope),
            Expr::OptionalChain { expr, .. } => match self.eval(expr, scope) {
                Err(Control::ShortCircuit) => Ok(Val::Undefined),
                other => other,
            },
            // untranspiled markup (direct execution of parsed source)
            Expr::Jsx(el) => {
                let lowered = lower_expr(Expr::Jsx(el.clone()));
                self.eval(&lowered, scope)
            }
        }
    }

    /// Evaluate, naming anonymous functions and classes after their binding
    pub fn eval_named(&mut self, expr: &Expr, name: &str, scope: &Scope) -> EvalResult {
        match expr.unparen() {
            Expr::Function { func, .. } if func.name.is_none() => {
                Ok(self.make_closure(func, scope, Some(name)))
            }
            Expr::Class { class, .. } if class.name.is_none() => {
                self.eval_class(class, scope, Some(name))
            }
            _ => self.eval(expr, scope),
        }
    }

    fn eval_ident(&mut self, name: &str, scope: &Scope) -> EvalResult {
        match name {
            "undefined" if !scope.is_defined(name) => Ok(Val::Undefined),
            "NaN" if !scope.is_defined(name) => Ok(Val::Num(f64::NAN)),
            "Infinity" if !scope.is_defined(name) => Ok(Val::Num(f64::INFINITY)),
            _ => scope.lookup(name),
        }
    }

    pub fn make_closure(&mut self, func: &Rc<Function>, scope: &Scope, name: Option<&str>) -> Val {
        let closure = match (&func.name, name) {
            (None, Some(name)) => Closure::named(func.clone(), scope.clone(), name.to_string()),
            _ => Closure::new(func.clone(), scope.clone()),
        };
        Val::Function(Rc::new(closure))
    }

    /* ===================== Keys ===================== */

    pub fn prop_key(&mut self, key: &PropKey, scope: &Scope) -> Result<String, Control> {
        Ok(match key {
            PropKey::Ident(name) | PropKey::Str(name) => name.clone(),
            PropKey::Num(n) => format_number(*n),
            PropKey::Computed(expr) => self.eval(expr, scope)?.to_property_key(),
        })
    }

    fn member_key(&mut self, property: &MemberProp, scope: &Scope) -> Result<String, Control> {
        match property {
            MemberProp::Ident(name) => Ok(name.clone()),
            MemberProp::Computed(expr) => Ok(self.eval(expr, scope)?.to_property_key()),
        }
    }

    /* ===================== Literals ===================== */

    fn eval_object(&mut self, props: &[ObjProp], scope: &Scope) -> EvalResult {
        let mut out = Props::new();
        for prop in props {
            match prop {
                ObjProp::KeyValue { key, value, .. } => {
                    let key = self.prop_key(key, scope)?;
                    let value = self.eval_named(value, &key, scope)?;
                    out.insert(key, value);
                }
                ObjProp::Method { key, func, .. } => {
                    let key = self.prop_key(key, scope)?;
                    let value = self.make_closure(func, scope, Some(&key));
                    out.insert(key, value);
                }
                ObjProp::Spread { expr, .. } => {
                    let source = self.eval(expr, scope)?;
                    for key in self.own_keys(&source) {
                        let value = self.get_prop(&source, &key)?;
                        out.insert(key, value);
                    }
                }
            }
        }
        Ok(Val::object(out))
    }

    pub fn eval_class(&mut self, class: &Rc<Class>, scope: &Scope, name: Option<&str>) -> EvalResult {
        let parent = match &class.extends {
            Some(expr) => {
                let parent = self.eval(expr, scope)?;
                if !parent.is_callable() {
                    return type_error(format!(
                        "Class extends value {} is not a constructor or null",
                        parent.inspect()
                    ));
                }
                Some(parent)
            }
            None => None,
        };
        let class_scope = scope.child();
        let mut methods = Props::new();
        let mut statics = Props::new();
        for method in &class.methods {
            let closure = Val::Function(Rc::new(Closure::named(
                method.func.clone(),
                class_scope.clone(),
                method.name.clone(),
            )));
            if method.is_static {
                statics.insert(method.name.clone(), closure);
            } else {
                methods.insert(method.name.clone(), closure);
            }
        }
        let name = class
            .name
            .clone()
            .or_else(|| name.map(str::to_string))
            .unwrap_or_default();
        let value = Rc::new(ClassVal {
            name,
            parent,
            constructor: class.constructor.clone(),
            methods,
            statics: RefCell::new(statics),
            fields: class.fields.clone(),
            scope: class_scope.clone(),
            native_init: None,
        });
        let class_val = Val::Class(value.clone());
        for field in class.fields.iter().filter(|f| f.is_static) {
            let field_scope = Scope::function_scope(Some(&class_scope), class_val.clone(), None);
            let v = match &field.value {
                Some(expr) => self.eval(expr, &field_scope)?,
                None => Val::Undefined,
            };
            value.statics.borrow_mut().insert(field.name.clone(), v);
        }
        Ok(class_val)
    }

    /* ===================== Operators ===================== */

    fn eval_unary(&mut self, op: UnaryOp, arg: &Expr, scope: &Scope) -> EvalResult {
        match op {
            UnaryOp::Typeof => {
                if let Expr::Ident { name, .. } = arg.unparen() {
                    if !scope.is_defined(name) {
                        let value = self.eval_ident(name, scope).unwrap_or(Val::Undefined);
                        return Ok(Val::str(value.type_of()));
                    }
                }
                let value = self.eval(arg, scope)?;
                Ok(Val::str(value.type_of()))
            }
            UnaryOp::Delete => match arg.unparen() {
                Expr::Member {
                    object, property, ..
                } => {
                    let target = self.eval(object, scope)?;
                    let key = self.member_key(property, scope)?;
                    Ok(Val::Bool(self.delete_prop(&target, &key)?))
                }
                _ => Ok(Val::Bool(true)),
            },
            _ => {
                let value = self.eval(arg, scope)?;
                Ok(match op {
                    UnaryOp::Not => Val::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Val::Num(-value.to_number()),
                    UnaryOp::Plus => Val::Num(value.to_number()),
                    UnaryOp::BitNot => Val::Num(!value.to_int32() as f64),
                    _ => Val::Undefined,
                })
            }
        }
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Pattern,
        value: &Expr,
        scope: &Scope,
    ) -> EvalResult {
        match op {
            AssignOp::Assign => {
                let v = match target {
                    Pattern::Ident { name, .. } => self.eval_named(value, name, scope)?,
                    _ => self.eval(value, scope)?,
                };
                self.bind_pattern(target, v.clone(), scope, BindMode::Assign)?;
                Ok(v)
            }
            AssignOp::Arith(bin) => {
                let current = self.read_pattern(target, scope)?;
                let rhs = self.eval(value, scope)?;
                let result = self.binary_op(bin, &current, &rhs)?;
                self.bind_pattern(target, result.clone(), scope, BindMode::Assign)?;
                Ok(result)
            }
            AssignOp::Logical(logical) => {
                let current = self.read_pattern(target, scope)?;
                let keep = match logical {
                    LogicalOp::And => !current.is_truthy(),
                    LogicalOp::Or => current.is_truthy(),
                    LogicalOp::Nullish => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                let v = self.eval(value, scope)?;
                self.bind_pattern(target, v.clone(), scope, BindMode::Assign)?;
                Ok(v)
            }
        }
    }

    fn read_pattern(&mut self, target: &Pattern, scope: &Scope) -> EvalResult {
        match target {
            Pattern::Ident { name, .. } => scope.lookup(name),
            Pattern::Member { expr, .. } => self.eval(expr, scope),
            _ => type_error("Invalid left-hand side in assignment"),
        }
    }

    /// Store into an identifier or member expression
    pub fn assign_to_expr(&mut self, target: &Expr, value: Val, scope: &Scope) -> Result<(), Control> {
        match target.unparen() {
            Expr::Ident { name, .. } => scope.assign(name, value),
            Expr::Member {
                object, property, ..
            } => {
                let obj = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                self.set_prop(&obj, &key, value)
            }
            _ => type_error("Invalid left-hand side in assignment"),
        }
    }

    /* ===================== Calls ===================== */

    pub fn eval_args(&mut self, args: &[ExprOrSpread], scope: &Scope) -> Result<Vec<Val>, Control> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                ExprOrSpread::Expr(e) => out.push(self.eval(e, scope)?),
                ExprOrSpread::Spread(e) => {
                    let value = self.eval(e, scope)?;
                    out.extend(self.iterate(&value)?);
                }
            }
        }
        Ok(out)
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[ExprOrSpread],
        optional: bool,
        scope: &Scope,
    ) -> EvalResult {
        let (func, this) = match callee.unparen() {
            Expr::Member {
                object,
                property,
                optional: optional_member,
                ..
            } => {
                let target = self.eval(object, scope)?;
                if *optional_member && target.is_nullish() {
                    return Err(Control::ShortCircuit);
                }
                let key = self.member_key(property, scope)?;
                let func = self.get_prop(&target, &key)?;
                (func, target)
            }
            _ => (self.eval(callee, scope)?, Val::Undefined),
        };
        if optional && func.is_nullish() {
            return Err(Control::ShortCircuit);
        }
        if !func.is_callable() {
            return type_error(format!("{} is not a function", print_expr(callee)));
        }
        let args = self.eval_args(args, scope)?;
        self.call(&func, this, args)
    }
}
