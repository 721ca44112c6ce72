//! Interpreter state, calls, construction and property access

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::builtins::Protos;
use super::env::Scope;
use super::errors::{
    range_error, type_error, Control, EvalResult, BUDGET_EXCEEDED,
};
use super::react::HookStore;
use super::values::{ClassVal, Closure, ObjKind, Object, Props, Val};
use crate::syntax::ast::FunctionBody;
use crate::syntax::grow_stack;

/// Nested call limit; deep frames move onto heap stack segments
pub const MAX_CALL_DEPTH: usize = 1_000;

/* ===================== Console ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

/// One captured `console.*` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLine {
    pub level: ConsoleLevel,
    pub message: String,
}

/* ===================== Interpreter ===================== */

pub struct Interpreter {
    steps: u64,
    max_steps: u64,
    depth: usize,
    rng: u64,
    pub console: Vec<ConsoleLine>,
    pub hooks: HookStore,
    protos: Rc<Protos>,
}

impl Interpreter {
    pub fn new(max_steps: u64) -> Self {
        Self {
            steps: 0,
            max_steps,
            depth: 0,
            rng: (uuid::Uuid::new_v4().as_u128() as u64) | 1,
            console: Vec::new(),
            hooks: HookStore::default(),
            protos: Rc::new(Protos::new()),
        }
    }

    /// Count one evaluation step against the budget
    pub fn tick(&mut self) -> Result<(), Control> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(Control::Abort(BUDGET_EXCEEDED.to_string()));
        }
        Ok(())
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Start a fresh budget (each render and event dispatch gets its own)
    pub fn reset_budget(&mut self) {
        self.steps = 0;
    }

    /// xorshift64*
    pub fn random(&mut self) -> f64 {
        let mut x = self.rng;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng = x;
        let bits = x.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }

    pub fn log(&mut self, level: ConsoleLevel, args: &[Val]) {
        let message = args
            .iter()
            .map(|a| match a {
                Val::Str(s) => s.clone(),
                other => other.inspect(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        self.console.push(ConsoleLine { level, message });
    }

    /// Drain captured console output
    pub fn take_console(&mut self) -> Vec<ConsoleLine> {
        std::mem::take(&mut self.console)
    }

    /* ===================== Calls ===================== */

    pub fn call(&mut self, callee: &Val, this: Val, args: Vec<Val>) -> EvalResult {
        match callee {
            Val::Function(closure) => self.call_closure(closure, this, args, None),
            Val::Native(native) => {
                self.tick()?;
                let native = native.clone();
                (native.func)(self, this, args)
            }
            Val::Class(class) => type_error(format!(
                "Class constructor {} cannot be invoked without 'new'",
                class.name
            )),
            other => type_error(format!("{} is not a function", other.describe())),
        }
    }

    pub fn call_closure(
        &mut self,
        closure: &Rc<Closure>,
        this: Val,
        args: Vec<Val>,
        home: Option<Rc<ClassVal>>,
    ) -> EvalResult {
        self.tick()?;
        if self.depth >= MAX_CALL_DEPTH {
            return range_error("Maximum call stack size exceeded");
        }
        let func = closure.func.clone();
        let scope = if func.is_arrow {
            Scope::arrow_scope(&closure.scope)
        } else {
            let scope = Scope::function_scope(Some(&closure.scope), this, home);
            if let Some(name) = &func.name {
                scope.declare(name, Val::Function(closure.clone()), true);
            }
            scope.declare("arguments", Val::array(args.clone()), true);
            scope
        };

        self.depth += 1;
        let result = grow_stack(|| self.run_function_body(&func.params, &func.body, &scope, args));
        self.depth -= 1;
        result
    }

    fn run_function_body(
        &mut self,
        params: &[crate::syntax::ast::Param],
        body: &FunctionBody,
        scope: &Scope,
        args: Vec<Val>,
    ) -> EvalResult {
        self.bind_params(params, args, scope)?;
        match body {
            FunctionBody::Expr(expr) => self.eval(expr, scope),
            FunctionBody::Block(stmts) => {
                self.hoist(stmts, scope)?;
                match self.exec_stmts(stmts, scope) {
                    Ok(()) => Ok(Val::Undefined),
                    Err(Control::Return(value)) => Ok(value),
                    Err(Control::Break) | Err(Control::Continue) => Ok(Val::Undefined),
                    Err(other) => Err(other),
                }
            }
        }
    }

    /* ===================== Construction ===================== */

    pub fn construct(&mut self, callee: &Val, args: Vec<Val>) -> EvalResult {
        self.tick()?;
        match callee {
            Val::Class(class) => {
                let this = Val::Object(Rc::new(RefCell::new(Object {
                    props: Props::new(),
                    class: Some(class.clone()),
                    kind: ObjKind::Plain,
                })));
                self.initialize_instance(class, &this, args)?;
                Ok(this)
            }
            Val::Function(closure) if !closure.func.is_arrow => {
                let this = Val::object(Props::new());
                let result = self.call_closure(closure, this.clone(), args, None)?;
                Ok(match result {
                    Val::Object(_) | Val::Array(_) => result,
                    _ => this,
                })
            }
            // natives act as factories (`new Error(..)`, `new Array(..)`)
            Val::Native(native) => {
                let native = native.clone();
                (native.func)(self, Val::Undefined, args)
            }
            other => type_error(format!("{} is not a constructor", other.describe())),
        }
    }

    pub fn initialize_instance(
        &mut self,
        class: &Rc<ClassVal>,
        this: &Val,
        args: Vec<Val>,
    ) -> Result<(), Control> {
        if let Some(init) = &class.native_init {
            init(self, this.clone(), args)?;
            return Ok(());
        }
        match &class.constructor {
            Some(ctor) => {
                if class.parent.is_none() {
                    self.init_fields(class, this)?;
                }
                let closure = Rc::new(Closure::new(ctor.clone(), class.scope.clone()));
                self.call_closure(&closure, this.clone(), args, Some(class.clone()))?;
            }
            None => {
                if let Some(parent) = &class.parent {
                    self.initialize_parent(parent, this, args)?;
                }
                self.init_fields(class, this)?;
            }
        }
        Ok(())
    }

    /// Run the base class part of construction (`super(...)`)
    pub fn initialize_parent(&mut self, parent: &Val, this: &Val, args: Vec<Val>) -> Result<(), Control> {
        match parent {
            Val::Class(parent) => self.initialize_instance(parent, this, args),
            Val::Function(closure) => {
                self.call_closure(closure, this.clone(), args, None)?;
                Ok(())
            }
            Val::Native(native) => {
                let native = native.clone();
                let base = (native.func)(self, this.clone(), args)?;
                if let (Val::Object(src), Val::Object(dst)) = (&base, this) {
                    if !Rc::ptr_eq(src, dst) {
                        let src = src.borrow();
                        let mut dst = dst.borrow_mut();
                        dst.kind = src.kind;
                        for (k, v) in &src.props {
                            dst.props.insert(k.clone(), v.clone());
                        }
                    }
                }
                Ok(())
            }
            other => type_error(format!(
                "Class extends value {} is not a constructor or null",
                other.inspect()
            )),
        }
    }

    /// Evaluate instance field initialisers with `this` bound
    pub fn init_fields(&mut self, class: &Rc<ClassVal>, this: &Val) -> Result<(), Control> {
        for field in class.fields.iter().filter(|f| !f.is_static) {
            let scope = Scope::function_scope(Some(&class.scope), this.clone(), None);
            let value = match &field.value {
                Some(expr) => self.eval(expr, &scope)?,
                None => Val::Undefined,
            };
            self.set_prop(this, &field.name, value)?;
        }
        Ok(())
    }

    /* ===================== Properties ===================== */

    pub fn get_prop(&mut self, target: &Val, key: &str) -> EvalResult {
        let protos = self.protos.clone();
        let value = match target {
            Val::Undefined | Val::Null => {
                return type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    target.to_js_string(),
                    key
                ));
            }
            Val::Object(obj) => {
                let found = {
                    let obj = obj.borrow();
                    obj.props
                        .get(key)
                        .cloned()
                        .or_else(|| obj.class.as_ref().and_then(|c| c.find_method(key)))
                };
                found.unwrap_or_else(|| protos.object_method(key))
            }
            Val::Array(items) => {
                if key == "length" {
                    Val::Num(items.borrow().len() as f64)
                } else if let Ok(index) = key.parse::<usize>() {
                    items.borrow().get(index).cloned().unwrap_or(Val::Undefined)
                } else {
                    protos.array_method(key)
                }
            }
            Val::Str(s) => {
                if key == "length" {
                    Val::Num(s.chars().count() as f64)
                } else if let Ok(index) = key.parse::<usize>() {
                    s.chars()
                        .nth(index)
                        .map(|c| Val::Str(c.to_string()))
                        .unwrap_or(Val::Undefined)
                } else {
                    protos.string_method(key)
                }
            }
            Val::Num(_) => protos.number_method(key),
            Val::Bool(_) | Val::Symbol(_) => protos.object_method(key),
            Val::Function(closure) => match key {
                "name" => Val::str(closure.name()),
                "length" => Val::Num(closure.func.params.iter().filter(|p| !p.rest).count() as f64),
                _ => closure
                    .props
                    .borrow()
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| protos.function_method(key)),
            },
            Val::Class(class) => {
                if key == "name" {
                    Val::str(&class.name)
                } else {
                    let mut current = Some(class.clone());
                    let mut found = None;
                    while let Some(c) = current {
                        if let Some(v) = c.statics.borrow().get(key) {
                            found = Some(v.clone());
                            break;
                        }
                        current = match &c.parent {
                            Some(Val::Class(parent)) => Some(parent.clone()),
                            _ => None,
                        };
                    }
                    found.unwrap_or_else(|| protos.function_method(key))
                }
            }
            Val::Native(native) => {
                if key == "name" {
                    Val::str(&native.name)
                } else {
                    native
                        .props
                        .borrow()
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| protos.function_method(key))
                }
            }
            Val::Element(el) => match key {
                "type" => el.kind.clone(),
                "props" => Val::Object(el.props.clone()),
                "key" => el.key.clone().map(Val::Str).unwrap_or(Val::Null),
                "ref" => el.ref_val.clone(),
                _ => Val::Undefined,
            },
            Val::RegExp(re) => match key {
                "source" => Val::str(&re.source),
                "flags" => Val::str(&re.flags),
                "lastIndex" => Val::Num(re.last_index.get() as f64),
                "global" => Val::Bool(re.has_flag('g')),
                "ignoreCase" => Val::Bool(re.has_flag('i')),
                "multiline" => Val::Bool(re.has_flag('m')),
                "dotAll" => Val::Bool(re.has_flag('s')),
                "unicode" => Val::Bool(re.has_flag('u')),
                "sticky" => Val::Bool(re.has_flag('y')),
                _ => protos.regexp_method(key),
            },
        };
        Ok(value)
    }

    pub fn set_prop(&mut self, target: &Val, key: &str, value: Val) -> Result<(), Control> {
        match target {
            Val::Undefined | Val::Null => type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                target.to_js_string(),
                key
            )),
            Val::Object(obj) => {
                obj.borrow_mut().props.insert(key.to_string(), value);
                Ok(())
            }
            Val::Array(items) => {
                let mut items = items.borrow_mut();
                if key == "length" {
                    let len = value.to_number();
                    if len < 0.0 || len.fract() != 0.0 || len > 1e7 {
                        return range_error("Invalid array length");
                    }
                    items.resize(len as usize, Val::Undefined);
                } else if let Ok(index) = key.parse::<usize>() {
                    if index > items.len() + 10_000_000 {
                        return range_error("Invalid array length");
                    }
                    if index >= items.len() {
                        items.resize(index + 1, Val::Undefined);
                    }
                    items[index] = value;
                }
                Ok(())
            }
            Val::Function(closure) => {
                closure.props.borrow_mut().insert(key.to_string(), value);
                Ok(())
            }
            Val::Class(class) => {
                class.statics.borrow_mut().insert(key.to_string(), value);
                Ok(())
            }
            Val::Native(native) => {
                native.props.borrow_mut().insert(key.to_string(), value);
                Ok(())
            }
            Val::RegExp(re) if key == "lastIndex" => {
                let index = value.to_number();
                re.last_index.set(if index.is_finite() && index > 0.0 { index as usize } else { 0 });
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn delete_prop(&mut self, target: &Val, key: &str) -> Result<bool, Control> {
        match target {
            Val::Undefined | Val::Null => type_error(format!(
                "Cannot convert undefined or null to object (deleting '{}')",
                key
            )),
            Val::Object(obj) => Ok(obj.borrow_mut().props.shift_remove(key).is_some()),
            Val::Array(items) => {
                if let Ok(index) = key.parse::<usize>() {
                    if let Some(slot) = items.borrow_mut().get_mut(index) {
                        *slot = Val::Undefined;
                    }
                }
                Ok(true)
            }
            Val::Function(closure) => Ok(closure.props.borrow_mut().shift_remove(key).is_some()),
            _ => Ok(true),
        }
    }

    /// Own enumerable keys in insertion order
    pub fn own_keys(&self, target: &Val) -> Vec<String> {
        match target {
            Val::Object(obj) => obj.borrow().props.keys().cloned().collect(),
            Val::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
            Val::Str(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
            Val::Function(closure) => closure.props.borrow().keys().cloned().collect(),
            Val::Element(_) => vec!["type".into(), "props".into(), "key".into()],
            _ => Vec::new(),
        }
    }

    /// `key in target`
    pub fn has_property(&mut self, target: &Val, key: &str) -> Result<bool, Control> {
        match target {
            Val::Object(obj) => {
                let obj = obj.borrow();
                Ok(obj.props.contains_key(key)
                    || obj
                        .class
                        .as_ref()
                        .map(|c| c.find_method(key).is_some())
                        .unwrap_or(false))
            }
            Val::Array(items) => Ok(key == "length"
                || key
                    .parse::<usize>()
                    .map(|i| i < items.borrow().len())
                    .unwrap_or(false)),
            Val::Function(_) | Val::Class(_) | Val::Native(_) | Val::Element(_) | Val::RegExp(_) => {
                Ok(!matches!(self.get_prop(target, key)?, Val::Undefined))
            }
            other => type_error(format!(
                "Cannot use 'in' operator to search for '{}' in {}",
                key,
                other.to_js_string()
            )),
        }
    }
}
