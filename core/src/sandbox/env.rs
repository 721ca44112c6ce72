//! Lexical scopes

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::errors::{reference_error, type_error, Control};
use super::values::{ClassVal, Val};

#[derive(Debug, Clone)]
struct Binding {
    value: Val,
    mutable: bool,
    /// `false` between hoisting and the declaration (temporal dead zone)
    initialized: bool,
}

struct ScopeData {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Scope>,
    /// Function bodies (arrows included) own their `var` bindings
    var_root: bool,
    /// Non-arrow function scopes carry the receiver
    function: Option<FunctionFrame>,
}

#[derive(Clone)]
struct FunctionFrame {
    this: Val,
    /// Class whose constructor is running; `super(...)` resolves against its parent
    home: Option<Rc<ClassVal>>,
}

/// A shared handle to a scope; closures keep their defining scope alive
#[derive(Clone)]
pub struct Scope(Rc<ScopeData>);

impl Scope {
    /// Root scope of one execution
    pub fn global() -> Self {
        Self::function_scope(None, Val::Undefined, None)
    }

    /// Block scope nested in `self`
    pub fn child(&self) -> Self {
        Scope(Rc::new(ScopeData {
            vars: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
            var_root: false,
            function: None,
        }))
    }

    /// Scope for an arrow body: owns its `var`s, inherits `this`
    pub fn arrow_scope(parent: &Scope) -> Self {
        Scope(Rc::new(ScopeData {
            vars: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
            var_root: true,
            function: None,
        }))
    }

    /// Scope for a non-arrow function body
    pub fn function_scope(parent: Option<&Scope>, this: Val, home: Option<Rc<ClassVal>>) -> Self {
        Scope(Rc::new(ScopeData {
            vars: RefCell::new(HashMap::new()),
            parent: parent.cloned(),
            var_root: true,
            function: Some(FunctionFrame { this, home }),
        }))
    }

    /// Define (or redefine) a binding in this scope
    pub fn declare(&self, name: &str, value: Val, mutable: bool) {
        self.0.vars.borrow_mut().insert(
            name.to_string(),
            Binding {
                value,
                mutable,
                initialized: true,
            },
        );
    }

    /// Hoist a `let`/`const`/`class` name without initializing it
    pub fn declare_uninitialized(&self, name: &str, mutable: bool) {
        self.0.vars.borrow_mut().insert(
            name.to_string(),
            Binding {
                value: Val::Undefined,
                mutable,
                initialized: false,
            },
        );
    }

    /// Declare `var` in the nearest function scope, keeping an existing value
    pub fn declare_var(&self, name: &str) {
        let target = self.var_root();
        let mut vars = target.0.vars.borrow_mut();
        vars.entry(name.to_string()).or_insert(Binding {
            value: Val::Undefined,
            mutable: true,
            initialized: true,
        });
    }

    /// Complete a hoisted declaration
    pub fn initialize(&self, name: &str, value: Val) {
        let mut vars = self.0.vars.borrow_mut();
        match vars.get_mut(name) {
            Some(binding) => {
                binding.value = value;
                binding.initialized = true;
            }
            None => {
                vars.insert(
                    name.to_string(),
                    Binding {
                        value,
                        mutable: true,
                        initialized: true,
                    },
                );
            }
        }
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.vars.borrow().contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Result<Val, Control> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(binding) = current.0.vars.borrow().get(name) {
                if !binding.initialized {
                    return reference_error(format!(
                        "Cannot access '{}' before initialization",
                        name
                    ));
                }
                return Ok(binding.value.clone());
            }
            scope = current.0.parent.as_ref();
        }
        reference_error(format!("{} is not defined", name))
    }

    pub fn is_defined(&self, name: &str) -> bool {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if current.has_own(name) {
                return true;
            }
            scope = current.0.parent.as_ref();
        }
        false
    }

    pub fn assign(&self, name: &str, value: Val) -> Result<(), Control> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(binding) = current.0.vars.borrow_mut().get_mut(name) {
                if !binding.initialized {
                    return reference_error(format!(
                        "Cannot access '{}' before initialization",
                        name
                    ));
                }
                if !binding.mutable {
                    return type_error("Assignment to constant variable.");
                }
                binding.value = value;
                return Ok(());
            }
            scope = current.0.parent.as_ref();
        }
        reference_error(format!("{} is not defined", name))
    }

    fn var_root(&self) -> Scope {
        let mut scope = self.clone();
        loop {
            if scope.0.var_root {
                return scope;
            }
            match scope.0.parent.clone() {
                Some(parent) => scope = parent,
                None => return scope,
            }
        }
    }

    fn frame(&self) -> Option<FunctionFrame> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(frame) = &current.0.function {
                return Some(frame.clone());
            }
            scope = current.0.parent.as_ref();
        }
        None
    }

    /// Receiver of the nearest non-arrow function
    pub fn this_val(&self) -> Val {
        self.frame().map(|f| f.this).unwrap_or(Val::Undefined)
    }

    pub fn home_class(&self) -> Option<Rc<ClassVal>> {
        self.frame().and_then(|f| f.home)
    }

    /// Snapshot of own bindings into a fresh sibling scope (per-iteration `let`)
    pub fn copy_own(&self) -> Scope {
        let copy = Scope(Rc::new(ScopeData {
            vars: RefCell::new(HashMap::new()),
            parent: self.0.parent.clone(),
            var_root: self.0.var_root,
            function: self.0.function.clone(),
        }));
        for (name, binding) in self.0.vars.borrow().iter() {
            copy.0
                .vars
                .borrow_mut()
                .insert(name.clone(), binding.clone());
        }
        copy
    }
}
