//! React runtime primitives
//!
//! Elements, the `Component` base classes, context objects, `memo` /
//! `forwardRef` wrappers and the hooks. Hook state lives in [`HookStore`],
//! keyed by the instance path the renderer assigns to each component it
//! invokes; a hook called with no component rendering throws.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::env::Scope;
use super::errors::{throw, type_error, Control, EvalResult, ERROR};
use super::interp::Interpreter;
use super::values::{ClassVal, Element, ObjRef, Object, Props, Val};

/* ===================== Type Tags ===================== */

pub const FRAGMENT: &str = "react.fragment";
pub const STRICT_MODE: &str = "react.strict_mode";
pub const MEMO: &str = "react.memo";
pub const FORWARD_REF: &str = "react.forward_ref";
pub const CONTEXT: &str = "react.context";
pub const PROVIDER: &str = "react.provider";
pub const CONSUMER: &str = "react.consumer";

const TYPEOF: &str = "$$typeof";

fn symbol(tag: &str) -> Val {
    Val::Symbol(Rc::from(tag))
}

/// `$$typeof` tag of a wrapper object (`memo`, `forwardRef`, context parts)
pub fn type_tag(value: &Val) -> Option<Rc<str>> {
    match value {
        Val::Object(obj) => match obj.borrow().props.get(TYPEOF) {
            Some(Val::Symbol(tag)) => Some(tag.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Whether a value can be rendered as a component
pub fn is_component(value: &Val) -> bool {
    match value {
        Val::Function(_) | Val::Class(_) | Val::Native(_) => true,
        other => matches!(
            type_tag(other).as_deref(),
            Some(MEMO) | Some(FORWARD_REF) | Some(PROVIDER) | Some(CONSUMER)
        ),
    }
}

fn arg(args: &[Val], i: usize) -> Val {
    args.get(i).cloned().unwrap_or(Val::Undefined)
}

fn own_prop(target: &Val, key: &str) -> Val {
    match target {
        Val::Object(obj) => obj.borrow().props.get(key).cloned().unwrap_or(Val::Undefined),
        _ => Val::Undefined,
    }
}

/* ===================== Hook Store ===================== */

enum Slot {
    State { value: Val, setter: Val },
    Reducer { value: Val, reducer: Val, dispatch: Val },
    Ref(Val),
    Memo { value: Val, deps: Option<Vec<Val>> },
    Effect { deps: Option<Vec<Val>>, cleanup: Val },
}

/// An effect scheduled by the render that just finished
#[derive(Debug, Clone)]
pub struct PendingEffect {
    pub path: String,
    pub index: usize,
    pub callback: Val,
    pub layout: bool,
}

/// The component currently being rendered
#[derive(Debug, Clone)]
pub struct Frame {
    path: String,
    index: usize,
}

#[derive(Default)]
pub struct HookStore {
    slots: HashMap<String, Vec<Slot>>,
    instances: HashMap<String, Val>,
    frame: Option<Frame>,
    effects: Vec<PendingEffect>,
    contexts: Vec<(ObjRef, Val)>,
    seen: HashSet<String>,
    dirty: bool,
}

impl HookStore {
    /// Enter a component render; returns the frame to restore afterwards
    pub fn begin(&mut self, path: &str) -> Option<Frame> {
        self.seen.insert(path.to_string());
        self.frame.replace(Frame {
            path: path.to_string(),
            index: 0,
        })
    }

    pub fn end(&mut self, previous: Option<Frame>) {
        self.frame = previous;
    }

    /// Claim the next hook slot of the rendering component
    fn claim(&mut self, hook: &str) -> Result<(String, usize), Control> {
        match self.frame.as_mut() {
            Some(frame) => {
                let index = frame.index;
                frame.index += 1;
                Ok((frame.path.clone(), index))
            }
            None => throw(
                ERROR,
                format!(
                    "Invalid hook call. {} can only be called inside of the body of a function component.",
                    hook
                ),
            ),
        }
    }

    fn slot(&self, path: &str, index: usize) -> Option<&Slot> {
        self.slots.get(path).and_then(|slots| slots.get(index))
    }

    fn slot_mut(&mut self, path: &str, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(path).and_then(|slots| slots.get_mut(index))
    }

    fn put(&mut self, path: &str, index: usize, slot: Slot) {
        let slots = self.slots.entry(path.to_string()).or_default();
        if index < slots.len() {
            slots[index] = slot;
        } else {
            slots.push(slot);
        }
    }

    fn state_value(&self, path: &str, index: usize) -> Option<Val> {
        match self.slot(path, index)? {
            Slot::State { value, .. } | Slot::Reducer { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    /// Store a new state value; an identical value schedules nothing
    fn replace_state(&mut self, path: &str, index: usize, next: Val) {
        let changed = match self.slot_mut(path, index) {
            Some(Slot::State { value, .. }) | Some(Slot::Reducer { value, .. }) => {
                if value.same_value_zero(&next) {
                    false
                } else {
                    *value = next;
                    true
                }
            }
            _ => false,
        };
        self.dirty |= changed;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether state changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn take_effects(&mut self) -> Vec<PendingEffect> {
        std::mem::take(&mut self.effects)
    }

    /// Replace an effect's cleanup, returning the previous one
    pub fn swap_cleanup(&mut self, path: &str, index: usize, next: Val) -> Val {
        match self.slot_mut(path, index) {
            Some(Slot::Effect { cleanup, .. }) => std::mem::replace(cleanup, next),
            _ => Val::Undefined,
        }
    }

    /// Class component instance at `path`
    pub fn instance(&self, path: &str) -> Option<Val> {
        self.instances.get(path).cloned()
    }

    pub fn set_instance(&mut self, path: &str, instance: Val) {
        self.instances.insert(path.to_string(), instance);
    }

    pub fn push_context(&mut self, context: ObjRef, value: Val) {
        self.contexts.push((context, value));
    }

    pub fn pop_context(&mut self) {
        self.contexts.pop();
    }

    fn context_value(&self, context: &ObjRef) -> Option<Val> {
        self.contexts
            .iter()
            .rev()
            .find(|(c, _)| Rc::ptr_eq(c, context))
            .map(|(_, v)| v.clone())
    }

    /// Start a render pass
    pub fn start_pass(&mut self) {
        self.seen.clear();
        self.contexts.clear();
    }

    /// Drop the state of components the last pass did not render; returns
    /// their pending cleanups and instances
    pub fn finish_pass(&mut self) -> (Vec<Val>, Vec<Val>) {
        let gone: Vec<String> = self
            .slots
            .keys()
            .chain(self.instances.keys())
            .filter(|path| !self.seen.contains(*path))
            .cloned()
            .collect();
        let mut cleanups = Vec::new();
        let mut unmounted = Vec::new();
        for path in gone {
            for slot in self.slots.remove(&path).unwrap_or_default() {
                if let Slot::Effect { cleanup, .. } = slot {
                    if cleanup.is_callable() {
                        cleanups.push(cleanup);
                    }
                }
            }
            if let Some(instance) = self.instances.remove(&path) {
                unmounted.push(instance);
            }
        }
        (cleanups, unmounted)
    }

    /// Cleanups of every mounted effect (teardown)
    pub fn drain_cleanups(&mut self) -> Vec<Val> {
        let mut out = Vec::new();
        for slots in self.slots.values_mut() {
            for slot in slots.iter_mut() {
                if let Slot::Effect { cleanup, .. } = slot {
                    let cleanup = std::mem::replace(cleanup, Val::Undefined);
                    if cleanup.is_callable() {
                        out.push(cleanup);
                    }
                }
            }
        }
        out
    }
}

fn deps_of(value: &Val) -> Option<Vec<Val>> {
    match value {
        Val::Array(items) => Some(items.borrow().clone()),
        _ => None,
    }
}

fn deps_changed(previous: &Option<Vec<Val>>, next: &Option<Vec<Val>>) -> bool {
    match (previous, next) {
        (Some(a), Some(b)) => a.len() != b.len() || a.iter().zip(b).any(|(x, y)| !x.same_value_zero(y)),
        _ => true,
    }
}

/* ===================== Hooks ===================== */

fn state_setter(path: String, index: usize) -> Val {
    Val::native("dispatchSetState", move |interp, _, args| {
        let Some(current) = interp.hooks.state_value(&path, index) else {
            return Ok(Val::Undefined);
        };
        let next = match arg(&args, 0) {
            f if f.is_callable() => interp.call(&f, Val::Undefined, vec![current])?,
            value => value,
        };
        interp.hooks.replace_state(&path, index, next);
        Ok(Val::Undefined)
    })
}

fn reducer_dispatch(path: String, index: usize) -> Val {
    Val::native("dispatch", move |interp, _, args| {
        let (current, reducer) = match interp.hooks.slot(&path, index) {
            Some(Slot::Reducer { value, reducer, .. }) => (value.clone(), reducer.clone()),
            _ => return Ok(Val::Undefined),
        };
        let next = interp.call(&reducer, Val::Undefined, vec![current, arg(&args, 0)])?;
        interp.hooks.replace_state(&path, index, next);
        Ok(Val::Undefined)
    })
}

pub fn use_state(interp: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    let (path, index) = interp.hooks.claim("useState")?;
    if let Some(Slot::State { value, setter }) = interp.hooks.slot(&path, index) {
        return Ok(Val::array(vec![value.clone(), setter.clone()]));
    }
    let initial = match arg(&args, 0) {
        f if f.is_callable() => interp.call(&f, Val::Undefined, Vec::new())?,
        value => value,
    };
    let setter = state_setter(path.clone(), index);
    interp.hooks.put(
        &path,
        index,
        Slot::State {
            value: initial.clone(),
            setter: setter.clone(),
        },
    );
    Ok(Val::array(vec![initial, setter]))
}

pub fn use_reducer(interp: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    let (path, index) = interp.hooks.claim("useReducer")?;
    let reducer = arg(&args, 0);
    if let Some(Slot::Reducer { value, reducer: current, dispatch }) = interp.hooks.slot_mut(&path, index) {
        *current = reducer;
        return Ok(Val::array(vec![value.clone(), dispatch.clone()]));
    }
    let initial = match arg(&args, 2) {
        init if init.is_callable() => interp.call(&init, Val::Undefined, vec![arg(&args, 1)])?,
        _ => arg(&args, 1),
    };
    let dispatch = reducer_dispatch(path.clone(), index);
    interp.hooks.put(
        &path,
        index,
        Slot::Reducer {
            value: initial.clone(),
            reducer,
            dispatch: dispatch.clone(),
        },
    );
    Ok(Val::array(vec![initial, dispatch]))
}

pub fn use_ref(interp: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    let (path, index) = interp.hooks.claim("useRef")?;
    if let Some(Slot::Ref(current)) = interp.hooks.slot(&path, index) {
        return Ok(current.clone());
    }
    let mut props = Props::new();
    props.insert("current".to_string(), arg(&args, 0));
    let reference = Val::object(props);
    interp.hooks.put(&path, index, Slot::Ref(reference.clone()));
    Ok(reference)
}

fn memoize(interp: &mut Interpreter, hook: &str, compute: Val, deps: Val, call: bool) -> EvalResult {
    let (path, index) = interp.hooks.claim(hook)?;
    let deps = deps_of(&deps);
    if let Some(Slot::Memo { value, deps: previous }) = interp.hooks.slot(&path, index) {
        if !deps_changed(previous, &deps) {
            return Ok(value.clone());
        }
    }
    let value = if call {
        interp.call(&compute, Val::Undefined, Vec::new())?
    } else {
        compute
    };
    interp.hooks.put(
        &path,
        index,
        Slot::Memo {
            value: value.clone(),
            deps,
        },
    );
    Ok(value)
}

pub fn use_memo(interp: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    memoize(interp, "useMemo", arg(&args, 0), arg(&args, 1), true)
}

pub fn use_callback(interp: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    memoize(interp, "useCallback", arg(&args, 0), arg(&args, 1), false)
}

fn schedule_effect(interp: &mut Interpreter, hook: &str, args: Vec<Val>, layout: bool) -> EvalResult {
    let (path, index) = interp.hooks.claim(hook)?;
    let callback = arg(&args, 0);
    if !callback.is_callable() {
        return type_error(format!("{} expects a function, got {}", hook, callback.describe()));
    }
    let deps = deps_of(&arg(&args, 1));
    let run = match interp.hooks.slot_mut(&path, index) {
        Some(Slot::Effect { deps: previous, .. }) => {
            let changed = deps_changed(previous, &deps);
            *previous = deps;
            changed
        }
        _ => {
            interp.hooks.put(
                &path,
                index,
                Slot::Effect {
                    deps,
                    cleanup: Val::Undefined,
                },
            );
            true
        }
    };
    if run {
        interp.hooks.effects.push(PendingEffect {
            path,
            index,
            callback,
            layout,
        });
    }
    Ok(Val::Undefined)
}

pub fn use_effect(interp: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    schedule_effect(interp, "useEffect", args, false)
}

pub fn use_layout_effect(interp: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    schedule_effect(interp, "useLayoutEffect", args, true)
}

pub fn use_context(interp: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    interp.hooks.claim("useContext")?;
    let context = arg(&args, 0);
    let Val::Object(obj) = &context else {
        return type_error("useContext expects a context object");
    };
    Ok(interp
        .hooks
        .context_value(obj)
        .unwrap_or_else(|| own_prop(&context, "_currentValue")))
}

/// Value a context consumer sees (provider value or the default)
pub fn read_context(interp: &Interpreter, context: &Val) -> Val {
    match context {
        Val::Object(obj) => interp
            .hooks
            .context_value(obj)
            .unwrap_or_else(|| own_prop(context, "_currentValue")),
        _ => Val::Undefined,
    }
}

/* ===================== Elements ===================== */

/// Static `defaultProps` of a component type
fn default_props(interp: &mut Interpreter, kind: &Val) -> Result<Option<Val>, Control> {
    if !matches!(kind, Val::Function(_) | Val::Class(_) | Val::Native(_)) {
        return Ok(None);
    }
    Ok(match interp.get_prop(kind, "defaultProps")? {
        defaults @ Val::Object(_) => Some(defaults),
        _ => None,
    })
}

/// `createElement(type, config, ...children)`
pub fn create_element(interp: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    let mut args = args.into_iter();
    let kind = args.next().unwrap_or(Val::Undefined);
    let config = args.next().unwrap_or(Val::Null);
    let children: Vec<Val> = args.collect();

    let mut props = Props::new();
    let mut key = None;
    let mut ref_val = Val::Null;
    if let Val::Object(obj) = &config {
        for (k, v) in &obj.borrow().props {
            match k.as_str() {
                "key" if !v.is_nullish() => key = Some(v.to_js_string()),
                "key" => {}
                "ref" => ref_val = v.clone(),
                _ => {
                    props.insert(k.clone(), v.clone());
                }
            }
        }
    }
    match children.len() {
        0 => {}
        1 => {
            props.insert("children".to_string(), children.into_iter().next().unwrap_or(Val::Undefined));
        }
        _ => {
            props.insert("children".to_string(), Val::array(children));
        }
    }
    if let Some(Val::Object(defaults)) = default_props(interp, &kind)? {
        for (k, v) in &defaults.borrow().props {
            if matches!(props.get(k), None | Some(Val::Undefined)) {
                props.insert(k.clone(), v.clone());
            }
        }
    }
    Ok(Val::Element(Rc::new(Element {
        kind,
        props: Rc::new(RefCell::new(Object::new(props))),
        key,
        ref_val,
    })))
}

fn clone_element(interp: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    let Val::Element(el) = arg(&args, 0) else {
        return type_error("cloneElement expects an element");
    };
    let mut config = el.props.borrow().props.clone();
    if let Some(key) = &el.key {
        config.insert("key".to_string(), Val::str(key));
    }
    if let Val::Object(extra) = arg(&args, 1) {
        for (k, v) in &extra.borrow().props {
            config.insert(k.clone(), v.clone());
        }
    }
    let mut call_args = vec![el.kind.clone(), Val::object(config)];
    call_args.extend(args.into_iter().skip(2));
    create_element(interp, call_args)
}

/* ===================== Components ===================== */

fn set_state(interp: &mut Interpreter, this: Val, args: Vec<Val>) -> EvalResult {
    let current = interp.get_prop(&this, "state")?;
    let partial = match arg(&args, 0) {
        f if f.is_callable() => {
            let props = interp.get_prop(&this, "props")?;
            interp.call(&f, Val::Undefined, vec![current.clone(), props])?
        }
        value => value,
    };
    if !partial.is_nullish() {
        let mut merged = Props::new();
        for source in [&current, &partial] {
            for key in interp.own_keys(source) {
                let value = interp.get_prop(source, &key)?;
                merged.insert(key, value);
            }
        }
        interp.set_prop(&this, "state", Val::object(merged))?;
        interp.hooks.mark_dirty();
    }
    let callback = arg(&args, 1);
    if callback.is_callable() {
        interp.call(&callback, this, Vec::new())?;
    }
    Ok(Val::Undefined)
}

/// `React.Component` / `React.PureComponent`
fn component_class(name: &str) -> Val {
    let mut methods = Props::new();
    methods.insert("setState".to_string(), Val::native("setState", set_state));
    methods.insert(
        "forceUpdate".to_string(),
        Val::native("forceUpdate", |interp, _, _| {
            interp.hooks.mark_dirty();
            Ok(Val::Undefined)
        }),
    );
    methods.insert("isReactComponent".to_string(), Val::Bool(true));
    Val::Class(Rc::new(ClassVal {
        name: name.to_string(),
        parent: None,
        constructor: None,
        methods,
        statics: RefCell::new(Props::new()),
        fields: Vec::new(),
        scope: Scope::global(),
        native_init: Some(Box::new(|interp, this, args| {
            let props = match arg(&args, 0) {
                p if p.is_nullish() => Val::object(Props::new()),
                p => p,
            };
            interp.set_prop(&this, "props", props)?;
            Ok(Val::Undefined)
        })),
    }))
}

fn tagged(tag: &str, entries: Vec<(&str, Val)>) -> Val {
    let mut props = Props::new();
    props.insert(TYPEOF.to_string(), symbol(tag));
    for (k, v) in entries {
        props.insert(k.to_string(), v);
    }
    Val::object(props)
}

fn create_context(_: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    let context = tagged(CONTEXT, vec![("_currentValue", arg(&args, 0))]);
    let provider = tagged(PROVIDER, vec![("_context", context.clone())]);
    let consumer = tagged(CONSUMER, vec![("_context", context.clone())]);
    if let Val::Object(obj) = &context {
        let mut obj = obj.borrow_mut();
        obj.props.insert("Provider".to_string(), provider);
        obj.props.insert("Consumer".to_string(), consumer);
    }
    Ok(context)
}

fn memo(_: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    let inner = arg(&args, 0);
    if !is_component(&inner) {
        return type_error(format!("memo: The first argument must be a component. Instead received: {}", inner.describe()));
    }
    Ok(tagged(MEMO, vec![("type", inner), ("compare", arg(&args, 1))]))
}

fn forward_ref(_: &mut Interpreter, args: Vec<Val>) -> EvalResult {
    let render = arg(&args, 0);
    if !render.is_callable() {
        return type_error(format!("forwardRef requires a render function but was given {}", render.describe()));
    }
    Ok(tagged(FORWARD_REF, vec![("render", render)]))
}

/// Flatten `children` into a list, dropping holes
fn children_list(interp: &mut Interpreter, children: &Val) -> Result<Vec<Val>, Control> {
    let mut out = Vec::new();
    match children {
        Val::Undefined | Val::Null | Val::Bool(_) => {}
        Val::Array(items) => {
            let items = items.borrow().clone();
            for item in items {
                out.extend(children_list(interp, &item)?);
            }
        }
        other => out.push(other.clone()),
    }
    Ok(out)
}

fn children_object() -> Val {
    let mut props = Props::new();
    props.insert(
        "toArray".to_string(),
        Val::native("toArray", |interp, _, args| Ok(Val::array(children_list(interp, &arg(&args, 0))?))),
    );
    props.insert(
        "count".to_string(),
        Val::native("count", |interp, _, args| {
            Ok(Val::Num(children_list(interp, &arg(&args, 0))?.len() as f64))
        }),
    );
    props.insert(
        "map".to_string(),
        Val::native("map", |interp, _, args| {
            let callback = arg(&args, 1);
            let mut out = Vec::new();
            for (i, child) in children_list(interp, &arg(&args, 0))?.into_iter().enumerate() {
                out.push(interp.call(&callback, Val::Undefined, vec![child, Val::Num(i as f64)])?);
            }
            Ok(Val::array(out))
        }),
    );
    Val::object(props)
}

/* ===================== Factories ===================== */

pub fn use_state_fn(_: &mut Interpreter) -> Val {
    Val::native("useState", |interp, _, args| use_state(interp, args))
}

pub fn use_reducer_fn(_: &mut Interpreter) -> Val {
    Val::native("useReducer", |interp, _, args| use_reducer(interp, args))
}

pub fn use_ref_fn(_: &mut Interpreter) -> Val {
    Val::native("useRef", |interp, _, args| use_ref(interp, args))
}

pub fn use_memo_fn(_: &mut Interpreter) -> Val {
    Val::native("useMemo", |interp, _, args| use_memo(interp, args))
}

pub fn use_callback_fn(_: &mut Interpreter) -> Val {
    Val::native("useCallback", |interp, _, args| use_callback(interp, args))
}

pub fn use_effect_fn(_: &mut Interpreter) -> Val {
    Val::native("useEffect", |interp, _, args| use_effect(interp, args))
}

pub fn use_layout_effect_fn(_: &mut Interpreter) -> Val {
    Val::native("useLayoutEffect", |interp, _, args| use_layout_effect(interp, args))
}

pub fn use_context_fn(_: &mut Interpreter) -> Val {
    Val::native("useContext", |interp, _, args| use_context(interp, args))
}

pub fn create_context_fn(_: &mut Interpreter) -> Val {
    Val::native("createContext", |interp, _, args| create_context(interp, args))
}

pub fn memo_fn(_: &mut Interpreter) -> Val {
    Val::native("memo", |interp, _, args| memo(interp, args))
}

pub fn forward_ref_fn(_: &mut Interpreter) -> Val {
    Val::native("forwardRef", |interp, _, args| forward_ref(interp, args))
}

pub fn fragment(_: &mut Interpreter) -> Val {
    symbol(FRAGMENT)
}

/// The `React` namespace object
pub fn react_object(interp: &mut Interpreter) -> Val {
    let mut props = Props::new();
    let mut add = |name: &str, value: Val| {
        props.insert(name.to_string(), value);
    };
    add(
        "createElement",
        Val::native("createElement", |interp, _, args| create_element(interp, args)),
    );
    add(
        "cloneElement",
        Val::native("cloneElement", |interp, _, args| clone_element(interp, args)),
    );
    add(
        "isValidElement",
        Val::native("isValidElement", |_, _, args| {
            Ok(Val::Bool(matches!(arg(&args, 0), Val::Element(_))))
        }),
    );
    add("Fragment", symbol(FRAGMENT));
    add("StrictMode", symbol(STRICT_MODE));
    add("Component", component_class("Component"));
    add("PureComponent", component_class("PureComponent"));
    add("Children", children_object());
    add("useState", use_state_fn(interp));
    add("useReducer", use_reducer_fn(interp));
    add("useRef", use_ref_fn(interp));
    add("useMemo", use_memo_fn(interp));
    add("useCallback", use_callback_fn(interp));
    add("useEffect", use_effect_fn(interp));
    add("useLayoutEffect", use_layout_effect_fn(interp));
    add("useContext", use_context_fn(interp));
    add("createContext", create_context_fn(interp));
    add("memo", memo_fn(interp));
    add("forwardRef", forward_ref_fn(interp));
    Val::object(props)
}
