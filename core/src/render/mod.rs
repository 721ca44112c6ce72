//! Render layer
//!
//! Invokes a component value inside the interpreter that produced it and
//! materialises the element tree into a [`Dom`] arena. Each commit is a full
//! render pass:
//!
//! ```text
//! render / dispatch
//!   └─ pass: element tree ─► Dom + handler table
//!        ├─ unmount cleanups for components that disappeared
//!        ├─ layout effects, then effects, then class lifecycle methods
//!        └─ state changed? ─► another pass (bounded)
//! ```
//!
//! Hook state is keyed by the component's instance path (`root/App/div/Item.2`),
//! so a component keeps its state across passes as long as it renders at the
//! same position.

pub mod dom;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::sandbox::react::{self, CONSUMER, FORWARD_REF, FRAGMENT, MEMO, PROVIDER, STRICT_MODE};
use crate::sandbox::values::{Element, Object, Props};
use crate::sandbox::{ConsoleLine, Control, ExecError, Interpreter, Sandbox, Val};
use crate::syntax::grow_stack;
pub use dom::{Dom, Node, NodeId, NodeKind};

/// Passes allowed per commit before giving up on a state loop
const MAX_PASSES: usize = 25;

/// Deepest chain of nested values one pass will descend into
pub const MAX_RENDER_DEPTH: usize = 1_000;

/// Props whose numeric values take no `px` suffix
const UNITLESS: &[&str] = &[
    "opacity",
    "zIndex",
    "fontWeight",
    "lineHeight",
    "flex",
    "flexGrow",
    "flexShrink",
    "order",
    "zoom",
];

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("{message}")]
    Runtime { message: String },

    #[error("InvalidElementType: element type is invalid, got {0}")]
    InvalidElementType(String),

    #[error("Objects are not valid as a React child (found: object with keys {{{0}}})")]
    InvalidChild(String),

    #[error("Too many re-renders. State updates keep scheduling another render.")]
    TooManyRenders,

    #[error("nothing has been rendered yet")]
    NotRendered,

    #[error("no '{event}' handler on node {node} or its ancestors")]
    NoHandler { node: NodeId, event: String },
}

impl From<Control> for RenderError {
    fn from(control: Control) -> Self {
        match ExecError::from_control(control) {
            ExecError::Runtime { message } => RenderError::Runtime { message },
            other => RenderError::Runtime {
                message: other.to_string(),
            },
        }
    }
}

/* ===================== Renderer ===================== */

/// Event handlers registered by the last pass
type HandlerTable = HashMap<NodeId, Vec<(String, Val)>>;

pub struct Renderer {
    interp: Interpreter,
    root: Option<(Val, Val)>,
    dom: Dom,
    handlers: HandlerTable,
    passes: u64,
}

impl Renderer {
    pub fn new(interp: Interpreter) -> Self {
        Self {
            interp,
            root: None,
            dom: Dom::new(),
            handlers: HashMap::new(),
            passes: 0,
        }
    }

    /// Render the component a sandbox produced, with empty props
    pub fn mount(sandbox: Sandbox) -> Result<Self, RenderError> {
        let Sandbox {
            interp, component, ..
        } = sandbox;
        let mut renderer = Self::new(interp);
        renderer.render(&component, Val::object(Props::new()))?;
        Ok(renderer)
    }

    /// Render `component` with `props` as the tree root
    pub fn render(&mut self, component: &Val, props: Val) -> Result<&Dom, RenderError> {
        self.root = Some((component.clone(), props));
        self.commit()?;
        Ok(&self.dom)
    }

    /// Invoke the handler for `event` on `node` (bubbling to ancestors) and
    /// re-render if state changed
    pub fn dispatch(&mut self, node: NodeId, event: &str) -> Result<&Dom, RenderError> {
        if self.root.is_none() {
            return Err(RenderError::NotRendered);
        }
        let mut current = Some(node);
        let handler = loop {
            let Some(id) = current else {
                return Err(RenderError::NoHandler {
                    node,
                    event: event.to_string(),
                });
            };
            let found = self
                .handlers
                .get(&id)
                .and_then(|list| list.iter().find(|(name, _)| name == event))
                .map(|(_, handler)| handler.clone());
            if let Some(handler) = found {
                break handler;
            }
            current = self.dom.parent(id);
        };
        debug!(node, event, "dispatching event");

        let synthetic = self.synthetic_event(node, event);
        self.interp.reset_budget();
        self.interp.call(&handler, Val::Undefined, vec![synthetic])?;
        if self.interp.hooks.take_dirty() {
            self.commit()?;
        }
        Ok(&self.dom)
    }

    fn synthetic_event(&self, node: NodeId, event: &str) -> Val {
        let mut target = Props::new();
        target.insert(
            "value".to_string(),
            Val::str(self.dom.attr(node, "value").unwrap_or_default()),
        );
        target.insert(
            "tagName".to_string(),
            Val::str(self.dom.tag(node).unwrap_or_default().to_uppercase()),
        );
        let noop = || Val::native("noop", |_, _, _| Ok(Val::Undefined));
        let mut props = Props::new();
        props.insert("type".to_string(), Val::str(event));
        props.insert("target".to_string(), Val::object(target));
        props.insert("preventDefault".to_string(), noop());
        props.insert("stopPropagation".to_string(), noop());
        Val::object(props)
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    /// Render passes run so far
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn console(&self) -> &[ConsoleLine] {
        &self.interp.console
    }

    pub fn take_console(&mut self) -> Vec<ConsoleLine> {
        self.interp.take_console()
    }

    /// Run every outstanding effect cleanup
    pub fn unmount(&mut self) -> Result<(), RenderError> {
        for cleanup in self.interp.hooks.drain_cleanups() {
            self.interp.call(&cleanup, Val::Undefined, Vec::new())?;
        }
        self.root = None;
        self.dom = Dom::new();
        self.handlers.clear();
        Ok(())
    }

    /* ===================== Commit ===================== */

    fn commit(&mut self) -> Result<(), RenderError> {
        let Some((component, props)) = self.root.clone() else {
            return Err(RenderError::NotRendered);
        };
        for _ in 0..MAX_PASSES {
            self.interp.reset_budget();
            self.interp.hooks.take_dirty();
            self.interp.hooks.start_pass();
            self.passes += 1;

            let mut dom = Dom::new();
            let mut handlers = HandlerTable::new();
            let mut lifecycle = Vec::new();
            let root = root_element(&component, &props);
            {
                let mut pass = Pass {
                    interp: &mut self.interp,
                    dom: &mut dom,
                    handlers: &mut handlers,
                    lifecycle: &mut lifecycle,
                    depth: 0,
                };
                let root_id = pass.dom.root();
                pass.render_value(&root, root_id, "root")?;
            }
            self.dom = dom;
            self.handlers = handlers;

            self.run_unmounts()?;
            self.run_effects()?;
            for (instance, first) in lifecycle {
                let method = if first {
                    "componentDidMount"
                } else {
                    "componentDidUpdate"
                };
                let callback = self.interp.get_prop(&instance, method)?;
                if callback.is_callable() {
                    self.interp.call(&callback, instance, Vec::new())?;
                }
            }

            if !self.interp.hooks.take_dirty() {
                return Ok(());
            }
        }
        warn!(passes = MAX_PASSES, "render did not settle");
        Err(RenderError::TooManyRenders)
    }

    fn run_unmounts(&mut self) -> Result<(), RenderError> {
        let (cleanups, instances) = self.interp.hooks.finish_pass();
        for cleanup in cleanups {
            self.interp.call(&cleanup, Val::Undefined, Vec::new())?;
        }
        for instance in instances {
            let callback = self.interp.get_prop(&instance, "componentWillUnmount")?;
            if callback.is_callable() {
                self.interp.call(&callback, instance, Vec::new())?;
            }
        }
        Ok(())
    }

    fn run_effects(&mut self) -> Result<(), RenderError> {
        let mut effects = self.interp.hooks.take_effects();
        // layout effects first; stable within each group
        effects.sort_by_key(|e| !e.layout);
        for effect in effects {
            let previous = self
                .interp
                .hooks
                .swap_cleanup(&effect.path, effect.index, Val::Undefined);
            if previous.is_callable() {
                self.interp.call(&previous, Val::Undefined, Vec::new())?;
            }
            let cleanup = self.interp.call(&effect.callback, Val::Undefined, Vec::new())?;
            if cleanup.is_callable() {
                self.interp.hooks.swap_cleanup(&effect.path, effect.index, cleanup);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("root", &self.root.as_ref().map(|(c, _)| c.component_name()))
            .field("nodes", &self.dom.len())
            .field("passes", &self.passes)
            .finish()
    }
}

fn root_element(component: &Val, props: &Val) -> Val {
    let props = match props {
        Val::Object(obj) => obj.clone(),
        _ => Rc::new(std::cell::RefCell::new(Object::new(Props::new()))),
    };
    Val::Element(Rc::new(Element {
        kind: component.clone(),
        props,
        key: None,
        ref_val: Val::Null,
    }))
}

/* ===================== Render Pass ===================== */

struct Pass<'a> {
    interp: &'a mut Interpreter,
    dom: &'a mut Dom,
    handlers: &'a mut HandlerTable,
    /// Class instances rendered this pass; `true` on first mount
    lifecycle: &'a mut Vec<(Val, bool)>,
    depth: usize,
}

impl Pass<'_> {
    fn render_value(&mut self, value: &Val, parent: NodeId, path: &str) -> Result<(), RenderError> {
        if self.depth >= MAX_RENDER_DEPTH {
            return Err(RenderError::Runtime {
                message: "RangeError: Maximum call stack size exceeded".to_string(),
            });
        }
        self.depth += 1;
        let result = grow_stack(|| self.render_value_inner(value, parent, path));
        self.depth -= 1;
        result
    }

    fn render_value_inner(&mut self, value: &Val, parent: NodeId, path: &str) -> Result<(), RenderError> {
        match value {
            Val::Undefined | Val::Null | Val::Bool(_) => Ok(()),
            Val::Str(s) => {
                self.dom.append_text(parent, s);
                Ok(())
            }
            Val::Num(_) => {
                self.dom.append_text(parent, &value.to_js_string());
                Ok(())
            }
            Val::Array(items) => {
                let items = items.borrow().clone();
                for (i, item) in items.iter().enumerate() {
                    let segment = match item {
                        Val::Element(el) => el.key.clone().unwrap_or_else(|| i.to_string()),
                        _ => i.to_string(),
                    };
                    self.render_value(item, parent, &format!("{}.{}", path, segment))?;
                }
                Ok(())
            }
            Val::Element(el) => self.render_element(el, parent, path),
            // functions as children render nothing
            Val::Function(_) | Val::Class(_) | Val::Native(_) | Val::Symbol(_) => Ok(()),
            Val::RegExp(_) => Err(RenderError::InvalidChild(String::new())),
            Val::Object(obj) => {
                let keys: Vec<String> = obj.borrow().props.keys().cloned().collect();
                Err(RenderError::InvalidChild(keys.join(", ")))
            }
        }
    }

    fn render_element(&mut self, el: &Rc<Element>, parent: NodeId, path: &str) -> Result<(), RenderError> {
        let props = Val::Object(el.props.clone());
        match &el.kind {
            Val::Str(tag) => self.render_host(tag, &props, parent, path),
            Val::Symbol(tag) if matches!(&**tag, FRAGMENT | STRICT_MODE) => {
                let children = self.interp.get_prop(&props, "children")?;
                self.render_value(&children, parent, &format!("{}/#", path))
            }
            kind => self.render_component(kind, &props, &el.ref_val, parent, path),
        }
    }

    fn render_component(
        &mut self,
        kind: &Val,
        props: &Val,
        ref_val: &Val,
        parent: NodeId,
        path: &str,
    ) -> Result<(), RenderError> {
        match kind {
            Val::Function(_) | Val::Native(_) => {
                let segment = format!("{}/{}", path, kind.component_name());
                let output = self.call_with_hooks(&segment, kind, Val::Undefined, vec![props.clone()])?;
                self.render_value(&output, parent, &segment)
            }
            Val::Class(_) => self.render_class(kind, props, parent, path),
            other => match react::type_tag(other).as_deref() {
                Some(MEMO) => {
                    let inner = self.interp.get_prop(other, "type")?;
                    self.render_component(&inner, props, ref_val, parent, path)
                }
                Some(FORWARD_REF) => {
                    let render = self.interp.get_prop(other, "render")?;
                    let segment = format!("{}/{}", path, render.component_name());
                    let output = self.call_with_hooks(
                        &segment,
                        &render,
                        Val::Undefined,
                        vec![props.clone(), ref_val.clone()],
                    )?;
                    self.render_value(&output, parent, &segment)
                }
                Some(PROVIDER) => {
                    let context = self.interp.get_prop(other, "_context")?;
                    let value = self.interp.get_prop(props, "value")?;
                    let children = self.interp.get_prop(props, "children")?;
                    let Val::Object(context) = context else {
                        return Err(RenderError::InvalidElementType("provider".to_string()));
                    };
                    self.interp.hooks.push_context(context, value);
                    let result = self.render_value(&children, parent, &format!("{}/Provider", path));
                    self.interp.hooks.pop_context();
                    result
                }
                Some(CONSUMER) => {
                    let context = self.interp.get_prop(other, "_context")?;
                    let value = react::read_context(self.interp, &context);
                    let children = self.interp.get_prop(props, "children")?;
                    let output = self.interp.call(&children, Val::Undefined, vec![value])?;
                    self.render_value(&output, parent, &format!("{}/Consumer", path))
                }
                _ => Err(RenderError::InvalidElementType(other.describe())),
            },
        }
    }

    fn call_with_hooks(&mut self, path: &str, callee: &Val, this: Val, args: Vec<Val>) -> Result<Val, RenderError> {
        let previous = self.interp.hooks.begin(path);
        let result = self.interp.call(callee, this, args);
        self.interp.hooks.end(previous);
        Ok(result?)
    }

    fn render_class(&mut self, kind: &Val, props: &Val, parent: NodeId, path: &str) -> Result<(), RenderError> {
        let segment = format!("{}/{}", path, kind.component_name());
        let (instance, first) = match self.interp.hooks.instance(&segment) {
            Some(instance) => {
                self.interp.set_prop(&instance, "props", props.clone())?;
                (instance, false)
            }
            None => {
                let instance = self.interp.construct(kind, vec![props.clone()])?;
                self.interp.hooks.set_instance(&segment, instance.clone());
                (instance, true)
            }
        };
        let render = self.interp.get_prop(&instance, "render")?;
        if !render.is_callable() {
            return Err(RenderError::InvalidElementType(format!(
                "class {} without render()",
                kind.component_name()
            )));
        }
        let output = self.call_with_hooks(&segment, &render, instance.clone(), Vec::new())?;
        self.lifecycle.push((instance, first));
        self.render_value(&output, parent, &segment)
    }

    fn render_host(&mut self, tag: &str, props: &Val, parent: NodeId, path: &str) -> Result<(), RenderError> {
        let mut attrs = Vec::new();
        let mut handlers = Vec::new();
        let entries: Vec<(String, Val)> = match props {
            Val::Object(obj) => obj
                .borrow()
                .props
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        };
        for (name, value) in &entries {
            match name.as_str() {
                "children" | "key" | "ref" | "dangerouslySetInnerHTML" => {}
                _ if is_event_prop(name) => {
                    if value.is_callable() {
                        handlers.push((event_name(name), value.clone()));
                    }
                }
                "style" => {
                    let css = match value {
                        Val::Object(_) => self.style_text(value)?,
                        Val::Str(s) => s.clone(),
                        _ => String::new(),
                    };
                    if !css.is_empty() {
                        attrs.push(("style".to_string(), css));
                    }
                }
                _ => {
                    let attr = match name.as_str() {
                        "className" => "class",
                        "htmlFor" => "for",
                        other => other,
                    };
                    match value {
                        Val::Bool(true) => attrs.push((attr.to_string(), String::new())),
                        Val::Bool(false) | Val::Undefined | Val::Null => {}
                        v if v.is_callable() => {}
                        v => attrs.push((attr.to_string(), v.to_js_string())),
                    }
                }
            }
        }
        let node = self.dom.append_element(parent, tag, attrs);
        if !handlers.is_empty() {
            self.handlers.insert(node, handlers);
        }
        let children = self.interp.get_prop(props, "children")?;
        self.render_value(&children, node, &format!("{}/{}", path, tag))
    }

    /// `{fontSize: 12, color: 'red'}` → `font-size: 12px; color: red`
    fn style_text(&mut self, style: &Val) -> Result<String, RenderError> {
        let mut parts = Vec::new();
        for key in self.interp.own_keys(style) {
            let value = self.interp.get_prop(style, &key)?;
            let text = match &value {
                Val::Undefined | Val::Null | Val::Bool(_) => continue,
                Val::Num(n) if *n != 0.0 && !UNITLESS.contains(&key.as_str()) => {
                    format!("{}px", value.to_js_string())
                }
                other => other.to_js_string(),
            };
            parts.push(format!("{}: {}", css_property(&key), text));
        }
        Ok(parts.join("; "))
    }
}

/// `onClick`-style prop names
fn is_event_prop(name: &str) -> bool {
    name.len() > 2 && name.starts_with("on") && name[2..].starts_with(|c: char| c.is_ascii_uppercase())
}

/// `onMouseEnter` → `mouseenter`
fn event_name(prop: &str) -> String {
    prop[2..].to_ascii_lowercase()
}

/// `backgroundColor` → `background-color`
pub fn css_property(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
