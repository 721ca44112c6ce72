//! Component detection chain
//!
//! Decides which value a module evaluates to when it has no explicit
//! terminal `return`. Rules run in order and the first match wins:
//!
//! 1. `explicit-return` - the module already ends in a top-level `return`
//! 2. `default-export` - an `export default` was present
//! 3. `capitalized-binding` - the last top-level binding whose name starts
//!    with an uppercase ASCII letter
//!
//! # Adding a New Rule
//!
//! Implement [`DetectionRule`] and insert it into [`DetectionChain::new`] at
//! the position it should take in the order.

use crate::syntax::ast::{ExportDefault, Expr, Pattern, Program, Span, Stmt};

/* ===================== Module Facts ===================== */

/// What `export default` exported
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultExport {
    /// `export default function Name` / `export default class Name` / `export default Name`
    Named(String),
    /// Any other expression, or an anonymous function/class
    Anonymous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Function,
    Class,
    Variable,
}

/// A top-level name introduced by a declaration
#[derive(Debug, Clone, PartialEq)]
pub struct TopLevelBinding {
    pub name: String,
    pub kind: BindingKind,
    pub span: Span,
}

/// Facts about a parsed module the rules decide on
#[derive(Debug, Clone, Default)]
pub struct ModuleFacts {
    pub ends_with_return: bool,
    pub default_export: Option<DefaultExport>,
    /// Declared bindings in source order
    pub bindings: Vec<TopLevelBinding>,
}

impl ModuleFacts {
    pub fn collect(program: &Program) -> Self {
        let mut facts = ModuleFacts {
            ends_with_return: matches!(
                program
                    .body
                    .iter()
                    .rev()
                    .find(|s| !matches!(s, Stmt::Empty { .. })),
                Some(Stmt::Return { .. })
            ),
            ..Default::default()
        };
        for stmt in &program.body {
            facts.visit(stmt);
        }
        facts
    }

    fn visit(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Function { func, span } => {
                if let Some(name) = &func.name {
                    self.push(name, BindingKind::Function, *span);
                }
            }
            Stmt::Class { class, span } => {
                if let Some(name) = &class.name {
                    self.push(name, BindingKind::Class, *span);
                }
            }
            Stmt::VarDecl { decls, .. } => {
                for decl in decls {
                    if let Pattern::Ident { name, span } = &decl.target {
                        self.push(name, BindingKind::Variable, *span);
                    }
                }
            }
            Stmt::ExportNamed { decl: Some(decl), .. } => self.visit(decl),
            Stmt::ExportDefault { decl, span } => {
                let export = match decl {
                    ExportDefault::Function(func) => match &func.name {
                        Some(name) => {
                            self.push(name, BindingKind::Function, *span);
                            DefaultExport::Named(name.clone())
                        }
                        None => DefaultExport::Anonymous,
                    },
                    ExportDefault::Class(class) => match &class.name {
                        Some(name) => {
                            self.push(name, BindingKind::Class, *span);
                            DefaultExport::Named(name.clone())
                        }
                        None => DefaultExport::Anonymous,
                    },
                    ExportDefault::Expr(Expr::Ident { name, .. }) => {
                        DefaultExport::Named(name.clone())
                    }
                    ExportDefault::Expr(_) => DefaultExport::Anonymous,
                };
                self.default_export = Some(export);
            }
            _ => {}
        }
    }

    fn push(&mut self, name: &str, kind: BindingKind, span: Span) {
        self.bindings.push(TopLevelBinding {
            name: name.to_string(),
            kind,
            span,
        });
    }
}

/* ===================== Rules ===================== */

/// Outcome of the detection chain
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Keep the module's own terminal return
    ExplicitReturn,
    /// Return whatever `export default` exported
    DefaultExport(DefaultExport),
    /// Return the named top-level binding
    Binding(String),
}

impl Detection {
    /// Name of the detected component, when it has one
    pub fn component_name(&self) -> Option<&str> {
        match self {
            Detection::DefaultExport(DefaultExport::Named(name)) | Detection::Binding(name) => {
                Some(name)
            }
            _ => None,
        }
    }
}

pub trait DetectionRule: Send + Sync {
    /// Stable identifier (e.g., "default-export")
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn detect(&self, facts: &ModuleFacts) -> Option<Detection>;
}

pub struct ExplicitReturnRule;

impl DetectionRule for ExplicitReturnRule {
    fn id(&self) -> &'static str {
        "explicit-return"
    }

    fn description(&self) -> &'static str {
        "module already ends in a top-level return"
    }

    fn detect(&self, facts: &ModuleFacts) -> Option<Detection> {
        facts.ends_with_return.then_some(Detection::ExplicitReturn)
    }
}

pub struct DefaultExportRule;

impl DetectionRule for DefaultExportRule {
    fn id(&self) -> &'static str {
        "default-export"
    }

    fn description(&self) -> &'static str {
        "return the default export"
    }

    fn detect(&self, facts: &ModuleFacts) -> Option<Detection> {
        facts.default_export.clone().map(Detection::DefaultExport)
    }
}

pub struct CapitalizedBindingRule;

impl DetectionRule for CapitalizedBindingRule {
    fn id(&self) -> &'static str {
        "capitalized-binding"
    }

    fn description(&self) -> &'static str {
        "return the last top-level binding whose name starts with an uppercase letter"
    }

    fn detect(&self, facts: &ModuleFacts) -> Option<Detection> {
        facts
            .bindings
            .iter()
            .rev()
            .find(|b| b.name.starts_with(|c: char| c.is_ascii_uppercase()))
            .map(|b| Detection::Binding(b.name.clone()))
    }
}

/* ===================== Chain ===================== */

pub struct DetectionChain {
    rules: Vec<Box<dyn DetectionRule>>,
}

impl DetectionChain {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ExplicitReturnRule),
                Box::new(DefaultExportRule),
                Box::new(CapitalizedBindingRule),
            ],
        }
    }

    /// First matching rule's id and outcome
    pub fn detect(&self, facts: &ModuleFacts) -> Option<(&'static str, Detection)> {
        self.rules
            .iter()
            .find_map(|rule| rule.detect(facts).map(|d| (rule.id(), d)))
    }

    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for DetectionChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the standard chain over a parsed module
pub fn detect_component(program: &Program) -> Option<(&'static str, Detection)> {
    DetectionChain::new().detect(&ModuleFacts::collect(program))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_module;

    fn detect(src: &str) -> Option<(&'static str, Detection)> {
        detect_component(&parse_module(src).unwrap())
    }

    #[test]
    fn test_rule_order_is_stable() {
        let ids: Vec<_> = DetectionChain::new().rules().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["explicit-return", "default-export", "capitalized-binding"]);
    }

    #[test]
    fn test_explicit_return_wins() {
        let (id, detection) = detect("function App() {}\nexport default App;\nreturn App;").unwrap();
        assert_eq!(id, "explicit-return");
        assert_eq!(detection, Detection::ExplicitReturn);
    }

    #[test]
    fn test_default_export_names_component() {
        let (id, detection) = detect("const helper = 1;\nexport default function Card() {}").unwrap();
        assert_eq!(id, "default-export");
        assert_eq!(detection.component_name(), Some("Card"));
    }

    #[test]
    fn test_last_capitalized_binding_in_reverse_order() {
        let (id, detection) =
            detect("function Header() {}\nconst Footer = () => null;\nconst util = 2;").unwrap();
        assert_eq!(id, "capitalized-binding");
        assert_eq!(detection, Detection::Binding("Footer".into()));
    }

    #[test]
    fn test_no_component() {
        assert!(detect("const a = 1;\nfunction helper() {}").is_none());
    }
}
