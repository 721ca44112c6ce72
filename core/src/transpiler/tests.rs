use super::*;
use crate::syntax::ast::{Expr, Stmt};

const COUNTER: &str = r#"import React, { useState } from 'react';

export default function Counter() {
  const [count, setCount] = useState(0);
  return (
    <div className="p-4">
      <h2>Hello, world!</h2>
      <p>Count: {count}</p>
      <button onClick={() => setCount(count + 1)}>Increment</button>
    </div>
  );
}
"#;

async fn ready_transpiler() -> Transpiler {
    let transpiler = Transpiler::new();
    transpiler.ready().await;
    transpiler
}

fn terminal_return(program: &Program) -> &Expr {
    match program.body.last() {
        Some(Stmt::Return {
            value: Some(value), ..
        }) => value,
        other => panic!("Expected terminal return, got {:?}", other),
    }
}

#[test]
fn test_transpile_before_ready_fails() {
    let transpiler = Transpiler::new();
    assert!(!transpiler.is_ready());
    let err = transpiler.transpile(COUNTER).unwrap_err();
    assert_eq!(err, TranspileError::NotReady);
}

#[tokio::test]
async fn test_ready_is_shared_between_clones() {
    let transpiler = Transpiler::new();
    let clone = transpiler.clone();
    transpiler.ready().await;
    assert!(clone.is_ready());
}

#[tokio::test]
async fn test_counter_compiles_to_factory_calls() {
    let transpiler = ready_transpiler().await;
    let compiled = transpiler.transpile(COUNTER).unwrap();

    assert_eq!(compiled.rule_id, "default-export");
    assert!(!compiled.code.contains("import"));
    assert!(!compiled.code.contains("export"));
    assert!(compiled.code.contains("function Counter()"));
    assert!(compiled
        .code
        .contains(r#"React.createElement("div", { className: "p-4" }, React.createElement("h2", null, "Hello, world!")"#));
    assert!(compiled
        .code
        .contains(r#"React.createElement("p", null, "Count: ", count)"#));
    assert!(compiled
        .code
        .contains(r#"{ onClick: () => setCount(count + 1) }, "Increment")"#));
    assert!(compiled.code.trim_end().ends_with("return Counter;"));

    let Expr::Ident { name, .. } = terminal_return(&compiled.program) else {
        panic!("Expected identifier return");
    };
    assert_eq!(name, "Counter");
}

#[tokio::test]
async fn test_capitalized_binding_and_named_exports() {
    let transpiler = ready_transpiler().await;
    let src = "export const helper = () => 1;\nexport const Badge = () => <span>{helper()}</span>;\nexport { helper };";
    let compiled = transpiler.transpile(src).unwrap();
    assert_eq!(compiled.rule_id, "capitalized-binding");
    assert!(compiled.code.starts_with("const helper = () => 1;"));
    assert!(compiled.code.trim_end().ends_with("return Badge;"));
}

#[tokio::test]
async fn test_anonymous_default_export_is_returned() {
    let transpiler = ready_transpiler().await;
    let compiled = transpiler
        .transpile("export default () => <p>hi</p>;")
        .unwrap();
    assert!(matches!(
        terminal_return(&compiled.program),
        Expr::Function { .. }
    ));
}

#[tokio::test]
async fn test_explicit_return_is_kept() {
    let transpiler = ready_transpiler().await;
    let compiled = transpiler
        .transpile("function A() { return null; }\nreturn A;")
        .unwrap();
    assert_eq!(compiled.rule_id, "explicit-return");
    assert_eq!(compiled.program.body.len(), 2);
}

#[tokio::test]
async fn test_no_component_found() {
    let transpiler = ready_transpiler().await;
    let err = transpiler.transpile("const x = 1;").unwrap_err();
    assert_eq!(err, TranspileError::NoComponentFound);
    assert!(err.to_string().starts_with("NoComponentFound"));
}

#[tokio::test]
async fn test_syntax_error_is_positioned() {
    let transpiler = ready_transpiler().await;
    let err = transpiler
        .transpile("function App() {\n  return <div><span></div>;\n}")
        .unwrap_err();
    let TranspileError::Syntax(err) = err else {
        panic!("Expected syntax error, got {:?}", err);
    };
    assert_eq!(err.line, 2);
    assert!(err.to_string().starts_with("SyntaxError:"));
}

#[tokio::test]
async fn test_typescript_annotations_are_erased() {
    let transpiler = ready_transpiler().await;
    let src = r#"
interface Props { label: string }
export default function Tag({ label }: Props): JSX.Element {
  const [n] = useState<number>(0);
  return <b>{label as string}{n!}</b>;
}
"#;
    let compiled = transpiler.transpile(src).unwrap();
    assert!(!compiled.code.contains("Props"));
    assert!(!compiled.code.contains("<number>"));
    assert!(compiled.code.contains("useState(0)"));
}

#[tokio::test]
async fn test_markup_text_whitespace_and_entities() {
    let transpiler = ready_transpiler().await;
    let src = "const A = () => <p>\n  a &amp; b\n  c &#x41;\n</p>;";
    let compiled = transpiler.transpile(src).unwrap();
    assert!(compiled.code.contains(r#""a & b c A""#), "{}", compiled.code);
}

#[test]
fn test_clean_jsx_text_rules() {
    assert_eq!(lower::clean_jsx_text("\n      "), None);
    assert_eq!(lower::clean_jsx_text("Count: ").as_deref(), Some("Count: "));
    assert_eq!(
        lower::clean_jsx_text("  one\n   two  \n").as_deref(),
        Some("  one two")
    );
    assert_eq!(lower::decode_entities("&lt;b&gt; &#123;x&#125; &bogus;"), "<b> {x} &bogus;");
}

#[test]
fn test_codegen_parenthesizes_by_precedence() {
    let expr = syntax::parse_expression_range("(a + b) * c", 0, 11).unwrap();
    assert_eq!(codegen::print_expr(&expr), "(a + b) * c");

    let expr = syntax::parse_expression_range("a - (b - c)", 0, 11).unwrap();
    assert_eq!(codegen::print_expr(&expr), "a - (b - c)");
}
