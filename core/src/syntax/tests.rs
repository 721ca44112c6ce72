use super::ast::*;
use super::*;

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

fn parse_ok(src: &str) -> Program {
    match parse_module(src) {
        Ok(program) => program,
        Err(err) => panic!("Expected parse success, got {}", err),
    }
}

fn last_return_markup(func: &Function) -> &JsxElement {
    let FunctionBody::Block(body) = &func.body else {
        panic!("Expected block body");
    };
    match body.last() {
        Some(Stmt::Return {
            value: Some(expr), ..
        }) => match expr.unparen() {
            Expr::Jsx(el) => el.as_ref(),
            other => panic!("Expected markup, got {:?}", other),
        },
        other => panic!("Expected return, got {:?}", other),
    }
}

#[test]
fn test_parse_counter_module() {
    let program = parse_ok(COUNTER);
    assert_eq!(program.body.len(), 2);
    assert!(matches!(program.body[0], Stmt::Import { ref source, .. } if source == "react"));

    let Stmt::ExportDefault {
        decl: ExportDefault::Function(func),
        ..
    } = &program.body[1]
    else {
        panic!("Expected default-exported function, got {:?}", program.body[1]);
    };
    assert_eq!(func.name.as_deref(), Some("Counter"));

    let root = last_return_markup(func);
    assert_eq!(root.name, JsxName::Ident("div".into()));
    let elements: Vec<&str> = root
        .children
        .iter()
        .filter_map(|c| match c {
            JsxChild::Element(el) => Some(el.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(elements, vec!["h2", "p", "button"]);
}

#[test]
fn test_markup_spans_slice_source() {
    let program = parse_ok(COUNTER);
    let Stmt::ExportDefault {
        decl: ExportDefault::Function(func),
        ..
    } = &program.body[1]
    else {
        panic!("Expected default export");
    };
    let root = last_return_markup(func);
    assert!(root.span.slice(COUNTER).starts_with("<div className=\"p-4\">"));
    assert!(root.span.slice(COUNTER).ends_with("</div>"));
    assert_eq!(root.name_span.slice(COUNTER), "div");

    let JsxChild::Element(h2) = &root.children[1] else {
        panic!("Expected h2 element, got {:?}", root.children[1]);
    };
    let JsxChild::Text { raw, span } = &h2.children[0] else {
        panic!("Expected text child");
    };
    assert_eq!(raw, "Hello, world!");
    assert_eq!(span.slice(COUNTER), "Hello, world!");

    let JsxAttr::Attr { value: Some(JsxAttrValue::Str { value, span }), .. } = &root.attrs[0]
    else {
        panic!("Expected string attribute");
    };
    assert_eq!(value, "p-4");
    assert_eq!(span.slice(COUNTER), "\"p-4\"");
}

#[test]
fn test_typescript_is_erased() {
    let src = r#"
interface Props { title: string; count?: number }
type Mode = 'a' | 'b';
const Card = ({ title }: Props): JSX.Element => {
  const [n, setN] = useState<number>(0);
  const m = (n as number) satisfies number;
  return <h1>{title!}</h1>;
};
"#;
    let program = parse_ok(src);
    assert!(matches!(program.body[0], Stmt::Empty { .. }));
    assert!(matches!(program.body[1], Stmt::Empty { .. }));
    let Stmt::VarDecl { decls, .. } = &program.body[2] else {
        panic!("Expected const declaration, got {:?}", program.body[2]);
    };
    let Some(Expr::Function { func, .. }) = &decls[0].init else {
        panic!("Expected arrow function");
    };
    assert!(func.is_arrow);
    assert_eq!(func.params.len(), 1);
    assert!(matches!(func.params[0].pattern, Pattern::Object { .. }));
}

#[test]
fn test_arrow_and_conditional_disambiguation() {
    let program = parse_ok("const v = ok ? (a) : b;\nconst f = (a, b = 2) => a + b;");
    let Stmt::VarDecl { decls, .. } = &program.body[0] else {
        panic!("Expected declaration");
    };
    assert!(matches!(decls[0].init, Some(Expr::Conditional { .. })));
    let Stmt::VarDecl { decls, .. } = &program.body[1] else {
        panic!("Expected declaration");
    };
    let Some(Expr::Function { func, .. }) = &decls[0].init else {
        panic!("Expected arrow");
    };
    assert_eq!(func.params.len(), 2);
    assert!(matches!(func.params[1].pattern, Pattern::Default { .. }));
}

#[test]
fn test_optional_chain_wraps_whole_chain() {
    let program = parse_ok("a?.b.c;");
    let Stmt::Expr { expr, .. } = &program.body[0] else {
        panic!("Expected expression statement");
    };
    let Expr::OptionalChain { expr: inner, .. } = expr else {
        panic!("Expected optional chain, got {:?}", expr);
    };
    let Expr::Member { object, optional, .. } = inner.as_ref() else {
        panic!("Expected member");
    };
    assert!(!optional);
    assert!(matches!(object.as_ref(), Expr::Member { optional: true, .. }));
}

#[test]
fn test_class_component_members() {
    let src = r#"
class Counter extends React.Component {
  state = { n: 0 };
  static label = 'x';
  constructor(props) { super(props); }
  render() { return <p>{this.state.n}</p>; }
}
"#;
    let program = parse_ok(src);
    let Stmt::Class { class, .. } = &program.body[0] else {
        panic!("Expected class");
    };
    assert_eq!(class.name.as_deref(), Some("Counter"));
    assert!(class.extends.is_some());
    assert!(class.constructor.is_some());
    assert_eq!(class.fields.len(), 2);
    assert!(class.fields[1].is_static);
    assert_eq!(class.methods[0].name, "render");
}

#[test]
fn test_markup_attribute_forms() {
    let program = parse_ok("const el = <input disabled value=\"x\" {...rest} />;");
    let Stmt::VarDecl { decls, .. } = &program.body[0] else {
        panic!("Expected declaration");
    };
    let Some(Expr::Jsx(el)) = &decls[0].init else {
        panic!("Expected markup");
    };
    assert!(el.self_closing);
    assert_eq!(el.attrs.len(), 3);
    assert!(matches!(&el.attrs[0], JsxAttr::Attr { name, value: None, .. } if name == "disabled"));
    assert!(matches!(&el.attrs[2], JsxAttr::Spread { .. }));
}

#[test]
fn test_fragments_and_nested_markup_in_expressions() {
    let src = "const el = <>{items.map(i => <li key={i}>{i}</li>)}{/* note */}</>;";
    let program = parse_ok(src);
    let Stmt::VarDecl { decls, .. } = &program.body[0] else {
        panic!("Expected declaration");
    };
    let Some(Expr::Jsx(el)) = &decls[0].init else {
        panic!("Expected markup");
    };
    assert_eq!(el.name, JsxName::Fragment);
    assert_eq!(el.children.len(), 2);
    assert!(matches!(el.children[1], JsxChild::Expr { expr: None, .. }));
}

#[test]
fn test_asi_and_restricted_return() {
    let program = parse_ok("let a = 1\nlet b = a\n++b\nfunction f() { return\n 1 }");
    assert_eq!(program.body.len(), 4);
    let Stmt::Function { func, .. } = &program.body[3] else {
        panic!("Expected function");
    };
    let FunctionBody::Block(body) = &func.body else {
        panic!("Expected block");
    };
    assert!(matches!(body[0], Stmt::Return { value: None, .. }));
}

#[test]
fn test_mismatched_closing_tag_is_positioned() {
    let err = parse_module("const x = <div><span></div>;").unwrap_err();
    assert!(err.message.contains("closing tag for <span>"), "{}", err);
    assert_eq!(err.offset, 21);
    assert_eq!((err.line, err.column), (1, 22));
}

#[test]
fn test_unclosed_element_fails() {
    let err = parse_module("function App() {\n  return <div>\n").unwrap_err();
    assert!(err.message.contains("Unclosed element <div>"), "{}", err);
    assert_eq!(err.line, 2);
}

#[test]
fn test_unsupported_constructs_are_rejected() {
    for (src, needle) in [
        ("async function f() {}", "Async"),
        ("function* g() {}", "Generator"),
        ("outer: for (;;) {}", "Labelled"),
    ] {
        let err = parse_module(src).unwrap_err();
        assert!(err.message.contains(needle), "{} -> {}", src, err);
    }
}

#[test]
fn test_template_substitutions_are_parsed() {
    let program = parse_ok("const s = `a${x + 1}b`;");
    let Stmt::VarDecl { decls, .. } = &program.body[0] else {
        panic!("Expected declaration");
    };
    let Some(Expr::Template { quasis, exprs, .. }) = &decls[0].init else {
        panic!("Expected template");
    };
    assert_eq!(quasis.len(), 2);
    assert!(matches!(exprs[0], Expr::Binary { op: BinaryOp::Add, .. }));
}

#[test]
fn test_parse_expression_range() {
    let src = "return (<p>hi</p>);";
    let expr = parse_expression_range(src, 7, 18).unwrap();
    let Expr::Paren { expr: inner, .. } = expr else {
        panic!("Expected parenthesized markup");
    };
    assert!(matches!(*inner, Expr::Jsx(_)));
}

#[test]
fn test_regex_literals() {
    let program = parse_ok("const r = /ab+c/gi;\nconst q = a / b / c;\nconst s = x.replace(/[/]/g, '-');");
    let Stmt::VarDecl { decls, .. } = &program.body[0] else {
        panic!("Expected declaration");
    };
    let Some(Expr::Regex { pattern, flags, span }) = &decls[0].init else {
        panic!("Expected regex, got {:?}", decls[0].init);
    };
    assert_eq!(pattern, "ab+c");
    assert_eq!(flags, "gi");
    assert_eq!((span.start, span.end), (10, 18));

    let Stmt::VarDecl { decls, .. } = &program.body[1] else {
        panic!("Expected declaration");
    };
    assert!(matches!(decls[0].init, Some(Expr::Binary { op: BinaryOp::Div, .. })));

    let Stmt::VarDecl { decls, .. } = &program.body[2] else {
        panic!("Expected declaration");
    };
    let Some(Expr::Call { args, .. }) = &decls[0].init else {
        panic!("Expected call, got {:?}", decls[0].init);
    };
    let ExprOrSpread::Expr(Expr::Regex { pattern, .. }) = &args[0] else {
        panic!("Expected regex argument, got {:?}", args[0]);
    };
    assert_eq!(pattern, "[/]");
}

#[test]
fn test_regex_starting_with_equals() {
    let program = parse_ok("const r = /=+/;");
    let Stmt::VarDecl { decls, .. } = &program.body[0] else {
        panic!("Expected declaration");
    };
    assert!(matches!(&decls[0].init, Some(Expr::Regex { pattern, .. }) if pattern == "=+"));
}

fn assert_too_deep(src: &str) {
    match parse_module(src) {
        Err(err) => assert!(err.message.contains("Nesting too deep"), "{}", err),
        Ok(_) => panic!("Expected nesting error"),
    }
}

#[test]
fn test_deep_parentheses_are_rejected() {
    assert_too_deep(&format!("x = {}1;", "(".repeat(20_000)));
}

#[test]
fn test_deep_unary_and_blocks_are_rejected() {
    assert_too_deep(&format!("x = {}1;", "!".repeat(20_000)));
    assert_too_deep(&"{".repeat(20_000));
    assert_too_deep(&format!("f = {}1;", "x => ".repeat(5_000)));
    assert_too_deep(&format!("x = {}1{};", "[".repeat(5_000), "]".repeat(5_000)));
}

#[test]
fn test_long_operator_chain_is_rejected() {
    let terms = vec!["1"; 5_000].join(" + ");
    assert_too_deep(&format!("x = {};", terms));
    let members = "a".to_string() + &".b".repeat(5_000);
    assert_too_deep(&format!("x = {};", members));
}

#[test]
fn test_moderate_nesting_still_parses() {
    let terms = vec!["s"; 300].join(" + ");
    parse_ok(&format!("x = {};", terms));
    parse_ok(&format!("x = {}1{};", "(".repeat(100), ")".repeat(100)));
    parse_ok(&format!("x = {}{};", "<b>".repeat(100), "</b>".repeat(100)));
}

#[test]
fn test_deep_markup_is_rejected() {
    assert_too_deep(&format!("x = {}{};", "<b>".repeat(2_000), "</b>".repeat(2_000)));
    assert!(parse_module(&format!("x = <div>{}", "<b>".repeat(300))).is_err());
    let Err(err) = parse_markup_at(&"<i>".repeat(2_000), 0) else {
        panic!("Expected nesting error");
    };
    assert!(err.message.contains("Nesting too deep"), "{}", err);
}

#[test]
fn test_deep_template_substitutions_are_rejected() {
    let depth = 2_000;
    let src = format!("x = `{}a{}`;", "${`".repeat(depth), "`}".repeat(depth));
    assert!(parse_module(&src).is_err());
    let nested = (0..600).fold("a".to_string(), |inner, _| format!("f({})", inner));
    assert_too_deep(&format!("x = `${{{}}}`;", nested));
}
