use super::*;

const COUNTER: &str = r#"import React, { useState } from 'react';

export default function Counter() {
  const [count, setCount] = useState(0);
  const label = <span>unused</span>;
  return (
    <div className="p-4">
      <h2>Hello, world!</h2>
      <p>Count: {count}</p>
      <button onClick={() => setCount(count + 1)} disabled>Increment</button>
    </div>
  );
}
"#;

fn element(node: &SyntaxNode) -> &ElementNode {
    let SyntaxNode::Element(el) = node else {
        panic!("Expected element, got {:?}", node);
    };
    el
}

#[test]
fn test_parse_returned_markup_only() {
    let tree = parse(COUNTER).unwrap();
    assert_eq!(tree.root.tag, "div");
    assert!(tree.markup.starts_with("<div className=\"p-4\">"));
    assert!(tree.markup.ends_with("</div>"));
    assert_eq!(&COUNTER[tree.base..tree.base + tree.markup.len()], tree.markup);

    let tags: Vec<_> = tree.root.elements().map(|e| e.tag.as_str()).collect();
    assert_eq!(tags, vec!["h2", "p", "button"]);
}

#[test]
fn test_spans_are_relative_to_markup() {
    let tree = parse(COUNTER).unwrap();
    let h2 = tree.root.elements().next().unwrap();
    assert_eq!(tree.slice(h2.span), "<h2>Hello, world!</h2>");
    assert_eq!(tree.slice(h2.name_span), "h2");

    let text = h2.first_text().unwrap();
    assert_eq!(tree.slice(text.span), "Hello, world!");
    let absolute = tree.absolute(text.span);
    assert_eq!(absolute.slice(COUNTER), "Hello, world!");
}

#[test]
fn test_attributes_and_expression_slots() {
    let tree = parse(COUNTER).unwrap();
    let class = tree.root.attr("className").unwrap();
    let AttributeValue::Literal { value, span } = &class.value else {
        panic!("Expected literal, got {:?}", class.value);
    };
    assert_eq!(value, "p-4");
    assert_eq!(tree.slice(*span), "\"p-4\"");

    let p = tree.root.elements().nth(1).unwrap();
    assert!(matches!(
        &p.children[1],
        SyntaxNode::ExpressionSlot { code, .. } if code == "count"
    ));

    let button = tree.root.elements().nth(2).unwrap();
    let on_click = button.attr("onClick").unwrap();
    let AttributeValue::Expression { code, .. } = &on_click.value else {
        panic!("Expected expression, got {:?}", on_click.value);
    };
    assert_eq!(code, "() => setCount(count + 1)");
    assert_eq!(button.attr("disabled").unwrap().value, AttributeValue::Bare);
}

#[test]
fn test_text_content_span_trims_whitespace() {
    let src = "function A() { return <p>\n    Some text\n  </p>; }";
    let tree = parse(src).unwrap();
    let text = tree.root.first_text().unwrap();
    assert_eq!(tree.slice(text.content_span()), "Some text");
}

#[test]
fn test_arrow_expression_body() {
    let src = "const Badge = ({ label }) => (\n  <span className=\"badge\">{label}</span>\n);";
    let tree = parse(src).unwrap();
    assert_eq!(tree.root.tag, "span");
    assert_eq!(tree.markup, "<span className=\"badge\">{label}</span>");
}

#[test]
fn test_last_markup_return_of_component_wins() {
    let src = r#"
function helper() { return <i>helper</i>; }
function Panel({ loading }) {
  if (loading) { return <p>Loading</p>; }
  return <section><h1>Ready</h1></section>;
}
"#;
    let tree = parse(src).unwrap();
    assert_eq!(tree.root.tag, "section");
}

#[test]
fn test_class_render_method() {
    let src = r#"
class Clock extends React.Component {
  render() {
    return <time>{this.props.now}</time>;
  }
}
"#;
    assert_eq!(parse(src).unwrap().root.tag, "time");
}

#[test]
fn test_memo_wrapped_component() {
    let src = "const Row = memo(function Row() { return <tr><td>1</td></tr>; });";
    assert_eq!(parse(src).unwrap().root.tag, "tr");
}

#[test]
fn test_fragment_root() {
    let src = "export default () => <>\n  <h1>A</h1>\n  <h1>B</h1>\n</>;";
    let tree = parse(src).unwrap();
    assert!(tree.root.is_fragment());
    assert_eq!(tree.root.elements().count(), 2);
    assert_eq!(element(&tree.root.children[1]).tag, "h1");
}

#[test]
fn test_textual_fallback_when_module_does_not_parse() {
    let src = "function App() {\n  // return <nope/>\n  const s = \"return <x/>\";\n  return (\n    <main>ok</main>\n  );\n}\nfunction broken( {";
    let tree = parse(src).unwrap();
    assert_eq!(tree.root.tag, "main");
    assert_eq!(tree.root.first_text().unwrap().raw, "ok");
}

#[test]
fn test_tree_carries_source_digest() {
    let tree = parse(COUNTER).unwrap();
    assert_eq!(tree.digest, crate::types::SourceDocument::from(COUNTER).digest());
    let edited = COUNTER.replace("Hello", "Hi");
    assert_ne!(parse(&edited).unwrap().digest, tree.digest);
}

#[test]
fn test_no_return_expression() {
    let err = parse("const x = 1;\nfunction helper() { return 2; }").unwrap_err();
    assert_eq!(err, MarkupError::NoReturnExpression);

    let err = parse("function App() { return null; }").unwrap_err();
    assert_eq!(err, MarkupError::NoReturnExpression);
}

#[test]
fn test_malformed_markup_is_syntax_error() {
    let src = "function App() {\n  return <div><span></div>;\n}";
    let Err(MarkupError::Syntax(err)) = parse(src) else {
        panic!("Expected syntax error");
    };
    assert_eq!(err.line, 2);
}

#[test]
fn test_locator_order() {
    let ids: Vec<_> = LocatorChain::new().ids().collect();
    assert_eq!(ids, vec!["structural", "textual"]);
}

#[test]
fn test_tree_serializes_with_node_tags() {
    let tree = parse("const A = () => <b>x</b>;").unwrap();
    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["root"]["tag"], "b");
    assert_eq!(json["root"]["children"][0]["type"], "text");
    assert_eq!(json["base"], 16);
}
