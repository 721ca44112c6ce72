use super::*;

const COUNTER: &str = r#"// counter demo
function Counter() {
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

fn addr(text: &str) -> StructuralAddress {
    text.parse().unwrap()
}

#[test]
fn test_patch_text_changes_only_the_literal() {
    let doc = SourceDocument::from(COUNTER);
    let next = try_patch_text(&doc, &addr("div[0] > h2[0]"), "Hi there!").unwrap();
    assert_eq!(
        next.text(),
        COUNTER.replace("<h2>Hello, world!</h2>", "<h2>Hi there!</h2>")
    );
}

#[test]
fn test_patch_text_leaves_expression_sibling_untouched() {
    let doc = SourceDocument::from(COUNTER);
    let next = try_patch_text(&doc, &addr("div[0] > p[0]"), "Total:").unwrap();
    assert!(next.text().contains("<p>Total: {count}</p>"));
    assert_eq!(next.len(), COUNTER.len() - "Count:".len() + "Total:".len());
}

#[test]
fn test_patch_text_preserves_surrounding_whitespace() {
    let src = "const A = () => (\n  <p>\n    old text\n  </p>\n);";
    let next = try_patch_text(&src.into(), &addr("p[0]"), "new").unwrap();
    assert_eq!(next.text(), "const A = () => (\n  <p>\n    new\n  </p>\n);");
}

#[test]
fn test_patch_text_escapes_markup_characters() {
    let src = "const A = () => <p>x</p>;";
    let next = try_patch_text(&src.into(), &addr("p[0]"), "a < b {c}").unwrap();
    assert_eq!(
        next.text(),
        "const A = () => <p>a &lt; b &#123;c&#125;</p>;"
    );
    let tree = markup::parse(next.text()).unwrap();
    assert_eq!(tree.root.children.len(), 1);
}

#[test]
fn test_missing_text_target_is_a_no_op() {
    let src = "const A = () => <div><p>{value}</p><img /></div>;";
    let doc = SourceDocument::from(src);
    for address in ["div[0] > p[0]", "div[0] > img[0]", "div[0] > p[3]"] {
        assert!(try_patch_text(&doc, &addr(address), "x").is_err());
        assert_eq!(patch_text(&doc, &addr(address), "x"), doc);
    }
}

#[test]
fn test_patch_style_inserts_after_tag_name() {
    let doc = SourceDocument::from(COUNTER);
    let next = try_patch_style(&doc, &addr("div[0] > h2[0]"), "color", "red").unwrap();
    assert!(next.text().contains("<h2 style={{color: 'red'}}>Hello, world!</h2>"));
    assert_eq!(
        next.text().len(),
        COUNTER.len() + " style={{color: 'red'}}".len()
    );
}

#[test]
fn test_patch_style_upserts_existing_object() {
    let src = "const A = () => <div style={{ color: \"blue\", padding: 8 }} id=\"x\">a</div>;";
    let next = try_patch_style(&src.into(), &addr("div[0]"), "color", "red").unwrap();
    assert_eq!(
        next.text(),
        "const A = () => <div style={{color: 'red', padding: 8}} id=\"x\">a</div>;"
    );
}

#[test]
fn test_patch_style_is_idempotent() {
    let doc = SourceDocument::from(COUNTER);
    let address = addr("div[0] > button[0]");
    let once = try_patch_style(&doc, &address, "backgroundColor", "#eee").unwrap();
    let twice = try_patch_style(&once, &address, "backgroundColor", "#eee").unwrap();
    assert_eq!(once, twice);

    let src = "const A = () => <b style={{ margin: 0 }}>b</b>;";
    let once = try_patch_style(&src.into(), &addr("b[0]"), "margin", "4px").unwrap();
    let twice = try_patch_style(&once, &addr("b[0]"), "margin", "4px").unwrap();
    assert_eq!(once.text(), "const A = () => <b style={{margin: '4px'}}>b</b>;");
    assert_eq!(once, twice);
}

#[test]
fn test_patch_style_keeps_non_object_value_as_spread() {
    let src = "const A = () => <b style={styles.bold}>b</b>;";
    let next = try_patch_style(&src.into(), &addr("b[0]"), "color", "red").unwrap();
    assert_eq!(
        next.text(),
        "const A = () => <b style={{...styles.bold, color: 'red'}}>b</b>;"
    );
}

#[test]
fn test_patch_style_self_closing() {
    let src = "const A = () => <div><hr/><hr /></div>;";
    let next = try_patch_style(&src.into(), &addr("div[0] > hr[1]"), "margin", "0").unwrap();
    assert_eq!(
        next.text(),
        "const A = () => <div><hr/><hr style={{margin: '0'}} /></div>;"
    );
}

#[test]
fn test_patch_style_escapes_line_breaks() {
    let src = "const A = () => <div>x</div>;";
    let once = try_patch_style(&src.into(), &addr("div[0]"), "color", "red\nblue").unwrap();
    assert_eq!(
        once.text(),
        "const A = () => <div style={{color: 'red\\nblue'}}>x</div>;"
    );
    markup::parse(once.text()).unwrap();

    let twice = patch_style(&once, &addr("div[0]"), "color", "green");
    assert_eq!(
        twice.text(),
        "const A = () => <div style={{color: 'green'}}>x</div>;"
    );

    let separators =
        try_patch_style(&src.into(), &addr("div[0]"), "content", "a\u{2028}b\u{1}").unwrap();
    assert!(separators.text().contains(r"content: 'a\u2028b\u0001'"));
    markup::parse(separators.text()).unwrap();
}

#[test]
fn test_unparsable_source_is_unchanged() {
    let doc = SourceDocument::from("const x = ;");
    let err = try_patch_style(&doc, &addr("div[0]"), "color", "red").unwrap_err();
    assert_eq!(err, PatchError::Markup(MarkupError::NoReturnExpression));
    assert_eq!(patch_style(&doc, &addr("div[0]"), "color", "red"), doc);
}

#[test]
fn test_apply_dispatches_on_strategy() {
    let doc = SourceDocument::from(COUNTER);
    let edit = Edit::Text("Bump".into());
    let structural = apply(&doc, &addr("div[0] > h2[0]"), &edit, Strategy::Structural);
    let heuristic = apply(&doc, &addr("div[0] > h2[0]"), &edit, Strategy::Heuristic);
    assert!(structural.text().contains("<h2>Bump</h2>"));
    assert_eq!(structural, heuristic);

    assert_eq!("Heuristic".parse::<Strategy>(), Ok(Strategy::Heuristic));
    assert!("fuzzy".parse::<Strategy>().is_err());
    assert_eq!(Strategy::default().to_string(), "structural");
}
