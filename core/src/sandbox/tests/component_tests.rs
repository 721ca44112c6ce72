//! Component extraction and React primitives

use super::helpers::{execute_source, execute_with, run_error, run_script};
use crate::sandbox::react::{type_tag, MEMO};
use crate::sandbox::{ExecError, PrimitiveTable, Val};

#[test]
fn test_function_component_is_extracted() {
    let sandbox = execute_source("export default function App() { return <div>hi</div>; }").unwrap();
    let Val::Function(closure) = &sandbox.component else {
        panic!("Expected function, got {:?}", sandbox.component);
    };
    assert_eq!(closure.name(), "App");
}

#[test]
fn test_class_component_is_extracted() {
    let source = r#"
        class Clock extends React.Component {
            render() { return <span>{this.props.time}</span>; }
        }
    "#;
    let sandbox = execute_source(source).unwrap();
    let Val::Class(class) = &sandbox.component else {
        panic!("Expected class, got {:?}", sandbox.component);
    };
    assert_eq!(class.name, "Clock");
    assert!(class.is_component_class());
}

#[test]
fn test_non_component_values_are_rejected() {
    let cases = [("return 42", "number"), ("return null", "null"), ("return { a: 1 }", "object")];
    for (source, expected) in cases {
        let err = execute_source(source).unwrap_err();
        assert_eq!(err, ExecError::InvalidComponentType(expected.to_string()), "{}", source);
    }
}

#[test]
fn test_memo_wrapper_is_a_component() {
    let source = r#"
        const Inner = () => null;
        export default React.memo(Inner);
    "#;
    let sandbox = execute_source(source).unwrap();
    assert_eq!(type_tag(&sandbox.component).as_deref(), Some(MEMO));
}

#[test]
fn test_module_console_is_captured() {
    let source = r#"
        console.log('loading');
        const App = () => <p />;
    "#;
    let sandbox = execute_source(source).unwrap();
    assert_eq!(sandbox.console.len(), 1);
    assert_eq!(sandbox.console[0].message, "loading");
}

#[test]
fn test_module_errors_become_runtime_errors() {
    let source = r#"
        const config = undefined;
        const size = config.size;
        const App = () => <p />;
    "#;
    let err = execute_source(source).unwrap_err();
    assert_eq!(
        err.to_string(),
        "TypeError: Cannot read properties of undefined (reading 'size')"
    );
}

#[test]
fn test_each_execution_gets_fresh_primitives() {
    let source = r#"
        if (Math.answer) throw new Error('leaked');
        Math.answer = 42;
        export default () => null;
    "#;
    let table = PrimitiveTable::standard();
    assert!(execute_with(source, &table).is_ok());
    assert!(execute_with(source, &table).is_ok());
}

#[test]
fn test_primitives_outside_the_table_are_unbound() {
    let table = PrimitiveTable::standard().without("React");
    assert!(!table.contains("React"));
    // markup is only evaluated when the component renders
    let lazy = execute_with("export default () => <div />;", &table);
    assert!(lazy.is_ok());

    let err = execute_with("const el = <div />; export default () => el;", &table).unwrap_err();
    assert_eq!(err.to_string(), "ReferenceError: React is not defined");
}

#[test]
fn test_hooks_outside_render_throw() {
    let message = run_error("useState(0)");
    assert!(message.starts_with("Error: Invalid hook call."), "{}", message);
}

#[test]
fn test_create_element_strips_key_and_ref() {
    let value = run_script("return React.createElement('div', { key: 'k', id: 'x', ref: null }, 'a', 'b')").unwrap();
    let Val::Element(el) = &value else {
        panic!("Expected element, got {:?}", value);
    };
    assert_eq!(el.kind, Val::str("div"));
    assert_eq!(el.key.as_deref(), Some("k"));
    let props = el.props.borrow();
    assert!(!props.props.contains_key("key"));
    assert!(!props.props.contains_key("ref"));
    assert_eq!(props.props["id"], Val::str("x"));
    let Some(Val::Array(children)) = props.props.get("children") else {
        panic!("Expected children array");
    };
    assert_eq!(children.borrow().len(), 2);
}

#[test]
fn test_default_props_fill_missing_values() {
    let source = r#"
        function Button(props) { return null; }
        Button.defaultProps = { size: 'md', kind: 'plain' };
        const el = <Button kind="primary" />;
        return el.props.size + ':' + el.props.kind;
    "#;
    assert_eq!(run_script(source).unwrap(), Val::str("md:primary"));
}

#[test]
fn test_context_objects_carry_provider_and_consumer() {
    let source = r#"
        const Theme = React.createContext('light');
        return [typeof Theme.Provider, Theme.Provider._context === Theme, Theme._currentValue].join();
    "#;
    assert_eq!(run_script(source).unwrap(), Val::str("object,true,light"));
}
