use maplit::hashmap;

use super::*;
use crate::sandbox::{execute, ExecOptions, PrimitiveTable};
use crate::syntax::parse_module;
use crate::transpiler::{lower::lower_module, DetectionChain};

fn try_mount(source: &str) -> Result<Renderer, RenderError> {
    let program = parse_module(source).expect("Parse failed");
    let lowered = lower_module(program, &DetectionChain::new()).expect("Lowering failed");
    let sandbox = execute(&lowered.program, &PrimitiveTable::standard(), ExecOptions::default())
        .expect("Execution failed");
    Renderer::mount(sandbox)
}

fn mount(source: &str) -> Renderer {
    try_mount(source).expect("Render failed")
}

fn click(renderer: &mut Renderer, tag: &str) {
    let node = renderer.dom().find_by_tag(tag)[0];
    renderer.dispatch(node, "click").expect("Dispatch failed");
}

fn console_messages(renderer: &Renderer) -> Vec<String> {
    renderer.console().iter().map(|l| l.message.clone()).collect()
}

const COUNTER: &str = r#"
import React, { useState } from 'react';

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

/* ===================== Hooks ===================== */

#[test]
fn test_counter_renders_and_updates() {
    let mut renderer = mount(COUNTER);
    assert_eq!(
        renderer.dom().to_html(),
        r#"<div class="p-4"><h2>Hello, world!</h2><p>Count: 0</p><button>Increment</button></div>"#
    );
    click(&mut renderer, "button");
    click(&mut renderer, "button");
    let p = renderer.dom().find_by_tag("p")[0];
    assert_eq!(renderer.dom().text_content(p), "Count: 2");
}

#[test]
fn test_effects_run_after_commit_and_clean_up() {
    let source = r#"
        function App() {
          const [n, setN] = useState(0);
          useEffect(() => {
            console.log('effect ' + n);
            return () => console.log('cleanup ' + n);
          }, [n]);
          return <button onClick={() => setN(n + 1)}>{n}</button>;
        }
    "#;
    let mut renderer = mount(source);
    assert_eq!(console_messages(&renderer), vec!["effect 0"]);
    click(&mut renderer, "button");
    assert_eq!(
        console_messages(&renderer),
        vec!["effect 0", "cleanup 0", "effect 1"]
    );
}

#[test]
fn test_state_set_in_effect_triggers_another_pass() {
    let source = r#"
        function App() {
          const [ready, setReady] = useState(false);
          useEffect(() => { setReady(true); }, []);
          return <p>{ready ? 'ready' : 'loading'}</p>;
        }
    "#;
    let renderer = mount(source);
    assert_eq!(renderer.dom().to_html(), "<p>ready</p>");
    assert_eq!(renderer.passes(), 2);
}

#[test]
fn test_reducer_ref_and_memo() {
    let source = r#"
        function reducer(state, action) {
          switch (action.type) {
            case 'add':
              return { count: state.count + action.by };
            default:
              return state;
          }
        }
        function App() {
          const [state, dispatch] = useReducer(reducer, { count: 1 });
          const renders = useRef(0);
          renders.current += 1;
          const doubled = useMemo(() => state.count * 2, [state.count]);
          return (
            <div>
              <span>{doubled}</span>
              <em>{renders.current}</em>
              <button onClick={() => dispatch({ type: 'add', by: 2 })}>add</button>
            </div>
          );
        }
    "#;
    let mut renderer = mount(source);
    assert_eq!(
        renderer.dom().to_html(),
        "<div><span>2</span><em>1</em><button>add</button></div>"
    );
    click(&mut renderer, "button");
    assert_eq!(
        renderer.dom().to_html(),
        "<div><span>6</span><em>2</em><button>add</button></div>"
    );
}

#[test]
fn test_unmounted_component_effects_are_cleaned_up() {
    let source = r#"
        function Child() {
          useEffect(() => () => console.log('bye'), []);
          return <i>c</i>;
        }
        function App() {
          const [show, setShow] = useState(true);
          return (
            <div>
              <button onClick={() => setShow(false)}>x</button>
              {show && <Child />}
            </div>
          );
        }
    "#;
    let mut renderer = mount(source);
    assert_eq!(renderer.dom().find_by_tag("i").len(), 1);
    click(&mut renderer, "button");
    assert!(renderer.dom().find_by_tag("i").is_empty());
    assert_eq!(console_messages(&renderer), vec!["bye"]);
}

#[test]
fn test_endless_state_updates_are_bounded() {
    let source = r#"
        function App() {
          const [n, setN] = useState(0);
          setN(n + 1);
          return <p>{n}</p>;
        }
    "#;
    let err = try_mount(source).unwrap_err();
    assert_eq!(err, RenderError::TooManyRenders);
}

/* ===================== Components ===================== */

#[test]
fn test_class_component_state_and_lifecycle() {
    let source = r#"
        class Toggle extends React.Component {
          constructor(props) {
            super(props);
            this.state = { on: false };
          }
          componentDidMount() {
            console.log('mounted');
          }
          render() {
            return (
              <button onClick={() => this.setState({ on: !this.state.on })}>
                {this.state.on ? 'ON' : 'OFF'}
              </button>
            );
          }
        }
    "#;
    let mut renderer = mount(source);
    assert_eq!(renderer.dom().to_html(), "<button>OFF</button>");
    assert_eq!(console_messages(&renderer), vec!["mounted"]);
    click(&mut renderer, "button");
    assert_eq!(renderer.dom().to_html(), "<button>ON</button>");
}

#[test]
fn test_context_provider_and_default() {
    let source = r#"
        const Theme = createContext('light');
        function Label() {
          const theme = useContext(Theme);
          return <span>{theme}</span>;
        }
        export default function App() {
          return (
            <div>
              <Label />
              <Theme.Provider value="dark">
                <Label />
              </Theme.Provider>
              <Theme.Consumer>{value => <b>{value}</b>}</Theme.Consumer>
            </div>
          );
        }
    "#;
    let renderer = mount(source);
    assert_eq!(
        renderer.dom().to_html(),
        "<div><span>light</span><span>dark</span><b>light</b></div>"
    );
}

#[test]
fn test_memo_forward_ref_fragments_and_lists() {
    let source = r#"
        const Inner = memo(({ label }) => <b>{label}</b>);
        const Fancy = forwardRef((props, ref) => <i>{props.children}</i>);
        function App() {
          return (
            <>
              <Inner label="x" />
              <Fancy>y</Fancy>
              <ul>{['a', 'b'].map(item => <li key={item}>{item}</li>)}</ul>
            </>
          );
        }
    "#;
    let renderer = mount(source);
    assert_eq!(
        renderer.dom().to_html(),
        "<b>x</b><i>y</i><ul><li>a</li><li>b</li></ul>"
    );
}

#[test]
fn test_host_attributes_and_style() {
    let source = r#"
        const App = () => (
          <div style={{ fontSize: 12, backgroundColor: 'red', opacity: 0.5 }} className="x" hidden={false} disabled>
            <label htmlFor="name">{null}{true}{3}</label>
          </div>
        );
    "#;
    let renderer = mount(source);
    assert_eq!(
        renderer.dom().to_html(),
        r#"<div style="font-size: 12px; background-color: red; opacity: 0.5" class="x" disabled><label for="name">3</label></div>"#
    );
}

#[test]
fn test_root_props() {
    let source = "const Greeting = ({ name, excited }) => <p>Hi {name}{excited ? '!' : '.'}</p>;";
    let lowered = lower_module(parse_module(source).unwrap(), &DetectionChain::new()).unwrap();
    let sandbox =
        execute(&lowered.program, &PrimitiveTable::standard(), ExecOptions::default()).unwrap();

    let props = hashmap! {
        "name" => Val::str("Ada"),
        "excited" => Val::Bool(true),
    };
    let props: Props = props.into_iter().map(|(k, v)| (k.to_string(), v)).collect();

    let mut renderer = Renderer::new(sandbox.interp);
    let dom = renderer.render(&sandbox.component, Val::object(props)).unwrap();
    assert_eq!(dom.to_html(), "<p>Hi Ada!</p>");
}

/* ===================== Errors ===================== */

#[test]
fn test_render_errors_are_reported() {
    let err = try_mount("function App() { throw new Error('nope'); }").unwrap_err();
    assert_eq!(
        err,
        RenderError::Runtime {
            message: "Error: nope".to_string()
        }
    );

    let err = try_mount("function App() { return <p>{{ a: 1 }}</p>; }").unwrap_err();
    assert_eq!(err, RenderError::InvalidChild("a".to_string()));
}

#[test]
fn test_self_rendering_component_is_bounded() {
    let err = try_mount("function App() { return <div><App /></div>; }").unwrap_err();
    assert_eq!(
        err,
        RenderError::Runtime {
            message: "RangeError: Maximum call stack size exceeded".to_string()
        }
    );
}

#[test]
fn test_dispatch_without_handler() {
    let mut renderer = mount("const App = () => <p>static</p>;");
    let p = renderer.dom().find_by_tag("p")[0];
    let err = renderer.dispatch(p, "click").unwrap_err();
    assert_eq!(
        err,
        RenderError::NoHandler {
            node: p,
            event: "click".to_string()
        }
    );
}

#[test]
fn test_css_property_names() {
    assert_eq!(css_property("backgroundColor"), "background-color");
    assert_eq!(css_property("color"), "color");
}
