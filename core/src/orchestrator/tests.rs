use std::time::Duration;

use tokio::task::LocalSet;
use tokio::time::sleep;

use super::*;

const APP: &str = "function App() { return <h1>{TEXT}</h1>; }";

fn source(text: &str) -> String {
    APP.replace("{TEXT}", text)
}

fn orchestrator(debounce_ms: u64) -> Orchestrator {
    Orchestrator::new(
        Transpiler::new(),
        PrimitiveTable::standard(),
        OrchestratorOptions {
            debounce: Duration::from_millis(debounce_ms),
            ..Default::default()
        },
    )
}

fn executed(result: Option<ExecutionResult>) -> Rc<Executed> {
    let Some(ExecutionResult::Success(executed)) = result else {
        panic!("Expected success, got {:?}", result);
    };
    executed
}

#[tokio::test(start_paused = true)]
async fn test_idle_until_first_change() {
    LocalSet::new()
        .run_until(async {
            let orch = orchestrator(300);
            assert!(orch.current().is_none());
            orch.on_source_changed(source("a"));
            assert!(orch.current().unwrap().is_pending());
            assert_eq!(orch.attempts(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_burst_collapses_into_one_attempt() {
    LocalSet::new()
        .run_until(async {
            let orch = orchestrator(300);
            orch.on_source_changed(source("t0"));
            sleep(Duration::from_millis(50)).await;
            orch.on_source_changed(source("t50"));
            sleep(Duration::from_millis(50)).await;
            orch.on_source_changed(source("t100"));

            sleep(Duration::from_millis(299)).await;
            assert!(orch.current().unwrap().is_pending());
            assert_eq!(orch.attempts(), 0);

            let result = orch.settled().await;
            assert_eq!(orch.attempts(), 1);
            let executed = executed(result);
            assert_eq!(executed.seq, 3);
            assert!(executed.code.contains("\"t100\""));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_spaced_changes_each_run() {
    LocalSet::new()
        .run_until(async {
            let orch = orchestrator(100);
            orch.on_source_changed(source("one"));
            sleep(Duration::from_millis(150)).await;
            assert_eq!(orch.attempts(), 1);
            orch.on_source_changed(source("two"));
            sleep(Duration::from_millis(150)).await;
            assert_eq!(orch.attempts(), 2);
            assert!(executed(orch.current()).code.contains("\"two\""));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_result_is_discarded() {
    LocalSet::new()
        .run_until(async {
            let orch = orchestrator(300);
            let first = orch.on_source_changed(source("old"));
            let second = orch.on_source_changed(source("new"));
            assert!(first < second);

            let stale = ExecutionResult::Failure {
                message: "late".into(),
                elapsed: Duration::ZERO,
            };
            assert!(!orch.publish(first, stale));
            assert!(orch.current().unwrap().is_pending());

            let executed = executed(orch.settled().await);
            assert_eq!(executed.seq, second);
            assert_eq!(orch.attempts(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_late_result_does_not_replace_newer_success() {
    LocalSet::new()
        .run_until(async {
            let orch = orchestrator(300);
            let first = orch.on_source_changed(source("old"));
            let second = orch.on_source_changed(source("new"));
            let settled = executed(orch.settled().await);
            assert_eq!(settled.seq, second);

            let late = ExecutionResult::Failure {
                message: "late".into(),
                elapsed: Duration::ZERO,
            };
            assert!(!orch.publish(first, late));
            let current = executed(orch.current());
            assert_eq!(current.seq, second);
            assert!(current.code.contains("\"new\""));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_data() {
    LocalSet::new()
        .run_until(async {
            let orch = orchestrator(0);
            orch.on_source_changed("   \n");
            let result = orch.settled().await.unwrap();
            assert_eq!(result.error(), Some(NO_CODE));

            orch.on_source_changed("function App() { return <div>; }");
            let result = orch.settled().await.unwrap();
            assert!(result.error().unwrap().starts_with("SyntaxError"));

            orch.on_source_changed("const x = 1;\nreturn x;");
            let result = orch.settled().await.unwrap();
            assert!(result.error().unwrap().starts_with("InvalidComponentType"));

            orch.on_source_changed("function App() { missing(); return null; }\nthrow new Error('boom');");
            let result = orch.settled().await.unwrap();
            assert_eq!(result.error(), Some("Error: boom"));

            // still usable afterwards
            orch.on_source_changed(source("ok"));
            let executed = executed(orch.settled().await);
            assert!(executed.take_sandbox().is_some());
            assert!(executed.take_sandbox().is_none());
        })
        .await;
}

#[test]
fn test_pipeline_captures_console() {
    let transpiler = Transpiler::new();
    tokio_test::block_on(transpiler.ready());
    let result = run_pipeline(
        &transpiler,
        &PrimitiveTable::standard(),
        "console.log('loading', 1);\nconst App = () => <p/>;",
        ExecOptions::default(),
        7,
    );
    let ExecutionResult::Success(executed) = result else {
        panic!("Expected success, got {:?}", result);
    };
    assert_eq!(executed.seq, 7);
    assert_eq!(
        executed.digest,
        content_digest("console.log('loading', 1);\nconst App = () => <p/>;")
    );
    assert_eq!(executed.console.len(), 1);
    assert_eq!(executed.console[0].message, "loading 1");
    assert!(executed.component.is_callable());
}

#[test]
fn test_pipeline_requires_ready_transpiler() {
    let result = run_pipeline(
        &Transpiler::new(),
        &PrimitiveTable::standard(),
        &source("x"),
        ExecOptions::default(),
        1,
    );
    assert!(result.error().unwrap().starts_with("NotReady"));
}

#[test]
fn test_pipeline_rejects_deeply_nested_source() {
    let transpiler = Transpiler::new();
    tokio_test::block_on(transpiler.ready());
    let chain = vec!["1"; 5000].join(" + ");
    let parens = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
    for body in [chain, parens] {
        let source = format!("const App = () => <p>{{{}}}</p>;", body);
        let result = run_pipeline(
            &transpiler,
            &PrimitiveTable::standard(),
            &source,
            ExecOptions::default(),
            1,
        );
        let message = result.error().unwrap_or_default();
        assert!(message.starts_with("SyntaxError"), "{}", message);
    }
}

#[test]
fn test_pipeline_runs_moderately_nested_source() {
    let transpiler = Transpiler::new();
    tokio_test::block_on(transpiler.ready());
    let chain = vec!["1"; 300].join(" + ");
    let source = format!("const total = {};\nconst App = () => <p>{{total}}</p>;", chain);
    let result = run_pipeline(
        &transpiler,
        &PrimitiveTable::standard(),
        &source,
        ExecOptions::default(),
        1,
    );
    let ExecutionResult::Success(executed) = result else {
        panic!("Expected success, got {:?}", result);
    };
    assert!(executed.component.is_callable());
}
