//! Editor session
//!
//! Ties the two paths together for one document: the execution path
//! (orchestrator + renderer) produces a DOM, the editing path maps a selected
//! DOM node back to source and patches it, and the patched text re-enters the
//! orchestrator.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::markup;
use crate::orchestrator::{ExecutionResult, Orchestrator, OrchestratorOptions};
use crate::patch::{self, Edit, Strategy};
use crate::path::{self, PathError, StructuralAddress};
use crate::render::{Dom, NodeId, RenderError, Renderer};
use crate::sandbox::PrimitiveTable;
use crate::transpiler::Transpiler;
use crate::types::SourceDocument;

/// A selected element: its address and the document it was resolved in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub address: StructuralAddress,
    pub digest: String,
}

impl Selection {
    /// Address `address` in `document` without going through the preview
    pub fn new(address: StructuralAddress, document: &SourceDocument) -> Self {
        Self {
            address,
            digest: document.digest().to_string(),
        }
    }
}

pub struct EditorSession {
    document: SourceDocument,
    orchestrator: Orchestrator,
    renderer: Option<Renderer>,
    /// Sequence number of the result the renderer was mounted from
    rendered_seq: u64,
    /// Digest of the source the mounted preview was executed from
    rendered_digest: Option<String>,
    render_failure: Option<ExecutionResult>,
    strategy: Strategy,
}

impl EditorSession {
    pub fn new(config: &Config) -> Self {
        let orchestrator = Orchestrator::new(
            Transpiler::new(),
            PrimitiveTable::standard(),
            OrchestratorOptions::from(config),
        );
        Self::with_orchestrator(orchestrator, config.patch_strategy)
    }

    pub fn with_orchestrator(orchestrator: Orchestrator, strategy: Strategy) -> Self {
        Self {
            document: SourceDocument::default(),
            orchestrator,
            renderer: None,
            rendered_seq: 0,
            rendered_digest: None,
            render_failure: None,
            strategy,
        }
    }

    pub fn document(&self) -> &SourceDocument {
        &self.document
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    /// Replace the document and schedule an execution
    pub fn on_source_changed(&mut self, text: impl Into<String>) -> u64 {
        self.document = SourceDocument::new(text);
        self.orchestrator.on_source_changed(self.document.text())
    }

    /// Latest result, mounting a fresh renderer when it is a new success
    pub fn current_result(&mut self) -> Option<ExecutionResult> {
        let result = self.orchestrator.current()?;
        let ExecutionResult::Success(executed) = &result else {
            return Some(result);
        };
        if executed.seq == self.rendered_seq {
            return Some(self.render_failure.clone().unwrap_or(result));
        }

        self.rendered_seq = executed.seq;
        self.rendered_digest = None;
        self.render_failure = None;
        if let Some(mut old) = self.renderer.take() {
            if let Err(e) = old.unmount() {
                warn!(error = %e, "unmount of previous preview failed");
            }
        }
        let mounted = executed
            .take_sandbox()
            .ok_or(RenderError::NotRendered)
            .and_then(Renderer::mount);
        match mounted {
            Ok(renderer) => {
                debug!(seq = executed.seq, nodes = renderer.dom().len(), "preview rendered");
                self.renderer = Some(renderer);
                self.rendered_digest = Some(executed.digest.clone());
                Some(result)
            }
            Err(e) => {
                let failure = ExecutionResult::Failure {
                    message: e.to_string(),
                    elapsed: executed.elapsed,
                };
                self.render_failure = Some(failure.clone());
                Some(failure)
            }
        }
    }

    /// Wait for the latest change to resolve, then read it
    pub async fn settled(&mut self) -> Option<ExecutionResult> {
        self.orchestrator.settled().await;
        self.current_result()
    }

    pub fn dom(&self) -> Option<&Dom> {
        self.renderer.as_ref().map(|r| r.dom())
    }

    pub fn renderer_mut(&mut self) -> Option<&mut Renderer> {
        self.renderer.as_mut()
    }

    /// Address of a rendered element, checked against the current source
    ///
    /// Fails with [`PathError::Stale`] while the preview still shows an older
    /// document than the one being edited.
    pub fn select_element(&self, node: NodeId) -> Result<Selection, PathError> {
        let dom = self
            .dom()
            .ok_or_else(|| PathError::NotFound(format!("node {}", node)))?;
        let rendered = self.rendered_digest.as_deref().unwrap_or_default();
        if rendered != self.document.digest() {
            return Err(PathError::stale(rendered, self.document.digest()));
        }
        let address = path::address_of(dom, node, dom.root())?;
        let tree = markup::parse(self.document.text())
            .map_err(|_| PathError::NotFound(address.to_string()))?;
        path::resolve(&address, &tree)?;
        Ok(Selection {
            address,
            digest: tree.digest,
        })
    }

    /// Patch the document; an applied edit is fed back as a source change
    ///
    /// A selection made in an earlier document leaves the current one unchanged.
    pub fn apply_edit(&mut self, selection: &Selection, edit: &Edit) -> SourceDocument {
        if selection.digest != self.document.digest() {
            warn!(
                error = %PathError::stale(&selection.digest, self.document.digest()),
                "edit rejected"
            );
            return self.document.clone();
        }
        let next = patch::apply(&self.document, &selection.address, edit, self.strategy);
        if next != self.document {
            self.on_source_changed(next.text());
        }
        next
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("document", &self.document)
            .field("rendered_seq", &self.rendered_seq)
            .field("strategy", &self.strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::task::LocalSet;

    use super::*;

    const COUNTER: &str = r#"export default function Counter() {
  const [count, setCount] = useState(0);
  return (
    <div>
      <h2>Hello, world!</h2>
      <button onClick={() => setCount(count + 1)}>Increment</button>
    </div>
  );
}
"#;

    fn session() -> EditorSession {
        let config = Config {
            debounce_ms: 10,
            ..Config::default()
        };
        EditorSession::new(&config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_patch_and_rerender() {
        LocalSet::new()
            .run_until(async {
                let mut session = session();
                session.on_source_changed(COUNTER);
                let result = session.settled().await.unwrap();
                assert!(result.value().is_some(), "{:?}", result);

                let dom = session.dom().unwrap();
                let h2 = dom.find_by_tag("h2")[0];
                let selection = session.select_element(h2).unwrap();
                assert_eq!(selection.address.to_string(), "div[0] > h2[0]");
                assert_eq!(selection.digest, session.document().digest());

                let next = session.apply_edit(&selection, &Edit::Text("Hi there!".into()));
                assert_eq!(next.text(), COUNTER.replace("Hello, world!", "Hi there!"));
                assert_eq!(session.document(), &next);

                session.settled().await.unwrap();
                let html = session.dom().unwrap().to_html();
                assert_eq!(
                    html,
                    "<div><h2>Hi there!</h2><button>Increment</button></div>"
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_style_edit_reaches_preview() {
        LocalSet::new()
            .run_until(async {
                let mut session = session();
                session.on_source_changed(COUNTER);
                session.settled().await;
                let button = session.dom().unwrap().find_by_tag("button")[0];
                let selection = session.select_element(button).unwrap();

                let edit = Edit::Style {
                    property: "backgroundColor".into(),
                    value: "red".into(),
                };
                session.apply_edit(&selection, &edit);
                session.settled().await;
                let dom = session.dom().unwrap();
                let button = dom.find_by_tag("button")[0];
                assert_eq!(dom.attr(button, "style"), Some("background-color: red"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_survives_until_next_edit() {
        LocalSet::new()
            .run_until(async {
                let mut session = session();
                session.on_source_changed(COUNTER.replace("Hello, world!", "Count: {count}"));
                session.settled().await;

                let button = session.dom().unwrap().find_by_tag("button")[0];
                let renderer = session.renderer_mut().unwrap();
                renderer.dispatch(button, "click").unwrap();
                assert!(renderer.dom().to_html().contains("<h2>Count: 1</h2>"));

                // reading the same result again does not remount
                session.current_result();
                assert!(session.dom().unwrap().to_html().contains("Count: 1"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_edit_leaves_document_alone() {
        LocalSet::new()
            .run_until(async {
                let mut session = session();
                session.on_source_changed(COUNTER);
                session.settled().await;
                let before = session.document().clone();
                let seq = session.orchestrator.latest_seq();

                let address: StructuralAddress = "div[0] > p[0]".parse().unwrap();
                let next = session.apply_edit(&Selection::new(address, &before), &Edit::Text("x".into()));
                assert_eq!(next, before);
                assert_eq!(session.orchestrator.latest_seq(), seq);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_failure_is_reported() {
        LocalSet::new()
            .run_until(async {
                let mut session = session();
                session.on_source_changed("const App = () => { throw new Error('render broke'); };");
                let result = session.settled().await.unwrap();
                assert_eq!(result.error(), Some("Error: render broke"));
                assert!(session.dom().is_none());
                assert!(session.select_element(1).is_err());
                tokio::time::sleep(Duration::from_millis(1)).await;
                assert_eq!(session.current_result().unwrap().error(), Some("Error: render broke"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_from_older_document_is_rejected() {
        LocalSet::new()
            .run_until(async {
                let mut session = session();
                session.on_source_changed(COUNTER);
                session.settled().await;
                let h2 = session.dom().unwrap().find_by_tag("h2")[0];
                let selection = session.select_element(h2).unwrap();

                let edited = session.apply_edit(&selection, &Edit::Text("Hi".into()));
                let seq = session.orchestrator.latest_seq();

                // the preview still shows the previous document
                let err = session.select_element(h2).unwrap_err();
                assert!(matches!(err, PathError::Stale { .. }), "{:?}", err);

                // the old selection no longer applies
                let again = session.apply_edit(&selection, &Edit::Text("Again".into()));
                assert_eq!(again, edited);
                assert_eq!(session.document(), &edited);
                assert_eq!(session.orchestrator.latest_seq(), seq);

                session.settled().await;
                let h2 = session.dom().unwrap().find_by_tag("h2")[0];
                let fresh = session.select_element(h2).unwrap();
                assert_eq!(fresh.digest, edited.digest());
                let next = session.apply_edit(&fresh, &Edit::Text("Again".into()));
                assert!(next.text().contains("<h2>Again</h2>"));
            })
            .await;
    }
}
