//! Execution orchestrator
//!
//! Debounces source changes and drives transpile + execute, keeping one
//! stable result for the editor to read.
//!
//! ```text
//!            change                 quiet window elapsed
//! Idle ─────────────► Pending ──────────────────────────► Success | Failure
//!                      ▲   │
//!                      └───┘ change within the window restarts it
//! ```
//!
//! Every change gets a sequence number. An attempt only publishes its result
//! if its number is still the latest request; anything older is dropped.
//!
//! Everything here is `!Send` (interpreter values are `Rc`), so the
//! orchestrator must be driven from inside a [`tokio::task::LocalSet`].

#[cfg(test)]
mod tests;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::sandbox::{self, ConsoleLine, ExecOptions, PrimitiveTable, Sandbox, Val};
use crate::transpiler::Transpiler;
use crate::types::content_digest;

pub const NO_CODE: &str = "No code provided";

/* ===================== Results ===================== */

/// A successful attempt
pub struct Executed {
    pub seq: u64,
    /// Digest of the source that was executed
    pub digest: String,
    pub component: Val,
    /// Printed transpiler output
    pub code: String,
    pub elapsed: Duration,
    /// Console output of the module body
    pub console: Vec<ConsoleLine>,
    sandbox: RefCell<Option<Sandbox>>,
}

impl Executed {
    /// Hand the interpreter over to a renderer; `None` once taken
    pub fn take_sandbox(&self) -> Option<Sandbox> {
        self.sandbox.borrow_mut().take()
    }
}

impl fmt::Debug for Executed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executed")
            .field("seq", &self.seq)
            .field("digest", &&self.digest[..12])
            .field("component", &self.component)
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Pending,
    Success(Rc<Executed>),
    Failure { message: String, elapsed: Duration },
}

impl ExecutionResult {
    pub fn is_pending(&self) -> bool {
        matches!(self, ExecutionResult::Pending)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExecutionResult::Failure { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Val> {
        match self {
            ExecutionResult::Success(executed) => Some(&executed.component),
            _ => None,
        }
    }
}

/// Transpile and execute one source text
pub fn run_pipeline(
    transpiler: &Transpiler,
    primitives: &PrimitiveTable,
    source: &str,
    options: ExecOptions,
    seq: u64,
) -> ExecutionResult {
    let started = Instant::now();
    let failure = |message: String| ExecutionResult::Failure {
        message,
        elapsed: started.elapsed(),
    };
    if source.trim().is_empty() {
        return failure(NO_CODE.to_string());
    }
    let compiled = match transpiler.transpile(source) {
        Ok(compiled) => compiled,
        Err(e) => return failure(e.to_string()),
    };
    match sandbox::execute(&compiled.program, primitives, options) {
        Ok(mut sandbox) => {
            let console = std::mem::take(&mut sandbox.console);
            ExecutionResult::Success(Rc::new(Executed {
                seq,
                digest: content_digest(source),
                component: sandbox.component.clone(),
                code: compiled.code,
                elapsed: started.elapsed(),
                console,
                sandbox: RefCell::new(Some(sandbox)),
            }))
        }
        Err(e) => failure(e.to_string()),
    }
}

/* ===================== Orchestrator ===================== */

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    pub debounce: Duration,
    pub exec: ExecOptions,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            exec: ExecOptions::default(),
        }
    }
}

impl From<&Config> for OrchestratorOptions {
    fn from(config: &Config) -> Self {
        Self {
            debounce: config.debounce(),
            exec: ExecOptions {
                max_steps: config.max_steps,
            },
        }
    }
}

struct Inner {
    transpiler: Transpiler,
    primitives: PrimitiveTable,
    options: OrchestratorOptions,
    /// Latest requested sequence number
    latest: Cell<u64>,
    result: RefCell<Option<ExecutionResult>>,
    timer: RefCell<Option<JoinHandle<()>>>,
    attempts: Cell<u64>,
    resolved: Notify,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Rc<Inner>,
}

impl Orchestrator {
    pub fn new(transpiler: Transpiler, primitives: PrimitiveTable, options: OrchestratorOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                transpiler,
                primitives,
                options,
                latest: Cell::new(0),
                result: RefCell::new(None),
                timer: RefCell::new(None),
                attempts: Cell::new(0),
                resolved: Notify::new(),
            }),
        }
    }

    /// Record a change and (re)start the quiet window; returns its sequence number
    pub fn on_source_changed(&self, source: impl Into<String>) -> u64 {
        let source = source.into();
        let seq = self.inner.latest.get() + 1;
        self.inner.latest.set(seq);
        *self.inner.result.borrow_mut() = Some(ExecutionResult::Pending);

        if let Some(previous) = self.inner.timer.borrow_mut().take() {
            previous.abort();
        }
        let this = self.clone();
        let debounce = self.inner.options.debounce;
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(debounce).await;
            this.attempt(seq, source).await;
        });
        *self.inner.timer.borrow_mut() = Some(handle);
        debug!(seq, "source change scheduled");
        seq
    }

    /// Current result; `None` until the first change
    pub fn current(&self) -> Option<ExecutionResult> {
        self.inner.result.borrow().clone()
    }

    /// Attempts that actually ran
    pub fn attempts(&self) -> u64 {
        self.inner.attempts.get()
    }

    pub fn latest_seq(&self) -> u64 {
        self.inner.latest.get()
    }

    /// Wait until the latest change has resolved
    pub async fn settled(&self) -> Option<ExecutionResult> {
        loop {
            let notified = self.inner.resolved.notified();
            match self.current() {
                Some(ExecutionResult::Pending) => notified.await,
                other => return other,
            }
        }
    }

    #[instrument(skip(self, source), fields(len = source.len()))]
    async fn attempt(&self, seq: u64, source: String) {
        self.inner.attempts.set(self.inner.attempts.get() + 1);
        self.inner.transpiler.ready().await;
        if seq != self.inner.latest.get() {
            debug!(seq, latest = self.inner.latest.get(), "attempt superseded before running");
            return;
        }
        let result = run_pipeline(
            &self.inner.transpiler,
            &self.inner.primitives,
            &source,
            self.inner.options.exec,
            seq,
        );
        self.publish(seq, result);
    }

    /// Store `result` unless a newer change was requested meanwhile
    fn publish(&self, seq: u64, result: ExecutionResult) -> bool {
        let latest = self.inner.latest.get();
        if seq < latest {
            debug!(seq, latest, "stale result discarded");
            return false;
        }
        match &result {
            ExecutionResult::Success(executed) => {
                info!(seq, elapsed_ms = executed.elapsed.as_millis() as u64, "execution succeeded")
            }
            ExecutionResult::Failure { message, .. } => info!(seq, %message, "execution failed"),
            ExecutionResult::Pending => {}
        }
        *self.inner.result.borrow_mut() = Some(result);
        self.inner.timer.borrow_mut().take();
        self.inner.resolved.notify_waiters();
        true
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("latest", &self.inner.latest.get())
            .field("attempts", &self.inner.attempts.get())
            .field("debounce", &self.inner.options.debounce)
            .finish()
    }
}
