//! Transpiler service
//!
//! Turns component source into a plain program the sandbox can run:
//!
//! ```text
//! source -> parse_module -> lower_module (detection chain) -> Program
//!                                                          \-> codegen (display text)
//! ```
//!
//! The service is constructed explicitly and must be made ready before use.
//! `transpile` on a service whose `ready()` has not completed fails with
//! [`TranspileError::NotReady`].

pub mod codegen;
pub mod detect;
pub mod lower;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::syntax::{self, Program, SyntaxError};
pub use detect::{Detection, DetectionChain};

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranspileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("NoComponentFound: no return statement, default export or capitalized component binding")]
    NoComponentFound,

    #[error("NotReady: transpiler has not finished initializing")]
    NotReady,
}

/* ===================== Service ===================== */

/// Output of a successful transpile
#[derive(Debug, Clone)]
pub struct Compiled {
    /// Lowered program, ending in the component's `return`
    pub program: Program,
    /// Printed form of `program`
    pub code: String,
    /// Detection rule that picked the returned value
    pub rule_id: &'static str,
}

#[derive(Clone, Default)]
pub struct Transpiler {
    chain: Arc<OnceCell<DetectionChain>>,
}

impl Transpiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete initialization; later calls return immediately
    pub async fn ready(&self) {
        self.chain
            .get_or_init(|| async {
                let chain = DetectionChain::new();
                debug!(
                    rules = ?chain.rules().map(|(id, _)| id).collect::<Vec<_>>(),
                    "transpiler ready"
                );
                chain
            })
            .await;
    }

    pub fn is_ready(&self) -> bool {
        self.chain.initialized()
    }

    pub fn transpile(&self, source: &str) -> Result<Compiled, TranspileError> {
        let chain = self.chain.get().ok_or(TranspileError::NotReady)?;
        let program = syntax::parse_module(source)?;
        let lowered = lower::lower_module(program, chain)?;
        let code = codegen::print_program(&lowered.program);
        debug!(rule = lowered.rule_id, bytes = code.len(), "transpiled");
        Ok(Compiled {
            program: lowered.program,
            code,
            rule_id: lowered.rule_id,
        })
    }
}

impl std::fmt::Debug for Transpiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transpiler")
            .field("ready", &self.is_ready())
            .finish()
    }
}
