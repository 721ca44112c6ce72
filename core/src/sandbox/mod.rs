//! Sandbox executor
//!
//! A tree-walking interpreter over the lowered program. The only free names a
//! program can see are the entries of the [`PrimitiveTable`] it is run with;
//! there is no `eval`, no `Function` constructor and no host access.
//!
//! ```text
//! Program ──► Interpreter (fresh global scope + primitives)
//!               │
//!               ├─ Return(component) ─► Sandbox { interp, component, console }
//!               └─ Throw / Abort     ─► ExecError::Runtime("Name: message")
//! ```
//!
//! The interpreter is kept alive in the [`Sandbox`] so the render layer can
//! invoke the component with the same hook store and console.

pub mod builtins;
pub mod env;
pub mod errors;
pub mod expressions;
pub mod interp;
pub mod json;
pub mod operators;
pub mod primitives;
pub mod react;
pub mod regexp;
pub mod statements;
pub mod values;

#[cfg(test)]
mod tests;

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::syntax::Program;
pub use env::Scope;
pub use errors::{Control, ErrorInfo, EvalResult};
pub use interp::{ConsoleLevel, ConsoleLine, Interpreter};
pub use primitives::PrimitiveTable;
pub use values::Val;

/// Default step budget per execution and per render
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// A thrown value, the step budget or a misplaced control statement
    #[error("{message}")]
    Runtime { message: String },

    #[error("InvalidComponentType: expected a function or class component, got {0}")]
    InvalidComponentType(String),
}

impl ExecError {
    pub fn runtime(message: impl Into<String>) -> Self {
        ExecError::Runtime {
            message: message.into(),
        }
    }

    /// Map an abrupt completion that escaped the program
    pub fn from_control(control: Control) -> Self {
        match control {
            Control::Throw(value) => Self::runtime(ErrorInfo::from_thrown(&value).to_string()),
            Control::Abort(message) => Self::runtime(message),
            Control::Break => Self::runtime("SyntaxError: Illegal break statement"),
            Control::Continue => Self::runtime("SyntaxError: Illegal continue statement"),
            Control::Return(_) | Control::ShortCircuit => Self::runtime("SyntaxError: Illegal return"),
        }
    }
}

/* ===================== Execution ===================== */

#[derive(Debug, Clone, Copy)]
pub struct ExecOptions {
    pub max_steps: u64,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// A successfully executed program
pub struct Sandbox {
    pub interp: Interpreter,
    /// The returned component value
    pub component: Val,
    /// Console output captured while the module body ran
    pub console: Vec<ConsoleLine>,
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("component", &self.component)
            .field("console", &self.console)
            .finish()
    }
}

/// Run a lowered program and extract its component
pub fn execute(
    program: &Program,
    primitives: &PrimitiveTable,
    options: ExecOptions,
) -> Result<Sandbox, ExecError> {
    let mut interp = Interpreter::new(options.max_steps);
    let globals = Scope::global();
    primitives.instantiate(&mut interp, &globals);
    let module = Scope::function_scope(Some(&globals), Val::Undefined, None);

    let completion = interp
        .hoist(&program.body, &module)
        .and_then(|()| interp.exec_stmts(&program.body, &module));
    let component = match completion {
        Ok(()) => Val::Undefined,
        Err(Control::Return(value)) => value,
        Err(other) => return Err(ExecError::from_control(other)),
    };
    debug!(steps = interp.steps(), kind = component.describe(), "module executed");

    if !react::is_component(&component) {
        return Err(ExecError::InvalidComponentType(component.describe()));
    }
    let console = interp.take_console();
    Ok(Sandbox {
        interp,
        component,
        console,
    })
}
