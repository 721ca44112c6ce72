pub mod cli;
pub mod config;
pub mod markup;
pub mod orchestrator;
pub mod patch;
pub mod path;
pub mod render;
pub mod sandbox;
pub mod session;
pub mod store;
pub mod syntax;
pub mod transpiler;
pub mod types;

// Re-export main types
pub use types::*;

pub use config::Config;
pub use orchestrator::{ExecutionResult, Orchestrator};
pub use path::StructuralAddress;
pub use patch::{Edit, Strategy};
pub use session::{EditorSession, Selection};
