//! Test helpers for sandbox tests
//!
//! `run_script` executes raw module source and returns whatever the top-level
//! `return` produced, skipping the component check; `execute_source` runs
//! the full transpile + execute path.

use crate::sandbox::{
    execute, ConsoleLine, Control, ExecError, ExecOptions, Interpreter, PrimitiveTable, Sandbox,
    Scope, Val, DEFAULT_MAX_STEPS,
};
use crate::syntax::parse_module;
use crate::transpiler::{lower::lower_module, DetectionChain};

/// Run module source with the standard primitives and a custom budget
pub fn run_script_with(source: &str, max_steps: u64) -> (Result<Val, ExecError>, Vec<ConsoleLine>) {
    let program = parse_module(source).expect("Parse failed");
    let mut interp = Interpreter::new(max_steps);
    let globals = Scope::global();
    PrimitiveTable::standard().instantiate(&mut interp, &globals);
    let module = Scope::function_scope(Some(&globals), Val::Undefined, None);

    let completion = interp
        .hoist(&program.body, &module)
        .and_then(|()| interp.exec_stmts(&program.body, &module));
    let result = match completion {
        Ok(()) => Ok(Val::Undefined),
        Err(Control::Return(value)) => Ok(value),
        Err(other) => Err(ExecError::from_control(other)),
    };
    (result, interp.take_console())
}

/// Run module source and return its top-level `return` value
pub fn run_script(source: &str) -> Result<Val, ExecError> {
    run_script_with(source, DEFAULT_MAX_STEPS).0
}

/// Run module source that must succeed, returning the string form of its result
pub fn run_to_string(source: &str) -> String {
    match run_script(source) {
        Ok(value) => value.to_js_string(),
        Err(err) => panic!("Expected success, got {:?}", err),
    }
}

/// Message of a script that must fail
pub fn run_error(source: &str) -> String {
    match run_script(source) {
        Err(err) => err.to_string(),
        Ok(value) => panic!("Expected failure, got {:?}", value),
    }
}

/// Lower component source and execute it with `primitives`
pub fn execute_with(source: &str, primitives: &PrimitiveTable) -> Result<Sandbox, ExecError> {
    let program = parse_module(source).expect("Parse failed");
    let lowered = lower_module(program, &DetectionChain::new()).expect("Lowering failed");
    execute(&lowered.program, primitives, ExecOptions::default())
}

pub fn execute_source(source: &str) -> Result<Sandbox, ExecError> {
    execute_with(source, &PrimitiveTable::standard())
}
