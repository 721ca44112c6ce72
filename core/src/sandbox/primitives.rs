//! The closed table of names visible to executed code

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::builtins;
use super::env::Scope;
use super::interp::Interpreter;
use super::react;
use super::values::Val;

/// Builds a fresh value for one interpreter
pub type Factory = fn(&mut Interpreter) -> Val;

/// Read-only, shareable table of allowed primitives
///
/// Entries are factories rather than values: every execution instantiates its
/// own copies, so nothing a program does to `Math` or `React` is visible to
/// the next one.
#[derive(Clone)]
pub struct PrimitiveTable {
    entries: Arc<IndexMap<&'static str, Factory>>,
}

impl PrimitiveTable {
    pub fn standard() -> Self {
        let entries: [(&'static str, Factory); 26] = [
            ("React", react::react_object),
            ("useState", react::use_state_fn),
            ("useEffect", react::use_effect_fn),
            ("useLayoutEffect", react::use_layout_effect_fn),
            ("useMemo", react::use_memo_fn),
            ("useCallback", react::use_callback_fn),
            ("useRef", react::use_ref_fn),
            ("useReducer", react::use_reducer_fn),
            ("useContext", react::use_context_fn),
            ("createContext", react::create_context_fn),
            ("memo", react::memo_fn),
            ("forwardRef", react::forward_ref_fn),
            ("Fragment", react::fragment),
            ("console", builtins::console),
            ("Math", builtins::math),
            ("JSON", builtins::json_object),
            ("Object", builtins::object_ctor),
            ("Array", builtins::array_ctor),
            ("String", builtins::string_ctor),
            ("Number", builtins::number_ctor),
            ("Boolean", builtins::boolean_ctor),
            ("Error", builtins::error_ctor),
            ("RegExp", builtins::regexp_ctor),
            ("parseInt", builtins::parse_int),
            ("parseFloat", builtins::parse_float),
            ("isNaN", builtins::is_nan),
        ];
        Self {
            entries: Arc::new(entries.into_iter().collect()),
        }
    }

    /// Empty table (nothing in scope)
    pub fn empty() -> Self {
        Self {
            entries: Arc::new(IndexMap::new()),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Copy of the table without `name`
    pub fn without(&self, name: &str) -> Self {
        let mut entries = (*self.entries).clone();
        entries.shift_remove(name);
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Copy of the table with an extra entry
    pub fn with(&self, name: &'static str, factory: Factory) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(name, factory);
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Declare every entry as an immutable binding in `scope`
    pub fn instantiate(&self, interp: &mut Interpreter, scope: &Scope) {
        for (name, factory) in self.entries.iter() {
            let value = factory(interp);
            scope.declare(name, value, false);
        }
    }
}

impl Default for PrimitiveTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for PrimitiveTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
