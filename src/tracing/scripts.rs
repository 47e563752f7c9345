//! Registry of loaded scripts and their sources.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::sync::lock;

/// The source backing a registered script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptSource {
    /// Full textual source.
    Text(String),
    /// The module is known but its source cannot be read.
    Unavailable,
    /// A module with no source form at all.
    BuiltIn,
}

/// Module name → source map. Modules land here either through explicit
/// registration by the embedding or when the tracer first observes a call
/// from them.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    scripts: Mutex<BTreeMap<String, ScriptSource>>,
}

impl ScriptRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a script with its source. Returns true when the module
    /// was not known before.
    pub fn register(&self, name: &str, source: ScriptSource) -> bool {
        lock(&self.scripts).insert(name.to_string(), source).is_none()
    }

    /// Notes a module observed through a trace event. Returns true on
    /// first observation.
    pub fn observe(&self, name: &str) -> bool {
        let mut scripts = lock(&self.scripts);
        if scripts.contains_key(name) {
            return false;
        }
        scripts.insert(name.to_string(), ScriptSource::Unavailable);
        true
    }

    /// All known module names.
    pub fn names(&self) -> Vec<String> {
        lock(&self.scripts).keys().cloned().collect()
    }

    /// The textual source of a script, or its sentinel.
    pub fn source(&self, name: &str) -> String {
        match lock(&self.scripts).get(name) {
            None => "Module not found".to_string(),
            Some(ScriptSource::Unavailable) => "Source not available".to_string(),
            Some(ScriptSource::BuiltIn) => "Built-in module".to_string(),
            Some(ScriptSource::Text(text)) => text.clone(),
        }
    }
}
