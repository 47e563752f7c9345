//! Activation records driven by the host runtime.
//!
//! The host constructs a [`TraceFrame`] per activation, links it to its
//! caller, keeps its locals current and reports `call`/`line`/`return`
//! events against it. The agent never creates frames itself; it only walks
//! and snapshots them while the owning thread is paused.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::inspector::value::{ObjectRef, Value};
use crate::sync::lock;

/// Shared handle to a frame.
pub type FrameRef = Arc<TraceFrame>;

/// The identity of one call site: what the profiler keys its tree on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallInfo {
    /// Qualified function name.
    pub function: String,
    /// Script id of the declaring module.
    pub module: String,
    /// 1-based line of the call site.
    pub line: u32,
}

/// One activation record on a traced thread's stack.
#[derive(Debug)]
pub struct TraceFrame {
    function: String,
    module: String,
    line: AtomicU32,
    locals: Mutex<Vec<(String, Value)>>,
    globals: Option<ObjectRef>,
    parent: Option<FrameRef>,
}

impl TraceFrame {
    /// Creates a frame for `function` in `module`, starting at 1-based
    /// `line`.
    pub fn new(
        function: impl Into<String>,
        module: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            function: function.into(),
            module: module.into(),
            line: AtomicU32::new(line),
            locals: Mutex::new(Vec::new()),
            globals: None,
            parent: None,
        }
    }

    /// Links the frame to its caller.
    pub fn with_parent(mut self, parent: FrameRef) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Attaches the module-globals object visible from this frame.
    pub fn with_globals(mut self, globals: ObjectRef) -> Self {
        self.globals = Some(globals);
        self
    }

    /// Wraps the frame into a shared handle.
    pub fn share(self) -> FrameRef {
        Arc::new(self)
    }

    /// The raw function name.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// The declaring module (script id).
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The 1-based line currently executing.
    pub fn line(&self) -> u32 {
        self.line.load(Ordering::Acquire)
    }

    /// Updates the currently executing line.
    pub fn set_line(&self, line: u32) {
        self.line.store(line, Ordering::Release);
    }

    /// The caller's frame, if any.
    pub fn parent(&self) -> Option<&FrameRef> {
        self.parent.as_ref()
    }

    /// The module globals, if attached.
    pub fn globals(&self) -> Option<&ObjectRef> {
        self.globals.as_ref()
    }

    /// Stable identity token for the live frame. Tokens are only
    /// meaningful while the frame is on a paused thread's stack.
    pub fn id(&self) -> usize {
        self as *const Self as usize
    }

    /// Inserts or updates a local variable.
    pub fn set_local(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let mut locals = lock(&self.locals);
        if let Some(entry) = locals.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            locals.push((name, value));
        }
    }

    /// Looks a local up by name.
    pub fn local(&self, name: &str) -> Option<Value> {
        lock(&self.locals).iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
    }

    /// Snapshot of the locals, in definition order.
    pub fn locals(&self) -> Vec<(String, Value)> {
        lock(&self.locals).clone()
    }

    /// The call identity of this frame.
    ///
    /// The function name is qualified with the owning type when the first
    /// local is a self-reference.
    pub fn call_info(&self) -> CallInfo {
        let function = match lock(&self.locals).first() {
            Some((name, Value::Object(receiver))) if name == "self" => {
                format!("{}.{}", receiver.class_name(), self.function)
            }
            _ => self.function.clone(),
        };
        CallInfo { function, module: self.module.clone(), line: self.line() }
    }
}
