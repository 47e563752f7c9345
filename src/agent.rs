//! The agent: one value owning every subsystem, plus the process-wide
//! embedding surface.
//!
//! The tracer hook signature is fixed by the host runtime, so the crate
//! keeps a bounded-lifetime pointer to the active agent: installed by
//! [`attach`], cleared by [`detach`]. Everything else receives the agent by
//! reference.

use std::io;
use std::sync::{Arc, Mutex};

use crate::broker::Broker;
use crate::inspector::value::{ObjectValue, Value};
use crate::inspector::{eval, EncodeOptions, ObjectRegistry};
use crate::profiler::ProfileRegistry;
use crate::protocol::{
    line_to_wire, CallFrame, EvaluateResult, Location, PausedEvent, Scope,
};
use crate::server;
use crate::sync::lock;
use crate::tracing::frame::FrameRef;
use crate::tracing::scripts::{ScriptRegistry, ScriptSource};
use crate::tracing::{is_worker_thread, set_current_frame, Tracer};

/// Configuration for a new [`Agent`].
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Address the WebSocket endpoint binds to.
    pub bind_addr: String,
    /// Module globs whose frames are invisible to the tracer.
    pub skip_patterns: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9222".to_string(),
            // The agent's own modules and the transport library.
            skip_patterns: vec!["chromedebug*".to_string(), "tungstenite*".to_string()],
        }
    }
}

impl AgentConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint bind address.
    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Adds a module glob to the skip filter.
    pub fn with_skip_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.skip_patterns.push(pattern.into());
        self
    }
}

/// The debugging agent: tracer, object registry, profiles, scripts and the
/// session broker behind one handle.
#[derive(Debug)]
pub struct Agent {
    config: AgentConfig,
    tracer: Tracer,
    registry: ObjectRegistry,
    profiles: ProfileRegistry,
    scripts: ScriptRegistry,
    broker: Broker,
}

impl Agent {
    /// Creates a detached agent. Call [`Tracer::attach`] (or use the
    /// crate-level [`attach`]) before reporting trace events.
    pub fn new(config: AgentConfig) -> Self {
        let tracer = Tracer::new(config.skip_patterns.clone());
        Self {
            config,
            tracer,
            registry: ObjectRegistry::new(),
            profiles: ProfileRegistry::new(),
            scripts: ScriptRegistry::new(),
            broker: Broker::new(),
        }
    }

    /// The configuration the agent was built with.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The execution tracer.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// The object registry.
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// The profile registry.
    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    /// The script registry.
    pub fn scripts(&self) -> &ScriptRegistry {
        &self.scripts
    }

    /// The session broker.
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Registers a script with its source, broadcasting
    /// `Debugger.scriptParsed` on first registration.
    pub fn register_script(&self, name: &str, source: ScriptSource) {
        if self.scripts.register(name, source) {
            self.broker.debugger_script_parsed(name);
        }
    }

    /// Reports a `call` event: the traced thread entered `frame`.
    pub fn trace_call(&self, frame: &FrameRef) {
        if !self.tracer.is_attached() || self.tracer.is_skipped(frame) {
            return;
        }
        set_current_frame(Some(frame.clone()));
        if self.scripts.observe(frame.module()) {
            self.broker.debugger_script_parsed(frame.module());
        }
        // Both consumers see one dispatch per event; their relative order
        // is unspecified.
        self.profiles.record_call(&frame.call_info());
        self.tracer.note_call();
    }

    /// Reports a `line` event: `frame` is about to execute 1-based `line`.
    ///
    /// This is the only entry point that can block: when the stepping state
    /// or a breakpoint warrants a stop, the calling thread parks in the
    /// pause rendezvous until a resume-class command arrives.
    pub fn trace_line(&self, frame: &FrameRef, line: u32) {
        frame.set_line(line);
        if !self.tracer.is_attached() || self.tracer.is_skipped(frame) {
            return;
        }
        set_current_frame(Some(frame.clone()));
        if self.tracer.line_decision(frame) {
            self.pause_at(frame);
        }
    }

    /// Reports a `return` event: the traced thread is leaving `frame`.
    pub fn trace_return(&self, frame: &FrameRef) {
        if !self.tracer.is_attached() || self.tracer.is_skipped(frame) {
            return;
        }
        set_current_frame(frame.parent().cloned());
        self.profiles.record_return();
        if self.tracer.note_return() {
            // Step-out fired: anchor the pause at the caller.
            let anchor = frame.parent().cloned().unwrap_or_else(|| frame.clone());
            self.pause_at(&anchor);
        }
    }

    fn pause_at(&self, frame: &FrameRef) {
        // The transport worker must never park itself.
        if is_worker_thread() {
            return;
        }
        let event = self.extract_call_frames(frame);
        self.tracer.enter_pause(frame, event, &self.broker);
    }

    /// Walks from `frame` outward, snapshotting every activation up to the
    /// embedding base frame.
    fn extract_call_frames(&self, frame: &FrameRef) -> PausedEvent {
        let base = self.tracer.base_frame();
        let mut call_frames = Vec::new();
        let mut cursor = Some(frame.clone());
        while let Some(f) = cursor {
            if base.as_ref().is_some_and(|b| Arc::ptr_eq(b, &f)) {
                break;
            }
            call_frames.push(self.snapshot_frame(&f));
            cursor = f.parent().cloned();
        }
        PausedEvent { call_frames, reason: "other".to_string() }
    }

    fn snapshot_frame(&self, frame: &FrameRef) -> CallFrame {
        // Scope objects skip description generation to keep the traced
        // thread's stop cheap.
        let scope_opts = EncodeOptions::plain().without_description();
        let locals = ObjectValue::new("dict");
        for (name, value) in frame.locals() {
            locals.set_attr(name, value);
        }
        let local_scope = Scope {
            kind: "local".to_string(),
            object: self.registry.encode(&Value::Object(locals.share()), &scope_opts),
        };
        let globals = frame
            .globals()
            .cloned()
            .unwrap_or_else(|| ObjectValue::new("dict").share());
        let global_scope = Scope {
            kind: "global".to_string(),
            object: self.registry.encode(&Value::Object(globals), &scope_opts),
        };
        CallFrame {
            call_frame_id: frame.id().to_string(),
            function_name: frame.call_info().function,
            location: Location {
                script_id: frame.module().to_string(),
                line_number: line_to_wire(frame.line()),
            },
            scope_chain: vec![local_scope, global_scope],
        }
    }

    /// Evaluates `expression` in the paused frame identified by
    /// `frame_id`. A failure becomes an encoded message with `wasThrown`
    /// set; it never escapes into the caller.
    pub fn evaluate_on_frame(
        &self,
        frame_id: &str,
        expression: &str,
        group: Option<&str>,
        preview: bool,
    ) -> EvaluateResult {
        let mut cursor = self.tracer.paused_frame();
        let frame = loop {
            match cursor {
                Some(f) if f.id().to_string() == frame_id => break Some(f),
                Some(f) => cursor = f.parent().cloned(),
                None => break None,
            }
        };
        let outcome = match frame {
            Some(frame) => eval::evaluate(&frame, expression),
            None => Err(eval::EvalError::UnknownFrame),
        };
        let opts = EncodeOptions::plain().with_preview(preview).with_group(group);
        match outcome {
            Ok(value) => {
                EvaluateResult { result: self.registry.encode(&value, &opts), was_thrown: None }
            }
            Err(err) => EvaluateResult {
                result: self
                    .registry
                    .encode(&Value::Str(err.to_string()), &opts),
                was_thrown: Some(true),
            },
        }
    }

    /// Records the embedding frame and arms a stop at the next line: the
    /// canonical breakpoint-in-source idiom.
    pub fn set_trace(&self, frame: &FrameRef) {
        self.tracer.attach();
        self.tracer.set_base_frame(frame.parent().cloned());
        self.tracer.pause_on_next();
        set_current_frame(Some(frame.clone()));
    }
}

static AGENT: Mutex<Option<Arc<Agent>>> = Mutex::new(None);
static SERVER_STARTED: std::sync::atomic::AtomicBool =
    std::sync::atomic::AtomicBool::new(false);

/// Installs (or returns) the process-wide agent and attaches its tracer.
pub fn attach() -> Arc<Agent> {
    attach_with(AgentConfig::default())
}

/// [`attach`] with an explicit configuration. The configuration is ignored
/// when an agent is already installed.
pub fn attach_with(config: AgentConfig) -> Arc<Agent> {
    let mut slot = lock(&AGENT);
    if let Some(agent) = &*slot {
        agent.tracer().attach();
        return agent.clone();
    }
    let agent = Arc::new(Agent::new(config));
    agent.tracer().attach();
    *slot = Some(agent.clone());
    agent
}

/// Uninstalls the process-wide agent. A thread blocked in a pause is
/// released so the program can run to completion; every later entry point
/// is a no-op.
pub fn detach() {
    if let Some(agent) = lock(&AGENT).take() {
        agent.tracer().detach();
    }
}

/// The installed agent, if any.
pub fn agent() -> Option<Arc<Agent>> {
    lock(&AGENT).clone()
}

/// Attaches the agent and starts the `ChromeDebug` transport worker.
pub fn start() -> io::Result<Arc<Agent>> {
    let agent = attach();
    if !SERVER_STARTED.swap(true, std::sync::atomic::Ordering::AcqRel) {
        if let Err(err) = server::spawn(agent.clone()) {
            SERVER_STARTED.store(false, std::sync::atomic::Ordering::Release);
            return Err(err);
        }
    }
    Ok(agent)
}

/// Attaches the agent, marks `frame`'s caller as the embedding boundary
/// and pauses at the next executable line.
pub fn set_trace(frame: &FrameRef) {
    attach().set_trace(frame);
}

/// Keeps tracing attached for the lifetime of the guard.
#[derive(Debug)]
pub struct TraceGuard(());

impl Drop for TraceGuard {
    fn drop(&mut self) {
        detach();
    }
}

/// Attaches the agent for the duration of a scope.
pub fn trace_scope() -> TraceGuard {
    attach();
    TraceGuard(())
}
