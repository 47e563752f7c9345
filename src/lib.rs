//! An embeddable Chrome DevTools remote debugging agent.
//!
//! The agent exposes a running program to a graphical debugger client over
//! the Chrome DevTools remote debugging protocol (JSON-RPC over WebSocket).
//! A host runtime drives the agent with `call`/`line`/`return` trace events
//! against [`TraceFrame`] records; connected clients can then list loaded
//! scripts, set breakpoints, pause and step execution, inspect stack frames
//! and object graphs, record CPU profiles and display console messages.
//!
//! # Embedding
//!
//! ```no_run
//! use chromedebug::{TraceFrame, Value};
//!
//! // Attach the tracer and start the transport worker on :9222.
//! let agent = chromedebug::start().expect("endpoint");
//!
//! // The host runtime reports trace events per activation record.
//! let frame = TraceFrame::new("main", "app", 1).share();
//! agent.trace_call(&frame);
//! agent.trace_line(&frame, 2);
//! frame.set_local("answer", Value::Int(42));
//! agent.trace_return(&frame);
//! ```
//!
//! Clients connect via `chrome://devtools/devtools.html?ws=<host>:9222`.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]

/// The agent value and the process-wide embedding surface.
pub mod agent;

/// Session registry and event fan-out.
pub mod broker;

/// Severity-tagged console logging for the traced program.
pub mod console;

/// Value registry, `RemoteObject` encoding and property extraction.
pub mod inspector;

/// Deterministic CPU profiling.
pub mod profiler;

/// Wire types of the protocol.
pub mod protocol;

/// Per-client protocol dispatch.
pub mod session;

/// Execution tracing: breakpoints, stepping and the pause rendezvous.
pub mod tracing;

mod server;
mod sync;

pub use agent::{
    agent, attach, attach_with, detach, set_trace, start, trace_scope, Agent,
    AgentConfig, TraceGuard,
};
pub use inspector::value::{
    Accessor, ArrayValue, FunctionKind, FunctionValue, ObjectValue, TypeDescriptor,
    Value,
};
pub use tracing::frame::{CallInfo, FrameRef, TraceFrame};
pub use tracing::scripts::ScriptSource;
