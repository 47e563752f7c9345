//! Console helpers: severity-tagged log entry points for the traced
//! program.
//!
//! Each call captures the caller's traced stack and fans a
//! `Console.messageAdded` out to every session; sessions with a disabled
//! console buffer the message until enabled. With no agent installed the
//! helpers are no-ops.

use crate::agent;
use crate::inspector::value::Value;
use crate::inspector::EncodeOptions;
use crate::protocol::{line_to_wire, ConsoleMessage, StackEntry};
use crate::tracing::current_frame;

/// Logs at `debug` level.
pub fn debug(args: &[Value]) {
    emit("debug", args);
}

/// Logs at `log` level.
pub fn log(args: &[Value]) {
    emit("log", args);
}

/// Logs at `warning` level.
pub fn warn(args: &[Value]) {
    emit("warning", args);
}

/// Logs at `error` level.
pub fn error(args: &[Value]) {
    emit("error", args);
}

fn emit(level: &str, args: &[Value]) {
    let Some(agent) = agent::agent() else { return };
    let opts = EncodeOptions::plain();
    let parameters = args.iter().map(|v| agent.registry().encode(v, &opts)).collect();
    let message = ConsoleMessage {
        level: level.to_string(),
        kind: "log".to_string(),
        parameters,
        stack_trace: capture_stack(),
    };
    agent.broker().console_log(&message);
}

/// Walks the calling thread's traced frames into wire stack entries.
fn capture_stack() -> Vec<StackEntry> {
    let mut entries = Vec::new();
    let mut cursor = current_frame();
    while let Some(frame) = cursor {
        entries.push(StackEntry {
            function_name: frame.call_info().function,
            url: frame.module().to_string(),
            line_number: line_to_wire(frame.line()),
            column_number: 0,
        });
        cursor = frame.parent().cloned();
    }
    entries
}
