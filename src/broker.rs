//! Process-wide registry of connected sessions and fan-out helpers.
//!
//! Fan-out is best-effort: a session that fails to take an event (its
//! connection is tearing down, its queue is gone) is skipped without
//! disturbing the other sessions or the traced program.

use std::sync::{Arc, Mutex};

use crate::protocol::{ConsoleMessage, PausedEvent};
use crate::session::Session;
use crate::sync::lock;

/// The session registry.
#[derive(Debug, Default)]
pub struct Broker {
    sessions: Mutex<Vec<Arc<Session>>>,
}

impl Broker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session to the fan-out list.
    pub fn register(&self, session: Arc<Session>) {
        lock(&self.sessions).push(session);
    }

    /// Removes a session from the fan-out list.
    pub fn unregister(&self, session: &Arc<Session>) {
        lock(&self.sessions).retain(|s| !Arc::ptr_eq(s, session));
    }

    /// Number of attached sessions.
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    fn each(&self, mut f: impl FnMut(&Session)) {
        let sessions = lock(&self.sessions).clone();
        for session in &sessions {
            f(session);
        }
    }

    /// Queues a console message on every session.
    pub fn console_log(&self, message: &ConsoleMessage) {
        self.each(|s| s.on_console(message));
    }

    /// Publishes `Debugger.paused` to every enabled session.
    pub fn debugger_paused(&self, event: &PausedEvent) {
        self.each(|s| s.on_paused(event));
    }

    /// Publishes `Debugger.resumed` to every enabled session.
    pub fn debugger_resumed(&self) {
        self.each(Session::on_resumed);
    }

    /// Publishes `Debugger.scriptParsed` to every enabled session.
    pub fn debugger_script_parsed(&self, name: &str) {
        self.each(|s| s.on_script_parsed(name));
    }

    /// Publishes `Timeline.eventRecorded` to sessions that opted in.
    pub fn timeline_log(&self, record: &serde_json::Value) {
        self.each(|s| s.on_timeline(record));
    }
}
