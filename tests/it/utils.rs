use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use chromedebug::session::Session;
use chromedebug::{Agent, AgentConfig};
use serde_json::{json, Value as Json};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// An agent with one registered session whose outbound frames land in a
/// channel: the transport-free test double for a connected client.
pub struct TestClient {
    pub agent: Arc<Agent>,
    pub session: Arc<Session>,
    events: mpsc::Receiver<String>,
    next_id: u64,
}

impl TestClient {
    pub fn new() -> Self {
        let agent = Arc::new(Agent::new(AgentConfig::default()));
        agent.tracer().attach();
        Self::with_agent(agent)
    }

    /// A second client attached to an existing agent.
    pub fn with_agent(agent: Arc<Agent>) -> Self {
        let (tx, rx) = mpsc::channel();
        let session = Arc::new(Session::new(tx));
        agent.broker().register(session.clone());
        Self { agent, session, events: rx, next_id: 0 }
    }

    /// Sends a request and returns the decoded response.
    pub fn request(&mut self, method: &str, params: Json) -> Json {
        self.next_id += 1;
        let frame =
            json!({ "id": self.next_id, "method": method, "params": params }).to_string();
        let response = self
            .session
            .handle_message(&self.agent, &frame)
            .expect("request must produce a response frame");
        serde_json::from_str(&response).expect("response must be valid JSON")
    }

    /// Waits for the next event named `method`, skipping others.
    pub fn next_event(&self, method: &str) -> Json {
        let deadline = Instant::now() + EVENT_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .unwrap_or_else(|| panic!("timed out waiting for {method}"));
            let raw = self
                .events
                .recv_timeout(remaining)
                .unwrap_or_else(|_| panic!("timed out waiting for {method}"));
            let event: Json = serde_json::from_str(&raw).expect("event must be valid JSON");
            if event["method"] == method {
                return event;
            }
        }
    }

    /// The next queued event without waiting, if any.
    pub fn try_event(&self) -> Option<Json> {
        let raw = self.events.try_recv().ok()?;
        Some(serde_json::from_str(&raw).expect("event must be valid JSON"))
    }

    /// Discards everything currently queued.
    pub fn drain_events(&self) {
        while self.events.try_recv().is_ok() {}
    }
}
