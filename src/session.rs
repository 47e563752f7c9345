//! Per-client protocol session: the JSON-RPC method table, enable flags and
//! event delivery.
//!
//! A session answers every request with exactly one response and may emit
//! unsolicited events. Outbound traffic goes through a queue drained by the
//! owning connection thread, so fan-out from traced threads never touches a
//! socket directly.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Mutex};

use serde_json::json;

use crate::agent::Agent;
use crate::inspector::value::{ObjectValue, Value};
use crate::inspector::EncodeOptions;
use crate::protocol::{
    ConsoleMessage, ErrorPayload, Event, Request, Response, ScriptParsedEvent,
};
use crate::sync::lock;

/// Upper bound on console messages buffered while the console is disabled.
/// The oldest messages are dropped first.
const CONSOLE_BUFFER_LIMIT: usize = 1000;

type Params = serde_json::Map<String, serde_json::Value>;
type MethodResult = Result<Option<serde_json::Value>, ErrorPayload>;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One connected client.
#[derive(Debug)]
pub struct Session {
    id: u64,
    outgoing: mpsc::Sender<String>,
    console_enabled: AtomicBool,
    debugger_enabled: AtomicBool,
    profiling_enabled: AtomicBool,
    timeline_enabled: AtomicBool,
    console_buffer: Mutex<VecDeque<ConsoleMessage>>,
}

impl Session {
    /// Creates a session delivering outbound frames into `outgoing`.
    pub fn new(outgoing: mpsc::Sender<String>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            outgoing,
            console_enabled: AtomicBool::new(false),
            debugger_enabled: AtomicBool::new(false),
            profiling_enabled: AtomicBool::new(false),
            timeline_enabled: AtomicBool::new(false),
            console_buffer: Mutex::new(VecDeque::new()),
        }
    }

    /// Session identifier, for logging.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Host-side opt-in for `Timeline.eventRecorded` delivery.
    pub fn set_timeline_enabled(&self, enabled: bool) {
        self.timeline_enabled.store(enabled, Ordering::Release);
    }

    /// Queues a raw outbound frame. Delivery is best-effort: a torn-down
    /// connection drops the frame.
    pub(crate) fn send_raw(&self, text: String) {
        if self.outgoing.send(text).is_err() {
            log::trace!("session {}: dropped frame for closed connection", self.id);
        }
    }

    fn send_event(&self, method: &str, params: serde_json::Value) {
        self.send_raw(Event::frame(method, params));
    }

    /// Handles one incoming text frame. Returns the response frame, or
    /// `None` for malformed JSON, which is silently dropped.
    pub fn handle_message(&self, agent: &Agent, raw: &str) -> Option<String> {
        let request: Request = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(err) => {
                log::trace!("session {}: dropping malformed frame: {err}", self.id);
                return None;
            }
        };
        let (result, error) = match self.dispatch(agent, &request.method, &request.params)
        {
            Ok(result) => (result, None),
            Err(error) => (None, Some(error)),
        };
        let response = Response { id: request.id, result, error };
        serde_json::to_string(&response).ok()
    }

    fn dispatch(&self, agent: &Agent, method: &str, params: &Params) -> MethodResult {
        match method {
            "Console.enable" => {
                self.console_enabled.store(true, Ordering::Release);
                self.flush_console();
                Ok(None)
            }
            "Console.disable" => {
                self.console_enabled.store(false, Ordering::Release);
                Ok(None)
            }
            "Debugger.enable" => {
                self.debugger_enabled.store(true, Ordering::Release);
                for name in agent.scripts().names() {
                    self.on_script_parsed(&name);
                }
                if let Some(event) = agent.tracer().paused_event() {
                    self.on_paused(&event);
                }
                Ok(None)
            }
            "Debugger.disable" => {
                self.debugger_enabled.store(false, Ordering::Release);
                Ok(None)
            }
            "Debugger.canSetScriptSource" => Ok(Some(serde_json::Value::Bool(false))),
            "Debugger.getScriptSource" => {
                let script_id = str_param(params, "scriptId").unwrap_or_default();
                let source = agent.scripts().source(script_id);
                Ok(Some(json!({ "scriptSource": source })))
            }
            "Debugger.setBreakpointByUrl" => {
                let url = str_param(params, "url").unwrap_or_default();
                let line = u64_param(params, "lineNumber").unwrap_or_default() as u32;
                let result = agent.tracer().set_break(url, line);
                Ok(Some(serde_json::to_value(result).unwrap_or_default()))
            }
            "Debugger.removeBreakpoint" => {
                if let Some(id) = str_param(params, "breakpointId") {
                    agent.tracer().clear_break(id);
                }
                Ok(None)
            }
            "Debugger.setBreakpointsActive" => {
                let active = bool_param(params, "active").unwrap_or(true);
                agent.tracer().set_breakpoints_active(active);
                Ok(None)
            }
            "Debugger.continueToLocation" => {
                let location = params.get("location").and_then(|l| l.as_object());
                let script = location
                    .and_then(|l| l.get("scriptId"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let line = location
                    .and_then(|l| l.get("lineNumber"))
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or_default() as u32;
                if agent.tracer().continue_to(script, line) {
                    agent.broker().debugger_resumed();
                }
                Ok(None)
            }
            "Debugger.pause" => {
                agent.tracer().pause_on_next();
                Ok(None)
            }
            "Debugger.resume" => {
                if agent.tracer().resume() {
                    agent.broker().debugger_resumed();
                }
                Ok(None)
            }
            "Debugger.stepInto" => {
                if agent.tracer().step_into() {
                    agent.broker().debugger_resumed();
                }
                Ok(None)
            }
            "Debugger.stepOver" => {
                if agent.tracer().step_over() {
                    agent.broker().debugger_resumed();
                }
                Ok(None)
            }
            "Debugger.stepOut" => {
                if agent.tracer().step_out() {
                    agent.broker().debugger_resumed();
                }
                Ok(None)
            }
            "Debugger.evaluateOnCallFrame" => {
                let frame_id = str_param(params, "callFrameId").unwrap_or_default();
                let expression = str_param(params, "expression").unwrap_or_default();
                let group = str_param(params, "objectGroup");
                let preview = bool_param(params, "generatePreview").unwrap_or(false);
                let result = agent.evaluate_on_frame(frame_id, expression, group, preview);
                Ok(Some(serde_json::to_value(result).unwrap_or_default()))
            }
            "Debugger.getFunctionDetails" => {
                let details = str_param(params, "functionId")
                    .and_then(|id| agent.registry().function_details(id));
                Ok(Some(json!({ "details": details })))
            }
            "Debugger.setOverlayMessage" => {
                if let Some(message) = str_param(params, "message") {
                    let _ = writeln!(std::io::stderr(), "« {message} »");
                }
                Ok(None)
            }
            "Page.enable" => Err(ErrorPayload::default()),
            "Profiler.start" => {
                agent.profiles().start(None);
                self.profiling_enabled.store(true, Ordering::Release);
                self.send_event("Profiler.setRecordingProfile", json!({ "isProfiling": true }));
                Ok(None)
            }
            "Profiler.stop" => {
                if let Some(header) = agent.profiles().stop() {
                    self.send_event("Profiler.addProfileHeader", json!({ "header": header }));
                }
                self.send_event("Profiler.setRecordingProfile", json!({ "isProfiling": false }));
                self.profiling_enabled.store(false, Ordering::Release);
                Ok(None)
            }
            "Profiler.getProfileHeaders" => {
                Ok(Some(json!({ "headers": agent.profiles().headers() })))
            }
            "Profiler.getCPUProfile" => {
                let profile =
                    u64_param(params, "uid").and_then(|uid| agent.profiles().profile(uid));
                Ok(Some(json!({ "profile": profile })))
            }
            "Runtime.getProperties" => {
                let accessors =
                    bool_param(params, "accessorPropertiesOnly").unwrap_or(false);
                let value =
                    str_param(params, "objectId").and_then(|id| agent.registry().get(id));
                let properties = match value {
                    Some(value) => agent.registry().properties(&value, accessors),
                    None => Vec::new(),
                };
                Ok(Some(json!({ "result": properties })))
            }
            "Runtime.releaseObjectGroup" => {
                if let Some(group) = str_param(params, "objectGroup") {
                    agent.registry().release_group(group);
                }
                Ok(None)
            }
            "Runtime.callFunctionOn" => self.call_function_on(agent, method, params),
            other => Err(ErrorPayload::unsupported(other)),
        }
    }

    /// The two client-side function bodies the agent recognizes. Anything
    /// else is reported as unsupported.
    fn call_function_on(&self, agent: &Agent, method: &str, params: &Params) -> MethodResult {
        let target = str_param(params, "objectId")
            .and_then(|id| agent.registry().get(id))
            .unwrap_or(Value::Undefined);
        let body = str_param(params, "functionDeclaration").unwrap_or_default();

        if body.starts_with("function getCompletions(primitiveType)") {
            let completions = ObjectValue::new("dict");
            for descriptor in agent.registry().properties(&target, false) {
                if !descriptor.is_own {
                    continue;
                }
                completions.set_attr(descriptor.name, Value::Bool(true));
            }
            let encoded = agent.registry().encode(
                &Value::Object(completions.share()),
                &EncodeOptions::plain().by_value(),
            );
            return Ok(Some(json!({ "result": encoded })));
        }

        if body.starts_with("function remoteFunction(arrayStr)") {
            let path: Vec<String> = params
                .get("arguments")
                .and_then(|a| a.as_array())
                .and_then(|a| a.first())
                .and_then(|a| a.get("value"))
                .and_then(|v| v.as_str())
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default();
            let mut value = target;
            for name in &path {
                // Walk as far as the path resolves; stop at the first miss.
                let next = match &value {
                    Value::Object(o) => o.attr(name),
                    _ => None,
                };
                match next {
                    Some(v) => value = v,
                    None => break,
                }
            }
            let encoded =
                agent.registry().encode(&value, &EncodeOptions::plain().by_value());
            return Ok(Some(json!({ "result": encoded })));
        }

        Err(ErrorPayload::unsupported(method))
    }

    /// Buffers a console message, delivering immediately when enabled.
    pub(crate) fn on_console(&self, message: &ConsoleMessage) {
        {
            let mut buffer = lock(&self.console_buffer);
            if buffer.len() >= CONSOLE_BUFFER_LIMIT {
                buffer.pop_front();
            }
            buffer.push_back(message.clone());
        }
        if self.console_enabled.load(Ordering::Acquire) {
            self.flush_console();
        }
    }

    fn flush_console(&self) {
        let drained: Vec<ConsoleMessage> =
            lock(&self.console_buffer).drain(..).collect();
        for message in drained {
            self.send_event("Console.messageAdded", json!({ "message": message }));
        }
    }

    /// Delivers `Debugger.paused` when the debugger domain is enabled.
    pub(crate) fn on_paused(&self, event: &crate::protocol::PausedEvent) {
        if self.debugger_enabled.load(Ordering::Acquire) {
            self.send_event(
                "Debugger.paused",
                serde_json::to_value(event).unwrap_or_default(),
            );
        }
    }

    /// Delivers `Debugger.resumed` when the debugger domain is enabled.
    pub(crate) fn on_resumed(&self) {
        if self.debugger_enabled.load(Ordering::Acquire) {
            self.send_event("Debugger.resumed", json!({}));
        }
    }

    /// Delivers `Debugger.scriptParsed` when the debugger domain is
    /// enabled.
    pub(crate) fn on_script_parsed(&self, name: &str) {
        if self.debugger_enabled.load(Ordering::Acquire) {
            self.send_event(
                "Debugger.scriptParsed",
                serde_json::to_value(ScriptParsedEvent::new(name)).unwrap_or_default(),
            );
        }
    }

    /// Delivers `Timeline.eventRecorded` to opted-in sessions.
    pub(crate) fn on_timeline(&self, record: &serde_json::Value) {
        if self.timeline_enabled.load(Ordering::Acquire) {
            self.send_event("Timeline.eventRecorded", json!({ "record": record }));
        }
    }
}

fn str_param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn u64_param(params: &Params, key: &str) -> Option<u64> {
    params.get(key).and_then(serde_json::Value::as_u64)
}

fn bool_param(params: &Params, key: &str) -> Option<bool> {
    params.get(key).and_then(serde_json::Value::as_bool)
}
