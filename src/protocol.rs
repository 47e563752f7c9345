//! Wire types for the Chrome DevTools remote debugging dialect.
//!
//! Every message is a single JSON object in a WebSocket text frame. Requests
//! carry `{id, method, params}`, responses `{id, result?|error?}`, and
//! unsolicited events `{method, params}`. Line numbers are 0-based on the
//! wire and 1-based internally; the conversion is applied at this boundary
//! and nowhere else.

use serde::{Deserialize, Serialize};

/// A client request: one per incoming text frame.
#[derive(Clone, Debug, Deserialize)]
pub struct Request {
    /// Correlation id echoed back in the response.
    pub id: u64,
    /// Fully qualified method name, e.g. `Debugger.setBreakpointByUrl`.
    pub method: String,
    /// Method parameters; absent parameters decode as an empty map.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// The answer to a [`Request`]. Exactly one is sent per request; a response
/// with neither `result` nor `error` is legal and means "done, nothing to
/// report".
#[derive(Clone, Debug, Serialize)]
pub struct Response {
    /// Correlation id of the request being answered.
    pub id: u64,
    /// Successful payload, if the method produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure payload. `Page.enable` answers with an empty error object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

/// The `error` member of a [`Response`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct ErrorPayload {
    /// Human readable message, e.g. `"Foo.bar not supported"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured detail; always an empty object for unsupported methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorPayload {
    /// The payload used for methods missing from the dispatch table.
    pub fn unsupported(method: &str) -> Self {
        Self {
            message: Some(format!("{method} not supported")),
            data: Some(serde_json::Value::Object(Default::default())),
        }
    }
}

/// An unsolicited server-to-client event.
#[derive(Clone, Debug, Serialize)]
pub struct Event {
    /// Event name, e.g. `Debugger.paused`.
    pub method: String,
    /// Event payload.
    pub params: serde_json::Value,
}

impl Event {
    /// Builds an event and serializes it into a text frame.
    pub fn frame(method: &str, params: serde_json::Value) -> String {
        let event = Self { method: method.to_string(), params };
        // Serialization of these types cannot fail.
        serde_json::to_string(&event).unwrap_or_default()
    }
}

/// The wire encoding of a value: a literal for primitives, a reference via
/// `objectId` for aggregates and functions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// One of `boolean|number|string|function|object|undefined`.
    #[serde(rename = "type")]
    pub kind: String,
    /// `array` for collections, `null` for the null value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// The host-level class name of the value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Display string, at most 50 visible characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Literal value for primitives (and for by-value encodings).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Registry handle for aggregates and functions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Structured preview of the first entries, on request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<ObjectPreview>,
}

/// Abbreviated per-entry preview attached to a [`RemoteObject`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPreview {
    /// Mirrors the owning object's `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Mirrors the owning object's description.
    pub description: String,
    /// True when entries beyond the preview window exist.
    pub overflow: bool,
    /// The first entries, at most [`PREVIEW_ENTRIES`](crate::inspector).
    pub properties: Vec<PropertyPreview>,
}

/// One entry of an [`ObjectPreview`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPreview {
    /// Property name (index-as-string for collections).
    pub name: String,
    /// Wire type of the property value.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short display string for the property value.
    pub value: String,
}

/// A property of an inspected object, as returned by `Runtime.getProperties`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    /// Property name.
    pub name: String,
    /// Data property value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<RemoteObject>,
    /// Accessor getter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<RemoteObject>,
    /// Accessor setter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<RemoteObject>,
    /// Always reported for host members.
    pub enumerable: bool,
    /// False only for members inherited from the type.
    pub is_own: bool,
    /// The agent does not support writing from the client.
    pub writable: bool,
    /// Always false.
    pub configurable: bool,
    /// Always false; extraction never invokes getters.
    pub was_thrown: bool,
}

/// A source location in wire form (0-based line).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// The owning script (module name).
    pub script_id: String,
    /// 0-based line number.
    pub line_number: u32,
}

/// The result of `Debugger.setBreakpointByUrl`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointResult {
    /// `"<script>:<line>"`, usable with `Debugger.removeBreakpoint`.
    pub breakpoint_id: String,
    /// Echo of the resolved location.
    pub locations: Vec<Location>,
}

/// One scope of a paused frame's scope chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// `local` or `global`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The scope contents, encoded without a preview.
    pub object: RemoteObject,
}

/// Snapshot of one activation record, valid only while the pause lasts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Stable token derived from the live frame's identity.
    pub call_frame_id: String,
    /// Qualified function name.
    pub function_name: String,
    /// Current execution position.
    pub location: Location,
    /// Local scope first, then global.
    pub scope_chain: Vec<Scope>,
}

/// Payload of the `Debugger.paused` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedEvent {
    /// Innermost frame first.
    pub call_frames: Vec<CallFrame>,
    /// Why execution stopped; the agent always reports `other`.
    pub reason: String,
}

/// Payload of the `Debugger.scriptParsed` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedEvent {
    /// Module name; identical to `url`.
    pub script_id: String,
    /// Module name; identical to `script_id`.
    pub url: String,
    /// Always 0; the agent does not track extents.
    pub start_line: u32,
    /// Always 0.
    pub start_column: u32,
    /// Always 0.
    pub end_line: u32,
    /// Always 0.
    pub end_column: u32,
}

impl ScriptParsedEvent {
    /// Builds the event for a newly observed module.
    pub fn new(name: &str) -> Self {
        Self {
            script_id: name.to_string(),
            url: name.to_string(),
            start_line: 0,
            start_column: 0,
            end_line: 0,
            end_column: 0,
        }
    }
}

/// The result of `Debugger.evaluateOnCallFrame`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    /// The evaluated value, or the encoded failure when `wasThrown` is set.
    pub result: RemoteObject,
    /// Present and true when evaluation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_thrown: Option<bool>,
}

/// The result of `Debugger.getFunctionDetails`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDetails {
    /// Code-level name.
    pub name: String,
    /// Name as shown by the client; identical to `name`.
    pub display_name: String,
    /// Declaration site.
    pub location: Location,
}

/// Header identifying a recorded profile, as listed by
/// `Profiler.getProfileHeaders`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileHeader {
    /// Always `"CPU"`.
    pub type_id: String,
    /// Process-wide profile counter.
    pub uid: u64,
    /// Display title.
    pub title: String,
}

/// One node of a finalized CPU profile tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileNode {
    /// Qualified function name, suffixed `" (did not return)"` for calls
    /// still open at finalization.
    pub function_name: String,
    /// Declaring module.
    pub url: String,
    /// 0-based line of the call site.
    pub line_number: u32,
    /// Cumulative wall time in milliseconds across all call intervals.
    pub total_time: f64,
    /// `totalTime` minus the children's cumulative time.
    pub self_time: f64,
    /// Number of completed or open invocations.
    pub number_of_calls: u32,
    /// Always true.
    pub visible: bool,
    /// Stable identity of the call target, shared by nodes for the same
    /// function at different tree positions.
    #[serde(rename = "callUID")]
    pub call_uid: u64,
    /// Callee nodes.
    pub children: Vec<ProfileNode>,
    /// Per-profile node id; the root is 1.
    pub id: u32,
}

/// A finalized CPU profile, as returned by `Profiler.getCPUProfile`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuProfile {
    /// The synthetic `(root)` node.
    pub head: ProfileNode,
    /// Profile duration not attributable to any root child.
    pub idle_time: f64,
    /// Node ids in call order.
    pub samples: Vec<u32>,
}

/// One entry of a console message's captured stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackEntry {
    /// Qualified function name.
    pub function_name: String,
    /// Module of the frame.
    pub url: String,
    /// 0-based line.
    pub line_number: u32,
    /// Always 0; the tracer has no column information.
    pub column_number: u32,
}

/// Payload of `Console.messageAdded`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessage {
    /// `debug`, `log`, `warning` or `error`.
    pub level: String,
    /// Always `log`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The logged values, encoded.
    pub parameters: Vec<RemoteObject>,
    /// The caller's stack at the log site.
    pub stack_trace: Vec<StackEntry>,
}

/// Converts a 0-based wire line to the 1-based internal form.
pub const fn line_from_wire(wire: u32) -> u32 {
    wire + 1
}

/// Converts a 1-based internal line to the 0-based wire form.
pub const fn line_to_wire(internal: u32) -> u32 {
    internal.saturating_sub(1)
}
