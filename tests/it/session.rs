//! Dispatch-table behavior: errors, stubs, shims and console buffering.

use crate::utils::TestClient;
use chromedebug::protocol::ConsoleMessage;
use chromedebug::{ArrayValue, ObjectValue, Value};
use serde_json::json;

#[test]
fn unknown_methods_return_a_structured_error() {
    let mut client = TestClient::new();
    let response = client.request("Network.enable", json!({}));
    assert_eq!(response["error"]["message"], "Network.enable not supported");
    assert_eq!(response["error"]["data"], json!({}));
    assert!(response.get("result").is_none());

    // The session keeps answering afterwards.
    let response = client.request("Debugger.canSetScriptSource", json!({}));
    assert_eq!(response["result"], false, "script sources are never editable");
}

#[test]
fn page_enable_is_politely_stubbed() {
    let mut client = TestClient::new();
    let response = client.request("Page.enable", json!({}));
    assert_eq!(response["error"], json!({}));
}

#[test]
fn malformed_json_is_silently_dropped() {
    let client = TestClient::new();
    assert!(client.session.handle_message(&client.agent, "{nope").is_none());
    assert!(client.session.handle_message(&client.agent, r#"{"method":"x"}"#).is_none());
}

#[test]
fn responses_without_payload_carry_only_the_id() {
    let mut client = TestClient::new();
    let response = client.request("Console.disable", json!({}));
    assert_eq!(response, json!({ "id": 1 }));
}

#[test]
fn console_messages_buffer_until_enable() {
    let mut client = TestClient::new();
    let agent = client.agent.clone();
    let message = move |text: &str| ConsoleMessage {
        level: "log".to_string(),
        kind: "log".to_string(),
        parameters: vec![agent.registry().encode(&Value::Str(text.into()), &Default::default())],
        stack_trace: Vec::new(),
    };

    client.agent.broker().console_log(&message("first"));
    client.agent.broker().console_log(&message("second"));
    assert!(client.try_event().is_none(), "disabled console emits nothing");

    client.request("Console.enable", json!({}));
    let first = client.next_event("Console.messageAdded");
    assert_eq!(first["params"]["message"]["parameters"][0]["value"], "first");
    let second = client.next_event("Console.messageAdded");
    assert_eq!(second["params"]["message"]["parameters"][0]["value"], "second");

    // Enabled sessions deliver immediately.
    client.agent.broker().console_log(&message("third"));
    let third = client.next_event("Console.messageAdded");
    assert_eq!(third["params"]["message"]["parameters"][0]["value"], "third");

    client.request("Console.disable", json!({}));
    client.agent.broker().console_log(&message("fourth"));
    assert!(client.try_event().is_none());
}

#[test]
fn release_object_group_over_the_wire() {
    let mut client = TestClient::new();
    let o = Value::Object(ObjectValue::new("dict").with_attr("k", Value::Int(1)).share());
    let id = client.agent.registry().save(&o, Some("grp")).unwrap();

    let props = client.request("Runtime.getProperties", json!({ "objectId": id }));
    assert_eq!(props["result"]["result"].as_array().unwrap().len(), 1);

    client.request("Runtime.releaseObjectGroup", json!({ "objectGroup": "grp" }));
    let props = client.request("Runtime.getProperties", json!({ "objectId": id }));
    assert!(
        props["result"]["result"].as_array().unwrap().is_empty(),
        "a released strong id resolves to nothing"
    );

    // Releasing an unknown group is a silent no-op.
    let response =
        client.request("Runtime.releaseObjectGroup", json!({ "objectGroup": "ghost" }));
    assert!(response.get("error").is_none());
}

#[test]
fn get_properties_on_an_unknown_id_is_empty() {
    let mut client = TestClient::new();
    let response =
        client.request("Runtime.getProperties", json!({ "objectId": "123456" }));
    assert_eq!(response["result"]["result"], json!([]));
}

#[test]
fn call_function_on_get_completions() {
    let mut client = TestClient::new();
    let target = Value::Object(
        ObjectValue::new("Config")
            .with_attr("host", Value::Str("localhost".into()))
            .with_attr("port", Value::Int(9222))
            .share(),
    );
    let id = client.agent.registry().save(&target, None).unwrap();

    let response = client.request(
        "Runtime.callFunctionOn",
        json!({
            "objectId": id,
            "functionDeclaration": "function getCompletions(primitiveType) { return {}; }",
        }),
    );
    let completions = &response["result"]["result"]["value"];
    assert_eq!(completions["host"], true);
    assert_eq!(completions["port"], true);
}

#[test]
fn call_function_on_remote_function_walks_a_path() {
    let mut client = TestClient::new();
    let inner = ObjectValue::new("dict").with_attr("port", Value::Int(9222)).share();
    let target = Value::Object(
        ObjectValue::new("dict").with_attr("net", Value::Object(inner)).share(),
    );
    let id = client.agent.registry().save(&target, None).unwrap();

    let response = client.request(
        "Runtime.callFunctionOn",
        json!({
            "objectId": id,
            "functionDeclaration": "function remoteFunction(arrayStr) { return; }",
            "arguments": [ { "value": "[\"net\", \"port\"]" } ],
        }),
    );
    assert_eq!(response["result"]["result"]["value"], 9222);

    // A broken path stops at the last reachable value.
    let response = client.request(
        "Runtime.callFunctionOn",
        json!({
            "objectId": id,
            "functionDeclaration": "function remoteFunction(arrayStr) { return; }",
            "arguments": [ { "value": "[\"net\", \"missing\", \"deeper\"]" } ],
        }),
    );
    assert_eq!(response["result"]["result"]["value"]["port"], 9222);
}

#[test]
fn call_function_on_rejects_other_bodies() {
    let mut client = TestClient::new();
    let target = Value::Array(ArrayValue::new(vec![]).share());
    let id = client.agent.registry().save(&target, None).unwrap();
    let response = client.request(
        "Runtime.callFunctionOn",
        json!({
            "objectId": id,
            "functionDeclaration": "function somethingElse() {}",
        }),
    );
    assert_eq!(
        response["error"]["message"],
        "Runtime.callFunctionOn not supported"
    );
    assert_eq!(response["error"]["data"], json!({}));
}

#[test]
fn function_details_over_the_wire() {
    let mut client = TestClient::new();
    let func = Value::Function(
        chromedebug::FunctionValue::new("handler", "app", 13).share(),
    );
    let id = client.agent.registry().save(&func, None).unwrap();

    let response =
        client.request("Debugger.getFunctionDetails", json!({ "functionId": id }));
    assert_eq!(response["result"]["details"]["name"], "handler");
    assert_eq!(response["result"]["details"]["location"]["lineNumber"], 12);

    let missing =
        client.request("Debugger.getFunctionDetails", json!({ "functionId": "0" }));
    assert!(missing["result"]["details"].is_null());
}
