//! Profile recording driven over the wire.

use std::thread;
use std::time::Duration;

use crate::utils::TestClient;
use chromedebug::{TraceFrame, Value};
use serde_json::json;

#[test]
fn record_and_fetch_a_profile() {
    let mut client = TestClient::new();

    client.request("Profiler.start", json!({}));
    let recording = client.next_event("Profiler.setRecordingProfile");
    assert_eq!(recording["params"]["isProfiling"], true);

    // f() calls g() twice.
    let f = TraceFrame::new("f", "app", 1).share();
    client.agent.trace_call(&f);
    for _ in 0..2 {
        let g = TraceFrame::new("g", "app", 10).with_parent(f.clone()).share();
        client.agent.trace_call(&g);
        thread::sleep(Duration::from_millis(2));
        client.agent.trace_return(&g);
    }
    client.agent.trace_return(&f);

    client.request("Profiler.stop", json!({}));
    let header = client.next_event("Profiler.addProfileHeader");
    assert_eq!(header["params"]["header"]["typeId"], "CPU");
    assert_eq!(header["params"]["header"]["title"], "Profile 1");
    let uid = header["params"]["header"]["uid"].as_u64().unwrap();
    let stopped = client.next_event("Profiler.setRecordingProfile");
    assert_eq!(stopped["params"]["isProfiling"], false);

    let response = client.request("Profiler.getCPUProfile", json!({ "uid": uid }));
    let head = &response["result"]["profile"]["head"];
    assert_eq!(head["functionName"], "(root)");
    assert_eq!(head["id"], 1);

    let f_node = &head["children"][0];
    assert_eq!(f_node["functionName"], "f");
    assert_eq!(f_node["numberOfCalls"], 1);
    assert_eq!(f_node["visible"], true);

    let g_node = &f_node["children"][0];
    assert_eq!(g_node["functionName"], "g");
    assert_eq!(g_node["numberOfCalls"], 2);
    assert_eq!(g_node["lineNumber"], 9, "wire lines are 0-based");
    assert!(g_node["totalTime"].as_f64().unwrap() > 0.0);
    assert!(
        g_node["selfTime"].as_f64().unwrap() <= g_node["totalTime"].as_f64().unwrap()
    );
    assert!(
        f_node["totalTime"].as_f64().unwrap()
            >= g_node["totalTime"].as_f64().unwrap()
    );

    let samples = response["result"]["profile"]["samples"].as_array().unwrap();
    assert_eq!(samples.len(), 3, "one sample per call event");
}

#[test]
fn headers_list_finished_profiles_only() {
    let mut client = TestClient::new();

    client.request("Profiler.start", json!({}));
    client.request("Profiler.stop", json!({}));
    client.request("Profiler.start", json!({}));
    client.drain_events();

    let response = client.request("Profiler.getProfileHeaders", json!({}));
    let headers = response["result"]["headers"].as_array().unwrap();
    assert_eq!(headers.len(), 1, "the in-flight profile is excluded");
    assert_eq!(headers[0]["uid"], 1);

    client.request("Profiler.stop", json!({}));
    client.drain_events();
    let response = client.request("Profiler.getProfileHeaders", json!({}));
    assert_eq!(response["result"]["headers"].as_array().unwrap().len(), 2);
}

#[test]
fn unknown_uid_yields_a_null_profile() {
    let mut client = TestClient::new();
    let response = client.request("Profiler.getCPUProfile", json!({ "uid": 404 }));
    assert!(response["result"]["profile"].is_null());
}

#[test]
fn qualified_names_reach_the_profile() {
    let mut client = TestClient::new();
    client.request("Profiler.start", json!({}));
    client.drain_events();

    let receiver = chromedebug::ObjectValue::new("Worker").share();
    let frame = TraceFrame::new("run", "app", 7).share();
    frame.set_local("self", Value::Object(receiver));
    client.agent.trace_call(&frame);
    client.agent.trace_return(&frame);

    client.request("Profiler.stop", json!({}));
    let uid = 1;
    let response = client.request("Profiler.getCPUProfile", json!({ "uid": uid }));
    assert_eq!(
        response["result"]["profile"]["head"]["children"][0]["functionName"],
        "Worker.run"
    );
}
