//! End-to-end dispatcher tests
//!
//! Every scenario goes through `Dispatcher::handle`, the same entry point
//! both transports use, so what passes here holds on stdio and HTTP alike.
//!
//! Run with: cargo test --test dispatch_tests

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use toolhost::config::{OverflowPolicy, ServerConfig};
use toolhost::dispatch::Dispatcher;
use toolhost::error::HostError;
use toolhost::filter::FilterPolicy;
use toolhost::protocol::{methods, McpRequest};
use toolhost::registry::{ToolRegistry, ToolSpec};

fn math_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(ToolSpec {
            name: "add".to_string(),
            description: "Add two numbers".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "a": {"type": "number"},
                    "b": {"type": "number"}
                },
                "required": ["a", "b"]
            }),
            domain: Some("math".to_string()),
            category: Some("arithmetic".to_string()),
            handler: Arc::new(|args| {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(json!(a + b))
            }),
        })
        .unwrap();
    registry
        .register(ToolSpec {
            name: "subtract".to_string(),
            description: "Subtract b from a".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "a": {"type": "number"},
                    "b": {"type": "number"}
                },
                "required": ["a", "b"]
            }),
            domain: Some("math".to_string()),
            category: Some("arithmetic".to_string()),
            handler: Arc::new(|args| {
                let a = args["a"].as_f64().unwrap_or(0.0);
                let b = args["b"].as_f64().unwrap_or(0.0);
                Ok(json!(a - b))
            }),
        })
        .unwrap();
    registry.seal();
    registry
}

/// Registry with one handler that sleeps for the given duration
fn slow_registry(sleep: Duration) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(ToolSpec {
            name: "slow".to_string(),
            description: "Sleeps, then answers".to_string(),
            schema: json!({"type": "object", "properties": {}}),
            domain: None,
            category: None,
            handler: Arc::new(move |_| {
                std::thread::sleep(sleep);
                Ok(json!("done"))
            }),
        })
        .unwrap();
    registry.seal();
    registry
}

fn call(name: &str, arguments: Value, id: i64) -> McpRequest {
    McpRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(json!(id)),
        method: methods::CALL_TOOL.to_string(),
        params: json!({"name": name, "arguments": arguments}),
    }
}

fn list_request() -> McpRequest {
    McpRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(json!(1)),
        method: methods::LIST_TOOLS.to_string(),
        params: json!({}),
    }
}

/// Unwrap the tool result text content back into JSON
fn tool_result(response: &toolhost::protocol::McpResponse) -> Value {
    let text = response.result.as_ref().unwrap()["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string();
    serde_json::from_str(&text).unwrap()
}

fn listed_names(response: &toolhost::protocol::McpResponse) -> Vec<String> {
    response.result.as_ref().unwrap()["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn add_scenario_success_invalid_and_unknown() {
    let registry = math_registry();
    let dispatcher = Dispatcher::new(&registry, &ServerConfig::default()).unwrap();

    // call with {a:2, b:3} succeeds and reflects 5
    let ok = dispatcher.handle(call("add", json!({"a": 2, "b": 3}), 1)).await.unwrap();
    assert_eq!(ok.id, Some(json!(1)));
    assert_eq!(tool_result(&ok), json!(5.0));

    // call with a string where a number is declared names the field
    let invalid = dispatcher
        .handle(call("add", json!({"a": "x", "b": 3}), 2))
        .await
        .unwrap();
    let error = invalid.error.unwrap();
    assert_eq!(error.code, -32602);
    assert!(error.message.contains("\"a\""), "message: {}", error.message);
    assert!(error.message.contains("expected number, got string"));

    // unregistered tool is method-not-found
    let unknown = dispatcher
        .handle(call("multiply", json!({"a": 2, "b": 3}), 3))
        .await
        .unwrap();
    assert_eq!(unknown.error.unwrap().code, -32601);
    assert_eq!(unknown.id, Some(json!(3)));
}

#[tokio::test]
async fn allowlist_scenario_lists_only_member() {
    let registry = math_registry();
    let config = ServerConfig {
        filter: FilterPolicy {
            function_allowlist: Some(vec!["add".to_string()]),
            ..Default::default()
        },
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(&registry, &config).unwrap();

    let response = dispatcher.handle(list_request()).await.unwrap();
    assert_eq!(listed_names(&response), vec!["add".to_string()]);
}

#[tokio::test]
async fn filtered_out_and_unregistered_are_indistinguishable() {
    let registry = math_registry();
    let config = ServerConfig {
        filter: FilterPolicy {
            function_allowlist: Some(vec!["add".to_string()]),
            ..Default::default()
        },
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(&registry, &config).unwrap();

    // subtract is registered but filtered out; multiply never existed
    let filtered = dispatcher
        .handle(call("subtract", json!({"a": 1, "b": 1}), 1))
        .await
        .unwrap();
    let unregistered = dispatcher
        .handle(call("multiply", json!({"a": 1, "b": 1}), 2))
        .await
        .unwrap();

    assert_eq!(filtered.error.unwrap().code, -32601);
    assert_eq!(unregistered.error.unwrap().code, -32601);
}

#[tokio::test]
async fn denylist_wins_over_allowlist_in_listing() {
    let registry = math_registry();
    let config = ServerConfig {
        filter: FilterPolicy {
            function_allowlist: Some(vec!["add".to_string(), "subtract".to_string()]),
            function_denylist: Some(vec!["add".to_string()]),
            ..Default::default()
        },
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(&registry, &config).unwrap();

    let response = dispatcher.handle(list_request()).await.unwrap();
    assert_eq!(listed_names(&response), vec!["subtract".to_string()]);

    let denied = dispatcher
        .handle(call("add", json!({"a": 1, "b": 1}), 1))
        .await
        .unwrap();
    assert_eq!(denied.error.unwrap().code, -32601);
}

#[tokio::test]
async fn empty_configured_allowlist_exposes_nothing() {
    let registry = math_registry();
    let config = ServerConfig {
        filter: FilterPolicy {
            function_allowlist: Some(vec![]),
            ..Default::default()
        },
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(&registry, &config).unwrap();

    let response = dispatcher.handle(list_request()).await.unwrap();
    assert!(listed_names(&response).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_yields_exactly_one_response_and_no_hang() {
    let registry = slow_registry(Duration::from_millis(300));
    let config = ServerConfig {
        call_timeout_ms: 50,
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(&registry, &config).unwrap();

    let response = dispatcher.handle(call("slow", json!({}), 7)).await.unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, -32001);
    assert_eq!(response.id, Some(json!(7)));
    assert!(error.message.contains("timed out"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slot_is_released_exactly_once_after_late_result() {
    // ceiling 1, reject policy: a timed-out handler still owns the slot
    // until it returns, then the slot is usable again
    let registry = slow_registry(Duration::from_millis(150));
    let config = ServerConfig {
        call_timeout_ms: 30,
        max_concurrency: 1,
        overflow: OverflowPolicy::Reject,
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(&registry, &config).unwrap();

    let timed_out = dispatcher.handle(call("slow", json!({}), 1)).await.unwrap();
    assert_eq!(timed_out.error.unwrap().code, -32001);

    // handler is still sleeping: the slot is occupied
    let busy = dispatcher.handle(call("slow", json!({}), 2)).await.unwrap();
    assert_eq!(busy.error.unwrap().code, -32002);

    // once the late result lands the slot frees, exactly once: the third
    // call is admitted (and times out on its own merits, not rejected)
    tokio::time::sleep(Duration::from_millis(250)).await;
    let admitted = dispatcher.handle(call("slow", json!({}), 3)).await.unwrap();
    assert_eq!(admitted.error.unwrap().code, -32001);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reject_policy_answers_busy_for_excess_calls() {
    let registry = slow_registry(Duration::from_millis(200));
    let config = ServerConfig {
        max_concurrency: 1,
        overflow: OverflowPolicy::Reject,
        call_timeout_ms: 5_000,
        ..Default::default()
    };
    let dispatcher = Arc::new(Dispatcher::new(&registry, &config).unwrap());

    let first = {
        let d = Arc::clone(&dispatcher);
        tokio::spawn(async move { d.handle(call("slow", json!({}), 1)).await.unwrap() })
    };
    // let the first call take the slot
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = dispatcher.handle(call("slow", json!({}), 2)).await.unwrap();

    assert_eq!(second.error.unwrap().code, -32002);
    let first = first.await.unwrap();
    assert!(first.error.is_none(), "first call must still complete");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queue_policy_completes_all_calls() {
    let registry = slow_registry(Duration::from_millis(30));
    let config = ServerConfig {
        max_concurrency: 2,
        overflow: OverflowPolicy::Queue,
        queue_depth: 16,
        call_timeout_ms: 5_000,
        ..Default::default()
    };
    let dispatcher = Arc::new(Dispatcher::new(&registry, &config).unwrap());

    let mut handles = Vec::new();
    for i in 0..6i64 {
        let d = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(
            async move { d.handle(call("slow", json!({}), i)).await.unwrap() },
        ));
    }

    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response.error.is_none(), "queued call was dropped");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queue_policy_bounds_the_queue() {
    let registry = slow_registry(Duration::from_millis(200));
    let config = ServerConfig {
        max_concurrency: 1,
        overflow: OverflowPolicy::Queue,
        queue_depth: 1,
        call_timeout_ms: 5_000,
        ..Default::default()
    };
    let dispatcher = Arc::new(Dispatcher::new(&registry, &config).unwrap());

    let mut handles = Vec::new();
    for i in 0..3i64 {
        let d = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(
            async move { d.handle(call("slow", json!({}), i)).await.unwrap() },
        ));
        // deterministic arrival order: run, wait, busy
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut busy = 0;
    let mut completed = 0;
    for handle in handles {
        let response = handle.await.unwrap();
        match response.error {
            Some(error) => {
                assert_eq!(error.code, -32002);
                busy += 1;
            }
            None => completed += 1,
        }
    }
    assert_eq!(completed, 2);
    assert_eq!(busy, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn responses_complete_out_of_request_order() {
    let mut registry = ToolRegistry::new();
    for (name, delay_ms) in [("slow", 150u64), ("fast", 0u64)] {
        registry
            .register(ToolSpec {
                name: name.to_string(),
                description: String::new(),
                schema: json!({"type": "object", "properties": {}}),
                domain: None,
                category: None,
                handler: Arc::new(move |_| {
                    std::thread::sleep(Duration::from_millis(delay_ms));
                    Ok(json!(name))
                }),
            })
            .unwrap();
    }
    registry.seal();
    let dispatcher = Arc::new(Dispatcher::new(&registry, &ServerConfig::default()).unwrap());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    for name in ["slow", "fast"] {
        let d = Arc::clone(&dispatcher);
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = d.handle(call(name, json!({}), 0)).await.unwrap();
            let _ = tx.send(tool_result(&response));
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    drop(tx);

    // the fast call, issued second, answers first; ids correlate the rest
    assert_eq!(rx.recv().await, Some(json!("fast")));
    assert_eq!(rx.recv().await, Some(json!("slow")));
}

#[tokio::test]
async fn failing_handler_is_internal_error_and_server_survives() {
    let mut registry = ToolRegistry::new();
    registry
        .register(ToolSpec {
            name: "broken".to_string(),
            description: String::new(),
            schema: json!({"type": "object", "properties": {}}),
            domain: None,
            category: None,
            handler: Arc::new(|_| Err(HostError::Internal("secret /etc/thing".to_string()))),
        })
        .unwrap();
    registry
        .register(ToolSpec {
            name: "fine".to_string(),
            description: String::new(),
            schema: json!({"type": "object", "properties": {}}),
            domain: None,
            category: None,
            handler: Arc::new(|_| Ok(json!("ok"))),
        })
        .unwrap();
    registry.seal();
    let dispatcher = Dispatcher::new(&registry, &ServerConfig::default()).unwrap();

    let failed = dispatcher.handle(call("broken", json!({}), 1)).await.unwrap();
    assert_eq!(failed.error.unwrap().code, -32603);

    // a failing handler never takes the server down with it
    let ok = dispatcher.handle(call("fine", json!({}), 2)).await.unwrap();
    assert_eq!(tool_result(&ok), json!("ok"));
}

#[tokio::test]
async fn panicking_handler_is_recovered_without_leaking_detail() {
    let mut registry = ToolRegistry::new();
    registry
        .register(ToolSpec {
            name: "panicky".to_string(),
            description: String::new(),
            schema: json!({"type": "object", "properties": {}}),
            domain: None,
            category: None,
            handler: Arc::new(|_| panic!("internal detail at src/secret.rs:42")),
        })
        .unwrap();
    registry.seal();
    let dispatcher = Dispatcher::new(&registry, &ServerConfig::default()).unwrap();

    let response = dispatcher.handle(call("panicky", json!({}), 1)).await.unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, -32603);
    assert!(
        !error.message.contains("src/secret.rs"),
        "panic detail leaked to the wire: {}",
        error.message
    );
}

#[tokio::test]
async fn handler_classified_input_error_maps_to_invalid_params() {
    let mut registry = ToolRegistry::new();
    registry
        .register(ToolSpec {
            name: "picky".to_string(),
            description: String::new(),
            schema: json!({
                "type": "object",
                "properties": {"n": {"type": "number"}},
                "required": ["n"]
            }),
            domain: None,
            category: None,
            handler: Arc::new(|args| {
                let n = args["n"].as_f64().unwrap_or(0.0);
                if n < 0.0 {
                    return Err(HostError::InvalidInput("\"n\": must be non-negative".into()));
                }
                Ok(json!(n.sqrt()))
            }),
        })
        .unwrap();
    registry.seal();
    let dispatcher = Dispatcher::new(&registry, &ServerConfig::default()).unwrap();

    let response = dispatcher.handle(call("picky", json!({"n": -1.0}), 1)).await.unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, -32602);
    assert!(error.message.contains("\"n\""));
}

mod http_transport {
    use super::*;
    use pretty_assertions::assert_eq;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    use toolhost::transport::HttpServer;

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app() -> axum::Router {
        let registry = math_registry();
        let dispatcher =
            Arc::new(Dispatcher::new(&registry, &ServerConfig::default()).unwrap());
        HttpServer::router(dispatcher)
    }

    #[tokio::test]
    async fn mcp_endpoint_serves_tool_calls() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"add","arguments":{"a":2,"b":3}}}"#,
            ))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["id"], 9);
        let text = body["result"]["content"][0]["text"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(text).unwrap(), json!(5.0));
    }

    #[tokio::test]
    async fn malformed_body_answers_parse_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn health_reports_liveness() {
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["time"].as_str().is_some());
    }

    #[tokio::test]
    async fn root_reports_server_info() {
        let request = Request::builder()
            .method("GET")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        let body = body_json(response).await;
        assert_eq!(body["transport"], "http");
        assert_eq!(body["tools"], 2);
    }
}
