//! REST adapter against a local upstream: request shape, output-stack
//! filtering and unwrapping, and HTTP error mapping.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use flowgate::adapters::{FlowAdapter, FlowRequest};
use flowgate::config::{AgentDescriptor, TransportKind};
use flowgate::errors::AdapterError;
use flowgate::{RawFlowOutput, RestAdapter};

#[derive(Clone)]
struct Upstream {
    response: Value,
    status: StatusCode,
    last_body: Arc<Mutex<Option<Value>>>,
}

async fn invoke(
    State(upstream): State<Upstream>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    *upstream.last_body.lock().await = Some(body);
    (upstream.status, Json(upstream.response.clone()))
}

async fn spawn_upstream(
    response: Value,
    status: StatusCode,
) -> (String, Arc<Mutex<Option<Value>>>) {
    let last_body = Arc::new(Mutex::new(None));
    let upstream = Upstream {
        response,
        status,
        last_body: last_body.clone(),
    };
    let app = Router::new()
        .route("/{*path}", post(invoke))
        .with_state(upstream);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), last_body)
}

fn descriptor(endpoint_url: &str) -> AgentDescriptor {
    AgentDescriptor {
        id: "support".into(),
        name: "Support".into(),
        description: "Customer support flow".into(),
        version: "1.0.0".into(),
        transport: TransportKind::Rest,
        endpoint_url: endpoint_url.into(),
        endpoint_token: "tok-1".into(),
        skills: Vec::new(),
    }
}

fn request(data: Option<Value>) -> FlowRequest {
    FlowRequest {
        text: "hello".into(),
        session_id: "ctx-1".into(),
        user_id: "a2a-ctx-1".into(),
        data,
    }
}

#[tokio::test]
async fn posts_to_the_token_path_with_the_expected_body() {
    let (url, last_body) = spawn_upstream(json!({ "outputStack": [] }), StatusCode::OK).await;
    let adapter = RestAdapter::new(&descriptor(&url)).unwrap();

    adapter.send(request(None), None).await.unwrap();

    let body = last_body.lock().await.clone().expect("body captured");
    assert_eq!(body["userId"], "a2a-ctx-1");
    assert_eq!(body["sessionId"], "ctx-1");
    assert_eq!(body["text"], "hello");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn forwards_caller_data_when_present() {
    let (url, last_body) = spawn_upstream(json!({ "outputStack": [] }), StatusCode::OK).await;
    let adapter = RestAdapter::new(&descriptor(&url)).unwrap();

    adapter
        .send(request(Some(json!({ "vip": true }))), None)
        .await
        .unwrap();

    let body = last_body.lock().await.clone().unwrap();
    assert_eq!(body["data"], json!({ "vip": true }));
}

#[tokio::test]
async fn drops_internal_metadata_entries() {
    let (url, _) = spawn_upstream(
        json!({ "outputStack": [
            { "text": "Hello", "data": null },
            { "text": "", "data": { "_cognigy": { "_messageId": "x" } } },
            { "text": "", "data": { "_cognigy": { "_messageId": "y", "_finishReason": "stop" } } }
        ]}),
        StatusCode::OK,
    )
    .await;
    let adapter = RestAdapter::new(&descriptor(&url)).unwrap();

    let outputs = adapter.send(request(None), None).await.unwrap();
    assert_eq!(outputs, vec![RawFlowOutput::from_text("Hello")]);
}

#[tokio::test]
async fn unwraps_default_envelopes() {
    let (url, _) = spawn_upstream(
        json!({ "outputStack": [
            { "text": "", "data": { "_cognigy": { "_default": {
                "_quickReplies": { "text": "Pick", "quickReplies": [ { "title": "A" } ] }
            }}}}
        ]}),
        StatusCode::OK,
    )
    .await;
    let adapter = RestAdapter::new(&descriptor(&url)).unwrap();

    let outputs = adapter.send(request(None), None).await.unwrap();
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].text.is_none());
    let data = outputs[0].data.as_ref().unwrap();
    assert_eq!(data["_quickReplies"]["text"], "Pick");
}

#[tokio::test]
async fn decodes_string_data_before_filtering() {
    // A metadata envelope serialized as a string must still be recognized
    // and dropped.
    let (url, _) = spawn_upstream(
        json!({ "outputStack": [
            { "text": "", "data": "{\"_cognigy\":{\"_messageId\":\"x\"}}" },
            { "text": "kept", "data": null }
        ]}),
        StatusCode::OK,
    )
    .await;
    let adapter = RestAdapter::new(&descriptor(&url)).unwrap();

    let outputs = adapter.send(request(None), None).await.unwrap();
    assert_eq!(outputs, vec![RawFlowOutput::from_text("kept")]);
}

#[tokio::test]
async fn non_2xx_maps_to_an_http_error() {
    let (url, _) = spawn_upstream(json!({ "error": "boom" }), StatusCode::INTERNAL_SERVER_ERROR).await;
    let adapter = RestAdapter::new(&descriptor(&url)).unwrap();

    let err = adapter.send(request(None), None).await.unwrap_err();
    match err {
        AdapterError::Http { status } => assert_eq!(status, 500),
        other => panic!("expected http error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_error() {
    // Nothing listens on this port.
    let adapter = RestAdapter::new(&descriptor("http://127.0.0.1:9")).unwrap();
    let err = adapter.send(request(None), None).await.unwrap_err();
    assert!(matches!(
        err,
        AdapterError::Network { .. } | AdapterError::Timeout { .. }
    ));
}
