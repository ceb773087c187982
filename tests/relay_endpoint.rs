use axum::{
    body::Body,
    extract::State,
    http::{ header, Request, StatusCode },
    response::{ IntoResponse, Response },
    routing::post,
    Json,
    Router,
};
use chat_relay::client::transport::HttpRelayTransport;
use chat_relay::client::{ ChatSession, SubmitState };
use chat_relay::llm::chat::new_client;
use chat_relay::llm::LlmConfig;
use chat_relay::models::chat::{ MessageContent, MessagePart, Role };
use chat_relay::relay::{ Relay, DEFAULT_MAX_STEPS };
use chat_relay::server::api::router;
use chat_relay::tools::ToolRegistry;
use serde_json::{ json, Value as JsonValue };
use std::net::SocketAddr;
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

/// How the fake endpoint answers.
#[derive(Default, Clone, Copy, PartialEq)]
enum Mode {
    /// First request gets a tool call, every later one gets plain text.
    #[default]
    ToolRoundTrip,
    /// Every request gets a 500.
    Fail,
    /// 200 with a text chunk, then an error chunk mid-stream.
    ErrorMidStream,
    /// Tool call whose name carries a newline, then plain text.
    MangledToolName,
}

/// Stand-in for an OpenAI-compatible endpoint.
#[derive(Default)]
struct FakeUpstream {
    requests: Mutex<Vec<JsonValue>>,
    mode: Mode,
}

impl FakeUpstream {
    fn with_mode(mode: Mode) -> Arc<Self> {
        Arc::new(Self { mode, ..Default::default() })
    }
}

fn sse_body(chunks: &[JsonValue]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn completions(State(upstream): State<Arc<FakeUpstream>>, Json(request): Json<JsonValue>) -> Response {
    if upstream.mode == Mode::Fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded").into_response();
    }

    let step = {
        let mut requests = upstream.requests.lock().unwrap();
        requests.push(request);
        requests.len()
    };

    let tool_name = match upstream.mode {
        Mode::MangledToolName => "wea\nther",
        _ => "convertFarenheitToCelsius",
    };
    let chunks = if upstream.mode == Mode::ErrorMidStream {
        vec![
            json!({ "choices": [{ "delta": { "content": "Let me" }, "finish_reason": null }] }),
            json!({ "error": { "message": "Rate limit reached", "type": "requests" } })
        ]
    } else if step == 1 {
        vec![
            json!({
                "choices": [{
                    "delta": { "tool_calls": [{
                        "index": 0,
                        "id": "call_1",
                        "function": { "name": tool_name, "arguments": "{\"temperature\":" }
                    }] },
                    "finish_reason": null
                }]
            }),
            json!({
                "choices": [{
                    "delta": { "tool_calls": [{ "index": 0, "function": { "arguments": "212}" } }] },
                    "finish_reason": null
                }]
            }),
            json!({ "choices": [{ "delta": {}, "finish_reason": "tool_calls" }] })
        ]
    } else {
        vec![
            json!({ "choices": [{ "delta": { "content": "That is " }, "finish_reason": null }] }),
            json!({ "choices": [{ "delta": { "content": "100C." }, "finish_reason": null }] }),
            json!({ "choices": [{ "delta": {}, "finish_reason": "stop" }] })
        ]
    };

    ([(header::CONTENT_TYPE, "text/event-stream")], sse_body(&chunks)).into_response()
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn spawn_upstream(upstream: Arc<FakeUpstream>) -> SocketAddr {
    let app = Router::new().route("/v1/chat/completions", post(completions)).with_state(upstream);
    spawn(app).await
}

fn relay_app(upstream_addr: SocketAddr) -> Router {
    let config = LlmConfig {
        api_key: Some("test-key".into()),
        completion_model: Some("gpt-4o-mini".into()),
        base_url: Some(format!("http://{}/v1", upstream_addr)),
        request_timeout: Some(Duration::from_secs(5)),
    };
    let client = new_client(&config).unwrap();
    router(Arc::new(Relay::new(client, ToolRegistry::default(), DEFAULT_MAX_STEPS)))
}

fn chat_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let upstream = Arc::new(FakeUpstream::default());
    let app = relay_app(spawn_upstream(upstream.clone()).await);

    let response = app.oneshot(chat_request("{\"messages\": [")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: JsonValue = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(body["error"].is_string());
    assert!(upstream.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_role_is_rejected() {
    let upstream = Arc::new(FakeUpstream::default());
    let app = relay_app(spawn_upstream(upstream).await);

    let body = json!({ "messages": [{ "role": "system", "content": "hi" }] }).to_string();
    let response = app.oneshot(chat_request(body)).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn failing_upstream_is_bad_gateway() {
    let upstream = FakeUpstream::with_mode(Mode::Fail);
    let app = relay_app(spawn_upstream(upstream).await);

    let body = json!({ "messages": [{ "role": "user", "content": "hi" }] }).to_string();
    let response = app.oneshot(chat_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(body_text(response).await.contains("500"));
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let app = relay_app(closed);

    let body = json!({ "messages": [{ "role": "user", "content": "hi" }] }).to_string();
    let response = app.oneshot(chat_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn streams_tool_round_trip_as_sse() {
    let upstream = Arc::new(FakeUpstream::default());
    let app = relay_app(spawn_upstream(upstream.clone()).await);

    let body = json!({ "messages": [{ "role": "user", "content": "212F in C?" }] }).to_string();
    let response = app.oneshot(chat_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

    let text = body_text(response).await;
    assert!(text.contains("event: tool-convertFarenheitToCelsius"));
    assert!(text.contains("\"celsius\":100"));
    assert!(text.contains("event: text-delta"));
    assert!(text.contains("\"finishReason\":\"stop\""));

    let requests = upstream.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["stream"], json!(true));
    assert_eq!(requests[0]["tools"].as_array().map(Vec::len), Some(2));
    let replayed = requests[1]["messages"].as_array().unwrap();
    assert_eq!(replayed.last().unwrap()["role"], "tool");
    assert_eq!(replayed.last().unwrap()["tool_call_id"], "call_1");
}

#[tokio::test]
async fn error_chunk_mid_stream_ends_with_error_part() {
    let upstream = FakeUpstream::with_mode(Mode::ErrorMidStream);
    let app = relay_app(spawn_upstream(upstream).await);

    let body = json!({ "messages": [{ "role": "user", "content": "hi" }] }).to_string();
    let response = app.oneshot(chat_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert!(text.contains("event: text-delta"));
    assert!(text.contains("event: error"));
    assert!(text.contains("Rate limit reached"));
    assert!(!text.contains("event: finish"));
}

#[tokio::test]
async fn newline_in_tool_name_does_not_break_stream() {
    let upstream = FakeUpstream::with_mode(Mode::MangledToolName);
    let app = relay_app(spawn_upstream(upstream).await);

    let body = json!({ "messages": [{ "role": "user", "content": "weather?" }] }).to_string();
    let response = app.oneshot(chat_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    assert!(text.contains("event: tool-wea_ther"));
    assert!(text.contains("is not available"));
    assert!(text.contains("\"finishReason\":\"stop\""));
}

#[tokio::test]
async fn chat_session_surfaces_mid_stream_error() {
    let upstream = FakeUpstream::with_mode(Mode::ErrorMidStream);
    let relay_addr = spawn(relay_app(spawn_upstream(upstream).await)).await;

    let transport = HttpRelayTransport::new(&format!("http://{}/api/chat", relay_addr)).unwrap();
    let mut session = ChatSession::new(transport);

    let reply = session.submit("hi").await.unwrap();
    assert!(reply.content.text().contains("Rate limit reached"));
    assert_eq!(session.state(), SubmitState::Failed);
}

#[tokio::test]
async fn chat_session_talks_to_live_relay() {
    let upstream = Arc::new(FakeUpstream::default());
    let relay_addr = spawn(relay_app(spawn_upstream(upstream.clone()).await)).await;

    let transport = HttpRelayTransport::new(&format!("http://{}/api/chat", relay_addr)).unwrap();
    let mut session = ChatSession::new(transport);

    let reply = session.submit("212F in C?").await.unwrap().clone();
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content.text(), "That is 100C.");
    let MessageContent::Parts(parts) = &reply.content else {
        panic!("expected parts");
    };
    let MessagePart::ToolInvocation(invocation) = &parts[0] else {
        panic!("expected tool invocation first");
    };
    assert_eq!(invocation.arguments, json!({ "temperature": 212 }));
    assert_eq!(invocation.result, Some(json!({ "celsius": 100 })));
    assert_eq!(session.state(), SubmitState::Idle);
    assert_eq!(session.conversation().len(), 2);
}

#[tokio::test]
async fn chat_session_reports_relay_failure() {
    let upstream = FakeUpstream::with_mode(Mode::Fail);
    let relay_addr = spawn(relay_app(spawn_upstream(upstream).await)).await;

    let transport = HttpRelayTransport::new(&format!("http://{}/api/chat", relay_addr)).unwrap();
    let mut session = ChatSession::new(transport);

    let reply = session.submit("hi").await.unwrap();
    assert!(reply.content.text().starts_with("Sorry, something went wrong"));
    assert_eq!(session.state(), SubmitState::Failed);
    assert!(session.input_enabled());
}
