//! OpenAI client tests against a local mock chat-completions endpoint.
//!
//! Tests cover:
//! - A normal completion reaching the agent with the bearer key
//! - Server errors turned into the fallback reply
//! - Responses without choices turned into the fallback reply

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use bricknplate_bot::agent::{Agent, FALLBACK_REPLY, Responder};
use bricknplate_bot::llm::OpenAiClient;
use bricknplate_bot::memory::RecentEvents;
use bricknplate_bot::stream_info::StreamInfo;
use bricknplate_bot::tools::{HelixClient, RebrickableClient, ToolSet};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn agent_against(base_url: &str) -> Agent {
    let model = OpenAiClient::new("sk-test".into())
        .unwrap()
        .with_model("gpt-test")
        .with_base_url(base_url);
    let tools = ToolSet::from_parts(
        RebrickableClient::new("key", "http://127.0.0.1:9"),
        HelixClient::new("id", "secret", "#bricknplate")
            .with_endpoints("http://127.0.0.1:9", "http://127.0.0.1:9"),
        Arc::new(StreamInfo::default()),
        Arc::new(Mutex::new(RecentEvents::default())),
    );
    Agent::new(Arc::new(model), Arc::new(tools), "BrickNPlateBot", 10)
}

async fn answer(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    assert_eq!(body["model"], "gpt-test");
    assert!(body["tools"].as_array().is_some_and(|t| !t.is_empty()));
    Json(json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": "Hi! We're building a Lamborghini today!" },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 120, "completion_tokens": 12 }
    }))
    .into_response()
}

#[tokio::test]
async fn completion_reaches_the_agent() {
    let base = serve(Router::new().route("/chat/completions", post(answer))).await;
    let agent = agent_against(&base);
    assert_eq!(
        agent.reply("brickfan", "hey bricknplatebot").await,
        "Hi! We're building a Lamborghini today!"
    );
    assert_eq!(agent.memory_len().await, 1);
}

#[tokio::test]
async fn server_error_gives_fallback() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": {"message": "The server had an error"}})),
            )
        }),
    );
    let agent = agent_against(&serve(app).await);
    assert_eq!(agent.reply("brickfan", "bricknplatebot hi").await, FALLBACK_REPLY);
    assert_eq!(agent.memory_len().await, 0);
}

#[tokio::test]
async fn empty_choices_give_fallback() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async { Json(json!({"id": "chatcmpl-2", "choices": []})) }),
    );
    let agent = agent_against(&serve(app).await);
    assert_eq!(agent.reply("brickfan", "bricknplatebot hi").await, FALLBACK_REPLY);
    assert_eq!(agent.memory_len().await, 0);
}
