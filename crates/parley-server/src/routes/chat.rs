use crate::state::AppState;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use parley::agent::StreamEvent;
use parley::models::message::Message;
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// One prior turn as the browser sends it
#[derive(Debug, Deserialize)]
struct HistoryEntry {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    user_query: String,
    #[serde(default)]
    chat_history: Vec<HistoryEntry>,
}

// Server-sent events carrying plain text fragments, closed by `data: done`
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = axum::body::Body::from_stream(self);
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

fn convert_history(entries: Vec<HistoryEntry>) -> Vec<Message> {
    entries
        .into_iter()
        .filter_map(|entry| match entry.role.as_str() {
            "user" => Some(Message::user().with_text(entry.content)),
            "assistant" => Some(Message::assistant().with_text(entry.content)),
            // kept so the conversation can log and drop it
            "system" => Some(Message::system().with_text(entry.content)),
            other => {
                tracing::warn!("Unknown role in chat history: {}", other);
                None
            }
        })
        .collect()
}

/// Encode one fragment as an SSE event. Each line gets its own `data:` field
/// so that newlines inside the fragment survive the framing.
fn format_event(text: &str) -> String {
    let mut event = String::new();
    for line in text.split('\n') {
        event.push_str("data: ");
        event.push_str(line);
        event.push('\n');
    }
    event.push('\n');
    event
}

const DONE_EVENT: &str = "data: done\n\n";

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> SseResponse {
    let (tx, rx) = mpsc::channel(100);
    let history = convert_history(request.chat_history);

    tokio::spawn(async move {
        let mut events = state
            .agent
            .chat_stream(&state.system_prompt, &request.user_query, &history);

        while let Some(event) = events.next().await {
            let frame = match event {
                StreamEvent::Fragment(text) | StreamEvent::Error(text) => format_event(&text),
                StreamEvent::Done => DONE_EVENT.to_string(),
            };
            // a closed channel means the client went away
            if tx.send(frame).await.is_err() {
                tracing::debug!("client disconnected, stopping chat stream");
                break;
            }
        }
    });

    SseResponse::new(ReceiverStream::new(rx))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    prompt: String,
    #[serde(default)]
    chat_history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    response: String,
}

// non streaming answer
async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Json<AskResponse> {
    let history = convert_history(request.chat_history);
    let response = state
        .agent
        .chat(&state.system_prompt, &request.prompt, &history)
        .await;
    Json(AskResponse { response })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handler))
        .route("/ask", post(ask_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use parley::agent::{Agent, AgentConfig};
    use parley::models::role::Role;
    use parley::providers::errors::ProviderError;
    use parley::providers::mock::MockProvider;
    use parley::tools::ToolRegistry;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(provider: MockProvider) -> Router {
        let agent = Agent::new(Box::new(provider), Arc::new(ToolRegistry::new()))
            .with_config(AgentConfig::default().with_fragments(3, Duration::ZERO));
        routes(AppState::new(agent, "You are a shop assistant."))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_format_event() {
        assert_eq!(format_event("He"), "data: He\n\n");
        assert_eq!(format_event("a\nb"), "data: a\ndata: b\n\n");
        assert_eq!(format_event("\n"), "data: \ndata: \n\n");
    }

    #[tokio::test]
    async fn test_chat_streams_fragments_then_done() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("Hi\nthere")]);
        let response = app(provider)
            .oneshot(post_json("/chat", json!({"user_query": "hello"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(
            body_text(response).await,
            "data: Hi\ndata: \n\ndata: the\n\ndata: re\n\ndata: done\n\n"
        );
    }

    #[tokio::test]
    async fn test_chat_reports_errors_in_band() {
        let provider = MockProvider::failing(ProviderError::Network("refused".to_string()));
        let response = app(provider)
            .oneshot(post_json("/chat", json!({"user_query": "hello"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            "data: [Error during streaming]: Network error: refused\n\ndata: done\n\n"
        );
    }

    #[tokio::test]
    async fn test_chat_history_is_forwarded() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("ok")]);
        let log = provider.call_log();
        let request = post_json(
            "/chat",
            json!({
                "user_query": "and in blue?",
                "chat_history": [
                    {"role": "user", "content": "Do you sell mugs?"},
                    {"role": "assistant", "content": "Yes."},
                    {"role": "narrator", "content": "ignored"}
                ]
            }),
        );
        let response = app(provider).oneshot(request).await.unwrap();
        body_text(response).await;

        let calls = log.lock().unwrap();
        let roles: Vec<Role> = calls[0].messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(calls[0].messages[0].text(), "You are a shop assistant.");
        assert_eq!(calls[0].messages[3].text(), "and in blue?");
    }

    #[tokio::test]
    async fn test_chat_rejects_missing_query() {
        let provider = MockProvider::new(vec![]);
        let response = app(provider)
            .oneshot(post_json("/chat", json!({"chat_history": []})))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_ask_returns_full_answer() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("We ship worldwide.")]);
        let response = app(provider)
            .oneshot(post_json("/ask", json!({"prompt": "Do you ship abroad?"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body, json!({"response": "We ship worldwide."}));
    }
}
