use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use parley::providers::utils::tools_to_openai_spec;
use serde_json::Value;

/// The tool schemas offered to the model, in OpenAI function format
async fn list_tools(State(state): State<AppState>) -> Result<Json<Vec<Value>>, StatusCode> {
    tools_to_openai_spec(state.agent.tools())
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to render tool schemas: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/tools", get(list_tools))
        .with_state(state)
}
