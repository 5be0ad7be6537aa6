use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "learning_server",
        "agent_id": state.agent.agent_id,
        "version": state.agent.agent_version,
    }))
}
