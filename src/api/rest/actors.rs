use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/actors", post(register_actor).get(list_actors))
}

#[derive(Deserialize)]
pub struct RegisterActorRequest {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub location: Option<String>,
}

async fn register_actor(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterActorRequest>,
) -> Result<Json<Actor>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let actor = Actor {
        id: Uuid::new_v4(),
        name: payload.name,
        role: payload.role,
        location: payload.location,
        verified: false,
        registered_at: Utc::now(),
    };

    state.actors.insert(actor.id, actor.clone());
    Ok(Json(actor))
}

async fn list_actors(State(state): State<Arc<AppState>>) -> Json<Vec<Actor>> {
    let actors = state
        .actors
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(actors)
}
