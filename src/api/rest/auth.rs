use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::Actor;
use crate::state::AppState;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// The acting principal, resolved from the `x-actor-id` header against the
/// actor directory. Anonymous and unknown principals are rejected before the
/// handler runs.
pub struct AuthenticatedActor(pub Actor);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(format!("missing {ACTOR_HEADER} header"))
            })?;

        let id = Uuid::parse_str(raw)
            .map_err(|_| AppError::Unauthorized(format!("invalid actor id: {raw}")))?;

        let actor = state
            .actors
            .get(&id)
            .ok_or_else(|| AppError::Unauthorized(format!("unknown actor: {id}")))?;

        Ok(AuthenticatedActor(actor.clone()))
    }
}
