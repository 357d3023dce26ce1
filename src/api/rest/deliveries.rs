use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::auth::AuthenticatedActor;
use crate::engine::coordinator::{self, NewDelivery};
use crate::error::AppError;
use crate::models::delivery::DeliveryRequest;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery).get(list_deliveries))
        .route("/deliveries/pending", get(list_pending_deliveries))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/status", patch(update_delivery_status))
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    pub product_id: Uuid,
    pub pickup_location: String,
    pub destination: String,
    #[serde(default)]
    pub requested_for_group: bool,
}

/// Target status arrives as the raw wire string so unrecognized values are
/// reported as 422 rather than failing body deserialization.
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let delivery = coordinator::create_request(
        &state,
        &actor,
        NewDelivery {
            product_id: payload.product_id,
            pickup_location: payload.pickup_location,
            destination: payload.destination,
            requested_for_group: payload.requested_for_group,
        },
    )?;

    Ok(Json(delivery))
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Json<Vec<DeliveryRequest>> {
    Json(coordinator::deliveries_for(&state, &actor))
}

async fn list_pending_deliveries(
    State(state): State<Arc<AppState>>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Vec<DeliveryRequest>>, AppError> {
    let deliveries = coordinator::claimable_for(&state, &actor)?;
    Ok(Json(deliveries))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let delivery = coordinator::delivery_for(&state, &actor, id)?;
    Ok(Json(delivery))
}

async fn update_delivery_status(
    State(state): State<Arc<AppState>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let delivery = coordinator::apply_transition(&state, &actor, id, &payload.status)?;
    Ok(Json(delivery))
}
