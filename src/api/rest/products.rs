use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::auth::AuthenticatedActor;
use crate::error::AppError;
use crate::models::actor::Role;
use crate::models::product::{CropCategory, Product};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/products", post(create_product).get(list_products))
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub quantity: u32,
    pub location: String,
    pub category: CropCategory,
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Json<Product>, AppError> {
    if actor.role != Role::Farmer {
        return Err(AppError::Forbidden(
            "only farmers can post product listings".to_string(),
        ));
    }

    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("title cannot be empty".to_string()));
    }
    if payload.price <= 0.0 {
        return Err(AppError::BadRequest("price must be > 0".to_string()));
    }
    if payload.quantity == 0 {
        return Err(AppError::BadRequest("quantity must be > 0".to_string()));
    }

    let product = Product {
        id: Uuid::new_v4(),
        farmer: actor.id,
        title: payload.title,
        description: payload.description,
        price: payload.price,
        quantity: payload.quantity,
        location: payload.location,
        category: payload.category,
        posted_at: Utc::now(),
    };

    state.products.insert(product.id, product.clone());
    Ok(Json(product))
}

async fn list_products(State(state): State<Arc<AppState>>) -> Json<Vec<Product>> {
    let mut products: Vec<Product> = state
        .products
        .iter()
        .map(|entry| entry.value().clone())
        .collect();

    products.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
    Json(products)
}
