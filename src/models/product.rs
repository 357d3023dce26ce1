use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CropCategory {
    Tomato,
    Maize,
    Pepper,
    Yam,
}

/// A marketplace listing. The coordinator only ever reads `id`, `farmer`
/// and `title`; the rest exists so listings are useful to browse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub farmer: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub quantity: u32,
    pub location: String,
    pub category: CropCategory,
    pub posted_at: DateTime<Utc>,
}
