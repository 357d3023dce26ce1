use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;

/// Broadcast to subscribers whenever a delivery is created or changes status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub delivery_id: Uuid,
    pub status: DeliveryStatus,
    pub actor: Uuid,
    pub occurred_at: DateTime<Utc>,
}
