use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::actor::Actor;
use crate::models::delivery::DeliveryRequest;
use crate::models::event::DeliveryEvent;
use crate::models::product::Product;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub actors: DashMap<Uuid, Actor>,
    pub products: DashMap<Uuid, Product>,
    pub deliveries: DashMap<Uuid, DeliveryRequest>,
    pub delivery_events_tx: broadcast::Sender<DeliveryEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        let (delivery_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            actors: DashMap::new(),
            products: DashMap::new(),
            deliveries: DashMap::new(),
            delivery_events_tx,
            metrics: Metrics::new(),
        }
    }
}
