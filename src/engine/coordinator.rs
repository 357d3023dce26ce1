use std::str::FromStr;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::engine::policy::{self, Decision};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::delivery::{DeliveryRequest, DeliveryStatus};
use crate::models::event::DeliveryEvent;
use crate::state::AppState;

pub struct NewDelivery {
    pub product_id: Uuid,
    pub pickup_location: String,
    pub destination: String,
    pub requested_for_group: bool,
}

pub fn create_request(
    state: &AppState,
    actor: &Actor,
    req: NewDelivery,
) -> Result<DeliveryRequest, AppError> {
    if actor.role == Role::Logistics {
        return Err(AppError::Forbidden(
            "logistics agents cannot create delivery requests".to_string(),
        ));
    }

    if req.pickup_location.trim().is_empty() {
        return Err(AppError::BadRequest(
            "pickup_location cannot be empty".to_string(),
        ));
    }
    if req.destination.trim().is_empty() {
        return Err(AppError::BadRequest(
            "destination cannot be empty".to_string(),
        ));
    }

    let product_farmer = {
        let product = state.products.get(&req.product_id).ok_or_else(|| {
            AppError::NotFound(format!("product {} not found", req.product_id))
        })?;
        product.farmer
    };

    if actor.role == Role::Farmer && product_farmer != actor.id {
        return Err(AppError::Forbidden(
            "farmers can only request delivery for their own listings".to_string(),
        ));
    }

    let delivery = DeliveryRequest {
        id: Uuid::new_v4(),
        product: req.product_id,
        farmer: product_farmer,
        buyer: (actor.role == Role::Buyer).then_some(actor.id),
        logistics_agent: None,
        pickup_location: req.pickup_location,
        destination: req.destination,
        status: DeliveryStatus::Pending,
        requested_for_group: req.requested_for_group,
        date_requested: Utc::now(),
    };

    state.deliveries.insert(delivery.id, delivery.clone());

    let origin = match actor.role {
        Role::Farmer => "farmer",
        _ => "buyer",
    };
    state
        .metrics
        .deliveries_created_total
        .with_label_values(&[origin])
        .inc();
    state
        .metrics
        .deliveries_by_status
        .with_label_values(&[DeliveryStatus::Pending.as_str()])
        .inc();

    publish_event(state, &delivery, actor.id);

    info!(
        delivery_id = %delivery.id,
        product_id = %delivery.product,
        origin,
        group = delivery.requested_for_group,
        "delivery request created"
    );

    Ok(delivery)
}

/// The single claim-and-transition gate. Every status change funnels through
/// here; the record stays locked for the whole read-check-write so two agents
/// racing for an unclaimed delivery cannot both win the claim.
pub fn apply_transition(
    state: &AppState,
    actor: &Actor,
    delivery_id: Uuid,
    target: &str,
) -> Result<DeliveryRequest, AppError> {
    let result = transition_locked(state, actor, delivery_id, target);

    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.outcome(),
    };
    state
        .metrics
        .transitions_total
        .with_label_values(&[outcome])
        .inc();

    // The record guard is released by now; the notification must never hold it.
    if let Ok(delivery) = &result {
        publish_event(state, delivery, actor.id);
    }

    result
}

fn transition_locked(
    state: &AppState,
    actor: &Actor,
    delivery_id: Uuid,
    target: &str,
) -> Result<DeliveryRequest, AppError> {
    let mut delivery = state.deliveries.get_mut(&delivery_id).ok_or_else(|| {
        AppError::NotFound(format!("delivery {delivery_id} not found"))
    })?;

    let target = DeliveryStatus::from_str(target)?;

    if delivery.status.is_terminal() {
        return Err(AppError::TerminalState(format!(
            "delivery {} is already {}",
            delivery.id, delivery.status
        )));
    }

    let claims_agent = match policy::evaluate(actor, &delivery, target) {
        Decision::Allow { claims_agent } => claims_agent,
        Decision::Deny(reason) => return Err(AppError::Forbidden(reason.to_string())),
    };

    if claims_agent {
        delivery.logistics_agent = Some(actor.id);
        state.metrics.claims_total.inc();
    }

    let previous = delivery.status;
    delivery.status = target;

    state
        .metrics
        .deliveries_by_status
        .with_label_values(&[previous.as_str()])
        .dec();
    state
        .metrics
        .deliveries_by_status
        .with_label_values(&[target.as_str()])
        .inc();

    info!(
        delivery_id = %delivery.id,
        actor_id = %actor.id,
        from = %previous,
        to = %target,
        claimed = claims_agent,
        "delivery status updated"
    );

    Ok(delivery.clone())
}

pub fn deliveries_for(state: &AppState, actor: &Actor) -> Vec<DeliveryRequest> {
    let mut deliveries: Vec<DeliveryRequest> = state
        .deliveries
        .iter()
        .filter_map(|entry| {
            let delivery = entry.value();
            visible_to(actor, delivery).then(|| delivery.clone())
        })
        .collect();

    deliveries.sort_by(|a, b| b.date_requested.cmp(&a.date_requested));
    deliveries
}

/// The logistics work queue: everything still pending (claimable by anyone)
/// plus the agent's own unfinished deliveries.
pub fn claimable_for(state: &AppState, actor: &Actor) -> Result<Vec<DeliveryRequest>, AppError> {
    if actor.role != Role::Logistics {
        return Err(AppError::Forbidden(
            "only logistics agents can view claimable deliveries".to_string(),
        ));
    }

    let mut deliveries: Vec<DeliveryRequest> = state
        .deliveries
        .iter()
        .filter_map(|entry| {
            let delivery = entry.value();
            let open_claim = delivery.status == DeliveryStatus::Pending;
            let mine_active = delivery.logistics_agent == Some(actor.id)
                && !delivery.status.is_terminal();

            (open_claim || mine_active).then(|| delivery.clone())
        })
        .collect();

    deliveries.sort_by(|a, b| b.date_requested.cmp(&a.date_requested));
    Ok(deliveries)
}

pub fn delivery_for(
    state: &AppState,
    actor: &Actor,
    delivery_id: Uuid,
) -> Result<DeliveryRequest, AppError> {
    let delivery = state.deliveries.get(&delivery_id).ok_or_else(|| {
        AppError::NotFound(format!("delivery {delivery_id} not found"))
    })?;

    if !visible_to(actor, &delivery) {
        return Err(AppError::Forbidden(
            "not authorized to view this delivery".to_string(),
        ));
    }

    Ok(delivery.clone())
}

fn visible_to(actor: &Actor, delivery: &DeliveryRequest) -> bool {
    match actor.role {
        Role::Farmer => delivery.farmer == actor.id,
        Role::Buyer => delivery.buyer == Some(actor.id),
        Role::Logistics => true,
    }
}

fn publish_event(state: &AppState, delivery: &DeliveryRequest, actor_id: Uuid) {
    let event = DeliveryEvent {
        delivery_id: delivery.id,
        status: delivery.status,
        actor: actor_id,
        occurred_at: Utc::now(),
    };

    // Best-effort: no subscribers is not an error.
    let _ = state.delivery_events_tx.send(event);
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use chrono::Utc;
    use uuid::Uuid;

    use super::{apply_transition, claimable_for, create_request, deliveries_for, NewDelivery};
    use crate::error::AppError;
    use crate::models::actor::{Actor, Role};
    use crate::models::delivery::DeliveryStatus;
    use crate::models::product::{CropCategory, Product};
    use crate::state::AppState;

    fn actor(id_seed: u128, role: Role) -> Actor {
        Actor {
            id: Uuid::from_u128(id_seed),
            name: format!("actor-{id_seed}"),
            role,
            location: None,
            verified: true,
            registered_at: Utc::now(),
        }
    }

    fn seed_product(state: &AppState, farmer: &Actor) -> Uuid {
        let product = Product {
            id: Uuid::new_v4(),
            farmer: farmer.id,
            title: "Fresh tomatoes".to_string(),
            description: "Crate of ripe tomatoes".to_string(),
            price: 25.0,
            quantity: 40,
            location: "Ibadan".to_string(),
            category: CropCategory::Tomato,
            posted_at: Utc::now(),
        };
        let id = product.id;
        state.products.insert(id, product);
        id
    }

    fn new_delivery(product_id: Uuid) -> NewDelivery {
        NewDelivery {
            product_id,
            pickup_location: "Farm A".to_string(),
            destination: "Market B".to_string(),
            requested_for_group: false,
        }
    }

    #[test]
    fn farmer_created_request_starts_pending_and_unclaimed() {
        let state = AppState::new(16);
        let farmer = actor(1, Role::Farmer);
        let product_id = seed_product(&state, &farmer);

        let delivery = create_request(&state, &farmer, new_delivery(product_id)).unwrap();

        assert_eq!(delivery.status, DeliveryStatus::Pending);
        assert_eq!(delivery.farmer, farmer.id);
        assert_eq!(delivery.buyer, None);
        assert_eq!(delivery.logistics_agent, None);
    }

    #[test]
    fn buyer_created_request_records_the_buyer() {
        let state = AppState::new(16);
        let farmer = actor(1, Role::Farmer);
        let buyer = actor(2, Role::Buyer);
        let product_id = seed_product(&state, &farmer);

        let delivery = create_request(&state, &buyer, new_delivery(product_id)).unwrap();

        assert_eq!(delivery.farmer, farmer.id);
        assert_eq!(delivery.buyer, Some(buyer.id));
    }

    #[test]
    fn farmer_cannot_request_delivery_for_someone_elses_listing() {
        let state = AppState::new(16);
        let owner = actor(1, Role::Farmer);
        let other = actor(2, Role::Farmer);
        let product_id = seed_product(&state, &owner);

        let err = create_request(&state, &other, new_delivery(product_id)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn logistics_agent_cannot_create_a_request() {
        let state = AppState::new(16);
        let farmer = actor(1, Role::Farmer);
        let agent = actor(3, Role::Logistics);
        let product_id = seed_product(&state, &farmer);

        let err = create_request(&state, &agent, new_delivery(product_id)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn unknown_product_is_rejected() {
        let state = AppState::new(16);
        let buyer = actor(2, Role::Buyer);

        let err = create_request(&state, &buyer, new_delivery(Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn first_transition_by_an_agent_claims_the_delivery() {
        let state = AppState::new(16);
        let farmer = actor(1, Role::Farmer);
        let agent = actor(3, Role::Logistics);
        let product_id = seed_product(&state, &farmer);
        let delivery = create_request(&state, &farmer, new_delivery(product_id)).unwrap();

        let updated = apply_transition(&state, &agent, delivery.id, "accepted").unwrap();

        assert_eq!(updated.status, DeliveryStatus::Accepted);
        assert_eq!(updated.logistics_agent, Some(agent.id));
    }

    #[test]
    fn second_agent_is_rejected_and_record_is_untouched() {
        let state = AppState::new(16);
        let farmer = actor(1, Role::Farmer);
        let first = actor(3, Role::Logistics);
        let second = actor(4, Role::Logistics);
        let product_id = seed_product(&state, &farmer);
        let delivery = create_request(&state, &farmer, new_delivery(product_id)).unwrap();

        apply_transition(&state, &first, delivery.id, "accepted").unwrap();
        let err = apply_transition(&state, &second, delivery.id, "in_transit").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let record = state.deliveries.get(&delivery.id).unwrap();
        assert_eq!(record.status, DeliveryStatus::Accepted);
        assert_eq!(record.logistics_agent, Some(first.id));
    }

    #[test]
    fn terminal_records_reject_every_further_call() {
        let state = AppState::new(16);
        let farmer = actor(1, Role::Farmer);
        let agent = actor(3, Role::Logistics);
        let product_id = seed_product(&state, &farmer);
        let delivery = create_request(&state, &farmer, new_delivery(product_id)).unwrap();

        apply_transition(&state, &agent, delivery.id, "delivered").unwrap();

        for caller in [&agent, &farmer] {
            let err = apply_transition(&state, caller, delivery.id, "cancelled").unwrap_err();
            assert!(matches!(err, AppError::TerminalState(_)));
        }

        let record = state.deliveries.get(&delivery.id).unwrap();
        assert_eq!(record.status, DeliveryStatus::Delivered);
    }

    #[test]
    fn unknown_target_status_is_rejected_without_mutation() {
        let state = AppState::new(16);
        let farmer = actor(1, Role::Farmer);
        let agent = actor(3, Role::Logistics);
        let product_id = seed_product(&state, &farmer);
        let delivery = create_request(&state, &farmer, new_delivery(product_id)).unwrap();

        let err = apply_transition(&state, &agent, delivery.id, "teleported").unwrap_err();
        assert!(matches!(err, AppError::InvalidStatus(_)));

        let record = state.deliveries.get(&delivery.id).unwrap();
        assert_eq!(record.status, DeliveryStatus::Pending);
        assert_eq!(record.logistics_agent, None);
    }

    #[test]
    fn farmer_can_cancel_their_own_pending_request() {
        let state = AppState::new(16);
        let farmer = actor(1, Role::Farmer);
        let product_id = seed_product(&state, &farmer);
        let delivery = create_request(&state, &farmer, new_delivery(product_id)).unwrap();

        let updated = apply_transition(&state, &farmer, delivery.id, "cancelled").unwrap();
        assert_eq!(updated.status, DeliveryStatus::Cancelled);
    }

    #[test]
    fn buyer_cannot_cancel_an_unrelated_delivery() {
        let state = AppState::new(16);
        let farmer = actor(1, Role::Farmer);
        let stranger = actor(5, Role::Buyer);
        let product_id = seed_product(&state, &farmer);
        let delivery = create_request(&state, &farmer, new_delivery(product_id)).unwrap();

        let err = apply_transition(&state, &stranger, delivery.id, "cancelled").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn exactly_one_agent_wins_a_racing_claim() {
        let state = Arc::new(AppState::new(16));
        let farmer = actor(1, Role::Farmer);
        let product_id = seed_product(&state, &farmer);
        let delivery = create_request(&state, &farmer, new_delivery(product_id)).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [actor(10, Role::Logistics), actor(11, Role::Logistics)]
            .into_iter()
            .map(|agent| {
                let state = state.clone();
                let barrier = barrier.clone();
                let delivery_id = delivery.id;
                std::thread::spawn(move || {
                    barrier.wait();
                    apply_transition(&state, &agent, delivery_id, "accepted")
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);

        let losses = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::Forbidden(_))))
            .count();
        assert_eq!(losses, 1);

        let record = state.deliveries.get(&delivery.id).unwrap();
        assert_eq!(record.status, DeliveryStatus::Accepted);
        assert!(record.logistics_agent.is_some());
    }

    #[test]
    fn listings_are_scoped_by_role() {
        let state = AppState::new(16);
        let farmer_a = actor(1, Role::Farmer);
        let farmer_b = actor(2, Role::Farmer);
        let buyer = actor(3, Role::Buyer);
        let agent = actor(4, Role::Logistics);

        let product_a = seed_product(&state, &farmer_a);
        let product_b = seed_product(&state, &farmer_b);

        create_request(&state, &farmer_a, new_delivery(product_a)).unwrap();
        create_request(&state, &buyer, new_delivery(product_b)).unwrap();

        assert_eq!(deliveries_for(&state, &farmer_a).len(), 1);
        assert_eq!(deliveries_for(&state, &farmer_b).len(), 1);
        assert_eq!(deliveries_for(&state, &buyer).len(), 1);
        assert_eq!(deliveries_for(&state, &agent).len(), 2);
    }

    #[test]
    fn pending_view_tracks_open_work_and_own_claims() {
        let state = AppState::new(16);
        let farmer = actor(1, Role::Farmer);
        let agent_a = actor(4, Role::Logistics);
        let agent_b = actor(5, Role::Logistics);

        let product = seed_product(&state, &farmer);
        let claimed = create_request(&state, &farmer, new_delivery(product)).unwrap();
        let open = create_request(&state, &farmer, new_delivery(product)).unwrap();
        let finished = create_request(&state, &farmer, new_delivery(product)).unwrap();

        apply_transition(&state, &agent_a, claimed.id, "in_transit").unwrap();
        apply_transition(&state, &agent_b, finished.id, "delivered").unwrap();

        let for_a: Vec<_> = claimable_for(&state, &agent_a)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert!(for_a.contains(&claimed.id));
        assert!(for_a.contains(&open.id));
        assert!(!for_a.contains(&finished.id));

        // agent_b only sees the still-open request: their own claim is done
        // and agent_a's claim is not theirs
        let for_b: Vec<_> = claimable_for(&state, &agent_b)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(for_b, vec![open.id]);

        let err = claimable_for(&state, &farmer).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
