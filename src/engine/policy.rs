use crate::models::actor::{Actor, Role};
use crate::models::delivery::{DeliveryRequest, DeliveryStatus};

/// Outcome of the authorization check for a single claim-or-transition call.
///
/// `claims_agent` marks an implicit claim: the acting logistics agent must be
/// written as `logistics_agent` atomically with the status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow { claims_agent: bool },
    Deny(&'static str),
}

/// Pure rule table deciding whether `actor` may move `delivery` to `target`.
///
/// Terminal-state enforcement happens before this is consulted, so the table
/// only encodes the role rules:
/// - a logistics agent may apply any target to an unclaimed delivery (claiming
///   it) or to a delivery already assigned to them; an assigned agent is not
///   restricted to forward moves
/// - farmers and buyers may only cancel their own requests
pub fn evaluate(actor: &Actor, delivery: &DeliveryRequest, target: DeliveryStatus) -> Decision {
    match actor.role {
        Role::Logistics => match delivery.logistics_agent {
            None => Decision::Allow { claims_agent: true },
            Some(agent) if agent == actor.id => Decision::Allow {
                claims_agent: false,
            },
            Some(_) => Decision::Deny("not assigned to this delivery"),
        },
        Role::Farmer => {
            if delivery.farmer == actor.id && target == DeliveryStatus::Cancelled {
                Decision::Allow {
                    claims_agent: false,
                }
            } else {
                Decision::Deny("not authorized to update this delivery")
            }
        }
        Role::Buyer => {
            if delivery.buyer == Some(actor.id) && target == DeliveryStatus::Cancelled {
                Decision::Allow {
                    claims_agent: false,
                }
            } else {
                Decision::Deny("not authorized to update this delivery")
            }
        }
    }
}
