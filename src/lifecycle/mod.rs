//! Order status machine.
//!
//! ```text
//! pending -> accepted -> preparing -> ready -> delivering -> delivered
//!    \-> cancelled
//! ```
//!
//! Business actors drive everything up to `ready`; delivery actors take it
//! from there. `delivered` and `cancelled` are terminal.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::order::OrderStatus;

/// Share of the order total credited to the courier on completion.
pub const COMMISSION_RATE: f64 = 0.15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Client,
    Business,
    Delivery,
    Admin,
}

impl ActorRole {
    pub const ALL: [ActorRole; 4] = [
        ActorRole::Client,
        ActorRole::Business,
        ActorRole::Delivery,
        ActorRole::Admin,
    ];
}

pub fn next_allowed_states(current: OrderStatus, role: ActorRole) -> &'static [OrderStatus] {
    use OrderStatus::*;

    match (role, current) {
        (ActorRole::Business, Pending) => &[Accepted, Cancelled],
        (ActorRole::Business, Accepted) => &[Preparing],
        (ActorRole::Business, Preparing) => &[Ready],
        (ActorRole::Delivery, Ready) => &[Delivering],
        (ActorRole::Delivery, Delivering) => &[Delivered],
        _ => &[],
    }
}

pub fn check_transition(
    current: OrderStatus,
    target: OrderStatus,
    role: ActorRole,
) -> Result<(), AppError> {
    if next_allowed_states(current, role).contains(&target) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from: current,
            to: target,
        })
    }
}

pub fn commission(order_total: f64) -> f64 {
    order_total * COMMISSION_RATE
}

/// Tracking page progress bar, in percent.
pub fn progress(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 20,
        OrderStatus::Accepted => 40,
        OrderStatus::Preparing => 60,
        OrderStatus::Ready => 70,
        OrderStatus::Delivering => 90,
        OrderStatus::Delivered => 100,
        OrderStatus::Cancelled => 0,
    }
}
