//! # Order Status State Machine
//!
//! Two independent status tracks per sale, and the rules for who may move them.
//!
//! ## Tracks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Kitchen track (every sale)                                             │
//! │                                                                         │
//! │    pending ──► preparing ──► ready ──► delivered                        │
//! │       ▲            ▲           ▲           ■ terminal                   │
//! │   "Start"      "Ready"    "Served"                                      │
//! │                                                                         │
//! │  Delivery track (order_type = delivery only)                            │
//! │                                                                         │
//! │    null | pending_pickup ──► in_transit ──► delivered                   │
//! │                                                ■ terminal, leaves every │
//! │                                                  active view            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transitions are exactly one step forward. No skipping, no regressions.
//!
//! ## Authority
//! | Track    | Kitchen | Dispatcher | Driver                     |
//! |----------|---------|------------|----------------------------|
//! | kitchen  | yes     | no         | no                         |
//! | delivery | no      | yes        | only when assigned to them |

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{OrderType, Sale};

/// Kitchen orders older than this are flagged late on the board.
pub const LATE_AFTER_MINUTES: i64 = 5;

// =============================================================================
// Kitchen Status
// =============================================================================

/// Preparation lifecycle of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum KitchenStatus {
    /// Just rung up; waiting for the kitchen.
    Pending,
    Preparing,
    /// Plated and waiting for service or pickup.
    Ready,
    Delivered,
}

impl KitchenStatus {
    /// The columns shown on the kitchen board, in order.
    pub const ACTIVE: [KitchenStatus; 3] = [
        KitchenStatus::Pending,
        KitchenStatus::Preparing,
        KitchenStatus::Ready,
    ];

    /// The single legal successor, `None` once delivered.
    pub fn next(&self) -> Option<KitchenStatus> {
        match self {
            KitchenStatus::Pending => Some(KitchenStatus::Preparing),
            KitchenStatus::Preparing => Some(KitchenStatus::Ready),
            KitchenStatus::Ready => Some(KitchenStatus::Delivered),
            KitchenStatus::Delivered => None,
        }
    }

    /// True only for the immediate successor.
    pub fn can_advance_to(&self, target: KitchenStatus) -> bool {
        self.next() == Some(target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, KitchenStatus::Delivered)
    }

    /// Label of the column's advance button, named after the next state.
    pub fn action_label(&self) -> Option<&'static str> {
        match self {
            KitchenStatus::Pending => Some("Start preparing"),
            KitchenStatus::Preparing => Some("Mark ready"),
            KitchenStatus::Ready => Some("Mark delivered"),
            KitchenStatus::Delivered => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KitchenStatus::Pending => "pending",
            KitchenStatus::Preparing => "preparing",
            KitchenStatus::Ready => "ready",
            KitchenStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for KitchenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Delivery Status
// =============================================================================

/// Fulfilment lifecycle of a delivery sale. Stored nullable; null means
/// nobody has touched it yet and reads as `PendingPickup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    PendingPickup,
    InTransit,
    Delivered,
}

impl DeliveryStatus {
    pub const ACTIVE: [DeliveryStatus; 2] =
        [DeliveryStatus::PendingPickup, DeliveryStatus::InTransit];

    /// Reads a stored value, treating null as `PendingPickup`.
    #[inline]
    pub fn effective(stored: Option<DeliveryStatus>) -> DeliveryStatus {
        stored.unwrap_or(DeliveryStatus::PendingPickup)
    }

    pub fn next(&self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatus::PendingPickup => Some(DeliveryStatus::InTransit),
            DeliveryStatus::InTransit => Some(DeliveryStatus::Delivered),
            DeliveryStatus::Delivered => None,
        }
    }

    pub fn can_advance_to(&self, target: DeliveryStatus) -> bool {
        self.next() == Some(target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }

    /// Whether a stored value counts toward the pending-pickup badge.
    pub fn counts_as_pending(stored: Option<DeliveryStatus>) -> bool {
        DeliveryStatus::effective(stored) == DeliveryStatus::PendingPickup
    }

    pub fn action_label(&self) -> Option<&'static str> {
        match self {
            DeliveryStatus::PendingPickup => Some("Picked up"),
            DeliveryStatus::InTransit => Some("Delivered"),
            DeliveryStatus::Delivered => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::PendingPickup => "pending_pickup",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Actors & Authority
// =============================================================================

/// Who is asking for a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    /// Anyone working the kitchen board.
    Kitchen,
    /// Anyone working the delivery dispatch board.
    Dispatcher,
    /// A driver; may only move orders assigned to `user_id`.
    Driver { user_id: String },
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Kitchen => f.write_str("kitchen"),
            Actor::Dispatcher => f.write_str("dispatcher"),
            Actor::Driver { user_id } => write!(f, "driver {}", user_id),
        }
    }
}

/// Checks a kitchen-track transition.
///
/// ## Errors
/// - `NotAuthorized` unless the actor is the kitchen
/// - `IllegalTransition` unless `to` is exactly `from.next()`
pub fn authorize_kitchen(actor: &Actor, from: KitchenStatus, to: KitchenStatus) -> CoreResult<()> {
    if *actor != Actor::Kitchen {
        return Err(CoreError::NotAuthorized {
            actor: actor.to_string(),
            action: format!("move kitchen status to {}", to),
        });
    }
    if !from.can_advance_to(to) {
        return Err(CoreError::IllegalTransition {
            track: "kitchen",
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

/// Checks a delivery-track transition against the sale as currently known.
///
/// Dispatchers may make any legal step. Drivers may make a legal step only
/// on orders assigned to them.
pub fn authorize_delivery(actor: &Actor, sale: &Sale, to: DeliveryStatus) -> CoreResult<()> {
    let from = sale.effective_delivery_status();

    match actor {
        Actor::Dispatcher => {}
        Actor::Driver { user_id } => {
            if sale.assigned_driver_id.as_deref() != Some(user_id.as_str()) {
                return Err(CoreError::NotAuthorized {
                    actor: actor.to_string(),
                    action: format!("update delivery of sale {} assigned to someone else", sale.id),
                });
            }
        }
        Actor::Kitchen => {
            return Err(CoreError::NotAuthorized {
                actor: actor.to_string(),
                action: format!("move delivery status to {}", to),
            });
        }
    }

    if sale.order_type != OrderType::Delivery || !from.can_advance_to(to) {
        return Err(CoreError::IllegalTransition {
            track: "delivery",
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

/// Driver assignment leaves status alone but is refused on non-delivery
/// sales and on delivered ones.
pub fn check_driver_assignment(sale: &Sale) -> CoreResult<()> {
    if sale.order_type != OrderType::Delivery {
        return Err(CoreError::DriverAssignment {
            sale_id: sale.id.clone(),
            reason: "not a delivery order".to_string(),
        });
    }
    if sale.effective_delivery_status().is_terminal() {
        return Err(CoreError::DriverAssignment {
            sale_id: sale.id.clone(),
            reason: "already delivered".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Order Age
// =============================================================================

/// Short age label for order cards: `< 1 min`, `12 min`, `1h`, `2h5m`.
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mins = (now - created_at).num_minutes();
    if mins < 1 {
        return "< 1 min".to_string();
    }
    if mins < 60 {
        return format!("{} min", mins);
    }
    let hours = mins / 60;
    let rest = mins % 60;
    if rest > 0 {
        format!("{}h{}m", hours, rest)
    } else {
        format!("{}h", hours)
    }
}

/// True once an order has waited longer than [`LATE_AFTER_MINUTES`].
pub fn is_late(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at > Duration::minutes(LATE_AFTER_MINUTES)
}

// =============================================================================
// Unit Tests
// =============================================================================
