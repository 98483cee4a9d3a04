//! # Domain Types
//!
//! Rows shared by the ledger, the workflows and the boards.
//!
//! ```text
//! Restaurant ─┬─ RestaurantMember (drivers are members with role driver)
//!             ├─ Product ◄── DishIngredient ──► Dish
//!             ├─ Sale ──► SaleItem ──► Dish
//!             └─ StockRow  (current-stock view, one per product)
//! ```
//!
//! Identifiers are UUID v4 strings. Stock quantities are `f64` in the
//! product's unit of measure (kg, l, pcs).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::status::{DeliveryStatus, KitchenStatus};

// =============================================================================
// Restaurant & Members
// =============================================================================

/// A tenant. Every other row is scoped to one restaurant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    /// ISO 4217 code, e.g. "THB".
    pub currency: String,
    /// IANA zone used for the daily summary boundary.
    pub timezone: String,
    pub is_active: bool,
}

/// Role of a member inside one restaurant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RestaurantRole {
    Owner,
    Admin,
    Manager,
    Staff,
    Driver,
}

/// A user's membership in a restaurant. Drivers are members with role `driver`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RestaurantMember {
    pub restaurant_id: String,
    pub user_id: String,
    pub display_name: String,
    pub role: RestaurantRole,
}

// =============================================================================
// Product & Stock
// =============================================================================

/// A purchasable ingredient with a unit of measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    /// Unit of measure ("kg", "l", "pcs").
    pub unit: String,
    pub category: Option<String>,
    /// Stock below this level is flagged for reorder.
    pub reorder_level: f64,
    /// Last purchase price per unit; drives dish cost.
    pub last_price: Money,
    /// Archive flag. Products referenced by history are archived, not deleted.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// One row of the current-stock view.
///
/// `current_quantity = purchases + adjustments - consumption`, computed by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockRow {
    pub product_id: String,
    pub product_name: String,
    pub unit: String,
    pub current_quantity: f64,
    pub reorder_level: f64,
    pub needs_reorder: bool,
}

/// Why stock was adjusted by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// Inventory count correction, either sign.
    Correction,
    /// Spoiled or stolen; always removes stock.
    Loss,
    /// Kitchen waste; always removes stock.
    Waste,
    /// Opening stock, either sign.
    Initial,
}

impl AdjustmentType {
    /// Applies the sign convention: loss and waste always decrement,
    /// whatever sign the caller supplied.
    ///
    /// ## Example
    /// ```rust
    /// use bistro_core::AdjustmentType;
    ///
    /// assert_eq!(AdjustmentType::Waste.signed_delta(2.0), -2.0);
    /// assert_eq!(AdjustmentType::Loss.signed_delta(-2.0), -2.0);
    /// assert_eq!(AdjustmentType::Correction.signed_delta(-1.5), -1.5);
    /// ```
    pub fn signed_delta(&self, quantity: f64) -> f64 {
        match self {
            AdjustmentType::Loss | AdjustmentType::Waste => -quantity.abs(),
            AdjustmentType::Correction | AdjustmentType::Initial => quantity,
        }
    }
}

/// A manual stock movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockAdjustment {
    pub id: String,
    pub product_id: String,
    /// Signed delta as supplied; the store normalizes it with
    /// [`AdjustmentType::signed_delta`].
    pub quantity: f64,
    pub adjustment_type: AdjustmentType,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockAdjustment {
    /// Builds a new adjustment with a fresh id and the current timestamp.
    pub fn new(
        product_id: impl Into<String>,
        quantity: f64,
        adjustment_type: AdjustmentType,
        reason: Option<String>,
    ) -> Self {
        StockAdjustment {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: product_id.into(),
            quantity,
            adjustment_type,
            reason,
            created_at: Utc::now(),
        }
    }

    /// The delta that actually lands in the ledger.
    pub fn effective_delta(&self) -> f64 {
        self.adjustment_type.signed_delta(self.quantity)
    }
}

// =============================================================================
// Dish
// =============================================================================

/// A menu item with a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Dish {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub category: Option<String>,
    pub price: Money,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// Recipe lines. Loaded separately from the dish row.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub ingredients: Vec<DishIngredient>,
}

/// Dish → Product link with the quantity consumed per dish sold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DishIngredient {
    pub id: String,
    pub dish_id: String,
    pub product_id: String,
    pub quantity: f64,
}

// =============================================================================
// Sale
// =============================================================================

/// How the order leaves the kitchen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Delivery,
    Takeaway,
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::DineIn
    }
}

/// Payment method recorded on the sale. Settlement happens elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Stripe,
    OmisePromptpay,
    Sumup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

/// A customer order.
///
/// ## Two Status Tracks
/// ```text
/// status (kitchen):   pending ──► preparing ──► ready ──► delivered
/// delivery_status:    null|pending_pickup ──► in_transit ──► delivered
/// ```
/// `delivery_status` only carries meaning when `order_type` is delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub restaurant_id: String,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// Sum of item totals, written by the stock-checked item insert.
    pub total_amount: Money,
    pub status: KitchenStatus,
    pub order_type: OrderType,
    pub delivery_status: Option<DeliveryStatus>,
    pub assigned_driver_id: Option<String>,
    pub table_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_fee: Money,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<SaleItem>,
}

impl Sale {
    /// Delivery status with null read as `pending_pickup`.
    #[inline]
    pub fn effective_delivery_status(&self) -> DeliveryStatus {
        DeliveryStatus::effective(self.delivery_status)
    }

    #[inline]
    pub fn is_delivery(&self) -> bool {
        self.order_type == OrderType::Delivery
    }

    /// Total number of dishes across all lines.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// One line of a sale with its captured unit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub dish_id: String,
    /// Joined from the dish for kitchen tickets.
    pub dish_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

/// Header fields for a new sale. Kitchen status, delivery status and total
/// are set by the store (`pending`, null, 0).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    pub restaurant_id: String,
    pub order_type: OrderType,
    pub table_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_fee: Money,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
}

impl NewSale {
    /// A dine-in sale with no contact or payment details.
    pub fn for_restaurant(restaurant_id: impl Into<String>) -> Self {
        NewSale {
            restaurant_id: restaurant_id.into(),
            ..Default::default()
        }
    }
}

/// A requested line for the stock-checked item insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub dish_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl SaleLine {
    #[inline]
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order Queries
// =============================================================================

/// Filter for the order boards.
///
/// `delivery_status_not` treats a null delivery status as `pending_pickup`,
/// so excluding `delivered` keeps null rows while excluding `pending_pickup`
/// drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderQuery {
    pub restaurant_id: String,
    pub order_type: Option<OrderType>,
    pub status_not: Option<KitchenStatus>,
    pub delivery_status_not: Option<DeliveryStatus>,
    pub assigned_driver_id: Option<String>,
    pub limit: Option<i64>,
}

impl OrderQuery {
    pub fn new(restaurant_id: impl Into<String>) -> Self {
        OrderQuery {
            restaurant_id: restaurant_id.into(),
            order_type: None,
            status_not: None,
            delivery_status_not: None,
            assigned_driver_id: None,
            limit: None,
        }
    }

    /// Kitchen board: every order not yet handed over.
    pub fn kitchen(restaurant_id: impl Into<String>) -> Self {
        Self::new(restaurant_id).status_not(KitchenStatus::Delivered)
    }

    /// Dispatcher board: delivery orders not yet delivered.
    pub fn deliveries(restaurant_id: impl Into<String>) -> Self {
        Self::new(restaurant_id)
            .order_type(OrderType::Delivery)
            .delivery_status_not(DeliveryStatus::Delivered)
    }

    /// Driver board: the driver's own undelivered orders.
    pub fn driver(restaurant_id: impl Into<String>, driver_id: impl Into<String>) -> Self {
        Self::deliveries(restaurant_id).assigned_to(driver_id)
    }

    pub fn order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    pub fn status_not(mut self, status: KitchenStatus) -> Self {
        self.status_not = Some(status);
        self
    }

    pub fn delivery_status_not(mut self, status: DeliveryStatus) -> Self {
        self.delivery_status_not = Some(status);
        self
    }

    pub fn assigned_to(mut self, driver_id: impl Into<String>) -> Self {
        self.assigned_driver_id = Some(driver_id.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluates the filter in memory, with the same null handling as the store.
    pub fn matches(&self, sale: &Sale) -> bool {
        if sale.restaurant_id != self.restaurant_id {
            return false;
        }
        if let Some(order_type) = self.order_type {
            if sale.order_type != order_type {
                return false;
            }
        }
        if let Some(status) = self.status_not {
            if sale.status == status {
                return false;
            }
        }
        if let Some(delivery) = self.delivery_status_not {
            if sale.effective_delivery_status() == delivery {
                return false;
            }
        }
        if let Some(driver) = &self.assigned_driver_id {
            if sale.assigned_driver_id.as_deref() != Some(driver.as_str()) {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Reporting
// =============================================================================

/// Sales aggregate for one calendar day, shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailySummary {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub revenue: Money,
    pub sales_count: i64,
    pub items_count: i64,
}

/// Portions sold and revenue for one dish over a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DishSales {
    pub dish_id: String,
    pub dish_name: String,
    pub quantity: i64,
    pub revenue: Money,
}

/// Stock drawn by the day's sales for one product, in its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductConsumption {
    pub product_id: String,
    pub product_name: String,
    pub unit: String,
    pub quantity: f64,
}

// =============================================================================
// Unit Tests
// =============================================================================
