//! # Sale Submission
//!
//! Turns a cart into a persisted sale.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SaleWorkflow::submit                             │
//! │                                                                         │
//! │  Building ──► Submitting                                               │
//! │                  │                                                      │
//! │                  ├─ empty cart / bad line ────────────► Failed         │
//! │                  │      (no store call)                                 │
//! │                  ▼                                                      │
//! │            create_sale (header)                                        │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │            insert_sale_items ── Err ──► delete_sale (compensate)       │
//! │                  │                          │                           │
//! │                  │                          ▼                           │
//! │                  │                shortage? ──► InsufficientStock      │
//! │                  │                          └──► Failed                 │
//! │                  ▼                                                      │
//! │            fetch_sale, invalidate caches ──► Committed                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two writes are separate store calls, so a failed item insert leaves a
//! header behind until the compensating delete removes it. Steps run strictly
//! in sequence.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use bistro_core::validation::validate_sale_lines;
use bistro_core::{Money, NewSale, OrderType, PaymentMethod, PaymentStatus, Sale, SaleLine, StockShortage};

use crate::cache::{keys, QueryCache};
use crate::cart::CartState;
use crate::error::{LedgerError, Notice, SaleError};
use crate::ledger::StockLedger;
use crate::prefs::SessionContext;

// =============================================================================
// Draft
// =============================================================================

/// Everything about a sale except its lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleDraft {
    pub order_type: OrderType,
    pub table_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_fee: Money,
    pub payment_method: Option<PaymentMethod>,
}

impl SaleDraft {
    pub fn dine_in(table_number: impl Into<String>) -> Self {
        SaleDraft {
            order_type: OrderType::DineIn,
            table_number: Some(table_number.into()),
            ..Default::default()
        }
    }

    pub fn delivery(
        customer_name: impl Into<String>,
        customer_phone: impl Into<String>,
        delivery_address: impl Into<String>,
    ) -> Self {
        SaleDraft {
            order_type: OrderType::Delivery,
            customer_name: Some(customer_name.into()),
            customer_phone: Some(customer_phone.into()),
            delivery_address: Some(delivery_address.into()),
            ..Default::default()
        }
    }

    pub fn payment(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn into_new_sale(self, restaurant_id: impl Into<String>) -> NewSale {
        NewSale {
            restaurant_id: restaurant_id.into(),
            order_type: self.order_type,
            table_number: self.table_number,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            delivery_address: self.delivery_address,
            delivery_fee: self.delivery_fee,
            payment_method: self.payment_method,
            payment_status: PaymentStatus::Pending,
        }
    }
}

// =============================================================================
// Phase & Outcome
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SubmissionPhase {
    Building,
    Submitting,
    Committed { sale_id: String },
    InsufficientStock { shortage: StockShortage },
    Failed { message: String },
}

impl SubmissionPhase {
    fn from_error(err: &SaleError) -> Self {
        match err {
            SaleError::InsufficientStock { product_id, missing } => SubmissionPhase::InsufficientStock {
                shortage: StockShortage::new(product_id.clone(), *missing),
            },
            other => SubmissionPhase::Failed {
                message: other.to_string(),
            },
        }
    }
}

/// What [`SaleWorkflow::checkout`] hands back to the counter screen.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub phase: SubmissionPhase,
    pub sale: Option<Sale>,
    pub notice: Notice,
}

/// Header written, items not. Only ever logged.
#[derive(Debug, Error)]
#[error("Sale {sale_id} header written but items failed: {source}")]
struct PartialWrite {
    sale_id: String,
    source: LedgerError,
}

// =============================================================================
// Workflow
// =============================================================================

/// Sale submission for one station.
pub struct SaleWorkflow {
    ledger: Arc<dyn StockLedger>,
    cache: QueryCache,
    cart: CartState,
    session: SessionContext,
    phase: Mutex<SubmissionPhase>,
}

impl SaleWorkflow {
    pub fn new(ledger: Arc<dyn StockLedger>, cache: QueryCache, cart: CartState, session: SessionContext) -> Self {
        SaleWorkflow {
            ledger,
            cache,
            cart,
            session,
            phase: Mutex::new(SubmissionPhase::Building),
        }
    }

    pub fn cart(&self) -> &CartState {
        &self.cart
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_phase(&self, phase: SubmissionPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Persists a sale from `lines`. Does not touch the cart.
    pub async fn submit(&self, draft: SaleDraft, lines: &[SaleLine]) -> Result<Sale, SaleError> {
        self.set_phase(SubmissionPhase::Submitting);
        let result = self.submit_inner(draft, lines).await;
        self.set_phase(match &result {
            Ok(sale) => SubmissionPhase::Committed {
                sale_id: sale.id.clone(),
            },
            Err(e) => SubmissionPhase::from_error(e),
        });
        result
    }

    async fn submit_inner(&self, draft: SaleDraft, lines: &[SaleLine]) -> Result<Sale, SaleError> {
        if lines.is_empty() {
            return Err(SaleError::EmptyCart);
        }
        validate_sale_lines(lines)?;

        let restaurant_id = self.session.restaurant_id.clone();
        let header = self
            .ledger
            .create_sale(&draft.into_new_sale(&restaurant_id))
            .await
            .map_err(SaleError::from_ledger)?;
        debug!(sale_id = %header.id, lines = lines.len(), "Sale header created");

        let items = match self.ledger.insert_sale_items(&header.id, lines).await {
            Ok(items) => items,
            Err(source) => {
                let partial = PartialWrite {
                    sale_id: header.id.clone(),
                    source,
                };
                warn!(error = %partial, "Compensating partial sale");
                if let Err(delete_err) = self.ledger.delete_sale(&header.id).await {
                    error!(
                        sale_id = %header.id,
                        error = %delete_err,
                        "Compensating delete failed, orphan sale header left behind"
                    );
                }
                return Err(SaleError::from_ledger(partial.source));
            }
        };

        let sale = match self.ledger.fetch_sale(&header.id).await {
            Ok(Some(sale)) => sale,
            Ok(None) | Err(_) => {
                warn!(sale_id = %header.id, "Could not refetch committed sale, using local copy");
                let total = items.iter().map(|i| i.total_price).sum();
                Sale {
                    total_amount: total,
                    items,
                    ..header
                }
            }
        };

        for key in [
            keys::SALES,
            keys::STOCK,
            keys::DASHBOARD,
            keys::KITCHEN_ORDERS,
            keys::DELIVERY_ORDERS,
        ] {
            self.cache.invalidate(key);
        }

        info!(
            sale_id = %sale.id,
            restaurant_id = %restaurant_id,
            total = %sale.total_amount,
            "Sale committed"
        );
        Ok(sale)
    }

    /// Submits the current cart. The cart is cleared only on success; a
    /// stock shortage or any failure leaves it as it was.
    pub async fn checkout(&self, draft: SaleDraft) -> SubmitOutcome {
        let lines = self.cart.snapshot().to_sale_lines();

        match self.submit(draft, &lines).await {
            Ok(sale) => {
                self.cart.clear();
                SubmitOutcome {
                    phase: self.phase(),
                    notice: Notice::success(format!("Sale recorded: {}", sale.total_amount)),
                    sale: Some(sale),
                }
            }
            Err(err) => {
                if err.is_stock_shortage() {
                    warn!(error = %err, "Sale rejected for stock");
                } else {
                    warn!(error = %err, "Sale failed");
                }
                SubmitOutcome {
                    phase: self.phase(),
                    sale: None,
                    notice: err.notice(),
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeStore;
    use bistro_db::demo::{self, DemoIds};
    use bistro_db::{Database, DbConfig};

    fn line(dish_id: &str, quantity: i64) -> SaleLine {
        SaleLine {
            dish_id: dish_id.to_string(),
            quantity,
            unit_price: Money::from_cents(12000),
        }
    }

    fn workflow(ledger: Arc<dyn StockLedger>, cache: QueryCache) -> SaleWorkflow {
        SaleWorkflow::new(ledger, cache, CartState::new(), SessionContext::new("r1"))
    }

    #[tokio::test]
    async fn test_empty_cart_makes_no_store_call() {
        let store = Arc::new(FakeStore::new());
        let wf = workflow(store.clone(), QueryCache::new());

        let err = wf.submit(SaleDraft::default(), &[]).await.unwrap_err();
        assert!(matches!(err, SaleError::EmptyCart));

        let err = wf.submit(SaleDraft::default(), &[line("d", 0)]).await.unwrap_err();
        assert!(matches!(err, SaleError::Invalid(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_items_delete_the_header() {
        let store = Arc::new(FakeStore::new());
        store.fail_item_inserts(LedgerError::Backend("disk I/O error".into()));
        let wf = workflow(store.clone(), QueryCache::new());

        let err = wf.submit(SaleDraft::default(), &[line("d", 1)]).await.unwrap_err();

        assert!(matches!(err, SaleError::Failed { ref message } if message == "disk I/O error"));
        assert!(store.sales().is_empty());
        assert_eq!(store.calls(), vec!["create_sale", "insert_sale_items", "delete_sale"]);
        assert!(matches!(wf.phase(), SubmissionPhase::Failed { .. }));
    }

    #[tokio::test]
    async fn test_failed_compensation_still_reports_item_error() {
        let store = Arc::new(FakeStore::new());
        store.fail_item_inserts(LedgerError::Backend(
            "INSUFFICIENT_STOCK: product beef-01 (missing 0.5)".into(),
        ));
        store.fail_deletes(LedgerError::Unavailable("gone".into()));
        let wf = workflow(store.clone(), QueryCache::new());

        let err = wf.submit(SaleDraft::default(), &[line("d", 1)]).await.unwrap_err();
        assert!(matches!(
            err,
            SaleError::InsufficientStock { ref product_id, missing } if product_id == "beef-01" && missing == 0.5
        ));
        // orphan header stays, the caller still sees the shortage
        assert_eq!(store.sales().len(), 1);
    }

    #[tokio::test]
    async fn test_success_invalidates_caches() {
        let store = Arc::new(FakeStore::new());
        let cache = QueryCache::new();
        cache.set("sales", 1u8);
        cache.set("kitchen-orders/r1", 1u8);
        let wf = workflow(store.clone(), cache.clone());

        let sale = wf
            .submit(SaleDraft::dine_in("4"), &[line("d", 2)])
            .await
            .unwrap();

        assert_eq!(sale.total_amount, Money::from_cents(24000));
        assert_eq!(sale.table_number.as_deref(), Some("4"));
        assert!(cache.is_stale("sales"));
        assert!(cache.is_stale("kitchen-orders/r1"));
        assert_eq!(wf.phase(), SubmissionPhase::Committed { sale_id: sale.id });
    }

    async fn demo_workflow() -> (Database, DemoIds, SaleWorkflow) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();
        let wf = SaleWorkflow::new(
            Arc::new(db.clone()),
            QueryCache::new(),
            CartState::new(),
            SessionContext::new(ids.restaurant_id.clone()),
        );
        (db, ids, wf)
    }

    #[tokio::test]
    async fn test_pad_thai_shortage_keeps_cart() {
        let (db, ids, wf) = demo_workflow().await;
        let pad_thai = db.dishes().get_by_id(&ids.pad_thai_id).await.unwrap().unwrap();
        wf.cart().with(|c| c.add(&pad_thai, 2)).unwrap();

        let outcome = wf.checkout(SaleDraft::dine_in("7")).await;

        match &outcome.notice {
            Notice::StockWarning { product_id, missing, .. } => {
                assert_eq!(product_id, &ids.noodles_id);
                assert!((missing - 0.2).abs() < 1e-6);
            }
            other => panic!("expected stock warning, got {other:?}"),
        }
        assert!(outcome.sale.is_none());
        assert!(matches!(outcome.phase, SubmissionPhase::InsufficientStock { .. }));
        assert_eq!(wf.cart().snapshot().item_count(), 2);

        // header was compensated
        let sales = db.sales().list(&bistro_core::OrderQuery::new(&ids.restaurant_id)).await.unwrap();
        assert!(sales.is_empty());
        let noodles = db.stock().quantity_of(&ids.noodles_id).await.unwrap();
        assert!((noodles - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_checkout_commits_and_clears_cart() {
        let (db, ids, wf) = demo_workflow().await;
        let pad_thai = db.dishes().get_by_id(&ids.pad_thai_id).await.unwrap().unwrap();
        wf.cart().with(|c| c.add(&pad_thai, 1)).unwrap();

        let outcome = wf.checkout(SaleDraft::dine_in("7")).await;

        let sale = outcome.sale.expect("sale committed");
        assert!(matches!(outcome.notice, Notice::Success { .. }));
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].dish_name, "Pad Thai");
        assert_eq!(sale.total_amount, Money::from_cents(12000));
        assert!(wf.cart().snapshot().is_empty());
    }
}
