//! # Daily Dashboard
//!
//! Today's takings, the best-selling dishes and the products running low.
//! Everything is cached and goes stale whenever a sale commits or stock
//! moves.
//!
//! ```text
//! dashboard/{restaurant}/{day}               DailySummary
//! dashboard/{restaurant}/{day}/dishes        Vec<DishSales>
//! dashboard/{restaurant}/{day}/top/{n}       Vec<DishSales>
//! dashboard/{restaurant}/{day}/consumption   Vec<ProductConsumption>
//! stock/{restaurant}                         Vec<StockRow>
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use bistro_core::{DailySummary, DishSales, ProductConsumption, StockAdjustment, StockRow};

use crate::cache::{keys, OptimisticMutation, Patch, QueryCache};
use crate::error::OrdersResult;
use crate::ledger::StockLedger;
use crate::prefs::SessionContext;

/// Dishes listed in [`DashboardView::top_dishes`].
pub const TOP_DISHES_SHOWN: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub summary: DailySummary,
    pub top_dishes: Vec<DishSales>,
    /// Products below their reorder level.
    pub low_stock: Vec<StockRow>,
}

pub struct Dashboard {
    ledger: Arc<dyn StockLedger>,
    cache: QueryCache,
    session: SessionContext,
}

impl Dashboard {
    pub fn new(ledger: Arc<dyn StockLedger>, cache: QueryCache, session: SessionContext) -> Self {
        Dashboard { ledger, cache, session }
    }

    fn stock_key(&self) -> String {
        keys::scoped(keys::STOCK, &[self.session.restaurant_id.as_str()])
    }

    /// Current stock, products needing reorder first.
    pub async fn stock(&self) -> OrdersResult<Vec<StockRow>> {
        let rid = self.session.restaurant_id.as_str();
        Ok(self
            .cache
            .fetch(&self.stock_key(), || self.ledger.current_stock(rid))
            .await?)
    }

    pub async fn low_stock(&self) -> OrdersResult<Vec<StockRow>> {
        Ok(self.stock().await?.into_iter().filter(|row| row.needs_reorder).collect())
    }

    fn day_key(&self, date: NaiveDate, report: &[&str]) -> String {
        let day = date.to_string();
        let mut parts = vec![self.session.restaurant_id.as_str(), day.as_str()];
        parts.extend_from_slice(report);
        keys::scoped(keys::DASHBOARD, &parts)
    }

    /// Sales aggregate for `date` (UTC day).
    pub async fn summary(&self, date: NaiveDate) -> OrdersResult<DailySummary> {
        let rid = self.session.restaurant_id.as_str();
        Ok(self
            .cache
            .fetch(&self.day_key(date, &[]), || self.ledger.daily_summary(rid, date))
            .await?)
    }

    /// Every dish sold on `date`, best earners first.
    pub async fn dish_sales(&self, date: NaiveDate) -> OrdersResult<Vec<DishSales>> {
        let rid = self.session.restaurant_id.as_str();
        Ok(self
            .cache
            .fetch(&self.day_key(date, &["dishes"]), || self.ledger.dish_sales(rid, date))
            .await?)
    }

    pub async fn top_dishes(&self, date: NaiveDate, limit: u32) -> OrdersResult<Vec<DishSales>> {
        let rid = self.session.restaurant_id.as_str();
        let n = limit.to_string();
        Ok(self
            .cache
            .fetch(&self.day_key(date, &["top", n.as_str()]), || {
                self.ledger.top_dishes(rid, date, limit)
            })
            .await?)
    }

    /// Ingredients the day's sales drew from stock.
    pub async fn product_consumption(&self, date: NaiveDate) -> OrdersResult<Vec<ProductConsumption>> {
        let rid = self.session.restaurant_id.as_str();
        Ok(self
            .cache
            .fetch(&self.day_key(date, &["consumption"]), || {
                self.ledger.product_consumption(rid, date)
            })
            .await?)
    }

    pub async fn today(&self) -> OrdersResult<DashboardView> {
        let date = Utc::now().date_naive();
        let summary = self.summary(date).await?;
        let top_dishes = self.top_dishes(date, TOP_DISHES_SHOWN).await?;
        let low_stock = self.low_stock().await?;
        Ok(DashboardView {
            summary,
            top_dishes,
            low_stock,
        })
    }

    /// Records a manual stock movement. The stock list shows the new level
    /// before the store confirms it.
    pub async fn adjust_stock(&self, adjustment: StockAdjustment) -> OrdersResult<()> {
        let delta = adjustment.effective_delta();
        let patch = Patch::update(adjustment.product_id.clone(), move |row: &mut StockRow| {
            row.current_quantity += delta;
            row.needs_reorder = row.current_quantity < row.reorder_level;
        });

        OptimisticMutation::new(self.stock_key(), patch)
            .invalidates(keys::DASHBOARD)
            .run(&self.cache, self.ledger.adjust_stock(&adjustment))
            .await?;

        info!(
            product_id = %adjustment.product_id,
            kind = ?adjustment.adjustment_type,
            delta,
            "Stock adjusted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bistro_core::{AdjustmentType, Money, SaleLine};
    use bistro_db::demo;
    use bistro_db::{Database, DbConfig};

    use crate::cart::CartState;
    use crate::workflow::{SaleDraft, SaleWorkflow};

    #[tokio::test]
    async fn test_low_stock_and_adjustment() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();
        let dashboard = Dashboard::new(
            Arc::new(db),
            QueryCache::new(),
            SessionContext::new(ids.restaurant_id.clone()),
        );

        let low = dashboard.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_id, ids.noodles_id);

        dashboard
            .adjust_stock(StockAdjustment::new(&ids.noodles_id, 1.0, AdjustmentType::Correction, None))
            .await
            .unwrap();
        assert!(dashboard.low_stock().await.unwrap().is_empty());

        // waste is a decrement whatever the sign
        dashboard
            .adjust_stock(StockAdjustment::new(&ids.shrimp_id, 1.8, AdjustmentType::Waste, Some("freezer".into())))
            .await
            .unwrap();
        let low = dashboard.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_id, ids.shrimp_id);
    }

    #[tokio::test]
    async fn test_summary_goes_stale_on_sale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();
        let session = SessionContext::new(ids.restaurant_id.clone());
        let cache = QueryCache::new();
        let ledger: Arc<dyn StockLedger> = Arc::new(db);
        let dashboard = Dashboard::new(ledger.clone(), cache.clone(), session.clone());

        assert_eq!(dashboard.today().await.unwrap().summary.sales_count, 0);

        let workflow = SaleWorkflow::new(ledger, cache, CartState::new(), session);
        workflow
            .submit(
                SaleDraft::dine_in("2"),
                &[SaleLine {
                    dish_id: ids.spring_rolls_id.clone(),
                    quantity: 3,
                    unit_price: Money::from_cents(8000),
                }],
            )
            .await
            .unwrap();

        let view = dashboard.today().await.unwrap();
        assert_eq!(view.summary.sales_count, 1);
        assert_eq!(view.summary.items_count, 3);
        assert_eq!(view.summary.revenue, Money::from_cents(24000));
        assert_eq!(view.top_dishes.len(), 1);
        assert_eq!(view.top_dishes[0].dish_name, "Spring Rolls");
    }

    #[tokio::test]
    async fn test_dish_and_consumption_reports() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();
        let session = SessionContext::new(ids.restaurant_id.clone());
        let cache = QueryCache::new();
        let ledger: Arc<dyn StockLedger> = Arc::new(db);
        let dashboard = Dashboard::new(ledger.clone(), cache.clone(), session.clone());
        let today = Utc::now().date_naive();

        assert!(dashboard.dish_sales(today).await.unwrap().is_empty());

        let workflow = SaleWorkflow::new(ledger, cache, CartState::new(), session);
        workflow
            .submit(
                SaleDraft::dine_in("4"),
                &[
                    SaleLine {
                        dish_id: ids.pad_thai_id.clone(),
                        quantity: 1,
                        unit_price: Money::from_cents(12000),
                    },
                    SaleLine {
                        dish_id: ids.spring_rolls_id.clone(),
                        quantity: 2,
                        unit_price: Money::from_cents(8000),
                    },
                ],
            )
            .await
            .unwrap();

        // the committed sale invalidated the cached empty list
        let dishes = dashboard.dish_sales(today).await.unwrap();
        assert_eq!(dishes.len(), 2);
        assert_eq!(dishes[0].dish_id, ids.spring_rolls_id);
        assert_eq!(dishes[0].revenue, Money::from_cents(16000));

        let top = dashboard.top_dishes(today, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].quantity, 2);

        let used = dashboard.product_consumption(today).await.unwrap();
        assert_eq!(used.len(), 3);
        assert_eq!(used[0].product_id, ids.rice_paper_id);
        assert!((used[0].quantity - 8.0).abs() < 1e-9);
        let noodles = used.iter().find(|p| p.product_id == ids.noodles_id).unwrap();
        assert!((noodles.quantity - 0.3).abs() < 1e-9);
    }
}
