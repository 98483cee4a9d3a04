//! In-memory store and alert player for workflow and board tests. Both can
//! be told to fail.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use bistro_core::{
    DailySummary, DeliveryStatus, DishSales, KitchenStatus, Money, NewSale, OrderQuery, OrderType, PaymentStatus,
    ProductConsumption, RestaurantMember, Sale, SaleItem, SaleLine, StockAdjustment, StockRow,
    ToneProfile,
};

use crate::alerts::AlertPlayer;
use crate::error::{LedgerError, LedgerResult, PlaybackError};
use crate::ledger::{DriverDirectory, OrderSource, StockLedger};

#[derive(Default)]
struct FakeState {
    sales: Vec<Sale>,
    item_error: Option<LedgerError>,
    delete_error: Option<LedgerError>,
    status_error: Option<LedgerError>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<FakeState>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn fail_item_inserts(&self, err: LedgerError) {
        self.lock().item_error = Some(err);
    }

    pub fn fail_deletes(&self, err: LedgerError) {
        self.lock().delete_error = Some(err);
    }

    pub fn fail_status_writes(&self, err: LedgerError) {
        self.lock().status_error = Some(err);
    }

    pub fn insert(&self, sale: Sale) {
        self.lock().sales.push(sale);
    }

    pub fn sales(&self) -> Vec<Sale> {
        self.lock().sales.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }
}

/// A bare sale header for seeding the fake.
pub fn sale(id: &str, restaurant_id: &str, order_type: OrderType) -> Sale {
    Sale {
        id: id.to_string(),
        restaurant_id: restaurant_id.to_string(),
        sale_date: Utc::now(),
        created_at: Utc::now(),
        total_amount: Money::zero(),
        status: KitchenStatus::Pending,
        order_type,
        delivery_status: None,
        assigned_driver_id: None,
        table_number: None,
        customer_name: None,
        customer_phone: None,
        delivery_address: None,
        delivery_fee: Money::zero(),
        payment_method: None,
        payment_status: PaymentStatus::Pending,
        items: vec![],
    }
}

#[async_trait]
impl StockLedger for FakeStore {
    async fn create_sale(&self, new_sale: &NewSale) -> LedgerResult<Sale> {
        let mut state = self.lock();
        state.calls.push("create_sale".into());
        let mut header = sale(
            &format!("sale-{}", state.sales.len() + 1),
            &new_sale.restaurant_id,
            new_sale.order_type,
        );
        header.table_number = new_sale.table_number.clone();
        header.customer_name = new_sale.customer_name.clone();
        header.delivery_address = new_sale.delivery_address.clone();
        header.payment_method = new_sale.payment_method;
        state.sales.push(header.clone());
        Ok(header)
    }

    async fn insert_sale_items(&self, sale_id: &str, lines: &[SaleLine]) -> LedgerResult<Vec<SaleItem>> {
        let mut state = self.lock();
        state.calls.push("insert_sale_items".into());
        if let Some(err) = state.item_error.clone() {
            return Err(err);
        }
        let items: Vec<SaleItem> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| SaleItem {
                id: format!("{sale_id}-item-{i}"),
                sale_id: sale_id.to_string(),
                dish_id: line.dish_id.clone(),
                dish_name: line.dish_id.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.total_price(),
            })
            .collect();
        let sale = state
            .sales
            .iter_mut()
            .find(|s| s.id == sale_id)
            .ok_or_else(|| LedgerError::NotFound {
                entity: "Sale".into(),
                id: sale_id.into(),
            })?;
        sale.total_amount += items.iter().map(|i| i.total_price).sum::<Money>();
        sale.items.extend(items.iter().cloned());
        Ok(items)
    }

    async fn delete_sale(&self, sale_id: &str) -> LedgerResult<()> {
        let mut state = self.lock();
        state.calls.push("delete_sale".into());
        if let Some(err) = state.delete_error.clone() {
            return Err(err);
        }
        state.sales.retain(|s| s.id != sale_id);
        Ok(())
    }

    async fn fetch_sale(&self, sale_id: &str) -> LedgerResult<Option<Sale>> {
        let mut state = self.lock();
        state.calls.push("fetch_sale".into());
        Ok(state.sales.iter().find(|s| s.id == sale_id).cloned())
    }

    async fn current_stock(&self, _restaurant_id: &str) -> LedgerResult<Vec<StockRow>> {
        Ok(vec![])
    }

    async fn adjust_stock(&self, _adjustment: &StockAdjustment) -> LedgerResult<()> {
        Ok(())
    }

    async fn daily_summary(&self, restaurant_id: &str, date: NaiveDate) -> LedgerResult<DailySummary> {
        let state = self.lock();
        let day: Vec<&Sale> = state
            .sales
            .iter()
            .filter(|s| s.restaurant_id == restaurant_id && s.sale_date.date_naive() == date)
            .collect();
        Ok(DailySummary {
            date,
            revenue: day.iter().map(|s| s.total_amount).sum(),
            sales_count: day.len() as i64,
            items_count: day.iter().map(|s| s.item_count()).sum(),
        })
    }

    /// Grouped by dish id; the fake has no dish names beyond the id.
    async fn dish_sales(&self, restaurant_id: &str, date: NaiveDate) -> LedgerResult<Vec<DishSales>> {
        let state = self.lock();
        let mut dishes: Vec<DishSales> = Vec::new();
        let items = state
            .sales
            .iter()
            .filter(|s| s.restaurant_id == restaurant_id && s.sale_date.date_naive() == date)
            .flat_map(|s| s.items.iter());
        for item in items {
            match dishes.iter_mut().find(|d| d.dish_id == item.dish_id) {
                Some(dish) => {
                    dish.quantity += item.quantity;
                    dish.revenue += item.total_price;
                }
                None => dishes.push(DishSales {
                    dish_id: item.dish_id.clone(),
                    dish_name: item.dish_name.clone(),
                    quantity: item.quantity,
                    revenue: item.total_price,
                }),
            }
        }
        dishes.sort_by(|a, b| b.revenue.cmp(&a.revenue));
        Ok(dishes)
    }

    async fn top_dishes(&self, restaurant_id: &str, date: NaiveDate, limit: u32) -> LedgerResult<Vec<DishSales>> {
        let mut dishes = self.dish_sales(restaurant_id, date).await?;
        dishes.sort_by(|a, b| b.quantity.cmp(&a.quantity));
        dishes.truncate(limit as usize);
        Ok(dishes)
    }

    /// No recipes in the fake, so nothing is consumed.
    async fn product_consumption(
        &self,
        _restaurant_id: &str,
        _date: NaiveDate,
    ) -> LedgerResult<Vec<ProductConsumption>> {
        Ok(vec![])
    }
}

#[async_trait]
impl OrderSource for FakeStore {
    async fn list_orders(&self, query: &OrderQuery) -> LedgerResult<Vec<Sale>> {
        let mut state = self.lock();
        state.calls.push("list_orders".into());
        Ok(state.sales.iter().filter(|s| query.matches(s)).cloned().collect())
    }

    async fn set_kitchen_status(
        &self,
        sale_id: &str,
        to: KitchenStatus,
        expected: Option<KitchenStatus>,
    ) -> LedgerResult<bool> {
        let mut state = self.lock();
        state.calls.push(format!("set_kitchen_status:{to}"));
        if let Some(err) = state.status_error.clone() {
            return Err(err);
        }
        let sale = find_mut(&mut state.sales, sale_id)?;
        if expected.is_some_and(|e| e != sale.status) {
            return Ok(false);
        }
        sale.status = to;
        Ok(true)
    }

    async fn set_delivery_status(
        &self,
        sale_id: &str,
        to: DeliveryStatus,
        expected: Option<DeliveryStatus>,
    ) -> LedgerResult<bool> {
        let mut state = self.lock();
        state.calls.push(format!("set_delivery_status:{to}"));
        if let Some(err) = state.status_error.clone() {
            return Err(err);
        }
        let sale = find_mut(&mut state.sales, sale_id)?;
        if expected.is_some_and(|e| e != sale.effective_delivery_status()) {
            return Ok(false);
        }
        sale.delivery_status = Some(to);
        Ok(true)
    }

    async fn assign_driver(&self, sale_id: &str, driver_id: Option<&str>) -> LedgerResult<()> {
        let mut state = self.lock();
        state.calls.push("assign_driver".into());
        if let Some(err) = state.status_error.clone() {
            return Err(err);
        }
        find_mut(&mut state.sales, sale_id)?.assigned_driver_id = driver_id.map(str::to_string);
        Ok(())
    }
}

#[async_trait]
impl DriverDirectory for FakeStore {
    async fn drivers(&self, _restaurant_id: &str) -> LedgerResult<Vec<RestaurantMember>> {
        Ok(vec![])
    }
}

fn find_mut<'a>(sales: &'a mut [Sale], sale_id: &str) -> LedgerResult<&'a mut Sale> {
    sales
        .iter_mut()
        .find(|s| s.id == sale_id)
        .ok_or_else(|| LedgerError::NotFound {
            entity: "Sale".into(),
            id: sale_id.into(),
        })
}

/// Counts beeps and primes.
#[derive(Default)]
pub struct CountingPlayer {
    pub plays: AtomicUsize,
    pub primes: AtomicUsize,
    fail: bool,
}

impl CountingPlayer {
    /// Every beep is counted, then fails.
    pub fn failing() -> Self {
        CountingPlayer {
            fail: true,
            ..Default::default()
        }
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertPlayer for CountingPlayer {
    async fn prime(&self, _volume: f32) -> Result<(), PlaybackError> {
        self.primes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn play(&self, _tone: &ToneProfile, wav: &[u8]) -> Result<(), PlaybackError> {
        assert_eq!(&wav[..4], b"RIFF");
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PlaybackError::Locked);
        }
        Ok(())
    }
}
