//! # Order Boards
//!
//! Kitchen, dispatcher and driver views over the shared order list, and the
//! poller that keeps them fresh.
//!
//! ## Views
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  KitchenBoard     status != delivered                                  │
//! │                   ┌──────────┐ ┌───────────┐ ┌──────────┐              │
//! │                   │ pending  │ │ preparing │ │  ready   │              │
//! │                   └──────────┘ └───────────┘ └──────────┘              │
//! │                   alert: pending count                                 │
//! │                                                                         │
//! │  DispatchBoard    order_type = delivery, delivery_status != delivered  │
//! │                   ┌────────────────────────┐ ┌────────────┐            │
//! │                   │ pending_pickup (+null) │ │ in_transit │            │
//! │                   └────────────────────────┘ └────────────┘            │
//! │                   alert: pending_pickup count                          │
//! │                                                                         │
//! │  DriverBoard      DispatchBoard ∩ assigned_driver_id = me              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Refreshes always go to the store. Every status write is an optimistic
//! mutation with a compare-and-swap on the status the board last saw; a
//! lost race surfaces as [`OrdersError::Conflict`] and the board rolls back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use bistro_core::status::{authorize_delivery, authorize_kitchen, check_driver_assignment};
use bistro_core::{Actor, DeliveryStatus, KitchenStatus, OrderQuery, RestaurantMember, Sale};

use crate::alerts::AlertCoordinator;
use crate::cache::{keys, OptimisticMutation, Patch, PatchFn, QueryCache};
use crate::error::{OrdersError, OrdersResult};
use crate::ledger::{DriverDirectory, OrderSource};
use crate::prefs::SessionContext;

/// Feeds the alert badge, but only with a list the cache accepted. A list
/// overtaken by a mutation may still show orders that already moved.
async fn observe_if_current(alerts: Option<&AlertCoordinator>, landed: bool, pending: usize) {
    let Some(alerts) = alerts else { return };
    if landed {
        alerts.observe(pending).await;
    } else {
        debug!(context = alerts.context().as_str(), pending, "Superseded refresh, alert count kept");
    }
}

/// Something the poller can refresh.
#[async_trait]
pub trait Board: Send + Sync {
    fn name(&self) -> &'static str;

    /// Refetches from the store. Returns the number of orders shown.
    async fn poll(&self) -> OrdersResult<usize>;
}

// =============================================================================
// Kitchen
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct KitchenColumns {
    pub pending: Vec<Sale>,
    pub preparing: Vec<Sale>,
    pub ready: Vec<Sale>,
}

impl KitchenColumns {
    pub fn from_sales(sales: &[Sale]) -> Self {
        let mut columns = KitchenColumns::default();
        for sale in sales {
            match sale.status {
                KitchenStatus::Pending => columns.pending.push(sale.clone()),
                KitchenStatus::Preparing => columns.preparing.push(sale.clone()),
                KitchenStatus::Ready => columns.ready.push(sale.clone()),
                KitchenStatus::Delivered => {}
            }
        }
        columns
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.preparing.len() + self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct KitchenBoard {
    source: Arc<dyn OrderSource>,
    cache: QueryCache,
    session: SessionContext,
    alerts: Option<Arc<AlertCoordinator>>,
}

impl KitchenBoard {
    pub fn new(source: Arc<dyn OrderSource>, cache: QueryCache, session: SessionContext) -> Self {
        KitchenBoard {
            source,
            cache,
            session,
            alerts: None,
        }
    }

    pub fn with_alerts(mut self, alerts: Arc<AlertCoordinator>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn cache_key(&self) -> String {
        keys::scoped(keys::KITCHEN_ORDERS, &[self.session.restaurant_id.as_str()])
    }

    pub async fn refresh(&self) -> OrdersResult<KitchenColumns> {
        let query = OrderQuery::kitchen(&self.session.restaurant_id);
        let (sales, landed) = self
            .cache
            .refetch_tracked(&self.cache_key(), || self.source.list_orders(&query))
            .await?;

        let columns = KitchenColumns::from_sales(&sales);
        observe_if_current(self.alerts.as_deref(), landed, columns.pending.len()).await;
        debug!(
            pending = columns.pending.len(),
            preparing = columns.preparing.len(),
            ready = columns.ready.len(),
            "Kitchen board refreshed"
        );
        Ok(columns)
    }

    /// Columns from the cache, including optimistic patches.
    pub fn columns(&self) -> KitchenColumns {
        let sales: Vec<Sale> = self.cache.get(&self.cache_key()).unwrap_or_default();
        KitchenColumns::from_sales(&sales)
    }

    /// Moves the order one step along the kitchen track.
    pub async fn advance(&self, sale: &Sale) -> OrdersResult<KitchenStatus> {
        let from = sale.status;
        let to = from.next().unwrap_or(from);
        authorize_kitchen(&Actor::Kitchen, from, to)?;

        let patch: PatchFn<Sale> = if to.is_terminal() {
            Patch::remove(&sale.id)
        } else {
            Patch::update(&sale.id, move |s: &mut Sale| s.status = to)
        };

        let sale_id = sale.id.clone();
        OptimisticMutation::new(self.cache_key(), patch)
            .invalidates(keys::SALES)
            .invalidates(keys::DASHBOARD)
            .run(&self.cache, async {
                match self.source.set_kitchen_status(&sale_id, to, Some(from)).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(OrdersError::Conflict { sale_id: sale_id.clone() }),
                    Err(e) => Err(OrdersError::from(e)),
                }
            })
            .await?;

        info!(sale_id = %sale.id, from = %from, to = %to, "Kitchen status advanced");
        Ok(to)
    }
}

#[async_trait]
impl Board for KitchenBoard {
    fn name(&self) -> &'static str {
        "kitchen"
    }

    async fn poll(&self) -> OrdersResult<usize> {
        Ok(self.refresh().await?.len())
    }
}

// =============================================================================
// Delivery
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchColumns {
    /// Includes orders whose delivery status was never set.
    pub pending_pickup: Vec<Sale>,
    pub in_transit: Vec<Sale>,
}

impl DispatchColumns {
    pub fn from_sales(sales: &[Sale]) -> Self {
        let mut columns = DispatchColumns::default();
        for sale in sales {
            match sale.effective_delivery_status() {
                DeliveryStatus::PendingPickup => columns.pending_pickup.push(sale.clone()),
                DeliveryStatus::InTransit => columns.in_transit.push(sale.clone()),
                DeliveryStatus::Delivered => {}
            }
        }
        columns
    }

    pub fn len(&self) -> usize {
        self.pending_pickup.len() + self.in_transit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn delivery_key(restaurant_id: &str) -> String {
    keys::scoped(keys::DELIVERY_ORDERS, &[restaurant_id])
}

/// Shared by dispatcher and driver: authorize, patch, compare-and-swap.
async fn advance_delivery(
    source: &dyn OrderSource,
    cache: &QueryCache,
    key: String,
    restaurant_id: &str,
    actor: &Actor,
    sale: &Sale,
    to: DeliveryStatus,
) -> OrdersResult<()> {
    authorize_delivery(actor, sale, to)?;
    let from = sale.effective_delivery_status();

    let patch: PatchFn<Sale> = if to.is_terminal() {
        Patch::remove(&sale.id)
    } else {
        Patch::update(&sale.id, move |s: &mut Sale| s.delivery_status = Some(to))
    };

    let sale_id = sale.id.clone();
    OptimisticMutation::new(key, patch)
        .invalidates(delivery_key(restaurant_id))
        .invalidates(keys::SALES)
        .invalidates(keys::DASHBOARD)
        .run(cache, async {
            match source.set_delivery_status(&sale_id, to, Some(from)).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(OrdersError::Conflict { sale_id: sale_id.clone() }),
                Err(e) => Err(OrdersError::from(e)),
            }
        })
        .await?;

    info!(sale_id = %sale.id, actor = %actor, from = %from, to = %to, "Delivery status advanced");
    Ok(())
}

pub struct DispatchBoard {
    source: Arc<dyn OrderSource>,
    directory: Arc<dyn DriverDirectory>,
    cache: QueryCache,
    session: SessionContext,
    alerts: Option<Arc<AlertCoordinator>>,
}

impl DispatchBoard {
    pub fn new(
        source: Arc<dyn OrderSource>,
        directory: Arc<dyn DriverDirectory>,
        cache: QueryCache,
        session: SessionContext,
    ) -> Self {
        DispatchBoard {
            source,
            directory,
            cache,
            session,
            alerts: None,
        }
    }

    pub fn with_alerts(mut self, alerts: Arc<AlertCoordinator>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn cache_key(&self) -> String {
        delivery_key(&self.session.restaurant_id)
    }

    pub async fn refresh(&self) -> OrdersResult<DispatchColumns> {
        let query = OrderQuery::deliveries(&self.session.restaurant_id);
        let (sales, landed) = self
            .cache
            .refetch_tracked(&self.cache_key(), || self.source.list_orders(&query))
            .await?;

        let columns = DispatchColumns::from_sales(&sales);
        observe_if_current(self.alerts.as_deref(), landed, columns.pending_pickup.len()).await;
        debug!(
            pending_pickup = columns.pending_pickup.len(),
            in_transit = columns.in_transit.len(),
            "Dispatch board refreshed"
        );
        Ok(columns)
    }

    pub fn columns(&self) -> DispatchColumns {
        let sales: Vec<Sale> = self.cache.get(&self.cache_key()).unwrap_or_default();
        DispatchColumns::from_sales(&sales)
    }

    /// Any legal next step, on any delivery order.
    pub async fn advance(&self, sale: &Sale, to: DeliveryStatus) -> OrdersResult<()> {
        advance_delivery(
            self.source.as_ref(),
            &self.cache,
            self.cache_key(),
            &self.session.restaurant_id,
            &Actor::Dispatcher,
            sale,
            to,
        )
        .await
    }

    /// Assigns (or clears) the driver. Status is left alone.
    pub async fn assign(&self, sale: &Sale, driver_id: Option<&str>) -> OrdersResult<()> {
        check_driver_assignment(sale)?;

        let assigned = driver_id.map(str::to_string);
        let patched = assigned.clone();
        OptimisticMutation::new(
            self.cache_key(),
            Patch::update(&sale.id, move |s: &mut Sale| s.assigned_driver_id = patched),
        )
        .invalidates(keys::SALES)
        .run(&self.cache, async {
            self.source
                .assign_driver(&sale.id, assigned.as_deref())
                .await
                .map_err(OrdersError::from)
        })
        .await?;

        info!(sale_id = %sale.id, driver_id = ?driver_id, "Driver assigned");
        Ok(())
    }

    pub async fn drivers(&self) -> OrdersResult<Vec<RestaurantMember>> {
        let rid = &self.session.restaurant_id;
        let drivers = self
            .cache
            .fetch(&keys::scoped(keys::DRIVERS, &[rid.as_str()]), || self.directory.drivers(rid))
            .await?;
        Ok(drivers)
    }
}

#[async_trait]
impl Board for DispatchBoard {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    async fn poll(&self) -> OrdersResult<usize> {
        Ok(self.refresh().await?.len())
    }
}

/// A driver's own undelivered orders.
pub struct DriverBoard {
    source: Arc<dyn OrderSource>,
    cache: QueryCache,
    session: SessionContext,
    driver_id: String,
}

impl DriverBoard {
    pub fn new(
        source: Arc<dyn OrderSource>,
        cache: QueryCache,
        session: SessionContext,
        driver_id: impl Into<String>,
    ) -> Self {
        DriverBoard {
            source,
            cache,
            session,
            driver_id: driver_id.into(),
        }
    }

    /// Uses the session's user as the driver.
    pub fn for_session(source: Arc<dyn OrderSource>, cache: QueryCache, session: SessionContext) -> OrdersResult<Self> {
        let driver_id = session.user_id.clone().ok_or_else(|| {
            OrdersError::InvalidConfig("driver board needs a signed-in user".into())
        })?;
        Ok(Self::new(source, cache, session, driver_id))
    }

    pub fn me(&self) -> Actor {
        Actor::Driver {
            user_id: self.driver_id.clone(),
        }
    }

    pub fn cache_key(&self) -> String {
        keys::scoped(
            keys::DELIVERY_ORDERS,
            &[self.session.restaurant_id.as_str(), "driver", self.driver_id.as_str()],
        )
    }

    pub async fn refresh(&self) -> OrdersResult<Vec<Sale>> {
        let query = OrderQuery::driver(&self.session.restaurant_id, &self.driver_id);
        let sales = self
            .cache
            .refetch(&self.cache_key(), || self.source.list_orders(&query))
            .await?;
        debug!(driver_id = %self.driver_id, orders = sales.len(), "Driver board refreshed");
        Ok(sales)
    }

    /// Moves one of my orders one step (pickup, then delivered).
    pub async fn advance(&self, sale: &Sale) -> OrdersResult<DeliveryStatus> {
        let from = sale.effective_delivery_status();
        let to = from.next().unwrap_or(from);
        advance_delivery(
            self.source.as_ref(),
            &self.cache,
            self.cache_key(),
            &self.session.restaurant_id,
            &self.me(),
            sale,
            to,
        )
        .await?;
        Ok(to)
    }
}

#[async_trait]
impl Board for DriverBoard {
    fn name(&self) -> &'static str {
        "driver"
    }

    async fn poll(&self) -> OrdersResult<usize> {
        Ok(self.refresh().await?.len())
    }
}

// =============================================================================
// Poller
// =============================================================================

/// Refreshes a board on a fixed interval and on demand.
///
/// ```text
/// start ──► poll ── every ──► poll ── every ──► poll ...
///                      refocus ──► poll now, interval restarts
/// ```
pub struct BoardPoller {
    board: Arc<dyn Board>,
    every: Duration,
    refocus_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

#[derive(Clone)]
pub struct PollerHandle {
    refocus_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl PollerHandle {
    /// Requests an immediate refetch (screen regained focus).
    pub async fn refocus(&self) -> OrdersResult<()> {
        self.refocus_tx
            .send(())
            .await
            .map_err(|_| OrdersError::Stopped("board poller"))
    }

    pub async fn shutdown(&self) -> OrdersResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| OrdersError::Stopped("board poller"))
    }
}

impl BoardPoller {
    pub fn new(board: Arc<dyn Board>, every: Duration) -> (Self, PollerHandle) {
        let (refocus_tx, refocus_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            BoardPoller {
                board,
                every,
                refocus_rx,
                shutdown_rx,
            },
            PollerHandle {
                refocus_tx,
                shutdown_tx,
            },
        )
    }

    pub fn spawn(board: Arc<dyn Board>, every: Duration) -> PollerHandle {
        let (poller, handle) = Self::new(board, every);
        tokio::spawn(poller.run());
        handle
    }

    pub async fn run(mut self) {
        let name = self.board.name();
        info!(board = name, every_secs = self.every.as_secs(), "Board poller starting");

        let mut interval = tokio::time::interval(self.every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.poll_once().await;
                }

                Some(()) = self.refocus_rx.recv() => {
                    debug!(board = name, "Refocus, refetching now");
                    self.poll_once().await;
                    interval.reset();
                }

                _ = self.shutdown_rx.recv() => {
                    info!(board = name, "Board poller shutting down");
                    break;
                }
            }
        }
    }

    async fn poll_once(&self) {
        if let Err(e) = self.board.poll().await {
            // the board keeps showing its last list
            warn!(board = self.board.name(), error = %e, "Board refresh failed");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use bistro_core::{AlertContext, Money, OrderType, SaleLine};
    use bistro_db::demo;
    use bistro_db::{Database, DbConfig};

    use crate::alerts::AlertRepeater;
    use crate::cart::CartState;
    use crate::config::AlertSettings;
    use crate::error::{LedgerError, LedgerResult};
    use crate::prefs::PreferenceStore;
    use crate::testing::{sale, CountingPlayer, FakeStore};
    use crate::workflow::{SaleDraft, SaleWorkflow};

    fn session() -> SessionContext {
        SessionContext::new("r1")
    }

    #[tokio::test]
    async fn test_kitchen_columns_and_terminal_removal() {
        let store = Arc::new(FakeStore::new());
        store.insert(sale("a", "r1", OrderType::DineIn));
        let mut ready = sale("b", "r1", OrderType::DineIn);
        ready.status = KitchenStatus::Ready;
        store.insert(ready);

        let board = KitchenBoard::new(store.clone(), QueryCache::new(), session());
        let columns = board.refresh().await.unwrap();
        assert_eq!(columns.pending.len(), 1);
        assert_eq!(columns.ready.len(), 1);

        let b = columns.ready[0].clone();
        assert_eq!(board.advance(&b).await.unwrap(), KitchenStatus::Delivered);
        // gone from the cached view before any refresh
        assert!(board.columns().ready.is_empty());

        let columns = board.refresh().await.unwrap();
        assert_eq!(columns.len(), 1);

        // delivered is terminal
        let mut done = b.clone();
        done.status = KitchenStatus::Delivered;
        let err = board.advance(&done).await.unwrap_err();
        assert!(matches!(err, OrdersError::Core(_)));
    }

    #[tokio::test]
    async fn test_lost_race_rolls_back() {
        let store = Arc::new(FakeStore::new());
        store.insert(sale("a", "r1", OrderType::DineIn));
        let cache = QueryCache::new();
        let board = KitchenBoard::new(store.clone(), cache.clone(), session());

        let seen = board.refresh().await.unwrap().pending[0].clone();

        // another station moved it first
        store.set_kitchen_status("a", KitchenStatus::Preparing, None).await.unwrap();

        let err = board.advance(&seen).await.unwrap_err();
        assert!(matches!(err, OrdersError::Conflict { .. }));
        assert!(err.needs_refresh());
        assert_eq!(board.columns().pending.len(), 1);
        assert!(cache.is_stale(&board.cache_key()));
    }

    #[tokio::test]
    async fn test_failed_write_restores_board() {
        let store = Arc::new(FakeStore::new());
        store.insert(sale("a", "r1", OrderType::Delivery));
        let board = DispatchBoard::new(store.clone(), store.clone(), QueryCache::new(), session());

        let seen = board.refresh().await.unwrap().pending_pickup[0].clone();
        store.fail_status_writes(LedgerError::Unavailable("offline".into()));

        let err = board.advance(&seen, DeliveryStatus::InTransit).await.unwrap_err();
        assert!(matches!(err, OrdersError::Ledger(LedgerError::Unavailable(_))));
        let columns = board.columns();
        assert_eq!(columns.pending_pickup.len(), 1);
        assert!(columns.in_transit.is_empty());
    }

    #[tokio::test]
    async fn test_driver_cannot_move_others_orders() {
        let store = Arc::new(FakeStore::new());
        let mut mine = sale("a", "r1", OrderType::Delivery);
        mine.assigned_driver_id = Some("d2".into());
        store.insert(mine.clone());

        let board = DriverBoard::new(store.clone(), QueryCache::new(), session(), "d1");
        assert!(board.refresh().await.unwrap().is_empty());
        let err = board.advance(&mine).await.unwrap_err();
        assert!(matches!(err, OrdersError::Core(_)));
        assert!(!store.calls().iter().any(|c| c.starts_with("set_delivery_status")));
    }

    struct CountingBoard(AtomicUsize);

    #[async_trait]
    impl Board for CountingBoard {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn poll(&self) -> OrdersResult<usize> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_interval_and_refocus() {
        let board = Arc::new(CountingBoard(AtomicUsize::new(0)));
        let handle = BoardPoller::spawn(board.clone(), Duration::from_secs(10));

        // t = 0, 10, 20
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(board.0.load(Ordering::SeqCst), 3);

        handle.refocus().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(board.0.load(Ordering::SeqCst), 4);

        // interval restarted at t = 25, next poll at t = 35
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(board.0.load(Ordering::SeqCst), 4);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(board.0.load(Ordering::SeqCst), 5);

        handle.shutdown().await.unwrap();
    }

    fn kitchen_alerts(player: Arc<CountingPlayer>) -> Arc<AlertCoordinator> {
        Arc::new(AlertCoordinator::new(
            AlertContext::Kitchen,
            &AlertSettings::default(),
            player,
            PreferenceStore::in_memory(),
        ))
    }

    fn list_calls(store: &FakeStore) -> usize {
        store.calls().iter().filter(|c| *c == "list_orders").count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_kitchen_station_alert_cadence() {
        let store = Arc::new(FakeStore::new());
        store.insert(sale("a", "r1", OrderType::DineIn));

        let player = Arc::new(CountingPlayer::default());
        let alerts = kitchen_alerts(player.clone());
        let board = Arc::new(KitchenBoard::new(store.clone(), QueryCache::new(), session()).with_alerts(alerts.clone()));

        let poller = BoardPoller::spawn(board.clone(), Duration::from_secs(10));
        let repeater = AlertRepeater::spawn(alerts.clone(), Duration::from_secs(30));

        // first poll at t = 0 sees new work: one cue of three beeps
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(player.plays(), 3);
        assert_eq!(list_calls(&store), 3);

        // reminder at t = 30; the poll at t = 30 finds nothing new
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(player.plays(), 6);

        tokio::time::sleep(Duration::from_secs(4)).await;
        store.insert(sale("b", "r1", OrderType::DineIn));

        // not seen until the poll at t = 40
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(player.plays(), 6);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(player.plays(), 9);
        assert_eq!(alerts.pending(), 2);

        // polls at t = 50 and 60 stay silent; reminder at t = 60
        tokio::time::sleep(Duration::from_secs(18)).await;
        assert_eq!(player.plays(), 9);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(player.plays(), 12);
        assert_eq!(list_calls(&store), 7);

        poller.shutdown().await.unwrap();
        repeater.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_player_keeps_board_polling() {
        let store = Arc::new(FakeStore::new());
        store.insert(sale("a", "r1", OrderType::DineIn));

        let player = Arc::new(CountingPlayer::failing());
        let alerts = kitchen_alerts(player.clone());
        let board = Arc::new(KitchenBoard::new(store.clone(), QueryCache::new(), session()).with_alerts(alerts.clone()));

        let poller = BoardPoller::spawn(board.clone(), Duration::from_secs(10));
        let repeater = AlertRepeater::spawn(alerts.clone(), Duration::from_secs(30));

        // each cue stops at its first failed beep
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(player.plays(), 2);
        assert_eq!(list_calls(&store), 4);
        assert_eq!(board.columns().pending.len(), 1);

        poller.shutdown().await.unwrap();
        repeater.shutdown().await.unwrap();
    }

    /// Cancels the board's key while its list is in flight, the way a
    /// status write landing mid-refresh does.
    struct OvertakenSource {
        store: Arc<FakeStore>,
        cache: QueryCache,
        key: String,
        overtake: AtomicBool,
    }

    #[async_trait]
    impl OrderSource for OvertakenSource {
        async fn list_orders(&self, query: &OrderQuery) -> LedgerResult<Vec<Sale>> {
            if self.overtake.load(Ordering::SeqCst) {
                self.cache.cancel(&self.key);
            }
            self.store.list_orders(query).await
        }

        async fn set_kitchen_status(
            &self,
            sale_id: &str,
            to: KitchenStatus,
            expected: Option<KitchenStatus>,
        ) -> LedgerResult<bool> {
            self.store.set_kitchen_status(sale_id, to, expected).await
        }

        async fn set_delivery_status(
            &self,
            sale_id: &str,
            to: DeliveryStatus,
            expected: Option<DeliveryStatus>,
        ) -> LedgerResult<bool> {
            self.store.set_delivery_status(sale_id, to, expected).await
        }

        async fn assign_driver(&self, sale_id: &str, driver_id: Option<&str>) -> LedgerResult<()> {
            self.store.assign_driver(sale_id, driver_id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_refresh_does_not_cue() {
        let store = Arc::new(FakeStore::new());
        store.insert(sale("a", "r1", OrderType::DineIn));
        let cache = QueryCache::new();
        let source = Arc::new(OvertakenSource {
            store: store.clone(),
            cache: cache.clone(),
            key: keys::scoped(keys::KITCHEN_ORDERS, &["r1"]),
            overtake: AtomicBool::new(true),
        });

        let player = Arc::new(CountingPlayer::default());
        let alerts = kitchen_alerts(player.clone());
        let board = KitchenBoard::new(source.clone(), cache.clone(), session()).with_alerts(alerts.clone());
        assert_eq!(board.cache_key(), source.key);

        // the caller still sees the list, but neither the cache nor the badge takes it
        let columns = board.refresh().await.unwrap();
        assert_eq!(columns.pending.len(), 1);
        assert!(board.columns().is_empty());
        assert_eq!(alerts.pending(), 0);
        assert_eq!(player.plays(), 0);

        source.overtake.store(false, Ordering::SeqCst);
        board.refresh().await.unwrap();
        assert_eq!(alerts.pending(), 1);
        assert_eq!(player.plays(), 3);
    }

    #[tokio::test]
    async fn test_delivery_scenario() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();
        let session = SessionContext::new(ids.restaurant_id.clone());
        let cache = QueryCache::new();
        let store = Arc::new(db.clone());

        let workflow = SaleWorkflow::new(store.clone(), cache.clone(), CartState::new(), session.clone());
        let order = workflow
            .submit(
                SaleDraft::delivery("Mali", "+66 81 234 5678", "12 Sukhumvit Soi 11"),
                &[SaleLine {
                    dish_id: ids.spring_rolls_id.clone(),
                    quantity: 2,
                    unit_price: Money::from_cents(8000),
                }],
            )
            .await
            .unwrap();
        assert_eq!(order.delivery_status, None);

        let dispatch = DispatchBoard::new(store.clone(), store.clone(), cache.clone(), session.clone());
        let columns = dispatch.refresh().await.unwrap();
        assert_eq!(columns.pending_pickup.len(), 1);

        let drivers = dispatch.drivers().await.unwrap();
        assert_eq!(drivers.len(), 2);
        let driver_id = drivers[0].user_id.clone();

        let pending = columns.pending_pickup[0].clone();
        dispatch.assign(&pending, Some(driver_id.as_str())).await.unwrap();
        dispatch.advance(&pending, DeliveryStatus::InTransit).await.unwrap();

        let columns = dispatch.refresh().await.unwrap();
        assert!(columns.pending_pickup.is_empty());
        assert_eq!(columns.in_transit.len(), 1);

        let driver = DriverBoard::new(store.clone(), cache.clone(), session.clone(), driver_id);
        let mine = driver.refresh().await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(driver.advance(&mine[0]).await.unwrap(), DeliveryStatus::Delivered);

        assert!(dispatch.refresh().await.unwrap().is_empty());
        assert!(driver.refresh().await.unwrap().is_empty());

        // assignment is refused once delivered
        let delivered = db.sales().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(delivered.delivery_status, Some(DeliveryStatus::Delivered));
        assert!(dispatch.assign(&delivered, None).await.is_err());
    }
}
