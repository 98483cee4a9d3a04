//! # Station Wiring
//!
//! Owns everything a running station keeps alive: the database pool, the
//! kitchen and dispatch boards, their pollers and their alert repeaters.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use bistro_core::AlertContext;
use bistro_db::Database;
use bistro_orders::{
    AlertCoordinator, AlertHandle, AlertPlayer, AlertRepeater, BoardPoller, DispatchBoard, KitchenBoard,
    OrdersResult, PollerHandle, PreferenceStore, QueryCache, SessionContext, SessionState, StationConfig,
};

/// Reads the session file; a restaurant id in the config wins over it.
pub fn resolve_session(config: &StationConfig, session_path: &Path) -> OrdersResult<SessionContext> {
    let mut state = SessionState::load(session_path)?;
    if let Some(id) = config.restaurant_id() {
        state.restaurant_id = Some(id.to_string());
    }
    SessionContext::from_state(&state)
}

pub struct Station {
    db: Database,
    kitchen: Arc<KitchenBoard>,
    dispatch: Arc<DispatchBoard>,
    kitchen_alerts: Arc<AlertCoordinator>,
    delivery_alerts: Arc<AlertCoordinator>,
    pollers: Vec<PollerHandle>,
    repeaters: Vec<AlertHandle>,
}

impl Station {
    /// Builds both boards and spawns their background tasks on the current
    /// runtime.
    pub fn start(
        config: &StationConfig,
        db: Database,
        session: SessionContext,
        prefs: PreferenceStore,
        player: Arc<dyn AlertPlayer>,
    ) -> Self {
        let cache = QueryCache::new();
        let store = Arc::new(db.clone());

        let kitchen_alerts = Arc::new(AlertCoordinator::new(
            AlertContext::Kitchen,
            &config.alerts,
            player.clone(),
            prefs.clone(),
        ));
        let delivery_alerts = Arc::new(AlertCoordinator::new(
            AlertContext::Delivery,
            &config.alerts,
            player,
            prefs,
        ));

        let kitchen = Arc::new(
            KitchenBoard::new(store.clone(), cache.clone(), session.clone()).with_alerts(kitchen_alerts.clone()),
        );
        let dispatch = Arc::new(
            DispatchBoard::new(store.clone(), store, cache, session.clone()).with_alerts(delivery_alerts.clone()),
        );

        let refresh = config.refresh_interval();
        let repeat = config.repeat_alert();
        let pollers = vec![
            BoardPoller::spawn(kitchen.clone(), refresh),
            BoardPoller::spawn(dispatch.clone(), refresh),
        ];
        let repeaters = vec![
            AlertRepeater::spawn(kitchen_alerts.clone(), repeat),
            AlertRepeater::spawn(delivery_alerts.clone(), repeat),
        ];

        info!(
            restaurant_id = %session.restaurant_id,
            refresh_secs = refresh.as_secs(),
            repeat_secs = repeat.as_secs(),
            "Station started"
        );

        Station {
            db,
            kitchen,
            dispatch,
            kitchen_alerts,
            delivery_alerts,
            pollers,
            repeaters,
        }
    }

    pub fn kitchen(&self) -> &KitchenBoard {
        &self.kitchen
    }

    pub fn dispatch(&self) -> &DispatchBoard {
        &self.dispatch
    }

    pub fn alerts(&self, context: AlertContext) -> &AlertCoordinator {
        match context {
            AlertContext::Kitchen => &self.kitchen_alerts,
            AlertContext::Delivery => &self.delivery_alerts,
        }
    }

    /// Refetches both boards now, e.g. when the operator returns to the
    /// station.
    pub async fn refocus(&self) {
        for poller in &self.pollers {
            if let Err(e) = poller.refocus().await {
                warn!(error = %e, "Refocus not delivered");
            }
        }
    }

    /// Stops every task, then closes the pool.
    pub async fn shutdown(self) {
        for poller in &self.pollers {
            if let Err(e) = poller.shutdown().await {
                warn!(error = %e, "Poller already stopped");
            }
        }
        for repeater in &self.repeaters {
            if let Err(e) = repeater.shutdown().await {
                warn!(error = %e, "Alert repeater already stopped");
            }
        }
        self.db.close().await;
        info!("Station stopped");
    }
}
