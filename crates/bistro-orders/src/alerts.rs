//! # Alert Coordinator
//!
//! Wraps the pure [`AlertTracker`] with everything that has side effects:
//! the persisted mute flag, the audio player and the repeat timer.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Alert Coordination                               │
//! │                                                                         │
//! │  Board refresh ──► observe(count) ──┐                                  │
//! │                                      │                                  │
//! │  AlertRepeater (30 s) ─► repeat_tick ┼──► AlertTracker ──► cue?        │
//! │                                      │                       │          │
//! │  Operator ──────► toggle_mute ───────┘                       ▼          │
//! │       │                                AlertPlayer::play × repeats     │
//! │       └──► PreferenceStore (kitchenAlertMuted)   (errors: warn, drop)  │
//! │                                                                         │
//! │  First click/touch ──► AudioGate ──► AlertPlayer::prime(0.01)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Playback failures never reach the caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use bistro_core::alert::PAUSE_BETWEEN_MS;
use bistro_core::{AlertContext, AlertTracker, AudioGate, CueReason, Gesture, ToneProfile};

use crate::config::AlertSettings;
use crate::error::{OrdersError, OrdersResult, PlaybackError};
use crate::prefs::PreferenceStore;

// =============================================================================
// Player
// =============================================================================

/// Audio output for alert cues.
#[async_trait]
pub trait AlertPlayer: Send + Sync {
    /// Silent play that unlocks output after the first user gesture.
    async fn prime(&self, volume: f32) -> Result<(), PlaybackError>;

    /// Plays one beep. The coordinator repeats it `tone.repeats` times.
    async fn play(&self, tone: &ToneProfile, wav: &[u8]) -> Result<(), PlaybackError>;
}

// =============================================================================
// Coordinator
// =============================================================================

pub struct AlertCoordinator {
    tracker: Mutex<AlertTracker>,
    gate: Mutex<AudioGate>,
    tone: ToneProfile,
    wav: Vec<u8>,
    player: Arc<dyn AlertPlayer>,
    prefs: PreferenceStore,
}

impl AlertCoordinator {
    /// The initial mute state comes from the preference store.
    pub fn new(
        context: AlertContext,
        settings: &AlertSettings,
        player: Arc<dyn AlertPlayer>,
        prefs: PreferenceStore,
    ) -> Self {
        let muted = prefs.get_bool(context.mute_key());
        let tone = settings.tone(context);
        let tracker =
            AlertTracker::new(context, muted).with_confirm_on_unmute(settings.confirm_on_unmute(context));

        debug!(context = context.as_str(), muted, "Alert coordinator ready");
        AlertCoordinator {
            tracker: Mutex::new(tracker),
            gate: Mutex::new(AudioGate::new()),
            tone,
            wav: tone.to_wav(),
            player,
            prefs,
        }
    }

    fn tracker(&self) -> MutexGuard<'_, AlertTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn context(&self) -> AlertContext {
        self.tracker().context()
    }

    pub fn is_muted(&self) -> bool {
        self.tracker().is_muted()
    }

    /// Badge count as last observed.
    pub fn pending(&self) -> usize {
        self.tracker().pending()
    }

    /// Feeds a fresh pending count from a board refresh.
    pub async fn observe(&self, count: usize) -> Option<CueReason> {
        let cue = self.tracker().observe(count);
        self.cue(cue).await
    }

    pub async fn repeat_tick(&self) -> Option<CueReason> {
        let cue = self.tracker().repeat_tick();
        self.cue(cue).await
    }

    /// Sets and persists the mute flag. A failed write is logged; the
    /// in-memory flag still changes.
    pub async fn set_muted(&self, muted: bool) -> Option<CueReason> {
        let (context, cue) = {
            let mut tracker = self.tracker();
            (tracker.context(), tracker.set_muted(muted))
        };
        self.persist(context, muted);
        self.cue(cue).await
    }

    pub async fn toggle_mute(&self) -> Option<CueReason> {
        let muted = !self.is_muted();
        self.set_muted(muted).await
    }

    /// Forwards a user gesture. Only the first one primes the player.
    pub async fn on_gesture(&self, gesture: Gesture) {
        let volume = self.gate.lock().unwrap_or_else(PoisonError::into_inner).on_gesture(gesture);
        if let Some(volume) = volume {
            match self.player.prime(volume).await {
                Ok(()) => debug!(?gesture, "Audio primed"),
                Err(e) => warn!(error = %e, "Audio priming failed"),
            }
        }
    }

    fn persist(&self, context: AlertContext, muted: bool) {
        if let Err(e) = self.prefs.set_bool(context.mute_key(), muted) {
            warn!(context = context.as_str(), error = %e, "Failed to persist mute flag");
        }
    }

    /// `tone.repeats` beeps with a pause between them. The first failed
    /// beep ends the cue.
    async fn cue(&self, reason: Option<CueReason>) -> Option<CueReason> {
        let reason = reason?;
        let context = self.context().as_str();
        debug!(context, ?reason, beeps = self.tone.repeats, "Alert cue");

        for beep in 0..self.tone.repeats {
            if beep > 0 {
                tokio::time::sleep(Duration::from_millis(PAUSE_BETWEEN_MS)).await;
            }
            if let Err(e) = self.player.play(&self.tone, &self.wav).await {
                warn!(context, beep, error = %e, "Alert playback failed");
                break;
            }
        }
        Some(reason)
    }
}

// =============================================================================
// Repeat Timer
// =============================================================================

/// Background task that reminds about pending work.
pub struct AlertRepeater {
    coordinator: Arc<AlertCoordinator>,
    every: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

#[derive(Clone)]
pub struct AlertHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl AlertHandle {
    pub async fn shutdown(&self) -> OrdersResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| OrdersError::Stopped("alert repeater"))
    }
}

impl AlertRepeater {
    pub fn new(coordinator: Arc<AlertCoordinator>, every: Duration) -> (Self, AlertHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            AlertRepeater {
                coordinator,
                every,
                shutdown_rx,
            },
            AlertHandle { shutdown_tx },
        )
    }

    /// Spawns the repeater on the current runtime.
    pub fn spawn(coordinator: Arc<AlertCoordinator>, every: Duration) -> AlertHandle {
        let (repeater, handle) = Self::new(coordinator, every);
        tokio::spawn(repeater.run());
        handle
    }

    /// First tick one full period after start.
    pub async fn run(mut self) {
        let context = self.coordinator.context().as_str();
        info!(context, every_secs = self.every.as_secs(), "Alert repeater starting");

        let mut interval = tokio::time::interval_at(Instant::now() + self.every, self.every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.coordinator.repeat_tick().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!(context, "Alert repeater shutting down");
                    break;
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
