//! Alert output for a station without a sound device: every beep becomes a
//! log line.

use async_trait::async_trait;
use tracing::{debug, info};

use bistro_core::ToneProfile;
use bistro_orders::{AlertPlayer, PlaybackError};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogPlayer;

#[async_trait]
impl AlertPlayer for LogPlayer {
    async fn prime(&self, volume: f32) -> Result<(), PlaybackError> {
        debug!(volume, "Log player primed");
        Ok(())
    }

    async fn play(&self, tone: &ToneProfile, wav: &[u8]) -> Result<(), PlaybackError> {
        if wav.is_empty() {
            return Err(PlaybackError::Failed("empty beep".into()));
        }
        info!(
            frequency_hz = tone.frequency_hz,
            duration_ms = tone.duration_ms,
            bytes = wav.len(),
            "\u{7}Beep"
        );
        Ok(())
    }
}
