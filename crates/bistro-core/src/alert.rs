//! # Alert Cadence & Tones
//!
//! Pure rules behind the audible alerts on the kitchen and delivery boards.
//! Timers, persistence and playback live in `bistro-orders::alerts`; this
//! module only decides *when* a cue is due and *what* it sounds like.
//!
//! ## Cadence
//! ```text
//!  refresh (10s)   0      0      3      3      3      3      0
//!                  │      │      │      │      │      │      │
//!  observe()       ·      ·      ● new  ·      ·      ·      ·
//!                                │
//!  repeat (30s)   ─┼──────────────────────── ● backlog ─────────── · (count 0)
//!                 t=0                      t=30                   t=60
//! ```
//! - An **increase** in pending count cues once, immediately.
//! - A separate repeat timer cues while anything is still pending.
//! - Mute silences both. Unmuting may play a confirmation cue.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Context
// =============================================================================

/// Which board an alert belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AlertContext {
    /// Pending kitchen orders.
    Kitchen,
    /// Delivery orders waiting for pickup.
    Delivery,
}

impl AlertContext {
    /// Key under which the mute flag is persisted.
    pub fn mute_key(&self) -> &'static str {
        match self {
            AlertContext::Kitchen => "kitchenAlertMuted",
            AlertContext::Delivery => "deliveryAlertMuted",
        }
    }

    /// Default tone for this board.
    pub fn default_tone(&self) -> ToneProfile {
        match self {
            AlertContext::Kitchen => ToneProfile::KITCHEN,
            AlertContext::Delivery => ToneProfile::DELIVERY,
        }
    }

    /// The kitchen board beeps when unmuted; the delivery badge stays quiet.
    pub fn default_confirm_on_unmute(&self) -> bool {
        matches!(self, AlertContext::Kitchen)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertContext::Kitchen => "kitchen",
            AlertContext::Delivery => "delivery",
        }
    }
}

/// Why a cue fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CueReason {
    /// Pending count went up since the last observation.
    NewWork,
    /// Repeat timer fired with work still pending.
    Backlog,
    /// Operator just unmuted.
    Unmuted,
}

// =============================================================================
// Tracker
// =============================================================================

/// Cadence state for one alertable collection.
#[derive(Debug, Clone)]
pub struct AlertTracker {
    context: AlertContext,
    muted: bool,
    confirm_on_unmute: bool,
    last_count: usize,
}

impl AlertTracker {
    pub fn new(context: AlertContext, muted: bool) -> Self {
        AlertTracker {
            context,
            muted,
            confirm_on_unmute: context.default_confirm_on_unmute(),
            last_count: 0,
        }
    }

    pub fn with_confirm_on_unmute(mut self, confirm: bool) -> Self {
        self.confirm_on_unmute = confirm;
        self
    }

    #[inline]
    pub fn context(&self) -> AlertContext {
        self.context
    }

    #[inline]
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Last observed pending count.
    #[inline]
    pub fn pending(&self) -> usize {
        self.last_count
    }

    /// Records a fresh pending count. Cues only on an increase while unmuted.
    ///
    /// The count is recorded even while muted, so unmuting does not replay
    /// work that arrived during the mute.
    pub fn observe(&mut self, count: usize) -> Option<CueReason> {
        let increased = count > self.last_count;
        self.last_count = count;
        (increased && !self.muted).then_some(CueReason::NewWork)
    }

    /// Called by the repeat timer.
    pub fn repeat_tick(&self) -> Option<CueReason> {
        (!self.muted && self.last_count > 0).then_some(CueReason::Backlog)
    }

    /// Sets the mute flag. Returns a confirmation cue when unmuting and the
    /// context asks for one.
    pub fn set_muted(&mut self, muted: bool) -> Option<CueReason> {
        let was_muted = self.muted;
        self.muted = muted;
        (was_muted && !muted && self.confirm_on_unmute).then_some(CueReason::Unmuted)
    }

    pub fn toggle_mute(&mut self) -> Option<CueReason> {
        self.set_muted(!self.muted)
    }
}

// =============================================================================
// Tone Synthesis
// =============================================================================

/// Output sample rate for synthesized tones.
pub const SAMPLE_RATE: u32 = 22_050;

/// Silence between repeated beeps of one cue.
pub const PAUSE_BETWEEN_MS: u64 = 250;

const AMPLITUDE: f64 = 0.9;
const FADE_FRACTION: f64 = 0.2;

/// A beep: square wave at `frequency_hz`, played `repeats` times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ToneProfile {
    pub frequency_hz: u32,
    pub duration_ms: u32,
    pub repeats: u32,
}

impl ToneProfile {
    /// High and urgent: three short beeps.
    pub const KITCHEN: ToneProfile = ToneProfile {
        frequency_hz: 1200,
        duration_ms: 150,
        repeats: 3,
    };

    /// Lower: two longer beeps.
    pub const DELIVERY: ToneProfile = ToneProfile {
        frequency_hz: 800,
        duration_ms: 200,
        repeats: 2,
    };

    pub fn sample_count(&self) -> usize {
        (SAMPLE_RATE as u64 * self.duration_ms as u64 / 1000) as usize
    }

    /// 16-bit PCM samples of one beep, last 20% faded out.
    pub fn samples(&self) -> Vec<i16> {
        let n = self.sample_count();
        let fade_start = n as f64 * (1.0 - FADE_FRACTION);
        let fade_len = n as f64 * FADE_FRACTION;

        (0..n)
            .map(|i| {
                let t = i as f64 / SAMPLE_RATE as f64;
                let phase = (2.0 * std::f64::consts::PI * self.frequency_hz as f64 * t).sin();
                let level = if phase > 0.0 { AMPLITUDE } else { -AMPLITUDE };
                let fade = if (i as f64) > fade_start {
                    (n - i) as f64 / fade_len
                } else {
                    1.0
                };
                (level * fade * i16::MAX as f64).floor() as i16
            })
            .collect()
    }

    /// One beep as a complete mono 16-bit PCM WAV file.
    pub fn to_wav(&self) -> Vec<u8> {
        let samples = self.samples();
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);

        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        out.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());

        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }
}

// =============================================================================
// Audio Unlock
// =============================================================================

/// A user gesture the audio surface can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    Click,
    Touch,
}

/// Volume used for the silent priming play.
pub const PRIME_VOLUME: f32 = 0.01;

/// One-shot gate: the first click or touch primes playback, later ones are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct AudioGate {
    primed: bool,
}

impl AudioGate {
    pub fn new() -> Self {
        AudioGate::default()
    }

    /// True while the gate still listens for a gesture.
    pub fn is_listening(&self) -> bool {
        !self.primed
    }

    /// Returns the priming volume on the first gesture only.
    pub fn on_gesture(&mut self, _gesture: Gesture) -> Option<f32> {
        if self.primed {
            return None;
        }
        self.primed = true;
        Some(PRIME_VOLUME)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_on_increase_only() {
        let mut t = AlertTracker::new(AlertContext::Delivery, false);
        let cues: Vec<_> = [0, 0, 3, 3, 3].iter().map(|c| t.observe(*c)).collect();
        assert_eq!(cues, vec![None, None, Some(CueReason::NewWork), None, None]);

        // a decrease then a smaller increase still cues
        assert_eq!(t.observe(1), None);
        assert_eq!(t.observe(2), Some(CueReason::NewWork));
    }

    #[test]
    fn test_repeat_requires_backlog_and_unmuted() {
        let mut t = AlertTracker::new(AlertContext::Kitchen, false);
        assert_eq!(t.repeat_tick(), None);
        t.observe(2);
        assert_eq!(t.repeat_tick(), Some(CueReason::Backlog));
        t.set_muted(true);
        assert_eq!(t.repeat_tick(), None);
    }

    #[test]
    fn test_muted_observations_still_track_count() {
        let mut t = AlertTracker::new(AlertContext::Delivery, true);
        assert_eq!(t.observe(4), None);
        assert_eq!(t.set_muted(false), None);
        // count already known, no replay
        assert_eq!(t.observe(4), None);
        assert_eq!(t.pending(), 4);
    }

    #[test]
    fn test_unmute_confirmation_per_context() {
        let mut kitchen = AlertTracker::new(AlertContext::Kitchen, true);
        assert_eq!(kitchen.toggle_mute(), Some(CueReason::Unmuted));
        assert_eq!(kitchen.toggle_mute(), None);

        let mut delivery = AlertTracker::new(AlertContext::Delivery, true);
        assert_eq!(delivery.toggle_mute(), None);
        assert!(!delivery.is_muted());
    }

    #[test]
    fn test_wav_layout() {
        let wav = ToneProfile::KITCHEN.to_wav();
        let n = ToneProfile::KITCHEN.sample_count();
        assert_eq!(n, 3307);
        assert_eq!(wav.len(), 44 + n * 2);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 22_050);
        assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), 16);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]) as usize, n * 2);
    }

    #[test]
    fn test_samples_square_and_faded() {
        let samples = ToneProfile::DELIVERY.samples();
        let peak = (0.9 * i16::MAX as f64).floor() as i16;
        assert!(samples[..samples.len() / 2].iter().all(|s| s.abs() >= peak - 1));
        assert!(samples.last().map(|s| s.abs() < 200).unwrap_or(false));
    }

    #[test]
    fn test_audio_gate_primes_once() {
        let mut gate = AudioGate::new();
        assert!(gate.is_listening());
        assert_eq!(gate.on_gesture(Gesture::Touch), Some(PRIME_VOLUME));
        assert!(!gate.is_listening());
        assert_eq!(gate.on_gesture(Gesture::Click), None);
    }
}
