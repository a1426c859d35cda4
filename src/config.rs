/// Runtime engine configuration.
///
/// Starts from the compiled-in [`defaults`](crate::defaults) and can be
/// adjusted by the firmware before the engine is built.
use crate::defaults::{FRAMES_PER_DEAUTH, HOP_INTERVAL_MS, SETTLE_DELAY_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Settle delay between radio role tear-down and bring-up (ms).
    pub settle_ms: u32,
    /// Deauthentication frames transmitted per sighting. Clamped to >= 1.
    pub frames_per_deauth: u8,
    /// Channel dwell while sweeping all networks (ms).
    pub hop_interval_ms: u32,
}

impl EngineConfig {
    pub const fn new() -> Self {
        Self {
            settle_ms: SETTLE_DELAY_MS,
            frames_per_deauth: FRAMES_PER_DEAUTH,
            hop_interval_ms: HOP_INTERVAL_MS,
        }
    }

    /// Burst length actually used; a zero burst would make every sighting
    /// a silent no-op.
    pub fn burst_len(&self) -> u8 {
        self.frames_per_deauth.max(1)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
