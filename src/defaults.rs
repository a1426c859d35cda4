/// Compiled-in defaults for the attack engine and its control surfaces.
///
/// Values that the operator may tune at runtime are mirrored in
/// [`EngineConfig`](crate::config::EngineConfig); everything else is fixed
/// at build time.

/// SSID of the operator access point that carries the control surface.
pub const AP_SSID: &str = "ESP32-Deauther";

/// WPA2 passphrase of the operator access point (8+ characters).
pub const AP_PASSWORD: &str = "deauther";

/// Channel the operator access point is brought up on.
pub const AP_CHANNEL: u8 = 1;

/// TCP port of the NDJSON control surface on the operator access point.
pub const CONTROL_PORT: u16 = 4210;

/// Lowest 2.4 GHz channel swept.
pub const CHANNEL_MIN: u8 = 1;

/// Highest 2.4 GHz channel swept (14 is Japan-only and not used).
pub const CHANNEL_MAX: u8 = 13;

/// Delay between tearing one radio role down and bringing the next up.
pub const SETTLE_DELAY_MS: u32 = 100;

/// Deauthentication frames transmitted per station sighting.
pub const FRAMES_PER_DEAUTH: u8 = 10;

/// Dwell time per channel while sweeping all networks.
/// Full cycle: 13 channels × 10ms = 130ms.
pub const HOP_INTERVAL_MS: u32 = 10;

/// Reason code used when the operator does not supply one
/// (1 = unspecified reason).
pub const DEFAULT_REASON: u16 = 1;

/// Maximum number of scan results kept per generation.
pub const MAX_NETWORKS: usize = 32;

/// Maximum number of distinct (station, AP) pairs tracked per attack.
/// Pairs beyond this are still attacked but no longer counted.
pub const MAX_TRACKED_PAIRS: usize = 64;

/// Longest the control loop waits for the control surface to write out
/// the `starting` acknowledgement before the radio leaves the control
/// plane. Covers one surface poll interval (50 ms) with margin.
pub const FLUSH_TIMEOUT_MS: u32 = 200;

/// Interval between unsolicited status reports.
pub const STATUS_INTERVAL_SECS: u64 = 30;

/// IEEE 802.11 reason codes 0–24 with their meaning.
pub static REASON_CODES: &[(u16, &str)] = &[
    (0, "Reserved"),
    (1, "Unspecified reason"),
    (2, "Previous authentication no longer valid"),
    (3, "Station is leaving (or has left) IBSS or ESS"),
    (4, "Disassociated due to inactivity"),
    (5, "AP is unable to handle all currently associated stations"),
    (6, "Class 2 frame received from nonauthenticated station"),
    (7, "Class 3 frame received from nonassociated station"),
    (8, "Station is leaving (or has left) BSS"),
    (9, "Station requesting (re)association is not authenticated"),
    (10, "Power Capability element is unacceptable"),
    (11, "Supported Channels element is unacceptable"),
    (12, "Disassociated due to BSS Transition Management"),
    (13, "Invalid element"),
    (14, "Message integrity code (MIC) failure"),
    (15, "4-Way Handshake timeout"),
    (16, "Group Key Handshake timeout"),
    (17, "4-Way Handshake element differs from (Re)Association Request/Probe Response/Beacon"),
    (18, "Invalid group cipher"),
    (19, "Invalid pairwise cipher"),
    (20, "Invalid AKMP"),
    (21, "Unsupported RSNE version"),
    (22, "Invalid RSNE capabilities"),
    (23, "IEEE 802.1X authentication failed"),
    (24, "Cipher suite rejected because of the security policy"),
];

/// Human-readable meaning of a reason code, if it is a known one.
/// Any `u16` is still a legal reason code on the wire.
pub fn reason_description(code: u16) -> Option<&'static str> {
    REASON_CODES
        .iter()
        .find(|&&(c, _)| c == code)
        .map(|&(_, text)| text)
}
