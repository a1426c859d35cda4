/// JSON message protocol between the device and an operator client.
///
/// All messages are newline-delimited JSON (NDJSON), the same on the serial
/// console and on the TCP control surface.
/// Uses `heapless` types for no_std/no-alloc operation.
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

/// Maximum length for MAC address strings ("AA:BB:CC:DD:EE:FF")
pub type MacString = String<18>;

/// Maximum length for SSID strings (32 bytes + 1 spare)
pub type NameString = String<33>;

/// Maximum length for error detail strings
pub type DetailString = String<96>;

/// Messages sent from the device to the operator
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// One entry of the current scan generation
    #[serde(rename = "network")]
    Network {
        /// Index to pass as `target` in a `deauth` command
        idx: u32,
        ssid: &'a NameString,
        bssid: &'a MacString,
        ch: u8,
        rssi: i8,
        /// Encryption class: "Open", "WEP", "WPA2_PSK", ...
        enc: &'static str,
    },
    /// Scan finished; a new generation is installed
    #[serde(rename = "scan_done")]
    ScanDone { count: u32, generation: u32 },
    /// Acknowledges an attack command before the radio leaves the
    /// control plane. Clients on the access point lose their link next.
    #[serde(rename = "starting")]
    Starting {
        /// "single" or "all"
        mode: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<u32>,
        reason: u16,
    },
    /// Attack is running
    #[serde(rename = "started")]
    Started {
        mode: &'static str,
        ch: u8,
        reason: u16,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason_text: Option<&'static str>,
    },
    /// Attack stopped; `eliminated` is the final count before reset
    #[serde(rename = "stopped")]
    Stopped { eliminated: u32 },
    /// Device status report
    #[serde(rename = "status")]
    Status {
        /// "idle", "single" or "sweep"
        state: &'static str,
        eliminated: u32,
        ch: u8,
        /// "control", "monitor", or "down" while switching / after a fault
        radio: &'static str,
        /// "serving" or "suspended"
        surface: &'static str,
        tx_errors: u32,
        scan_gen: u32,
        networks: u32,
        /// Uptime in seconds
        uptime: u32,
        /// Board identifier
        board: &'static str,
        /// Firmware version
        version: &'static str,
    },
    /// A command failed
    #[serde(rename = "error")]
    Error {
        /// "invalid_target", "radio_fault", "attack_active", "bad_command"
        kind: &'static str,
        detail: &'a DetailString,
    },
}

/// Commands sent from the operator to the device.
///
/// Deserialized manually via [`RawCommand`] in `comm::parse_command()` because
/// `serde_json_core` does not support internally tagged enums (`deserialize_any`).
#[derive(Debug, PartialEq)]
pub enum HostCommand {
    /// Run a fresh scan and list the results
    Scan,
    /// Attack one network of the current scan
    Deauth {
        /// Index into the current scan; `None` is rejected by the engine
        target: Option<u32>,
        reason: u16,
    },
    /// Attack every network on every channel
    DeauthAll { reason: u16 },
    /// Stop any attack and restore the access point
    Stop,
    /// Request current status
    Status,
}

/// Wire format for host commands: a flat struct that `serde_json_core` can
/// deserialize without `deserialize_any`. Converted to [`HostCommand`] in
/// `comm::parse_command()`.
#[derive(Deserialize)]
pub(crate) struct RawCommand {
    pub cmd: heapless::String<16>,
    #[serde(default)]
    pub target: Option<u32>,
    #[serde(default)]
    pub reason: Option<u16>,
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 384;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;
