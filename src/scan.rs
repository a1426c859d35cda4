/// Scan collaborator boundary.
///
/// The radio driver performs the actual scan; the engine only consumes its
/// results as a [`ScanGeneration`]. A rescan replaces the generation
/// wholesale (swap, never mutate in place), and attack targets are always
/// validated against the generation that is current at `start()` time.
use heapless::Vec;

use crate::defaults::MAX_NETWORKS;
use crate::error::RadioFault;
use crate::frame::MacAddr;
use crate::protocol::NameString;

/// Encryption class reported by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    Unknown,
}

impl Encryption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encryption::Open => "Open",
            Encryption::Wep => "WEP",
            Encryption::WpaPsk => "WPA_PSK",
            Encryption::Wpa2Psk => "WPA2_PSK",
            Encryption::WpaWpa2Psk => "WPA_WPA2_PSK",
            Encryption::Wpa2Enterprise => "WPA2_ENTERPRISE",
            Encryption::Unknown => "UNKNOWN",
        }
    }
}

/// One network seen by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRecord {
    pub ssid: NameString,
    pub bssid: MacAddr,
    pub channel: u8,
    pub rssi: i8,
    pub encryption: Encryption,
}

impl NetworkRecord {
    /// Build a record, truncating over-long SSIDs at a char boundary.
    pub fn new(ssid: &str, bssid: MacAddr, channel: u8, rssi: i8, encryption: Encryption) -> Self {
        let mut name = NameString::new();
        for c in ssid.chars() {
            if name.push(c).is_err() {
                break;
            }
        }
        Self {
            ssid: name,
            bssid,
            channel,
            rssi,
            encryption,
        }
    }
}

/// Bounded list of scan results.
pub type ScanList = Vec<NetworkRecord, MAX_NETWORKS>;

/// Synchronous, blocking scan service provided by the radio driver.
/// Each call yields a complete, fresh result set.
pub trait NetworkScanner {
    fn perform_scan(&mut self) -> Result<ScanList, RadioFault>;
}

/// The result set of one scan, tagged with a generation number.
#[derive(Debug, Clone, Default)]
pub struct ScanGeneration {
    id: u32,
    networks: ScanList,
}

impl ScanGeneration {
    /// The empty generation 0 that exists before the first scan.
    pub const fn empty() -> Self {
        Self {
            id: 0,
            networks: Vec::new(),
        }
    }

    /// Produce the generation that follows `self`.
    pub fn succeed(&self, networks: ScanList) -> Self {
        Self {
            id: self.id.wrapping_add(1),
            networks,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn networks(&self) -> &[NetworkRecord] {
        &self.networks
    }

    /// Look up a target index. `None` when out of range for this generation.
    pub fn get(&self, index: u32) -> Option<&NetworkRecord> {
        self.networks.get(usize::try_from(index).ok()?)
    }
}
