/// 802.11 frame codec: the deauthentication frame we inject and the fixed
/// MAC header prefix we read from captured traffic.
///
/// Everything here is pure and allocation-free; it is called from the
/// capture callback, which may run in driver/ISR context.
use core::fmt;

use crate::protocol::MacString;

/// Frame control for a deauthentication frame: type 0 (management),
/// subtype 12, no flags. Transmitted as `C0 00`.
pub const FRAME_CONTROL_DEAUTH: [u8; 2] = [0xC0, 0x00];

/// Duration/ID written into every deauthentication frame (312 µs).
pub const DEAUTH_DURATION: u16 = 0x0138;

/// Fragment number / sequence number. Held at zero: no real sequence
/// management is performed, receivers that drop duplicate sequence numbers
/// may ignore repeats of the same burst.
pub const DEAUTH_SEQUENCE: u16 = 0x0000;

/// Encoded size of a deauthentication frame (no FCS; the radio appends it).
pub const DEAUTH_FRAME_LEN: usize = 26;

/// Size of the fixed MAC header prefix parsed from captured frames:
/// frame control, duration, three addresses, sequence control.
pub const MAC_HEADER_LEN: usize = 24;

/// A 6-byte IEEE 802 MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Group bit set (includes broadcast).
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub fn octets(&self) -> &[u8; 6] {
        &self.0
    }

    /// Render as "AA:BB:CC:DD:EE:FF" into a fixed-capacity string.
    pub fn to_mac_string(&self) -> MacString {
        let mut buf = MacString::new();
        format_mac(&self.0, &mut buf);
        buf
    }

    fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(MacAddr)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

/// Format a 6-byte MAC address into "AA:BB:CC:DD:EE:FF" string
pub fn format_mac(mac: &[u8; 6], buf: &mut MacString) {
    use core::fmt::Write;
    let _ = write!(buf, "{}", MacAddr(*mac));
}

/// A deauthentication frame.
///
/// Frame control is not a field: it is always [`FRAME_CONTROL_DEAUTH`].
/// Addresses are fixed by [`build_deauth`]; [`DeauthFrame::with_station`]
/// only swaps the destination and keeps the AP, so a frame never carries
/// half of an old (station, AP) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeauthFrame {
    duration: u16,
    station: MacAddr,
    sender: MacAddr,
    bssid: MacAddr,
    sequence: u16,
    reason: u16,
}

/// Build a deauthentication frame addressed to `station`, spoofed as coming
/// from `sender` within BSS `bssid`.
pub fn build_deauth(reason: u16, station: MacAddr, sender: MacAddr, bssid: MacAddr) -> DeauthFrame {
    DeauthFrame {
        duration: DEAUTH_DURATION,
        station,
        sender,
        bssid,
        sequence: DEAUTH_SEQUENCE,
        reason,
    }
}

impl DeauthFrame {
    pub fn station(&self) -> MacAddr {
        self.station
    }

    pub fn sender(&self) -> MacAddr {
        self.sender
    }

    pub fn bssid(&self) -> MacAddr {
        self.bssid
    }

    pub fn reason(&self) -> u16 {
        self.reason
    }

    /// Same AP and reason, different destination station.
    pub fn with_station(&self, station: MacAddr) -> Self {
        Self { station, ..*self }
    }

    /// Encode to wire order. Multi-byte fields are little-endian.
    ///
    /// ```text
    /// 0      2        4         10       16      22        24
    /// | fc   | dur    | station | sender | bssid | seq     | reason |
    /// ```
    pub fn encode(&self) -> [u8; DEAUTH_FRAME_LEN] {
        let mut out = [0u8; DEAUTH_FRAME_LEN];
        out[0..2].copy_from_slice(&FRAME_CONTROL_DEAUTH);
        out[2..4].copy_from_slice(&self.duration.to_le_bytes());
        out[4..10].copy_from_slice(&self.station.0);
        out[10..16].copy_from_slice(&self.sender.0);
        out[16..22].copy_from_slice(&self.bssid.0);
        out[22..24].copy_from_slice(&self.sequence.to_le_bytes());
        out[24..26].copy_from_slice(&self.reason.to_le_bytes());
        out
    }
}

/// 802.11 frame type, from frame-control bits 2..3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Management,
    Control,
    Data,
    Extension,
}

impl FrameKind {
    pub fn from_frame_control(fc: u16) -> Self {
        match (fc >> 2) & 0x3 {
            0 => FrameKind::Management,
            1 => FrameKind::Control,
            2 => FrameKind::Data,
            _ => FrameKind::Extension,
        }
    }
}

/// The fixed prefix of a captured 802.11 frame.
///
/// Address meaning depends on the DS bits; for the frames we act on,
/// `addr1` is the receiver, `addr2` the transmitter and `addr3` the BSSID
/// (or destination, for to-DS data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacHeader {
    pub frame_control: u16,
    pub duration: u16,
    pub addr1: MacAddr,
    pub addr2: MacAddr,
    pub addr3: MacAddr,
    pub sequence_control: u16,
}

/// A captured frame split into its header and the bytes after it.
#[derive(Debug, Clone, Copy)]
pub struct CapturedFrame<'a> {
    pub header: MacHeader,
    pub body: &'a [u8],
}

impl MacHeader {
    /// Parse the 24-byte header prefix. Returns `None` for short frames
    /// (control frames such as ACK/CTS are 10–16 bytes and never qualify).
    pub fn parse(frame: &[u8]) -> Option<CapturedFrame<'_>> {
        if frame.len() < MAC_HEADER_LEN {
            return None;
        }
        let header = MacHeader {
            frame_control: u16::from_le_bytes([frame[0], frame[1]]),
            duration: u16::from_le_bytes([frame[2], frame[3]]),
            addr1: MacAddr::from_slice(&frame[4..10])?,
            addr2: MacAddr::from_slice(&frame[10..16])?,
            addr3: MacAddr::from_slice(&frame[16..22])?,
            sequence_control: u16::from_le_bytes([frame[22], frame[23]]),
        };
        Some(CapturedFrame {
            header,
            body: &frame[MAC_HEADER_LEN..],
        })
    }

    pub fn kind(&self) -> FrameKind {
        FrameKind::from_frame_control(self.frame_control)
    }

    /// Management subtype (frame-control bits 4..7).
    pub fn subtype(&self) -> u8 {
        ((self.frame_control >> 4) & 0xF) as u8
    }
}
