//! Test doubles shared by the unit tests: a scriptable radio, a delay that
//! only keeps count, and a transmitter that records frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use embedded_hal::delay::DelayNs;

use crate::error::{RadioFault, RadioOp};
use crate::frame::{MacAddr, MAC_HEADER_LEN};
use crate::radio::{CaptureFilter, Radio, RadioMode, Transmit};
use crate::scan::{Encryption, NetworkRecord, NetworkScanner, ScanList};

pub const AP_A: MacAddr = MacAddr([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
pub const AP_B: MacAddr = MacAddr([0x10, 0x20, 0x30, 0x40, 0x50, 0x61]);
pub const AP_C: MacAddr = MacAddr([0x34, 0x12, 0x78, 0x56, 0xBC, 0x9A]);
pub const STA_1: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x01]);
pub const STA_2: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x02]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioCall {
    TearDown,
    EnterMode(RadioMode),
    SetChannel(u8),
    RegisterCapture(CaptureFilter),
    UnregisterCapture,
}

/// Radio double. Records every accepted call; refuses the call whose
/// operation equals `fail_on`.
pub struct MockRadio {
    pub calls: Vec<RadioCall>,
    pub active: Option<RadioMode>,
    pub channel: u8,
    pub capture: Option<CaptureFilter>,
    pub fail_on: Option<RadioOp>,
    pub scan_results: ScanList,
    pub scans: u32,
}

impl MockRadio {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            active: None,
            channel: 1,
            capture: None,
            fail_on: None,
            scan_results: ScanList::new(),
            scans: 0,
        }
    }

    /// A radio whose scanner reports one network per `(bssid, channel)`.
    pub fn with_networks(networks: &[(MacAddr, u8)]) -> Self {
        let mut radio = Self::new();
        for (i, &(bssid, channel)) in networks.iter().enumerate() {
            let ssid = format!("net-{i}");
            radio
                .scan_results
                .push(NetworkRecord::new(&ssid, bssid, channel, -40 - i as i8, Encryption::Wpa2Psk))
                .unwrap();
        }
        radio
    }

    fn check(&self, op: RadioOp) -> Result<(), RadioFault> {
        if self.fail_on == Some(op) {
            return Err(RadioFault::new(op, -1));
        }
        Ok(())
    }
}

impl Radio for MockRadio {
    fn tear_down(&mut self) -> Result<(), RadioFault> {
        self.check(RadioOp::TearDown)?;
        self.calls.push(RadioCall::TearDown);
        self.active = None;
        self.capture = None;
        Ok(())
    }

    fn enter_mode(&mut self, mode: RadioMode) -> Result<(), RadioFault> {
        self.check(RadioOp::EnterMode(mode))?;
        assert!(self.active.is_none(), "bring-up without tear-down");
        self.calls.push(RadioCall::EnterMode(mode));
        self.active = Some(mode);
        Ok(())
    }

    fn set_channel(&mut self, channel: u8) -> Result<(), RadioFault> {
        self.check(RadioOp::SetChannel(channel))?;
        self.calls.push(RadioCall::SetChannel(channel));
        self.channel = channel;
        Ok(())
    }

    fn register_capture_callback(&mut self, filter: CaptureFilter) -> Result<(), RadioFault> {
        self.check(RadioOp::RegisterCapture)?;
        self.calls.push(RadioCall::RegisterCapture(filter));
        self.capture = Some(filter);
        Ok(())
    }

    fn unregister_capture_callback(&mut self) -> Result<(), RadioFault> {
        self.check(RadioOp::UnregisterCapture)?;
        self.calls.push(RadioCall::UnregisterCapture);
        self.capture = None;
        Ok(())
    }
}

impl NetworkScanner for MockRadio {
    fn perform_scan(&mut self) -> Result<ScanList, RadioFault> {
        self.check(RadioOp::Scan)?;
        self.scans += 1;
        Ok(self.scan_results.clone())
    }
}

/// Delay that returns immediately and keeps a running total.
#[derive(Debug, Default)]
pub struct MockDelay {
    pub total_ms: u32,
    pub total_ns: u64,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += ms;
    }
}

/// Transmitter that records every frame it accepts.
pub struct RecordingTx {
    frames: Mutex<Vec<Vec<u8>>>,
    fail: AtomicBool,
}

impl RecordingTx {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        let tx = Self::new();
        tx.fail.store(true, Ordering::SeqCst);
        tx
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

impl Transmit for RecordingTx {
    fn transmit_raw(&self, frame: &[u8]) -> Result<(), RadioFault> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RadioFault::new(RadioOp::Transmit, -1));
        }
        self.frames.lock().unwrap().push(frame.to_vec());
        Ok(())
    }
}

/// A to-DS data frame header followed by a few body bytes.
pub fn data_frame(addr1: MacAddr, addr2: MacAddr, addr3: MacAddr) -> Vec<u8> {
    let mut raw = vec![0u8; MAC_HEADER_LEN + 8];
    raw[0] = 0x08;
    raw[1] = 0x01;
    raw[4..10].copy_from_slice(addr1.octets());
    raw[10..16].copy_from_slice(addr2.octets());
    raw[16..22].copy_from_slice(addr3.octets());
    raw
}
