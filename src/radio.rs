/// Radio mode controller: the single arbiter between the two roles the
/// one physical radio can play.
///
/// - `ControlPlane`: the radio broadcasts the operator access point that
///   carries the control surface.
/// - `Monitor`: promiscuous capture and raw injection.
///
/// The hardware cannot run both, so every switch is
/// tear down → settle → bring up, with no overlap window. While switching
/// (and after a refused switch) no mode is active.
use embedded_hal::delay::DelayNs;

use crate::defaults::{CHANNEL_MAX, CHANNEL_MIN};
use crate::error::{RadioFault, RadioOp};

/// The two mutually exclusive radio roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    ControlPlane,
    Monitor,
}

impl RadioMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RadioMode::ControlPlane => "control",
            RadioMode::Monitor => "monitor",
        }
    }
}

/// Which frame classes the capture callback receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFilter {
    pub management: bool,
    pub data: bool,
}

impl CaptureFilter {
    /// Management and data frames: everything that can reveal a
    /// station/AP pair.
    pub const MGMT_AND_DATA: CaptureFilter = CaptureFilter {
        management: true,
        data: true,
    };
}

/// Radio primitives consumed by the engine. Implemented by the platform
/// driver (ESP-IDF in `firmware-std`) and by test mocks.
///
/// None of these retry; a refusal is reported once as a [`RadioFault`].
pub trait Radio {
    /// Stop whatever role is running (AP, STA, promiscuous mode).
    fn tear_down(&mut self) -> Result<(), RadioFault>;

    /// Bring up `mode` on a torn-down radio.
    fn enter_mode(&mut self, mode: RadioMode) -> Result<(), RadioFault>;

    /// Tune the primary channel (2.4 GHz, 1..=13).
    fn set_channel(&mut self, channel: u8) -> Result<(), RadioFault>;

    /// Start delivering frames that match `filter` to the capture pipeline.
    fn register_capture_callback(&mut self, filter: CaptureFilter) -> Result<(), RadioFault>;

    /// Stop delivering frames. Must be harmless when nothing is registered.
    fn unregister_capture_callback(&mut self) -> Result<(), RadioFault>;
}

/// Raw frame transmit primitive.
///
/// Takes `&self` because it is called from the capture callback, which
/// runs outside the control loop and cannot borrow the [`Radio`].
pub trait Transmit {
    fn transmit_raw(&self, frame: &[u8]) -> Result<(), RadioFault>;
}

/// Owns the radio and enforces the mode transition protocol.
pub struct RadioController<R, D> {
    radio: R,
    delay: D,
    settle_ms: u32,
    mode: Option<RadioMode>,
    channel: u8,
    capture_registered: bool,
}

impl<R: Radio, D: DelayNs> RadioController<R, D> {
    /// Wrap a radio that has not been brought up yet.
    pub fn new(radio: R, delay: D, settle_ms: u32) -> Self {
        Self {
            radio,
            delay,
            settle_ms,
            mode: None,
            channel: CHANNEL_MIN,
            capture_registered: false,
        }
    }

    /// Currently active role, `None` while down or after a refused switch.
    pub fn mode(&self) -> Option<RadioMode> {
        self.mode
    }

    /// Last channel successfully applied.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn capture_registered(&self) -> bool {
        self.capture_registered
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Bring up the operator access point. Drops monitor mode first.
    pub fn enter_control_plane(&mut self) -> Result<(), RadioFault> {
        self.switch_to(RadioMode::ControlPlane)
    }

    /// Bring up promiscuous capture/inject. Drops the access point first,
    /// which disconnects every control-plane client.
    pub fn enter_monitor(&mut self) -> Result<(), RadioFault> {
        self.switch_to(RadioMode::Monitor)
    }

    fn switch_to(&mut self, target: RadioMode) -> Result<(), RadioFault> {
        log::debug!(
            "Radio switch {} -> {}",
            self.mode.map_or("down", |m| m.as_str()),
            target.as_str()
        );

        self.mode = None;
        self.radio.tear_down()?;
        // Tearing down the role also drops any capture registration
        self.capture_registered = false;

        self.delay.delay_ms(self.settle_ms);

        self.radio.enter_mode(target)?;
        self.mode = Some(target);
        Ok(())
    }

    /// Tune to `channel`. Out-of-range channels are refused without
    /// touching the radio.
    pub fn set_channel(&mut self, channel: u8) -> Result<(), RadioFault> {
        if !(CHANNEL_MIN..=CHANNEL_MAX).contains(&channel) {
            return Err(RadioFault::new(RadioOp::SetChannel(channel), 0));
        }
        self.radio.set_channel(channel)?;
        self.channel = channel;
        Ok(())
    }

    /// Capture callbacks only make sense in monitor mode.
    pub fn register_capture(&mut self, filter: CaptureFilter) -> Result<(), RadioFault> {
        if self.mode != Some(RadioMode::Monitor) {
            return Err(RadioFault::new(RadioOp::RegisterCapture, 0));
        }
        self.radio.register_capture_callback(filter)?;
        self.capture_registered = true;
        Ok(())
    }

    pub fn unregister_capture(&mut self) -> Result<(), RadioFault> {
        if !self.capture_registered {
            return Ok(());
        }
        self.radio.unregister_capture_callback()?;
        self.capture_registered = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDelay, MockRadio, RadioCall};

    fn controller() -> RadioController<MockRadio, MockDelay> {
        RadioController::new(MockRadio::new(), MockDelay::default(), 100)
    }

    #[test]
    fn starts_with_no_mode() {
        let ctl = controller();
        assert_eq!(ctl.mode(), None);
        assert!(!ctl.capture_registered());
    }

    #[test]
    fn switch_sequence_is_teardown_settle_bringup() {
        let mut ctl = controller();
        ctl.enter_monitor().unwrap();
        assert_eq!(ctl.mode(), Some(RadioMode::Monitor));
        assert_eq!(
            ctl.radio().calls,
            vec![RadioCall::TearDown, RadioCall::EnterMode(RadioMode::Monitor)]
        );
        assert_eq!(ctl.delay.total_ms, 100);
        assert_eq!(ctl.radio().active, Some(RadioMode::Monitor));
    }

    #[test]
    fn reentering_same_mode_repeats_full_sequence() {
        let mut ctl = controller();
        ctl.enter_control_plane().unwrap();
        ctl.enter_control_plane().unwrap();
        assert_eq!(ctl.mode(), Some(RadioMode::ControlPlane));
        assert_eq!(ctl.radio().calls.len(), 4);
        assert_eq!(ctl.delay.total_ms, 200);
    }

    #[test]
    fn refused_bringup_leaves_no_mode() {
        let mut ctl = controller();
        ctl.enter_control_plane().unwrap();
        ctl.radio_mut().fail_on = Some(RadioOp::EnterMode(RadioMode::Monitor));

        let err = ctl.enter_monitor().unwrap_err();
        assert_eq!(err.op, RadioOp::EnterMode(RadioMode::Monitor));
        assert_eq!(ctl.mode(), None);
    }

    #[test]
    fn refused_teardown_skips_settle() {
        let mut ctl = controller();
        ctl.radio_mut().fail_on = Some(RadioOp::TearDown);
        assert!(ctl.enter_monitor().is_err());
        assert_eq!(ctl.mode(), None);
        assert_eq!(ctl.delay.total_ms, 0);
    }

    #[test]
    fn channel_range_is_enforced() {
        let mut ctl = controller();
        assert!(ctl.set_channel(0).is_err());
        assert!(ctl.set_channel(14).is_err());
        assert!(ctl.radio().calls.is_empty());

        ctl.set_channel(13).unwrap();
        assert_eq!(ctl.channel(), 13);
        assert_eq!(ctl.radio().channel, 13);
    }

    #[test]
    fn capture_requires_monitor_mode() {
        let mut ctl = controller();
        ctl.enter_control_plane().unwrap();
        assert!(ctl.register_capture(CaptureFilter::MGMT_AND_DATA).is_err());

        ctl.enter_monitor().unwrap();
        ctl.register_capture(CaptureFilter::MGMT_AND_DATA).unwrap();
        assert!(ctl.capture_registered());
        assert!(ctl.radio().capture.is_some());
    }

    #[test]
    fn unregister_without_registration_is_noop() {
        let mut ctl = controller();
        ctl.unregister_capture().unwrap();
        assert!(ctl.radio().calls.is_empty());
    }

    #[test]
    fn mode_switch_clears_registration() {
        let mut ctl = controller();
        ctl.enter_monitor().unwrap();
        ctl.register_capture(CaptureFilter::MGMT_AND_DATA).unwrap();
        ctl.enter_control_plane().unwrap();
        assert!(!ctl.capture_registered());
        assert!(ctl.radio().capture.is_none());
    }
}
