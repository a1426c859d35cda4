//! Deauther: ESP-IDF std firmware
//!
//! Thread-based implementation using FreeRTOS threads and std::sync::mpsc
//! channels. The control loop on the main thread owns the attack engine;
//! the serial reader and the TCP control surface only feed it commands.

mod radio;
mod surface;

use std::io::Read;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use deauther::attack::{AttackEngine, SurfaceAvailability};
use deauther::config::EngineConfig;
use deauther::defaults::{FLUSH_TIMEOUT_MS, STATUS_INTERVAL_SECS};
use deauther::protocol::{DeviceMessage, HostCommand, MsgBuffer, MAX_MSG_LEN, VERSION};
use deauther::{board, comm};

use comm::LineReader;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{Input, Pin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use radio::{EspRadio, PIPELINE};
use surface::Outbound;

/// Boot time, captured once in main, used for uptime calculation.
static BOOT_INSTANT: Mutex<Option<Instant>> = Mutex::new(None);

fn uptime_secs() -> u32 {
    BOOT_INSTANT
        .lock()
        .ok()
        .and_then(|i| i.map(|boot| boot.elapsed().as_secs() as u32))
        .unwrap_or(0)
}

/// Sends every message to the serial console and, when a client is
/// connected, to the control surface.
struct Output {
    surface_tx: SyncSender<Outbound>,
}

impl Output {
    fn send(&self, msg: &DeviceMessage) {
        let mut buf = MsgBuffer::new();
        buf.resize_default(MAX_MSG_LEN).ok();
        if let Some(len) = comm::serialize_message(msg, &mut buf) {
            buf.truncate(len);
            if let Ok(s) = std::str::from_utf8(&buf) {
                log::info!("{}", s.trim_end());
            }
            let _ = self.surface_tx.try_send(Outbound::Line(buf));
        }
    }

    /// Block until the surface thread has written everything queued so far,
    /// at most [`FLUSH_TIMEOUT_MS`].
    fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        if self.surface_tx.try_send(Outbound::Flush(ack_tx)).is_err() {
            log::warn!("Control surface queue full, not flushing");
            return;
        }
        let timeout = Duration::from_millis(FLUSH_TIMEOUT_MS.into());
        if ack_rx.recv_timeout(timeout).is_err() {
            log::warn!("Control surface flush timed out after {} ms", FLUSH_TIMEOUT_MS);
        }
    }
}

/// Edge detector for an active-low button.
struct StopButton<'d, P: Pin> {
    pin: PinDriver<'d, P, Input>,
    was_pressed: bool,
}

impl<'d, P: Pin> StopButton<'d, P> {
    fn new(pin: PinDriver<'d, P, Input>) -> Self {
        Self {
            pin,
            was_pressed: false,
        }
    }

    /// True once per press.
    fn pressed(&mut self) -> bool {
        let pressed = self.pin.is_low();
        let edge = pressed && !self.was_pressed;
        self.was_pressed = pressed;
        edge
    }
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();

    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    if let Ok(mut boot) = BOOT_INSTANT.lock() {
        *boot = Some(Instant::now());
    }

    log::info!("Deauther v{} starting on {} (std)", VERSION, board::BOARD_NAME);

    // ── Peripherals ──────────────────────────────────────────────────

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // Hold power on (M5StickC Plus2)
    #[cfg(feature = "m5stickc")]
    let _power_hold = {
        let mut p = PinDriver::output(peripherals.pins.gpio4)?;
        p.set_high()?;
        p
    };

    #[cfg(feature = "m5stickc")]
    let mut button = {
        // GPIO37 is input-only with an external pull-up
        let pin = PinDriver::input(peripherals.pins.gpio37)?;
        StopButton::new(pin)
    };
    #[cfg(not(feature = "m5stickc"))]
    let mut button = {
        let mut pin = PinDriver::input(peripherals.pins.gpio0)?;
        pin.set_pull(esp_idf_svc::hal::gpio::Pull::Up)?;
        StopButton::new(pin)
    };
    log::info!("Stop button on GPIO{}", board::STOP_BUTTON_PIN);

    // ── Channels ─────────────────────────────────────────────────────

    let (cmd_tx, cmd_rx) = mpsc::sync_channel::<HostCommand>(4);
    let (surface_tx, surface_rx) = mpsc::sync_channel::<Outbound>(8);

    // ── Serial command thread ────────────────────────────────────────

    let serial_cmd_tx = cmd_tx.clone();
    thread::Builder::new()
        .name("serial".into())
        .stack_size(4096)
        .spawn(move || serial_thread(serial_cmd_tx))?;
    log::info!("Serial thread spawned");

    // ── Control surface thread ───────────────────────────────────────

    thread::Builder::new()
        .name("surface".into())
        .stack_size(6144)
        .spawn(move || surface::surface_thread(cmd_tx, surface_rx))?;
    log::info!("Control surface thread spawned");

    // ── Engine ───────────────────────────────────────────────────────

    let esp_radio = EspRadio::new(peripherals.modem, sys_loop, nvs)?;
    let config = EngineConfig::new();
    let mut engine = AttackEngine::new(esp_radio, FreeRtos, &PIPELINE, config);
    engine.bring_up()?;
    if let Err(e) = engine.rescan() {
        log::warn!("Initial scan failed: {}", e);
    }
    log::info!("Access point '{}' up", deauther::defaults::AP_SSID);

    let output = Output { surface_tx };
    control_loop(&mut engine, &cmd_rx, &mut button, &output, config)
}

/// Owns the engine: commands, the stop button, channel hopping and the
/// periodic status report.
fn control_loop<P: Pin>(
    engine: &mut AttackEngine<'static, EspRadio, FreeRtos>,
    cmd_rx: &Receiver<HostCommand>,
    button: &mut StopButton<'_, P>,
    output: &Output,
    config: EngineConfig,
) -> anyhow::Result<()> {
    let hop = Duration::from_millis(config.hop_interval_ms.into());
    let status_every = Duration::from_secs(STATUS_INTERVAL_SECS);
    let mut last_status = Instant::now();

    loop {
        surface::SERVING.store(engine.surface() == SurfaceAvailability::Serving, Ordering::Release);

        match cmd_rx.recv_timeout(hop) {
            Ok(cmd) => {
                let _ = comm::dispatch(engine, cmd, uptime_secs(), |msg| output.send(msg), || output.flush());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                anyhow::bail!("command channel disconnected");
            }
        }

        if button.pressed() && engine.state().is_active() {
            log::info!("Stop button pressed");
            let _ = comm::dispatch(engine, HostCommand::Stop, uptime_secs(), |msg| output.send(msg), || output.flush());
        }

        if let Err(e) = engine.tick() {
            comm::emit_error(&e, &mut |msg: &DeviceMessage<'_>| output.send(msg));
        }

        if last_status.elapsed() >= status_every {
            last_status = Instant::now();
            output.send(&comm::status_message(&engine.status(), uptime_secs()));
        }
    }
}

// ── Serial command thread ────────────────────────────────────────────

/// Reads NDJSON commands from the console. Available in every radio mode,
/// so it doubles as the out-of-band stop.
fn serial_thread(cmd_tx: SyncSender<HostCommand>) {
    log::info!("Serial thread started");
    let mut reader = LineReader::new();
    let mut stdin = std::io::stdin();
    let mut byte = [0u8; 1];

    loop {
        match stdin.read(&mut byte) {
            Ok(1) => {
                if let Some(line) = reader.feed(byte[0]) {
                    match comm::parse_command(line) {
                        Some(cmd) => {
                            let _ = cmd_tx.try_send(cmd);
                        }
                        None => log::warn!("Ignoring malformed command"),
                    }
                }
            }
            // The console returns immediately when no byte is pending
            _ => thread::sleep(Duration::from_millis(20)),
        }
    }
}
