/// Communication layer: NDJSON framing and command dispatch.
///
/// Transports (serial console, TCP control surface) live in the firmware.
/// They feed bytes into a [`LineReader`], parse complete lines with
/// [`parse_command`], and hand the command to [`dispatch`], which runs it
/// against the engine and emits zero or more [`DeviceMessage`]s.
use core::fmt::Write;

use embedded_hal::delay::DelayNs;

use crate::attack::{AttackEngine, AttackMode, Status};
use crate::board;
use crate::defaults::{reason_description, DEFAULT_REASON};
use crate::error::AttackError;
use crate::protocol::{DetailString, DeviceMessage, HostCommand, RawCommand, MAX_MSG_LEN, VERSION};
use crate::radio::Radio;
use crate::scan::NetworkScanner;

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Deserialize a HostCommand from a JSON byte slice.
///
/// `reason` defaults to 1 (unspecified) when absent. Unknown `cmd` values
/// and malformed JSON yield `None`.
pub fn parse_command(data: &[u8]) -> Option<HostCommand> {
    let trimmed = trim_trailing_whitespace(data);
    if trimmed.is_empty() {
        return None;
    }
    let (raw, _) = serde_json_core::from_slice::<RawCommand>(trimmed).ok()?;
    let reason = raw.reason.unwrap_or(DEFAULT_REASON);
    match raw.cmd.as_str() {
        "scan" => Some(HostCommand::Scan),
        "deauth" => Some(HostCommand::Deauth {
            target: raw.target,
            reason,
        }),
        "deauth_all" => Some(HostCommand::DeauthAll { reason }),
        "stop" => Some(HostCommand::Stop),
        "status" => Some(HostCommand::Status),
        _ => None,
    }
}

/// Build a status report from an engine snapshot.
pub fn status_message(status: &Status, uptime_secs: u32) -> DeviceMessage<'static> {
    DeviceMessage::Status {
        state: status.state.as_str(),
        eliminated: status.eliminated,
        ch: status.channel,
        radio: status.radio.map_or("down", |m| m.as_str()),
        surface: status.surface.as_str(),
        tx_errors: status.tx_errors,
        scan_gen: status.scan_generation,
        networks: status.networks as u32,
        uptime: uptime_secs,
        board: board::BOARD_NAME,
        version: VERSION,
    }
}

/// Emit an `error` message describing `err`.
pub fn emit_error<F>(err: &AttackError, emit: &mut F)
where
    F: FnMut(&DeviceMessage<'_>),
{
    let mut detail = DetailString::new();
    let _ = write!(detail, "{}", err);
    emit(&DeviceMessage::Error {
        kind: err.kind(),
        detail: &detail,
    });
}

/// Run one host command against the engine.
///
/// Replies go through `emit` in order. For attack commands a `starting`
/// acknowledgement goes out first, then `flush` is called and must not
/// return until queued replies have left the transport: a client on the
/// access point loses its link as soon as the radio switches. On failure
/// an `error` message is emitted and the error is also returned.
pub fn dispatch<R, D, F, L>(
    engine: &mut AttackEngine<'_, R, D>,
    cmd: HostCommand,
    uptime_secs: u32,
    mut emit: F,
    mut flush: L,
) -> Result<(), AttackError>
where
    R: Radio + NetworkScanner,
    D: DelayNs,
    F: FnMut(&DeviceMessage<'_>),
    L: FnMut(),
{
    let result = match cmd {
        HostCommand::Scan => scan(engine, &mut emit),
        HostCommand::Deauth { target, reason } => {
            start(engine, target, AttackMode::Single, reason, &mut emit, &mut flush)
        }
        HostCommand::DeauthAll { reason } => {
            start(engine, None, AttackMode::Broadcast, reason, &mut emit, &mut flush)
        }
        HostCommand::Stop => {
            let eliminated = engine.status().eliminated;
            engine.stop().map(|()| {
                emit(&DeviceMessage::Stopped { eliminated });
            })
        }
        HostCommand::Status => {
            emit(&status_message(&engine.status(), uptime_secs));
            Ok(())
        }
    };

    if let Err(ref err) = result {
        log::warn!("Command failed: {}", err);
        emit_error(err, &mut emit);
    }
    result
}

fn scan<R, D, F>(engine: &mut AttackEngine<'_, R, D>, emit: &mut F) -> Result<(), AttackError>
where
    R: Radio + NetworkScanner,
    D: DelayNs,
    F: FnMut(&DeviceMessage<'_>),
{
    let generation = engine.rescan()?;
    for (idx, net) in engine.networks().iter().enumerate() {
        let bssid = net.bssid.to_mac_string();
        emit(&DeviceMessage::Network {
            idx: idx as u32,
            ssid: &net.ssid,
            bssid: &bssid,
            ch: net.channel,
            rssi: net.rssi,
            enc: net.encryption.as_str(),
        });
    }
    emit(&DeviceMessage::ScanDone {
        count: engine.networks().len() as u32,
        generation,
    });
    Ok(())
}

fn start<R, D, F, L>(
    engine: &mut AttackEngine<'_, R, D>,
    target: Option<u32>,
    mode: AttackMode,
    reason: u16,
    emit: &mut F,
    flush: &mut L,
) -> Result<(), AttackError>
where
    R: Radio,
    D: DelayNs,
    F: FnMut(&DeviceMessage<'_>),
    L: FnMut(),
{
    emit(&DeviceMessage::Starting {
        mode: mode.as_str(),
        target,
        reason,
    });
    flush();
    engine.start(target, mode, reason)?;
    emit(&DeviceMessage::Started {
        mode: mode.as_str(),
        ch: engine.status().channel,
        reason,
        reason_text: reason_description(reason),
    });
    Ok(())
}

// ── NDJSON line reader ─────────────────────────────────────────────────

/// NDJSON reader state machine.
/// Accumulates bytes until a newline is found, then yields the line.
/// A line longer than [`MAX_MSG_LEN`] is dropped whole.
pub struct LineReader {
    buf: [u8; MAX_MSG_LEN],
    pos: usize,
    discarding: bool,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_MSG_LEN],
            pos: 0,
            discarding: false,
        }
    }

    /// Feed a byte into the reader. Returns a complete line (without newline)
    /// when one is detected.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' || byte == b'\r' {
            if self.discarding {
                self.discarding = false;
                self.pos = 0;
                None
            } else if self.pos > 0 {
                let line = &self.buf[..self.pos];
                self.pos = 0;
                Some(line)
            } else {
                None
            }
        } else if self.discarding {
            None
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            None
        } else {
            // Overflow: drop everything up to the next line break
            log::warn!("Dropping line longer than {} bytes", MAX_MSG_LEN);
            self.pos = 0;
            self.discarding = true;
            None
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_trailing_whitespace(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && matches!(data[end - 1], b' ' | b'\n' | b'\r' | b'\t') {
        end -= 1;
    }
    &data[..end]
}
