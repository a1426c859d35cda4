/// Error kinds surfaced by the attack engine.
///
/// Lower components (radio controller, channel walker) only ever return
/// [`RadioFault`]. The attack lifecycle is the single place that converts a
/// fault into a state reset and wraps it in [`AttackError`].
use core::fmt;

use thiserror::Error;

use crate::radio::RadioMode;

/// The radio operation that was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioOp {
    TearDown,
    EnterMode(RadioMode),
    SetChannel(u8),
    RegisterCapture,
    UnregisterCapture,
    Transmit,
    Scan,
}

impl fmt::Display for RadioOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioOp::TearDown => f.write_str("tear down"),
            RadioOp::EnterMode(mode) => write!(f, "enter {} mode", mode.as_str()),
            RadioOp::SetChannel(ch) => write!(f, "set channel {ch}"),
            RadioOp::RegisterCapture => f.write_str("register capture callback"),
            RadioOp::UnregisterCapture => f.write_str("unregister capture callback"),
            RadioOp::Transmit => f.write_str("transmit raw frame"),
            RadioOp::Scan => f.write_str("scan"),
        }
    }
}

/// The radio subsystem refused an operation.
///
/// `code` carries the driver's native error code (`esp_err_t` on ESP-IDF),
/// or 0 when the refusal did not come from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("radio refused to {op} (code {code})")]
pub struct RadioFault {
    pub op: RadioOp,
    pub code: i32,
}

impl RadioFault {
    pub const fn new(op: RadioOp, code: i32) -> Self {
        Self { op, code }
    }
}

/// Errors returned by the attack lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttackError {
    /// Target index missing or out of range for the current scan generation.
    #[error("invalid target {index:?}: scan generation {generation} has {available} networks")]
    InvalidTarget {
        index: Option<u32>,
        generation: u32,
        available: usize,
    },

    /// A radio mode switch, channel change or capture registration failed.
    /// The engine is back in `Idle` when this is returned.
    #[error(transparent)]
    RadioFault(#[from] RadioFault),

    /// The request needs the control-plane role but an attack is running.
    #[error("an attack is active")]
    AttackActive,
}

impl AttackError {
    /// Short machine-readable kind, used in device messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AttackError::InvalidTarget { .. } => "invalid_target",
            AttackError::RadioFault(_) => "radio_fault",
            AttackError::AttackActive => "attack_active",
        }
    }
}
