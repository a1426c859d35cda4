//! Deauther library: portable WiFi deauthentication engine.
//!
//! Contains the attack lifecycle, radio mode arbitration, capture-to-inject
//! pipeline, frame encoding and the operator protocol, with no platform
//! dependencies, testable on any host with `cargo test`. The ESP-IDF
//! firmware in `firmware-std/` is a thin consumer that implements the
//! [`radio::Radio`], [`radio::Transmit`] and [`scan::NetworkScanner`]
//! traits and wires the control surfaces to [`comm::dispatch`].
//!
//! Module layering, bottom to top:
//! - `frame`, `defaults`, `config`, `error`: data and constants.
//! - `radio`, `channel`, `scan`: radio primitives and the mode controller.
//! - `capture`: the callback-side pipeline, shared with the driver context.
//! - `attack`: the lifecycle engine that owns all of the above.
//! - `protocol`, `comm`, `board`: operator I/O.

#![cfg_attr(not(test), no_std)]

pub mod attack;
pub mod board;
pub mod capture;
pub mod channel;
pub mod comm;
pub mod config;
pub mod defaults;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod radio;
pub mod scan;

#[cfg(test)]
mod testing;
