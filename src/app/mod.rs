//! Application layer: serial ingestion, message dispatch, and the port
//! traits the sequencing core talks through.
//!
//! The core itself lives in [`crate::engine`]; this layer wires it to the
//! outside world. All interaction with hardware happens through the traits
//! in [`ports`], so every loop here runs on the host against mocks.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
