//! Core utilities for the DOCSIS MAC simulator
//!
//! This crate provides fundamental types and utilities used across the stack:
//! - BitBuffer for bit- and byte-level frame manipulation
//! - SimTime and DataRate for the virtual clock and transmission delays
//! - MacAddress and its allocator
//! - Entity handles, SAP identifiers and shared enums
//! - Common macros and debug utilities

pub mod address;
pub mod bitbuffer;
pub mod data_rate;
pub mod debug;
pub mod direction;
pub mod docsis_common;
pub mod docsis_entities;
pub mod pdu_parse_error;
pub mod sim_time;

// Re-export commonly used items
pub use address::*;
pub use bitbuffer::BitBuffer;
pub use data_rate::DataRate;
pub use direction::Direction;
pub use docsis_common::*;
pub use docsis_entities::{DeviceKind, EntityId};
pub use pdu_parse_error::PduParseErr;
pub use sim_time::SimTime;

/// Index of a logical channel within one direction of the medium
pub type ChannelId = u8;

/// Service identifier. Only the low 11 bits travel inside a MAP information element.
pub type Sid = u16;
