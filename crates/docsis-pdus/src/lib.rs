//! Wire formats of the cable MAC
//!
//! - `mac`: the generic MAC frame header with its extended header elements
//! - `mgmt`: the MAC management envelope and the bandwidth allocation MAP
//! - `data`: the packet PDU header (and optional LLC/SNAP) carried in data frames

pub mod data;
pub mod mac;
pub mod mgmt;
