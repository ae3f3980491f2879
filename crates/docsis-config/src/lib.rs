//! Configuration management for the DOCSIS MAC simulator
//!
//! This crate provides configuration loading and parsing:
//! - TOML configuration file parsing
//! - Channel plan, head-end, modem and traffic configuration structures
//! - Shared mutable state such as the address pool

pub mod stack_config;
pub mod toml_config;

pub use stack_config::*;
pub use toml_config::*;
