#![allow(dead_code)]

pub mod cm;
pub mod cmts;
pub mod common;
pub mod entity_trait;
pub mod factory;
pub mod hfc;
pub mod messagerouter;
pub mod observer;
pub mod user;

// Re-export commonly used items from router
pub use entity_trait::DocsisEntityTrait;
pub use messagerouter::{MessagePrio, MessageQueue, MessageRouter};
