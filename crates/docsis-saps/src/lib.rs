//! Primitives exchanged between the entities of the simulation

pub mod ctrl;
pub mod phy;
pub mod sapmsg;
pub mod timer;
pub mod upper;

pub use sapmsg::*;
