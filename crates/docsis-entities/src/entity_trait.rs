use as_any::AsAny;
use docsis_config::SharedConfig;
use docsis_core::{DeviceKind, EntityId};
use docsis_saps::SapMsg;

use crate::MessageQueue;

/// Trait for everything that lives in the simulation: the medium, the head-end, modems
/// and the users above them. Used by MessageRouter for passing messages between entities.
pub trait DocsisEntityTrait: Send + AsAny {
    /// Returns the handle this entity is registered under
    fn entity(&self) -> EntityId;

    fn kind(&self) -> DeviceKind;

    /// Handle incoming SAP primitive
    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg);

    /// Update configuration (optional)
    #[allow(dead_code)]
    fn set_config(&mut self, _config: SharedConfig) {}
}
