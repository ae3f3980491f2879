use docsis_core::{DeviceKind, EntityId, SimTime};
use docsis_entities::{DocsisEntityTrait, MessageQueue};
use docsis_saps::SapMsg;

/// Entity for testing purposes. Collects every SapMsg it receives, with the
/// virtual time of reception, for later inspection.
pub struct Sink {
    id: EntityId,
    msgqueue: Vec<(SimTime, SapMsg)>,
}

impl Sink {
    pub fn new(id: EntityId) -> Self {
        Self { id, msgqueue: vec![] }
    }

    pub fn take_msgqueue(&mut self) -> Vec<(SimTime, SapMsg)> {
        std::mem::take(&mut self.msgqueue)
    }
}

impl DocsisEntityTrait for Sink {
    fn entity(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::User
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        tracing::debug!(t = %queue.now(), "sink {} rx_prim: {}", self.id, message.msg);
        self.msgqueue.push((queue.now(), message));
    }
}
