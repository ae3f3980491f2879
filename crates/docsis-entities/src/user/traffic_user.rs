use std::time::Duration;

use docsis_core::{DeviceKind, EntityId, MacAddress, Sap, SimTime};
use docsis_saps::timer::TimerTraffic;
use docsis_saps::upper::UpperUnitdataReq;
use docsis_saps::{SapMsg, SapMsgInner};

use crate::{DocsisEntityTrait, MessageQueue};

/// Packets of one size sent to one destination at a fixed interval
#[derive(Debug, Clone)]
pub struct TrafficStream {
    pub to: MacAddress,
    pub size: usize,
    pub protocol: u16,
    pub start: SimTime,
    pub count: u32,
    pub interval: Duration,
}

/// Layer above a device's MAC: injects configured traffic and counts what arrives
pub struct TrafficUser {
    self_entity: EntityId,
    device: Option<EntityId>,
    streams: Vec<(TrafficStream, u32)>,
    rx_packets: usize,
    rx_bytes: usize,
}

impl TrafficUser {
    pub fn new(self_entity: EntityId) -> Self {
        Self { self_entity, device: None, streams: vec![], rx_packets: 0, rx_bytes: 0 }
    }

    pub fn set_device(&mut self, device: EntityId) {
        self.device = Some(device);
    }

    pub fn rx_packets(&self) -> usize {
        self.rx_packets
    }

    pub fn rx_bytes(&self) -> usize {
        self.rx_bytes
    }

    /// Registers `stream` and returns the timer that kicks it off, to be scheduled at its start
    pub fn add_stream(&mut self, stream: TrafficStream) -> (SimTime, SapMsg) {
        let idx = self.streams.len();
        let start = stream.start;
        self.streams.push((stream, 0));
        let m = SapMsg::new(
            Sap::Timer,
            self.self_entity,
            self.self_entity,
            SimTime::ZERO,
            SapMsgInner::TimerTraffic(TimerTraffic { stream: idx }),
        );
        (start, m)
    }

    fn tick(&mut self, queue: &mut MessageQueue, idx: usize) {
        let t = queue.now();
        let Some(device) = self.device else {
            tracing::warn!(t = %t, "user {} has no device, stream {} idle", self.self_entity, idx);
            return;
        };
        let Some((stream, sent)) = self.streams.get_mut(idx) else {
            return;
        };
        if *sent >= stream.count {
            return;
        }
        *sent += 1;
        tracing::debug!(t = %t, "user {}: stream {} packet {}/{} to {}", self.self_entity, idx, sent, stream.count, stream.to);
        let req = UpperUnitdataReq { packet: vec![0u8; stream.size], dest: stream.to, protocol: stream.protocol };
        queue.push_back(SapMsg::new(Sap::UpperSap, self.self_entity, device, t, SapMsgInner::UpperUnitdataReq(req)));

        if *sent < stream.count {
            let next = SapMsg::new(
                Sap::Timer,
                self.self_entity,
                self.self_entity,
                t,
                SapMsgInner::TimerTraffic(TimerTraffic { stream: idx }),
            );
            queue.schedule(stream.interval, next);
        }
    }
}

impl DocsisEntityTrait for TrafficUser {
    fn entity(&self) -> EntityId {
        self.self_entity
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::User
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        match message.msg {
            SapMsgInner::TimerTraffic(timer) => self.tick(queue, timer.stream),
            SapMsgInner::UpperUnitdataInd(ind) => {
                tracing::debug!(t = %queue.now(), "user {}: {} bytes from {}", self.self_entity, ind.packet.len(), ind.src);
                self.rx_packets += 1;
                self.rx_bytes += ind.packet.len();
            }
            _ => tracing::warn!("TrafficUser: unexpected primitive {}", message.msg),
        }
    }
}
