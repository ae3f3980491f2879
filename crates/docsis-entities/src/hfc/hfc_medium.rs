use std::collections::BTreeMap;
use std::time::Duration;

use docsis_config::SharedConfig;
use docsis_core::{ChannelId, ChannelStatus, DeviceKind, Direction, EntityId, MacAddress, Sap, SimTime};
use docsis_saps::ctrl::*;
use docsis_saps::phy::{PhyDeliverInd, PhyTransmitCompleteInd, PhyTransmitStartReq};
use docsis_saps::timer::TimerChannelComplete;
use docsis_saps::{SapMsg, SapMsgInner};

use crate::hfc::channel_state::{ChannelState, ChannelTxn};
use crate::{DocsisEntityTrait, MessagePrio, MessageQueue};

/// A modem known to the medium
#[derive(Debug, Clone)]
pub struct CmEntry {
    pub entity: EntityId,
    pub distance: Duration,
    pub services: Vec<ServiceDesc>,
}

/// Shared hybrid fibre-coax plant between one head-end and any number of modems.
/// Serializes transmissions per channel and delivers frames after transmission
/// time plus propagation delay.
pub struct Hfc {
    config: SharedConfig,
    self_entity: EntityId,

    cmts: Option<(EntityId, MacAddress)>,
    cms: BTreeMap<MacAddress, CmEntry>,

    /// Sized once from configuration
    upstream: Vec<ChannelState>,
    downstream: Vec<ChannelState>,
}

impl Hfc {
    pub fn new(self_entity: EntityId, config: SharedConfig) -> Self {
        let (num_us, num_ds) = {
            let c = config.config();
            (c.num_upstream(), c.num_downstream())
        };
        tracing::info!("Hfc {}: {} upstream, {} downstream channels", self_entity, num_us, num_ds);
        Self {
            config,
            self_entity,
            cmts: None,
            cms: BTreeMap::new(),
            upstream: (0..num_us).map(|_| ChannelState::default()).collect(),
            downstream: (0..num_ds).map(|_| ChannelState::default()).collect(),
        }
    }

    pub fn cmts(&self) -> Option<(EntityId, MacAddress)> {
        self.cmts
    }

    pub fn is_cm_attached(&self, address: MacAddress) -> bool {
        self.cms.contains_key(&address)
    }

    pub fn cm(&self, address: MacAddress) -> Option<&CmEntry> {
        self.cms.get(&address)
    }

    pub fn cm_addresses(&self) -> Vec<MacAddress> {
        self.cms.keys().copied().collect()
    }

    pub fn num_cms(&self) -> usize {
        self.cms.len()
    }

    pub fn channel_status(&self, direction: Direction, channel: ChannelId) -> Option<ChannelStatus> {
        self.channels(direction).get(channel as usize).map(|c| c.status())
    }

    pub fn channel_queue_len(&self, direction: Direction, channel: ChannelId) -> usize {
        self.channels(direction).get(channel as usize).map_or(0, |c| c.queue_len())
    }

    fn channels(&self, direction: Direction) -> &Vec<ChannelState> {
        match direction {
            Direction::Upstream => &self.upstream,
            Direction::Downstream => &self.downstream,
        }
    }

    fn channels_mut(&mut self, direction: Direction) -> &mut Vec<ChannelState> {
        match direction {
            Direction::Upstream => &mut self.upstream,
            Direction::Downstream => &mut self.downstream,
        }
    }

    fn ctrl(&self, queue: &mut MessageQueue, dest: EntityId, msg: SapMsgInner) {
        let m = SapMsg::new(Sap::Control, self.self_entity, dest, queue.now(), msg);
        queue.push_prio(m, MessagePrio::Immediate);
    }

    fn cm_by_entity(&self, entity: EntityId) -> Option<(MacAddress, &CmEntry)> {
        self.cms.iter().find(|(_, e)| e.entity == entity).map(|(a, e)| (*a, e))
    }

    fn attach_cmts(&mut self, queue: &mut MessageQueue, entity: EntityId, address: MacAddress) {
        let t = queue.now();
        match self.cmts {
            Some((old, _)) if old == entity => {
                tracing::debug!(t = %t, "head-end {} already attached", entity);
                return;
            }
            Some((old, old_addr)) => {
                // Single head-end: the previous one is dropped, modems stay on the plant
                tracing::info!(t = %t, "head-end {} ({}) replaced by {}", old, old_addr, entity);
                self.purge_sender(old);
                self.ctrl(queue, old, SapMsgInner::CtrlDetachedInd(CtrlDetachedInd {}));
            }
            None => {}
        }
        tracing::info!(t = %t, "head-end {} attached as {}", entity, address);
        self.cmts = Some((entity, address));

        // Tell the new head-end about every modem already present
        let notes: Vec<CtrlCmAttached> = self
            .cms
            .iter()
            .map(|(addr, e)| CtrlCmAttached {
                cm: e.entity,
                address: *addr,
                distance: e.distance,
                services: e.services.clone(),
            })
            .collect();
        for n in notes.into_iter().rev() {
            self.ctrl(queue, entity, SapMsgInner::CtrlCmAttached(n));
        }
    }

    fn attach_cm(&mut self, queue: &mut MessageQueue, entity: EntityId, att: CtrlDeviceAttach) {
        let t = queue.now();
        if self.cms.contains_key(&att.address) || self.cm_by_entity(entity).is_some() {
            tracing::debug!(t = %t, "modem {} ({}) already attached, ignoring", entity, att.address);
            return;
        }
        tracing::info!(t = %t, "modem {} attached as {} at {:?}", entity, att.address, att.distance);
        self.cms.insert(
            att.address,
            CmEntry { entity, distance: att.distance, services: att.services.clone() },
        );
        if let Some((cmts, _)) = self.cmts {
            self.ctrl(
                queue,
                cmts,
                SapMsgInner::CtrlCmAttached(CtrlCmAttached {
                    cm: entity,
                    address: att.address,
                    distance: att.distance,
                    services: att.services,
                }),
            );
        }
    }

    fn detach(&mut self, queue: &mut MessageQueue, entity: EntityId, address: MacAddress) {
        let t = queue.now();
        if self.cmts.is_some_and(|(e, _)| e == entity) {
            self.detach_cmts(queue);
            return;
        }
        match self.cms.get(&address) {
            Some(e) if e.entity == entity => {}
            _ => {
                tracing::debug!(t = %t, "detach of unknown device {} ({}) ignored", entity, address);
                return;
            }
        }
        self.cms.remove(&address);
        self.purge_sender(entity);
        tracing::info!(t = %t, "modem {} ({}) detached", entity, address);
        if let Some((cmts, _)) = self.cmts {
            self.ctrl(queue, cmts, SapMsgInner::CtrlCmDetached(CtrlCmDetached { address }));
        }
    }

    /// Removes the head-end and every modem with it
    fn detach_cmts(&mut self, queue: &mut MessageQueue) {
        let Some((cmts, addr)) = self.cmts.take() else {
            return;
        };
        tracing::info!(t = %queue.now(), "head-end {} ({}) detached, detaching {} modems", cmts, addr, self.cms.len());
        self.purge_sender(cmts);
        let cms = std::mem::take(&mut self.cms);
        for (_, e) in cms.into_iter() {
            self.purge_sender(e.entity);
            self.ctrl(queue, e.entity, SapMsgInner::CtrlDetachedInd(CtrlDetachedInd {}));
        }
    }

    fn change_address(&mut self, queue: &mut MessageQueue, entity: EntityId, change: CtrlAddressChange) {
        let accepted = self.rekey(queue.now(), entity, &change);
        if accepted {
            if let Some((cmts, _)) = self.cmts.filter(|(e, _)| *e != entity) {
                self.ctrl(queue, cmts, SapMsgInner::CtrlAddressChange(CtrlAddressChange { old: change.old, new: change.new }));
            }
        }
        let cnf = CtrlAddressChangeCnf { old: change.old, new: change.new, accepted };
        self.ctrl(queue, entity, SapMsgInner::CtrlAddressChangeCnf(cnf));
    }

    /// Moves the device from `change.old` to `change.new`; false leaves the plant untouched
    fn rekey(&mut self, t: SimTime, entity: EntityId, change: &CtrlAddressChange) -> bool {
        if self.cms.contains_key(&change.new) || self.cmts.is_some_and(|(e, a)| e != entity && a == change.new) {
            tracing::warn!(t = %t, "address {} already in use on the plant, {} keeps {}", change.new, entity, change.old);
            return false;
        }
        if let Some((e, addr)) = self.cmts.as_mut() {
            if *e == entity {
                tracing::info!(t = %t, "head-end address {} -> {}", addr, change.new);
                *addr = change.new;
                return true;
            }
        }
        match self.cms.get(&change.old) {
            Some(e) if e.entity == entity => {}
            _ => {
                tracing::debug!(t = %t, "address change from unattached device {} refused", entity);
                return false;
            }
        }
        if let Some(entry) = self.cms.remove(&change.old) {
            self.cms.insert(change.new, entry);
        }
        tracing::info!(t = %t, "modem {} re-keyed {} -> {}", entity, change.old, change.new);
        true
    }

    fn service_added(&mut self, queue: &mut MessageQueue, entity: EntityId, added: CtrlServiceAdded) {
        match self.cms.get_mut(&added.address) {
            Some(e) if e.entity == entity => e.services.push(added.service),
            _ => {
                tracing::debug!("service added on unattached device {} ignored", entity);
                return;
            }
        }
        if let Some((cmts, _)) = self.cmts {
            self.ctrl(queue, cmts, SapMsgInner::CtrlServiceAdded(added));
        }
    }

    fn purge_sender(&mut self, entity: EntityId) {
        let dropped: usize = self
            .upstream
            .iter_mut()
            .chain(self.downstream.iter_mut())
            .map(|c| c.purge_sender(entity))
            .sum();
        if dropped > 0 {
            tracing::debug!("dropped {} queued frames of {}", dropped, entity);
        }
    }

    fn transmit_start(&mut self, queue: &mut MessageQueue, sender: EntityId, req: PhyTransmitStartReq) {
        let t = queue.now();
        let (direction, channel) = (req.direction, req.channel);
        if channel as usize >= self.channels(direction).len() {
            tracing::warn!(t = %t, "{} transmit on unknown channel {} from {}, dropping", direction, channel, sender);
            return;
        }
        let distance = match direction {
            Direction::Upstream => match self.cm_by_entity(sender) {
                Some((_, e)) => e.distance,
                None => {
                    tracing::debug!(t = %t, "upstream transmit from unattached {}, dropping", sender);
                    return;
                }
            },
            Direction::Downstream => {
                if !self.cmts.is_some_and(|(e, _)| e == sender) {
                    tracing::debug!(t = %t, "downstream transmit from non-head-end {}, dropping", sender);
                    return;
                }
                Duration::ZERO
            }
        };

        let ch = &mut self.channels_mut(direction)[channel as usize];
        match ch.start_or_queue(ChannelTxn { sender, distance, req }) {
            Some(tx_time) => {
                tracing::trace!(t = %t, "{} ch {} busy for {:?}", direction, channel, tx_time);
                self.schedule_complete(queue, direction, channel, tx_time);
            }
            None => {
                tracing::debug!(t = %t, "{} ch {} busy, queued frame from {} ({} waiting)", direction, channel, sender, ch.queue_len());
            }
        }
    }

    fn schedule_complete(&self, queue: &mut MessageQueue, direction: Direction, channel: ChannelId, tx_time: Duration) {
        let m = SapMsg::new(
            Sap::Timer,
            self.self_entity,
            self.self_entity,
            queue.now(),
            SapMsgInner::TimerChannelComplete(TimerChannelComplete { direction, channel }),
        );
        queue.schedule(tx_time, m);
    }

    fn transmit_complete(&mut self, queue: &mut MessageQueue, direction: Direction, channel: ChannelId) {
        let t = queue.now();
        let Some(ch) = self.channels_mut(direction).get_mut(channel as usize) else {
            return;
        };
        let Some(txn) = ch.finish() else {
            tracing::warn!(t = %t, "{} ch {} completion without frame in flight", direction, channel);
            return;
        };
        tracing::trace!(t = %t, "{} ch {} idle", direction, channel);

        let ChannelTxn { sender, distance, req } = txn;
        let tag = req.tag;
        self.deliver(queue, sender, distance, req);

        // Sender learns its frame left the channel
        let done = SapMsg::new(
            Sap::PhySap,
            self.self_entity,
            sender,
            t,
            SapMsgInner::PhyTransmitCompleteInd(PhyTransmitCompleteInd { direction, channel, tag }),
        );
        queue.push_back(done);

        let ch = &mut self.channels_mut(direction)[channel as usize];
        if let Some(tx_time) = ch.start_next() {
            self.schedule_complete(queue, direction, channel, tx_time);
        }
    }

    fn deliver(&self, queue: &mut MessageQueue, sender: EntityId, distance: Duration, req: PhyTransmitStartReq) {
        let t = queue.now();
        let PhyTransmitStartReq { direction, channel, frame, dest, .. } = req;
        let mut send = |queue: &mut MessageQueue, to: EntityId, delay: Duration, frame: Vec<u8>| {
            let m = SapMsg::new(
                Sap::PhySap,
                self.self_entity,
                to,
                t,
                SapMsgInner::PhyDeliverInd(PhyDeliverInd { direction, channel, frame }),
            );
            queue.schedule(delay, m);
        };

        match direction {
            Direction::Upstream => match self.cmts {
                Some((cmts, _)) => send(queue, cmts, distance, frame),
                None => tracing::debug!(t = %t, "upstream frame from {} with no head-end attached", sender),
            },
            Direction::Downstream => match dest {
                Some(addr) if !addr.is_broadcast() => match self.cms.get(&addr) {
                    Some(e) => send(queue, e.entity, e.distance, frame),
                    None => tracing::debug!(t = %t, "downstream frame for absent {}, dropped", addr),
                },
                _ => {
                    for e in self.cms.values() {
                        send(queue, e.entity, e.distance, frame.clone());
                    }
                }
            },
        }
    }

    fn rx_control(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        let src = message.src;
        match message.msg {
            SapMsgInner::CtrlDeviceAttach(att) => match att.kind {
                DeviceKind::Cmts => self.attach_cmts(queue, src, att.address),
                DeviceKind::Cm => self.attach_cm(queue, src, att),
                other => tracing::warn!("cannot attach a {:?} to the medium", other),
            },
            SapMsgInner::CtrlDeviceDetach(det) => self.detach(queue, src, det.address),
            SapMsgInner::CtrlAddressChange(change) => self.change_address(queue, src, change),
            SapMsgInner::CtrlServiceAdded(added) => self.service_added(queue, src, added),
            _ => tracing::warn!("Hfc: unexpected control primitive {}", message.msg),
        }
    }
}

impl DocsisEntityTrait for Hfc {
    fn entity(&self) -> EntityId {
        self.self_entity
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Hfc
    }

    fn set_config(&mut self, config: SharedConfig) {
        self.config = config;
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        match message.sap {
            Sap::Control => self.rx_control(queue, message),
            Sap::PhySap => match message.msg {
                SapMsgInner::PhyTransmitStartReq(req) => self.transmit_start(queue, message.src, req),
                _ => tracing::warn!("Hfc: unexpected phy primitive {}", message.msg),
            },
            Sap::Timer => match message.msg {
                SapMsgInner::TimerChannelComplete(tc) => self.transmit_complete(queue, tc.direction, tc.channel),
                _ => tracing::warn!("Hfc: unexpected timer {}", message.msg),
            },
            _ => tracing::warn!("Hfc: unexpected sap {:?}", message.sap),
        }
    }
}
