use std::collections::BTreeMap;
use std::time::Duration;

use docsis_config::SharedConfig;
use docsis_core::{ChannelId, DeviceKind, Direction, EntityId, MacAddress, Sap, Sid, SimTime, UpstreamMode};
use docsis_pdus::data::pdu_header::DataPdu;
use docsis_pdus::mac::enums::mac_header_type::MacHeaderType;
use docsis_pdus::mac::fields::ext_header::ExtHeaderElement;
use docsis_pdus::mac::pdus::concatenation::decode_concatenated;
use docsis_pdus::mac::pdus::mac_header::MacHeader;
use docsis_pdus::mgmt::enums::ie_type::IeType;
use docsis_pdus::mgmt::pdus::map_msg::build_map_frame;
use docsis_pdus::mgmt::pdus::mgmt_header::MAX_MMM_PACKET_SIZE;
use docsis_saps::ctrl::*;
use docsis_saps::phy::{PhyDeliverInd, PhyTransmitCompleteInd, TxTag};
use docsis_saps::timer::TimerMapInterval;
use docsis_saps::upper::UpperUnitdataInd;
use docsis_saps::{SapMsg, SapMsgInner};

use crate::cmts::components::ul_sched::{Grant, UlChannelDesc};
use crate::common::tx_serializer::{PendingTx, TxSerializer};
use crate::observer::{DeviceObserver, ObserverList, TraceKind};
use crate::{DocsisEntityTrait, MessagePrio, MessageQueue};

/// Picks the downstream channel for a destination, None to fall back to the default choice
pub type ChannelSelector = Box<dyn Fn(MacAddress) -> Option<ChannelId> + Send>;

/// What the head-end knows about an attached modem
#[derive(Debug, Clone)]
pub struct CmRecord {
    pub entity: EntityId,
    pub distance: Duration,
    pub upstream: Vec<ServiceDesc>,
    pub downstream: Vec<ServiceDesc>,
}

impl CmRecord {
    fn add_service(&mut self, s: ServiceDesc) {
        let list = match s.direction {
            Direction::Upstream => &mut self.upstream,
            Direction::Downstream => &mut self.downstream,
        };
        if !list.iter().any(|x| x.sid == s.sid && x.channel == s.channel) {
            list.push(s);
        }
    }
}

/// Cable modem termination system: schedules the upstream channels through MAPs
/// and sends downstream traffic
pub struct Cmts {
    config: SharedConfig,
    self_entity: EntityId,
    address: MacAddress,

    medium: Option<EntityId>,
    upper: Option<EntityId>,

    cms: BTreeMap<MacAddress, CmRecord>,
    /// One per upstream channel, indexed by UCID
    channels: Vec<UlChannelDesc>,
    tx: TxSerializer,
    selector: Option<ChannelSelector>,
    map_timer_running: bool,

    observers: ObserverList,
}

impl Cmts {
    pub fn new(self_entity: EntityId, config: SharedConfig, address: MacAddress) -> Self {
        let cfg = config.config();
        let channels = cfg
            .medium
            .upstream
            .iter()
            .enumerate()
            .map(|(i, c)| UlChannelDesc::new(i as ChannelId, c))
            .collect();
        let tx = TxSerializer::new(Direction::Downstream, cfg.num_downstream());
        Self {
            config,
            self_entity,
            address,
            medium: None,
            upper: None,
            cms: BTreeMap::new(),
            channels,
            tx,
            selector: None,
            map_timer_running: false,
            observers: ObserverList::default(),
        }
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn is_attached(&self) -> bool {
        self.medium.is_some()
    }

    pub fn set_upper(&mut self, upper: EntityId) {
        self.upper = Some(upper);
    }

    pub fn add_observer(&mut self, observer: Box<dyn DeviceObserver + Send>) {
        self.observers.add(observer);
    }

    pub fn set_channel_selector(&mut self, selector: ChannelSelector) {
        self.selector = Some(selector);
    }

    pub fn cm(&self, address: MacAddress) -> Option<&CmRecord> {
        self.cms.get(&address)
    }

    pub fn cm_addresses(&self) -> Vec<MacAddress> {
        self.cms.keys().copied().collect()
    }

    pub fn channel(&self, ucid: ChannelId) -> Option<&UlChannelDesc> {
        self.channels.get(ucid as usize)
    }

    pub fn channel_mut(&mut self, ucid: ChannelId) -> Option<&mut UlChannelDesc> {
        self.channels.get_mut(ucid as usize)
    }

    pub fn minislot_duration(&self, ucid: ChannelId) -> Option<Duration> {
        self.channel(ucid).map(|c| c.minislot_duration())
    }

    pub fn set_minislot_duration(&mut self, ucid: ChannelId, d: Duration) {
        if let Some(c) = self.channel_mut(ucid) {
            c.set_minislot_duration(d);
        }
    }

    pub fn time_to_minislot(&self, ucid: ChannelId, t: SimTime) -> Option<u32> {
        self.channel(ucid).map(|c| c.time_to_minislot(t))
    }

    pub fn minislot_to_time(&self, ucid: ChannelId, minislot: u32) -> Option<SimTime> {
        self.channel(ucid).map(|c| c.minislot_to_time(minislot))
    }

    /// Twice the one-way delay of the farthest attached modem
    pub fn calculate_max_rtt(&self) -> Duration {
        self.cms.values().map(|c| c.distance).max().unwrap_or(Duration::ZERO) * 2
    }

    /// Time to send the largest management message at the slowest upstream rate
    fn worst_map_tx_time(&self) -> Duration {
        self.channels
            .iter()
            .map(|c| c.data_rate())
            .min()
            .map_or(Duration::ZERO, |r| r.tx_time(MAX_MMM_PACKET_SIZE))
    }

    /// Last instant a MAP describing an interval that starts at `start_of_map` can be sent
    /// and still reach the farthest modem in time. None if that instant precedes the start
    /// of the simulation.
    pub fn latest_moment_to_send_map(&self, start_of_map: SimTime) -> Option<SimTime> {
        start_of_map.checked_sub(self.worst_map_tx_time() + self.calculate_max_rtt())
    }

    /// Queues `packet` for `dest` on a downstream channel. False if not attached.
    pub fn send(&mut self, queue: &mut MessageQueue, packet: Vec<u8>, dest: MacAddress, protocol: u16) -> bool {
        let t = queue.now();
        if self.medium.is_none() {
            tracing::debug!(t = %t, "head-end not attached, cannot send");
            return false;
        }
        let use_llc = self.config.config().cmts.use_llc;
        let bytes = packet.len();
        let pdu = DataPdu { dst: dest, src: self.address, protocol, packet }.encode(use_llc);
        if pdu.len() > u16::MAX as usize {
            tracing::warn!(t = %t, "packet of {} bytes too large for a MAC frame", bytes);
            return false;
        }
        let channel = self.select_channel(dest);
        self.observers.notify(t, self.address, TraceKind::MacTx { dest, bytes });
        let frame = MacHeader::data_pdu(Direction::Downstream, pdu.len() as u16).encode(&pdu);
        self.submit(queue, channel, frame, Some(dest), TxTag::Downstream);
        true
    }

    fn select_channel(&self, dest: MacAddress) -> ChannelId {
        if let Some(ch) = self.selector.as_ref().and_then(|s| s(dest)) {
            return ch;
        }
        self.cms
            .get(&dest)
            .and_then(|r| r.downstream.first())
            .map_or(0, |s| s.channel)
    }

    fn submit(&mut self, queue: &mut MessageQueue, channel: ChannelId, frame: Vec<u8>, dest: Option<MacAddress>, tag: TxTag) {
        let cfg = self.config.config();
        let Some(ch) = cfg.medium.downstream.get(channel as usize) else {
            tracing::warn!("no downstream channel {}, frame dropped", channel);
            return;
        };
        let tx_time = ch.data_rate.tx_time(frame.len() + cfg.medium.downstream_phy_overhead);
        if let Some(tx) = self.tx.submit(PendingTx { channel, frame, dest, tx_time, tag }) {
            self.start_tx(queue, tx);
        }
    }

    fn start_tx(&mut self, queue: &mut MessageQueue, tx: PendingTx) {
        let Some(medium) = self.medium else {
            return;
        };
        let t = queue.now();
        self.observers.notify(
            t,
            self.address,
            TraceKind::PhyTxBegin { direction: Direction::Downstream, channel: tx.channel, bytes: tx.frame.len() },
        );
        let m = SapMsg::new(
            Sap::PhySap,
            self.self_entity,
            medium,
            t,
            SapMsgInner::PhyTransmitStartReq(tx.into_req(Direction::Downstream)),
        );
        queue.push_back(m);
    }

    fn transmit_complete(&mut self, queue: &mut MessageQueue, ind: PhyTransmitCompleteInd) {
        self.observers.notify(queue.now(), self.address, TraceKind::PhyTxEnd { direction: ind.direction, channel: ind.channel });
        if let Some(next) = self.tx.complete(ind.channel, ind.tag) {
            self.start_tx(queue, next);
        }
    }

    /// Sends a MAP on `channel`, or on every upstream channel
    pub fn force_send_map(&mut self, queue: &mut MessageQueue, channel: Option<ChannelId>) {
        match channel {
            Some(ucid) => self.send_map(queue, ucid),
            None => {
                for ucid in 0..self.channels.len() {
                    self.send_map(queue, ucid as ChannelId);
                }
            }
        }
    }

    fn send_map(&mut self, queue: &mut MessageQueue, ucid: ChannelId) {
        let t = queue.now();
        if self.medium.is_none() {
            return;
        }
        let receivers: Vec<(MacAddress, ChannelId)> = self
            .cms
            .iter()
            .filter(|(_, r)| r.upstream.iter().any(|s| s.channel == ucid))
            .map(|(a, r)| (*a, r.downstream.first().map_or(0, |s| s.channel)))
            .collect();
        if receivers.is_empty() {
            tracing::trace!(t = %t, "ch {}: no modems, no MAP", ucid);
            return;
        }

        let cfg = self.config.config();
        let mut periodic = Vec::new();
        for r in self.cms.values() {
            for s in r.upstream.iter().filter(|s| s.channel == ucid) {
                match s.mode {
                    UpstreamMode::UnsolicitedGrant => {
                        periodic.push(Grant { sid: s.sid, slots: cfg.cmts.ugs_grant_slots, ie_type: IeType::UnsolicitedGrant })
                    }
                    UpstreamMode::RealTimePolling => periodic.push(Grant { sid: s.sid, slots: 1, ie_type: IeType::Request }),
                    UpstreamMode::BestEffort => {}
                }
            }
        }

        // The MAP must not start before the farthest modem can act on it, with one
        // downstream copy per modem ahead of the last one
        let ds_copy = cfg
            .medium
            .downstream
            .iter()
            .map(|c| c.data_rate)
            .min()
            .map_or(Duration::ZERO, |r| r.tx_time(MAX_MMM_PACKET_SIZE + cfg.medium.downstream_phy_overhead));
        let lead = self.worst_map_tx_time() + self.calculate_max_rtt() + ds_copy * receivers.len() as u32;

        let Some(chan) = self.channels.get_mut(ucid as usize) else {
            tracing::warn!("force MAP on unknown upstream channel {}", ucid);
            return;
        };
        let earliest = chan.time_to_minislot(t + lead);
        if chan.last_minislot_grant_sent().saturating_add(1) < earliest {
            tracing::trace!(t = %t, "ch {}: MAP start moved forward to minislot {}", ucid, earliest);
        }
        let map = chan.build_map(earliest, &periodic, &cfg.cmts);
        tracing::debug!(t = %t, "ch {}: {} to {} modems", ucid, map, receivers.len());
        self.observers.notify(
            t,
            self.address,
            TraceKind::MapSent { ucid, start: map.alloc_start_time, elements: map.elements.len() },
        );

        for (addr, ds) in receivers {
            let frame = build_map_frame(addr, self.address, &map);
            self.submit(queue, ds, frame, Some(addr), TxTag::Management);
        }
    }

    fn schedule_map_timer(&mut self, queue: &mut MessageQueue) {
        let Some(interval) = self.config.config().cmts.map_interval else {
            return;
        };
        let m = SapMsg::new(
            Sap::Timer,
            self.self_entity,
            self.self_entity,
            queue.now(),
            SapMsgInner::TimerMapInterval(TimerMapInterval {}),
        );
        queue.schedule(interval, m);
        self.map_timer_running = true;
    }

    fn on_map_timer(&mut self, queue: &mut MessageQueue) {
        self.map_timer_running = false;
        if self.medium.is_none() {
            return;
        }
        self.force_send_map(queue, None);
        self.schedule_map_timer(queue);
    }

    /// Modem owning upstream `sid` on `channel`
    fn find_upstream(&self, sid: Sid, channel: ChannelId) -> Option<MacAddress> {
        self.cms
            .iter()
            .find(|(_, r)| r.upstream.iter().any(|s| s.sid == sid && s.channel == channel))
            .map(|(a, _)| *a)
    }

    fn on_request(&mut self, queue: &mut MessageQueue, channel: ChannelId, sid: Sid, minislots: u32) {
        let t = queue.now();
        if self.find_upstream(sid, channel).is_none() {
            tracing::debug!(t = %t, "request from unknown sid {} on ch {}, ignored", sid, channel);
            return;
        }
        let limit = self.config.config().cmts.short_grant_limit;
        let Some(chan) = self.channels.get_mut(channel as usize) else {
            return;
        };
        chan.on_request(sid, minislots, limit, t);
        // Without periodic MAPs every request is answered right away
        if self.config.config().cmts.map_interval.is_none() {
            self.send_map(queue, channel);
        }
    }

    fn rx_frame(&mut self, queue: &mut MessageQueue, ind: PhyDeliverInd) {
        let t = queue.now();
        self.observers.notify(
            t,
            self.address,
            TraceKind::PhyRxEnd { direction: ind.direction, channel: ind.channel, bytes: ind.frame.len() },
        );
        let (hdr, rest) = match MacHeader::decode(&ind.frame, Direction::Upstream) {
            Ok((hdr, rest, _)) => (hdr, rest),
            Err(e) => {
                tracing::debug!(t = %t, "undecodable upstream frame: {:?}", e);
                self.drop_rx(t, "malformed");
                return;
            }
        };
        let payload = if hdr.is_request() {
            vec![]
        } else {
            match rest.get(..hdr.payload_len as usize) {
                Some(p) => p.to_vec(),
                None => {
                    self.drop_rx(t, "short payload");
                    return;
                }
            }
        };
        self.process_frame(queue, ind.channel, hdr, &payload);
    }

    fn drop_rx(&mut self, t: SimTime, reason: &'static str) {
        self.observers.notify(t, self.address, TraceKind::MacRxDrop { reason });
    }

    fn process_frame(&mut self, queue: &mut MessageQueue, channel: ChannelId, hdr: MacHeader, payload: &[u8]) {
        let t = queue.now();

        // Piggybacked requests ride in the extended header of any frame
        for eh in hdr.ext_headers.iter() {
            if let ExtHeaderElement::Request { minislots, sid } = eh {
                self.on_request(queue, channel, *sid, *minislots as u32);
            }
        }

        match hdr.mac_type {
            Some(MacHeaderType::Request) => {
                if let (Some(sid), Some(slots)) = (hdr.sid, hdr.requested_minislots) {
                    self.on_request(queue, channel, sid, slots as u32);
                }
            }
            Some(MacHeaderType::QueueDepthRequest) => {
                if let (Some(sid), Some(bytes)) = (hdr.sid, hdr.requested_bytes) {
                    let overhead = self.config.config().medium.upstream_phy_overhead;
                    let Some(slots) = self.channel(channel).map(|c| c.bytes_to_minislots(bytes as usize + overhead)) else {
                        return;
                    };
                    self.on_request(queue, channel, sid, slots);
                }
            }
            Some(MacHeaderType::Concatenation) => {
                let count = hdr.frame_count.unwrap_or(0);
                match decode_concatenated(payload, count, Direction::Upstream) {
                    Ok(frames) => {
                        for (h, p) in frames {
                            self.process_frame(queue, channel, h, &p);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(t = %t, "bad concatenation: {:?}", e);
                        self.drop_rx(t, "malformed concatenation");
                    }
                }
            }
            None if hdr.fc_type.is_data() => self.rx_data(queue, payload),
            _ => {
                tracing::debug!(t = %t, "unsupported upstream frame {}", hdr);
                self.drop_rx(t, "unsupported");
            }
        }
    }

    fn rx_data(&mut self, queue: &mut MessageQueue, payload: &[u8]) {
        let t = queue.now();
        let pdu = match DataPdu::decode(payload) {
            Ok(p) => p,
            Err(_) => {
                self.drop_rx(t, "malformed pdu");
                return;
            }
        };
        self.observers.notify(t, self.address, TraceKind::MacRx { src: pdu.src, bytes: pdu.packet.len() });

        // Modem to modem traffic goes back down
        if pdu.dst != self.address && self.cms.contains_key(&pdu.dst) {
            tracing::debug!(t = %t, "relaying {} bytes {} -> {}", pdu.packet.len(), pdu.src, pdu.dst);
            self.relay(queue, pdu);
            return;
        }
        let Some(upper) = self.upper else {
            tracing::trace!(t = %t, "no upper entity, {} bytes from {} discarded", pdu.packet.len(), pdu.src);
            return;
        };
        let m = SapMsg::new(
            Sap::UpperSap,
            self.self_entity,
            upper,
            t,
            SapMsgInner::UpperUnitdataInd(UpperUnitdataInd {
                packet: pdu.packet,
                src: pdu.src,
                dst: pdu.dst,
                protocol: pdu.protocol,
            }),
        );
        queue.push_back(m);
    }

    /// Forwards a modem's PDU to another modem, keeping its source address
    fn relay(&mut self, queue: &mut MessageQueue, pdu: DataPdu) {
        let use_llc = self.config.config().cmts.use_llc;
        let dest = pdu.dst;
        let bytes = pdu.encode(use_llc);
        let channel = self.select_channel(dest);
        let frame = MacHeader::data_pdu(Direction::Downstream, bytes.len() as u16).encode(&bytes);
        self.submit(queue, channel, frame, Some(dest), TxTag::Downstream);
    }

    fn attach(&mut self, queue: &mut MessageQueue, medium: EntityId) {
        let t = queue.now();
        if self.medium.is_some() {
            tracing::debug!(t = %t, "head-end already attached");
            return;
        }
        self.medium = Some(medium);
        tracing::info!(t = %t, "head-end {} attaching to {}", self.address, medium);
        self.ctrl_to_medium(
            queue,
            SapMsgInner::CtrlDeviceAttach(CtrlDeviceAttach {
                kind: DeviceKind::Cmts,
                address: self.address,
                distance: Duration::ZERO,
                services: vec![],
            }),
        );
        self.observers.notify(t, self.address, TraceKind::LinkUp);
        if !self.map_timer_running {
            self.schedule_map_timer(queue);
        }
    }

    fn ctrl_to_medium(&self, queue: &mut MessageQueue, msg: SapMsgInner) {
        let Some(medium) = self.medium else {
            return;
        };
        let m = SapMsg::new(Sap::Control, self.self_entity, medium, queue.now(), msg);
        queue.push_prio(m, MessagePrio::Immediate);
    }

    fn detach(&mut self, queue: &mut MessageQueue) {
        if self.medium.is_none() {
            return;
        }
        self.ctrl_to_medium(queue, SapMsgInner::CtrlDeviceDetach(CtrlDeviceDetach { address: self.address }));
        self.teardown(queue);
    }

    fn teardown(&mut self, queue: &mut MessageQueue) {
        let t = queue.now();
        tracing::info!(t = %t, "head-end {} detached, forgetting {} modems", self.address, self.cms.len());
        self.medium = None;
        self.cms.clear();
        for c in self.channels.iter_mut() {
            c.grants_mut().clear();
        }
        self.tx.clear();
        self.observers.notify(t, self.address, TraceKind::LinkDown);
    }

    fn set_address(&mut self, queue: &mut MessageQueue, new: MacAddress) {
        let old = self.address;
        if old == new {
            return;
        }
        if self.medium.is_some() {
            self.ctrl_to_medium(queue, SapMsgInner::CtrlAddressChange(CtrlAddressChange { old, new }));
        } else {
            self.apply_address(queue.now(), new);
        }
    }

    fn apply_address(&mut self, t: SimTime, new: MacAddress) {
        let old = self.address;
        tracing::info!(t = %t, "head-end address {} -> {}", old, new);
        self.address = new;
        self.observers.notify(t, new, TraceKind::AddressChange { old, new });
    }

    fn cm_attached(&mut self, t: SimTime, att: CtrlCmAttached) {
        let mut rec = CmRecord { entity: att.cm, distance: att.distance, upstream: vec![], downstream: vec![] };
        for s in att.services {
            rec.add_service(s);
        }
        tracing::info!(t = %t, "modem {} up: {} upstream, {} downstream services", att.address, rec.upstream.len(), rec.downstream.len());
        self.cms.insert(att.address, rec);
    }

    fn cm_detached(&mut self, t: SimTime, address: MacAddress) {
        let Some(rec) = self.cms.remove(&address) else {
            return;
        };
        // Grants for the modem's services are of no use anymore
        for s in rec.upstream.iter() {
            if let Some(c) = self.channels.get_mut(s.channel as usize) {
                c.grants_mut().retain(|g| g.sid != s.sid);
            }
        }
        tracing::info!(t = %t, "modem {} gone", address);
    }

    fn cm_address_changed(&mut self, t: SimTime, change: CtrlAddressChange) {
        if self.cms.contains_key(&change.new) {
            tracing::warn!(t = %t, "modem address {} already known, ignoring change from {}", change.new, change.old);
            return;
        }
        let Some(rec) = self.cms.remove(&change.old) else {
            tracing::debug!(t = %t, "address change of unknown modem {}", change.old);
            return;
        };
        tracing::debug!(t = %t, "modem {} re-keyed to {}", change.old, change.new);
        self.cms.insert(change.new, rec);
    }

    fn rx_control(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        let t = queue.now();
        match message.msg {
            SapMsgInner::CtrlAttachReq(req) => self.attach(queue, req.medium),
            SapMsgInner::CtrlDetachReq(_) => self.detach(queue),
            SapMsgInner::CtrlDetachedInd(_) => {
                if self.medium == Some(message.src) {
                    self.teardown(queue);
                }
            }
            SapMsgInner::CtrlSetAddressReq(req) => self.set_address(queue, req.address),
            SapMsgInner::CtrlCmAttached(att) => self.cm_attached(t, att),
            SapMsgInner::CtrlCmDetached(det) => self.cm_detached(t, det.address),
            SapMsgInner::CtrlAddressChange(change) => self.cm_address_changed(t, change),
            SapMsgInner::CtrlAddressChangeCnf(cnf) if Some(message.src) == self.medium => {
                if cnf.accepted && cnf.old == self.address {
                    self.apply_address(t, cnf.new);
                } else {
                    tracing::warn!(t = %t, "medium refused head-end address {}", cnf.new);
                }
            }
            SapMsgInner::CtrlServiceAdded(added) => match self.cms.get_mut(&added.address) {
                Some(rec) => rec.add_service(added.service),
                None => tracing::debug!(t = %t, "service for unknown modem {}", added.address),
            },
            SapMsgInner::CtrlForceSendMap(req) => self.force_send_map(queue, req.channel),
            _ => tracing::warn!("Cmts: unexpected control primitive {}", message.msg),
        }
    }
}

impl DocsisEntityTrait for Cmts {
    fn entity(&self) -> EntityId {
        self.self_entity
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Cmts
    }

    fn set_config(&mut self, config: SharedConfig) {
        self.config = config;
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        tracing::trace!("Cmts rx_prim: {}", message.msg);
        match message.sap {
            Sap::Control => self.rx_control(queue, message),
            Sap::PhySap => match message.msg {
                SapMsgInner::PhyDeliverInd(ind) => self.rx_frame(queue, ind),
                SapMsgInner::PhyTransmitCompleteInd(ind) => self.transmit_complete(queue, ind),
                _ => tracing::warn!("Cmts: unexpected phy primitive {}", message.msg),
            },
            Sap::Timer => match message.msg {
                SapMsgInner::TimerMapInterval(_) => self.on_map_timer(queue),
                _ => tracing::warn!("Cmts: unexpected timer {}", message.msg),
            },
            Sap::UpperSap => match message.msg {
                SapMsgInner::UpperUnitdataReq(req) => {
                    self.send(queue, req.packet, req.dest, req.protocol);
                }
                _ => tracing::warn!("Cmts: unexpected upper primitive {}", message.msg),
            },
        }
    }
}
