use std::collections::BTreeMap;
use std::time::Duration;

use docsis_config::{CfgModem, SharedConfig};
use docsis_core::{BitBuffer, ChannelId, DeviceKind, Direction, EntityId, MacAddress, Sap, Sid, SimTime, UpstreamMode};
use docsis_pdus::data::pdu_header::DataPdu;
use docsis_pdus::mac::enums::mac_header_type::MacHeaderType;
use docsis_pdus::mac::pdus::mac_header::{MAC_HEADER_FIXED_LEN, MacHeader};
use docsis_pdus::mgmt::pdus::map_msg::MapMessage;
use docsis_pdus::mgmt::pdus::mgmt_header::{MGMT_HEADER_LEN, MgmtHeader};
use docsis_saps::ctrl::*;
use docsis_saps::phy::{PhyDeliverInd, PhyTransmitCompleteInd, TxTag};
use docsis_saps::timer::TimerCmService;
use docsis_saps::upper::UpperUnitdataInd;
use docsis_saps::{SapMsg, SapMsgInner};

use crate::cm::components::upstream_service::{ServiceAction, ServiceEvent, UpstreamService};
use crate::common::tx_serializer::{PendingTx, TxSerializer};
use crate::observer::{DeviceObserver, ObserverList, TraceKind};
use crate::{DocsisEntityTrait, MessagePrio, MessageQueue};

/// Cable modem. Owns its upstream service flows and reaches the medium only
/// through its entity handle.
pub struct Cm {
    config: SharedConfig,
    self_entity: EntityId,
    address: MacAddress,
    /// Provisioning used to create the default services on attach
    profile: CfgModem,

    medium: Option<EntityId>,
    upper: Option<EntityId>,

    upstream: BTreeMap<Sid, UpstreamService>,
    downstream: Vec<ServiceDesc>,
    /// Service used by `send`
    default_sid: Option<Sid>,

    tx: TxSerializer,
    observers: ObserverList,
}

impl Cm {
    /// Modem with the provisioning the configuration holds for `address`, if any
    pub fn new(self_entity: EntityId, config: SharedConfig, address: MacAddress) -> Self {
        let profile = config
            .config()
            .modems
            .iter()
            .find(|m| m.address == Some(address))
            .cloned()
            .unwrap_or(CfgModem {
                address: Some(address),
                sid: 1,
                upstream_channel: 0,
                downstream_channel: 0,
                mode: UpstreamMode::BestEffort,
                distance: Duration::ZERO,
            });
        Self::with_profile(self_entity, config, address, profile)
    }

    pub fn with_profile(self_entity: EntityId, config: SharedConfig, address: MacAddress, profile: CfgModem) -> Self {
        let num_us = config.config().num_upstream();
        Self {
            config,
            self_entity,
            address,
            profile,
            medium: None,
            upper: None,
            upstream: BTreeMap::new(),
            downstream: vec![],
            default_sid: None,
            tx: TxSerializer::new(Direction::Upstream, num_us),
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

    pub fn upstream_service(&self, sid: Sid) -> Option<&UpstreamService> {
        self.upstream.get(&sid)
    }

    pub fn upstream_sids(&self) -> Vec<Sid> {
        self.upstream.keys().copied().collect()
    }

    pub fn downstream_services(&self) -> &[ServiceDesc] {
        &self.downstream
    }

    /// Queues `packet` for `dest` on the default upstream service.
    /// Returns false if the modem is not attached or the packet cannot be framed.
    pub fn send(&mut self, queue: &mut MessageQueue, packet: Vec<u8>, dest: MacAddress, protocol: u16) -> bool {
        let t = queue.now();
        if self.medium.is_none() {
            tracing::debug!(t = %t, "{} not attached, cannot send", self.address);
            return false;
        }
        let Some(sid) = self.default_sid else {
            tracing::warn!(t = %t, "{} has no upstream service", self.address);
            return false;
        };
        let use_llc = self.config.config().cm.use_llc;
        let bytes = packet.len();
        let pdu = DataPdu { dst: dest, src: self.address, protocol, packet }.encode(use_llc);
        // The whole frame has to fit the 16-bit byte count of a queue-depth request
        if MAC_HEADER_FIXED_LEN + pdu.len() > u16::MAX as usize {
            tracing::warn!(t = %t, "{} packet of {} bytes too large for a MAC frame", self.address, bytes);
            return false;
        }
        let Some(svc) = self.upstream.get_mut(&sid) else {
            return false;
        };
        self.observers.notify(t, self.address, TraceKind::MacTx { dest, bytes });
        let actions = svc.enqueue(pdu, t);
        self.apply_actions(queue, sid, actions);
        true
    }

    fn ctrl_to_medium(&self, queue: &mut MessageQueue, msg: SapMsgInner) {
        let Some(medium) = self.medium else {
            return;
        };
        let m = SapMsg::new(Sap::Control, self.self_entity, medium, queue.now(), msg);
        queue.push_prio(m, MessagePrio::Immediate);
    }

    fn attach(&mut self, queue: &mut MessageQueue, medium: EntityId) {
        let t = queue.now();
        if self.medium.is_some() {
            tracing::debug!(t = %t, "{} already attached", self.address);
            return;
        }
        let cfg = self.config.config();
        let up = ServiceDesc {
            sid: self.profile.sid,
            direction: Direction::Upstream,
            channel: self.profile.upstream_channel,
            mode: self.profile.mode,
        };
        let down = ServiceDesc {
            sid: self.profile.sid,
            direction: Direction::Downstream,
            channel: self.profile.downstream_channel,
            mode: self.profile.mode,
        };
        match UpstreamService::new(self.address, &up, &cfg) {
            Some(svc) => {
                self.upstream.insert(up.sid, svc);
                self.default_sid = Some(up.sid);
            }
            None => tracing::warn!("{}: upstream channel {} does not exist", self.address, up.channel),
        }
        self.downstream.push(down);

        self.medium = Some(medium);
        let services = self.services();
        tracing::info!(t = %t, "{} attaching to {} with {} services", self.address, medium, services.len());
        self.ctrl_to_medium(
            queue,
            SapMsgInner::CtrlDeviceAttach(CtrlDeviceAttach {
                kind: DeviceKind::Cm,
                address: self.address,
                distance: self.profile.distance,
                services,
            }),
        );
        self.observers.notify(t, self.address, TraceKind::LinkUp);
    }

    fn services(&self) -> Vec<ServiceDesc> {
        self.upstream.values().map(|s| s.desc()).chain(self.downstream.iter().copied()).collect()
    }

    fn detach(&mut self, queue: &mut MessageQueue) {
        if self.medium.is_none() {
            return;
        }
        self.ctrl_to_medium(queue, SapMsgInner::CtrlDeviceDetach(CtrlDeviceDetach { address: self.address }));
        self.teardown(queue);
    }

    /// Services and pending frames die with the link
    fn teardown(&mut self, queue: &mut MessageQueue) {
        let t = queue.now();
        tracing::info!(t = %t, "{} detached, dropping {} services", self.address, self.upstream.len() + self.downstream.len());
        self.medium = None;
        self.upstream.clear();
        self.downstream.clear();
        self.default_sid = None;
        self.tx.clear();
        self.observers.notify(t, self.address, TraceKind::LinkDown);
    }

    /// While attached the medium decides: the new address is applied once it confirms
    fn set_address(&mut self, queue: &mut MessageQueue, new: MacAddress) {
        let old = self.address;
        if old == new {
            return;
        }
        if self.medium.is_some() {
            tracing::debug!(t = %queue.now(), "{} asking medium for address {}", old, new);
            self.ctrl_to_medium(queue, SapMsgInner::CtrlAddressChange(CtrlAddressChange { old, new }));
        } else {
            self.apply_address(queue.now(), new);
        }
    }

    fn address_change_cnf(&mut self, t: SimTime, cnf: CtrlAddressChangeCnf) {
        if cnf.old != self.address {
            tracing::debug!(t = %t, "{}: stale address confirmation for {}", self.address, cnf.old);
            return;
        }
        if !cnf.accepted {
            tracing::warn!(t = %t, "{}: medium refused address {}", self.address, cnf.new);
            return;
        }
        self.apply_address(t, cnf.new);
    }

    fn apply_address(&mut self, t: SimTime, new: MacAddress) {
        let old = self.address;
        tracing::info!(t = %t, "address {} -> {}", old, new);
        self.address = new;
        for svc in self.upstream.values_mut() {
            svc.set_address(new);
        }
        self.observers.notify(t, new, TraceKind::AddressChange { old, new });
    }

    fn provision(&mut self, queue: &mut MessageQueue, service: ServiceDesc) {
        match service.direction {
            Direction::Upstream => {
                if self.upstream.contains_key(&service.sid) {
                    tracing::warn!("{}: upstream sid {} already provisioned", self.address, service.sid);
                    return;
                }
                let cfg = self.config.config();
                let Some(svc) = UpstreamService::new(self.address, &service, &cfg) else {
                    tracing::warn!("{}: upstream channel {} does not exist", self.address, service.channel);
                    return;
                };
                self.upstream.insert(service.sid, svc);
                self.default_sid.get_or_insert(service.sid);
            }
            Direction::Downstream => self.downstream.push(service),
        }
        tracing::debug!(t = %queue.now(), "{} provisioned {} sid {}", self.address, service.direction, service.sid);
        self.ctrl_to_medium(queue, SapMsgInner::CtrlServiceAdded(CtrlServiceAdded { address: self.address, service }));
    }

    fn apply_actions(&mut self, queue: &mut MessageQueue, sid: Sid, actions: Vec<ServiceAction>) {
        let t = queue.now();
        let Some(channel) = self.upstream.get(&sid).map(|s| s.channel()) else {
            return;
        };
        for action in actions {
            match action {
                ServiceAction::StateChanged { from, to } => {
                    self.observers.notify(t, self.address, TraceKind::ServiceState { sid, from, to });
                }
                ServiceAction::SendRequest { frame, .. } => {
                    self.submit(queue, channel, frame, TxTag::Request { sid });
                }
                ServiceAction::Transmit { frame } => {
                    self.submit(queue, channel, frame, TxTag::Data { sid });
                }
                ServiceAction::ArmTimer { at, kind, generation } => {
                    let m = SapMsg::new(
                        Sap::Timer,
                        self.self_entity,
                        self.self_entity,
                        t,
                        SapMsgInner::TimerCmService(TimerCmService { sid, generation, kind }),
                    );
                    queue.schedule_at(at, m);
                }
                ServiceAction::DropPacket { bytes } => {
                    tracing::debug!(t = %t, "{} sid {} dropped {} byte packet", self.address, sid, bytes);
                    self.observers.notify(t, self.address, TraceKind::PacketDropped { sid });
                }
            }
        }
    }

    fn submit(&mut self, queue: &mut MessageQueue, channel: ChannelId, frame: Vec<u8>, tag: TxTag) {
        let cfg = self.config.config();
        let Some(ch) = cfg.medium.upstream.get(channel as usize) else {
            return;
        };
        let tx_time = ch.data_rate.tx_time(frame.len() + cfg.medium.upstream_phy_overhead);
        let pending = PendingTx { channel, frame, dest: None, tx_time, tag };
        if let Some(tx) = self.tx.submit(pending) {
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
            TraceKind::PhyTxBegin { direction: Direction::Upstream, channel: tx.channel, bytes: tx.frame.len() },
        );
        let m = SapMsg::new(
            Sap::PhySap,
            self.self_entity,
            medium,
            t,
            SapMsgInner::PhyTransmitStartReq(tx.into_req(Direction::Upstream)),
        );
        queue.push_back(m);
    }

    fn transmit_complete(&mut self, queue: &mut MessageQueue, ind: PhyTransmitCompleteInd) {
        let t = queue.now();
        self.observers.notify(t, self.address, TraceKind::PhyTxEnd { direction: ind.direction, channel: ind.channel });
        if let Some(next) = self.tx.complete(ind.channel, ind.tag) {
            self.start_tx(queue, next);
        }
        if let TxTag::Request { sid } = ind.tag {
            if let Some(svc) = self.upstream.get_mut(&sid) {
                let actions = svc.change_state(ServiceEvent::RequestTransmitted, t);
                self.apply_actions(queue, sid, actions);
            }
        }
    }

    fn drop_rx(&mut self, t: SimTime, reason: &'static str) {
        tracing::debug!(t = %t, "{} rx drop: {}", self.address, reason);
        self.observers.notify(t, self.address, TraceKind::MacRxDrop { reason });
    }

    fn rx_frame(&mut self, queue: &mut MessageQueue, ind: PhyDeliverInd) {
        let t = queue.now();
        self.observers.notify(
            t,
            self.address,
            TraceKind::PhyRxEnd { direction: ind.direction, channel: ind.channel, bytes: ind.frame.len() },
        );
        if self.medium.is_none() {
            return;
        }
        let (hdr, rest) = match MacHeader::decode(&ind.frame, Direction::Downstream) {
            Ok((hdr, rest, _)) => (hdr, rest),
            Err(e) => {
                tracing::debug!(t = %t, "{}: undecodable frame: {:?}", self.address, e);
                self.drop_rx(t, "malformed");
                return;
            }
        };
        let Some(payload) = rest.get(..hdr.payload_len as usize) else {
            self.drop_rx(t, "short payload");
            return;
        };

        if hdr.fc_type.is_data() {
            self.rx_data(queue, payload);
            return;
        }
        match hdr.mac_type {
            Some(MacHeaderType::Management) => self.rx_management(queue, payload),
            _ => self.drop_rx(t, "unsupported"),
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
        if pdu.dst != self.address && !pdu.dst.is_broadcast() {
            self.drop_rx(t, "not addressed to us");
            return;
        }
        self.observers.notify(t, self.address, TraceKind::MacRx { src: pdu.src, bytes: pdu.packet.len() });
        let Some(upper) = self.upper else {
            tracing::trace!(t = %t, "{}: no upper entity, {} bytes from {} discarded", self.address, pdu.packet.len(), pdu.src);
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

    fn rx_management(&mut self, queue: &mut MessageQueue, payload: &[u8]) {
        let t = queue.now();
        let mut buf = BitBuffer::from_bytes(payload);
        let Ok(mgmt) = MgmtHeader::from_bitbuf(&mut buf) else {
            self.drop_rx(t, "malformed management header");
            return;
        };
        if !mgmt.is_valid_destination(self.address) {
            // Not for us
            return;
        }
        if !mgmt.is_map_packet() {
            tracing::debug!(t = %t, "{}: ignoring {} message", self.address, mgmt.msg_type);
            return;
        }
        let map = match MapMessage::decode(&payload[MGMT_HEADER_LEN..]) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(t = %t, "{}: bad MAP: {:?}", self.address, e);
                self.drop_rx(t, "malformed map");
                return;
            }
        };
        tracing::trace!(t = %t, "{} rx {}", self.address, map);
        let sids: Vec<Sid> = self.upstream.iter().filter(|(_, s)| s.channel() == map.ucid).map(|(sid, _)| *sid).collect();
        for sid in sids {
            if let Some(svc) = self.upstream.get_mut(&sid) {
                let actions = svc.on_map(&map, t);
                self.apply_actions(queue, sid, actions);
            }
        }
    }

    fn rx_timer(&mut self, queue: &mut MessageQueue, timer: TimerCmService) {
        let t = queue.now();
        let Some(svc) = self.upstream.get_mut(&timer.sid) else {
            tracing::trace!(t = %t, "timer for removed sid {}", timer.sid);
            return;
        };
        let actions = svc.on_timer(timer.kind, timer.generation, t);
        self.apply_actions(queue, timer.sid, actions);
    }

    fn rx_control(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        match message.msg {
            SapMsgInner::CtrlAttachReq(req) => self.attach(queue, req.medium),
            SapMsgInner::CtrlDetachReq(_) => self.detach(queue),
            SapMsgInner::CtrlDetachedInd(_) => {
                if self.medium == Some(message.src) {
                    self.teardown(queue);
                }
            }
            SapMsgInner::CtrlSetAddressReq(req) => self.set_address(queue, req.address),
            SapMsgInner::CtrlAddressChangeCnf(cnf) if Some(message.src) == self.medium => self.address_change_cnf(queue.now(), cnf),
            SapMsgInner::CtrlProvisionServiceReq(req) => self.provision(queue, req.service),
            _ => tracing::warn!("Cm {}: unexpected control primitive {}", self.address, message.msg),
        }
    }
}

impl DocsisEntityTrait for Cm {
    fn entity(&self) -> EntityId {
        self.self_entity
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Cm
    }

    fn set_config(&mut self, config: SharedConfig) {
        self.config = config;
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
        tracing::trace!("Cm {} rx_prim: {}", self.address, message.msg);
        match message.sap {
            Sap::Control => self.rx_control(queue, message),
            Sap::PhySap => match message.msg {
                SapMsgInner::PhyDeliverInd(ind) => self.rx_frame(queue, ind),
                SapMsgInner::PhyTransmitCompleteInd(ind) => self.transmit_complete(queue, ind),
                _ => tracing::warn!("Cm: unexpected phy primitive {}", message.msg),
            },
            Sap::Timer => match message.msg {
                SapMsgInner::TimerCmService(timer) => self.rx_timer(queue, timer),
                _ => tracing::warn!("Cm: unexpected timer {}", message.msg),
            },
            Sap::UpperSap => match message.msg {
                SapMsgInner::UpperUnitdataReq(req) => {
                    self.send(queue, req.packet, req.dest, req.protocol);
                }
                _ => tracing::warn!("Cm: unexpected upper primitive {}", message.msg),
            },
        }
    }
}
