use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use docsis_config::StackConfig;
use docsis_core::{ChannelId, DataRate, Direction, MacAddress, Sid, SimTime, UpstreamMode};
use docsis_pdus::mac::fields::ext_header::ExtHeaderElement;
use docsis_pdus::mac::pdus::mac_header::{MAC_HEADER_FIXED_LEN, MacHeader};
use docsis_pdus::mgmt::enums::ie_type::IeType;
use docsis_pdus::mgmt::pdus::map_msg::MapMessage;
use docsis_saps::ctrl::ServiceDesc;
use docsis_saps::timer::ServiceTimerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Decision,
    ToSendRequest,
    RequestSent,
    WaitForMap,
    ToSend,
    Contention,
}

impl core::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    /// No outside event: the state was just entered
    None,
    NewPacket,
    NewMap,
    /// A timer towards a known instant is armed
    WaitToSend,
    /// The armed instant (granted slot or request opportunity) has come
    ReadyToSend,
    RequestTransmitted,
    MapTimeout,
    BackoffExpired,
}

/// Granted upstream interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: SimTime,
    /// Minislots
    pub length: u16,
}

/// What the owning modem has to do on behalf of the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAction {
    StateChanged { from: ServiceState, to: ServiceState },
    /// Hand a stand-alone bandwidth request to the PHY
    SendRequest { frame: Vec<u8>, minislots: u32 },
    ArmTimer { at: SimTime, kind: ServiceTimerKind, generation: u64 },
    /// Hand a data frame to the PHY
    Transmit { frame: Vec<u8> },
    /// Head packet given up after too many request retries
    DropPacket { bytes: usize },
}

/// Upstream service flow of a modem: turns queued packets into bandwidth requests
/// and granted transmissions
pub struct UpstreamService {
    address: MacAddress,
    sid: Sid,
    channel: ChannelId,
    mode: UpstreamMode,

    minislot_duration: Duration,
    data_rate: DataRate,
    phy_overhead: usize,
    map_wait_timeout: Duration,
    max_retries: u8,

    state: ServiceState,
    curr_event: ServiceEvent,
    /// Ordered by start time
    available_slots: VecDeque<Slot>,
    /// Encoded packet PDUs, without MAC header
    packet_queue: VecDeque<Vec<u8>>,
    /// Slot a SlotStart timer is armed for
    pending_slot: Option<Slot>,
    request_opportunity: Option<SimTime>,
    /// An extended-header request for the head packet is outstanding
    piggyback_pending: bool,
    retries: u8,
    /// Bumped on every state change; timers armed in an earlier state are stale
    generation: u64,
    backoff_window: (u8, u8),
    rng: StdRng,

    actions: Vec<ServiceAction>,
}

impl UpstreamService {
    /// None if the service's upstream channel does not exist
    pub fn new(address: MacAddress, desc: &ServiceDesc, cfg: &StackConfig) -> Option<Self> {
        let chan = cfg.medium.upstream.get(desc.channel as usize)?;
        let seed = cfg.seed ^ (address.to_u64() << 11) ^ desc.sid as u64;
        Some(Self {
            address,
            sid: desc.sid,
            channel: desc.channel,
            mode: desc.mode,
            minislot_duration: chan.minislot_duration,
            data_rate: chan.data_rate,
            phy_overhead: cfg.medium.upstream_phy_overhead,
            map_wait_timeout: cfg.cm.map_wait_timeout,
            max_retries: cfg.cm.max_request_retries,
            state: ServiceState::Idle,
            curr_event: ServiceEvent::None,
            available_slots: VecDeque::new(),
            packet_queue: VecDeque::new(),
            pending_slot: None,
            request_opportunity: None,
            piggyback_pending: false,
            retries: 0,
            generation: 0,
            backoff_window: cfg.cmts.data_backoff,
            rng: StdRng::seed_from_u64(seed),
            actions: vec![],
        })
    }

    pub fn sid(&self) -> Sid {
        self.sid
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn mode(&self) -> UpstreamMode {
        self.mode
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn curr_event(&self) -> ServiceEvent {
        self.curr_event
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn queued_packets(&self) -> usize {
        self.packet_queue.len()
    }

    pub fn available_slots(&self) -> &VecDeque<Slot> {
        &self.available_slots
    }

    pub fn desc(&self) -> ServiceDesc {
        ServiceDesc { sid: self.sid, direction: Direction::Upstream, channel: self.channel, mode: self.mode }
    }

    pub fn set_address(&mut self, address: MacAddress) {
        self.address = address;
    }

    /// Minislot count needed to carry `frame_len` bytes on this channel
    pub fn minislots_for(&self, frame_len: usize) -> u32 {
        let tx = self.data_rate.tx_time(frame_len + self.phy_overhead).as_nanos();
        let ms = self.minislot_duration.as_nanos().max(1);
        tx.div_ceil(ms).max(1) as u32
    }

    /// Start of minislot `minislot` on this channel
    pub fn minislot_to_time(&self, minislot: u64) -> SimTime {
        SimTime::from_nanos(self.minislot_duration.as_nanos() as u64 * minislot)
    }

    /// Queues an encoded packet PDU for transmission
    pub fn enqueue(&mut self, pdu: Vec<u8>, now: SimTime) -> Vec<ServiceAction> {
        self.packet_queue.push_back(pdu);
        self.change_state(ServiceEvent::NewPacket, now)
    }

    /// Picks this service's grants out of a received MAP
    pub fn on_map(&mut self, map: &MapMessage, now: SimTime) -> Vec<ServiceAction> {
        if map.ucid != self.channel {
            return vec![];
        }
        self.backoff_window = (map.data_backoff_start, map.data_backoff_end);

        let mut granted = 0;
        for (i, ie) in map.elements.iter().enumerate() {
            if ie.sid != self.sid {
                continue;
            }
            let Some((offset, length)) = map.slot_of(i) else {
                continue;
            };
            let start = self.minislot_to_time(map.alloc_start_time as u64 + offset as u64);
            if ie.ie_type.is_data_grant() {
                self.insert_slot(Slot { start, length });
                granted += 1;
            } else if ie.ie_type == IeType::Request && start >= now {
                self.request_opportunity = Some(start);
            }
        }
        tracing::trace!(t = %now, "{} sid {}: {} grants in MAP starting at minislot {}", self.address, self.sid, granted, map.alloc_start_time);
        if granted > 0 {
            self.piggyback_pending = false;
        }
        self.prune_slots(now);
        self.change_state(ServiceEvent::NewMap, now)
    }

    /// Timer armed through `ServiceAction::ArmTimer` fired
    pub fn on_timer(&mut self, kind: ServiceTimerKind, generation: u64, now: SimTime) -> Vec<ServiceAction> {
        if generation != self.generation {
            tracing::trace!(t = %now, "sid {}: stale {:?} timer", self.sid, kind);
            return vec![];
        }
        let event = match kind {
            ServiceTimerKind::SlotStart | ServiceTimerKind::RequestOpportunity => ServiceEvent::ReadyToSend,
            ServiceTimerKind::MapTimeout => ServiceEvent::MapTimeout,
            ServiceTimerKind::BackoffExpired => ServiceEvent::BackoffExpired,
        };
        self.change_state(event, now)
    }

    /// Feeds `event` into the state machine and runs it until it waits for the outside world
    pub fn change_state(&mut self, event: ServiceEvent, now: SimTime) -> Vec<ServiceAction> {
        self.curr_event = event;
        let mut event = event;
        while let Some(next) = self.step(event, now) {
            self.set_state(next, now);
            event = ServiceEvent::None;
        }
        std::mem::take(&mut self.actions)
    }

    fn step(&mut self, event: ServiceEvent, now: SimTime) -> Option<ServiceState> {
        match (self.state, event) {
            (ServiceState::Idle, ServiceEvent::NewPacket) => Some(ServiceState::Decision),
            (ServiceState::Idle, _) => None,

            (ServiceState::Decision, _) => Some(self.decide(now)),

            (ServiceState::ToSendRequest, ServiceEvent::None) => {
                match self.request_opportunity {
                    Some(at) if self.mode == UpstreamMode::RealTimePolling && at > now => {
                        self.arm(at, ServiceTimerKind::RequestOpportunity);
                        None
                    }
                    _ => {
                        self.send_request();
                        Some(ServiceState::RequestSent)
                    }
                }
            }
            (ServiceState::ToSendRequest, ServiceEvent::ReadyToSend) => {
                self.send_request();
                Some(ServiceState::RequestSent)
            }
            (ServiceState::ToSendRequest, ServiceEvent::NewMap) if self.has_slot(now) => Some(ServiceState::ToSend),
            (ServiceState::ToSendRequest, _) => None,

            (ServiceState::RequestSent, ServiceEvent::RequestTransmitted) => Some(ServiceState::WaitForMap),
            (ServiceState::RequestSent, ServiceEvent::NewMap) if self.has_slot(now) => Some(ServiceState::ToSend),
            (ServiceState::RequestSent, _) => None,

            (ServiceState::WaitForMap, ServiceEvent::None) => {
                // Unsolicited grants come on their own, no point in timing out
                if self.mode != UpstreamMode::UnsolicitedGrant {
                    self.arm(now + self.map_wait_timeout, ServiceTimerKind::MapTimeout);
                }
                None
            }
            (ServiceState::WaitForMap, ServiceEvent::NewMap) if self.has_slot(now) => Some(ServiceState::ToSend),
            (ServiceState::WaitForMap, ServiceEvent::MapTimeout) => Some(ServiceState::Contention),
            (ServiceState::WaitForMap, _) => None,

            (ServiceState::ToSend, ServiceEvent::None) => self.take_slot(now),
            (ServiceState::ToSend, ServiceEvent::ReadyToSend) => match self.pending_slot.take() {
                Some(slot) => Some(self.transmit(slot, now)),
                None => Some(ServiceState::Decision),
            },
            (ServiceState::ToSend, _) => None,

            (ServiceState::Contention, ServiceEvent::None) => self.contend(now),
            (ServiceState::Contention, ServiceEvent::BackoffExpired) => {
                self.piggyback_pending = false;
                Some(ServiceState::ToSendRequest)
            }
            (ServiceState::Contention, ServiceEvent::NewMap) if self.has_slot(now) => Some(ServiceState::ToSend),
            (ServiceState::Contention, _) => None,
        }
    }

    fn set_state(&mut self, to: ServiceState, now: SimTime) {
        let from = self.state;
        tracing::trace!(t = %now, "{} sid {}: {} -> {} ({:?})", self.address, self.sid, from, to, self.curr_event);
        self.state = to;
        self.generation += 1;
        self.actions.push(ServiceAction::StateChanged { from, to });
    }

    fn decide(&mut self, now: SimTime) -> ServiceState {
        if self.packet_queue.is_empty() {
            return ServiceState::Idle;
        }
        if self.has_slot(now) {
            return ServiceState::ToSend;
        }
        if self.mode == UpstreamMode::UnsolicitedGrant || self.piggyback_pending {
            return ServiceState::WaitForMap;
        }
        ServiceState::ToSendRequest
    }

    fn arm(&mut self, at: SimTime, kind: ServiceTimerKind) {
        self.curr_event = ServiceEvent::WaitToSend;
        self.actions.push(ServiceAction::ArmTimer { at, kind, generation: self.generation });
    }

    fn insert_slot(&mut self, slot: Slot) {
        let pos = self.available_slots.iter().position(|s| s.start > slot.start).unwrap_or(self.available_slots.len());
        self.available_slots.insert(pos, slot);
    }

    /// Forgets slots that already started
    fn prune_slots(&mut self, now: SimTime) {
        while self.available_slots.front().is_some_and(|s| s.start < now) {
            if let Some(s) = self.available_slots.pop_front() {
                tracing::debug!(t = %now, "{} sid {}: slot at {} missed", self.address, self.sid, s.start);
            }
        }
    }

    fn has_slot(&mut self, now: SimTime) -> bool {
        self.prune_slots(now);
        !self.available_slots.is_empty()
    }

    fn head_frame_len(&self) -> usize {
        self.packet_queue.front().map_or(0, |p| MAC_HEADER_FIXED_LEN + p.len())
    }

    fn send_request(&mut self) {
        self.request_opportunity = None;
        let frame_len = self.head_frame_len();
        let minislots = self.minislots_for(frame_len);
        let hdr = if minislots <= u8::MAX as u32 {
            MacHeader::request(self.sid, minislots as u8)
        } else {
            MacHeader::queue_depth_request(self.sid, frame_len.min(u16::MAX as usize) as u16)
        };
        tracing::debug!("{} sid {}: requesting {} minislots ({} bytes)", self.address, self.sid, minislots, frame_len);
        self.actions.push(ServiceAction::SendRequest { frame: hdr.encode(&[]), minislots });
    }

    fn take_slot(&mut self, now: SimTime) -> Option<ServiceState> {
        self.prune_slots(now);
        let slot = self.available_slots.pop_front()?;
        if slot.start > now {
            self.pending_slot = Some(slot);
            self.arm(slot.start, ServiceTimerKind::SlotStart);
            None
        } else {
            Some(self.transmit(slot, now))
        }
    }

    fn transmit(&mut self, slot: Slot, now: SimTime) -> ServiceState {
        let Some(pdu) = self.packet_queue.pop_front() else {
            return ServiceState::Idle;
        };
        let needed = self.minislots_for(MAC_HEADER_FIXED_LEN + pdu.len());
        if needed > slot.length as u32 {
            return self.slot_too_small(pdu, slot, needed, now);
        }

        let mut hdr = MacHeader::data_pdu(Direction::Upstream, pdu.len() as u16);
        self.piggyback_pending = false;
        if let Some(eh) = self.piggyback_request(pdu.len(), slot) {
            hdr.add_ext_header(eh);
            self.piggyback_pending = true;
        }
        self.retries = 0;
        self.actions.push(ServiceAction::Transmit { frame: hdr.encode(&pdu) });

        if self.packet_queue.is_empty() { ServiceState::Idle } else { ServiceState::Decision }
    }

    /// Request element asking for the next queued packet along with this one. None when
    /// the request needs more than one byte (only the queue-depth header can carry it)
    /// or the extra bytes would not fit the frame or the slot.
    fn piggyback_request(&self, pdu_len: usize, slot: Slot) -> Option<ExtHeaderElement> {
        if self.mode == UpstreamMode::UnsolicitedGrant || self.packet_queue.is_empty() {
            return None;
        }
        let minislots = u8::try_from(self.minislots_for(self.head_frame_len())).ok()?;
        let eh = ExtHeaderElement::Request { minislots, sid: self.sid };
        let len = pdu_len + eh.encoded_len();
        if len > u16::MAX as usize || self.minislots_for(MAC_HEADER_FIXED_LEN + len) > slot.length as u32 {
            return None;
        }
        Some(eh)
    }

    /// The grant cannot carry the head packet: it stays queued and is asked for again,
    /// until the retry limit drops it
    fn slot_too_small(&mut self, pdu: Vec<u8>, slot: Slot, needed: u32, now: SimTime) -> ServiceState {
        tracing::debug!(t = %now, "{} sid {}: {} minislots needed, slot has {}", self.address, self.sid, needed, slot.length);
        self.piggyback_pending = false;
        self.retries += 1;
        if self.retries > self.max_retries {
            self.retries = 0;
            tracing::info!(t = %now, "{} sid {}: no grant large enough after {} tries, dropping packet", self.address, self.sid, self.max_retries);
            self.actions.push(ServiceAction::DropPacket { bytes: pdu.len() });
        } else {
            self.packet_queue.push_front(pdu);
        }
        ServiceState::Decision
    }

    fn contend(&mut self, now: SimTime) -> Option<ServiceState> {
        self.retries += 1;
        if self.retries > self.max_retries {
            self.retries = 0;
            self.piggyback_pending = false;
            if let Some(p) = self.packet_queue.pop_front() {
                tracing::info!(t = %now, "{} sid {}: no grant after {} requests, dropping packet", self.address, self.sid, self.max_retries);
                self.actions.push(ServiceAction::DropPacket { bytes: p.len() });
            }
            return Some(ServiceState::Decision);
        }
        let (start, end) = self.backoff_window;
        let exp = (start as u32 + self.retries as u32 - 1).min(end as u32);
        let window = 1u64 << exp;
        let slots = self.rng.random_range(0..window);
        let backoff = self.minislot_duration * slots as u32;
        tracing::debug!(t = %now, "{} sid {}: retry {} backs off {} minislots", self.address, self.sid, self.retries, slots);
        self.arm(now + backoff, ServiceTimerKind::BackoffExpired);
        None
    }
}
