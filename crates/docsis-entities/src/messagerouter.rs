use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::atomic::{self, AtomicBool};
use std::time::Duration;

use docsis_config::SharedConfig;
use docsis_core::{EntityId, SimTime};
use docsis_saps::SapMsg;

use crate::DocsisEntityTrait;

#[derive(Default)]
pub enum MessagePrio {
    Immediate,
    #[default]
    Normal,
}

/// A message waiting for its virtual time to come
struct TimedMsg {
    at: SimTime,
    /// Tie breaker, keeps same-time events in scheduling order
    seq: u64,
    msg: SapMsg,
}

impl PartialEq for TimedMsg {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for TimedMsg {}

impl PartialOrd for TimedMsg {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedMsg {
    // Reversed, so the BinaryHeap pops the earliest event first
    fn cmp(&self, other: &Self) -> Ordering {
        other.at.cmp(&self.at).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Event queue of the simulation.
/// Messages pushed with `push_back`/`push_prio` run at the current virtual time, before
/// anything on the timeline. Scheduled messages run in (time, scheduling order).
pub struct MessageQueue {
    now: SimTime,
    seq: u64,
    messages: VecDeque<SapMsg>,
    timeline: BinaryHeap<TimedMsg>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            seq: 0,
            messages: VecDeque::new(),
            timeline: BinaryHeap::new(),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn push_back(&mut self, message: SapMsg) {
        self.messages.push_back(message);
    }

    pub fn push_prio(&mut self, message: SapMsg, prio: MessagePrio) {
        match prio {
            MessagePrio::Immediate => {
                // Insert at the front for immediate processing
                self.messages.push_front(message);
            }
            MessagePrio::Normal => {
                self.messages.push_back(message);
            }
        }
    }

    /// Deliver `message` after `delay` of virtual time
    pub fn schedule(&mut self, delay: Duration, message: SapMsg) {
        let at = self.now + delay;
        self.schedule_at(at, message);
    }

    /// Deliver `message` at virtual time `at`. A time in the past means now.
    pub fn schedule_at(&mut self, at: SimTime, message: SapMsg) {
        let at = at.max(self.now);
        self.seq += 1;
        self.timeline.push(TimedMsg { at, seq: self.seq, msg: message });
    }

    /// Time of the next event on the timeline, if any
    pub fn next_event_time(&self) -> Option<SimTime> {
        if !self.messages.is_empty() {
            return Some(self.now);
        }
        self.timeline.peek().map(|t| t.at)
    }

    /// Takes the next message, advancing virtual time when it comes from the timeline
    pub fn pop_next(&mut self) -> Option<SapMsg> {
        if let Some(msg) = self.messages.pop_front() {
            return Some(msg);
        }
        let timed = self.timeline.pop()?;
        self.now = timed.at;
        Some(timed.msg)
    }

    /// Moves the clock forward without delivering anything. Never moves it back.
    pub fn advance_to(&mut self, t: SimTime) {
        if t > self.now {
            self.now = t;
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len() + self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owns every entity of the simulation and drives the event queue
pub struct MessageRouter {
    /// While currently unused by the MessageRouter, this may change in the future
    /// As such, we provide the MessageRouter with a copy of the SharedConfig
    _config: SharedConfig,
    entities: HashMap<EntityId, Box<dyn DocsisEntityTrait>>,
    msg_queue: MessageQueue,
}

impl MessageRouter {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            entities: HashMap::new(),
            msg_queue: MessageQueue::new(),
            _config: config,
        }
    }

    pub fn now(&self) -> SimTime {
        self.msg_queue.now()
    }

    pub fn register_entity(&mut self, entity: Box<dyn DocsisEntityTrait>) {
        let id = entity.entity();
        tracing::debug!("register_entity {} {:?}", id, entity.kind());
        if self.entities.insert(id, entity).is_some() {
            tracing::warn!("register_entity: replaced existing entity {}", id);
        }
    }

    /// Returns a mut ref to the entity registered under `id`
    pub fn get_entity(&mut self, id: EntityId) -> Option<&mut dyn DocsisEntityTrait> {
        self.entities.get_mut(&id).map(|entity| entity.as_mut())
    }

    /// Runs `f` on the entity `id` downcast to its concrete type, handing it the event queue
    /// so it can emit primitives. None if the entity is absent or of another type.
    pub fn with_entity<T: 'static, R>(&mut self, id: EntityId, f: impl FnOnce(&mut T, &mut MessageQueue) -> R) -> Option<R> {
        let entity = self.entities.get_mut(&id)?;
        let concrete = entity.as_mut().as_any_mut().downcast_mut::<T>()?;
        Some(f(concrete, &mut self.msg_queue))
    }

    pub fn submit_message(&mut self, message: SapMsg) {
        tracing::debug!("submit_message {:?}: {} -> {}", message.get_sap(), message.get_source(), message.get_dest());
        self.msg_queue.push_back(message);
    }

    pub fn schedule(&mut self, delay: Duration, message: SapMsg) {
        self.msg_queue.schedule(delay, message);
    }

    pub fn schedule_at(&mut self, at: SimTime, message: SapMsg) {
        self.msg_queue.schedule_at(at, message);
    }

    /// Delivers a single message. Returns false when nothing was left to deliver.
    pub fn deliver_message(&mut self) -> bool {
        let Some(message) = self.msg_queue.pop_next() else {
            return false;
        };
        let t = self.msg_queue.now();
        tracing::trace!(t = %t, "deliver_message {:?}: {} -> {} {}", message.get_sap(), message.get_source(), message.get_dest(), message.msg);

        let dest = *message.get_dest();
        if let Some(entity) = self.entities.get_mut(&dest) {
            entity.rx_prim(&mut self.msg_queue, message);
        } else {
            tracing::warn!(t = %t, "deliver_message: entity {} not found for {:?}: {} -> {} {}",
                dest, message.get_sap(), message.get_source(), message.get_dest(), message.msg);
        }
        true
    }

    /// Delivers everything due at the current time, without advancing the clock
    pub fn deliver_all_messages(&mut self) {
        while self.msg_queue.next_event_time() == Some(self.msg_queue.now()) {
            self.deliver_message();
        }
    }

    pub fn step(&mut self) -> bool {
        self.deliver_message()
    }

    pub fn get_msgqueue_len(&self) -> usize {
        self.msg_queue.len()
    }

    /// Runs until the event queue is empty
    pub fn run(&mut self) {
        while self.deliver_message() {}
    }

    /// Runs every event due up to and including `t`, then leaves the clock at `t`
    pub fn run_until(&mut self, t: SimTime) {
        self.run_until_flag(t, &AtomicBool::new(true));
    }

    /// As `run_until`, but stops early once `running` turns false
    pub fn run_until_flag(&mut self, t: SimTime, running: &AtomicBool) {
        while running.load(atomic::Ordering::SeqCst) {
            match self.msg_queue.next_event_time() {
                Some(next) if next <= t => {
                    self.deliver_message();
                }
                _ => {
                    self.msg_queue.advance_to(t);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use docsis_config::StackConfig;
    use docsis_core::{DeviceKind, Sap, debug};
    use docsis_saps::SapMsgInner;
    use docsis_saps::timer::TimerTraffic;

    use super::*;

    fn msg(stream: usize) -> SapMsg {
        SapMsg::new(Sap::Timer, EntityId(0), EntityId(1), SimTime::ZERO, SapMsgInner::TimerTraffic(TimerTraffic { stream }))
    }

    fn stream_of(m: &SapMsg) -> usize {
        match &m.msg {
            SapMsgInner::TimerTraffic(t) => t.stream,
            _ => panic!(),
        }
    }

    #[test]
    fn test_queue_ordering() {
        let mut q = MessageQueue::new();
        q.schedule(Duration::from_micros(20), msg(3));
        q.schedule(Duration::from_micros(10), msg(1));
        q.schedule(Duration::from_micros(10), msg(2));
        q.push_back(msg(0));
        q.push_prio(msg(100), MessagePrio::Immediate);

        let order: Vec<usize> = std::iter::from_fn(|| q.pop_next()).map(|m| stream_of(&m)).collect();
        assert_eq!(order, vec![100, 0, 1, 2, 3]);
        assert_eq!(q.now(), SimTime::from_micros(20));
    }

    #[test]
    fn test_past_schedule_runs_now() {
        let mut q = MessageQueue::new();
        q.advance_to(SimTime::from_millis(5));
        q.schedule_at(SimTime::from_millis(1), msg(7));
        assert_eq!(q.next_event_time(), Some(SimTime::from_millis(5)));
        q.pop_next();
        assert_eq!(q.now(), SimTime::from_millis(5));
    }

    struct Counter {
        id: EntityId,
        seen: Vec<(SimTime, usize)>,
    }

    impl DocsisEntityTrait for Counter {
        fn entity(&self) -> EntityId {
            self.id
        }
        fn kind(&self) -> DeviceKind {
            DeviceKind::User
        }
        fn rx_prim(&mut self, queue: &mut MessageQueue, message: SapMsg) {
            self.seen.push((queue.now(), stream_of(&message)));
        }
    }

    #[test]
    fn test_run_until_stops_at_horizon() {
        debug::setup_logging_verbose();
        let mut router = MessageRouter::new(SharedConfig::from_config(StackConfig::default()));
        router.register_entity(Box::new(Counter { id: EntityId(1), seen: vec![] }));
        router.schedule(Duration::from_millis(1), msg(1));
        router.schedule(Duration::from_millis(3), msg(2));
        // Unknown destination is dropped
        let mut lost = msg(9);
        lost.dest = EntityId(42);
        router.submit_message(lost);

        router.run_until(SimTime::from_millis(2));
        assert_eq!(router.now(), SimTime::from_millis(2));
        let seen = router.with_entity::<Counter, _>(EntityId(1), |c, _| c.seen.clone()).unwrap();
        assert_eq!(seen, vec![(SimTime::from_millis(1), 1)]);

        router.run();
        let seen = router.with_entity::<Counter, _>(EntityId(1), |c, _| c.seen.len()).unwrap();
        assert_eq!(seen, 2);
        assert_eq!(router.get_msgqueue_len(), 0);
    }
}
