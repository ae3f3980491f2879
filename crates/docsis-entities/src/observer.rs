use std::sync::{Arc, Mutex};

use docsis_core::{ChannelId, Direction, MacAddress, Sid, SimTime};

use crate::cm::components::upstream_service::ServiceState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    /// Packet accepted from the layer above for transmission
    MacTx { dest: MacAddress, bytes: usize },
    /// Packet handed to the layer above
    MacRx { src: MacAddress, bytes: usize },
    MacRxDrop { reason: &'static str },
    PhyTxBegin { direction: Direction, channel: ChannelId, bytes: usize },
    PhyTxEnd { direction: Direction, channel: ChannelId },
    PhyRxEnd { direction: Direction, channel: ChannelId, bytes: usize },
    LinkUp,
    LinkDown,
    AddressChange { old: MacAddress, new: MacAddress },
    ServiceState { sid: Sid, from: ServiceState, to: ServiceState },
    MapSent { ucid: ChannelId, start: u32, elements: usize },
    /// Head packet of a service given up after too many request retries
    PacketDropped { sid: Sid },
}

/// Something that happened on a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub t: SimTime,
    /// Address of the reporting device at the time of the event
    pub device: MacAddress,
    pub kind: TraceKind,
}

/// Receives trace events synchronously, in the order the device produced them
pub trait DeviceObserver {
    fn on_event(&mut self, ev: &TraceEvent);
}

/// Observers registered on one device
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<Box<dyn DeviceObserver + Send>>,
}

impl ObserverList {
    pub fn add(&mut self, observer: Box<dyn DeviceObserver + Send>) {
        self.observers.push(observer);
    }

    pub fn notify(&mut self, t: SimTime, device: MacAddress, kind: TraceKind) {
        if self.observers.is_empty() {
            return;
        }
        let ev = TraceEvent { t, device, kind };
        for o in self.observers.iter_mut() {
            o.on_event(&ev);
        }
    }
}

/// Observer that keeps every event; clones share the same log
#[derive(Clone, Default)]
pub struct TraceRecorder {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<TraceEvent> {
        match self.events.lock() {
            Ok(ev) => ev.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, pred: impl Fn(&TraceEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&self) {
        if let Ok(mut ev) = self.events.lock() {
            ev.clear();
        }
    }
}

impl DeviceObserver for TraceRecorder {
    fn on_event(&mut self, ev: &TraceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(ev.clone());
        }
    }
}
