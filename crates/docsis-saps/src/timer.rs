use docsis_core::{ChannelId, Direction, Sid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceTimerKind {
    /// A granted slot starts now
    SlotStart,
    /// No grant arrived while waiting for a MAP
    MapTimeout,
    /// Contention backoff ran out
    BackoffExpired,
    /// A unicast request opportunity starts now
    RequestOpportunity,
}

/// Timer of an upstream service on a modem. Stale timers are recognized by their generation.
#[derive(Debug)]
pub struct TimerCmService {
    pub sid: Sid,
    pub generation: u64,
    pub kind: ServiceTimerKind,
}

/// Periodic MAP generation on the head-end
#[derive(Debug)]
pub struct TimerMapInterval {}

/// The frame in flight on a medium channel has been fully transmitted
#[derive(Debug)]
pub struct TimerChannelComplete {
    pub direction: Direction,
    pub channel: ChannelId,
}

/// Traffic generator tick: send the next packet of stream `stream`
#[derive(Debug)]
pub struct TimerTraffic {
    pub stream: usize,
}
