use std::collections::VecDeque;
use std::time::Duration;

use docsis_core::{ChannelId, Direction, MacAddress};
use docsis_saps::phy::{PhyTransmitStartReq, TxTag};

/// A frame waiting for its channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub channel: ChannelId,
    pub frame: Vec<u8>,
    pub dest: Option<MacAddress>,
    pub tx_time: Duration,
    pub tag: TxTag,
}

impl PendingTx {
    pub fn into_req(self, direction: Direction) -> PhyTransmitStartReq {
        PhyTransmitStartReq {
            direction,
            channel: self.channel,
            frame: self.frame,
            dest: self.dest,
            tx_time: self.tx_time,
            tag: self.tag,
        }
    }
}

#[derive(Debug, Default)]
struct ChannelTx {
    in_flight: Option<TxTag>,
    queue: VecDeque<PendingTx>,
}

/// Outbound queue per physical channel of a device, with at most one frame
/// handed to the medium per channel at any time
pub struct TxSerializer {
    direction: Direction,
    channels: Vec<ChannelTx>,
}

impl TxSerializer {
    pub fn new(direction: Direction, num_channels: usize) -> Self {
        Self {
            direction,
            channels: (0..num_channels).map(|_| ChannelTx::default()).collect(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Queues `tx`. Returns it back when the channel was free, in which case the
    /// caller must hand it to the medium now.
    pub fn submit(&mut self, tx: PendingTx) -> Option<PendingTx> {
        let Some(ch) = self.channels.get_mut(tx.channel as usize) else {
            tracing::warn!("{} tx on unknown channel {}, dropping", self.direction, tx.channel);
            return None;
        };
        if ch.in_flight.is_some() {
            tracing::trace!("{} ch {} busy, queueing {:?} ({} waiting)", self.direction, tx.channel, tx.tag, ch.queue.len() + 1);
            ch.queue.push_back(tx);
            return None;
        }
        ch.in_flight = Some(tx.tag);
        Some(tx)
    }

    /// The frame in flight on `channel` has left the medium. Returns the next frame to start, if any.
    pub fn complete(&mut self, channel: ChannelId, tag: TxTag) -> Option<PendingTx> {
        let ch = self.channels.get_mut(channel as usize)?;
        match ch.in_flight.take() {
            Some(t) if t == tag => {}
            Some(t) => {
                tracing::warn!("{} ch {} completion for {:?} while {:?} in flight", self.direction, channel, tag, t);
            }
            None => {
                tracing::warn!("{} ch {} completion for {:?} with nothing in flight", self.direction, channel, tag);
                return None;
            }
        }
        let next = ch.queue.pop_front()?;
        ch.in_flight = Some(next.tag);
        Some(next)
    }

    pub fn is_busy(&self, channel: ChannelId) -> bool {
        self.channels.get(channel as usize).is_some_and(|c| c.in_flight.is_some())
    }

    pub fn queue_len(&self, channel: ChannelId) -> usize {
        self.channels.get(channel as usize).map_or(0, |c| c.queue.len())
    }

    /// Forget everything, e.g. on detach. Frames already at the medium still complete.
    pub fn clear(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.in_flight = None;
            ch.queue.clear();
        }
    }
}
