use std::collections::VecDeque;
use std::time::Duration;

use docsis_core::{ChannelStatus, EntityId};
use docsis_saps::phy::PhyTransmitStartReq;

/// A frame on, or waiting for, a medium channel
#[derive(Debug)]
pub struct ChannelTxn {
    pub sender: EntityId,
    /// Propagation delay of the sending modem; zero for head-end frames
    pub distance: Duration,
    pub req: PhyTransmitStartReq,
}

/// Occupancy of one physical channel
#[derive(Debug, Default)]
pub struct ChannelState {
    status: ChannelStatus,
    in_flight: Option<ChannelTxn>,
    queue: VecDeque<ChannelTxn>,
}

impl ChannelState {
    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> Option<&ChannelTxn> {
        self.in_flight.as_ref()
    }

    /// Puts `txn` on the channel if it is idle and returns its transmission time,
    /// otherwise queues it behind the frames already waiting.
    pub fn start_or_queue(&mut self, txn: ChannelTxn) -> Option<Duration> {
        match self.status {
            ChannelStatus::Idle => {
                debug_assert!(self.in_flight.is_none());
                let tx_time = txn.req.tx_time;
                self.status = ChannelStatus::Busy;
                self.in_flight = Some(txn);
                Some(tx_time)
            }
            ChannelStatus::Busy => {
                self.queue.push_back(txn);
                None
            }
        }
    }

    /// Ends the frame in flight, leaving the channel idle
    pub fn finish(&mut self) -> Option<ChannelTxn> {
        self.status = ChannelStatus::Idle;
        self.in_flight.take()
    }

    /// Starts the next queued frame, if any. Returns its transmission time.
    pub fn start_next(&mut self) -> Option<Duration> {
        let next = self.queue.pop_front()?;
        self.start_or_queue(next)
    }

    /// Drops queued frames of `sender`. A frame already in flight is left to complete.
    pub fn purge_sender(&mut self, sender: EntityId) -> usize {
        let before = self.queue.len();
        self.queue.retain(|t| t.sender != sender);
        before - self.queue.len()
    }
}
