use std::time::Duration;

use docsis_core::{ChannelId, Direction, MacAddress, Sid};

/// What a frame handed to the medium was, so the sender can match the completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxTag {
    /// Stand-alone bandwidth request of an upstream service
    Request { sid: Sid },
    /// Data frame sent in a granted slot
    Data { sid: Sid },
    Management,
    Downstream,
}

/// PHY-TRANSMIT-START request: device asks the medium to put a frame on a channel.
/// If the channel is busy, the medium queues the frame behind the one in flight.
#[derive(Debug)]
pub struct PhyTransmitStartReq {
    pub direction: Direction,
    pub channel: ChannelId,
    pub frame: Vec<u8>,
    /// Downstream only: receiving modem, None or broadcast for all modems
    pub dest: Option<MacAddress>,
    /// Time the frame occupies the channel
    pub tx_time: Duration,
    pub tag: TxTag,
}

/// PHY-TRANSMIT-COMPLETE indication: the frame left the channel, which is idle again
#[derive(Debug)]
pub struct PhyTransmitCompleteInd {
    pub direction: Direction,
    pub channel: ChannelId,
    pub tag: TxTag,
}

/// PHY-DELIVER indication: a frame arrived at the device
#[derive(Debug)]
pub struct PhyDeliverInd {
    pub direction: Direction,
    pub channel: ChannelId,
    pub frame: Vec<u8>,
}
