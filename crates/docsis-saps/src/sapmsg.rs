use core::fmt::Display;

use docsis_core::{EntityId, Sap, SimTime};

use crate::ctrl::*;
use crate::phy::*;
use crate::timer::*;
use crate::upper::*;

/// Exhaustive list of primitives carried by a SapMsg
#[derive(Debug)]
pub enum SapMsgInner {
    // PHY-SAP
    PhyTransmitStartReq(PhyTransmitStartReq),
    PhyTransmitCompleteInd(PhyTransmitCompleteInd),
    PhyDeliverInd(PhyDeliverInd),

    // Control
    CtrlAttachReq(CtrlAttachReq),
    CtrlDetachReq(CtrlDetachReq),
    CtrlSetAddressReq(CtrlSetAddressReq),
    CtrlProvisionServiceReq(CtrlProvisionServiceReq),
    CtrlDeviceAttach(CtrlDeviceAttach),
    CtrlDeviceDetach(CtrlDeviceDetach),
    CtrlDetachedInd(CtrlDetachedInd),
    CtrlAddressChange(CtrlAddressChange),
    CtrlAddressChangeCnf(CtrlAddressChangeCnf),
    CtrlServiceAdded(CtrlServiceAdded),
    CtrlCmAttached(CtrlCmAttached),
    CtrlCmDetached(CtrlCmDetached),
    CtrlForceSendMap(CtrlForceSendMap),

    // Timers
    TimerCmService(TimerCmService),
    TimerMapInterval(TimerMapInterval),
    TimerChannelComplete(TimerChannelComplete),
    TimerTraffic(TimerTraffic),

    // UPPER-SAP
    UpperUnitdataReq(UpperUnitdataReq),
    UpperUnitdataInd(UpperUnitdataInd),
}

impl Display for SapMsgInner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SapMsgInner::PhyTransmitStartReq(p) => write!(f, "PhyTransmitStartReq({} ch {} {:?})", p.direction, p.channel, p.tag),
            SapMsgInner::PhyTransmitCompleteInd(p) => write!(f, "PhyTransmitCompleteInd({} ch {} {:?})", p.direction, p.channel, p.tag),
            SapMsgInner::PhyDeliverInd(p) => write!(f, "PhyDeliverInd({} ch {} {} bytes)", p.direction, p.channel, p.frame.len()),
            SapMsgInner::CtrlAttachReq(_) => write!(f, "CtrlAttachReq"),
            SapMsgInner::CtrlDetachReq(_) => write!(f, "CtrlDetachReq"),
            SapMsgInner::CtrlSetAddressReq(_) => write!(f, "CtrlSetAddressReq"),
            SapMsgInner::CtrlProvisionServiceReq(_) => write!(f, "CtrlProvisionServiceReq"),
            SapMsgInner::CtrlDeviceAttach(_) => write!(f, "CtrlDeviceAttach"),
            SapMsgInner::CtrlDeviceDetach(_) => write!(f, "CtrlDeviceDetach"),
            SapMsgInner::CtrlDetachedInd(_) => write!(f, "CtrlDetachedInd"),
            SapMsgInner::CtrlAddressChange(_) => write!(f, "CtrlAddressChange"),
            SapMsgInner::CtrlAddressChangeCnf(c) => write!(f, "CtrlAddressChangeCnf({} {})", c.new, c.accepted),
            SapMsgInner::CtrlServiceAdded(_) => write!(f, "CtrlServiceAdded"),
            SapMsgInner::CtrlCmAttached(_) => write!(f, "CtrlCmAttached"),
            SapMsgInner::CtrlCmDetached(_) => write!(f, "CtrlCmDetached"),
            SapMsgInner::CtrlForceSendMap(_) => write!(f, "CtrlForceSendMap"),
            SapMsgInner::TimerCmService(t) => write!(f, "TimerCmService(sid {} {:?})", t.sid, t.kind),
            SapMsgInner::TimerMapInterval(_) => write!(f, "TimerMapInterval"),
            SapMsgInner::TimerChannelComplete(t) => write!(f, "TimerChannelComplete({} ch {})", t.direction, t.channel),
            SapMsgInner::TimerTraffic(t) => write!(f, "TimerTraffic({})", t.stream),
            SapMsgInner::UpperUnitdataReq(_) => write!(f, "UpperUnitdataReq"),
            SapMsgInner::UpperUnitdataInd(_) => write!(f, "UpperUnitdataInd"),
        }
    }
}

#[derive(Debug)]
pub struct SapMsg {
    pub sap: Sap,
    pub src: EntityId,
    pub dest: EntityId,
    /// Virtual time at which the message was created
    pub time: SimTime,
    pub msg: SapMsgInner,
}

impl SapMsg {
    pub fn new(sap: Sap, src: EntityId, dest: EntityId, time: SimTime, msg: SapMsgInner) -> Self {
        Self { sap, src, dest, time, msg }
    }

    pub fn get_source(&self) -> &EntityId {
        &self.src
    }
    pub fn get_dest(&self) -> &EntityId {
        &self.dest
    }
    pub fn get_sap(&self) -> &Sap {
        &self.sap
    }
}
