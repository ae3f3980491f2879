use std::time::Duration;

use docsis_core::{ChannelId, DeviceKind, Direction, EntityId, MacAddress, Sid, UpstreamMode};

/// Description of one service flow of a modem, shared with the head-end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDesc {
    pub sid: Sid,
    pub direction: Direction,
    pub channel: ChannelId,
    /// Only meaningful upstream
    pub mode: UpstreamMode,
}

/// Ask a device to attach itself to a medium
#[derive(Debug)]
pub struct CtrlAttachReq {
    pub medium: EntityId,
}

/// Ask a device to detach from its medium
#[derive(Debug)]
pub struct CtrlDetachReq {}

/// Ask a device to change its MAC address
#[derive(Debug)]
pub struct CtrlSetAddressReq {
    pub address: MacAddress,
}

/// Ask a modem to provision an extra service flow
#[derive(Debug)]
pub struct CtrlProvisionServiceReq {
    pub service: ServiceDesc,
}

/// Device -> medium
#[derive(Debug)]
pub struct CtrlDeviceAttach {
    pub kind: DeviceKind,
    pub address: MacAddress,
    /// One-way propagation delay to the head-end, zero for the head-end itself
    pub distance: Duration,
    pub services: Vec<ServiceDesc>,
}

/// Device -> medium
#[derive(Debug)]
pub struct CtrlDeviceDetach {
    pub address: MacAddress,
}

/// Medium -> device: the medium dropped the device
#[derive(Debug)]
pub struct CtrlDetachedInd {}

/// Device -> medium, forwarded medium -> head-end
#[derive(Debug)]
pub struct CtrlAddressChange {
    pub old: MacAddress,
    pub new: MacAddress,
}

/// Medium -> device: outcome of its CtrlAddressChange. The device keeps `old` until accepted.
#[derive(Debug)]
pub struct CtrlAddressChangeCnf {
    pub old: MacAddress,
    pub new: MacAddress,
    pub accepted: bool,
}

/// Modem -> medium, forwarded medium -> head-end
#[derive(Debug)]
pub struct CtrlServiceAdded {
    pub address: MacAddress,
    pub service: ServiceDesc,
}

/// Medium -> head-end: a modem is attached (sent for existing modems when the head-end attaches)
#[derive(Debug)]
pub struct CtrlCmAttached {
    pub cm: EntityId,
    pub address: MacAddress,
    pub distance: Duration,
    pub services: Vec<ServiceDesc>,
}

/// Medium -> head-end
#[derive(Debug)]
pub struct CtrlCmDetached {
    pub address: MacAddress,
}

/// Generate MAPs now, for one upstream channel or all of them
#[derive(Debug)]
pub struct CtrlForceSendMap {
    pub channel: Option<ChannelId>,
}
