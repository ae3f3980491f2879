use serde::Deserialize;

// Service access points between the entities of the simulation
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sap {
    /// Device <-> shared medium: transmit start, transmit complete, delivery
    PhySap,
    /// Attach/detach, address changes and other inter-entity control
    Control,
    /// Timers an entity schedules towards itself
    Timer,
    /// MAC <-> layer above (unit data)
    UpperSap,
}

/// Busy/idle state of one physical channel
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    #[default]
    Idle,
    Busy,
}

/// Upstream scheduling service type of a service flow
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum UpstreamMode {
    /// Fixed grants every MAP, no requests
    UnsolicitedGrant,
    /// Unicast request opportunity every MAP
    RealTimePolling,
    #[default]
    BestEffort,
}

impl core::fmt::Display for UpstreamMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UpstreamMode::UnsolicitedGrant => write!(f, "UGS"),
            UpstreamMode::RealTimePolling => write!(f, "rtPS"),
            UpstreamMode::BestEffort => write!(f, "BE"),
        }
    }
}
