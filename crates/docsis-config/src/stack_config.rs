use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use docsis_core::{AddressAllocator, ChannelId, DataRate, MacAddress, Sid, UpstreamMode};

/// Largest SID that fits in a MAP information element
pub const MAX_SID: Sid = (1 << 11) - 1;

#[derive(Debug, Clone)]
pub struct CfgUpstreamChannel {
    pub data_rate: DataRate,
    /// Time quantum of one minislot on this channel
    pub minislot_duration: Duration,
}

#[derive(Debug, Clone)]
pub struct CfgDownstreamChannel {
    pub data_rate: DataRate,
}

/// Channel plan of the shared medium. Sized once, never changes during a run.
#[derive(Debug, Clone)]
pub struct CfgMedium {
    pub upstream: Vec<CfgUpstreamChannel>,
    pub downstream: Vec<CfgDownstreamChannel>,
    /// Bytes of burst preamble/guard added to every upstream frame for tx time purposes
    pub upstream_phy_overhead: usize,
    /// Same, for downstream frames
    pub downstream_phy_overhead: usize,
}

impl Default for CfgMedium {
    fn default() -> Self {
        Self {
            upstream: vec![CfgUpstreamChannel {
                data_rate: DataRate::from_bps(10_240_000),
                minislot_duration: Duration::from_micros(100),
            }],
            downstream: vec![CfgDownstreamChannel {
                data_rate: DataRate::from_bps(42_880_000),
            }],
            upstream_phy_overhead: 0,
            downstream_phy_overhead: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CfgCmts {
    /// Fixed head-end address; allocated from the address pool if absent
    pub address: Option<MacAddress>,
    /// Wrap downstream data in LLC/SNAP
    pub use_llc: bool,
    /// Generate MAPs on every upstream channel at this interval
    pub map_interval: Option<Duration>,
    /// Requests up to this many minislots get a short data grant, larger ones a long one
    pub short_grant_limit: u16,
    /// Minislots handed to every unsolicited-grant service in each MAP
    pub ugs_grant_slots: u16,
    /// Initial/final ranging backoff window exponents announced in the MAP
    pub ranging_backoff: (u8, u8),
    /// Initial/final data backoff window exponents announced in the MAP
    pub data_backoff: (u8, u8),
}

impl Default for CfgCmts {
    fn default() -> Self {
        Self {
            address: None,
            use_llc: false,
            map_interval: None,
            short_grant_limit: 16,
            ugs_grant_slots: 4,
            ranging_backoff: (0, 0),
            data_backoff: (2, 6),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CfgCm {
    /// Wrap upstream data in LLC/SNAP
    pub use_llc: bool,
    /// How long a service waits in WaitForMap before falling back to contention
    pub map_wait_timeout: Duration,
    /// Request retries before the head packet is dropped
    pub max_request_retries: u8,
}

impl Default for CfgCm {
    fn default() -> Self {
        Self {
            use_llc: false,
            map_wait_timeout: Duration::from_millis(20),
            max_request_retries: 4,
        }
    }
}

/// One provisioned cable modem
#[derive(Debug, Clone)]
pub struct CfgModem {
    pub address: Option<MacAddress>,
    pub sid: Sid,
    pub upstream_channel: ChannelId,
    pub downstream_channel: ChannelId,
    pub mode: UpstreamMode,
    /// One-way propagation delay between this modem and the head-end
    pub distance: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrafficEndpoint {
    Cmts,
    Broadcast,
    Modem(MacAddress),
}

/// A stream of equally sized packets injected into the simulation
#[derive(Debug, Clone)]
pub struct CfgTraffic {
    pub from: TrafficEndpoint,
    pub to: TrafficEndpoint,
    pub size: usize,
    pub protocol: u16,
    pub start: Duration,
    pub count: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct StackConfig {
    pub debug_log: Option<String>,
    /// Seed for the contention backoff draws
    pub seed: u64,

    pub medium: CfgMedium,
    pub cmts: CfgCmts,
    pub cm: CfgCm,

    pub modems: Vec<CfgModem>,
    pub traffic: Vec<CfgTraffic>,
}

impl StackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_upstream(&self) -> usize {
        self.medium.upstream.len()
    }

    pub fn num_downstream(&self) -> usize {
        self.medium.downstream.len()
    }

    /// Validate that all required configuration fields are properly set.
    pub fn validate(&self) -> Result<(), &str> {
        if self.medium.upstream.is_empty() {
            return Err("at least one upstream channel is required");
        }
        if self.medium.downstream.is_empty() {
            return Err("at least one downstream channel is required");
        }
        if self.medium.upstream.len() > ChannelId::MAX as usize + 1 || self.medium.downstream.len() > ChannelId::MAX as usize + 1 {
            return Err("too many channels");
        }
        for ch in self.medium.upstream.iter() {
            if ch.data_rate.bps() == 0 {
                return Err("upstream data_rate must be non-zero");
            }
            if ch.minislot_duration.is_zero() {
                return Err("upstream minislot duration must be non-zero");
            }
        }
        if self.medium.downstream.iter().any(|ch| ch.data_rate.bps() == 0) {
            return Err("downstream data_rate must be non-zero");
        }
        if self.cmts.short_grant_limit == 0 {
            return Err("short_grant_limit must be non-zero");
        }
        if self.cmts.data_backoff.0 > self.cmts.data_backoff.1 || self.cmts.ranging_backoff.0 > self.cmts.ranging_backoff.1 {
            return Err("backoff start must not exceed backoff end");
        }
        if self.cmts.data_backoff.1 > 15 || self.cmts.ranging_backoff.1 > 15 {
            return Err("backoff exponents are limited to 15");
        }
        if self.cm.map_wait_timeout.is_zero() {
            return Err("map_wait_timeout must be non-zero");
        }

        let mut sids = HashSet::new();
        let mut addrs = HashSet::new();
        if let Some(addr) = self.cmts.address {
            addrs.insert(addr);
        }
        for modem in self.modems.iter() {
            if modem.upstream_channel as usize >= self.medium.upstream.len() {
                return Err("modem upstream_channel out of range");
            }
            if modem.downstream_channel as usize >= self.medium.downstream.len() {
                return Err("modem downstream_channel out of range");
            }
            if modem.sid == 0 || modem.sid > MAX_SID {
                return Err("modem sid must be in 1..=2047");
            }
            if !sids.insert(modem.sid) {
                return Err("duplicate modem sid");
            }
            if let Some(addr) = modem.address {
                if addr.is_broadcast() {
                    return Err("modem address must not be broadcast");
                }
                if !addrs.insert(addr) {
                    return Err("duplicate device address");
                }
            }
        }
        for t in self.traffic.iter() {
            if t.from == TrafficEndpoint::Broadcast {
                return Err("traffic cannot originate from broadcast");
            }
            if t.from == t.to {
                return Err("traffic source and destination are the same");
            }
        }
        Ok(())
    }
}

/// Mutable, stack-editable state (lock-protected).
#[derive(Debug, Clone, Default)]
pub struct StackState {
    /// Pool from which devices without a configured address draw one
    pub address_alloc: AddressAllocator,
}

/// Global shared configuration: immutable config + mutable state.
#[derive(Clone)]
pub struct SharedConfig {
    /// Read-only configuration (immutable after construction).
    cfg: Arc<StackConfig>,
    /// Mutable state guarded with RwLock
    state: Arc<RwLock<StackState>>,
}

impl SharedConfig {
    pub fn from_config(cfg: StackConfig) -> Self {
        Self::from_parts(cfg, StackState::default())
    }

    pub fn from_parts(cfg: StackConfig, mut state: StackState) -> Self {
        // Check config for validity before returning the SharedConfig object
        match cfg.validate() {
            Ok(_) => {}
            Err(e) => panic!("Invalid stack configuration: {}", e),
        }

        // Configured addresses are off limits for the allocator
        if let Some(addr) = cfg.cmts.address {
            state.address_alloc.reserve(addr);
        }
        for addr in cfg.modems.iter().filter_map(|m| m.address) {
            state.address_alloc.reserve(addr);
        }

        Self {
            cfg: Arc::new(cfg),
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Access immutable config.
    pub fn config(&self) -> Arc<StackConfig> {
        Arc::clone(&self.cfg)
    }

    /// Read guard for mutable state.
    pub fn state_read(&self) -> std::sync::RwLockReadGuard<'_, StackState> {
        self.state.read().expect("StackState RwLock blocked")
    }

    /// Write guard for mutable state.
    pub fn state_write(&self) -> std::sync::RwLockWriteGuard<'_, StackState> {
        self.state.write().expect("StackState RwLock blocked")
    }

    /// Draw a fresh unique address from the shared pool
    pub fn allocate_address(&self) -> MacAddress {
        self.state_write().address_alloc.allocate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modem(sid: Sid) -> CfgModem {
        CfgModem {
            address: None,
            sid,
            upstream_channel: 0,
            downstream_channel: 0,
            mode: UpstreamMode::BestEffort,
            distance: Duration::from_micros(10),
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(StackConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_modems() {
        let mut cfg = StackConfig::default();
        cfg.modems = vec![modem(1), modem(1)];
        assert_eq!(cfg.validate(), Err("duplicate modem sid"));

        cfg.modems = vec![modem(2048)];
        assert!(cfg.validate().is_err());

        let mut m = modem(3);
        m.upstream_channel = 1;
        cfg.modems = vec![m];
        assert_eq!(cfg.validate(), Err("modem upstream_channel out of range"));
    }

    #[test]
    fn test_allocator_avoids_configured_addresses() {
        let mut cfg = StackConfig::default();
        let fixed = MacAddress::from_u64(0x0200_0000_0001);
        let mut m = modem(1);
        m.address = Some(fixed);
        cfg.modems.push(m);
        let shared = SharedConfig::from_config(cfg);
        assert_ne!(shared.allocate_address(), fixed);
    }
}
