use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use toml::Value;

use docsis_core::{ChannelId, DataRate, MacAddress, Sid, UpstreamMode};

use super::stack_config::{
    CfgCm, CfgCmts, CfgDownstreamChannel, CfgMedium, CfgModem, CfgTraffic, CfgUpstreamChannel, SharedConfig, StackConfig,
    StackState, TrafficEndpoint,
};

/// Build `SharedConfig` from a TOML configuration file
pub fn from_toml_str(toml_str: &str) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let root: TomlConfigRoot = toml::from_str(toml_str)?;

    // Various sanity checks
    let expected_config_version = "0.1";
    if !root.config_version.eq(expected_config_version) {
        return Err(format!(
            "Unrecognized config_version: {}, expect {}",
            root.config_version, expected_config_version
        )
        .into());
    }
    if !root.extra.is_empty() {
        return Err(format!("Unrecognized top-level fields: {:?}", sorted_keys(&root.extra)).into());
    }
    if let Some(ref medium) = root.medium {
        if !medium.extra.is_empty() {
            return Err(format!("Unrecognized fields: medium::{:?}", sorted_keys(&medium.extra)).into());
        }
        for us in medium.upstream.iter() {
            if !us.extra.is_empty() {
                return Err(format!("Unrecognized fields: medium.upstream::{:?}", sorted_keys(&us.extra)).into());
            }
        }
        for ds in medium.downstream.iter() {
            if !ds.extra.is_empty() {
                return Err(format!("Unrecognized fields: medium.downstream::{:?}", sorted_keys(&ds.extra)).into());
            }
        }
    }
    if let Some(ref cmts) = root.cmts {
        if !cmts.extra.is_empty() {
            return Err(format!("Unrecognized fields in cmts: {:?}", sorted_keys(&cmts.extra)).into());
        }
    }
    if let Some(ref cm) = root.cm {
        if !cm.extra.is_empty() {
            return Err(format!("Unrecognized fields in cm: {:?}", sorted_keys(&cm.extra)).into());
        }
    }
    for modem in root.modems.iter() {
        if !modem.extra.is_empty() {
            return Err(format!("Unrecognized fields in modems: {:?}", sorted_keys(&modem.extra)).into());
        }
    }
    for t in root.traffic.iter() {
        if !t.extra.is_empty() {
            return Err(format!("Unrecognized fields in traffic: {:?}", sorted_keys(&t.extra)).into());
        }
    }

    // Build config from required and optional values
    let mut cfg = StackConfig {
        debug_log: root.debug_log,
        seed: root.seed.unwrap_or(0),
        ..Default::default()
    };

    if let Some(medium) = root.medium {
        apply_medium_patch(&mut cfg.medium, medium);
    }
    if let Some(cmts) = root.cmts {
        apply_cmts_patch(&mut cfg.cmts, cmts)?;
    }
    if let Some(cm) = root.cm {
        apply_cm_patch(&mut cfg.cm, cm);
    }
    for modem in root.modems {
        cfg.modems.push(CfgModem {
            address: modem.address.as_deref().map(str::parse::<MacAddress>).transpose()?,
            sid: modem.sid,
            upstream_channel: modem.upstream_channel.unwrap_or(0),
            downstream_channel: modem.downstream_channel.unwrap_or(0),
            mode: modem.mode.unwrap_or_default(),
            distance: Duration::from_micros(modem.distance_us.unwrap_or(0)),
        });
    }
    for t in root.traffic {
        cfg.traffic.push(CfgTraffic {
            from: parse_endpoint(&t.from)?,
            to: parse_endpoint(&t.to)?,
            size: t.size,
            protocol: t.protocol.unwrap_or(0x0800),
            start: Duration::from_micros(t.start_us.unwrap_or(0)),
            count: t.count.unwrap_or(1),
            interval: Duration::from_micros(t.interval_us.unwrap_or(0)),
        });
    }

    cfg.validate()?;

    Ok(SharedConfig::from_parts(cfg, StackState::default()))
}

/// Build `SharedConfig` from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let mut contents = String::new();
    let mut reader = BufReader::new(reader);
    reader.read_to_string(&mut contents)?;
    from_toml_str(&contents)
}

/// Build `SharedConfig` from a file path.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SharedConfig, Box<dyn std::error::Error>> {
    let f = File::open(path)?;
    let r = BufReader::new(f);
    let cfg = from_reader(r)?;
    Ok(cfg)
}

fn parse_endpoint(s: &str) -> Result<TrafficEndpoint, Box<dyn std::error::Error>> {
    match s {
        "cmts" => Ok(TrafficEndpoint::Cmts),
        "broadcast" => Ok(TrafficEndpoint::Broadcast),
        addr => Ok(TrafficEndpoint::Modem(addr.parse::<MacAddress>()?)),
    }
}

fn apply_medium_patch(dst: &mut CfgMedium, src: MediumDto) {
    if !src.upstream.is_empty() {
        dst.upstream = src
            .upstream
            .into_iter()
            .map(|us| CfgUpstreamChannel {
                data_rate: DataRate::from_bps(us.data_rate),
                minislot_duration: Duration::from_micros(us.minislot_us),
            })
            .collect();
    }
    if !src.downstream.is_empty() {
        dst.downstream = src
            .downstream
            .into_iter()
            .map(|ds| CfgDownstreamChannel {
                data_rate: DataRate::from_bps(ds.data_rate),
            })
            .collect();
    }
    if let Some(v) = src.upstream_phy_overhead {
        dst.upstream_phy_overhead = v;
    }
    if let Some(v) = src.downstream_phy_overhead {
        dst.downstream_phy_overhead = v;
    }
}

fn apply_cmts_patch(dst: &mut CfgCmts, src: CmtsDto) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(ref addr) = src.address {
        dst.address = Some(addr.parse::<MacAddress>()?);
    }
    if let Some(v) = src.use_llc {
        dst.use_llc = v;
    }
    if let Some(v) = src.map_interval_us {
        dst.map_interval = Some(Duration::from_micros(v));
    }
    if let Some(v) = src.short_grant_limit {
        dst.short_grant_limit = v;
    }
    if let Some(v) = src.ugs_grant_slots {
        dst.ugs_grant_slots = v;
    }
    if let Some([start, end]) = src.ranging_backoff {
        dst.ranging_backoff = (start, end);
    }
    if let Some([start, end]) = src.data_backoff {
        dst.data_backoff = (start, end);
    }
    Ok(())
}

fn apply_cm_patch(dst: &mut CfgCm, src: CmDto) {
    if let Some(v) = src.use_llc {
        dst.use_llc = v;
    }
    if let Some(v) = src.map_wait_timeout_us {
        dst.map_wait_timeout = Duration::from_micros(v);
    }
    if let Some(v) = src.max_request_retries {
        dst.max_request_retries = v;
    }
}

fn sorted_keys(map: &HashMap<String, Value>) -> Vec<&str> {
    let mut v: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
    v.sort_unstable();
    v
}

/// ----------------------- DTOs for input shape -----------------------

#[derive(Deserialize)]
struct TomlConfigRoot {
    config_version: String,
    debug_log: Option<String>,
    seed: Option<u64>,

    #[serde(default)]
    medium: Option<MediumDto>,

    #[serde(default)]
    cmts: Option<CmtsDto>,

    #[serde(default)]
    cm: Option<CmDto>,

    #[serde(default)]
    modems: Vec<ModemDto>,

    #[serde(default)]
    traffic: Vec<TrafficDto>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct MediumDto {
    #[serde(default)]
    upstream: Vec<UpstreamChannelDto>,
    #[serde(default)]
    downstream: Vec<DownstreamChannelDto>,
    upstream_phy_overhead: Option<usize>,
    downstream_phy_overhead: Option<usize>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct UpstreamChannelDto {
    data_rate: u64,
    minislot_us: u64,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct DownstreamChannelDto {
    data_rate: u64,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct CmtsDto {
    address: Option<String>,
    use_llc: Option<bool>,
    map_interval_us: Option<u64>,
    short_grant_limit: Option<u16>,
    ugs_grant_slots: Option<u16>,
    ranging_backoff: Option<[u8; 2]>,
    data_backoff: Option<[u8; 2]>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct CmDto {
    use_llc: Option<bool>,
    map_wait_timeout_us: Option<u64>,
    max_request_retries: Option<u8>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct ModemDto {
    address: Option<String>,
    sid: Sid,
    upstream_channel: Option<ChannelId>,
    downstream_channel: Option<ChannelId>,
    mode: Option<UpstreamMode>,
    distance_us: Option<u64>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct TrafficDto {
    from: String,
    to: String,
    size: usize,
    protocol: Option<u16>,
    start_us: Option<u64>,
    count: Option<u32>,
    interval_us: Option<u64>,

    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
config_version = "0.1"
seed = 7

[medium]
upstream_phy_overhead = 8
[[medium.upstream]]
data_rate = 5120000
minislot_us = 50
[[medium.upstream]]
data_rate = 10240000
minislot_us = 25
[[medium.downstream]]
data_rate = 42880000

[cmts]
address = "00:00:00:00:00:01"
map_interval_us = 2000
data_backoff = [1, 4]

[cm]
map_wait_timeout_us = 5000

[[modems]]
address = "00:00:00:00:00:10"
sid = 3
upstream_channel = 1
mode = "UnsolicitedGrant"
distance_us = 40

[[traffic]]
from = "00:00:00:00:00:10"
to = "cmts"
size = 200
count = 3
interval_us = 1000
"#;

    #[test]
    fn test_parse_example() {
        let shared = from_toml_str(EXAMPLE).unwrap();
        let cfg = shared.config();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.num_upstream(), 2);
        assert_eq!(cfg.medium.upstream[1].minislot_duration, Duration::from_micros(25));
        assert_eq!(cfg.medium.upstream_phy_overhead, 8);
        assert_eq!(cfg.cmts.map_interval, Some(Duration::from_micros(2000)));
        assert_eq!(cfg.cmts.data_backoff, (1, 4));
        assert_eq!(cfg.cmts.short_grant_limit, 16);
        assert_eq!(cfg.cm.map_wait_timeout, Duration::from_millis(5));
        assert_eq!(cfg.modems[0].mode, UpstreamMode::UnsolicitedGrant);
        assert_eq!(cfg.modems[0].distance, Duration::from_micros(40));
        assert_eq!(cfg.traffic[0].to, TrafficEndpoint::Cmts);
        assert_eq!(cfg.traffic[0].count, 3);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let bad = "config_version = \"0.1\"\n[cm]\nfoo = 1\n";
        let err = from_toml_str(bad).err().unwrap();
        assert!(err.to_string().contains("foo"));

        let bad_top = "config_version = \"0.1\"\nbar = true\n";
        assert!(from_toml_str(bad_top).is_err());
    }

    #[test]
    fn test_rejects_version_and_invalid() {
        assert!(from_toml_str("config_version = \"0.5\"\n").is_err());
        // channel index out of range must be an error, not a panic
        let bad = "config_version = \"0.1\"\n[[modems]]\nsid = 1\nupstream_channel = 3\n";
        assert!(from_toml_str(bad).is_err());
    }
}
