use clap::Parser;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use docsis_config::{SharedConfig, TrafficEndpoint, toml_config};
use docsis_core::{DeviceKind, EntityId, MacAddress, Sap, SimTime, debug};
use docsis_entities::MessageRouter;
use docsis_entities::cm::cm_device::Cm;
use docsis_entities::cm::components::upstream_service::ServiceState;
use docsis_entities::cmts::cmts_device::Cmts;
use docsis_entities::factory::create_device;
use docsis_entities::observer::{TraceEvent, TraceKind, TraceRecorder};
use docsis_entities::user::traffic_user::{TrafficStream, TrafficUser};
use docsis_saps::ctrl::CtrlAttachReq;
use docsis_saps::{SapMsg, SapMsgInner};

const HFC: EntityId = EntityId(0);

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SharedConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

/// A MAC device with the traffic user sitting on top of it
struct Station {
    device: EntityId,
    user: EntityId,
    address: MacAddress,
}

struct Network {
    router: MessageRouter,
    recorder: TraceRecorder,
    cmts: Station,
    cms: Vec<Station>,
}

/// Registers the medium, the head-end and every configured modem, each with a traffic user
fn build_network(cfg: &SharedConfig) -> Network {
    let mut router = MessageRouter::new(cfg.clone());
    let recorder = TraceRecorder::new();
    let mut next_id = 1;
    let mut alloc = || {
        let id = EntityId(next_id);
        next_id += 1;
        id
    };

    router.register_entity(create_device(DeviceKind::Hfc, HFC, cfg.clone(), MacAddress::default()));

    let stack = cfg.config();
    let cmts_addr = stack.cmts.address.unwrap_or_else(|| cfg.allocate_address());
    let cmts = Station { device: alloc(), user: alloc(), address: cmts_addr };
    router.register_entity(create_device(DeviceKind::Cmts, cmts.device, cfg.clone(), cmts.address));
    router.register_entity(create_device(DeviceKind::User, cmts.user, cfg.clone(), cmts.address));
    let rec = recorder.clone();
    router.with_entity::<Cmts, _>(cmts.device, |c, _| {
        c.set_upper(cmts.user);
        c.add_observer(Box::new(rec));
    });

    let mut cms = vec![];
    for m in stack.modems.iter() {
        let address = m.address.unwrap_or_else(|| cfg.allocate_address());
        let st = Station { device: alloc(), user: alloc(), address };
        router.register_entity(create_device(DeviceKind::Cm, st.device, cfg.clone(), address));
        router.register_entity(create_device(DeviceKind::User, st.user, cfg.clone(), address));
        let rec = recorder.clone();
        router.with_entity::<Cm, _>(st.device, |c, _| {
            c.set_upper(st.user);
            c.add_observer(Box::new(rec));
        });
        cms.push(st);
    }

    for st in std::iter::once(&cmts).chain(cms.iter()) {
        router.with_entity::<TrafficUser, _>(st.user, |u, _| u.set_device(st.device));
        let attach = SapMsg::new(
            Sap::Control,
            st.user,
            st.device,
            SimTime::ZERO,
            SapMsgInner::CtrlAttachReq(CtrlAttachReq { medium: HFC }),
        );
        router.submit_message(attach);
        router.deliver_all_messages();
    }
    eprintln!(" -> head-end {} with {} modems", cmts.address, cms.len());

    Network { router, recorder, cmts, cms }
}

/// Hands the configured traffic streams to the users of their source devices
fn schedule_traffic(cfg: &SharedConfig, net: &mut Network) {
    for (i, t) in cfg.config().traffic.iter().enumerate() {
        let from = match t.from {
            TrafficEndpoint::Cmts => Some(net.cmts.user),
            TrafficEndpoint::Modem(addr) => net.cms.iter().find(|s| s.address == addr).map(|s| s.user),
            TrafficEndpoint::Broadcast => None,
        };
        let Some(user) = from else {
            tracing::warn!("traffic stream {}: no sending device for {:?}, skipped", i, t.from);
            continue;
        };
        let to = match t.to {
            TrafficEndpoint::Cmts => net.cmts.address,
            TrafficEndpoint::Broadcast => MacAddress::BROADCAST,
            TrafficEndpoint::Modem(addr) => addr,
        };
        let stream = TrafficStream {
            to,
            size: t.size,
            protocol: t.protocol,
            start: SimTime::ZERO + t.start,
            count: t.count,
            interval: t.interval,
        };
        if let Some((at, msg)) = net.router.with_entity::<TrafficUser, _>(user, |u, _| u.add_stream(stream)) {
            net.router.schedule_at(at, msg);
        }
    }
}

/// Per-device counters distilled from the trace
#[derive(Default)]
struct DeviceSummary {
    tx_packets: usize,
    tx_bytes: usize,
    rx_packets: usize,
    rx_bytes: usize,
    rx_drops: usize,
    requests: usize,
    maps: usize,
    dropped: usize,
}

fn summarize(events: &[TraceEvent]) -> BTreeMap<MacAddress, DeviceSummary> {
    let mut out: BTreeMap<MacAddress, DeviceSummary> = BTreeMap::new();
    for ev in events {
        let s = out.entry(ev.device).or_default();
        match ev.kind {
            TraceKind::MacTx { bytes, .. } => {
                s.tx_packets += 1;
                s.tx_bytes += bytes;
            }
            TraceKind::MacRx { bytes, .. } => {
                s.rx_packets += 1;
                s.rx_bytes += bytes;
            }
            TraceKind::MacRxDrop { .. } => s.rx_drops += 1,
            TraceKind::ServiceState { to: ServiceState::RequestSent, .. } => s.requests += 1,
            TraceKind::MapSent { .. } => s.maps += 1,
            TraceKind::PacketDropped { .. } => s.dropped += 1,
            _ => {}
        }
    }
    out
}

fn print_summary(net: &mut Network, end: SimTime) {
    println!("\nSimulation ended at {}", end);
    println!(
        "{:<18} {:>8} {:>10} {:>8} {:>10} {:>6} {:>6} {:>6} {:>6} {:>8}",
        "device", "tx_pkts", "tx_bytes", "rx_pkts", "rx_bytes", "drops", "reqs", "maps", "lost", "delivered"
    );
    let summary = summarize(&net.recorder.events());
    let stations: Vec<(MacAddress, EntityId)> =
        std::iter::once(&net.cmts).chain(net.cms.iter()).map(|s| (s.address, s.user)).collect();
    for (addr, user) in stations {
        let delivered = net.router.with_entity::<TrafficUser, _>(user, |u, _| u.rx_packets()).unwrap_or(0);
        let d = summary.get(&addr);
        let get = |f: fn(&DeviceSummary) -> usize| d.map_or(0, f);
        println!(
            "{:<18} {:>8} {:>10} {:>8} {:>10} {:>6} {:>6} {:>6} {:>6} {:>8}",
            addr.to_string(),
            get(|s| s.tx_packets),
            get(|s| s.tx_bytes),
            get(|s| s.rx_packets),
            get(|s| s.rx_bytes),
            get(|s| s.rx_drops),
            get(|s| s.requests),
            get(|s| s.maps),
            get(|s| s.dropped),
            delivered
        );
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "DOCSIS MAC layer simulator",
    long_about = "Simulates a cable plant with one head-end and a set of cable modems, driven by the provided TOML configuration"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with channel plan, modems and traffic")]
    config: String,

    /// Virtual time to simulate
    #[arg(long, default_value_t = 1000)]
    duration_ms: u64,
}

fn main() {
    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(cfg.config().debug_log.clone());

    let mut net = build_network(&cfg);
    schedule_traffic(&cfg, &mut net);

    // Ctrl+C stops the event loop at the next event
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("failed to set Ctrl+C handler: {}", e);
    }

    let end = SimTime::from_millis(args.duration_ms);
    net.router.run_until_flag(end, &running);
    let stopped_at = net.router.now();
    print_summary(&mut net, stopped_at);
}
