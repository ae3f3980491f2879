use std::time::Duration;

use docsis_config::{CfgDownstreamChannel, CfgModem, CfgUpstreamChannel, SharedConfig, StackConfig, StackState};
use docsis_core::{DataRate, DeviceKind, EntityId, MacAddress, Sap, SimTime, UpstreamMode};
use docsis_entities::cm::cm_device::Cm;
use docsis_entities::cmts::cmts_device::Cmts;
use docsis_entities::factory::create_device;
use docsis_entities::observer::TraceRecorder;
use docsis_entities::{DocsisEntityTrait, MessageRouter};
use docsis_saps::ctrl::{CtrlAttachReq, CtrlDetachReq};
use docsis_saps::{SapMsg, SapMsgInner};

use super::sink::Sink;

pub const CMTS_ADDR: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x01]);
pub const CM1_ADDR: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x10]);
pub const CM2_ADDR: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x11]);

/// Handle of the medium in every ComponentTest
pub const HFC: EntityId = EntityId(0);

/// Creates a default config for testing. It can still be modified as needed
/// before passing it to the ComponentTest constructor.
/// Upstream: 8 Mbps (one byte per microsecond), 100 us minislots.
pub fn default_test_config() -> StackConfig {
    let mut cfg = StackConfig::default();
    cfg.seed = 7;
    cfg.medium.upstream = vec![CfgUpstreamChannel {
        data_rate: DataRate::from_bps(8_000_000),
        minislot_duration: Duration::from_micros(100),
    }];
    cfg.medium.downstream = vec![CfgDownstreamChannel { data_rate: DataRate::from_bps(40_000_000) }];
    cfg.cmts.address = Some(CMTS_ADDR);
    cfg.modems = vec![
        CfgModem {
            address: Some(CM1_ADDR),
            sid: 1,
            upstream_channel: 0,
            downstream_channel: 0,
            mode: UpstreamMode::BestEffort,
            distance: Duration::from_micros(50),
        },
        CfgModem {
            address: Some(CM2_ADDR),
            sid: 2,
            upstream_channel: 0,
            downstream_channel: 0,
            mode: UpstreamMode::BestEffort,
            distance: Duration::from_micros(100),
        },
    ];
    cfg
}

/// Infrastructure for testing the MAC entities.
/// Builds the medium, devices and sinks through the device factory and records
/// every device trace event.
pub struct ComponentTest {
    pub config: SharedConfig,
    pub router: MessageRouter,
    pub recorder: TraceRecorder,
    pub cmts: Option<EntityId>,
    pub cms: Vec<EntityId>,
    pub sinks: Vec<EntityId>,
    next_id: u32,
}

impl ComponentTest {
    /// Router with the medium registered as `HFC`
    pub fn new(config: StackConfig) -> Self {
        let config = SharedConfig::from_parts(config, StackState::default());
        let mut router = MessageRouter::new(config.clone());
        router.register_entity(create_device(DeviceKind::Hfc, HFC, config.clone(), MacAddress::default()));
        Self {
            config,
            router,
            recorder: TraceRecorder::new(),
            cmts: None,
            cms: vec![],
            sinks: vec![],
            next_id: 1,
        }
    }

    fn alloc_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Registers a head-end or modem with the trace recorder attached. Not attached to the medium yet.
    pub fn add_device(&mut self, kind: DeviceKind, address: MacAddress) -> EntityId {
        let id = self.alloc_id();
        self.router.register_entity(create_device(kind, id, self.config.clone(), address));
        let rec = self.recorder.clone();
        match kind {
            DeviceKind::Cmts => {
                self.router.with_entity::<Cmts, _>(id, |c, _| c.add_observer(Box::new(rec)));
                self.cmts = Some(id);
            }
            DeviceKind::Cm => {
                self.router.with_entity::<Cm, _>(id, |c, _| c.add_observer(Box::new(rec)));
                self.cms.push(id);
            }
            _ => {}
        }
        id
    }

    pub fn add_sink(&mut self) -> EntityId {
        let id = self.alloc_id();
        self.sinks.push(id);
        self.router.register_entity(Box::new(Sink::new(id)));
        id
    }

    /// Head-end plus every configured modem, all attached, each with a sink as upper layer.
    /// Returns (cmts, cms, upper sinks of the cmts followed by the cms)
    pub fn build_network(&mut self) -> (EntityId, Vec<EntityId>, Vec<EntityId>) {
        let cfg = self.config.config();
        let cmts_addr = cfg.cmts.address.unwrap_or_else(|| self.config.allocate_address());
        let cmts = self.add_device(DeviceKind::Cmts, cmts_addr);
        let up = self.add_sink();
        self.router.with_entity::<Cmts, _>(cmts, |c, _| c.set_upper(up));
        let mut uppers = vec![up];

        let mut cms = vec![];
        for m in cfg.modems.iter() {
            let addr = m.address.unwrap_or_else(|| self.config.allocate_address());
            let cm = self.add_device(DeviceKind::Cm, addr);
            let up = self.add_sink();
            self.router.with_entity::<Cm, _>(cm, |c, _| c.set_upper(up));
            uppers.push(up);
            cms.push(cm);
        }

        self.attach(cmts);
        for cm in cms.iter() {
            self.attach(*cm);
        }
        (cmts, cms, uppers)
    }

    pub fn ctrl(&mut self, dest: EntityId, msg: SapMsgInner) {
        let now = self.router.now();
        self.router.submit_message(SapMsg::new(Sap::Control, EntityId(u32::MAX), dest, now, msg));
        self.router.deliver_all_messages();
    }

    pub fn attach(&mut self, device: EntityId) {
        self.ctrl(device, SapMsgInner::CtrlAttachReq(CtrlAttachReq { medium: HFC }));
    }

    pub fn detach(&mut self, device: EntityId) {
        self.ctrl(device, SapMsgInner::CtrlDetachReq(CtrlDetachReq {}));
    }

    pub fn submit_message(&mut self, message: SapMsg) {
        self.router.submit_message(message);
    }

    pub fn deliver_all_messages(&mut self) {
        self.router.deliver_all_messages();
    }

    pub fn run_for(&mut self, d: Duration) {
        let until = self.router.now() + d;
        self.router.run_until(until);
    }

    pub fn run_until(&mut self, t: SimTime) {
        self.router.run_until(t);
    }

    pub fn with_entity<T: 'static, R>(&mut self, id: EntityId, f: impl FnOnce(&mut T, &mut docsis_entities::MessageQueue) -> R) -> R {
        match self.router.with_entity(id, f) {
            Some(r) => r,
            None => panic!("entity {} missing or of another type", id),
        }
    }

    pub fn dump_sink(&mut self, id: EntityId) -> Vec<(SimTime, SapMsg)> {
        match self.router.get_entity(id) {
            Some(component) => match component.as_any_mut().downcast_mut::<Sink>() {
                Some(sink) => sink.take_msgqueue(),
                None => vec![],
            },
            None => vec![],
        }
    }

    pub fn register_entity<T: 'static + DocsisEntityTrait>(&mut self, entity: T) {
        self.router.register_entity(Box::new(entity));
    }
}
