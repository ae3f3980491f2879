mod common;

use std::time::Duration;

use docsis_core::{MacAddress, SimTime, UpstreamMode, debug};
use docsis_entities::cm::cm_device::Cm;
use docsis_entities::cm::components::upstream_service::ServiceState;
use docsis_entities::cmts::cmts_device::Cmts;
use docsis_entities::hfc::hfc_medium::Hfc;
use docsis_entities::observer::TraceKind;
use docsis_saps::ctrl::CtrlSetAddressReq;
use docsis_saps::upper::UpperUnitdataInd;
use docsis_saps::SapMsgInner;

use common::{CM1_ADDR, CM2_ADDR, CMTS_ADDR, ComponentTest, HFC, default_test_config};

fn received(test: &mut ComponentTest, sink: docsis_core::EntityId) -> Vec<(SimTime, UpperUnitdataInd)> {
    test.dump_sink(sink)
        .into_iter()
        .filter_map(|(t, m)| match m.msg {
            SapMsgInner::UpperUnitdataInd(ind) => Some((t, ind)),
            _ => None,
        })
        .collect()
}

fn requests_sent(test: &ComponentTest, device: MacAddress) -> usize {
    test.recorder.count(|e| {
        e.device == device && matches!(e.kind, TraceKind::ServiceState { to: ServiceState::RequestSent, .. })
    })
}

#[test]
fn test_modem_to_headend() {
    debug::setup_logging_verbose();
    let mut test = ComponentTest::new(default_test_config());
    let (_cmts, cms, uppers) = test.build_network();

    let ok = test.with_entity::<Cm, _>(cms[0], |c, q| c.send(q, vec![7u8; 100], CMTS_ADDR, 0x0800));
    assert!(ok);
    test.run_for(Duration::from_millis(10));

    let got = received(&mut test, uppers[0]);
    assert_eq!(got.len(), 1);
    let (t, ind) = &got[0];
    assert_eq!(ind.src, CM1_ADDR);
    assert_eq!(ind.dst, CMTS_ADDR);
    assert_eq!(ind.packet, vec![7u8; 100]);
    assert_eq!(ind.protocol, 0x0800);
    // Request, MAP lead time, granted slot, propagation
    assert!(*t > SimTime::from_millis(2) && *t < SimTime::from_millis(5));
    assert!(received(&mut test, uppers[1]).is_empty());
    assert_eq!(requests_sent(&test, CM1_ADDR), 1);
}

#[test]
fn test_headend_to_modem() {
    debug::setup_logging_verbose();
    let mut test = ComponentTest::new(default_test_config());
    let (cmts, _cms, uppers) = test.build_network();

    let ok = test.with_entity::<Cmts, _>(cmts, |c, q| c.send(q, vec![1, 2, 3, 4], CM2_ADDR, 0x86DD));
    assert!(ok);
    test.run_for(Duration::from_millis(1));

    assert!(received(&mut test, uppers[1]).is_empty());
    let got = received(&mut test, uppers[2]);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].1.src, CMTS_ADDR);
    assert_eq!(got[0].1.packet, vec![1, 2, 3, 4]);
    // CM2 sits 100 us from the head-end
    assert!(got[0].0 > SimTime::from_micros(100));
}

#[test]
fn test_modem_to_modem_through_headend() {
    debug::setup_logging_verbose();
    let mut test = ComponentTest::new(default_test_config());
    let (_cmts, cms, uppers) = test.build_network();

    test.with_entity::<Cm, _>(cms[0], |c, q| c.send(q, vec![9u8; 64], CM2_ADDR, 0x0800));
    test.run_for(Duration::from_millis(10));

    let got = received(&mut test, uppers[2]);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].1.src, CM1_ADDR);
    assert_eq!(got[0].1.dst, CM2_ADDR);
    assert!(received(&mut test, uppers[0]).is_empty());
    assert!(received(&mut test, uppers[1]).is_empty());
}

#[test]
fn test_backlog_rides_on_piggybacked_requests() {
    debug::setup_logging_verbose();
    let mut test = ComponentTest::new(default_test_config());
    let (_cmts, cms, uppers) = test.build_network();

    for i in 0..3u8 {
        test.with_entity::<Cm, _>(cms[0], |c, q| c.send(q, vec![i; 100], CMTS_ADDR, 0x0800));
    }
    test.run_for(Duration::from_millis(30));

    let got = received(&mut test, uppers[0]);
    let firsts: Vec<u8> = got.iter().map(|(_, ind)| ind.packet[0]).collect();
    assert_eq!(firsts, vec![0, 1, 2]);
    // Only the first packet needed a stand-alone request
    assert_eq!(requests_sent(&test, CM1_ADDR), 1);
    let state = test.with_entity::<Cm, _>(cms[0], |c, _| c.upstream_service(1).map(|s| (s.state(), s.queued_packets())));
    assert_eq!(state, Some((ServiceState::Idle, 0)));
}

#[test]
fn test_unsolicited_grants_without_requests() {
    debug::setup_logging_verbose();
    let mut cfg = default_test_config();
    cfg.cmts.map_interval = Some(Duration::from_millis(2));
    cfg.modems[0].mode = UpstreamMode::UnsolicitedGrant;
    let mut test = ComponentTest::new(cfg);
    let (_cmts, cms, uppers) = test.build_network();

    test.with_entity::<Cm, _>(cms[0], |c, q| {
        c.send(q, vec![1u8; 100], CMTS_ADDR, 0x0800);
        c.send(q, vec![2u8; 100], CMTS_ADDR, 0x0800);
    });
    test.run_for(Duration::from_millis(20));

    let got = received(&mut test, uppers[0]);
    assert_eq!(got.len(), 2);
    assert_eq!(requests_sent(&test, CM1_ADDR), 0);
    assert!(test.recorder.count(|e| matches!(e.kind, TraceKind::MapSent { .. })) >= 5);
}

#[test]
fn test_address_change_then_traffic() {
    debug::setup_logging_verbose();
    let mut test = ComponentTest::new(default_test_config());
    let (cmts, cms, uppers) = test.build_network();
    let new = MacAddress::from_u64(0x0200_0000_0077);

    test.ctrl(cms[0], SapMsgInner::CtrlSetAddressReq(CtrlSetAddressReq { address: new }));
    assert_eq!(
        test.recorder.count(|e| e.kind == TraceKind::AddressChange { old: CM1_ADDR, new }),
        1
    );
    let known = test.with_entity::<Cmts, _>(cmts, |c, _| c.cm(new).is_some() && c.cm(CM1_ADDR).is_none());
    assert!(known);

    test.with_entity::<Cm, _>(cms[0], |c, q| c.send(q, vec![5u8; 40], CMTS_ADDR, 0x0800));
    test.with_entity::<Cmts, _>(cmts, |c, q| c.send(q, vec![6u8; 40], new, 0x0800));
    test.run_for(Duration::from_millis(10));

    let up = received(&mut test, uppers[0]);
    assert_eq!(up.len(), 1);
    assert_eq!(up[0].1.src, new);
    let down = received(&mut test, uppers[1]);
    assert_eq!(down.len(), 1);
    assert_eq!(down[0].1.dst, new);
}

#[test]
fn test_address_clash_keeps_modem_reachable() {
    debug::setup_logging_verbose();
    let mut test = ComponentTest::new(default_test_config());
    let (cmts, cms, uppers) = test.build_network();

    test.ctrl(cms[0], SapMsgInner::CtrlSetAddressReq(CtrlSetAddressReq { address: CM2_ADDR }));
    let addr = test.with_entity::<Cm, _>(cms[0], |c, _| c.address());
    assert_eq!(addr, CM1_ADDR);
    let keyed = test.with_entity::<Hfc, _>(HFC, |h, _| h.cm(CM1_ADDR).map(|e| e.entity));
    assert_eq!(keyed, Some(cms[0]));
    assert_eq!(test.recorder.count(|e| matches!(e.kind, TraceKind::AddressChange { .. })), 0);

    // Grants still reach the modem under its old address
    test.with_entity::<Cm, _>(cms[0], |c, q| c.send(q, vec![5u8; 40], CMTS_ADDR, 0x0800));
    test.run_for(Duration::from_millis(10));
    let up = received(&mut test, uppers[0]);
    assert_eq!(up.len(), 1);
    assert_eq!(up[0].1.src, CM1_ADDR);
    let known = test.with_entity::<Cmts, _>(cmts, |c, _| c.cm(CM1_ADDR).map(|r| r.entity));
    assert_eq!(known, Some(cms[0]));
}

#[test]
fn test_headend_detach_takes_modems_down() {
    debug::setup_logging_verbose();
    let mut test = ComponentTest::new(default_test_config());
    let (cmts, cms, _uppers) = test.build_network();

    test.detach(cmts);
    for cm in cms.iter() {
        let attached = test.with_entity::<Cm, _>(*cm, |c, _| c.is_attached());
        assert!(!attached);
    }
    assert_eq!(test.recorder.count(|e| e.kind == TraceKind::LinkDown), 3);

    let ok = test.with_entity::<Cm, _>(cms[0], |c, q| c.send(q, vec![1], CMTS_ADDR, 0x0800));
    assert!(!ok);
}
