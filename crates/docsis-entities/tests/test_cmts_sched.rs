mod common;

use std::time::Duration;

use docsis_core::{BitBuffer, DeviceKind, Direction, EntityId, MacAddress, Sap, SimTime, UpstreamMode, debug};
use docsis_entities::cmts::cmts_device::Cmts;
use docsis_entities::hfc::hfc_medium::Hfc;
use docsis_entities::observer::TraceKind;
use docsis_pdus::mac::pdus::mac_header::MacHeader;
use docsis_pdus::mgmt::enums::ie_type::IeType;
use docsis_pdus::mgmt::pdus::map_msg::MapMessage;
use docsis_pdus::mgmt::pdus::mgmt_header::{MGMT_HEADER_LEN, MgmtHeader};
use docsis_saps::ctrl::*;
use docsis_saps::phy::{PhyTransmitStartReq, TxTag};
use docsis_saps::{SapMsg, SapMsgInner};

use common::{CM1_ADDR, CM2_ADDR, CMTS_ADDR, ComponentTest, HFC, default_test_config};

/// Real medium and head-end, with sinks posing as the two modems
fn setup() -> (ComponentTest, EntityId, EntityId, EntityId) {
    let mut test = ComponentTest::new(default_test_config());
    let cmts = test.add_device(DeviceKind::Cmts, CMTS_ADDR);
    test.attach(cmts);
    let cm1 = test.add_sink();
    let cm2 = test.add_sink();
    fake_cm(&mut test, cm1, CM1_ADDR, 50, 1);
    fake_cm(&mut test, cm2, CM2_ADDR, 100, 2);
    (test, cmts, cm1, cm2)
}

fn fake_cm(test: &mut ComponentTest, from: EntityId, address: MacAddress, distance_us: u64, sid: u16) {
    let services = vec![
        ServiceDesc { sid, direction: Direction::Upstream, channel: 0, mode: UpstreamMode::BestEffort },
        ServiceDesc { sid, direction: Direction::Downstream, channel: 0, mode: UpstreamMode::BestEffort },
    ];
    let att = CtrlDeviceAttach { kind: DeviceKind::Cm, address, distance: Duration::from_micros(distance_us), services };
    let now = test.router.now();
    test.submit_message(SapMsg::new(Sap::Control, from, HFC, now, SapMsgInner::CtrlDeviceAttach(att)));
    test.deliver_all_messages();
}

fn send_upstream(test: &mut ComponentTest, from: EntityId, frame: Vec<u8>, tag: TxTag) {
    let req = PhyTransmitStartReq {
        direction: Direction::Upstream,
        channel: 0,
        tx_time: Duration::from_micros(frame.len() as u64),
        frame,
        dest: None,
        tag,
    };
    let now = test.router.now();
    test.submit_message(SapMsg::new(Sap::PhySap, from, HFC, now, SapMsgInner::PhyTransmitStartReq(req)));
}

/// MAPs received by a sink: (reception time, destination, MAP)
fn received_maps(test: &mut ComponentTest, sink: EntityId) -> Vec<(SimTime, MacAddress, MapMessage)> {
    let mut out = vec![];
    for (t, m) in test.dump_sink(sink) {
        let SapMsgInner::PhyDeliverInd(ind) = m.msg else {
            continue;
        };
        let Ok((_, rest, _)) = MacHeader::decode(&ind.frame, Direction::Downstream) else {
            continue;
        };
        let Ok(mgmt) = MgmtHeader::from_bitbuf(&mut BitBuffer::from_bytes(rest)) else {
            continue;
        };
        if !mgmt.is_map_packet() {
            continue;
        }
        let map = MapMessage::decode(&rest[MGMT_HEADER_LEN..]).expect("map decodes");
        out.push((t, mgmt.dst, map));
    }
    out
}

#[test]
fn test_request_answered_with_short_grant() {
    debug::setup_logging_verbose();
    let (mut test, cmts, cm1, cm2) = setup();

    send_upstream(&mut test, cm1, MacHeader::request(1, 3).encode(&[]), TxTag::Request { sid: 1 });
    test.run_for(Duration::from_millis(10));

    let maps = received_maps(&mut test, cm1);
    assert_eq!(maps.len(), 1);
    let (rx_time, dst, map) = &maps[0];
    assert_eq!(*dst, CM1_ADDR);
    assert_eq!(map.ucid, 0);
    assert_eq!(map.elements[0].sid, 1);
    assert_eq!(map.elements[0].ie_type, IeType::ShortDataGrant);
    assert_eq!(map.slot_of(0), Some((0, 3)));
    assert_eq!(map.elements.last().map(|e| e.ie_type), Some(IeType::Null));

    // Every modem on the channel gets its own copy
    let other = received_maps(&mut test, cm2);
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].1, CM2_ADDR);
    assert_eq!(other[0].2, *map);

    // The MAP leaves early enough to reach the farthest modem before the interval starts
    let sent_at = test
        .recorder
        .events()
        .iter()
        .find(|e| matches!(e.kind, TraceKind::MapSent { .. }))
        .map(|e| e.t)
        .expect("map sent");
    let (start, latest) = test.with_entity::<Cmts, _>(cmts, |c, _| {
        let start = c.minislot_to_time(0, map.alloc_start_time).expect("channel 0");
        (start, c.latest_moment_to_send_map(start))
    });
    assert!(latest.is_some_and(|l| sent_at <= l));
    assert!(*rx_time < start);
    assert!(other[0].0 < start);
}

#[test]
fn test_queue_depth_request_gets_large_grant() {
    debug::setup_logging_verbose();
    let (mut test, _cmts, cm1, _cm2) = setup();

    send_upstream(&mut test, cm1, MacHeader::queue_depth_request(1, 3000).encode(&[]), TxTag::Request { sid: 1 });
    test.run_for(Duration::from_millis(10));

    let maps = received_maps(&mut test, cm1);
    assert_eq!(maps.len(), 1);
    let map = &maps[0].2;
    assert_eq!(map.elements[0].ie_type, IeType::LargeDataGrant);
    // 3000 bytes at one byte per microsecond, 100 us minislots
    assert_eq!(map.slot_of(0), Some((0, 30)));
}

#[test]
fn test_consecutive_maps_do_not_overlap() {
    debug::setup_logging_verbose();
    let (mut test, _cmts, cm1, cm2) = setup();

    send_upstream(&mut test, cm1, MacHeader::request(1, 4).encode(&[]), TxTag::Request { sid: 1 });
    send_upstream(&mut test, cm2, MacHeader::request(2, 2).encode(&[]), TxTag::Request { sid: 2 });
    test.run_for(Duration::from_millis(10));

    let maps = received_maps(&mut test, cm1);
    assert_eq!(maps.len(), 2);
    let first = &maps[0].2;
    let second = &maps[1].2;
    assert_eq!(first.elements[0].sid, 1);
    assert_eq!(second.elements[0].sid, 2);
    assert!(second.alloc_start_time >= first.alloc_start_time + first.end_offset() as u32);
}

#[test]
fn test_request_from_unknown_sid_ignored() {
    debug::setup_logging_verbose();
    let (mut test, _cmts, cm1, _cm2) = setup();

    send_upstream(&mut test, cm1, MacHeader::request(9, 3).encode(&[]), TxTag::Request { sid: 9 });
    test.run_for(Duration::from_millis(10));

    assert!(received_maps(&mut test, cm1).is_empty());
    assert_eq!(test.recorder.count(|e| matches!(e.kind, TraceKind::MapSent { .. })), 0);
}

#[test]
fn test_max_rtt_follows_farthest_modem() {
    debug::setup_logging_verbose();
    let (mut test, cmts, _cm1, cm2) = setup();
    let rtt = test.with_entity::<Cmts, _>(cmts, |c, _| c.calculate_max_rtt());
    assert_eq!(rtt, Duration::from_micros(200));

    let now = test.router.now();
    let det = CtrlDeviceDetach { address: CM2_ADDR };
    test.submit_message(SapMsg::new(Sap::Control, cm2, HFC, now, SapMsgInner::CtrlDeviceDetach(det)));
    test.deliver_all_messages();

    let rtt = test.with_entity::<Cmts, _>(cmts, |c, _| c.calculate_max_rtt());
    assert_eq!(rtt, Duration::from_micros(100));
    let known = test.with_entity::<Cmts, _>(cmts, |c, _| c.cm_addresses());
    assert_eq!(known, vec![CM1_ADDR]);
}

#[test]
fn test_address_change_rekeys_medium_and_headend() {
    debug::setup_logging_verbose();
    let (mut test, cmts, cm1, _cm2) = setup();
    let new = MacAddress::from_u64(0x0200_0000_0042);

    let now = test.router.now();
    let change = CtrlAddressChange { old: CM1_ADDR, new };
    test.submit_message(SapMsg::new(Sap::Control, cm1, HFC, now, SapMsgInner::CtrlAddressChange(change)));
    test.deliver_all_messages();

    let (old_known, new_known) = test.with_entity::<Hfc, _>(HFC, |h, _| (h.is_cm_attached(CM1_ADDR), h.is_cm_attached(new)));
    assert!(!old_known);
    assert!(new_known);
    let entity = test.with_entity::<Cmts, _>(cmts, |c, _| {
        assert!(c.cm(CM1_ADDR).is_none());
        c.cm(new).map(|r| r.entity)
    });
    assert_eq!(entity, Some(cm1));

    // MAPs now go to the new address
    send_upstream(&mut test, cm1, MacHeader::request(1, 2).encode(&[]), TxTag::Request { sid: 1 });
    test.run_for(Duration::from_millis(10));
    let maps = received_maps(&mut test, cm1);
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0].1, new);
}

#[test]
fn test_address_clash_rejected() {
    debug::setup_logging_verbose();
    let (mut test, cmts, cm1, _cm2) = setup();

    let now = test.router.now();
    let change = CtrlAddressChange { old: CM1_ADDR, new: CM2_ADDR };
    test.submit_message(SapMsg::new(Sap::Control, cm1, HFC, now, SapMsgInner::CtrlAddressChange(change)));
    test.deliver_all_messages();

    let attached = test.with_entity::<Hfc, _>(HFC, |h, _| h.cm(CM1_ADDR).map(|e| e.entity));
    assert_eq!(attached, Some(cm1));
    let entity = test.with_entity::<Cmts, _>(cmts, |c, _| c.cm(CM2_ADDR).map(|r| r.entity));
    assert_ne!(entity, Some(cm1));

    let refused = test
        .dump_sink(cm1)
        .into_iter()
        .any(|(_, m)| matches!(m.msg, SapMsgInner::CtrlAddressChangeCnf(CtrlAddressChangeCnf { accepted: false, .. })));
    assert!(refused);
}
