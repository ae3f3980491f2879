mod common;

use std::time::Duration;

use docsis_core::{DeviceKind, Direction, EntityId, Sap, SimTime, debug};
use docsis_entities::cm::cm_device::Cm;
use docsis_entities::cm::components::upstream_service::ServiceState;
use docsis_entities::observer::{TraceEvent, TraceKind};
use docsis_pdus::mgmt::enums::ie_type::IeType;
use docsis_pdus::mgmt::fields::info_element::InfoElement;
use docsis_pdus::mgmt::pdus::map_msg::{MapMessage, build_map_frame};
use docsis_saps::ctrl::CtrlAttachReq;
use docsis_saps::phy::{PhyDeliverInd, PhyTransmitCompleteInd, TxTag};
use docsis_saps::{SapMsg, SapMsgInner};

use common::{CM1_ADDR, CM2_ADDR, CMTS_ADDR, ComponentTest, default_test_config};

/// Modem whose medium is a sink, so every frame it sends can be inspected
fn setup() -> (ComponentTest, EntityId, EntityId) {
    let mut test = ComponentTest::new(default_test_config());
    let medium = test.add_sink();
    let cm = test.add_device(DeviceKind::Cm, CM1_ADDR);
    test.ctrl(cm, SapMsgInner::CtrlAttachReq(CtrlAttachReq { medium }));
    (test, medium, cm)
}

fn send_packet(test: &mut ComponentTest, cm: EntityId, len: usize) {
    let ok = test.with_entity::<Cm, _>(cm, |c, q| c.send(q, vec![0xAB; len], CMTS_ADDR, 0x0800));
    assert!(ok);
    test.deliver_all_messages();
}

fn complete(test: &mut ComponentTest, medium: EntityId, cm: EntityId, tag: TxTag) {
    let ind = PhyTransmitCompleteInd { direction: Direction::Upstream, channel: 0, tag };
    let now = test.router.now();
    test.submit_message(SapMsg::new(Sap::PhySap, medium, cm, now, SapMsgInner::PhyTransmitCompleteInd(ind)));
    test.deliver_all_messages();
}

fn deliver_map(test: &mut ComponentTest, medium: EntityId, cm: EntityId, to: docsis_core::MacAddress, map: &MapMessage) {
    let ind = PhyDeliverInd { direction: Direction::Downstream, channel: 0, frame: build_map_frame(to, CMTS_ADDR, map) };
    let now = test.router.now();
    test.submit_message(SapMsg::new(Sap::PhySap, medium, cm, now, SapMsgInner::PhyDeliverInd(ind)));
    test.deliver_all_messages();
}

fn grant_map(start: u32, sid: u16, slots: u16) -> MapMessage {
    MapMessage {
        ucid: 0,
        ucd_count: 0,
        alloc_start_time: start,
        ack_time: 0,
        ranging_backoff_start: 0,
        ranging_backoff_end: 0,
        data_backoff_start: 2,
        data_backoff_end: 6,
        elements: vec![InfoElement::new(sid, IeType::ShortDataGrant, 0), InfoElement::new(0, IeType::Null, slots)],
    }
}

fn transitions(events: &[TraceEvent]) -> Vec<(ServiceState, ServiceState)> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            TraceKind::ServiceState { from, to, .. } => Some((from, to)),
            _ => None,
        })
        .collect()
}

/// Tags of the frames the modem handed to the medium, with their time
fn sent_tags(test: &mut ComponentTest, medium: EntityId) -> Vec<(SimTime, TxTag)> {
    test.dump_sink(medium)
        .into_iter()
        .filter_map(|(t, m)| match m.msg {
            SapMsgInner::PhyTransmitStartReq(req) => Some((t, req.tag)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_request_grant_transmit_cycle() {
    debug::setup_logging_verbose();
    let (mut test, medium, cm) = setup();
    assert!(test.dump_sink(medium).iter().any(|(_, m)| matches!(m.msg, SapMsgInner::CtrlDeviceAttach(_))));

    send_packet(&mut test, cm, 100);
    assert_eq!(sent_tags(&mut test, medium), vec![(SimTime::ZERO, TxTag::Request { sid: 1 })]);
    let state = test.with_entity::<Cm, _>(cm, |c, _| c.upstream_service(1).map(|s| s.state()));
    assert_eq!(state, Some(ServiceState::RequestSent));

    complete(&mut test, medium, cm, TxTag::Request { sid: 1 });
    let state = test.with_entity::<Cm, _>(cm, |c, _| c.upstream_service(1).map(|s| s.state()));
    assert_eq!(state, Some(ServiceState::WaitForMap));

    // Grant of 2 minislots at minislot 5, i.e. 500 us
    deliver_map(&mut test, medium, cm, CM1_ADDR, &grant_map(5, 1, 2));
    assert!(sent_tags(&mut test, medium).is_empty());

    test.run_for(Duration::from_millis(1));
    assert_eq!(sent_tags(&mut test, medium), vec![(SimTime::from_micros(500), TxTag::Data { sid: 1 })]);

    use ServiceState::*;
    assert_eq!(
        transitions(&test.recorder.events()),
        vec![
            (Idle, Decision),
            (Decision, ToSendRequest),
            (ToSendRequest, RequestSent),
            (RequestSent, WaitForMap),
            (WaitForMap, ToSend),
            (ToSend, Idle),
        ]
    );
}

#[test]
fn test_map_for_other_modem_ignored() {
    debug::setup_logging_verbose();
    let (mut test, medium, cm) = setup();
    send_packet(&mut test, cm, 100);
    complete(&mut test, medium, cm, TxTag::Request { sid: 1 });
    test.dump_sink(medium);

    deliver_map(&mut test, medium, cm, CM2_ADDR, &grant_map(5, 1, 2));
    test.run_for(Duration::from_millis(1));

    assert!(sent_tags(&mut test, medium).is_empty());
    let state = test.with_entity::<Cm, _>(cm, |c, _| c.upstream_service(1).map(|s| s.state()));
    assert_eq!(state, Some(ServiceState::WaitForMap));
}

#[test]
fn test_map_timeout_sends_new_request() {
    debug::setup_logging_verbose();
    let (mut test, medium, cm) = setup();
    send_packet(&mut test, cm, 100);
    complete(&mut test, medium, cm, TxTag::Request { sid: 1 });
    test.dump_sink(medium);

    // Default map wait timeout is 20 ms, backoff is at most a few minislots
    test.run_for(Duration::from_millis(19));
    assert!(sent_tags(&mut test, medium).is_empty());
    test.run_for(Duration::from_millis(2));
    let sent = sent_tags(&mut test, medium);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, TxTag::Request { sid: 1 });
    assert!(sent[0].0 >= SimTime::from_millis(20));

    let seen = transitions(&test.recorder.events());
    assert!(seen.contains(&(ServiceState::WaitForMap, ServiceState::Contention)));
    assert!(seen.contains(&(ServiceState::Contention, ServiceState::ToSendRequest)));
}

#[test]
fn test_data_waits_for_request_to_leave_phy() {
    debug::setup_logging_verbose();
    let (mut test, medium, cm) = setup();
    send_packet(&mut test, cm, 100);
    test.dump_sink(medium);

    // Grant arrives before the request completion: slot is used, frames stay serialized
    deliver_map(&mut test, medium, cm, CM1_ADDR, &grant_map(5, 1, 2));
    test.run_for(Duration::from_millis(1));
    assert!(sent_tags(&mut test, medium).is_empty());

    complete(&mut test, medium, cm, TxTag::Request { sid: 1 });
    assert_eq!(sent_tags(&mut test, medium), vec![(SimTime::from_millis(1), TxTag::Data { sid: 1 })]);
}

#[test]
fn test_unattached_modem_refuses_packets() {
    debug::setup_logging_verbose();
    let mut test = ComponentTest::new(default_test_config());
    let cm = test.add_device(DeviceKind::Cm, CM1_ADDR);
    let ok = test.with_entity::<Cm, _>(cm, |c, q| c.send(q, vec![1, 2, 3], CMTS_ADDR, 0x0800));
    assert!(!ok);
    assert!(test.recorder.events().is_empty());
}

#[test]
fn test_packet_must_fit_queue_depth_count() {
    debug::setup_logging_verbose();
    let (mut test, _medium, cm) = setup();
    // 6-byte MAC header, 14-byte packet header and 4-byte CRC around the packet
    let too_big = test.with_entity::<Cm, _>(cm, |c, q| c.send(q, vec![0; u16::MAX as usize - 23], CMTS_ADDR, 0x0800));
    assert!(!too_big);
    let fits = test.with_entity::<Cm, _>(cm, |c, q| c.send(q, vec![0; u16::MAX as usize - 24], CMTS_ADDR, 0x0800));
    assert!(fits);
}
