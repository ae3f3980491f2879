use std::collections::VecDeque;
use std::time::Duration;

use docsis_config::{CfgCmts, CfgUpstreamChannel};
use docsis_core::{ChannelId, DataRate, Sid, SimTime};
use docsis_pdus::mgmt::enums::ie_type::IeType;
use docsis_pdus::mgmt::fields::info_element::{IE_OFFSET_MAX, InfoElement};
use docsis_pdus::mgmt::pdus::map_msg::{MAP_MAX_ELEMENTS, MapMessage};

/// Minislots handed to one service in the next MAP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub sid: Sid,
    pub slots: u16,
    pub ie_type: IeType,
}

/// Upstream channel as the head-end schedules it: timing, pending grants and
/// the minislot counters of the MAPs sent so far
#[derive(Debug)]
pub struct UlChannelDesc {
    ucid: ChannelId,
    minislot_duration: Duration,
    data_rate: DataRate,
    grants: VecDeque<Grant>,
    /// Last minislot covered by a MAP already sent
    last_minislot_grant_sent: u32,
    /// Minislot in which the latest bandwidth request arrived
    last_minislot_request_received: u32,
}

impl UlChannelDesc {
    pub fn new(ucid: ChannelId, cfg: &CfgUpstreamChannel) -> Self {
        Self {
            ucid,
            minislot_duration: cfg.minislot_duration,
            data_rate: cfg.data_rate,
            grants: VecDeque::new(),
            last_minislot_grant_sent: 0,
            last_minislot_request_received: 0,
        }
    }

    pub fn ucid(&self) -> ChannelId {
        self.ucid
    }

    pub fn minislot_duration(&self) -> Duration {
        self.minislot_duration
    }

    pub fn set_minislot_duration(&mut self, d: Duration) {
        assert!(!d.is_zero(), "minislot duration must be non-zero");
        self.minislot_duration = d;
    }

    pub fn data_rate(&self) -> DataRate {
        self.data_rate
    }

    pub fn grants(&self) -> &VecDeque<Grant> {
        &self.grants
    }

    pub fn grants_mut(&mut self) -> &mut VecDeque<Grant> {
        &mut self.grants
    }

    pub fn last_minislot_grant_sent(&self) -> u32 {
        self.last_minislot_grant_sent
    }

    pub fn set_last_minislot_grant_sent(&mut self, m: u32) {
        self.last_minislot_grant_sent = m;
    }

    pub fn last_minislot_request_received(&self) -> u32 {
        self.last_minislot_request_received
    }

    /// First minislot starting at or after `t`
    pub fn time_to_minislot(&self, t: SimTime) -> u32 {
        let ms = self.minislot_duration.as_nanos() as u64;
        t.as_nanos().div_ceil(ms).min(u32::MAX as u64) as u32
    }

    pub fn minislot_to_time(&self, minislot: u32) -> SimTime {
        SimTime::from_nanos(self.minislot_duration.as_nanos() as u64 * minislot as u64)
    }

    /// Queues a data grant for a request of `minislots`, received at `now`
    pub fn on_request(&mut self, sid: Sid, minislots: u32, short_grant_limit: u16, now: SimTime) {
        let m = (now.as_nanos() / self.minislot_duration.as_nanos() as u64).min(u32::MAX as u64) as u32;
        self.last_minislot_request_received = self.last_minislot_request_received.max(m);
        if minislots == 0 {
            return;
        }
        let slots = minislots.min(IE_OFFSET_MAX as u32) as u16;
        let ie_type = if slots <= short_grant_limit { IeType::ShortDataGrant } else { IeType::LargeDataGrant };
        tracing::trace!(t = %now, "ch {}: sid {} requests {} minislots, {}", self.ucid, sid, minislots, ie_type);
        self.grants.push_back(Grant { sid, slots, ie_type });
    }

    /// Minislots needed to carry `bytes` on this channel
    pub fn bytes_to_minislots(&self, bytes: usize) -> u32 {
        let tx = self.data_rate.tx_time(bytes).as_nanos();
        tx.div_ceil(self.minislot_duration.as_nanos()).max(1) as u32
    }

    /// Builds the next MAP. It starts right after the last minislot already mapped, or at
    /// `earliest` if that is later. `periodic` grants (unsolicited grants, polls) come first,
    /// then the queued grants in FIFO order, as many as fit in one MAP.
    pub fn build_map(&mut self, earliest: u32, periodic: &[Grant], cfg: &CfgCmts) -> MapMessage {
        let start = self.last_minislot_grant_sent.saturating_add(1).max(earliest);
        let mut elements = Vec::new();
        let mut offset: u32 = 0;

        let fits = |g: &Grant, elements: &mut Vec<InfoElement>, offset: &mut u32| -> bool {
            // One element is kept for the Null terminator
            if elements.len() + 1 >= MAP_MAX_ELEMENTS || *offset + g.slots as u32 > IE_OFFSET_MAX as u32 {
                return false;
            }
            elements.push(InfoElement::new(g.sid, g.ie_type, *offset as u16));
            *offset += g.slots as u32;
            true
        };

        for g in periodic.iter().filter(|g| g.slots > 0) {
            if !fits(g, &mut elements, &mut offset) {
                tracing::warn!("ch {}: MAP full, periodic grant for sid {} skipped", self.ucid, g.sid);
            }
        }
        while let Some(g) = self.grants.pop_front() {
            if g.slots == 0 {
                continue;
            }
            if !fits(&g, &mut elements, &mut offset) {
                self.grants.push_front(g);
                break;
            }
        }
        elements.push(InfoElement::new(0, IeType::Null, offset as u16));

        if offset > 0 {
            self.last_minislot_grant_sent = start + offset - 1;
        }
        MapMessage {
            ucid: self.ucid,
            ucd_count: 0,
            alloc_start_time: start,
            ack_time: self.last_minislot_request_received,
            ranging_backoff_start: cfg.ranging_backoff.0,
            ranging_backoff_end: cfg.ranging_backoff.1,
            data_backoff_start: cfg.data_backoff.0,
            data_backoff_end: cfg.data_backoff.1,
            elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use docsis_core::debug;

    use super::*;

    fn channel() -> UlChannelDesc {
        UlChannelDesc::new(
            0,
            &CfgUpstreamChannel { data_rate: DataRate::from_bps(8_000_000), minislot_duration: Duration::from_millis(1) },
        )
    }

    #[test]
    fn test_map_from_grant_queue() {
        debug::setup_logging_verbose();
        let mut ch = channel();
        ch.grants_mut().push_back(Grant { sid: 5, slots: 10, ie_type: IeType::ShortDataGrant });
        ch.grants_mut().push_back(Grant { sid: 7, slots: 4, ie_type: IeType::ShortDataGrant });
        ch.set_last_minislot_grant_sent(99);

        let map = ch.build_map(0, &[], &CfgCmts::default());
        assert_eq!(map.alloc_start_time, 100);
        assert_eq!(map.elements.len(), 3);
        assert_eq!(map.elements[0], InfoElement::new(5, IeType::ShortDataGrant, 0));
        assert_eq!(map.elements[1], InfoElement::new(7, IeType::ShortDataGrant, 10));
        assert_eq!(map.elements[2], InfoElement::new(0, IeType::Null, 14));
        assert!(ch.grants().is_empty());
        assert_eq!(ch.last_minislot_grant_sent(), 113);
    }

    #[test]
    fn test_periodic_first_and_earliest_start() {
        let mut ch = channel();
        ch.on_request(9, 3, 16, SimTime::from_millis(2));
        let periodic = [
            Grant { sid: 1, slots: 4, ie_type: IeType::UnsolicitedGrant },
            Grant { sid: 2, slots: 1, ie_type: IeType::Request },
        ];
        let map = ch.build_map(50, &periodic, &CfgCmts::default());
        assert_eq!(map.alloc_start_time, 50);
        assert_eq!(map.ack_time, 2);
        let sids: Vec<Sid> = map.elements.iter().map(|e| e.sid).collect();
        assert_eq!(sids, vec![1, 2, 9, 0]);
        assert_eq!(map.elements[2].offset, 5);
        assert_eq!(map.end_offset(), 8);
        assert_eq!((map.data_backoff_start, map.data_backoff_end), (2, 6));

        // Nothing left to grant: empty MAP, counter untouched
        let map = ch.build_map(0, &[], &CfgCmts::default());
        assert_eq!(map.alloc_start_time, 58);
        assert_eq!(map.elements, vec![InfoElement::new(0, IeType::Null, 0)]);
        assert_eq!(ch.last_minislot_grant_sent(), 57);
    }

    #[test]
    fn test_request_classification() {
        let mut ch = channel();
        ch.on_request(1, 16, 16, SimTime::ZERO);
        ch.on_request(1, 17, 16, SimTime::ZERO);
        ch.on_request(1, 0, 16, SimTime::ZERO);
        let types: Vec<IeType> = ch.grants().iter().map(|g| g.ie_type).collect();
        assert_eq!(types, vec![IeType::ShortDataGrant, IeType::LargeDataGrant]);
    }

    #[test]
    fn test_map_capacity_leaves_rest_queued() {
        let mut ch = channel();
        for sid in 1..=300 {
            ch.grants_mut().push_back(Grant { sid, slots: 1, ie_type: IeType::ShortDataGrant });
        }
        let map = ch.build_map(0, &[], &CfgCmts::default());
        assert_eq!(map.elements.len(), MAP_MAX_ELEMENTS);
        assert_eq!(ch.grants().len(), 300 - 254);
        assert_eq!(ch.grants().front().map(|g| g.sid), Some(255));

        // Offsets are limited to 14 bits
        let mut ch = channel();
        ch.grants_mut().push_back(Grant { sid: 1, slots: 16000, ie_type: IeType::LargeDataGrant });
        ch.grants_mut().push_back(Grant { sid: 2, slots: 1000, ie_type: IeType::LargeDataGrant });
        let map = ch.build_map(0, &[], &CfgCmts::default());
        assert_eq!(map.elements.len(), 2);
        assert_eq!(ch.grants().len(), 1);
    }

    #[test]
    fn test_minislot_time_conversion() {
        let ch = channel();
        assert_eq!(ch.time_to_minislot(SimTime::from_millis(3)), 3);
        assert_eq!(ch.time_to_minislot(SimTime::from_micros(3100)), 4);
        assert_eq!(ch.minislot_to_time(7), SimTime::from_millis(7));
        assert_eq!(ch.bytes_to_minislots(1500), 2);
    }
}
