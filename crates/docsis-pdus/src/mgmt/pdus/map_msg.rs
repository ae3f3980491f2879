use core::fmt;

use docsis_core::{BitBuffer, Direction, MacAddress, PduParseErr};

use crate::mac::pdus::mac_header::MacHeader;
use crate::mgmt::enums::ie_type::IeType;
use crate::mgmt::enums::mmm_type::MmmType;
use crate::mgmt::fields::info_element::{IE_LEN, InfoElement};
use crate::mgmt::pdus::mgmt_header::{MGMT_HEADER_LEN, MgmtHeader};

/// Fixed part of the MAP body before the information elements
pub const MAP_PREFIX_LEN: usize = 16;
/// Management message version used for MAPs
pub const MAP_VERSION: u8 = 1;
/// Information elements fit in an 8-bit count
pub const MAP_MAX_ELEMENTS: usize = 255;

/// Upstream bandwidth allocation MAP
///
/// ```text
///  UCID (8) | UCD count (8) | number of elements (8) | reserved (8)
///  alloc start time (32) | ack time (32)
///  ranging backoff start (8) | ranging backoff end (8) | data backoff start (8) | data backoff end (8)
///  information elements (32 each)
/// ```
/// Element `i` covers the minislots from its offset up to the offset of element `i + 1`;
/// the last element is a Null IE marking the end of the MAP.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapMessage {
    pub ucid: u8,
    pub ucd_count: u8,
    /// Minislot number at which the first element starts
    pub alloc_start_time: u32,
    /// Latest minislot of requests already processed by the scheduler
    pub ack_time: u32,
    pub ranging_backoff_start: u8,
    pub ranging_backoff_end: u8,
    pub data_backoff_start: u8,
    pub data_backoff_end: u8,
    pub elements: Vec<InfoElement>,
}

impl MapMessage {
    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let ucid = buf.read_field(8, "ucid")? as u8;
        let ucd_count = buf.read_field(8, "ucd_count")? as u8;
        let num_elements = buf.read_field(8, "num_elements")? as usize;
        buf.read_field(8, "reserved")?;
        let alloc_start_time = buf.read_field(32, "alloc_start_time")? as u32;
        let ack_time = buf.read_field(32, "ack_time")? as u32;
        let ranging_backoff_start = buf.read_field(8, "ranging_backoff_start")? as u8;
        let ranging_backoff_end = buf.read_field(8, "ranging_backoff_end")? as u8;
        let data_backoff_start = buf.read_field(8, "data_backoff_start")? as u8;
        let data_backoff_end = buf.read_field(8, "data_backoff_end")? as u8;

        if buf.get_len_remaining() < num_elements * IE_LEN * 8 {
            return Err(PduParseErr::InconsistentLength {
                expected: num_elements * IE_LEN,
                found: buf.get_len_remaining() / 8,
            });
        }
        let mut elements = Vec::with_capacity(num_elements);
        for _ in 0..num_elements {
            elements.push(InfoElement::from_bitbuf(buf)?);
        }

        Ok(MapMessage {
            ucid,
            ucd_count,
            alloc_start_time,
            ack_time,
            ranging_backoff_start,
            ranging_backoff_end,
            data_backoff_start,
            data_backoff_end,
            elements,
        })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        assert!(self.elements.len() <= MAP_MAX_ELEMENTS, "too many information elements");
        buf.write_bits(self.ucid as u64, 8);
        buf.write_bits(self.ucd_count as u64, 8);
        buf.write_bits(self.elements.len() as u64, 8);
        buf.write_bits(0, 8);
        buf.write_bits(self.alloc_start_time as u64, 32);
        buf.write_bits(self.ack_time as u64, 32);
        buf.write_bits(self.ranging_backoff_start as u64, 8);
        buf.write_bits(self.ranging_backoff_end as u64, 8);
        buf.write_bits(self.data_backoff_start as u64, 8);
        buf.write_bits(self.data_backoff_end as u64, 8);
        for ie in self.elements.iter() {
            ie.to_bitbuf(buf);
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BitBuffer::new_autoexpand(self.serialized_size() * 8);
        self.to_bitbuf(&mut buf);
        buf.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, PduParseErr> {
        Self::from_bitbuf(&mut BitBuffer::from_bytes(data))
    }

    pub fn serialized_size(&self) -> usize {
        MAP_PREFIX_LEN + self.elements.len() * IE_LEN
    }

    /// Offset and length in minislots of element `i`. The length runs up to the next
    /// element, so the closing Null element has length zero.
    pub fn slot_of(&self, i: usize) -> Option<(u16, u16)> {
        let ie = self.elements.get(i)?;
        let len = match self.elements.get(i + 1) {
            Some(next) => next.offset.saturating_sub(ie.offset),
            None => 0,
        };
        Some((ie.offset, len))
    }

    /// Offset of the closing Null element, i.e. the number of minislots this MAP describes
    pub fn end_offset(&self) -> u16 {
        match self.elements.last() {
            Some(ie) if ie.ie_type == IeType::Null => ie.offset,
            _ => 0,
        }
    }
}

impl fmt::Display for MapMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAP {{ ucid: {} start: {} ack: {} data_backoff: {}..{} ies:",
            self.ucid, self.alloc_start_time, self.ack_time, self.data_backoff_start, self.data_backoff_end
        )?;
        for ie in self.elements.iter() {
            write!(f, " [{} {} @{}]", ie.sid, ie.ie_type, ie.offset)?;
        }
        write!(f, " }}")
    }
}

/// Complete downstream frame carrying `map` from `src` to `dst`:
/// MAC management header, management message header and MAP body
pub fn build_map_frame(dst: MacAddress, src: MacAddress, map: &MapMessage) -> Vec<u8> {
    let body = map.encode();
    let mgmt = MgmtHeader::new(dst, src, MmmType::Map, MAP_VERSION, body.len() as u16);
    let mut payload = BitBuffer::new_autoexpand((MGMT_HEADER_LEN + body.len()) * 8);
    mgmt.to_bitbuf(&mut payload);
    payload.write_bytes(&body);
    let payload = payload.into_bytes();
    MacHeader::management(Direction::Downstream, payload.len() as u16).encode(&payload)
}
