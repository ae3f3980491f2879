use core::fmt;

use docsis_core::{BitBuffer, Direction, PduParseErr, Sid, expect_value};

use crate::mac::enums::frame_control_type::FrameControlType;
use crate::mac::enums::mac_header_type::MacHeaderType;
use crate::mac::fields::ext_header::ExtHeaderElement;

/// FC, MAC_PARM, LEN and HCS
pub const MAC_HEADER_FIXED_LEN: usize = 6;
/// Queue-depth request: FC, 2-byte MAC_PARM, SID, HCS
pub const QDB_REQUEST_LEN: usize = 7;

/// Generic MAC frame header
///
/// ```text
///  FC (8) | MAC_PARM (8) | LEN or SID (16) | EHDR (0..255 bytes) | HCS (16)
///  FC = FC_TYPE (2) | FC_PARM (5) | EHDR_ON (1)
/// ```
/// The queue-depth request header widens MAC_PARM to 16 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacHeader {
    /// Not on the wire; tells the receiver which way the frame travelled
    pub direction: Direction,
    // 2
    pub fc_type: FrameControlType,
    // 5, only for MacSpecific
    pub mac_type: Option<MacHeaderType>,
    // 1
    pub ehdr_on: bool,
    /// Total EHDR length in bytes. May exceed the sum of `ext_headers` when the
    /// received header carried padding or elements we do not interpret.
    pub ehdr_len: u8,
    /// Bytes following the header (LEN minus EHDR)
    pub payload_len: u16,
    /// Request: minislots wanted
    pub requested_minislots: Option<u8>,
    /// Queue-depth request: bytes wanted
    pub requested_bytes: Option<u16>,
    /// Request and queue-depth request: requesting service
    pub sid: Option<Sid>,
    /// Concatenation: number of frames that follow
    pub frame_count: Option<u8>,
    pub ext_headers: Vec<ExtHeaderElement>,
}

impl MacHeader {
    fn base(direction: Direction, fc_type: FrameControlType, mac_type: Option<MacHeaderType>, payload_len: u16) -> Self {
        MacHeader {
            direction,
            fc_type,
            mac_type,
            ehdr_on: false,
            ehdr_len: 0,
            payload_len,
            requested_minislots: None,
            requested_bytes: None,
            sid: None,
            frame_count: None,
            ext_headers: vec![],
        }
    }

    /// Header for a packet PDU of `payload_len` bytes (packet header, data and CRC)
    pub fn data_pdu(direction: Direction, payload_len: u16) -> Self {
        Self::base(direction, FrameControlType::PacketPdu, None, payload_len)
    }

    pub fn isolation_pdu(direction: Direction, payload_len: u16) -> Self {
        Self::base(direction, FrameControlType::IsolationPdu, None, payload_len)
    }

    pub fn timing(direction: Direction, payload_len: u16) -> Self {
        Self::base(direction, FrameControlType::MacSpecific, Some(MacHeaderType::Timing), payload_len)
    }

    pub fn management(direction: Direction, payload_len: u16) -> Self {
        Self::base(direction, FrameControlType::MacSpecific, Some(MacHeaderType::Management), payload_len)
    }

    /// Stand-alone bandwidth request, always upstream and without payload
    pub fn request(sid: Sid, minislots: u8) -> Self {
        let mut h = Self::base(Direction::Upstream, FrameControlType::MacSpecific, Some(MacHeaderType::Request), 0);
        h.requested_minislots = Some(minislots);
        h.sid = Some(sid);
        h
    }

    pub fn fragmentation(direction: Direction, payload_len: u16) -> Self {
        Self::base(direction, FrameControlType::MacSpecific, Some(MacHeaderType::Fragmentation), payload_len)
    }

    /// Bandwidth request expressed in bytes
    pub fn queue_depth_request(sid: Sid, bytes: u16) -> Self {
        let mut h = Self::base(Direction::Upstream, FrameControlType::MacSpecific, Some(MacHeaderType::QueueDepthRequest), 0);
        h.requested_bytes = Some(bytes);
        h.sid = Some(sid);
        h
    }

    /// Concatenation header covering `frames`, each with its own payload
    pub fn concatenation(direction: Direction, frames: &[MacHeader]) -> Self {
        assert!(frames.len() <= u8::MAX as usize, "too many frames to concatenate");
        let total: usize = frames.iter().map(|f| f.serialized_size()).sum();
        assert!(total <= u16::MAX as usize, "concatenation too large");
        let mut h = Self::base(direction, FrameControlType::MacSpecific, Some(MacHeaderType::Concatenation), total as u16);
        h.frame_count = Some(frames.len() as u8);
        h
    }

    /// Append an extended header element, keeping EHDR_ON and the EHDR length in sync
    pub fn add_ext_header(&mut self, eh: ExtHeaderElement) {
        if let Some(t) = self.mac_type {
            assert!(!t.uses_mac_parm(), "{} header cannot carry an extended header", t);
        }
        let new_len = self.ehdr_len as usize + eh.encoded_len();
        assert!(new_len <= u8::MAX as usize, "extended header exceeds 255 bytes");
        assert!(new_len + self.payload_len as usize <= u16::MAX as usize, "LEN overflow");
        self.ehdr_on = true;
        self.ehdr_len = new_len as u8;
        self.ext_headers.push(eh);
    }

    pub fn is_request(&self) -> bool {
        matches!(self.mac_type, Some(MacHeaderType::Request) | Some(MacHeaderType::QueueDepthRequest))
    }

    /// Bytes of header on the wire, payload excluded
    pub fn header_len(&self) -> usize {
        match self.mac_type {
            Some(MacHeaderType::Request) => MAC_HEADER_FIXED_LEN,
            Some(MacHeaderType::QueueDepthRequest) => QDB_REQUEST_LEN,
            _ => MAC_HEADER_FIXED_LEN + self.ehdr_len as usize,
        }
    }

    /// Bytes of the whole frame: header plus payload
    pub fn serialized_size(&self) -> usize {
        self.header_len() + self.payload_len as usize
    }

    pub fn from_bitbuf(buf: &mut BitBuffer, direction: Direction) -> Result<Self, PduParseErr> {
        let fc_type_raw = buf.read_field(2, "fc_type")?;
        let fc_type = FrameControlType::try_from(fc_type_raw)
            .map_err(|_| PduParseErr::InvalidValue { field: "fc_type", value: fc_type_raw })?;
        let fc_parm = buf.read_field(5, "fc_parm")?;
        let ehdr_on = buf.read_field(1, "ehdr_on")? != 0;

        let mac_type = if fc_type == FrameControlType::MacSpecific {
            let t = MacHeaderType::try_from(fc_parm)
                .map_err(|_| PduParseErr::InvalidValue { field: "fc_parm", value: fc_parm })?;
            Some(t)
        } else {
            expect_value!(fc_parm, 0u64)?;
            None
        };

        let mut h = Self::base(direction, fc_type, mac_type, 0);
        h.ehdr_on = ehdr_on;

        match mac_type {
            Some(MacHeaderType::Request) => {
                expect_value!(ehdr_on, false)?;
                h.requested_minislots = Some(buf.read_field(8, "req_minislots")? as u8);
                h.sid = Some(buf.read_field(16, "sid")? as Sid);
            }
            Some(MacHeaderType::QueueDepthRequest) => {
                expect_value!(ehdr_on, false)?;
                h.requested_bytes = Some(buf.read_field(16, "req_bytes")? as u16);
                h.sid = Some(buf.read_field(16, "sid")? as Sid);
            }
            Some(MacHeaderType::Concatenation) => {
                expect_value!(ehdr_on, false)?;
                h.frame_count = Some(buf.read_field(8, "frame_count")? as u8);
                h.payload_len = buf.read_field(16, "len")? as u16;
            }
            _ => {
                let mac_parm = buf.read_field(8, "mac_parm")? as u8;
                let len = buf.read_field(16, "len")? as usize;
                if ehdr_on {
                    h.ehdr_len = mac_parm;
                    let consumed = buf.get_pos() / 8;
                    if mac_parm as usize * 8 > buf.get_len_remaining() {
                        tracing::debug!("ehdr_len {} exceeds remaining {} bytes", mac_parm, buf.get_len_remaining() / 8);
                        return Err(PduParseErr::Truncated { consumed });
                    }
                    h.ext_headers = Self::read_ext_headers(buf, mac_parm as usize, consumed)?;
                }
                if len < h.ehdr_len as usize {
                    return Err(PduParseErr::Inconsistency { field: "len", reason: "shorter than extended header" });
                }
                h.payload_len = (len - h.ehdr_len as usize) as u16;
            }
        }

        // HCS, not validated
        buf.read_field(16, "hcs")?;
        Ok(h)
    }

    fn read_ext_headers(buf: &mut BitBuffer, ehdr_len: usize, consumed: usize) -> Result<Vec<ExtHeaderElement>, PduParseErr> {
        let mut elems = vec![];
        let mut used = 0;
        while used < ehdr_len {
            let (elem, n) = ExtHeaderElement::from_bitbuf(buf, ehdr_len - used, consumed + used)?;
            used += n;
            if let Some(elem) = elem {
                elems.push(elem);
            }
        }
        Ok(elems)
    }

    /// Writes the header (without payload)
    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bits(self.fc_type.into_raw(), 2);
        match self.mac_type {
            Some(t) => {
                assert!(self.fc_type == FrameControlType::MacSpecific, "mac_type only valid on MAC-specific headers");
                buf.write_bits(t.into_raw(), 5);
            }
            None => {
                assert!(self.fc_type != FrameControlType::MacSpecific, "MAC-specific header needs mac_type");
                buf.write_bits(0, 5);
            }
        }
        buf.write_bits(self.ehdr_on as u64, 1);

        match self.mac_type {
            Some(MacHeaderType::Request) => {
                assert!(!self.ehdr_on);
                buf.write_bits(self.requested_minislots.unwrap_or(0) as u64, 8);
                buf.write_bits(self.sid.unwrap_or(0) as u64, 16);
            }
            Some(MacHeaderType::QueueDepthRequest) => {
                assert!(!self.ehdr_on);
                buf.write_bits(self.requested_bytes.unwrap_or(0) as u64, 16);
                buf.write_bits(self.sid.unwrap_or(0) as u64, 16);
            }
            Some(MacHeaderType::Concatenation) => {
                assert!(!self.ehdr_on);
                buf.write_bits(self.frame_count.unwrap_or(0) as u64, 8);
                buf.write_bits(self.payload_len as u64, 16);
            }
            _ => {
                let elems_len: usize = self.ext_headers.iter().map(|e| e.encoded_len()).sum();
                assert!(elems_len <= self.ehdr_len as usize, "ehdr_len smaller than its elements");
                buf.write_bits(if self.ehdr_on { self.ehdr_len as u64 } else { 0 }, 8);
                buf.write_bits(self.ehdr_len as u64 + self.payload_len as u64, 16);
                if self.ehdr_on {
                    for e in self.ext_headers.iter() {
                        e.to_bitbuf(buf);
                    }
                    // Null padding up to the declared length
                    buf.write_zeroes((self.ehdr_len as usize - elems_len) * 8);
                }
            }
        }

        // HCS placeholder
        buf.write_bits(0, 16);
    }

    /// Header followed by `payload`
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        assert_eq!(payload.len(), self.payload_len as usize, "payload does not match LEN");
        let mut buf = BitBuffer::new_autoexpand(self.serialized_size() * 8);
        self.to_bitbuf(&mut buf);
        buf.write_bytes(payload);
        buf.into_bytes()
    }

    /// Decodes the header at the start of `data`.
    /// Returns the header, the bytes following it and the number of header bytes consumed.
    /// A frame whose extended header runs past the end of `data` yields `PduParseErr::Truncated`.
    pub fn decode(data: &[u8], direction: Direction) -> Result<(MacHeader, &[u8], usize), PduParseErr> {
        let mut buf = BitBuffer::from_bytes(data);
        let h = Self::from_bitbuf(&mut buf, direction)?;
        let consumed = buf.get_pos() / 8;
        Ok((h, &data[consumed..], consumed))
    }
}

impl fmt::Display for MacHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacHeader {{ {} {}", self.direction, self.fc_type)?;
        if let Some(t) = self.mac_type {
            write!(f, "/{}", t)?;
        }
        if let Some(sid) = self.sid {
            write!(f, " sid: {}", sid)?;
        }
        if let Some(m) = self.requested_minislots {
            write!(f, " minislots: {}", m)?;
        }
        if let Some(b) = self.requested_bytes {
            write!(f, " bytes: {}", b)?;
        }
        if let Some(c) = self.frame_count {
            write!(f, " frames: {}", c)?;
        }
        write!(f, " len: {}", self.payload_len)?;
        if self.ehdr_on {
            write!(f, " ehdr({}):", self.ehdr_len)?;
            for e in self.ext_headers.iter() {
                write!(f, " {}", e)?;
            }
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use docsis_core::debug;

    use super::*;
    use crate::mac::fields::ext_header::DsServiceExt;

    fn roundtrip(h: &MacHeader) {
        let payload = vec![0x5A; h.payload_len as usize];
        let bytes = h.encode(&payload);
        assert_eq!(bytes.len(), h.serialized_size(), "size mismatch for {}", h);
        let (decoded, rest, consumed) = MacHeader::decode(&bytes, h.direction).unwrap();
        tracing::info!("{}", decoded);
        assert_eq!(&decoded, h);
        assert_eq!(consumed, h.header_len());
        assert_eq!(rest, &payload[..]);
    }

    #[test]
    fn test_all_subtypes_roundtrip() {
        debug::setup_logging_verbose();
        let dir = Direction::Upstream;
        let frames = vec![
            MacHeader::data_pdu(dir, 64),
            MacHeader::isolation_pdu(Direction::Downstream, 10),
            MacHeader::timing(Direction::Downstream, 34),
            MacHeader::management(Direction::Downstream, 0),
            MacHeader::request(17, 200),
            MacHeader::fragmentation(dir, 100),
            MacHeader::queue_depth_request(1999, 40000),
        ];
        for h in frames.iter() {
            roundtrip(h);
        }
        let concat = MacHeader::concatenation(dir, &frames[..2]);
        assert_eq!(concat.payload_len as usize, 6 + 64 + 6 + 10);
        roundtrip(&concat);
    }

    #[test]
    fn test_multi_element_ext_header_roundtrip() {
        debug::setup_logging_verbose();
        let mut h = MacHeader::data_pdu(Direction::Upstream, 20);
        h.add_ext_header(ExtHeaderElement::Request { minislots: 12, sid: 0x155 });
        h.add_ext_header(ExtHeaderElement::AckRequest { sid: 7 });
        h.add_ext_header(ExtHeaderElement::UpstreamServiceFlow { queue_indicator: false, active_grants: 127 });
        h.add_ext_header(ExtHeaderElement::UpstreamPrivacy { data: vec![1, 2, 3, 4] });
        assert_eq!(h.ehdr_len, 4 + 3 + 3 + 5);
        roundtrip(&h);

        let mut h = MacHeader::management(Direction::Downstream, 30);
        h.add_ext_header(ExtHeaderElement::DownstreamService(DsServiceExt::Sequenced {
            traffic_priority: 3,
            seq_change_count: true,
            dsid: 0xFFFFF,
            packet_seq: 9,
        }));
        h.add_ext_header(ExtHeaderElement::DownstreamPrivacy { data: vec![] });
        roundtrip(&h);
    }

    #[test]
    fn test_request_wire_format() {
        let bytes = MacHeader::request(0x0102, 9).encode(&[]);
        // FC: 11 00010 0
        assert_eq!(bytes, vec![0xC4, 0x09, 0x01, 0x02, 0x00, 0x00]);
        let bytes = MacHeader::queue_depth_request(5, 0x1234).encode(&[]);
        assert_eq!(bytes, vec![0xC8, 0x12, 0x34, 0x00, 0x05, 0x00, 0x00]);
    }

    #[test]
    fn test_ehdr_len_field_covers_ext_and_payload() {
        let mut h = MacHeader::data_pdu(Direction::Upstream, 3);
        h.add_ext_header(ExtHeaderElement::AckRequest { sid: 1 });
        let bytes = h.encode(&[9, 9, 9]);
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 3);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 6);
    }

    #[test]
    fn test_truncated_ext_header_reports_consumed() {
        // Packet PDU with EHDR_ON, EHDR length 10, only 2 EHDR bytes present
        let bytes = [0x01, 0x0A, 0x00, 0x0A, 0x22, 0x00];
        let err = MacHeader::decode(&bytes, Direction::Upstream).unwrap_err();
        assert_eq!(err, PduParseErr::Truncated { consumed: 4 });
    }

    #[test]
    fn test_padding_preserved_on_reencode() {
        // EHDR of 5 bytes: ack request (3) + two null padding bytes
        let bytes = [0x01, 0x05, 0x00, 0x05, 0x22, 0x00, 0x07, 0x00, 0x00, 0x00, 0x00];
        let (h, rest, consumed) = MacHeader::decode(&bytes, Direction::Upstream).unwrap();
        assert_eq!(consumed, 11);
        assert!(rest.is_empty());
        assert_eq!(h.ext_headers, vec![ExtHeaderElement::AckRequest { sid: 7 }]);
        assert_eq!(h.encode(&[]), bytes.to_vec());
    }

    #[test]
    fn test_invalid_fc_type() {
        let bytes = [0x40, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            MacHeader::decode(&bytes, Direction::Downstream),
            Err(PduParseErr::InvalidValue { field: "fc_type", .. })
        ));
    }
}
