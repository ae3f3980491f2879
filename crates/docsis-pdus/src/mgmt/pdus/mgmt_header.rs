use core::fmt;

use docsis_core::{BitBuffer, MacAddress, PduParseErr, expect_value};

use crate::mgmt::enums::mmm_type::MmmType;

/// Wire size of the management header
pub const MGMT_HEADER_LEN: usize = 20;
/// Largest management message (header included) a device is expected to send
pub const MAX_MMM_PACKET_SIZE: usize = 1768;
/// Bytes counted by LEN that belong to the header (DSAP through reserved)
const LEN_HEADER_PART: u16 = 6;

/// MAC management message header
///
/// ```text
///  DA (48) | SA (48) | LEN (16) | DSAP (8) | SSAP (8) | control (8) | version (8) | type (8) | reserved (8)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MgmtHeader {
    pub dst: MacAddress,
    pub src: MacAddress,
    /// Bytes of message body following the header
    pub payload_len: u16,
    pub version: u8,
    pub msg_type: MmmType,
}

impl MgmtHeader {
    pub fn new(dst: MacAddress, src: MacAddress, msg_type: MmmType, version: u8, payload_len: u16) -> Self {
        MgmtHeader { dst, src, payload_len, version, msg_type }
    }

    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let dst = MacAddress::from_u64(buf.read_field(48, "dst")?);
        let src = MacAddress::from_u64(buf.read_field(48, "src")?);
        let len = buf.read_field(16, "len")? as u16;
        let dsap = buf.read_field(8, "dsap")?;
        expect_value!(dsap, 0u64)?;
        let ssap = buf.read_field(8, "ssap")?;
        expect_value!(ssap, 0u64)?;
        let control = buf.read_field(8, "control")?;
        expect_value!(control, 0x03u64)?;
        let version = buf.read_field(8, "version")? as u8;
        let msg_type = MmmType::from(buf.read_field(8, "type")? as u8);
        buf.read_field(8, "reserved")?;

        if len < LEN_HEADER_PART {
            return Err(PduParseErr::Inconsistency { field: "len", reason: "shorter than management header" });
        }
        Ok(MgmtHeader { dst, src, payload_len: len - LEN_HEADER_PART, version, msg_type })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bits(self.dst.to_u64(), 48);
        buf.write_bits(self.src.to_u64(), 48);
        buf.write_bits((self.payload_len + LEN_HEADER_PART) as u64, 16);
        buf.write_bits(0, 8);
        buf.write_bits(0, 8);
        buf.write_bits(0x03, 8);
        buf.write_bits(self.version as u64, 8);
        buf.write_bits(self.msg_type.into_raw(), 8);
        buf.write_bits(0, 8);
    }

    pub fn serialized_size(&self) -> usize {
        MGMT_HEADER_LEN
    }

    /// Management frames are never broadcast-addressed in this MAC; only an exact match is accepted
    pub fn is_valid_destination(&self, addr: MacAddress) -> bool {
        self.dst == addr
    }

    pub fn is_map_packet(&self) -> bool {
        self.msg_type == MmmType::Map
    }
}

impl fmt::Display for MgmtHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MgmtHeader {{ dst: {} src: {} type: {} version: {} len: {} }}",
            self.dst, self.src, self.msg_type, self.version, self.payload_len
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(v: u64) -> MacAddress {
        MacAddress::from_u64(v)
    }

    #[test]
    fn test_header_is_twenty_bytes() {
        let h = MgmtHeader::new(addr(0x0200_0000_0002), addr(0x0200_0000_0001), MmmType::Map, 1, 0);
        let mut buf = BitBuffer::new_autoexpand(160);
        h.to_bitbuf(&mut buf);
        let bytes = buf.into_bytes();
        assert_eq!(bytes.len(), MGMT_HEADER_LEN);
        assert_eq!(h.serialized_size(), MGMT_HEADER_LEN);
        assert_eq!(&bytes[12..], &[0x00, 0x06, 0x00, 0x00, 0x03, 0x01, 0x03, 0x00]);

        let mut buf = BitBuffer::from_vec(bytes);
        assert_eq!(MgmtHeader::from_bitbuf(&mut buf).unwrap(), h);
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let h = MgmtHeader::new(addr(1), addr(2), MmmType::Unknown(77), 4, 100);
        let mut buf = BitBuffer::new_autoexpand(160);
        h.to_bitbuf(&mut buf);
        buf.seek(0);
        let decoded = MgmtHeader::from_bitbuf(&mut buf).unwrap();
        assert_eq!(decoded.msg_type, MmmType::Unknown(77));
        assert_eq!(decoded.payload_len, 100);
        assert!(!decoded.is_map_packet());
    }

    #[test]
    fn test_destination_and_map_checks() {
        let me = addr(0x0200_0000_0005);
        let h = MgmtHeader::new(me, addr(1), MmmType::Map, 1, 0);
        assert!(h.is_valid_destination(me));
        assert!(!h.is_valid_destination(addr(0x0200_0000_0006)));
        assert!(h.is_map_packet());

        let bcast = MgmtHeader::new(MacAddress::BROADCAST, addr(1), MmmType::Dcd, 1, 0);
        assert!(!bcast.is_valid_destination(me));
        assert!(!bcast.is_map_packet());
    }
}
