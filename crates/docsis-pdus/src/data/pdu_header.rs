use core::fmt;

use docsis_core::{BitBuffer, MacAddress, PduParseErr};

use crate::data::llc_snap::{LLC_SNAP_LEN, LlcSnap};

pub const PDU_HEADER_LEN: usize = 14;
/// CRC trailing every packet PDU. Written as zeroes, never checked.
pub const CRC_LEN: usize = 4;

/// Ethernet-style header at the start of a packet PDU payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub dst: MacAddress,
    pub src: MacAddress,
    /// Ethertype, or the length of what follows when LLC/SNAP is used
    pub type_len: u16,
}

impl PduHeader {
    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let dst = MacAddress::from_u64(buf.read_field(48, "dst")?);
        let src = MacAddress::from_u64(buf.read_field(48, "src")?);
        let type_len = buf.read_field(16, "type_len")? as u16;
        Ok(PduHeader { dst, src, type_len })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bits(self.dst.to_u64(), 48);
        buf.write_bits(self.src.to_u64(), 48);
        buf.write_bits(self.type_len as u64, 16);
    }
}

impl fmt::Display for PduHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PduHeader {{ dst: {} src: {} type_len: 0x{:04x} }}", self.dst, self.src, self.type_len)
    }
}

/// Unpacked contents of a packet PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPdu {
    pub dst: MacAddress,
    pub src: MacAddress,
    pub protocol: u16,
    pub packet: Vec<u8>,
}

impl DataPdu {
    /// Bytes this PDU occupies behind the MAC header
    pub fn encoded_len(packet_len: usize, use_llc: bool) -> usize {
        PDU_HEADER_LEN + if use_llc { LLC_SNAP_LEN } else { 0 } + packet_len + CRC_LEN
    }

    /// Header, optional LLC/SNAP, packet and CRC placeholder
    pub fn encode(&self, use_llc: bool) -> Vec<u8> {
        let len = Self::encoded_len(self.packet.len(), use_llc);
        let mut buf = BitBuffer::new_autoexpand(len * 8);
        let type_len = if use_llc { (LLC_SNAP_LEN + self.packet.len()) as u16 } else { self.protocol };
        PduHeader { dst: self.dst, src: self.src, type_len }.to_bitbuf(&mut buf);
        if use_llc {
            LlcSnap { ethertype: self.protocol }.to_bitbuf(&mut buf);
        }
        buf.write_bytes(&self.packet);
        buf.write_zeroes(CRC_LEN * 8);
        buf.into_bytes()
    }

    /// Parses a packet PDU payload. An LLC/SNAP header is recognized by its fixed prefix
    /// when the type/length field holds a length.
    pub fn decode(data: &[u8]) -> Result<Self, PduParseErr> {
        if data.len() < PDU_HEADER_LEN + CRC_LEN {
            return Err(PduParseErr::BufferEnded { field: Some("data pdu") });
        }
        let body = &data[..data.len() - CRC_LEN];
        let mut buf = BitBuffer::from_bytes(body);
        let hdr = PduHeader::from_bitbuf(&mut buf)?;
        let mut protocol = hdr.type_len;
        // Values below 0x0600 are lengths, not ethertypes
        if hdr.type_len < 0x0600 && LlcSnap::is_present(&body[PDU_HEADER_LEN..]) {
            protocol = LlcSnap::from_bitbuf(&mut buf)?.ethertype;
        }
        let packet = buf.remaining_bytes();
        Ok(DataPdu { dst: hdr.dst, src: hdr.src, protocol, packet })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdu() -> DataPdu {
        DataPdu {
            dst: MacAddress::from_u64(0x0200_0000_0002),
            src: MacAddress::from_u64(0x0200_0000_0001),
            protocol: 0x0800,
            packet: vec![0xde, 0xad, 0xbe, 0xef, 0x01],
        }
    }

    #[test]
    fn test_plain_data_pdu() {
        let bytes = pdu().encode(false);
        assert_eq!(bytes.len(), DataPdu::encoded_len(5, false));
        assert_eq!(&bytes[12..14], &[0x08, 0x00]);
        assert_eq!(&bytes[bytes.len() - 4..], &[0, 0, 0, 0]);
        assert_eq!(DataPdu::decode(&bytes).unwrap(), pdu());
    }

    #[test]
    fn test_llc_data_pdu() {
        let bytes = pdu().encode(true);
        assert_eq!(bytes.len(), 14 + 8 + 5 + 4);
        assert_eq!(u16::from_be_bytes([bytes[12], bytes[13]]), 8 + 5);
        assert_eq!(&bytes[14..20], &[0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00]);
        assert_eq!(DataPdu::decode(&bytes).unwrap(), pdu());
    }

    #[test]
    fn test_too_short() {
        assert!(DataPdu::decode(&[0u8; 10]).is_err());
    }
}
