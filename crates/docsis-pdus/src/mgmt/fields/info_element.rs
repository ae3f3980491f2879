use core::fmt;

use docsis_core::{BitBuffer, PduParseErr, Sid};

use crate::mgmt::enums::ie_type::IeType;

pub const IE_SID_MAX: Sid = (1 << 11) - 1;
pub const IE_OFFSET_MAX: u16 = (1 << 14) - 1;
/// Bytes per information element on the wire
pub const IE_LEN: usize = 4;

/// One MAP information element
///
/// ```text
///  word 1: reserved (3) | SID (11) | IUC high bits (2)
///  word 2: IUC low bits (2) | offset (14)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoElement {
    pub sid: Sid,
    pub ie_type: IeType,
    /// Minislots from the MAP allocation start
    pub offset: u16,
}

impl InfoElement {
    pub fn new(sid: Sid, ie_type: IeType, offset: u16) -> Self {
        assert!(sid <= IE_SID_MAX, "sid {} does not fit in 11 bits", sid);
        assert!(offset <= IE_OFFSET_MAX, "offset {} does not fit in 14 bits", offset);
        InfoElement { sid, ie_type, offset }
    }

    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        buf.read_field(3, "reserved")?;
        let sid = buf.read_field(11, "sid")? as Sid;
        let type_hi = buf.read_field(2, "iuc_hi")?;
        let type_lo = buf.read_field(2, "iuc_lo")?;
        let offset = buf.read_field(14, "offset")? as u16;
        let raw = (type_hi << 2) | type_lo;
        let ie_type = IeType::try_from(raw).map_err(|_| PduParseErr::InvalidValue { field: "iuc", value: raw })?;
        Ok(InfoElement { sid, ie_type, offset })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        let raw = self.ie_type.into_raw();
        buf.write_bits(0, 3);
        buf.write_bits(self.sid as u64, 11);
        buf.write_bits(raw >> 2, 2);
        buf.write_bits(raw & 0x3, 2);
        buf.write_bits(self.offset as u64, 14);
    }
}

impl fmt::Display for InfoElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IE {{ sid: {} type: {} offset: {} }}", self.sid, self.ie_type, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ie_pack_roundtrip() {
        let sids = [0, 1, 5, 0x2AA, IE_SID_MAX];
        let offsets = [0, 1, 10, 0x1555, IE_OFFSET_MAX];
        for raw in 0..16u64 {
            let ie_type = IeType::try_from(raw).unwrap();
            for &sid in sids.iter() {
                for &offset in offsets.iter() {
                    let ie = InfoElement::new(sid, ie_type, offset);
                    let mut buf = BitBuffer::new(32);
                    ie.to_bitbuf(&mut buf);
                    buf.seek(0);
                    assert_eq!(InfoElement::from_bitbuf(&mut buf).unwrap(), ie);
                }
            }
        }
    }

    #[test]
    fn test_ie_layout() {
        // sid 5, LargeDataGrant (0101), offset 10
        let mut buf = BitBuffer::new(32);
        InfoElement::new(5, IeType::LargeDataGrant, 10).to_bitbuf(&mut buf);
        assert_eq!(buf.dump_hex(), "0015400A");
    }
}
