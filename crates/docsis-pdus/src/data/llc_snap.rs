use docsis_core::{BitBuffer, PduParseErr, expect_value};

pub const LLC_SNAP_LEN: usize = 8;
const LLC_SNAP_PREFIX: [u8; 6] = [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00];

/// 802.2 LLC with SNAP, zero OUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlcSnap {
    pub ethertype: u16,
}

impl LlcSnap {
    pub fn is_present(data: &[u8]) -> bool {
        data.len() >= LLC_SNAP_LEN && data[..6] == LLC_SNAP_PREFIX
    }

    pub fn from_bitbuf(buf: &mut BitBuffer) -> Result<Self, PduParseErr> {
        let dsap = buf.read_field(8, "dsap")?;
        expect_value!(dsap, 0xAAu64)?;
        let ssap = buf.read_field(8, "ssap")?;
        expect_value!(ssap, 0xAAu64)?;
        let control = buf.read_field(8, "control")?;
        expect_value!(control, 0x03u64)?;
        let oui = buf.read_field(24, "oui")?;
        expect_value!(oui, 0u64)?;
        let ethertype = buf.read_field(16, "ethertype")? as u16;
        Ok(LlcSnap { ethertype })
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        buf.write_bytes(&LLC_SNAP_PREFIX);
        buf.write_bits(self.ethertype as u64, 16);
    }
}
