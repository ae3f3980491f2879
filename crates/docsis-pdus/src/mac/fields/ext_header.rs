use core::fmt;

use docsis_core::{BitBuffer, PduParseErr, Sid};

use crate::mac::enums::ext_header_type::ExtHeaderType;

/// Downstream service extended header. The element length (1, 3 or 5 bytes)
/// follows from the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsServiceExt {
    /// 3 bit traffic priority, 5 reserved bits
    Priority { traffic_priority: u8 },
    /// Priority, sequence change count bit and a 20 bit downstream service id
    Dsid { traffic_priority: u8, seq_change_count: bool, dsid: u32 },
    /// As above, followed by a 16 bit packet sequence number
    Sequenced { traffic_priority: u8, seq_change_count: bool, dsid: u32, packet_seq: u16 },
}

impl DsServiceExt {
    fn byte_len(&self) -> usize {
        match self {
            DsServiceExt::Priority { .. } => 1,
            DsServiceExt::Dsid { .. } => 3,
            DsServiceExt::Sequenced { .. } => 5,
        }
    }
}

/// One element of the extended header (EHDR) of a MAC frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtHeaderElement {
    /// Piggybacked request for more upstream minislots
    Request { minislots: u8, sid: Sid },
    AckRequest { sid: Sid },
    /// Baseline privacy content is carried opaquely
    UpstreamPrivacy { data: Vec<u8> },
    DownstreamPrivacy { data: Vec<u8> },
    DownstreamService(DsServiceExt),
    UpstreamServiceFlow { queue_indicator: bool, active_grants: u8 },
}

impl ExtHeaderElement {
    pub fn eh_type(&self) -> ExtHeaderType {
        match self {
            ExtHeaderElement::Request { .. } => ExtHeaderType::Request,
            ExtHeaderElement::AckRequest { .. } => ExtHeaderType::AckRequest,
            ExtHeaderElement::UpstreamPrivacy { .. } => ExtHeaderType::UpstreamPrivacy,
            ExtHeaderElement::DownstreamPrivacy { .. } => ExtHeaderType::DownstreamPrivacy,
            ExtHeaderElement::DownstreamService(_) => ExtHeaderType::DownstreamService,
            ExtHeaderElement::UpstreamServiceFlow { .. } => ExtHeaderType::UpstreamServiceFlow,
        }
    }

    /// EH_LEN: number of value bytes following the type/length byte
    pub fn byte_len(&self) -> usize {
        match self {
            ExtHeaderElement::Request { .. } => 3,
            ExtHeaderElement::AckRequest { .. } => 2,
            ExtHeaderElement::UpstreamPrivacy { data } | ExtHeaderElement::DownstreamPrivacy { data } => data.len(),
            ExtHeaderElement::DownstreamService(ds) => ds.byte_len(),
            ExtHeaderElement::UpstreamServiceFlow { .. } => 2,
        }
    }

    /// Bytes this element occupies in the EHDR, including the type/length byte
    pub fn encoded_len(&self) -> usize {
        1 + self.byte_len()
    }

    /// Parses one element from `buf`, which must be byte aligned.
    /// `budget` is the number of EHDR bytes left; an element whose EH_LEN exceeds it
    /// yields `Truncated` with `consumed_before` plus the bytes read here.
    /// Returns the element (None for padding and unknown types) and the bytes consumed.
    pub fn from_bitbuf(buf: &mut BitBuffer, budget: usize, consumed_before: usize) -> Result<(Option<Self>, usize), PduParseErr> {
        let eh_type = buf.read_field(4, "eh_type")?;
        let eh_len = buf.read_field(4, "eh_len")? as usize;
        if eh_len + 1 > budget || eh_len * 8 > buf.get_len_remaining() {
            return Err(PduParseErr::Truncated { consumed: consumed_before + 1 });
        }

        let elem = match ExtHeaderType::try_from(eh_type) {
            Ok(ExtHeaderType::Request) if eh_len == 3 => {
                let minislots = buf.read_field(8, "minislots")? as u8;
                let sid = buf.read_field(16, "sid")? as Sid;
                Some(ExtHeaderElement::Request { minislots, sid })
            }
            Ok(ExtHeaderType::AckRequest) if eh_len == 2 => {
                let sid = buf.read_field(16, "sid")? as Sid;
                Some(ExtHeaderElement::AckRequest { sid })
            }
            Ok(ExtHeaderType::UpstreamPrivacy) => {
                let data = buf.read_bytes(eh_len, "us_privacy")?;
                Some(ExtHeaderElement::UpstreamPrivacy { data })
            }
            Ok(ExtHeaderType::DownstreamPrivacy) => {
                let data = buf.read_bytes(eh_len, "ds_privacy")?;
                Some(ExtHeaderElement::DownstreamPrivacy { data })
            }
            Ok(ExtHeaderType::DownstreamService) if matches!(eh_len, 1 | 3 | 5) => {
                let traffic_priority = buf.read_field(3, "traffic_priority")? as u8;
                let ds = if eh_len == 1 {
                    buf.read_field(5, "reserved")?;
                    DsServiceExt::Priority { traffic_priority }
                } else {
                    let seq_change_count = buf.read_field(1, "seq_change_count")? != 0;
                    let dsid = buf.read_field(20, "dsid")? as u32;
                    if eh_len == 3 {
                        DsServiceExt::Dsid { traffic_priority, seq_change_count, dsid }
                    } else {
                        let packet_seq = buf.read_field(16, "packet_seq")? as u16;
                        DsServiceExt::Sequenced { traffic_priority, seq_change_count, dsid, packet_seq }
                    }
                };
                Some(ExtHeaderElement::DownstreamService(ds))
            }
            Ok(ExtHeaderType::UpstreamServiceFlow) if eh_len == 2 => {
                buf.read_field(8, "reserved")?;
                let queue_indicator = buf.read_field(1, "queue_indicator")? != 0;
                let active_grants = buf.read_field(7, "active_grants")? as u8;
                Some(ExtHeaderElement::UpstreamServiceFlow { queue_indicator, active_grants })
            }
            Ok(ExtHeaderType::Null) => {
                buf.seek_rel((eh_len * 8) as isize);
                None
            }
            other => {
                // Unknown type, or a known type with a length we can't interpret
                tracing::debug!("skipping extended header type {} ({:?}) len {}", eh_type, other, eh_len);
                buf.seek_rel((eh_len * 8) as isize);
                None
            }
        };
        Ok((elem, 1 + eh_len))
    }

    pub fn to_bitbuf(&self, buf: &mut BitBuffer) {
        let len = self.byte_len();
        assert!(len <= 15, "extended header element too long: {} bytes", len);
        buf.write_bits(self.eh_type().into_raw(), 4);
        buf.write_bits(len as u64, 4);

        match self {
            ExtHeaderElement::Request { minislots, sid } => {
                buf.write_bits(*minislots as u64, 8);
                buf.write_bits(*sid as u64, 16);
            }
            ExtHeaderElement::AckRequest { sid } => {
                buf.write_bits(*sid as u64, 16);
            }
            ExtHeaderElement::UpstreamPrivacy { data } | ExtHeaderElement::DownstreamPrivacy { data } => {
                buf.write_bytes(data);
            }
            ExtHeaderElement::DownstreamService(ds) => match *ds {
                DsServiceExt::Priority { traffic_priority } => {
                    buf.write_bits(traffic_priority as u64, 3);
                    buf.write_bits(0, 5);
                }
                DsServiceExt::Dsid { traffic_priority, seq_change_count, dsid } => {
                    buf.write_bits(traffic_priority as u64, 3);
                    buf.write_bits(seq_change_count as u64, 1);
                    buf.write_bits(dsid as u64, 20);
                }
                DsServiceExt::Sequenced { traffic_priority, seq_change_count, dsid, packet_seq } => {
                    buf.write_bits(traffic_priority as u64, 3);
                    buf.write_bits(seq_change_count as u64, 1);
                    buf.write_bits(dsid as u64, 20);
                    buf.write_bits(packet_seq as u64, 16);
                }
            },
            ExtHeaderElement::UpstreamServiceFlow { queue_indicator, active_grants } => {
                buf.write_bits(0, 8);
                buf.write_bits(*queue_indicator as u64, 1);
                buf.write_bits(*active_grants as u64, 7);
            }
        }
    }
}

impl fmt::Display for ExtHeaderElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtHeaderElement::Request { minislots, sid } => write!(f, "EH-Request {{ minislots: {} sid: {} }}", minislots, sid),
            ExtHeaderElement::AckRequest { sid } => write!(f, "EH-AckRequest {{ sid: {} }}", sid),
            ExtHeaderElement::UpstreamPrivacy { data } => write!(f, "EH-UsPrivacy {{ {} bytes }}", data.len()),
            ExtHeaderElement::DownstreamPrivacy { data } => write!(f, "EH-DsPrivacy {{ {} bytes }}", data.len()),
            ExtHeaderElement::DownstreamService(ds) => write!(f, "EH-DsService {{ {:?} }}", ds),
            ExtHeaderElement::UpstreamServiceFlow { queue_indicator, active_grants } => {
                write!(f, "EH-UsServiceFlow {{ qi: {} active_grants: {} }}", queue_indicator, active_grants)
            }
        }
    }
}
