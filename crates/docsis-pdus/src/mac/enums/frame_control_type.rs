/// FC_TYPE field of the frame control byte
/// Bits: 2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameControlType {
    /// Variable length packet PDU
    PacketPdu = 0,
    /// Isolation packet PDU, used for traffic that legacy modems must not see
    IsolationPdu = 2,
    /// MAC-specific header, sub-type in FC_PARM
    MacSpecific = 3,
}

impl std::convert::TryFrom<u64> for FrameControlType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(FrameControlType::PacketPdu),
            2 => Ok(FrameControlType::IsolationPdu),
            3 => Ok(FrameControlType::MacSpecific),
            // 1 is the retired ATM cell format
            _ => Err(()),
        }
    }
}

impl FrameControlType {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    pub fn is_data(self) -> bool {
        matches!(self, FrameControlType::PacketPdu | FrameControlType::IsolationPdu)
    }
}

impl From<FrameControlType> for u64 {
    fn from(e: FrameControlType) -> Self { e.into_raw() }
}

impl core::fmt::Display for FrameControlType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameControlType::PacketPdu => write!(f, "PacketPdu"),
            FrameControlType::IsolationPdu => write!(f, "IsolationPdu"),
            FrameControlType::MacSpecific => write!(f, "MacSpecific"),
        }
    }
}
