/// FC_PARM field of a MAC-specific header
/// Bits: 5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MacHeaderType {
    Timing = 0,
    Management = 1,
    /// Bandwidth request in minislots, no payload
    Request = 2,
    Fragmentation = 3,
    /// Bandwidth request in bytes, no payload
    QueueDepthRequest = 4,
    Concatenation = 28,
}

impl std::convert::TryFrom<u64> for MacHeaderType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(MacHeaderType::Timing),
            1 => Ok(MacHeaderType::Management),
            2 => Ok(MacHeaderType::Request),
            3 => Ok(MacHeaderType::Fragmentation),
            4 => Ok(MacHeaderType::QueueDepthRequest),
            28 => Ok(MacHeaderType::Concatenation),
            _ => Err(()),
        }
    }
}

impl MacHeaderType {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        self as u64
    }

    /// Sub-types whose MAC_PARM byte is not the extended header length
    pub fn uses_mac_parm(self) -> bool {
        matches!(self, MacHeaderType::Request | MacHeaderType::QueueDepthRequest | MacHeaderType::Concatenation)
    }
}

impl From<MacHeaderType> for u64 {
    fn from(e: MacHeaderType) -> Self { e.into_raw() }
}

impl core::fmt::Display for MacHeaderType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MacHeaderType::Timing => write!(f, "Timing"),
            MacHeaderType::Management => write!(f, "Management"),
            MacHeaderType::Request => write!(f, "Request"),
            MacHeaderType::Fragmentation => write!(f, "Fragmentation"),
            MacHeaderType::QueueDepthRequest => write!(f, "QueueDepthRequest"),
            MacHeaderType::Concatenation => write!(f, "Concatenation"),
        }
    }
}
