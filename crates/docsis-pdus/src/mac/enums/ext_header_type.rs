/// EH_TYPE field of an extended header element
/// Bits: 4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtHeaderType {
    /// Padding, no content
    Null = 0,
    /// Piggybacked bandwidth request
    Request = 1,
    AckRequest = 2,
    UpstreamPrivacy = 3,
    DownstreamPrivacy = 4,
    DownstreamService = 5,
    UpstreamServiceFlow = 6,
}

impl std::convert::TryFrom<u64> for ExtHeaderType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(ExtHeaderType::Null),
            1 => Ok(ExtHeaderType::Request),
            2 => Ok(ExtHeaderType::AckRequest),
            3 => Ok(ExtHeaderType::UpstreamPrivacy),
            4 => Ok(ExtHeaderType::DownstreamPrivacy),
            5 => Ok(ExtHeaderType::DownstreamService),
            6 => Ok(ExtHeaderType::UpstreamServiceFlow),
            _ => Err(()),
        }
    }
}

impl ExtHeaderType {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        self as u64
    }
}

impl From<ExtHeaderType> for u64 {
    fn from(e: ExtHeaderType) -> Self { e.into_raw() }
}

impl core::fmt::Display for ExtHeaderType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExtHeaderType::Null => write!(f, "Null"),
            ExtHeaderType::Request => write!(f, "Request"),
            ExtHeaderType::AckRequest => write!(f, "AckRequest"),
            ExtHeaderType::UpstreamPrivacy => write!(f, "UpstreamPrivacy"),
            ExtHeaderType::DownstreamPrivacy => write!(f, "DownstreamPrivacy"),
            ExtHeaderType::DownstreamService => write!(f, "DownstreamService"),
            ExtHeaderType::UpstreamServiceFlow => write!(f, "UpstreamServiceFlow"),
        }
    }
}
