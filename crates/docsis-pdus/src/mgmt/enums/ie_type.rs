/// Interval usage code of a MAP information element
/// Bits: 4 (split 2+2 over the two IE words)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IeType {
    /// Contention or polled request opportunity
    Request,
    RequestData,
    InitialMaintenance,
    StationMaintenance,
    ShortDataGrant,
    LargeDataGrant,
    /// End-of-map marker
    Null,
    DataAck,
    AdvancedShortDataGrant,
    AdvancedLargeDataGrant,
    UnsolicitedGrant,
    Expansion,
    /// 12..15
    Reserved(u8),
}

impl std::convert::TryFrom<u64> for IeType {
    type Error = ();
    fn try_from(x: u64) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(IeType::Request),
            1 => Ok(IeType::RequestData),
            2 => Ok(IeType::InitialMaintenance),
            3 => Ok(IeType::StationMaintenance),
            4 => Ok(IeType::ShortDataGrant),
            5 => Ok(IeType::LargeDataGrant),
            6 => Ok(IeType::Null),
            7 => Ok(IeType::DataAck),
            8 => Ok(IeType::AdvancedShortDataGrant),
            9 => Ok(IeType::AdvancedLargeDataGrant),
            10 => Ok(IeType::UnsolicitedGrant),
            11 => Ok(IeType::Expansion),
            12..=15 => Ok(IeType::Reserved(x as u8)),
            _ => Err(()),
        }
    }
}

impl IeType {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        match self {
            IeType::Request => 0,
            IeType::RequestData => 1,
            IeType::InitialMaintenance => 2,
            IeType::StationMaintenance => 3,
            IeType::ShortDataGrant => 4,
            IeType::LargeDataGrant => 5,
            IeType::Null => 6,
            IeType::DataAck => 7,
            IeType::AdvancedShortDataGrant => 8,
            IeType::AdvancedLargeDataGrant => 9,
            IeType::UnsolicitedGrant => 10,
            IeType::Expansion => 11,
            IeType::Reserved(v) => v as u64,
        }
    }

    /// IE types that hand the SID a slot to transmit data in
    pub fn is_data_grant(self) -> bool {
        matches!(
            self,
            IeType::ShortDataGrant
                | IeType::LargeDataGrant
                | IeType::AdvancedShortDataGrant
                | IeType::AdvancedLargeDataGrant
                | IeType::UnsolicitedGrant
        )
    }
}

impl From<IeType> for u64 {
    fn from(e: IeType) -> Self { e.into_raw() }
}

impl core::fmt::Display for IeType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IeType::Request => write!(f, "Request"),
            IeType::RequestData => write!(f, "RequestData"),
            IeType::InitialMaintenance => write!(f, "InitialMaintenance"),
            IeType::StationMaintenance => write!(f, "StationMaintenance"),
            IeType::ShortDataGrant => write!(f, "ShortDataGrant"),
            IeType::LargeDataGrant => write!(f, "LargeDataGrant"),
            IeType::Null => write!(f, "Null"),
            IeType::DataAck => write!(f, "DataAck"),
            IeType::AdvancedShortDataGrant => write!(f, "AdvancedShortDataGrant"),
            IeType::AdvancedLargeDataGrant => write!(f, "AdvancedLargeDataGrant"),
            IeType::UnsolicitedGrant => write!(f, "UnsolicitedGrant"),
            IeType::Expansion => write!(f, "Expansion"),
            IeType::Reserved(v) => write!(f, "Reserved({})", v),
        }
    }
}
