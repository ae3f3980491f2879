/// MAC management message type carried in the management header
/// Bits: 8
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmmType {
    /// Upstream channel descriptor, DOCSIS 1.x
    GenericUcd,
    /// Upstream bandwidth allocation
    Map,
    UccRequest,
    UccResponse,
    /// Upstream channel descriptor, DOCSIS 2.0
    Ucd23,
    /// Downstream channel descriptor
    Dcd,
    /// MAC domain descriptor
    Mdd,
    /// Upstream channel descriptor, DOCSIS 3.0
    Ucd3,
    /// Anything else; passed through untouched
    Unknown(u8),
}

impl From<u8> for MmmType {
    fn from(x: u8) -> Self {
        match x {
            2 => MmmType::GenericUcd,
            3 => MmmType::Map,
            8 => MmmType::UccRequest,
            9 => MmmType::UccResponse,
            29 => MmmType::Ucd23,
            32 => MmmType::Dcd,
            33 => MmmType::Mdd,
            35 => MmmType::Ucd3,
            other => MmmType::Unknown(other),
        }
    }
}

impl MmmType {
    /// Convert this enum back into the raw integer value
    pub fn into_raw(self) -> u64 {
        let v: u8 = match self {
            MmmType::GenericUcd => 2,
            MmmType::Map => 3,
            MmmType::UccRequest => 8,
            MmmType::UccResponse => 9,
            MmmType::Ucd23 => 29,
            MmmType::Dcd => 32,
            MmmType::Mdd => 33,
            MmmType::Ucd3 => 35,
            MmmType::Unknown(v) => v,
        };
        v as u64
    }
}

impl From<MmmType> for u64 {
    fn from(e: MmmType) -> Self { e.into_raw() }
}

impl core::fmt::Display for MmmType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MmmType::GenericUcd => write!(f, "GenericUcd"),
            MmmType::Map => write!(f, "Map"),
            MmmType::UccRequest => write!(f, "UccRequest"),
            MmmType::UccResponse => write!(f, "UccResponse"),
            MmmType::Ucd23 => write!(f, "Ucd23"),
            MmmType::Dcd => write!(f, "Dcd"),
            MmmType::Mdd => write!(f, "Mdd"),
            MmmType::Ucd3 => write!(f, "Ucd3"),
            MmmType::Unknown(v) => write!(f, "Unknown({})", v),
        }
    }
}
