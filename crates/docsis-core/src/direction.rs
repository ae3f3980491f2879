/// Direction of a transmission on the cable plant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// CM towards CMTS
    Upstream,
    /// CMTS towards CM
    Downstream,
}

impl Direction {
    #[inline]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Direction::Upstream)
    }

    #[inline]
    pub fn is_downstream(&self) -> bool {
        matches!(self, Direction::Downstream)
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Direction::Upstream => write!(f, "US"),
            Direction::Downstream => write!(f, "DS"),
        }
    }
}
