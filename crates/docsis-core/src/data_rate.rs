use core::fmt;
use std::time::Duration;

/// Raw bit rate of a channel
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataRate {
    bps: u64,
}

impl DataRate {
    pub const fn from_bps(bps: u64) -> Self {
        DataRate { bps }
    }

    pub const fn bps(&self) -> u64 {
        self.bps
    }

    /// Time it takes to put `num_bytes` on the wire, rounded up to the next nanosecond
    pub fn tx_time(&self, num_bytes: usize) -> Duration {
        assert!(self.bps > 0, "tx_time on zero data rate");
        let bits = num_bytes as u128 * 8;
        let nanos = (bits * 1_000_000_000).div_ceil(self.bps as u128);
        Duration::from_nanos(nanos as u64)
    }

    /// Number of whole bytes that fit in `d`
    pub fn bytes_in(&self, d: Duration) -> usize {
        (d.as_nanos() * self.bps as u128 / 8 / 1_000_000_000) as usize
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bps >= 1_000_000 && self.bps % 1_000_000 == 0 {
            write!(f, "{}Mbps", self.bps / 1_000_000)
        } else {
            write!(f, "{}bps", self.bps)
        }
    }
}

impl fmt::Debug for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_time() {
        let rate = DataRate::from_bps(8_000_000);
        assert_eq!(rate.tx_time(1000), Duration::from_millis(1));
        assert_eq!(rate.tx_time(0), Duration::ZERO);
        // 1 byte at 3 bps: 8/3 s rounded up
        assert_eq!(DataRate::from_bps(3).tx_time(1), Duration::from_nanos(2_666_666_667));
        assert_eq!(rate.bytes_in(Duration::from_millis(1)), 1000);
    }
}
