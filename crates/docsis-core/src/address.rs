use core::fmt;
use core::str::FromStr;

/// 48-bit hardware address of a cable device
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    /// Build an address from the low 48 bits of `v`
    pub fn from_u64(v: u64) -> Self {
        let b = v.to_be_bytes();
        MacAddress([b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    pub fn to_u64(self) -> u64 {
        self.0.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn octets(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", b[0], b[1], b[2], b[3], b[4], b[5])
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for MacAddress {
    type Err = &'static str;

    /// Parses the colon separated form `00:11:22:33:44:55`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.split(':');
        for byte in out.iter_mut() {
            let part = parts.next().ok_or("mac address needs six octets")?;
            *byte = u8::from_str_radix(part, 16).map_err(|_| "invalid hex octet in mac address")?;
        }
        if parts.next().is_some() {
            return Err("mac address has more than six octets");
        }
        Ok(MacAddress(out))
    }
}

/// Hands out unique locally-administered addresses, one after the other
#[derive(Debug, Clone)]
pub struct AddressAllocator {
    next: u64,
}

impl Default for AddressAllocator {
    fn default() -> Self {
        // 02:00:00:00:00:01, locally administered unicast
        Self { next: 0x0200_0000_0001 }
    }
}

impl AddressAllocator {
    pub fn allocate(&mut self) -> MacAddress {
        let addr = MacAddress::from_u64(self.next);
        self.next += 1;
        addr
    }

    /// Make sure a statically configured address is never handed out again
    pub fn reserve(&mut self, addr: MacAddress) {
        let v = addr.to_u64();
        if v >= self.next && v < 0xFFFF_FFFF_FFFF {
            self.next = v + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let addr: MacAddress = "00:1a:2B:3c:4d:5e".parse().unwrap();
        assert_eq!(addr.0, [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);
        assert_eq!(addr.to_string(), "00:1a:2b:3c:4d:5e");
        assert!("00:11:22".parse::<MacAddress>().is_err());
        assert!("00:11:22:33:44:55:66".parse::<MacAddress>().is_err());
        assert!("zz:11:22:33:44:55".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_u64_conversion() {
        let addr = MacAddress::from_u64(0x0102_0304_0506);
        assert_eq!(addr.0, [1, 2, 3, 4, 5, 6]);
        assert_eq!(addr.to_u64(), 0x0102_0304_0506);
        assert!(MacAddress::from_u64(0xFFFF_FFFF_FFFF).is_broadcast());
    }

    #[test]
    fn test_allocator_skips_reserved() {
        let mut alloc = AddressAllocator::default();
        let a = alloc.allocate();
        alloc.reserve(MacAddress::from_u64(a.to_u64() + 5));
        let b = alloc.allocate();
        assert_eq!(b.to_u64(), a.to_u64() + 6);
    }
}
