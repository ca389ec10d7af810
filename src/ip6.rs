// Author: Lukas Bower
// Purpose: Mesh-local IPv6 addressing helpers shared by the subsystems.

//! Mesh-local addressing. Routing and anycast locators live in the
//! partition's mesh-local /64 with the well-known interface identifier
//! `0000:00ff:fe00:xxxx`.

use core::fmt;
use core::net::Ipv6Addr;

use netdata_codec::Ip6Prefix;

/// The partition's mesh-local /64 prefix.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MeshLocalPrefix([u8; 8]);

impl MeshLocalPrefix {
    /// Wrap the upper 64 bits of a mesh-local address.
    #[must_use]
    pub fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// The prefix bytes.
    #[must_use]
    pub fn bytes(&self) -> [u8; 8] {
        self.0
    }

    /// The prefix as an `Ip6Prefix` of length 64.
    #[must_use]
    pub fn as_prefix(&self) -> Ip6Prefix {
        let mut octets = [0u8; 16];
        octets[..8].copy_from_slice(&self.0);
        Ip6Prefix::new(Ipv6Addr::from(octets), 64)
    }

    /// The locator address (RLOC or ALOC) for a 16-bit locator.
    #[must_use]
    pub fn locator(&self, locator16: u16) -> Ipv6Addr {
        let mut octets = [0u8; 16];
        octets[..8].copy_from_slice(&self.0);
        octets[11] = 0xff;
        octets[12] = 0xfe;
        octets[14..16].copy_from_slice(&locator16.to_be_bytes());
        Ipv6Addr::from(octets)
    }
}

impl From<Ip6Prefix> for MeshLocalPrefix {
    fn from(prefix: Ip6Prefix) -> Self {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&prefix.bytes()[..8]);
        Self(bytes)
    }
}

/// An IPv6 socket address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SockAddr {
    /// The IPv6 address.
    pub addr: Ipv6Addr,
    /// The UDP port.
    pub port: u16,
}

impl fmt::Display for SockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:{}", self.addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_addresses_use_the_well_known_iid() {
        let prefix = MeshLocalPrefix::new([0xfd, 0xde, 0xad, 0x00, 0xbe, 0xef, 0x00, 0x00]);
        assert_eq!(
            prefix.locator(0x2800),
            "fdde:ad00:beef:0:0:ff:fe00:2800".parse::<Ipv6Addr>().unwrap()
        );
        assert_eq!(
            prefix.locator(0xfc12),
            "fdde:ad00:beef:0:0:ff:fe00:fc12".parse::<Ipv6Addr>().unwrap()
        );
    }
}
