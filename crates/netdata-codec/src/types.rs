// Author: Lukas Bower
// Purpose: Define Thread Network Data wire constants and derived config types.
#![allow(clippy::module_name_repetitions)]

//! Network Data model definitions shared across codec consumers.

use core::fmt;
use core::net::Ipv6Addr;

use alloc::vec::Vec;

/// Maximum length of a partition's Network Data image on the wire.
pub const NETWORK_DATA_MAX_SIZE: usize = 254;

/// IANA enterprise number assigned to the Thread Group.
pub const THREAD_ENTERPRISE_NUMBER: u32 = 44970;

/// Thread service number for the DNS/SRP Anycast service.
pub const SERVICE_DNS_SRP_ANYCAST: u8 = 0x5c;

/// Thread service number for the DNS/SRP Unicast service.
pub const SERVICE_DNS_SRP_UNICAST: u8 = 0x5d;

/// Base of the service anycast locator range: ALOC16 = base + service id.
pub const ALOC16_SERVICE_START: u16 = 0xfc10;

/// Maximum size of the service data field in a Service TLV.
pub const SERVICE_DATA_MAX_SIZE: usize = 252;

/// Maximum size of the server data field in a Server sub-TLV.
pub const SERVER_DATA_MAX_SIZE: usize = 248;

/// Possible errors produced while decoding Network Data TLVs.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ended inside a TLV header or a fixed-size field.
    #[error("truncated tlv")]
    Truncated,
    /// A TLV declares more value bytes than the buffer holds.
    #[error("tlv length exceeds buffer")]
    LengthExceedsBuffer,
    /// A Prefix TLV carries a prefix length outside 0..=128.
    #[error("invalid prefix length {0}")]
    InvalidPrefixLength(u8),
}

/// An IPv6 prefix: an address plus a bit length in 0..=128.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ip6Prefix {
    addr: Ipv6Addr,
    length: u8,
}

impl Default for Ip6Prefix {
    fn default() -> Self {
        Self {
            addr: Ipv6Addr::UNSPECIFIED,
            length: 0,
        }
    }
}

impl Ip6Prefix {
    /// Construct a prefix from an address and bit length. Address bits
    /// past the prefix length are kept as supplied.
    #[must_use]
    pub fn new(addr: Ipv6Addr, length: u8) -> Self {
        Self { addr, length }
    }

    /// The prefix address.
    #[must_use]
    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    /// The prefix length in bits.
    #[must_use]
    pub fn length(&self) -> u8 {
        self.length
    }

    /// Number of bytes the prefix occupies on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        (usize::from(self.length) + 7) / 8
    }

    /// The wire bytes of the prefix.
    #[must_use]
    pub fn bytes(&self) -> [u8; 16] {
        self.addr.octets()
    }

    /// Whether `addr` falls within this prefix.
    #[must_use]
    pub fn contains(&self, addr: &Ipv6Addr) -> bool {
        prefix_match_len(&self.addr, addr) >= self.length
    }
}

impl fmt::Display for Ip6Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.length)
    }
}

/// Number of leading prefix bits two addresses share.
#[must_use]
pub fn prefix_match_len(a: &Ipv6Addr, b: &Ipv6Addr) -> u8 {
    let a = a.octets();
    let b = b.octets();
    let mut len = 0u8;

    for (x, y) in a.iter().zip(b.iter()) {
        let diff = x ^ y;
        if diff == 0 {
            len += 8;
        } else {
            len += diff.leading_zeros() as u8;
            break;
        }
    }

    len
}

/// Route preference carried as a 2-bit signed field on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoutePreference {
    /// Low preference (wire `11`).
    Low,
    /// Medium preference (wire `00`), the default.
    #[default]
    Medium,
    /// High preference (wire `01`).
    High,
}

impl RoutePreference {
    /// Decode from the raw 2-bit wire value. The reserved encoding `10`
    /// is clamped to `Medium`.
    #[must_use]
    pub fn from_2bit(value: u8) -> Self {
        match value & 0x3 {
            0b01 => Self::High,
            0b11 => Self::Low,
            _ => Self::Medium,
        }
    }

    /// Encode to the raw 2-bit wire value.
    #[must_use]
    pub fn to_2bit(self) -> u8 {
        match self {
            Self::High => 0b01,
            Self::Medium => 0b00,
            Self::Low => 0b11,
        }
    }
}

impl From<RoutePreference> for i8 {
    fn from(value: RoutePreference) -> Self {
        match value {
            RoutePreference::Low => -1,
            RoutePreference::Medium => 0,
            RoutePreference::High => 1,
        }
    }
}

/// An on-mesh prefix entry derived from a Border Router sub-TLV.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OnMeshPrefixConfig {
    /// The IPv6 prefix.
    pub prefix: Ip6Prefix,
    /// RLOC16 of the border router publishing the entry.
    pub rloc16: u16,
    /// Route preference for the default route through this border router.
    pub preference: RoutePreference,
    /// Whether the prefix is preferred for address selection.
    pub preferred: bool,
    /// Whether addresses may be autoconfigured from the prefix (SLAAC).
    pub slaac: bool,
    /// Whether the border router is a DHCPv6 agent for the prefix.
    pub dhcp: bool,
    /// Whether the DHCPv6 agent supplies other configuration data.
    pub configure: bool,
    /// Whether the border router is a default router for the prefix.
    pub default_route: bool,
    /// Whether the prefix is on-mesh.
    pub on_mesh: bool,
    /// Whether the entry is part of stable Network Data.
    pub stable: bool,
    /// Whether the border router can supply DNS information via ND.
    pub nd_dns: bool,
    /// Whether the prefix is a Thread Domain Prefix.
    pub dp: bool,
}

/// An external route entry derived from a Has Route sub-TLV.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExternalRouteConfig {
    /// The IPv6 prefix.
    pub prefix: Ip6Prefix,
    /// RLOC16 of the router publishing the route.
    pub rloc16: u16,
    /// Route preference.
    pub preference: RoutePreference,
    /// Whether this is a NAT64 prefix.
    pub nat64: bool,
    /// Whether the entry is part of stable Network Data.
    pub stable: bool,
    /// Whether the publishing router advertises the prefix as a PIO.
    pub adv_pio: bool,
    /// Whether the next hop for the route is this device.
    pub next_hop_is_this_device: bool,
}

/// A server entry within a service configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// RLOC16 of the server.
    pub rloc16: u16,
    /// Opaque server data bytes.
    pub server_data: Vec<u8>,
    /// Whether the Server sub-TLV is part of stable Network Data.
    pub stable: bool,
}

/// A service entry derived from a Service TLV, one per Server sub-TLV.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Service identifier assigned within the partition (0..=15).
    pub service_id: u8,
    /// IANA enterprise number owning the service data namespace.
    pub enterprise_number: u32,
    /// Opaque service data bytes.
    pub service_data: Vec<u8>,
    /// The server entry this config was produced for.
    pub server: ServerConfig,
}

/// 6LoWPAN Context ID information associated with a prefix.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LowpanContextInfo {
    /// The 6LoWPAN Context ID.
    pub context_id: u8,
    /// Whether the context may be used for compression.
    pub compress: bool,
    /// Whether the Context sub-TLV is part of stable Network Data.
    pub stable: bool,
    /// The associated IPv6 prefix.
    pub prefix: Ip6Prefix,
}
