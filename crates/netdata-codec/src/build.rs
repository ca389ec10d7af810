// Author: Lukas Bower
// Purpose: Append-style builders emitting Network Data TLV sequences.

//! Emission of Network Data TLV images.
//!
//! Builders append TLVs to a growing byte vector and back-patch the
//! length byte when a container closes. TLV values are capped at 255
//! bytes by the wire format; exceeding the cap is a programming error
//! and panics.

use alloc::vec::Vec;

use crate::tlv::{ContextTlv, ServiceTlv, TlvType};
use crate::types::{
    ExternalRouteConfig, Ip6Prefix, OnMeshPrefixConfig, THREAD_ENTERPRISE_NUMBER,
};
use crate::{BorderRouterFlags, HasRouteFlags};

fn push_header(bytes: &mut Vec<u8>, tlv_type: TlvType, stable: bool) -> usize {
    bytes.push((tlv_type as u8) << 1 | u8::from(stable));
    bytes.push(0);
    bytes.len() - 1
}

fn patch_length(bytes: &mut Vec<u8>, length_at: usize) {
    let length = bytes.len() - length_at - 1;
    bytes[length_at] = u8::try_from(length).expect("tlv value exceeds 255 bytes");
}

/// Builder for a complete Network Data image.
#[derive(Debug, Default)]
pub struct NetworkDataBuilder {
    bytes: Vec<u8>,
}

impl NetworkDataBuilder {
    /// Start an empty image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a Prefix TLV; `fill` adds its sub-TLVs.
    pub fn prefix(
        mut self,
        domain_id: u8,
        prefix: Ip6Prefix,
        stable: bool,
        fill: impl FnOnce(&mut PrefixBuilder<'_>),
    ) -> Self {
        let length_at = push_header(&mut self.bytes, TlvType::Prefix, stable);
        self.bytes.push(domain_id);
        self.bytes.push(prefix.length());
        self.bytes.extend_from_slice(&prefix.bytes()[..prefix.wire_len()]);

        let mut builder = PrefixBuilder { bytes: &mut self.bytes };
        fill(&mut builder);

        patch_length(&mut self.bytes, length_at);
        self
    }

    /// Append a Service TLV; `fill` adds its Server sub-TLVs. The
    /// enterprise number is elided via the T bit when it is the Thread
    /// number.
    pub fn service(
        mut self,
        service_id: u8,
        enterprise_number: u32,
        service_data: &[u8],
        stable: bool,
        fill: impl FnOnce(&mut ServiceBuilder<'_>),
    ) -> Self {
        let length_at = push_header(&mut self.bytes, TlvType::Service, stable);

        let mut id_byte = service_id & 0x0f;
        if enterprise_number == THREAD_ENTERPRISE_NUMBER {
            id_byte |= ServiceTlv::THREAD_ENTERPRISE_FLAG;
        }
        self.bytes.push(id_byte);

        if enterprise_number != THREAD_ENTERPRISE_NUMBER {
            self.bytes.extend_from_slice(&enterprise_number.to_be_bytes());
        }

        self.bytes
            .push(u8::try_from(service_data.len()).expect("service data exceeds 255 bytes"));
        self.bytes.extend_from_slice(service_data);

        let mut builder = ServiceBuilder { bytes: &mut self.bytes };
        fill(&mut builder);

        patch_length(&mut self.bytes, length_at);
        self
    }

    /// Append an opaque Commissioning Data TLV.
    #[must_use]
    pub fn commissioning_data(mut self, data: &[u8], stable: bool) -> Self {
        let length_at = push_header(&mut self.bytes, TlvType::CommissioningData, stable);
        self.bytes.extend_from_slice(data);
        patch_length(&mut self.bytes, length_at);
        self
    }

    /// The finished image.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// Adds sub-TLVs to an open Prefix TLV.
#[derive(Debug)]
pub struct PrefixBuilder<'a> {
    bytes: &'a mut Vec<u8>,
}

impl PrefixBuilder<'_> {
    /// Append a Border Router sub-TLV with `{rloc16, flags}` entries.
    pub fn border_router(&mut self, stable: bool, entries: &[(u16, u16)]) -> &mut Self {
        let length_at = push_header(self.bytes, TlvType::BorderRouter, stable);
        for (rloc16, flags) in entries {
            self.bytes.extend_from_slice(&rloc16.to_be_bytes());
            self.bytes.extend_from_slice(&flags.to_be_bytes());
        }
        patch_length(self.bytes, length_at);
        self
    }

    /// Append a Has Route sub-TLV with `{rloc16, flags}` entries.
    pub fn has_route(&mut self, stable: bool, entries: &[(u16, u8)]) -> &mut Self {
        let length_at = push_header(self.bytes, TlvType::HasRoute, stable);
        for (rloc16, flags) in entries {
            self.bytes.extend_from_slice(&rloc16.to_be_bytes());
            self.bytes.push(*flags);
        }
        patch_length(self.bytes, length_at);
        self
    }

    /// Append a 6LoWPAN Context sub-TLV.
    pub fn context(
        &mut self,
        stable: bool,
        context_id: u8,
        compress: bool,
        context_length: u8,
    ) -> &mut Self {
        let length_at = push_header(self.bytes, TlvType::Context, stable);
        self.bytes.push(ContextTlv::encode_id(context_id, compress));
        self.bytes.push(context_length);
        patch_length(self.bytes, length_at);
        self
    }
}

/// Adds Server sub-TLVs to an open Service TLV.
#[derive(Debug)]
pub struct ServiceBuilder<'a> {
    bytes: &'a mut Vec<u8>,
}

impl ServiceBuilder<'_> {
    /// Append a Server sub-TLV.
    pub fn server(&mut self, stable: bool, rloc16: u16, server_data: &[u8]) -> &mut Self {
        let length_at = push_header(self.bytes, TlvType::Server, stable);
        self.bytes.extend_from_slice(&rloc16.to_be_bytes());
        self.bytes.extend_from_slice(server_data);
        patch_length(self.bytes, length_at);
        self
    }
}

/// Border Router flag word for an on-mesh prefix config.
#[must_use]
pub fn border_router_flags(config: &OnMeshPrefixConfig) -> u16 {
    let mut flags = u16::from(config.preference.to_2bit()) << BorderRouterFlags::PREFERENCE_OFFSET;

    for (set, bit) in [
        (config.preferred, BorderRouterFlags::PREFERRED),
        (config.slaac, BorderRouterFlags::SLAAC),
        (config.dhcp, BorderRouterFlags::DHCP),
        (config.configure, BorderRouterFlags::CONFIGURE),
        (config.default_route, BorderRouterFlags::DEFAULT_ROUTE),
        (config.on_mesh, BorderRouterFlags::ON_MESH),
        (config.nd_dns, BorderRouterFlags::ND_DNS),
        (config.dp, BorderRouterFlags::DP),
    ] {
        if set {
            flags |= bit;
        }
    }

    flags
}

/// Has Route flag byte for an external route config.
#[must_use]
pub fn has_route_flags(config: &ExternalRouteConfig) -> u8 {
    let mut flags = config.preference.to_2bit() << HasRouteFlags::PREFERENCE_OFFSET;

    if config.nat64 {
        flags |= HasRouteFlags::NAT64;
    }
    if config.adv_pio {
        flags |= HasRouteFlags::ADV_PIO;
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::{BorderRouterEntry, PrefixTlv, ServerTlv, TlvIter};
    use crate::types::RoutePreference;

    use std::vec::Vec;

    #[test]
    fn builds_prefix_with_border_router() {
        let prefix = Ip6Prefix::new("fd00:beef:cafe::".parse().unwrap(), 64);
        let image = NetworkDataBuilder::new()
            .prefix(0, prefix, true, |p| {
                p.border_router(true, &[(0x2800, 0x3300), (0x2801, 0x3300)]);
            })
            .build();

        let tlvs: Vec<_> = TlvIter::new(&image).collect::<Result<_, _>>().unwrap();
        assert_eq!(tlvs.len(), 1);

        let parsed = PrefixTlv::parse(&tlvs[0]).unwrap();
        assert_eq!(parsed.prefix, prefix);
        assert!(parsed.stable);

        let sub = parsed.sub_tlvs().next().unwrap().unwrap();
        let entries: Vec<_> = BorderRouterEntry::iter(sub.value).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rloc16, 0x2800);
        assert!(entries[0].flags.has(BorderRouterFlags::ON_MESH));
    }

    #[test]
    fn builds_thread_service_with_server() {
        let image = NetworkDataBuilder::new()
            .service(2, THREAD_ENTERPRISE_NUMBER, &[0x5c, 0x03], true, |s| {
                s.server(true, 0x4c00, &[]);
            })
            .build();

        // Matches the hand-assembled vector from interop captures.
        assert_eq!(
            image,
            &[0x0b, 0x08, 0x82, 0x02, 0x5c, 0x03, 0x0d, 0x02, 0x4c, 0x00]
        );

        let tlv = TlvIter::new(&image).next().unwrap().unwrap();
        let service = crate::tlv::ServiceTlv::parse(&tlv).unwrap();
        assert_eq!(service.enterprise_number, THREAD_ENTERPRISE_NUMBER);
        assert_eq!(service.service_id, 2);

        let server_tlv = service.sub_tlvs().next().unwrap().unwrap();
        let server = ServerTlv::parse(&server_tlv).unwrap();
        assert_eq!(server.rloc16, 0x4c00);
        assert!(server.server_data.is_empty());
    }

    #[test]
    fn flag_encoders_round_trip_through_decoders() {
        let config = OnMeshPrefixConfig {
            preference: RoutePreference::High,
            preferred: true,
            slaac: true,
            default_route: true,
            on_mesh: true,
            ..Default::default()
        };
        let flags = BorderRouterFlags::from_raw(border_router_flags(&config));
        assert_eq!(flags.preference(), RoutePreference::High);
        assert!(flags.has(BorderRouterFlags::SLAAC | BorderRouterFlags::ON_MESH));
        assert!(!flags.has(BorderRouterFlags::DHCP));

        let route = ExternalRouteConfig {
            preference: RoutePreference::Low,
            nat64: true,
            ..Default::default()
        };
        let flags = HasRouteFlags::from_raw(has_route_flags(&route));
        assert_eq!(flags.preference(), RoutePreference::Low);
        assert!(flags.has(HasRouteFlags::NAT64));
    }
}
