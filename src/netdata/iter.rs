// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Stateless query iterators over a Network Data snapshot.
// Author: Lukas Bower

//! Query engine. Every operation walks the immutable byte image; the
//! iterator token packs the resume position and the store version it
//! was bound to, so use across a mutation surfaces as `InvalidState`
//! instead of decoding from a shifted offset.

use heapless::Vec as BoundedVec;
use log::warn;

use netdata_codec::{
    BorderRouterEntry, BorderRouterFlags, ContextTlv, ExternalRouteConfig, HasRouteEntry,
    LowpanContextInfo, OnMeshPrefixConfig, PrefixTlv, ServerConfig, ServerTlv, ServiceConfig,
    ServiceTlv, Tlv, TlvIter, TlvType,
};

use crate::error::Error;
use crate::netdata::{rloc16_is_router, NetworkData};

/// Upper bound on distinct RLOCs one query returns.
pub const RLOCS_MAX: usize = 32;

/// Which publishers an RLOC enumeration gathers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderRouterFilter {
    /// Any border router, route publisher or service server.
    AnyBrOrServer,
    /// Only border routers providing external IP connectivity: an
    /// external route, an on-mesh default-route prefix, or a domain
    /// prefix.
    BrProvidingExternalIpConn,
}

/// Role restriction applied to enumerated RLOCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFilter {
    /// Routers and children alike.
    Any,
    /// Routers only.
    RouterOnly,
    /// Children only.
    ChildOnly,
}

impl RoleFilter {
    fn accepts(self, rloc16: u16) -> bool {
        match self {
            Self::Any => true,
            Self::RouterOnly => rloc16_is_router(rloc16),
            Self::ChildOnly => !rloc16_is_router(rloc16),
        }
    }
}

/// Match mode for service lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMatch {
    /// Service data must equal the query exactly.
    Exact,
    /// Service data must start with the query.
    Prefix,
}

/// A bounded, deduplicated set of RLOC16 values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Rlocs(BoundedVec<u16, RLOCS_MAX>);

impl Rlocs {
    /// The empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, ignoring duplicates. A full set drops the value.
    pub fn add(&mut self, rloc16: u16) {
        if self.0.contains(&rloc16) {
            return;
        }
        if self.0.push(rloc16).is_err() {
            warn!("rloc set full, dropping {rloc16:04x}");
        }
    }

    /// Whether the set contains `rloc16`.
    #[must_use]
    pub fn contains(&self, rloc16: u16) -> bool {
        self.0.contains(&rloc16)
    }

    /// Number of RLOCs in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The RLOCs in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }

    /// Iterate the RLOCs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

/// Opaque resume token for the `next_*` queries. A fresh token starts
/// at the beginning; the first use binds it to the store version.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NetDataIterator {
    tlv_offset: usize,
    sub_offset: usize,
    entry_index: usize,
    version: Option<u8>,
}

impl NetDataIterator {
    /// A token positioned at the start of the image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(&mut self, netdata: &NetworkData) -> Result<(), Error> {
        match self.version {
            None => {
                self.version = Some(netdata.version());
                Ok(())
            }
            Some(version) if version == netdata.version() => Ok(()),
            Some(_) => Err(Error::InvalidState),
        }
    }

    fn advance_top(&mut self, tlv: &Tlv<'_>) {
        self.tlv_offset = tlv.end_offset();
        self.sub_offset = 0;
        self.entry_index = 0;
    }
}

fn tlv_at(buf: &[u8], offset: usize) -> Option<Tlv<'_>> {
    match TlvIter::from_offset(buf, offset).next() {
        Some(Ok(tlv)) => Some(tlv),
        _ => None,
    }
}

/// Absolute offset of a container's sub-TLV region.
fn sub_base(tlv: &Tlv<'_>, sub_bytes: &[u8]) -> usize {
    tlv.offset + 2 + (tlv.value.len() - sub_bytes.len())
}

impl NetworkData {
    /// Next on-mesh prefix entry: one per Border Router entry whose
    /// flags carry the on-mesh bit, in buffer order.
    pub fn next_on_mesh_prefix(
        &self,
        iter: &mut NetDataIterator,
    ) -> Result<OnMeshPrefixConfig, Error> {
        iter.bind(self)?;
        let buf = self.bytes();

        while let Some(tlv) = tlv_at(buf, iter.tlv_offset) {
            if tlv.kind() == Some(TlvType::Prefix) {
                if let Ok(prefix) = PrefixTlv::parse(&tlv) {
                    let subs = prefix.sub_bytes();
                    let base = sub_base(&tlv, subs);
                    let resume = iter.sub_offset.saturating_sub(base);

                    let mut sub_iter = TlvIter::from_offset(subs, resume);
                    while let Some(Ok(sub)) = sub_iter.next() {
                        if sub.kind() == Some(TlvType::BorderRouter) {
                            for (index, entry) in BorderRouterEntry::iter(sub.value).enumerate() {
                                if index < iter.entry_index
                                    || !entry.flags.has(BorderRouterFlags::ON_MESH)
                                {
                                    continue;
                                }

                                iter.entry_index = index + 1;
                                iter.sub_offset = base + sub.offset;
                                return Ok(on_mesh_prefix_config(&prefix, &sub, &entry));
                            }
                        }
                        iter.entry_index = 0;
                        iter.sub_offset = base + sub.end_offset();
                    }
                }
            }
            iter.advance_top(&tlv);
        }

        Err(Error::NotFound)
    }

    /// Next external route entry: one per Has Route entry, in buffer
    /// order.
    pub fn next_external_route(
        &self,
        iter: &mut NetDataIterator,
    ) -> Result<ExternalRouteConfig, Error> {
        iter.bind(self)?;
        let buf = self.bytes();

        while let Some(tlv) = tlv_at(buf, iter.tlv_offset) {
            if tlv.kind() == Some(TlvType::Prefix) {
                if let Ok(prefix) = PrefixTlv::parse(&tlv) {
                    let subs = prefix.sub_bytes();
                    let base = sub_base(&tlv, subs);
                    let resume = iter.sub_offset.saturating_sub(base);

                    let mut sub_iter = TlvIter::from_offset(subs, resume);
                    while let Some(Ok(sub)) = sub_iter.next() {
                        if sub.kind() == Some(TlvType::HasRoute) {
                            if let Some(entry) =
                                HasRouteEntry::iter(sub.value).nth(iter.entry_index)
                            {
                                iter.entry_index += 1;
                                iter.sub_offset = base + sub.offset;
                                return Ok(ExternalRouteConfig {
                                    prefix: prefix.prefix,
                                    rloc16: entry.rloc16,
                                    preference: entry.flags.preference(),
                                    nat64: entry.flags.has(netdata_codec::HasRouteFlags::NAT64),
                                    stable: sub.stable,
                                    adv_pio: entry.flags.has(netdata_codec::HasRouteFlags::ADV_PIO),
                                    next_hop_is_this_device: self.local_rloc16()
                                        == Some(entry.rloc16),
                                });
                            }
                        }
                        iter.entry_index = 0;
                        iter.sub_offset = base + sub.end_offset();
                    }
                }
            }
            iter.advance_top(&tlv);
        }

        Err(Error::NotFound)
    }

    /// Next service entry: one `ServiceConfig` per Server sub-TLV, in
    /// buffer order. Server sub-TLVs too short for an RLOC16 are
    /// skipped.
    pub fn next_service(&self, iter: &mut NetDataIterator) -> Result<ServiceConfig, Error> {
        iter.bind(self)?;
        let buf = self.bytes();

        while let Some(tlv) = tlv_at(buf, iter.tlv_offset) {
            if tlv.kind() == Some(TlvType::Service) {
                if let Ok(service) = ServiceTlv::parse(&tlv) {
                    let subs = service.sub_bytes();
                    let base = sub_base(&tlv, subs);
                    let resume = iter.sub_offset.saturating_sub(base);

                    let mut sub_iter = TlvIter::from_offset(subs, resume);
                    while let Some(Ok(sub)) = sub_iter.next() {
                        iter.sub_offset = base + sub.end_offset();

                        if sub.kind() == Some(TlvType::Server) {
                            if let Ok(server) = ServerTlv::parse(&sub) {
                                return Ok(ServiceConfig {
                                    service_id: service.service_id,
                                    enterprise_number: service.enterprise_number,
                                    service_data: service.service_data.to_vec(),
                                    server: ServerConfig {
                                        rloc16: server.rloc16,
                                        server_data: server.server_data.to_vec(),
                                        stable: sub.stable,
                                    },
                                });
                            }
                        }
                    }
                }
            }
            iter.advance_top(&tlv);
        }

        Err(Error::NotFound)
    }

    /// Next 6LoWPAN context entry: one per Context sub-TLV, in buffer
    /// order.
    pub fn next_lowpan_context(
        &self,
        iter: &mut NetDataIterator,
    ) -> Result<LowpanContextInfo, Error> {
        iter.bind(self)?;
        let buf = self.bytes();

        while let Some(tlv) = tlv_at(buf, iter.tlv_offset) {
            if tlv.kind() == Some(TlvType::Prefix) {
                if let Ok(prefix) = PrefixTlv::parse(&tlv) {
                    let subs = prefix.sub_bytes();
                    let base = sub_base(&tlv, subs);
                    let resume = iter.sub_offset.saturating_sub(base);

                    let mut sub_iter = TlvIter::from_offset(subs, resume);
                    while let Some(Ok(sub)) = sub_iter.next() {
                        iter.sub_offset = base + sub.end_offset();

                        if sub.kind() == Some(TlvType::Context) {
                            if let Ok(context) = ContextTlv::parse(&sub) {
                                return Ok(LowpanContextInfo {
                                    context_id: context.context_id,
                                    compress: context.compress,
                                    stable: context.stable,
                                    prefix: prefix.prefix,
                                });
                            }
                        }
                    }
                }
            }
            iter.advance_top(&tlv);
        }

        Err(Error::NotFound)
    }

    /// Enumerate the RLOC16s of matching publishers, deduplicated, in
    /// buffer order.
    #[must_use]
    pub fn find_rlocs(&self, filter: BorderRouterFilter, role: RoleFilter) -> Rlocs {
        let mut rlocs = Rlocs::new();
        self.for_each_publisher(|rloc16, provides_external_ip| {
            let accepted = match filter {
                BorderRouterFilter::AnyBrOrServer => true,
                BorderRouterFilter::BrProvidingExternalIpConn => provides_external_ip,
            };
            if accepted && role.accepts(rloc16) {
                rlocs.add(rloc16);
            }
        });
        rlocs
    }

    /// Whether a border router with external IP connectivity publishes
    /// under the given RLOC16.
    #[must_use]
    pub fn contains_border_router_with_rloc(&self, rloc16: u16) -> bool {
        let mut found = false;
        self.for_each_publisher(|candidate, provides_external_ip| {
            if provides_external_ip && candidate == rloc16 {
                found = true;
            }
        });
        found
    }

    /// Number of distinct border routers providing external IP
    /// connectivity, restricted by role.
    #[must_use]
    pub fn count_border_routers(&self, role: RoleFilter) -> u16 {
        self.find_rlocs(BorderRouterFilter::BrProvidingExternalIpConn, role)
            .len() as u16
    }

    /// Walk every publishing entry, reporting `(rloc16,
    /// provides_external_ip_connectivity)`.
    fn for_each_publisher(&self, mut visit: impl FnMut(u16, bool)) {
        for tlv in TlvIter::new(self.bytes()).flatten() {
            match tlv.kind() {
                Some(TlvType::Prefix) => {
                    let Ok(prefix) = PrefixTlv::parse(&tlv) else {
                        continue;
                    };

                    for sub in prefix.sub_tlvs().flatten() {
                        match sub.kind() {
                            Some(TlvType::BorderRouter) => {
                                for entry in BorderRouterEntry::iter(sub.value) {
                                    let external = entry.flags.has(
                                        BorderRouterFlags::DEFAULT_ROUTE
                                            | BorderRouterFlags::ON_MESH,
                                    ) || entry.flags.has(BorderRouterFlags::DP);
                                    visit(entry.rloc16, external);
                                }
                            }
                            Some(TlvType::HasRoute) => {
                                for entry in HasRouteEntry::iter(sub.value) {
                                    visit(entry.rloc16, true);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Some(TlvType::Service) => {
                    let Ok(service) = ServiceTlv::parse(&tlv) else {
                        continue;
                    };

                    for sub in service.sub_tlvs().flatten() {
                        if sub.kind() == Some(TlvType::Server) {
                            if let Ok(server) = ServerTlv::parse(&sub) {
                                visit(server.rloc16, false);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Linear scan for the next Service TLV matching the enterprise
    /// number and service data, resuming after `previous` (an offset
    /// from an earlier result's `offset` field).
    #[must_use]
    pub fn find_next_service(
        &self,
        previous: Option<usize>,
        enterprise_number: u32,
        service_data: &[u8],
        match_mode: ServiceMatch,
    ) -> Option<ServiceTlv<'_>> {
        for tlv in TlvIter::new(self.bytes()).flatten() {
            if let Some(after) = previous {
                if tlv.offset <= after {
                    continue;
                }
            }

            if tlv.kind() != Some(TlvType::Service) {
                continue;
            }

            let Ok(service) = ServiceTlv::parse(&tlv) else {
                continue;
            };

            if service.enterprise_number != enterprise_number {
                continue;
            }

            let matched = match match_mode {
                ServiceMatch::Exact => service.service_data == service_data,
                ServiceMatch::Prefix => service.service_data.starts_with(service_data),
            };

            if matched {
                return Some(service);
            }
        }

        None
    }
}

fn on_mesh_prefix_config(
    prefix: &PrefixTlv<'_>,
    sub: &Tlv<'_>,
    entry: &BorderRouterEntry,
) -> OnMeshPrefixConfig {
    OnMeshPrefixConfig {
        prefix: prefix.prefix,
        rloc16: entry.rloc16,
        preference: entry.flags.preference(),
        preferred: entry.flags.has(BorderRouterFlags::PREFERRED),
        slaac: entry.flags.has(BorderRouterFlags::SLAAC),
        dhcp: entry.flags.has(BorderRouterFlags::DHCP),
        configure: entry.flags.has(BorderRouterFlags::CONFIGURE),
        default_route: entry.flags.has(BorderRouterFlags::DEFAULT_ROUTE),
        on_mesh: entry.flags.has(BorderRouterFlags::ON_MESH),
        stable: sub.stable,
        nd_dns: entry.flags.has(BorderRouterFlags::ND_DNS),
        dp: entry.flags.has(BorderRouterFlags::DP),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::Notifier;
    use netdata_codec::{Ip6Prefix, NetworkDataBuilder};

    fn store_with(image: &[u8]) -> NetworkData {
        let mut store = NetworkData::new();
        store.populate(image).unwrap();
        store
    }

    #[test]
    fn stale_iterator_is_rejected_after_mutation() {
        let image = NetworkDataBuilder::new()
            .prefix(0, Ip6Prefix::new("fd00::".parse().unwrap(), 64), false, |p| {
                p.has_route(false, &[(0xc800, 0x00)]);
            })
            .build();

        let mut store = NetworkData::new();
        let mut notifier = Notifier::new();
        store.replace(&image, &mut notifier).unwrap();

        let mut iter = NetDataIterator::new();
        assert!(store.next_external_route(&mut iter).is_ok());

        store.replace(&image, &mut notifier).unwrap();
        assert_eq!(store.next_external_route(&mut iter), Err(Error::InvalidState));

        let mut fresh = NetDataIterator::new();
        assert!(store.next_external_route(&mut fresh).is_ok());
    }

    #[test]
    fn on_mesh_iteration_skips_off_mesh_entries() {
        let image = NetworkDataBuilder::new()
            .prefix(0, Ip6Prefix::new("fd00::".parse().unwrap(), 64), false, |p| {
                p.border_router(
                    false,
                    &[(0x2800, 0x0100), (0x2801, 0x0000), (0x4c00, 0x0100)],
                );
            })
            .build();
        let store = store_with(&image);

        let mut iter = NetDataIterator::new();
        assert_eq!(store.next_on_mesh_prefix(&mut iter).unwrap().rloc16, 0x2800);
        assert_eq!(store.next_on_mesh_prefix(&mut iter).unwrap().rloc16, 0x4c00);
        assert_eq!(store.next_on_mesh_prefix(&mut iter), Err(Error::NotFound));
    }

    #[test]
    fn route_queries_mark_own_routes() {
        let image = NetworkDataBuilder::new()
            .prefix(0, Ip6Prefix::new("fd00::".parse().unwrap(), 64), false, |p| {
                p.has_route(false, &[(0xc800, 0x00), (0x5400, 0x00)]);
            })
            .build();

        let mut store = store_with(&image);
        store.set_local_rloc16(0x5400);

        let mut iter = NetDataIterator::new();
        assert!(!store.next_external_route(&mut iter).unwrap().next_hop_is_this_device);
        assert!(store.next_external_route(&mut iter).unwrap().next_hop_is_this_device);
    }

    #[test]
    fn find_next_service_honours_match_modes() {
        let image = NetworkDataBuilder::new()
            .service(1, 44970, &[0x02], false, |s| {
                s.server(false, 0x2800, &[]);
            })
            .service(2, 44970, &[0xab], false, |s| {
                s.server(false, 0x2800, &[]);
            })
            .service(3, 44970, &[0x02, 0xab, 0xcd], false, |s| {
                s.server(false, 0x2800, &[]);
            })
            .build();
        let store = store_with(&image);

        let first = store
            .find_next_service(None, 44970, &[0x02], ServiceMatch::Prefix)
            .unwrap();
        assert_eq!(first.service_data, &[0x02]);

        let second = store
            .find_next_service(Some(first.offset), 44970, &[0x02], ServiceMatch::Prefix)
            .unwrap();
        assert_eq!(second.service_data, &[0x02, 0xab, 0xcd]);

        assert!(store
            .find_next_service(Some(second.offset), 44970, &[0x02], ServiceMatch::Prefix)
            .is_none());

        let exact = store
            .find_next_service(None, 44970, &[0xab], ServiceMatch::Exact)
            .unwrap();
        assert_eq!(exact.service_id, 2);
    }
}
