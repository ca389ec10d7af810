// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Property-test the query engine over generated Network Data images.
// Author: Lukas Bower

//! Property tests over generated Network Data images: iterator
//! totality, RLOC enumeration laws, stable-filter purity and anycast
//! preference totality.

use proptest::prelude::*;

use threadnet::codec::{
    border_router_flags, has_route_flags, ExternalRouteConfig, Ip6Prefix, NetworkDataBuilder,
    OnMeshPrefixConfig, RoutePreference,
};
use threadnet::ip6::MeshLocalPrefix;
use threadnet::netdata::iter::{BorderRouterFilter, NetDataIterator, RoleFilter};
use threadnet::netdata::service::find_preferred_dns_srp_anycast_info;
use threadnet::netdata::NetworkData;

#[derive(Debug, Clone)]
struct PrefixCase {
    seed: u16,
    length: u8,
    stable: bool,
    border_routers: Vec<(u16, OnMeshPrefixConfig)>,
    routes: Vec<(u16, ExternalRouteConfig)>,
}

fn prefix_of(case: &PrefixCase) -> Ip6Prefix {
    let mut octets = [0u8; 16];
    octets[0] = 0xfd;
    octets[1] = (case.seed >> 8) as u8;
    octets[2] = case.seed as u8;
    Ip6Prefix::new(octets.into(), case.length)
}

fn on_mesh_config(bits: u8) -> OnMeshPrefixConfig {
    OnMeshPrefixConfig {
        preference: RoutePreference::from_2bit(bits & 0x3),
        preferred: bits & 0x04 != 0,
        slaac: bits & 0x08 != 0,
        dhcp: bits & 0x10 != 0,
        default_route: bits & 0x20 != 0,
        on_mesh: bits & 0x40 != 0,
        ..Default::default()
    }
}

fn route_config(bits: u8) -> ExternalRouteConfig {
    ExternalRouteConfig {
        preference: RoutePreference::from_2bit(bits & 0x3),
        nat64: bits & 0x04 != 0,
        adv_pio: bits & 0x08 != 0,
        ..Default::default()
    }
}

fn prefix_case() -> impl Strategy<Value = PrefixCase> {
    (
        any::<u16>(),
        prop_oneof![Just(16u8), Just(32), Just(48), Just(64)],
        any::<bool>(),
        proptest::collection::vec((any::<u16>(), any::<u8>()), 0..3),
        proptest::collection::vec((any::<u16>(), any::<u8>()), 0..3),
    )
        .prop_map(|(seed, length, stable, brs, routes)| {
            let mut case = PrefixCase {
                seed,
                length,
                stable,
                border_routers: Vec::new(),
                routes: Vec::new(),
            };
            for (rloc16, bits) in brs {
                // One entry per RLOC16 within a prefix.
                if case.border_routers.iter().all(|(r, _)| *r != rloc16) {
                    case.border_routers.push((rloc16, on_mesh_config(bits)));
                }
            }
            for (rloc16, bits) in routes {
                case.routes.push((rloc16, route_config(bits)));
            }
            case
        })
}

fn build_image(cases: &[PrefixCase]) -> Vec<u8> {
    let mut builder = NetworkDataBuilder::new();

    for case in cases {
        builder = builder.prefix(0, prefix_of(case), case.stable, |p| {
            if !case.border_routers.is_empty() {
                let entries: Vec<(u16, u16)> = case
                    .border_routers
                    .iter()
                    .map(|(rloc16, config)| (*rloc16, border_router_flags(config)))
                    .collect();
                p.border_router(case.stable, &entries);
            }
            if !case.routes.is_empty() {
                let entries: Vec<(u16, u8)> = case
                    .routes
                    .iter()
                    .map(|(rloc16, config)| (*rloc16, has_route_flags(config)))
                    .collect();
                p.has_route(case.stable, &entries);
            }
        });
    }

    builder.build()
}

fn fits_image(cases: &[PrefixCase]) -> bool {
    build_image(cases).len() <= 254
}

proptest! {
    /// Emit then decode: every border-router and route entry comes
    /// back exactly once, in buffer order, with its flags intact.
    #[test]
    fn iterators_visit_every_entry_once(
        cases in proptest::collection::vec(prefix_case(), 0..5).prop_filter("image fits", |s| fits_image(s))
    ) {
        let mut netdata = NetworkData::new();
        netdata.populate(&build_image(&cases)).unwrap();

        let mut expected_prefixes = Vec::new();
        let mut expected_routes = Vec::new();
        for case in &cases {
            for (rloc16, config) in &case.border_routers {
                if config.on_mesh {
                    let mut config = config.clone();
                    config.prefix = prefix_of(case);
                    config.rloc16 = *rloc16;
                    config.stable = case.stable;
                    expected_prefixes.push(config);
                }
            }
            for (rloc16, config) in &case.routes {
                let mut config = config.clone();
                config.prefix = prefix_of(case);
                config.rloc16 = *rloc16;
                config.stable = case.stable;
                expected_routes.push(config);
            }
        }

        let mut iter = NetDataIterator::new();
        let mut seen_prefixes = Vec::new();
        while let Ok(config) = netdata.next_on_mesh_prefix(&mut iter) {
            seen_prefixes.push(config);
        }
        prop_assert_eq!(seen_prefixes, expected_prefixes);

        let mut iter = NetDataIterator::new();
        let mut seen_routes = Vec::new();
        while let Ok(config) = netdata.next_external_route(&mut iter) {
            seen_routes.push(config);
        }
        prop_assert_eq!(seen_routes, expected_routes);
    }

    /// `find_rlocs` is idempotent and the role filters partition it.
    #[test]
    fn rloc_enumeration_is_idempotent_and_partitions(
        cases in proptest::collection::vec(prefix_case(), 0..5).prop_filter("image fits", |s| fits_image(s))
    ) {
        let mut netdata = NetworkData::new();
        netdata.populate(&build_image(&cases)).unwrap();

        for filter in [BorderRouterFilter::AnyBrOrServer, BorderRouterFilter::BrProvidingExternalIpConn] {
            let first = netdata.find_rlocs(filter, RoleFilter::Any);
            let second = netdata.find_rlocs(filter, RoleFilter::Any);
            prop_assert_eq!(&first, &second);

            let routers = netdata.find_rlocs(filter, RoleFilter::RouterOnly);
            let children = netdata.find_rlocs(filter, RoleFilter::ChildOnly);

            prop_assert_eq!(first.len(), routers.len() + children.len());
            for rloc in routers.iter() {
                prop_assert!(first.contains(rloc));
                prop_assert!(!children.contains(rloc));
            }
            for rloc in children.iter() {
                prop_assert!(first.contains(rloc));
            }
        }
    }

    /// The stable view is a pure filter: applying it twice changes
    /// nothing, and a fully stable image passes through untouched.
    #[test]
    fn stable_filter_is_pure(
        cases in proptest::collection::vec(prefix_case(), 0..5).prop_filter("image fits", |s| fits_image(s))
    ) {
        let image = build_image(&cases);
        let mut netdata = NetworkData::new();
        netdata.populate(&image).unwrap();

        let stable = netdata.stable_bytes();
        let mut filtered = NetworkData::new();
        filtered.populate(&stable).unwrap();
        prop_assert_eq!(filtered.stable_bytes(), stable.clone());

        if cases.iter().all(|case| case.stable) {
            prop_assert_eq!(stable, image);
        }
    }

    /// Anycast preference selection is total and deterministic for
    /// any sequence-number multiset.
    #[test]
    fn anycast_preference_is_total(
        entries in proptest::collection::vec((any::<u8>(), any::<u8>()), 1..8)
    ) {
        let mut image = Vec::new();
        for (index, (sequence, version)) in entries.iter().enumerate() {
            image.extend_from_slice(&[
                0x0b, 0x09,
                0x80 | (index as u8 & 0x0f), 0x02, 0x5c, *sequence,
                0x0d, 0x03,
            ]);
            image.extend_from_slice(&(0x5000_u16 + index as u16).to_be_bytes());
            image.push(*version);
        }

        let mut netdata = NetworkData::new();
        netdata.populate(&image).unwrap();
        let mesh_local = MeshLocalPrefix::new([0xfd, 0, 0, 0, 0, 0, 0, 0]);

        let first = find_preferred_dns_srp_anycast_info(&netdata, mesh_local).unwrap();
        let second = find_preferred_dns_srp_anycast_info(&netdata, mesh_local).unwrap();
        prop_assert_eq!(first, second);

        prop_assert!(entries.iter().any(|(sequence, _)| *sequence == first.sequence_number));
    }

    /// No query panics on arbitrary corruption of a valid image.
    #[test]
    fn corrupted_images_never_panic_queries(
        cases in proptest::collection::vec(prefix_case(), 1..4).prop_filter("image fits", |s| fits_image(s)),
        flips in proptest::collection::vec((any::<u16>(), 0u8..8), 1..6)
    ) {
        let mut image = build_image(&cases);
        if image.is_empty() {
            return Ok(());
        }
        for (position, bit) in flips {
            let at = usize::from(position) % image.len();
            image[at] ^= 1 << bit;
        }

        let mut netdata = NetworkData::new();
        netdata.populate(&image).unwrap();

        let mut iter = NetDataIterator::new();
        while netdata.next_on_mesh_prefix(&mut iter).is_ok() {}
        let mut iter = NetDataIterator::new();
        while netdata.next_external_route(&mut iter).is_ok() {}
        let mut iter = NetDataIterator::new();
        while netdata.next_service(&mut iter).is_ok() {}
        let mut iter = NetDataIterator::new();
        while netdata.next_lowpan_context(&mut iter).is_ok() {}

        let _ = netdata.find_rlocs(BorderRouterFilter::AnyBrOrServer, RoleFilter::Any);
        let _ = netdata.stable_bytes();
    }
}
