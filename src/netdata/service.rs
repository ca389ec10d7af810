// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: DNS/SRP anycast and unicast service discovery over Network Data.
// Author: Lukas Bower

//! Resolver for the Thread-assigned DNS/SRP services: anycast entries
//! (service number 0x5c) carrying a sequence number and optional
//! version, and unicast entries (0x5d) carrying a socket address in
//! either the service data or the server data.

use core::net::Ipv6Addr;

use netdata_codec::{
    ServerTlv, ServiceTlv, TlvIter, TlvType, ALOC16_SERVICE_START, SERVICE_DNS_SRP_ANYCAST,
    SERVICE_DNS_SRP_UNICAST, THREAD_ENTERPRISE_NUMBER,
};

use crate::error::Error;
use crate::ip6::{MeshLocalPrefix, SockAddr};
use crate::netdata::NetworkData;

/// One DNS/SRP Anycast service entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsSrpAnycastInfo {
    /// The service anycast address (mesh-local ALOC).
    pub anycast_address: Ipv6Addr,
    /// Sequence number of the entry.
    pub sequence_number: u8,
    /// Version, zero when the server advertises none.
    pub version: u8,
    /// RLOC16 of the server.
    pub rloc16: u16,
}

/// One DNS/SRP Unicast service entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsSrpUnicastInfo {
    /// Socket address of the DNS/SRP server.
    pub sock_addr: SockAddr,
    /// Version, zero when the server advertises none.
    pub version: u8,
    /// RLOC16 of the server.
    pub rloc16: u16,
}

/// Where a unicast entry encodes its socket address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsSrpUnicastOrigin {
    /// Address and port in the service data; one entry per server.
    ServiceData,
    /// Address and port in each Server sub-TLV's server data.
    ServerData,
}

/// Whether sequence number `a` is ahead of `b` on the 0..=255 circle
/// (strictly within the nearer half, excluding equality and the
/// antipode).
#[must_use]
pub fn is_sequence_number_ahead(a: u8, b: u8) -> bool {
    let diff = a.wrapping_sub(b);
    (1..=127).contains(&diff)
}

const ADDR_PORT_LEN: usize = 18;

/// Iterator over the DNS/SRP service entries of a Network Data
/// snapshot.
#[derive(Debug, Clone)]
pub struct ServiceIterator<'a> {
    netdata: &'a NetworkData,
    mesh_local: MeshLocalPrefix,
    tlv_offset: usize,
    sub_offset: usize,
}

impl<'a> ServiceIterator<'a> {
    /// Start iterating `netdata`; locator addresses are derived from
    /// the partition's mesh-local prefix.
    #[must_use]
    pub fn new(netdata: &'a NetworkData, mesh_local: MeshLocalPrefix) -> Self {
        Self {
            netdata,
            mesh_local,
            tlv_offset: 0,
            sub_offset: 0,
        }
    }

    /// Rewind to the first entry.
    pub fn reset(&mut self) {
        self.tlv_offset = 0;
        self.sub_offset = 0;
    }

    /// Next anycast entry, one per Server sub-TLV, in buffer order.
    pub fn next_dns_srp_anycast_info(&mut self) -> Result<DnsSrpAnycastInfo, Error> {
        self.next_entry(|service, server, mesh_local| {
            let data = service.service_data;
            if data.len() < 2 || data[0] != SERVICE_DNS_SRP_ANYCAST {
                return None;
            }

            Some(DnsSrpAnycastInfo {
                anycast_address: mesh_local
                    .locator(ALOC16_SERVICE_START + u16::from(service.service_id)),
                sequence_number: data[1],
                version: server.server_data.first().copied().unwrap_or(0),
                rloc16: server.rloc16,
            })
        })
    }

    /// Next unicast entry of the given origin, in buffer order.
    pub fn next_dns_srp_unicast_info(
        &mut self,
        origin: DnsSrpUnicastOrigin,
    ) -> Result<DnsSrpUnicastInfo, Error> {
        self.next_entry(|service, server, mesh_local| {
            let data = service.service_data;
            if data.first() != Some(&SERVICE_DNS_SRP_UNICAST) {
                return None;
            }

            match origin {
                DnsSrpUnicastOrigin::ServiceData => {
                    if data.len() < 1 + ADDR_PORT_LEN {
                        return None;
                    }

                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(&data[1..17]);

                    Some(DnsSrpUnicastInfo {
                        sock_addr: SockAddr {
                            addr: Ipv6Addr::from(octets),
                            port: u16::from_be_bytes([data[17], data[18]]),
                        },
                        version: data.get(19).copied().unwrap_or(0),
                        rloc16: server.rloc16,
                    })
                }
                DnsSrpUnicastOrigin::ServerData => {
                    let data = server.server_data;

                    if data.len() >= ADDR_PORT_LEN {
                        let mut octets = [0u8; 16];
                        octets.copy_from_slice(&data[..16]);

                        Some(DnsSrpUnicastInfo {
                            sock_addr: SockAddr {
                                addr: Ipv6Addr::from(octets),
                                port: u16::from_be_bytes([data[16], data[17]]),
                            },
                            version: data.get(18).copied().unwrap_or(0),
                            rloc16: server.rloc16,
                        })
                    } else if data.len() == 2 {
                        // Port-only form; the address is the server's
                        // routing locator.
                        Some(DnsSrpUnicastInfo {
                            sock_addr: SockAddr {
                                addr: mesh_local.locator(server.rloc16),
                                port: u16::from_be_bytes([data[0], data[1]]),
                            },
                            version: 0,
                            rloc16: server.rloc16,
                        })
                    } else {
                        None
                    }
                }
            }
        })
    }

    /// Walk Thread-enterprise Service TLVs and their Server sub-TLVs,
    /// returning the first entry `decode` accepts and remembering the
    /// position after it.
    fn next_entry<T>(
        &mut self,
        decode: impl Fn(&ServiceTlv<'_>, &ServerTlv<'_>, &MeshLocalPrefix) -> Option<T>,
    ) -> Result<T, Error> {
        let buf = self.netdata.bytes();

        loop {
            let tlv = match TlvIter::from_offset(buf, self.tlv_offset).next() {
                Some(Ok(tlv)) => tlv,
                _ => return Err(Error::NotFound),
            };

            if tlv.kind() == Some(TlvType::Service) {
                if let Ok(service) = ServiceTlv::parse(&tlv) {
                    if service.enterprise_number == THREAD_ENTERPRISE_NUMBER {
                        let subs = service.sub_bytes();
                        let base = tlv.offset + 2 + (tlv.value.len() - subs.len());
                        let resume = self.sub_offset.saturating_sub(base);

                        let mut sub_iter = TlvIter::from_offset(subs, resume);
                        while let Some(Ok(sub)) = sub_iter.next() {
                            self.sub_offset = base + sub.end_offset();

                            if sub.kind() != Some(TlvType::Server) {
                                continue;
                            }
                            let Ok(server) = ServerTlv::parse(&sub) else {
                                continue;
                            };
                            if let Some(entry) = decode(&service, &server, &self.mesh_local) {
                                return Ok(entry);
                            }
                        }
                    }
                }
            }

            self.tlv_offset = tlv.end_offset();
            self.sub_offset = 0;
        }
    }
}

/// Select the preferred anycast entry.
///
/// Candidates no other candidate's sequence number is ahead of win.
/// Sequence numbers the "is ahead of" relation cannot order — a cyclic
/// relation that eliminates everyone, or antipodal survivors exactly
/// 128 apart — are resolved by numeric comparison instead. Remaining
/// ties prefer the highest version, then the smallest RLOC16.
pub fn find_preferred_dns_srp_anycast_info(
    netdata: &NetworkData,
    mesh_local: MeshLocalPrefix,
) -> Result<DnsSrpAnycastInfo, Error> {
    let mut entries: Vec<DnsSrpAnycastInfo> = Vec::new();
    let mut iterator = ServiceIterator::new(netdata, mesh_local);

    while let Ok(info) = iterator.next_dns_srp_anycast_info() {
        entries.push(info);
    }

    if entries.is_empty() {
        return Err(Error::NotFound);
    }

    let mut candidates: Vec<&DnsSrpAnycastInfo> = entries
        .iter()
        .filter(|entry| {
            !entries
                .iter()
                .any(|other| is_sequence_number_ahead(other.sequence_number, entry.sequence_number))
        })
        .collect();

    if candidates.is_empty() {
        // The relation is cyclic and no entry leads.
        candidates = entries.iter().collect();
    }

    // Distinct sequence numbers survive together only as antipodes
    // (neither is ahead of the other); the numerically larger one
    // wins, matching the cyclic fallback.
    let max_seq = candidates
        .iter()
        .map(|entry| entry.sequence_number)
        .max()
        .unwrap_or(0);
    candidates.retain(|entry| entry.sequence_number == max_seq);

    let preferred = candidates
        .iter()
        .copied()
        .min_by(|a, b| {
            b.version
                .cmp(&a.version)
                .then_with(|| a.rloc16.cmp(&b.rloc16))
        })
        .ok_or(Error::NotFound)?;

    Ok(*preferred)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_ahead_excludes_equality_and_antipode() {
        assert!(is_sequence_number_ahead(2, 1));
        assert!(is_sequence_number_ahead(2, 255));
        assert!(!is_sequence_number_ahead(1, 2));
        assert!(!is_sequence_number_ahead(5, 5));
        // Distance exactly 128 is not comparable in either direction.
        assert!(!is_sequence_number_ahead(129, 1));
        assert!(!is_sequence_number_ahead(1, 129));
    }
}
