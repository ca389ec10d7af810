// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Single-writer store of the partition's Network Data byte image.
// Author: Lukas Bower

//! Network Data store. Every node caches the partition's TLV image;
//! only the Leader mutates it in place, other roles replace it
//! wholesale from MLE. Readers go through the query engine in [`iter`]
//! and the DNS/SRP resolver in [`service`].

pub mod iter;
pub mod service;

use heapless::Vec as BoundedVec;
use log::debug;

use netdata_codec::{
    CodecError, PrefixTlv, ServiceTlv, Tlv, TlvIter, TlvType, NETWORK_DATA_MAX_SIZE,
};

use crate::notifier::{Event, Notifier};

/// Child identifier bits of an RLOC16.
const CHILD_ID_MASK: u16 = 0x01ff;

/// Whether an RLOC16 addresses a router (child identifier bits zero).
#[must_use]
pub fn rloc16_is_router(rloc16: u16) -> bool {
    rloc16 & CHILD_ID_MASK == 0
}

/// Invariants checked when the image mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    /// A stable container TLV carries a non-stable sub-TLV.
    StableContainment,
    /// Two Border Router entries under one Prefix TLV share an RLOC16.
    DuplicateBorderRouterRloc,
    /// One service key maps to two different service identifiers.
    ConflictingServiceId,
}

/// Failures rejected by a store mutation; the old image is retained.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum NetDataError {
    /// The buffer does not parse as a TLV sequence.
    #[error("network data parse failure: {0}")]
    Parse(#[from] CodecError),
    /// The buffer exceeds the wire limit.
    #[error("network data exceeds {NETWORK_DATA_MAX_SIZE} bytes")]
    TooLarge,
    /// A structural invariant does not hold.
    #[error("network data invariant violated: {0:?}")]
    InvariantViolation(Invariant),
}

/// The partition's Network Data image plus version bookkeeping.
#[derive(Debug, Default)]
pub struct NetworkData {
    bytes: BoundedVec<u8, NETWORK_DATA_MAX_SIZE>,
    version: u8,
    stable_version: u8,
    max_length: u8,
    local_rloc16: Option<u16>,
}

impl NetworkData {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw TLV image.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Current image length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the image is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The Network Data version, bumped on every mutation.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// The stable Network Data version, bumped when the stable subset
    /// changes.
    #[must_use]
    pub fn stable_version(&self) -> u8 {
        self.stable_version
    }

    /// High-water mark of the image length since creation or the last
    /// [`Self::reset_max_length`].
    #[must_use]
    pub fn max_length(&self) -> u8 {
        self.max_length
    }

    /// Reset the length high-water mark to the current length.
    pub fn reset_max_length(&mut self) {
        self.max_length = self.bytes.len() as u8;
    }

    /// Record this device's RLOC16 so route queries can mark routes it
    /// publishes itself.
    pub fn set_local_rloc16(&mut self, rloc16: u16) {
        self.local_rloc16 = Some(rloc16);
    }

    /// This device's RLOC16, when known.
    #[must_use]
    pub fn local_rloc16(&self) -> Option<u16> {
        self.local_rloc16
    }

    /// Atomically replace the image after full validation; the previous
    /// image is retained on failure. Signals change events.
    pub fn replace(&mut self, bytes: &[u8], notifier: &mut Notifier) -> Result<(), NetDataError> {
        validate(bytes)?;
        self.install(bytes, notifier)
    }

    /// Truncate the image to `length` bytes, re-validating the result.
    /// This is the Leader's prune step after an in-place merge.
    pub fn set_length(&mut self, length: usize, notifier: &mut Notifier) -> Result<(), NetDataError> {
        if length > self.bytes.len() {
            return Err(NetDataError::TooLarge);
        }

        let truncated: BoundedVec<u8, NETWORK_DATA_MAX_SIZE> =
            BoundedVec::from_slice(&self.bytes[..length]).map_err(|()| NetDataError::TooLarge)?;
        validate(&truncated)?;
        self.install(&truncated, notifier)
    }

    /// Install raw bytes without invariant validation, trusting the
    /// caller. Used by the Leader merge scratch path and tests; does
    /// not signal events or bump versions.
    pub fn populate(&mut self, bytes: &[u8]) -> Result<(), NetDataError> {
        self.bytes = BoundedVec::from_slice(bytes).map_err(|()| NetDataError::TooLarge)?;
        self.max_length = self.max_length.max(self.bytes.len() as u8);
        Ok(())
    }

    fn install(&mut self, bytes: &[u8], notifier: &mut Notifier) -> Result<(), NetDataError> {
        let old_stable = self.stable_bytes();

        self.bytes = BoundedVec::from_slice(bytes).map_err(|()| NetDataError::TooLarge)?;
        self.max_length = self.max_length.max(self.bytes.len() as u8);
        self.version = self.version.wrapping_add(1);
        notifier.signal(Event::NetworkDataChanged);

        if self.stable_bytes() != old_stable {
            self.stable_version = self.stable_version.wrapping_add(1);
            notifier.signal(Event::StableNetworkDataChanged);
        }

        debug!(
            "network data replaced: {} bytes, version {}, stable version {}",
            self.bytes.len(),
            self.version,
            self.stable_version
        );

        Ok(())
    }

    /// Copy of the stable subset: non-stable TLVs and sub-TLVs are
    /// filtered out, container lengths recomputed.
    #[must_use]
    pub fn stable_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len());

        for tlv in TlvIter::new(&self.bytes).flatten() {
            if !tlv.stable {
                continue;
            }

            match tlv.kind() {
                Some(TlvType::Prefix) => {
                    if let Ok(prefix) = PrefixTlv::parse(&tlv) {
                        copy_container_stable(&mut out, &tlv, prefix.sub_bytes());
                    }
                }
                Some(TlvType::Service) => {
                    if let Ok(service) = ServiceTlv::parse(&tlv) {
                        copy_container_stable(&mut out, &tlv, service.sub_bytes());
                    }
                }
                _ => {
                    out.push((tlv.raw_type << 1) | 0x01);
                    out.push(tlv.value.len() as u8);
                    out.extend_from_slice(tlv.value);
                }
            }
        }

        out
    }
}

/// Re-emit a stable container keeping only its stable sub-TLVs; the
/// fixed value head before the sub-TLV region is copied verbatim.
fn copy_container_stable(out: &mut Vec<u8>, tlv: &Tlv<'_>, sub_bytes: &[u8]) {
    let header_at = out.len();
    out.push((tlv.raw_type << 1) | 0x01);
    out.push(0);

    let head_len = tlv.value.len() - sub_bytes.len();
    out.extend_from_slice(&tlv.value[..head_len]);

    for sub in TlvIter::new(sub_bytes).flatten() {
        if sub.stable {
            out.extend_from_slice(&sub_bytes[sub.offset..sub.end_offset()]);
        }
    }

    let length = out.len() - header_at - 2;
    out[header_at + 1] = length as u8;
}

/// Validate a candidate image against the §3 invariants.
fn validate(bytes: &[u8]) -> Result<(), NetDataError> {
    if bytes.len() > NETWORK_DATA_MAX_SIZE {
        return Err(NetDataError::TooLarge);
    }

    let mut service_keys: Vec<(u32, Vec<u8>, u8)> = Vec::new();

    for tlv in TlvIter::new(bytes) {
        let tlv = tlv?;

        match tlv.kind() {
            Some(TlvType::Prefix) => {
                let prefix = PrefixTlv::parse(&tlv)?;
                let mut rlocs: Vec<u16> = Vec::new();

                for sub in prefix.sub_tlvs() {
                    let sub = sub?;

                    if tlv.stable && !sub.stable {
                        return Err(NetDataError::InvariantViolation(
                            Invariant::StableContainment,
                        ));
                    }

                    if sub.kind() == Some(TlvType::BorderRouter) {
                        for entry in netdata_codec::BorderRouterEntry::iter(sub.value) {
                            if rlocs.contains(&entry.rloc16) {
                                return Err(NetDataError::InvariantViolation(
                                    Invariant::DuplicateBorderRouterRloc,
                                ));
                            }
                            rlocs.push(entry.rloc16);
                        }
                    }
                }
            }
            Some(TlvType::Service) => {
                let service = ServiceTlv::parse(&tlv)?;

                for sub in service.sub_tlvs() {
                    let sub = sub?;
                    if tlv.stable && !sub.stable {
                        return Err(NetDataError::InvariantViolation(
                            Invariant::StableContainment,
                        ));
                    }
                }

                let key = (service.enterprise_number, service.service_data.to_vec());
                match service_keys
                    .iter()
                    .find(|(number, data, _)| *number == key.0 && data == &key.1)
                {
                    Some((_, _, id)) if *id != service.service_id => {
                        return Err(NetDataError::InvariantViolation(
                            Invariant::ConflictingServiceId,
                        ));
                    }
                    Some(_) => {}
                    None => service_keys.push((key.0, key.1, service.service_id)),
                }
            }
            _ => {}
        }
    }

    Ok(())
}
