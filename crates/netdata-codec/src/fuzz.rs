// Author: Lukas Bower
// Purpose: Exhaustive walk helper backing the decoder fuzz tests.

//! Fuzzing entry point used by integration tests.

use crate::tlv::{PrefixTlv, ServiceTlv, TlvIter, TlvType};

/// Walk `bytes` as a Network Data image, descending into every known
/// container, and return the number of TLVs visited. Never panics on
/// arbitrary input; malformed regions terminate their walk level.
#[must_use]
pub fn fuzz_walk(bytes: &[u8]) -> usize {
    let mut visited = 0;

    for tlv in TlvIter::new(bytes).flatten() {
        visited += 1;

        match tlv.kind() {
            Some(TlvType::Prefix) => {
                if let Ok(prefix) = PrefixTlv::parse(&tlv) {
                    visited += prefix.sub_tlvs().flatten().count();
                }
            }
            Some(TlvType::Service) => {
                if let Ok(service) = ServiceTlv::parse(&tlv) {
                    visited += service.sub_tlvs().flatten().count();
                }
            }
            _ => {}
        }
    }

    visited
}
