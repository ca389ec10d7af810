// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide Thread Network Data TLV wire types and codec primitives.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

//! Thread Network Data wire types and codec primitives shared across the
//! `threadnet` crates. The binary format is a sequence of two-byte-header
//! TLVs with nested sub-TLVs and a per-TLV stable bit; see the `tlv`
//! module for the walker and the `build` module for emission.

extern crate alloc;

#[cfg(test)]
extern crate std;

mod build;
mod fuzz;
mod tlv;
mod types;

pub use build::{
    border_router_flags, has_route_flags, NetworkDataBuilder, PrefixBuilder, ServiceBuilder,
};
pub use fuzz::fuzz_walk;
pub use tlv::{
    read_header, BorderRouterEntry, BorderRouterFlags, ContextTlv, HasRouteEntry, HasRouteFlags,
    PrefixTlv, ServerTlv, ServiceTlv, SubTlvIter, Tlv, TlvHeader, TlvIter, TlvType,
};
pub use types::*;
