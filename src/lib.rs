// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Thread mesh Network Data, indirect transmission and DHCPv6 stack.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Thread mesh networking subsystems for constrained 802.15.4 devices:
//! the partition's TLV-encoded Network Data with its query engine and
//! DNS/SRP service resolver, the parent-side indirect transmission
//! scheduler for sleepy children, and a Trickle-driven DHCPv6 client.
//!
//! Everything runs on a single-threaded cooperative event loop; the
//! MAC/radio driver, IPv6 forwarder and UDP plumbing are external
//! collaborators reached through the [`platform`] traits.

/// Child table with per-child indirect transmission state.
pub mod child;
/// DHCPv6 client and its wire codec.
pub mod dhcp6;
/// Shared error vocabulary.
pub mod error;
/// Indirect transmission scheduler.
pub mod indirect;
/// Mesh-local IPv6 addressing helpers.
pub mod ip6;
/// Forwarder send queue and per-message child masks.
pub mod message;
/// Network Data store, query engine and DNS/SRP resolver.
pub mod netdata;
/// Change notifier.
pub mod notifier;
/// Host API traits (radio, netif, UDP, MAC).
pub mod platform;
/// Stack facade tying the subsystems to one event loop.
pub mod stack;
/// RFC 6206 Trickle timer.
pub mod trickle;

pub use error::Error;
pub use stack::Stack;

pub use netdata_codec as codec;
