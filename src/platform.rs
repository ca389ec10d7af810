// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Trait seams to the radio, Thread netif, UDP and MAC collaborators.
// Author: Lukas Bower

//! Host API consumed by the stack. The 802.15.4 MAC/radio driver, the
//! IPv6 forwarder and the UDP plumbing are external collaborators; the
//! stack reaches them only through these traits, and tests substitute
//! recording mocks.

use core::fmt;
use core::net::Ipv6Addr;

use crate::child::ChildIndex;
use crate::error::Error;

/// Radio identity surface.
pub trait Radio {
    /// The factory-assigned IEEE EUI-64 of this device.
    fn ieee_eui64(&self) -> [u8; 8];
}

/// A unicast address installed on the Thread network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetifAddress {
    /// The IPv6 address.
    pub address: Ipv6Addr,
    /// Prefix length the address was configured from.
    pub prefix_length: u8,
    /// Whether the address is preferred (preferred lifetime nonzero).
    pub preferred: bool,
    /// Whether the address is valid (valid lifetime nonzero).
    pub valid: bool,
}

/// Thread network interface address management.
pub trait ThreadNetif {
    /// Install a unicast address.
    fn add_unicast_address(&mut self, address: NetifAddress);
    /// Remove a previously installed unicast address.
    fn remove_unicast_address(&mut self, address: Ipv6Addr);
}

/// Peer and local addressing for one UDP datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    /// Remote address.
    pub peer_addr: Ipv6Addr,
    /// Remote port.
    pub peer_port: u16,
    /// Local address.
    pub sock_addr: Ipv6Addr,
    /// Local port.
    pub sock_port: u16,
}

/// Minimal UDP socket surface used by the DHCPv6 client.
pub trait UdpTransport {
    /// Open and bind the socket to `port`.
    fn open(&mut self, port: u16) -> Result<(), Error>;
    /// Send one datagram.
    fn send_to(&mut self, payload: &[u8], info: &MessageInfo) -> Result<(), Error>;
    /// Close the socket.
    fn close(&mut self) -> Result<(), Error>;
}

/// A MAC address, short or extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAddress {
    /// 16-bit short address (RLOC16).
    Short(u16),
    /// 64-bit extended address.
    Extended([u8; 8]),
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short(addr) => write!(f, "{addr:04x}"),
            Self::Extended(addr) => {
                for byte in addr {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Frame-change request kinds sent to the MAC data-poll scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameChange {
    /// Discard the prepared frame for the child.
    Purge,
    /// Replace the prepared frame with a newly selected message.
    Replace,
}

/// MAC data-poll scheduler surface. Requests are asynchronous; the MAC
/// answers through `IndirectSender::handle_frame_change_done`.
pub trait MacScheduler {
    /// Ask the MAC to purge or replace the frame prepared for a child.
    fn request_frame_change(&mut self, change: FrameChange, child: ChildIndex);
}

/// Radio source-address-match table, consulted by the MAC when acking
/// data polls to decide the Frame Pending bit.
pub trait SourceMatcher {
    /// Add an address with pending frames.
    fn add_entry(&mut self, address: MacAddress);
    /// Remove an address with no remaining pending frames.
    fn clear_entry(&mut self, address: MacAddress);
}

/// Platform entropy source (radio TRNG or host RNG).
pub trait Entropy {
    /// A uniformly random 32-bit value.
    fn rand_u32(&mut self) -> u32;
}

/// Convenience bound implemented by any type providing the full host
/// API; the stack facade and tests use a single such object.
pub trait Platform:
    Radio + ThreadNetif + UdpTransport + MacScheduler + SourceMatcher + Entropy
{
}

impl<T> Platform for T where
    T: Radio + ThreadNetif + UdpTransport + MacScheduler + SourceMatcher + Entropy
{
}
