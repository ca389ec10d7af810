// Author: Lukas Bower
// Purpose: Recording mock of the host platform shared by integration tests.
#![allow(dead_code)]

use std::net::Ipv6Addr;

use threadnet::child::ChildIndex;
use threadnet::error::Error;
use threadnet::platform::{
    Entropy, FrameChange, MacAddress, MacScheduler, MessageInfo, NetifAddress, Radio,
    SourceMatcher, ThreadNetif, UdpTransport,
};

/// Records every platform interaction for later assertions.
pub struct MockPlatform {
    pub eui64: [u8; 8],
    pub added_addresses: Vec<NetifAddress>,
    pub removed_addresses: Vec<Ipv6Addr>,
    pub sent: Vec<(Vec<u8>, MessageInfo)>,
    pub open_port: Option<u16>,
    pub frame_changes: Vec<(FrameChange, ChildIndex)>,
    pub src_match_entries: Vec<MacAddress>,
    rng_state: u32,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            eui64: [0x18, 0xb4, 0x30, 0x00, 0x00, 0x00, 0x12, 0x34],
            added_addresses: Vec::new(),
            removed_addresses: Vec::new(),
            sent: Vec::new(),
            open_port: None,
            frame_changes: Vec::new(),
            src_match_entries: Vec::new(),
            rng_state: 0x1357_9bdf,
        }
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Radio for MockPlatform {
    fn ieee_eui64(&self) -> [u8; 8] {
        self.eui64
    }
}

impl ThreadNetif for MockPlatform {
    fn add_unicast_address(&mut self, address: NetifAddress) {
        self.added_addresses.push(address);
    }

    fn remove_unicast_address(&mut self, address: Ipv6Addr) {
        self.removed_addresses.push(address);
    }
}

impl UdpTransport for MockPlatform {
    fn open(&mut self, port: u16) -> Result<(), Error> {
        self.open_port = Some(port);
        Ok(())
    }

    fn send_to(&mut self, payload: &[u8], info: &MessageInfo) -> Result<(), Error> {
        self.sent.push((payload.to_vec(), *info));
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.open_port = None;
        Ok(())
    }
}

impl MacScheduler for MockPlatform {
    fn request_frame_change(&mut self, change: FrameChange, child: ChildIndex) {
        self.frame_changes.push((change, child));
    }
}

impl SourceMatcher for MockPlatform {
    fn add_entry(&mut self, address: MacAddress) {
        self.src_match_entries.push(address);
    }

    fn clear_entry(&mut self, address: MacAddress) {
        self.src_match_entries.retain(|entry| *entry != address);
    }
}

impl Entropy for MockPlatform {
    fn rand_u32(&mut self) -> u32 {
        // Xorshift; deterministic so test schedules are reproducible.
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        x
    }
}
