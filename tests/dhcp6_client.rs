// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Drive the DHCPv6 client against a recording mock platform.
// Author: Lukas Bower

//! DHCPv6 client tests: solicitation driven from Network Data change,
//! rapid-commit reply processing, reply validation and address
//! teardown when the prefix leaves the store.

mod common;

use common::MockPlatform;

use std::net::Ipv6Addr;

use threadnet::codec::{BorderRouterFlags, Ip6Prefix, NetworkDataBuilder};
use threadnet::dhcp6::wire::{
    self, Header, MsgType, OptionCode, TransactionId, DHCP6_CLIENT_PORT, DHCP6_SERVER_PORT,
    DUID_TYPE_LL, HARDWARE_TYPE_EUI64,
};
use threadnet::dhcp6::IaStatus;
use threadnet::ip6::MeshLocalPrefix;
use threadnet::platform::MessageInfo;
use threadnet::Stack;

fn mesh_local() -> MeshLocalPrefix {
    MeshLocalPrefix::new([0xfd, 0xde, 0xad, 0x00, 0xbe, 0xef, 0x00, 0x00])
}

fn dhcp_flags() -> u16 {
    BorderRouterFlags::DHCP | BorderRouterFlags::ON_MESH
}

fn dhcp_image(prefix: &str, agent_rloc16: u16) -> Vec<u8> {
    NetworkDataBuilder::new()
        .prefix(0, Ip6Prefix::new(prefix.parse().unwrap(), 64), false, |p| {
            p.border_router(false, &[(agent_rloc16, dhcp_flags())]);
        })
        .build()
}

/// Fire the next scheduled trickle event and return the transmitted
/// solicit payload.
fn fire_solicit(stack: &mut Stack, plat: &mut MockPlatform) -> (Vec<u8>, MessageInfo) {
    let at = stack.next_wakeup().expect("trickle not running");
    let sent_before = plat.sent.len();
    stack.handle_timer(at, plat);
    assert_eq!(plat.sent.len(), sent_before + 1, "no solicit transmitted");
    plat.sent.last().cloned().unwrap()
}

fn append_server_id(buf: &mut Vec<u8>, server_eui64: &[u8; 8]) {
    buf.extend_from_slice(&(OptionCode::ServerId as u16).to_be_bytes());
    buf.extend_from_slice(&12u16.to_be_bytes());
    buf.extend_from_slice(&DUID_TYPE_LL.to_be_bytes());
    buf.extend_from_slice(&HARDWARE_TYPE_EUI64.to_be_bytes());
    buf.extend_from_slice(server_eui64);
}

struct ReplyBuilder {
    transaction_id: TransactionId,
    client_eui64: [u8; 8],
    rapid_commit: bool,
    address: Ipv6Addr,
    lifetimes: (u32, u32),
}

impl ReplyBuilder {
    fn new(transaction_id: TransactionId, client_eui64: [u8; 8]) -> Self {
        Self {
            transaction_id,
            client_eui64,
            rapid_commit: true,
            address: "fd00::abcd".parse().unwrap(),
            lifetimes: (1800, 1800),
        }
    }

    fn build(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        wire::append_header(&mut buf, MsgType::Reply, self.transaction_id);
        append_server_id(&mut buf, &[0xde; 8]);
        wire::append_client_id(&mut buf, &self.client_eui64);
        if self.rapid_commit {
            wire::append_rapid_commit(&mut buf);
        }
        wire::append_ia_na(&mut buf, 1);
        wire::append_ia_address(&mut buf, self.address, self.lifetimes.0, self.lifetimes.1);
        buf
    }
}

fn reply_info() -> MessageInfo {
    MessageInfo {
        peer_addr: mesh_local().locator(0x5000),
        peer_port: DHCP6_SERVER_PORT,
        sock_addr: mesh_local().locator(0x2400),
        sock_port: DHCP6_CLIENT_PORT,
    }
}

#[test]
fn solicit_reply_round_trip_installs_address() {
    let mut plat = MockPlatform::new();
    let mut stack = Stack::new(mesh_local());
    stack.set_local_rloc16(0x2400);

    stack
        .replace_network_data(&dhcp_image("fd00::", 0x5000), 0, &mut plat)
        .unwrap();

    // The client binds and starts soliciting for the new prefix.
    assert_eq!(plat.open_port, Some(DHCP6_CLIENT_PORT));
    assert_eq!(
        stack.dhcp6().identity_associations()[0].status(),
        IaStatus::Solicit
    );

    let (payload, info) = fire_solicit(&mut stack, &mut plat);
    assert_eq!(info.peer_addr, mesh_local().locator(0x5000));
    assert_eq!(info.peer_port, DHCP6_SERVER_PORT);
    assert_eq!(info.sock_port, DHCP6_CLIENT_PORT);

    let (header, options) = Header::parse(&payload).unwrap();
    assert_eq!(header.msg_type, MsgType::Solicit as u8);
    assert!(wire::find_option(options, OptionCode::ElapsedTime).is_some());
    assert!(wire::find_option(options, OptionCode::RapidCommit).is_some());

    let client_id = wire::find_option(options, OptionCode::ClientId).unwrap();
    let duid = wire::Duid::parse(client_id).unwrap();
    assert_eq!(duid.link_layer, &plat.eui64);

    let ia_na = wire::IaNa::parse(wire::find_option(options, OptionCode::IaNa).unwrap()).unwrap();
    assert_eq!(ia_na.iaid, 0);
    let solicited =
        wire::IaAddress::parse(wire::find_option(ia_na.options, OptionCode::IaAddress).unwrap())
            .unwrap();
    assert_eq!(solicited.address, "fd00::".parse::<Ipv6Addr>().unwrap());

    // Rapid-commit Reply assigns fd00::abcd.
    let reply = ReplyBuilder::new(header.transaction_id, plat.eui64).build();
    stack.handle_udp_receive(&reply, &reply_info(), 600, &mut plat);

    let ia = stack.dhcp6().identity_associations()[0];
    assert_eq!(ia.status(), IaStatus::SolicitReplied);
    assert_eq!(ia.address(), "fd00::abcd".parse::<Ipv6Addr>().unwrap());
    assert_eq!(ia.valid_lifetime(), 1800);
    assert_eq!(ia.preferred_lifetime(), 1800);

    assert_eq!(plat.added_addresses.len(), 1);
    let installed = plat.added_addresses[0];
    assert_eq!(installed.address, "fd00::abcd".parse::<Ipv6Addr>().unwrap());
    assert_eq!(installed.prefix_length, 64);
    assert!(installed.preferred);
    assert!(installed.valid);

    // Nothing left to solicit; the client closed its socket.
    assert!(!stack.dhcp6().is_running());
    assert_eq!(plat.open_port, None);
}

#[test]
fn invalid_replies_are_discarded() {
    let mut plat = MockPlatform::new();
    let mut stack = Stack::new(mesh_local());
    stack.set_local_rloc16(0x2400);
    stack
        .replace_network_data(&dhcp_image("fd00::", 0x5000), 0, &mut plat)
        .unwrap();

    let (payload, _) = fire_solicit(&mut stack, &mut plat);
    let (header, _) = Header::parse(&payload).unwrap();

    // Wrong transaction id.
    let mut wrong_xid = ReplyBuilder::new(header.transaction_id, plat.eui64);
    wrong_xid.transaction_id = TransactionId([0xff, 0xee, 0xdd]);
    stack.handle_udp_receive(&wrong_xid.build(), &reply_info(), 600, &mut plat);

    // Missing rapid commit.
    let mut no_rapid = ReplyBuilder::new(header.transaction_id, plat.eui64);
    no_rapid.rapid_commit = false;
    stack.handle_udp_receive(&no_rapid.build(), &reply_info(), 700, &mut plat);

    // Client id echoing someone else's EUI-64.
    let other_client = ReplyBuilder::new(header.transaction_id, [0x99; 8]);
    stack.handle_udp_receive(&other_client.build(), &reply_info(), 800, &mut plat);

    // Address outside the solicited prefix.
    let mut other_prefix = ReplyBuilder::new(header.transaction_id, plat.eui64);
    other_prefix.address = "fd11::1".parse().unwrap();
    stack.handle_udp_receive(&other_prefix.build(), &reply_info(), 900, &mut plat);

    assert!(plat.added_addresses.is_empty());
    assert_eq!(
        stack.dhcp6().identity_associations()[0].status(),
        IaStatus::Soliciting
    );
    assert!(stack.dhcp6().is_running(), "client keeps soliciting");
}

#[test]
fn prefix_withdrawal_removes_installed_address() {
    let mut plat = MockPlatform::new();
    let mut stack = Stack::new(mesh_local());
    stack.set_local_rloc16(0x2400);
    stack
        .replace_network_data(&dhcp_image("fd00::", 0x5000), 0, &mut plat)
        .unwrap();

    let (payload, _) = fire_solicit(&mut stack, &mut plat);
    let (header, _) = Header::parse(&payload).unwrap();
    let reply = ReplyBuilder::new(header.transaction_id, plat.eui64).build();
    stack.handle_udp_receive(&reply, &reply_info(), 600, &mut plat);
    assert_eq!(plat.added_addresses.len(), 1);

    // The prefix disappears from Network Data: address comes down.
    let without_dhcp = NetworkDataBuilder::new()
        .commissioning_data(&[0x36, 0xcc], false)
        .build();
    stack
        .replace_network_data(&without_dhcp, 1_000, &mut plat)
        .unwrap();

    assert_eq!(
        plat.removed_addresses,
        vec!["fd00::abcd".parse::<Ipv6Addr>().unwrap()]
    );
    assert_eq!(
        stack.dhcp6().identity_associations()[0].status(),
        IaStatus::Invalid
    );
    assert!(!stack.dhcp6().is_running());
}

#[test]
fn one_solicit_covers_all_prefixes_of_an_agent() {
    let mut plat = MockPlatform::new();
    let mut stack = Stack::new(mesh_local());
    stack.set_local_rloc16(0x2400);

    let image = NetworkDataBuilder::new()
        .prefix(0, Ip6Prefix::new("fd00:1::".parse().unwrap(), 64), false, |p| {
            p.border_router(false, &[(0x5000, dhcp_flags())]);
        })
        .prefix(0, Ip6Prefix::new("fd00:2::".parse().unwrap(), 64), false, |p| {
            p.border_router(false, &[(0x5000, dhcp_flags())]);
        })
        .build();

    stack.replace_network_data(&image, 0, &mut plat).unwrap();
    let (payload, _) = fire_solicit(&mut stack, &mut plat);

    let (_, options) = Header::parse(&payload).unwrap();
    let ia_na = wire::IaNa::parse(wire::find_option(options, OptionCode::IaNa).unwrap()).unwrap();

    let addresses: Vec<Ipv6Addr> = wire::OptionIter::new(ia_na.options)
        .filter(|(code, _)| *code == OptionCode::IaAddress as u16)
        .map(|(_, payload)| wire::IaAddress::parse(payload).unwrap().address)
        .collect();

    assert_eq!(
        addresses,
        vec![
            "fd00:1::".parse::<Ipv6Addr>().unwrap(),
            "fd00:2::".parse::<Ipv6Addr>().unwrap(),
        ]
    );
}

#[test]
fn repeated_solicits_back_off_with_trickle() {
    let mut plat = MockPlatform::new();
    let mut stack = Stack::new(mesh_local());
    stack.set_local_rloc16(0x2400);
    stack
        .replace_network_data(&dhcp_image("fd00::", 0x5000), 0, &mut plat)
        .unwrap();

    let (_, _) = fire_solicit(&mut stack, &mut plat);
    let first_gap = stack.next_wakeup().unwrap();

    // Each quiet interval doubles, bounded by imax.
    let mut last = 0;
    for _ in 0..12 {
        let at = stack.next_wakeup().unwrap();
        assert!(at >= last);
        stack.handle_timer(at, &mut plat);
        last = at;
    }

    assert!(last >= first_gap);
    assert!(last <= 16 * 120_000, "bounded by imax");
    assert!(plat.sent.len() >= 2, "kept soliciting");
}
