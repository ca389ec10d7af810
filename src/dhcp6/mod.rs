// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Trickle-driven DHCPv6 client soliciting addresses from prefix agents.
// Author: Lukas Bower

//! DHCPv6 client. Network Data on-mesh prefixes flagged for DHCP each
//! get an identity association; a Trickle timer paces rapid-commit
//! Solicit messages to the publishing agent's routing locator, and a
//! validated Reply installs the assigned address on the Thread netif.

pub mod wire;

use core::net::Ipv6Addr;

use log::{debug, info, warn};

use netdata_codec::Ip6Prefix;

use crate::error::Error;
use crate::ip6::MeshLocalPrefix;
use crate::netdata::{iter::NetDataIterator, NetworkData};
use crate::notifier::{Event, Events};
use crate::platform::{Entropy, MessageInfo, NetifAddress, Radio, ThreadNetif, UdpTransport};
use crate::trickle::TrickleTimer;

use wire::{
    append_client_id, append_elapsed_time, append_header, append_ia_address, append_ia_na,
    append_rapid_commit, find_option, parse_status_code, Duid, Header, IaAddress, IaNa, MsgType,
    OptionCode, OptionIter, TransactionId, DHCP6_CLIENT_PORT, DHCP6_SERVER_PORT,
    DUID_TYPE_LL, DUID_TYPE_LLT, HARDWARE_TYPE_ETHERNET, HARDWARE_TYPE_EUI64, STATUS_SUCCESS,
};

/// Identity association slots; one per DHCP-flagged prefix.
pub const MAX_IDENTITY_ASSOCIATIONS: usize = 8;

const TRICKLE_IMIN_MS: u32 = 1_000;
const TRICKLE_IMAX_MS: u32 = 120_000;

/// Per-prefix solicitation state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum IaStatus {
    /// Slot free.
    #[default]
    Invalid,
    /// Waiting to start soliciting.
    Solicit,
    /// Solicit messages in flight.
    Soliciting,
    /// A Reply assigned an address.
    SolicitReplied,
}

/// One identity association tracking a DHCP-flagged prefix.
#[derive(Debug, Clone, Copy)]
pub struct IdentityAssociation {
    status: IaStatus,
    prefix: Ip6Prefix,
    prefix_agent_rloc16: u16,
    preferred_lifetime: u32,
    valid_lifetime: u32,
    address: Ipv6Addr,
}

impl Default for IdentityAssociation {
    fn default() -> Self {
        Self {
            status: IaStatus::Invalid,
            prefix: Ip6Prefix::default(),
            prefix_agent_rloc16: 0,
            preferred_lifetime: 0,
            valid_lifetime: 0,
            address: Ipv6Addr::UNSPECIFIED,
        }
    }
}

impl IdentityAssociation {
    /// Solicitation state.
    #[must_use]
    pub fn status(&self) -> IaStatus {
        self.status
    }

    /// The tracked prefix.
    #[must_use]
    pub fn prefix(&self) -> Ip6Prefix {
        self.prefix
    }

    /// RLOC16 of the agent publishing the prefix.
    #[must_use]
    pub fn prefix_agent_rloc16(&self) -> u16 {
        self.prefix_agent_rloc16
    }

    /// The solicited or assigned address.
    #[must_use]
    pub fn address(&self) -> Ipv6Addr {
        self.address
    }

    /// Valid lifetime of the assigned address, zero before assignment.
    #[must_use]
    pub fn valid_lifetime(&self) -> u32 {
        self.valid_lifetime
    }

    /// Preferred lifetime of the assigned address.
    #[must_use]
    pub fn preferred_lifetime(&self) -> u32 {
        self.preferred_lifetime
    }
}

/// The DHCPv6 client.
#[derive(Debug, Default)]
pub struct Dhcp6Client {
    ias: [IdentityAssociation; MAX_IDENTITY_ASSOCIATIONS],
    current: Option<usize>,
    transaction_id: TransactionId,
    start_time: u64,
    trickle: TrickleTimer,
    socket_bound: bool,
    mesh_local: MeshLocalPrefix,
    local_rloc16: u16,
}

impl Dhcp6Client {
    /// Create a stopped client.
    #[must_use]
    pub fn new(mesh_local: MeshLocalPrefix) -> Self {
        Self {
            mesh_local,
            ..Self::default()
        }
    }

    /// Update the mesh-local prefix used for locator addressing.
    pub fn set_mesh_local_prefix(&mut self, mesh_local: MeshLocalPrefix) {
        self.mesh_local = mesh_local;
    }

    /// Whether the socket is bound and solicitation may be running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.socket_bound
    }

    /// The identity association table.
    #[must_use]
    pub fn identity_associations(&self) -> &[IdentityAssociation] {
        &self.ias
    }

    /// Next instant the owner should call [`Self::handle_tick`].
    #[must_use]
    pub fn next_event(&self) -> Option<u64> {
        self.trickle.next_event()
    }

    /// Notifier fan-in: reconcile the IA table on Network Data change.
    pub fn handle_notifier_events<P>(
        &mut self,
        events: &Events,
        netdata: &NetworkData,
        now: u64,
        plat: &mut P,
    ) where
        P: ThreadNetif + UdpTransport + Radio + Entropy,
    {
        if events.contains(Event::NetworkDataChanged) {
            self.update_addresses(netdata, now, plat);
        }
    }

    /// Reconcile the IA table with the store's DHCP-flagged on-mesh
    /// prefixes, then start or stop solicitation.
    pub fn update_addresses<P>(&mut self, netdata: &NetworkData, now: u64, plat: &mut P)
    where
        P: ThreadNetif + UdpTransport + Radio + Entropy,
    {
        self.local_rloc16 = netdata.local_rloc16().unwrap_or(0xfffe);

        // Drop associations whose prefix left the store.
        for index in 0..MAX_IDENTITY_ASSOCIATIONS {
            if self.ias[index].status == IaStatus::Invalid {
                continue;
            }

            if !Self::store_has_dhcp_prefix_for(netdata, &self.ias[index].address) {
                if self.ias[index].valid_lifetime != 0 {
                    plat.remove_unicast_address(self.ias[index].address);
                }
                self.ias[index] = IdentityAssociation::default();
                if self.current == Some(index) {
                    self.current = None;
                }
            }
        }

        // Track newly advertised prefixes.
        let mut agent_exists = false;
        let mut iter = NetDataIterator::new();

        while let Ok(config) = netdata.next_on_mesh_prefix(&mut iter) {
            if !config.dhcp {
                continue;
            }
            agent_exists = true;

            let existing = self.ias.iter().position(|ia| {
                ia.status != IaStatus::Invalid && config.prefix.contains(&ia.address)
            });

            let slot = match existing {
                Some(slot) => Some(slot),
                None => {
                    let free = self
                        .ias
                        .iter()
                        .position(|ia| ia.status == IaStatus::Invalid);
                    match free {
                        Some(slot) => {
                            self.ias[slot] = IdentityAssociation {
                                status: IaStatus::Solicit,
                                prefix: config.prefix,
                                address: config.prefix.addr(),
                                ..IdentityAssociation::default()
                            };
                            Some(slot)
                        }
                        None => {
                            warn!("no free identity association for {}", config.prefix);
                            None
                        }
                    }
                }
            };

            if let Some(slot) = slot {
                self.ias[slot].prefix_agent_rloc16 = config.rloc16;
            }
        }

        if agent_exists {
            self.start(now, plat);
        } else {
            self.stop(plat);
        }
    }

    fn start<P>(&mut self, now: u64, plat: &mut P)
    where
        P: UdpTransport + Entropy,
    {
        if !self.socket_bound {
            if let Err(err) = plat.open(DHCP6_CLIENT_PORT) {
                warn!("dhcp6 socket bind failed: {err}");
                return;
            }
            self.socket_bound = true;
        }

        self.process_next_ia(now, plat);
    }

    /// Halt solicitation and close the socket; in-flight replies are
    /// discarded.
    pub fn stop<P: UdpTransport>(&mut self, plat: &mut P) {
        self.trickle.stop();
        if self.socket_bound {
            let _ = plat.close();
            self.socket_bound = false;
        }
        self.current = None;
    }

    fn process_next_ia<P: Entropy>(&mut self, now: u64, plat: &mut P) -> bool {
        // Never interrupt an in-progress solicitation.
        if let Some(index) = self.current {
            if self.ias[index].status == IaStatus::Soliciting {
                return false;
            }
        }

        self.trickle.stop();

        for index in 0..MAX_IDENTITY_ASSOCIATIONS {
            if self.ias[index].status != IaStatus::Solicit {
                continue;
            }

            self.transaction_id = TransactionId::generate(plat);
            self.current = Some(index);
            self.trickle
                .start(now, TRICKLE_IMIN_MS, TRICKLE_IMAX_MS, plat);
            // A new IA context resets the adaptive interval.
            self.trickle.indicate_inconsistent(now, plat);
            return true;
        }

        false
    }

    /// Timer entry point; drives the Trickle schedule.
    pub fn handle_tick<P>(&mut self, now: u64, plat: &mut P)
    where
        P: ThreadNetif + UdpTransport + Radio + Entropy,
    {
        if self.trickle.handle_tick(now, plat) {
            self.handle_trickle_fire(now, plat);
        }
    }

    fn handle_trickle_fire<P>(&mut self, now: u64, plat: &mut P)
    where
        P: ThreadNetif + UdpTransport + Radio + Entropy,
    {
        let Some(index) = self.current else {
            self.trickle.stop();
            return;
        };

        match self.ias[index].status {
            IaStatus::Solicit => {
                self.start_time = now;
                self.ias[index].status = IaStatus::Soliciting;
                self.solicit(now, plat);
            }
            IaStatus::Soliciting => self.solicit(now, plat),
            IaStatus::SolicitReplied => {
                self.current = None;
                if !self.process_next_ia(now, plat) {
                    self.stop(plat);
                }
            }
            IaStatus::Invalid => {}
        }
    }

    fn solicit<P>(&mut self, now: u64, plat: &mut P)
    where
        P: UdpTransport + Radio,
    {
        let Some(index) = self.current else {
            return;
        };
        let agent_rloc16 = self.ias[index].prefix_agent_rloc16;

        let mut buf = Vec::with_capacity(128);
        append_header(&mut buf, MsgType::Solicit, self.transaction_id);

        let elapsed = (now.saturating_sub(self.start_time) / 1_000).min(u64::from(u16::MAX));
        append_elapsed_time(&mut buf, elapsed as u16);
        append_client_id(&mut buf, &plat.ieee_eui64());

        let soliciting = |ia: &IdentityAssociation| {
            matches!(ia.status, IaStatus::Solicit | IaStatus::Soliciting)
                && ia.prefix_agent_rloc16 == agent_rloc16
        };

        let count = self.ias.iter().filter(|&ia| soliciting(ia)).count();
        append_ia_na(&mut buf, count);
        for ia in self.ias.iter().filter(|&ia| soliciting(ia)) {
            append_ia_address(&mut buf, ia.address, 0, 0);
        }

        append_rapid_commit(&mut buf);

        let info = MessageInfo {
            peer_addr: self.mesh_local.locator(agent_rloc16),
            peer_port: DHCP6_SERVER_PORT,
            sock_addr: self.mesh_local.locator(self.local_rloc16),
            sock_port: DHCP6_CLIENT_PORT,
        };

        match plat.send_to(&buf, &info) {
            Ok(()) => info!("solicit to agent {agent_rloc16:04x}"),
            Err(err) => warn!("send DHCPv6 Solicit: {err}"),
        }
    }

    /// UDP receive entry point; unmatched datagrams are dropped
    /// silently.
    pub fn handle_udp_receive<P>(
        &mut self,
        payload: &[u8],
        _info: &MessageInfo,
        now: u64,
        plat: &mut P,
    ) where
        P: ThreadNetif + UdpTransport + Radio + Entropy,
    {
        let Ok((header, options)) = Header::parse(payload) else {
            return;
        };

        if header.msg_type == MsgType::Reply as u8 && header.transaction_id == self.transaction_id
        {
            if let Err(err) = self.process_reply(options, now, plat) {
                debug!("dhcp6 reply discarded: {err}");
            }
        }
    }

    fn process_reply<P>(&mut self, options: &[u8], now: u64, plat: &mut P) -> Result<(), Error>
    where
        P: ThreadNetif + UdpTransport + Radio + Entropy,
    {
        if let Some(status) = find_option(options, OptionCode::StatusCode) {
            if parse_status_code(status)? != STATUS_SUCCESS {
                return Err(Error::Parse);
            }
        }

        let server_id = find_option(options, OptionCode::ServerId).ok_or(Error::Drop)?;
        Self::validate_server_id(server_id)?;

        let client_id = find_option(options, OptionCode::ClientId).ok_or(Error::Drop)?;
        Self::validate_client_id(client_id, &plat.ieee_eui64())?;

        find_option(options, OptionCode::RapidCommit).ok_or(Error::Drop)?;

        let ia_na = IaNa::parse(find_option(options, OptionCode::IaNa).ok_or(Error::Drop)?)?;

        if let Some(status) = find_option(ia_na.options, OptionCode::StatusCode) {
            if parse_status_code(status)? != STATUS_SUCCESS {
                return Err(Error::Parse);
            }
        }

        for (code, payload) in OptionIter::new(ia_na.options) {
            if code == OptionCode::IaAddress as u16 {
                self.process_ia_address(IaAddress::parse(payload)?, plat)?;
            }
        }

        // Advance to the next pending association (or stop).
        self.handle_trickle_fire(now, plat);
        Ok(())
    }

    fn validate_server_id(payload: &[u8]) -> Result<(), Error> {
        let duid = Duid::parse(payload)?;

        let llt_ethernet =
            duid.duid_type == DUID_TYPE_LLT && duid.hardware_type == HARDWARE_TYPE_ETHERNET;
        let ll_eui64 = duid.duid_type == DUID_TYPE_LL
            && duid.hardware_type == HARDWARE_TYPE_EUI64
            && duid.link_layer.len() == 8;

        if llt_ethernet || ll_eui64 {
            Ok(())
        } else {
            Err(Error::Parse)
        }
    }

    fn validate_client_id(payload: &[u8], eui64: &[u8; 8]) -> Result<(), Error> {
        let duid = Duid::parse(payload)?;

        if duid.duid_type == DUID_TYPE_LL
            && duid.hardware_type == HARDWARE_TYPE_EUI64
            && duid.link_layer == eui64
        {
            Ok(())
        } else {
            Err(Error::Parse)
        }
    }

    fn process_ia_address<P: ThreadNetif>(
        &mut self,
        option: IaAddress,
        plat: &mut P,
    ) -> Result<(), Error> {
        for ia in &mut self.ias {
            if ia.status == IaStatus::Invalid || ia.valid_lifetime != 0 {
                continue;
            }

            if ia.prefix.contains(&option.address) {
                ia.address = option.address;
                ia.preferred_lifetime = option.preferred_lifetime;
                ia.valid_lifetime = option.valid_lifetime;
                ia.status = IaStatus::SolicitReplied;

                plat.add_unicast_address(NetifAddress {
                    address: option.address,
                    prefix_length: ia.prefix.length(),
                    preferred: option.preferred_lifetime != 0,
                    valid: option.valid_lifetime != 0,
                });

                info!(
                    "dhcp6 address {} installed (preferred {}s valid {}s)",
                    option.address, option.preferred_lifetime, option.valid_lifetime
                );
                return Ok(());
            }
        }

        Err(Error::NotFound)
    }

    fn store_has_dhcp_prefix_for(netdata: &NetworkData, address: &Ipv6Addr) -> bool {
        let mut iter = NetDataIterator::new();
        while let Ok(config) = netdata.next_on_mesh_prefix(&mut iter) {
            if config.dhcp && config.prefix.contains(address) {
                return true;
            }
        }
        false
    }
}
