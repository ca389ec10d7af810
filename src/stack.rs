// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Single-threaded owner wiring the Network Data subsystems together.
// Author: Lukas Bower

//! Stack facade. One cooperative event loop owns the Network Data
//! store, the notifier, the DHCPv6 client and the indirect sender, and
//! funnels MLE deliveries, timer ticks, UDP datagrams and MAC
//! callbacks into them in turn. No handler blocks; cross-subsystem
//! effects ride the notifier.

use crate::child::{Child, ChildIndex, ChildTable};
use crate::dhcp6::Dhcp6Client;
use crate::error::Error;
use crate::indirect::{FrameContext, IndirectSender, TxFrame};
use crate::ip6::MeshLocalPrefix;
use crate::message::{MessageId, MessageKind, SendQueue};
use crate::netdata::service::{
    find_preferred_dns_srp_anycast_info, DnsSrpAnycastInfo, ServiceIterator,
};
use crate::netdata::{NetDataError, NetworkData};
use crate::notifier::{Event, Notifier};
use crate::platform::{MessageInfo, Platform};

/// The assembled Thread Network Data stack of one node.
#[derive(Debug)]
pub struct Stack {
    netdata: NetworkData,
    notifier: Notifier,
    dhcp6: Dhcp6Client,
    indirect: IndirectSender,
    children: ChildTable,
    queue: SendQueue,
    mesh_local: MeshLocalPrefix,
}

impl Stack {
    /// Assemble a stack for a node in the given mesh-local prefix.
    #[must_use]
    pub fn new(mesh_local: MeshLocalPrefix) -> Self {
        let mut indirect = IndirectSender::new();
        indirect.start();

        Self {
            netdata: NetworkData::new(),
            notifier: Notifier::new(),
            dhcp6: Dhcp6Client::new(mesh_local),
            indirect,
            children: ChildTable::new(),
            queue: SendQueue::new(),
            mesh_local,
        }
    }

    /// The Network Data store.
    #[must_use]
    pub fn netdata(&self) -> &NetworkData {
        &self.netdata
    }

    /// The DHCPv6 client.
    #[must_use]
    pub fn dhcp6(&self) -> &Dhcp6Client {
        &self.dhcp6
    }

    /// The forwarder send queue.
    #[must_use]
    pub fn send_queue(&self) -> &SendQueue {
        &self.queue
    }

    /// The child at `index`.
    #[must_use]
    pub fn child(&self, index: ChildIndex) -> Option<&Child> {
        self.children.get(index)
    }

    /// The partition's mesh-local prefix.
    #[must_use]
    pub fn mesh_local_prefix(&self) -> MeshLocalPrefix {
        self.mesh_local
    }

    /// Record this node's RLOC16 after attach.
    pub fn set_local_rloc16(&mut self, rloc16: u16) {
        self.netdata.set_local_rloc16(rloc16);
    }

    /// MLE delivery path: replace the Network Data image and run the
    /// subscriber dispatch.
    pub fn replace_network_data<P: Platform>(
        &mut self,
        bytes: &[u8],
        now: u64,
        plat: &mut P,
    ) -> Result<(), NetDataError> {
        self.netdata.replace(bytes, &mut self.notifier)?;
        self.dispatch(now, plat);
        Ok(())
    }

    /// Fan pending notifier events out to subscribers.
    pub fn dispatch<P: Platform>(&mut self, now: u64, plat: &mut P) {
        let events = self.notifier.take();
        if events.is_empty() {
            return;
        }

        self.dhcp6
            .handle_notifier_events(&events, &self.netdata, now, plat);
    }

    /// Earliest instant the owner must call [`Self::handle_timer`].
    #[must_use]
    pub fn next_wakeup(&self) -> Option<u64> {
        self.dhcp6.next_event()
    }

    /// Timer tick entry point.
    pub fn handle_timer<P: Platform>(&mut self, now: u64, plat: &mut P) {
        self.dhcp6.handle_tick(now, plat);
    }

    /// Incoming UDP datagram entry point.
    pub fn handle_udp_receive<P: Platform>(
        &mut self,
        payload: &[u8],
        info: &MessageInfo,
        now: u64,
        plat: &mut P,
    ) {
        self.dhcp6.handle_udp_receive(payload, info, now, plat);
    }

    /// Iterate the DNS/SRP service entries of the current snapshot.
    #[must_use]
    pub fn service_iterator(&self) -> ServiceIterator<'_> {
        ServiceIterator::new(&self.netdata, self.mesh_local)
    }

    /// The preferred DNS/SRP anycast entry of the current snapshot.
    pub fn preferred_dns_srp_anycast(&self) -> Result<DnsSrpAnycastInfo, Error> {
        find_preferred_dns_srp_anycast_info(&self.netdata, self.mesh_local)
    }

    /// Attach a child.
    pub fn add_child(
        &mut self,
        rloc16: u16,
        ext_address: [u8; 8],
        rx_on_when_idle: bool,
    ) -> Result<ChildIndex, Error> {
        self.children.add(rloc16, ext_address, rx_on_when_idle)
    }

    /// Detach a child and reclaim its queued messages.
    pub fn remove_child<P: Platform>(
        &mut self,
        index: ChildIndex,
        plat: &mut P,
    ) -> Result<(), Error> {
        self.children.remove(index)?;
        self.indirect.clear_all_messages_for_sleepy_child(
            index,
            &mut self.children,
            &mut self.queue,
            plat,
        );
        Ok(())
    }

    /// Forwarder entry point: queue an IPv6 datagram toward a child.
    /// Sleepy children get indirect delivery, others direct.
    pub fn enqueue_ip6_for_child<P: Platform>(
        &mut self,
        bytes: Vec<u8>,
        child_index: ChildIndex,
        plat: &mut P,
    ) -> Result<MessageId, Error> {
        let sleepy = !self
            .children
            .get(child_index)
            .ok_or(Error::InvalidArgs)?
            .is_rx_on_when_idle();

        let id = self.queue.enqueue(MessageKind::Ip6, bytes);

        if sleepy {
            self.indirect.add_message_for_sleepy_child(
                id,
                child_index,
                &mut self.children,
                &mut self.queue,
                plat,
            )?;
        } else if let Some(message) = self.queue.get_mut(id) {
            message.set_direct_tx();
        }

        Ok(id)
    }

    /// Queue a supervision keep-alive toward a sleepy child.
    pub fn enqueue_supervision_for_child<P: Platform>(
        &mut self,
        child_index: ChildIndex,
        plat: &mut P,
    ) -> Result<MessageId, Error> {
        let id = self.queue.enqueue(MessageKind::Supervision, vec![0]);
        self.indirect.add_message_for_sleepy_child(
            id,
            child_index,
            &mut self.children,
            &mut self.queue,
            plat,
        )?;
        Ok(id)
    }

    /// MLE notified a child device-mode change.
    pub fn handle_child_mode_change<P: Platform>(
        &mut self,
        child_index: ChildIndex,
        rx_on_when_idle: bool,
        plat: &mut P,
    ) {
        let Some(child) = self.children.get_mut(child_index) else {
            return;
        };

        let was_rx_on = child.is_rx_on_when_idle();
        child.set_rx_on_when_idle(rx_on_when_idle);
        self.notifier.signal(Event::ChildModeChanged);

        self.indirect.handle_child_mode_change(
            child_index,
            was_rx_on,
            &mut self.children,
            &mut self.queue,
            plat,
        );
    }

    /// MAC data-poll callback: stage the next frame for a child.
    pub fn prepare_frame_for_child(
        &mut self,
        frame: &mut TxFrame,
        context: &mut FrameContext,
        child_index: ChildIndex,
    ) -> Result<(), Error> {
        self.indirect
            .prepare_frame_for_child(frame, context, child_index, &self.children, &self.queue)
    }

    /// MAC callback: a staged frame finished transmitting.
    pub fn handle_sent_frame_to_child<P: Platform>(
        &mut self,
        frame: &TxFrame,
        context: &FrameContext,
        status: Result<(), Error>,
        child_index: ChildIndex,
        plat: &mut P,
    ) {
        self.indirect.handle_sent_frame_to_child(
            frame,
            context,
            status,
            child_index,
            &mut self.children,
            &mut self.queue,
            plat,
        );
    }

    /// MAC callback: a requested frame purge/replace completed.
    pub fn handle_frame_change_done(&mut self, child_index: ChildIndex) {
        self.indirect
            .handle_frame_change_done(child_index, &mut self.children, &mut self.queue);
    }

    /// Detach from the partition: stop the DHCPv6 client and the
    /// indirect sender.
    pub fn stop<P: Platform>(&mut self, plat: &mut P) {
        self.dhcp6.stop(plat);
        self.indirect
            .stop(&mut self.children, &mut self.queue, plat);
    }
}
