// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Per-child scheduler for frames buffered toward sleepy children.
// Author: Lukas Bower

//! Indirect sender. A parent buffers datagrams for sleepy children and
//! serves them on data-poll. Coordination with the MAC is message
//! passing only: the sender issues purge/replace requests and the MAC
//! answers through [`IndirectSender::handle_frame_change_done`]; no
//! state is shared across the boundary.

mod frame;
pub(crate) mod source_match;

pub use frame::{FrameContext, TxFrame, FRAME_PAYLOAD_MAX};

use log::{debug, trace, warn};

use crate::child::{ChildIndex, ChildTable, MAX_CHILDREN};
use crate::error::Error;
use crate::message::{MessageId, MessageKind, SendQueue};
use crate::platform::{FrameChange, MacScheduler, SourceMatcher};

/// Scheduler for indirect transmissions to sleepy children.
#[derive(Debug, Default)]
pub struct IndirectSender {
    enabled: bool,
}

impl IndirectSender {
    /// Create a stopped sender.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the sender is serving data polls.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Begin serving data polls.
    pub fn start(&mut self) {
        self.enabled = true;
    }

    /// Stop: drop every child's delivery mask, reset source matching
    /// and purge any prepared frames.
    pub fn stop<M: MacScheduler + SourceMatcher>(
        &mut self,
        children: &mut ChildTable,
        queue: &mut SendQueue,
        mac: &mut M,
    ) {
        if !self.enabled {
            return;
        }

        for index in 0..MAX_CHILDREN {
            let Some(child) = children.get_mut(index) else {
                continue;
            };

            child.set_indirect_message(None);
            child.set_waiting_for_frame_update(false);
            source_match::reset(child, mac);

            if child.is_valid() {
                mac.request_frame_change(FrameChange::Purge, index);
            }
        }

        let ids: Vec<MessageId> = queue.iter().map(|message| message.id()).collect();
        for id in ids {
            if let Some(message) = queue.get_mut(id) {
                *message.child_mask_mut() = crate::message::ChildMask::none();
            }
            queue.remove_if_no_pending_tx(id);
        }

        self.enabled = false;
    }

    /// Mark a queued message for indirect delivery to a sleepy child.
    ///
    /// A real-traffic message displaces any queued supervision message
    /// for the same child, the keep-alive being implicit in it.
    pub fn add_message_for_sleepy_child<M: MacScheduler + SourceMatcher>(
        &mut self,
        message_id: MessageId,
        child_index: ChildIndex,
        children: &mut ChildTable,
        queue: &mut SendQueue,
        mac: &mut M,
    ) -> Result<(), Error> {
        {
            let child = children.get(child_index).ok_or(Error::InvalidArgs)?;
            if child.is_rx_on_when_idle() {
                return Err(Error::InvalidArgs);
            }
        }

        let kind = {
            let message = queue.get_mut(message_id).ok_or(Error::NotFound)?;
            if message.child_mask().has(child_index) {
                return Ok(());
            }
            message.child_mask_mut().add(child_index);
            message.kind()
        };

        let queued_count = {
            let child = children.get_mut(child_index).ok_or(Error::InvalidArgs)?;
            source_match::increment(child, mac);
            child.queued_message_count()
        };

        if kind != MessageKind::Supervision && queued_count > 1 {
            if let Some(supervision) =
                queue.find_for_child(child_index, |m| m.kind() == MessageKind::Supervision)
            {
                let _ = self.remove_message_from_sleepy_child(
                    supervision,
                    child_index,
                    children,
                    queue,
                    mac,
                );
                queue.remove_if_no_pending_tx(supervision);
            }
        }

        self.request_message_update(child_index, children, queue, mac);
        Ok(())
    }

    /// Clear a child's delivery bit from a queued message. Fails with
    /// `NotFound` when the bit is already clear.
    pub fn remove_message_from_sleepy_child<M: MacScheduler + SourceMatcher>(
        &mut self,
        message_id: MessageId,
        child_index: ChildIndex,
        children: &mut ChildTable,
        queue: &mut SendQueue,
        mac: &mut M,
    ) -> Result<(), Error> {
        {
            let message = queue.get_mut(message_id).ok_or(Error::NotFound)?;
            if !message.child_mask().has(child_index) {
                return Err(Error::NotFound);
            }
            message.child_mask_mut().remove(child_index);
        }

        if let Some(child) = children.get_mut(child_index) {
            source_match::decrement(child, mac);
        }

        self.request_message_update(child_index, children, queue, mac);
        Ok(())
    }

    /// Drop every queued message destined to a child; used on detach.
    pub fn clear_all_messages_for_sleepy_child<M: MacScheduler + SourceMatcher>(
        &mut self,
        child_index: ChildIndex,
        children: &mut ChildTable,
        queue: &mut SendQueue,
        mac: &mut M,
    ) {
        {
            let Some(child) = children.get(child_index) else {
                return;
            };
            if child.queued_message_count() == 0 {
                return;
            }
        }

        let ids: Vec<MessageId> = queue.iter().map(|message| message.id()).collect();
        for id in ids {
            if let Some(message) = queue.get_mut(id) {
                message.child_mask_mut().remove(child_index);
            }
            queue.remove_if_no_pending_tx(id);
        }

        if let Some(child) = children.get_mut(child_index) {
            child.set_indirect_message(None);
            source_match::reset(child, mac);
        }

        mac.request_frame_change(FrameChange::Purge, child_index);
    }

    /// React to a child's device-mode change. A child that stops
    /// sleeping has its queued indirect messages reclassified to direct
    /// transmission and its source-match state cleared.
    pub fn handle_child_mode_change<M: MacScheduler + SourceMatcher>(
        &mut self,
        child_index: ChildIndex,
        was_rx_on_when_idle: bool,
        children: &mut ChildTable,
        queue: &mut SendQueue,
        mac: &mut M,
    ) {
        let (rx_on, valid, queued) = {
            let Some(child) = children.get(child_index) else {
                return;
            };
            (
                child.is_rx_on_when_idle(),
                child.is_valid(),
                child.queued_message_count(),
            )
        };

        if !rx_on && valid {
            if let Some(child) = children.get_mut(child_index) {
                source_match::set_src_match_short(child, mac, true);
            }
        }

        if !was_rx_on_when_idle && rx_on && queued > 0 {
            for message in queue.iter_mut() {
                if message.child_mask().has(child_index) {
                    message.child_mask_mut().remove(child_index);
                    message.set_direct_tx();
                }
            }

            if let Some(child) = children.get_mut(child_index) {
                child.set_indirect_message(None);
                source_match::reset(child, mac);
            }

            mac.request_frame_change(FrameChange::Purge, child_index);
        }

        // A child turning sleepy keeps its queued direct messages as
        // direct; their queueing delay is short compared to indirect.
    }

    /// Re-select the message to deliver to a child, coordinating frame
    /// purge/replace with the MAC when the prepared frame is stale.
    pub fn request_message_update<M: MacScheduler + SourceMatcher>(
        &mut self,
        child_index: ChildIndex,
        children: &mut ChildTable,
        queue: &mut SendQueue,
        mac: &mut M,
    ) {
        let (current, waiting, fragment_offset) = {
            let Some(child) = children.get(child_index) else {
                return;
            };
            (
                child.indirect_message(),
                child.is_waiting_for_frame_update(),
                child.indirect_fragment_offset(),
            )
        };

        // Purge first if the current message no longer targets the
        // child; this also covers a message removed while a replace
        // request is in flight.
        let current_still_for_child = current
            .and_then(|id| queue.get(id))
            .is_some_and(|message| message.child_mask().has(child_index));

        if current.is_some() && !current_still_for_child {
            if let Some(child) = children.get_mut(child_index) {
                child.set_indirect_message(None);
                child.set_waiting_for_frame_update(true);
            }
            mac.request_frame_change(FrameChange::Purge, child_index);
            return;
        }

        if waiting {
            return;
        }

        let new = queue.find_for_child(child_index, |_| true);
        if current == new {
            return;
        }

        if current.is_none() {
            self.update_indirect_message(child_index, children, queue);
            return;
        }

        // Both differ and are present. Replace only while the current
        // message is still at its first fragment; otherwise let it
        // finish.
        if fragment_offset != 0 {
            return;
        }

        if let Some(child) = children.get_mut(child_index) {
            child.set_waiting_for_frame_update(true);
        }
        mac.request_frame_change(FrameChange::Replace, child_index);
    }

    /// MAC callback: a previously requested frame purge/replace is
    /// done.
    pub fn handle_frame_change_done(
        &mut self,
        child_index: ChildIndex,
        children: &mut ChildTable,
        queue: &mut SendQueue,
    ) {
        let waiting = children
            .get(child_index)
            .is_some_and(|child| child.is_waiting_for_frame_update());
        if !waiting {
            return;
        }
        self.update_indirect_message(child_index, children, queue);
    }

    fn update_indirect_message(
        &mut self,
        child_index: ChildIndex,
        children: &mut ChildTable,
        queue: &mut SendQueue,
    ) {
        let new = queue.find_for_child(child_index, |_| true);

        let Some(child) = children.get_mut(child_index) else {
            return;
        };

        child.set_waiting_for_frame_update(false);
        child.set_indirect_message(new);
        child.set_indirect_fragment_offset(0);
        child.set_indirect_tx_success(true);

        if let Some(id) = new {
            trace!(
                "prepare indirect message {id} for child {:04x}",
                child.rloc16()
            );
        }
    }

    /// MAC callback on data poll: stage the next frame for a child. An
    /// empty frame is staged when the queue raced with a purge.
    pub fn prepare_frame_for_child(
        &self,
        frame: &mut TxFrame,
        context: &mut FrameContext,
        child_index: ChildIndex,
        children: &ChildTable,
        queue: &SendQueue,
    ) -> Result<(), Error> {
        if !self.enabled {
            return Err(Error::Abort);
        }

        let child = children.get(child_index).ok_or(Error::InvalidArgs)?;

        let message = child.indirect_message().and_then(|id| queue.get(id));

        let Some(message) = message else {
            Self::prepare_empty_frame(frame, child.mac_address());
            context.message_next_offset = 0;
            return Ok(());
        };

        match message.kind() {
            MessageKind::Ip6 => {
                let offset = usize::from(child.indirect_fragment_offset());
                let bytes = message.bytes();
                let end = bytes.len().min(offset + FRAME_PAYLOAD_MAX);

                frame.clear();
                frame.set_payload(&bytes[offset..end]);
                frame.set_dst(child.mac_address());
                frame.set_ack_request(true);
                // More queued messages (the current one still counts)
                // or further fragments keep Frame Pending set.
                frame.set_frame_pending(child.queued_message_count() > 1 || end < bytes.len());

                context.message_next_offset = end as u16;
            }
            MessageKind::Supervision => {
                Self::prepare_empty_frame(frame, child.mac_address());
                frame.set_frame_pending(child.queued_message_count() > 1);
                context.message_next_offset = message.len();
            }
        }

        Ok(())
    }

    fn prepare_empty_frame(frame: &mut TxFrame, dst: crate::platform::MacAddress) {
        frame.clear();
        frame.set_dst(dst);
        frame.set_ack_request(true);
    }

    /// MAC callback: a staged frame finished transmitting with the
    /// given status. Advances fragments, completes messages, and flips
    /// source matching to short addressing after the first attempt.
    pub fn handle_sent_frame_to_child<M: MacScheduler + SourceMatcher>(
        &mut self,
        frame: &TxFrame,
        context: &FrameContext,
        status: Result<(), Error>,
        child_index: ChildIndex,
        children: &mut ChildTable,
        queue: &mut SendQueue,
        mac: &mut M,
    ) {
        if !self.enabled {
            return;
        }

        let Some(child) = children.get_mut(child_index) else {
            return;
        };

        let message_id = child.indirect_message();
        let mut next_offset = context.message_next_offset;

        // A zero offset marks the empty frame staged when the queue
        // raced with a purge; nothing to account for.
        if next_offset != 0 {
            match status {
                Ok(()) => {}
                Err(Error::NoAck) | Err(Error::ChannelAccessFailure) | Err(Error::Abort) => {
                    child.set_indirect_tx_success(false);

                    #[cfg(feature = "drop-message-on-fragment-tx-failure")]
                    if let Some(message) = message_id.and_then(|id| queue.get(id)) {
                        // Skip the remaining fragments once a frame has
                        // exhausted its retries.
                        next_offset = message.len();
                    }
                }
                Err(other) => {
                    warn!("unexpected indirect tx status {other} for child {child_index}");
                }
            }

            if let Some(message) = message_id.and_then(|id| queue.get(id)) {
                if next_offset < message.len() {
                    child.set_indirect_fragment_offset(next_offset);
                    self.clear_messages_for_removed_children(children, queue, mac);
                    return;
                }
            }

            if let Some(id) = message_id {
                let tx_success = child.indirect_tx_success();

                child.set_indirect_message(None);

                // Switch to short-address matching after the first
                // attempt regardless of its outcome; a child that
                // missed our ack will re-attach and re-enrol the
                // extended address on its own.
                source_match::set_src_match_short(child, mac, true);

                let mask_held = queue
                    .get(id)
                    .is_some_and(|message| message.child_mask().has(child_index));

                if mask_held {
                    if let Some(message) = queue.get_mut(id) {
                        message.child_mask_mut().remove(child_index);
                    }
                    if let Some(child) = children.get_mut(child_index) {
                        source_match::decrement(child, mac);
                    }
                }

                if !frame.is_empty() {
                    debug!(
                        "indirect tx of message {id} to child {child_index} done, success={tx_success}"
                    );
                }

                queue.remove_if_no_pending_tx(id);
            }

            self.update_indirect_message(child_index, children, queue);
        }

        self.clear_messages_for_removed_children(children, queue, mac);
    }

    /// Reclaim messages of children that left the valid state.
    fn clear_messages_for_removed_children<M: MacScheduler + SourceMatcher>(
        &mut self,
        children: &mut ChildTable,
        queue: &mut SendQueue,
        mac: &mut M,
    ) {
        for index in 0..MAX_CHILDREN {
            let stale = children
                .get(index)
                .is_some_and(|child| !child.is_valid() && child.queued_message_count() > 0);

            if stale {
                self.clear_all_messages_for_sleepy_child(index, children, queue, mac);
            }
        }
    }
}
