// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Bounded child table carrying per-child indirect transmission state.
// Author: Lukas Bower

//! Child table. Each attached child occupies a fixed slot; the slot
//! index doubles as the child's bit position in per-message delivery
//! masks, which keeps "remove child from all messages" O(queue).

use crate::error::Error;
use crate::message::MessageId;
use crate::platform::MacAddress;

/// Maximum number of children a parent tracks. Bounded by the width of
/// the per-message child mask.
pub const MAX_CHILDREN: usize = 16;

/// Index of a child slot; also the child's bit in message masks.
pub type ChildIndex = usize;

/// Attachment state of a child slot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    /// Slot free or child detached.
    #[default]
    Invalid,
    /// Child attached and reachable.
    Valid,
}

/// One attached child and its indirect transmission state.
#[derive(Debug, Default, Clone)]
pub struct Child {
    state: ChildState,
    rloc16: u16,
    ext_address: [u8; 8],
    rx_on_when_idle: bool,

    src_match_short: bool,
    waiting_for_frame_update: bool,
    indirect_message: Option<MessageId>,
    indirect_fragment_offset: u16,
    indirect_tx_success: bool,
    queued_message_count: u16,
}

impl Child {
    /// Attachment state.
    #[must_use]
    pub fn state(&self) -> ChildState {
        self.state
    }

    /// Whether the slot holds an attached child.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state == ChildState::Valid
    }

    /// The child's RLOC16.
    #[must_use]
    pub fn rloc16(&self) -> u16 {
        self.rloc16
    }

    /// The child's extended MAC address.
    #[must_use]
    pub fn ext_address(&self) -> [u8; 8] {
        self.ext_address
    }

    /// Whether the child keeps its receiver on when idle.
    #[must_use]
    pub fn is_rx_on_when_idle(&self) -> bool {
        self.rx_on_when_idle
    }

    /// Record a device-mode change.
    pub fn set_rx_on_when_idle(&mut self, rx_on: bool) {
        self.rx_on_when_idle = rx_on;
    }

    /// The MAC address used for source matching: short once the first
    /// indirect exchange established it, extended before that.
    #[must_use]
    pub fn mac_address(&self) -> MacAddress {
        if self.src_match_short {
            MacAddress::Short(self.rloc16)
        } else {
            MacAddress::Extended(self.ext_address)
        }
    }

    /// Whether source matching uses the short address.
    #[must_use]
    pub fn is_src_match_short(&self) -> bool {
        self.src_match_short
    }

    pub(crate) fn set_src_match_short(&mut self, short: bool) {
        self.src_match_short = short;
    }

    /// Whether a frame-change request to the MAC is outstanding.
    #[must_use]
    pub fn is_waiting_for_frame_update(&self) -> bool {
        self.waiting_for_frame_update
    }

    pub(crate) fn set_waiting_for_frame_update(&mut self, waiting: bool) {
        self.waiting_for_frame_update = waiting;
    }

    /// The message currently selected for indirect delivery.
    #[must_use]
    pub fn indirect_message(&self) -> Option<MessageId> {
        self.indirect_message
    }

    pub(crate) fn set_indirect_message(&mut self, message: Option<MessageId>) {
        self.indirect_message = message;
    }

    /// Offset of the next fragment of the selected message.
    #[must_use]
    pub fn indirect_fragment_offset(&self) -> u16 {
        self.indirect_fragment_offset
    }

    pub(crate) fn set_indirect_fragment_offset(&mut self, offset: u16) {
        self.indirect_fragment_offset = offset;
    }

    /// Whether every fragment of the selected message was acknowledged
    /// so far.
    #[must_use]
    pub fn indirect_tx_success(&self) -> bool {
        self.indirect_tx_success
    }

    pub(crate) fn set_indirect_tx_success(&mut self, success: bool) {
        self.indirect_tx_success = success;
    }

    /// Number of queued messages destined to this child.
    #[must_use]
    pub fn queued_message_count(&self) -> u16 {
        self.queued_message_count
    }

    pub(crate) fn set_queued_message_count(&mut self, count: u16) {
        self.queued_message_count = count;
    }
}

/// Fixed-capacity table of child slots.
#[derive(Debug, Default)]
pub struct ChildTable {
    children: [Child; MAX_CHILDREN],
}

impl ChildTable {
    /// Create a table with every slot free.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a child in the first free slot.
    pub fn add(
        &mut self,
        rloc16: u16,
        ext_address: [u8; 8],
        rx_on_when_idle: bool,
    ) -> Result<ChildIndex, Error> {
        let index = self
            .children
            .iter()
            .position(|child| !child.is_valid())
            .ok_or(Error::NoBufs)?;

        self.children[index] = Child {
            state: ChildState::Valid,
            rloc16,
            ext_address,
            rx_on_when_idle,
            indirect_tx_success: true,
            ..Child::default()
        };

        Ok(index)
    }

    /// Mark a child detached. Its queued messages are reclaimed by the
    /// indirect sender on the next sent-frame callback.
    pub fn remove(&mut self, index: ChildIndex) -> Result<(), Error> {
        let child = self.get_mut(index).ok_or(Error::NotFound)?;
        child.state = ChildState::Invalid;
        Ok(())
    }

    /// The child at `index`, if the index is in range.
    #[must_use]
    pub fn get(&self, index: ChildIndex) -> Option<&Child> {
        self.children.get(index)
    }

    /// Mutable access to the child at `index`.
    #[must_use]
    pub fn get_mut(&mut self, index: ChildIndex) -> Option<&mut Child> {
        self.children.get_mut(index)
    }

    /// Iterate `(index, child)` over every slot.
    pub fn iter(&self) -> impl Iterator<Item = (ChildIndex, &Child)> {
        self.children.iter().enumerate()
    }

    /// Iterate `(index, child)` over attached children.
    pub fn iter_valid(&self) -> impl Iterator<Item = (ChildIndex, &Child)> {
        self.iter().filter(|(_, child)| child.is_valid())
    }

    /// Find an attached child by RLOC16.
    #[must_use]
    pub fn find_by_rloc16(&self, rloc16: u16) -> Option<ChildIndex> {
        self.iter_valid()
            .find(|(_, child)| child.rloc16() == rloc16)
            .map(|(index, _)| index)
    }
}
