// Author: Lukas Bower
// Purpose: Outgoing MAC frame staging for indirect transmissions.

//! Frame staging types handed between the indirect sender and the MAC
//! data-poll scheduler.

use heapless::Vec as BoundedVec;

use crate::platform::MacAddress;

/// Payload bytes one indirect frame can carry after MAC headers.
pub const FRAME_PAYLOAD_MAX: usize = 96;

/// An outgoing frame staged for a data-poll response.
#[derive(Debug, Default, Clone)]
pub struct TxFrame {
    payload: BoundedVec<u8, FRAME_PAYLOAD_MAX>,
    dst: Option<MacAddress>,
    frame_pending: bool,
    ack_request: bool,
}

impl TxFrame {
    /// An unprepared frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the unprepared state.
    pub fn clear(&mut self) {
        self.payload.clear();
        self.dst = None;
        self.frame_pending = false;
        self.ack_request = false;
    }

    /// Stage a payload fragment, truncating at the frame capacity.
    pub(crate) fn set_payload(&mut self, bytes: &[u8]) {
        self.payload.clear();
        let take = bytes.len().min(FRAME_PAYLOAD_MAX);
        // Capacity checked above.
        let _ = self.payload.extend_from_slice(&bytes[..take]);
    }

    /// The staged payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether no payload is staged (an empty data frame).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Destination address.
    #[must_use]
    pub fn dst(&self) -> Option<MacAddress> {
        self.dst
    }

    pub(crate) fn set_dst(&mut self, dst: MacAddress) {
        self.dst = Some(dst);
    }

    /// The Frame Pending bit.
    #[must_use]
    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }

    pub(crate) fn set_frame_pending(&mut self, pending: bool) {
        self.frame_pending = pending;
    }

    /// The Ack Request bit.
    #[must_use]
    pub fn ack_request(&self) -> bool {
        self.ack_request
    }

    pub(crate) fn set_ack_request(&mut self, ack: bool) {
        self.ack_request = ack;
    }
}

/// Context the MAC hands back with the transmission outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameContext {
    /// Offset of the message byte following this frame's fragment;
    /// zero marks an empty frame with no message behind it.
    pub message_next_offset: u16,
}
