// Author: Lukas Bower
// Purpose: Shared error vocabulary across the threadnet subsystems.

//! Error kinds surfaced by every operation. Success is `Ok(())`; the
//! MAC transmission outcomes double as inputs to the indirect sender.

use netdata_codec::CodecError;

/// Tagged error values shared across the stack.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Iterator exhausted or lookup miss.
    #[error("not found")]
    NotFound,
    /// Malformed TLV or DHCPv6 option.
    #[error("parse failure")]
    Parse,
    /// Allocator or queue full.
    #[error("no buffers")]
    NoBufs,
    /// Caller supplied out-of-range values.
    #[error("invalid arguments")]
    InvalidArgs,
    /// Operation attempted before initialization or on stale state.
    #[error("invalid state")]
    InvalidState,
    /// Silently discarded input.
    #[error("dropped")]
    Drop,
    /// MAC transmission aborted.
    #[error("tx aborted")]
    Abort,
    /// MAC transmission not acknowledged.
    #[error("no ack")]
    NoAck,
    /// MAC channel access failure (CSMA backoff exhausted).
    #[error("channel access failure")]
    ChannelAccessFailure,
}

impl From<CodecError> for Error {
    fn from(_: CodecError) -> Self {
        Self::Parse
    }
}
