// Author: Lukas Bower
// Purpose: Keep the radio source-match table in step with per-child queues.

//! Source-match bookkeeping. The radio's source-address-match table
//! holds the addresses of children with pending frames so data-poll
//! acks carry the right Frame Pending bit; an entry is added when a
//! child's queued count leaves zero and cleared when it returns.

use log::trace;

use crate::child::Child;
use crate::platform::SourceMatcher;

pub(crate) fn increment(child: &mut Child, matcher: &mut impl SourceMatcher) {
    if child.queued_message_count() == 0 {
        matcher.add_entry(child.mac_address());
    }
    child.set_queued_message_count(child.queued_message_count() + 1);
}

pub(crate) fn decrement(child: &mut Child, matcher: &mut impl SourceMatcher) {
    debug_assert!(child.queued_message_count() > 0);
    child.set_queued_message_count(child.queued_message_count().saturating_sub(1));
    if child.queued_message_count() == 0 {
        matcher.clear_entry(child.mac_address());
    }
}

pub(crate) fn reset(child: &mut Child, matcher: &mut impl SourceMatcher) {
    if child.queued_message_count() > 0 {
        child.set_queued_message_count(0);
        matcher.clear_entry(child.mac_address());
    }
}

pub(crate) fn set_src_match_short(child: &mut Child, matcher: &mut impl SourceMatcher, short: bool) {
    if child.is_src_match_short() == short {
        return;
    }

    trace!(
        "child {:04x} source match -> {}",
        child.rloc16(),
        if short { "short" } else { "extended" }
    );

    if child.queued_message_count() > 0 {
        matcher.clear_entry(child.mac_address());
    }
    child.set_src_match_short(short);
    if child.queued_message_count() > 0 {
        matcher.add_entry(child.mac_address());
    }
}
