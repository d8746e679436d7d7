//! Change Event Filter
//!
//! Selects the notifications that should start processing: inserts whose new
//! image is in the `pending` state. Everything else is dropped. The filter is a
//! pure predicate over the batch; it keeps no state and preserves order.

use super::types::{ChangeEvent, EventType};

/// Status value that marks a freshly uploaded record.
pub const PENDING_STATUS: &str = "pending";

/// Returns true when the event is an insert of a pending record.
///
/// Events whose new image has no status field (or a non-string status) are
/// not treated as pending.
pub fn is_pending_insert(event: &ChangeEvent) -> bool {
    event.event_type == EventType::Insert && event.new_image.status() == Some(PENDING_STATUS)
}

/// Lazily yields the pending inserts of a batch, in delivery order.
pub fn pending_inserts<'a, I>(events: I) -> impl Iterator<Item = &'a ChangeEvent>
where
    I: IntoIterator<Item = &'a ChangeEvent>,
{
    events.into_iter().filter(|event| is_pending_insert(event))
}
