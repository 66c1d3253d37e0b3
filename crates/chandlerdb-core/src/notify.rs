//! Collection change notifications.
//!
//! Local state (membership, indexes, dirty bits) is updated as soon as a
//! collection changes. Delivery to sinks either happens immediately
//! ([`Change::Dispatch`]) or is queued on the view until the next
//! transaction boundary, in the order the changes happened.

use crate::{error::InternalError, types::ItemId};
use derive_more::Display;
use std::{collections::VecDeque, fmt};

///
/// Op
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Op {
    #[display("add")]
    Add,
    #[display("remove")]
    Remove,
    #[display("refresh")]
    Refresh,
    #[display("changed")]
    Changed,
}

///
/// Change
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Change {
    /// Queue for the next transaction boundary.
    #[default]
    Collection,
    /// Deliver now.
    Dispatch,
}

///
/// CollectionEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectionEvent {
    pub op: Op,
    pub collection: ItemId,
    pub attribute: String,
    pub other: ItemId,
}

impl fmt::Display for CollectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} on {}.{}",
            self.op,
            self.other.short(),
            self.collection.short(),
            self.attribute
        )
    }
}

///
/// NotificationSink
///
/// Receiver of collection events. Implementations are registered once with
/// the view and addressed by [`SinkId`] afterwards.
///

pub trait NotificationSink {
    fn on_collection_event(&mut self, event: &CollectionEvent);
}

///
/// SinkId
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("sink#{_0}")]
pub struct SinkId(pub(crate) u64);

///
/// Subscriber
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Subscriber {
    /// A derived collection that recomputes when its source changes.
    Collection(ItemId),
    Sink(SinkId),
}

///
/// NotificationQueue
///
/// FIFO of events awaiting dispatch, optionally bounded.
///

#[derive(Debug, Default)]
pub struct NotificationQueue {
    entries: VecDeque<CollectionEvent>,
    limit: Option<usize>,
}

impl NotificationQueue {
    #[must_use]
    pub const fn new(limit: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, event: CollectionEvent) -> Result<(), InternalError> {
        if let Some(limit) = self.limit
            && self.entries.len() >= limit
        {
            return Err(InternalError::notification_usage(format!(
                "notification queue is full ({limit} pending), dropping {event}"
            )));
        }

        tracing::trace!(%event, pending = self.entries.len() + 1, "queued notification");
        self.entries.push_back(event);

        Ok(())
    }

    pub fn pop(&mut self) -> Option<CollectionEvent> {
        self.entries.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionEvent> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorClass, ErrorOrigin};

    fn event(n: u128) -> CollectionEvent {
        CollectionEvent {
            op: Op::Add,
            collection: ItemId::from_parts(1, 0),
            attribute: "set".to_string(),
            other: ItemId::from_parts(1, n),
        }
    }

    #[test]
    fn queue_is_fifo() {
        let mut queue = NotificationQueue::new(None);
        for n in 1..=3 {
            queue.push(event(n)).expect("unbounded push");
        }

        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|e| e.other).collect();
        assert_eq!(
            order,
            vec![
                ItemId::from_parts(1, 1),
                ItemId::from_parts(1, 2),
                ItemId::from_parts(1, 3)
            ]
        );
    }

    #[test]
    fn bounded_queue_rejects_overflow() {
        let mut queue = NotificationQueue::new(Some(1));
        queue.push(event(1)).expect("first push");

        let err = queue.push(event(2)).unwrap_err();
        assert_eq!(err.class, ErrorClass::Usage);
        assert_eq!(err.origin, ErrorOrigin::Notification);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn op_displays_lowercase() {
        assert_eq!(Op::Changed.to_string(), "changed");
        assert_eq!(SinkId(4).to_string(), "sink#4");
    }
}
