use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for index maintenance and notification
/// traffic.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub collections: BTreeMap<ItemId, CollectionCounters>,
    pub window_start_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            collections: BTreeMap::new(),
            window_start_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Index maintenance
    pub index_builds: u64,
    pub index_keys_filled: u64,
    pub index_restores: u64,
    pub index_invalidations: u64,
    pub index_reindexes: u64,

    // Notifications
    pub notifications_queued: u64,
    pub notifications_dispatched: u64,

    // Derived collections
    pub derived_rebuilds: u64,
    pub derived_adds: u64,
    pub derived_removes: u64,

    // Items
    pub items_loaded: u64,
}

///
/// CollectionCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CollectionCounters {
    pub rebuilds: u64,
    pub adds: u64,
    pub removes: u64,
    pub notifications_dispatched: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters and restart the window.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

#[allow(clippy::cast_possible_truncation)]
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Ephemeral runtime counters since `window_start_ms`.
    pub counters: Option<EventState>,
    /// Per-collection counters, busiest first.
    pub collection_counters: Vec<(ItemId, CollectionCounters)>,
}

/// Build a report, skipping counters when the window started before
/// `window_start_ms`.
#[must_use]
pub(crate) fn report_window_start(window_start_ms: Option<u64>) -> EventReport {
    let snap = with_state(Clone::clone);
    if let Some(requested) = window_start_ms
        && requested > snap.window_start_ms
    {
        return EventReport::default();
    }

    let mut collection_counters: Vec<_> = snap
        .collections
        .iter()
        .map(|(id, counters)| (*id, counters.clone()))
        .collect();
    collection_counters.sort_by(|(a_id, a), (b_id, b)| {
        (b.adds + b.removes + b.rebuilds)
            .cmp(&(a.adds + a.removes + a.rebuilds))
            .then_with(|| a_id.cmp(b_id))
    });

    EventReport {
        counters: Some(snap),
        collection_counters,
    }
}
