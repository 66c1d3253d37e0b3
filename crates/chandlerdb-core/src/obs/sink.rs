//! Metrics sink boundary.
//!
//! Engine logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between engine logic
//! and the global metrics state.
use crate::{obs::metrics, types::ItemId};
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    IndexBuilt { keys: u64 },
    IndexRestored,
    IndexInvalidated,
    IndexReindexed,
    NotificationQueued,
    NotificationDispatched { collection: ItemId },
    DerivedRebuilt { collection: ItemId },
    DerivedDelta { collection: ItemId, adds: u64, removes: u64 },
    ItemLoaded,
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default thread-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        metrics::with_state_mut(|m| match event {
            MetricsEvent::IndexBuilt { keys } => {
                m.ops.index_builds = m.ops.index_builds.saturating_add(1);
                m.ops.index_keys_filled = m.ops.index_keys_filled.saturating_add(keys);
            }
            MetricsEvent::IndexRestored => {
                m.ops.index_restores = m.ops.index_restores.saturating_add(1);
            }
            MetricsEvent::IndexInvalidated => {
                m.ops.index_invalidations = m.ops.index_invalidations.saturating_add(1);
            }
            MetricsEvent::IndexReindexed => {
                m.ops.index_reindexes = m.ops.index_reindexes.saturating_add(1);
            }
            MetricsEvent::NotificationQueued => {
                m.ops.notifications_queued = m.ops.notifications_queued.saturating_add(1);
            }
            MetricsEvent::NotificationDispatched { collection } => {
                m.ops.notifications_dispatched = m.ops.notifications_dispatched.saturating_add(1);
                let entry = m.collections.entry(collection).or_default();
                entry.notifications_dispatched = entry.notifications_dispatched.saturating_add(1);
            }
            MetricsEvent::DerivedRebuilt { collection } => {
                m.ops.derived_rebuilds = m.ops.derived_rebuilds.saturating_add(1);
                let entry = m.collections.entry(collection).or_default();
                entry.rebuilds = entry.rebuilds.saturating_add(1);
            }
            MetricsEvent::DerivedDelta {
                collection,
                adds,
                removes,
            } => {
                m.ops.derived_adds = m.ops.derived_adds.saturating_add(adds);
                m.ops.derived_removes = m.ops.derived_removes.saturating_add(removes);
                let entry = m.collections.entry(collection).or_default();
                entry.adds = entry.adds.saturating_add(adds);
                entry.removes = entry.removes.saturating_add(removes);
            }
            MetricsEvent::ItemLoaded => {
                m.ops.items_loaded = m.ops.items_loaded.saturating_add(1);
            }
        });
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // Preconditions:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in `with_metrics_sink`.
        // - `with_metrics_sink` always restores the previous pointer before returning,
        //   including unwind paths via `Guard::drop`.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        //
        // Aliasing:
        // - Only a shared reference is materialized, matching the shared borrow
        //   used to install the override.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state.
///
/// `window_start_ms` filters by window start (`EventState::window_start_ms`),
/// not by per-event timestamps.
#[must_use]
pub fn metrics_report(window_start_ms: Option<u64>) -> metrics::EventReport {
    metrics::report_window_start(window_start_ms)
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // Preconditions:
    // - `sink_ptr` is installed only for this dynamic scope.
    // - `Guard` always restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists `sink_ptr`.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink<'a> {
        calls: &'a AtomicUsize,
    }

    impl MetricsSink for CountingSink<'_> {
        fn record(&self, _: MetricsEvent) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn with_metrics_sink_routes_and_restores_nested_overrides() {
        SINK_OVERRIDE.with(|cell| {
            *cell.borrow_mut() = None;
        });

        let outer_calls = AtomicUsize::new(0);
        let inner_calls = AtomicUsize::new(0);
        let outer = CountingSink {
            calls: &outer_calls,
        };
        let inner = CountingSink {
            calls: &inner_calls,
        };

        with_metrics_sink(&outer, || {
            record(MetricsEvent::IndexRestored);
            assert_eq!(outer_calls.load(Ordering::SeqCst), 1);

            with_metrics_sink(&inner, || {
                record(MetricsEvent::IndexReindexed);
            });

            // inner override restored to outer
            record(MetricsEvent::NotificationQueued);
        });

        assert_eq!(outer_calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner_calls.load(Ordering::SeqCst), 1);
        SINK_OVERRIDE.with(|cell| {
            assert!(cell.borrow().is_none());
        });
    }

    #[test]
    fn with_metrics_sink_restores_override_on_panic() {
        SINK_OVERRIDE.with(|cell| {
            *cell.borrow_mut() = None;
        });

        let calls = AtomicUsize::new(0);
        let sink = CountingSink { calls: &calls };

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            with_metrics_sink(&sink, || {
                record(MetricsEvent::IndexInvalidated);
                panic!("intentional panic for guard test");
            });
        }))
        .is_err();
        assert!(panicked);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        SINK_OVERRIDE.with(|cell| {
            assert!(cell.borrow().is_none());
        });
    }

    #[test]
    fn global_sink_accumulates_per_collection_counters() {
        metrics_reset_all();
        let collection = ItemId::from_parts(1, 1);

        record(MetricsEvent::IndexBuilt { keys: 3 });
        record(MetricsEvent::DerivedRebuilt { collection });
        record(MetricsEvent::DerivedDelta {
            collection,
            adds: 2,
            removes: 1,
        });

        let report = metrics_report(None);
        let counters = report.counters.expect("counters without window filter");
        assert_eq!(counters.ops.index_builds, 1);
        assert_eq!(counters.ops.index_keys_filled, 3);
        assert_eq!(counters.ops.derived_adds, 2);

        let (id, per) = &report.collection_counters[0];
        assert_eq!(*id, collection);
        assert_eq!(per.rebuilds, 1);
        assert_eq!(per.removes, 1);
    }

    #[test]
    fn metrics_report_window_start_after_window_returns_empty() {
        metrics_reset_all();
        let window_start = metrics::with_state(|m| m.window_start_ms);
        record(MetricsEvent::ItemLoaded);

        let report = metrics_report(Some(window_start.saturating_add(1)));
        assert!(report.counters.is_none());
        assert!(report.collection_counters.is_empty());
    }
}
