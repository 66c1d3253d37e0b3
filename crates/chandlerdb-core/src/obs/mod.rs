//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! Structured diagnostics go through `tracing`; counters flow through
//! `MetricsEvent` into the sink boundary defined here.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{CollectionCounters, EventOps, EventReport, EventState};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
