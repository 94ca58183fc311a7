//! Observability: runtime counters and the sink boundary.
//!
//! Engine code records [`MetricsEvent`]s through `sink::record` only; it never
//! touches the counter state directly.

pub(crate) mod metrics;
pub(crate) mod sink;

pub use metrics::{EventOps, EventReport};
pub use sink::{MetricsEvent, MetricsSink, MutationKind, metrics_report, metrics_reset_all, with_metrics_sink};
