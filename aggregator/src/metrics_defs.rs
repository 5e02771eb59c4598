//! Metrics definitions for the aggregator.

use shared::metrics_defs::{MetricDef, MetricType};

pub const RESOLVER_TIER_OUTCOME: MetricDef = MetricDef {
    name: "resolver.tier.outcome",
    metric_type: MetricType::Counter,
    description: "Tier results per resource, tagged by tier and outcome (success, skip, fail)",
};

pub const UPSTREAM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "upstream.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent waiting on an upstream response in seconds",
};

pub const MANUAL_STORE_WRITES: MetricDef = MetricDef {
    name: "manual_store.writes",
    metric_type: MetricType::Counter,
    description: "Administrative writes to the manual document, tagged by result",
};

pub const MANUAL_STORE_READY: MetricDef = MetricDef {
    name: "manual_store.ready",
    metric_type: MetricType::Gauge,
    description: "1 when the manual document could be loaded on the last attempt",
};

pub const ALL_METRICS: &[MetricDef] = &[
    RESOLVER_TIER_OUTCOME,
    UPSTREAM_REQUEST_DURATION,
    MANUAL_STORE_WRITES,
    MANUAL_STORE_READY,
];
