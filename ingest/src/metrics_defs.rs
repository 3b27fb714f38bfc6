//! Metrics definitions for the ingestion endpoint.

use shared::metrics_defs::{MetricDef, MetricType};

pub const SUBMISSIONS_ACCEPTED: MetricDef = MetricDef {
    name: "ingest.submissions.accepted",
    metric_type: MetricType::Counter,
    description: "Number of submissions persisted",
};

pub const SUBMISSIONS_REJECTED: MetricDef = MetricDef {
    name: "ingest.submissions.rejected",
    metric_type: MetricType::Counter,
    description: "Number of submissions rejected before persistence",
};

pub const HONEYPOT_DROPS: MetricDef = MetricDef {
    name: "ingest.submissions.honeypot_drops",
    metric_type: MetricType::Counter,
    description: "Number of bot submissions silently accepted and dropped",
};

pub const RATE_LIMITED: MetricDef = MetricDef {
    name: "ingest.rate_limited",
    metric_type: MetricType::Counter,
    description: "Number of requests rejected by the per-form rate limiter",
};

pub const ALL_METRICS: &[MetricDef] = &[
    SUBMISSIONS_ACCEPTED,
    SUBMISSIONS_REJECTED,
    HONEYPOT_DROPS,
    RATE_LIMITED,
];
