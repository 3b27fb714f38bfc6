//! Metrics definitions for the dispatch pipeline.

use shared::metrics_defs::{MetricDef, MetricType};

pub const INTEGRATION_SUCCESS: MetricDef = MetricDef {
    name: "dispatch.integration.success",
    metric_type: MetricType::Counter,
    description: "Number of integration executions that succeeded",
};

pub const INTEGRATION_FAILURE: MetricDef = MetricDef {
    name: "dispatch.integration.failure",
    metric_type: MetricType::Counter,
    description: "Number of integration executions that failed",
};

pub const FAILURE_NOTIFICATIONS: MetricDef = MetricDef {
    name: "dispatch.notifications",
    metric_type: MetricType::Counter,
    description: "Number of aggregated failure notifications sent to owners",
};

pub const ALL_METRICS: &[MetricDef] = &[
    INTEGRATION_SUCCESS,
    INTEGRATION_FAILURE,
    FAILURE_NOTIFICATIONS,
];
