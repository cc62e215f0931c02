//! Replica evaluation library for horizontal pod autoscaling
//!
//! This crate provides:
//! - Replica count calculation from resource, pods, object and external metrics
//! - Multi-metric combination with partial failure reporting
//! - Metric gathering through pluggable metrics and pod sources
//! - An in-memory cluster snapshot source
//! - Prometheus metrics and structured logging

pub mod error;
pub mod evaluate;
pub mod gather;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod replicas;
pub mod selector;
pub mod snapshot;
pub mod utilization;

pub use error::{
    EvaluationError, EvaluationResult, GatherError, GatherResult, MetricFailure, MultiMetricError,
};
pub use evaluate::{Evaluation, Evaluator, Proposal};
pub use gather::{GatherConfig, Gathered, Gatherer};
pub use models::*;
pub use observability::{EvaluatorMetrics, StructuredLogger};
pub use replicas::{ReplicaCalculator, DEFAULT_TOLERANCE};
pub use snapshot::Snapshot;
