//! Error types for evaluation and gathering

use crate::models::MetricSourceType;
use std::fmt;
use thiserror::Error;

/// Failure to turn a single gathered metric into a replica proposal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("invalid {source_type} metric source: neither a supported target value nor utilization was set")]
    InvalidMetricSource { source_type: MetricSourceType },

    #[error("no metrics returned matched known pods")]
    NoMatchingMetrics,

    #[error("divide by zero while computing {0}")]
    DivideByZero(&'static str),

    #[error("unknown metric source type {0:?}")]
    UnknownMetricSourceType(String),

    #[error("gathered {source_type} metric has no {source_type} payload")]
    MissingPayload { source_type: MetricSourceType },

    #[error("gathered {source_type} metric is missing {field}")]
    MissingValue {
        source_type: MetricSourceType,
        field: &'static str,
    },

    #[error("overflow while computing {0}")]
    Overflow(&'static str),
}

/// Failure to gather telemetry for a single metric spec
#[derive(Debug, Error)]
pub enum GatherError {
    #[error("invalid {source_type} metric source: {reason}")]
    InvalidMetricSource {
        source_type: MetricSourceType,
        reason: String,
    },

    #[error("unknown metric source type {0:?}")]
    UnknownMetricSourceType(String),

    #[error("{context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("no pods returned by selector while calculating replica count")]
    NoPods,

    #[error("missing request for {resource} in container {container} of pod {pod}")]
    MissingRequest {
        pod: String,
        container: String,
        resource: String,
    },

    #[error("invalid quantity {0:?}")]
    InvalidQuantity(String),

    #[error("overflow while summing {0}")]
    Overflow(String),
}

impl GatherError {
    pub(crate) fn upstream(context: impl Into<String>, source: anyhow::Error) -> Self {
        GatherError::Upstream {
            context: context.into(),
            source,
        }
    }
}

pub type EvaluationResult<T> = Result<T, EvaluationError>;
pub type GatherResult<T> = Result<T, GatherError>;

/// An error tagged with the metric it came from
#[derive(Debug)]
pub struct MetricFailure<E> {
    /// Metric label, e.g. `Resource/cpu`
    pub metric: String,
    pub error: E,
}

impl<E: fmt::Display> fmt::Display for MetricFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.metric, self.error)
    }
}

/// Collected per-metric failures from a multi-metric run.
///
/// `partial` is true when at least one metric still succeeded, in which case
/// the error travels alongside a usable result rather than replacing it.
#[derive(Debug)]
pub struct MultiMetricError<E> {
    pub errors: Vec<MetricFailure<E>>,
    /// Number of metrics in the run
    pub total: usize,
    pub partial: bool,
}

impl<E> MultiMetricError<E> {
    pub fn first(&self) -> Option<&MetricFailure<E>> {
        self.errors.first()
    }
}

impl<E: fmt::Display> fmt::Display for MultiMetricError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            Some(first) => write!(
                f,
                "invalid metrics ({} invalid out of {}), first error is: {}",
                self.errors.len(),
                self.total,
                first
            ),
            None => write!(f, "invalid metrics (0 invalid out of {})", self.total),
        }
    }
}

impl<E> std::error::Error for MultiMetricError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|failure| &failure.error as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_metric_error_message() {
        let err = MultiMetricError {
            errors: vec![
                MetricFailure {
                    metric: "Pods/qps".to_string(),
                    error: EvaluationError::DivideByZero("average metric value"),
                },
                MetricFailure {
                    metric: "Resource/cpu".to_string(),
                    error: EvaluationError::NoMatchingMetrics,
                },
            ],
            total: 3,
            partial: true,
        };

        assert_eq!(
            err.to_string(),
            "invalid metrics (2 invalid out of 3), first error is: Pods/qps: divide by zero while computing average metric value"
        );
    }

    #[test]
    fn test_multi_metric_error_source_is_first_error() {
        use std::error::Error as _;

        let err = MultiMetricError {
            errors: vec![MetricFailure {
                metric: "Resource/cpu".to_string(),
                error: EvaluationError::NoMatchingMetrics,
            }],
            total: 1,
            partial: false,
        };

        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "no metrics returned matched known pods");
    }

    #[test]
    fn test_upstream_error_keeps_context() {
        let err = GatherError::upstream(
            "unable to get metric qps in namespace default",
            anyhow::anyhow!("connection refused"),
        );

        assert_eq!(
            err.to_string(),
            "unable to get metric qps in namespace default: connection refused"
        );
    }
}
