//! Tolerance-banded replica count calculation
//!
//! Every calculation here compares a usage ratio against a dead-band around
//! `1.0`. Inside the band the current replica count is kept so the workload
//! does not flap on small fluctuations.
//!
//! Pods that returned no metric (missing) or are not yet ready (ignored) are
//! filled in with conservative stand-in values before the ratio is
//! recomputed: on a scale-down missing pods count as fully loaded, on a
//! scale-up missing and ignored pods count as idle. If filling them in would
//! reverse the scaling direction, nothing changes.

use crate::error::{EvaluationError, EvaluationResult};
use crate::models::{PodMetric, PodMetricsInfo, PodRequests};
use crate::utilization::{plain_utilization_ratio, resource_utilization_ratio};
use std::borrow::Cow;
use std::collections::HashSet;

/// Default dead-band around a usage ratio of 1.0
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Replica calculator holding the scaling tolerance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicaCalculator {
    pub tolerance: f64,
}

impl Default for ReplicaCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl ReplicaCalculator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Whether a usage ratio is close enough to 1.0 to leave replicas alone
    pub fn within_tolerance(&self, usage_ratio: f64) -> bool {
        (1.0 - usage_ratio).abs() <= self.tolerance
    }

    /// Replica count for a precomputed usage ratio.
    ///
    /// Scaling from zero ignores the ready pod count and returns
    /// `ceil(usage_ratio)`.
    pub fn usage_ratio_replicas(
        &self,
        current_replicas: i32,
        usage_ratio: f64,
        ready_pod_count: i64,
    ) -> i32 {
        if current_replicas == 0 {
            return ceil_replicas(usage_ratio);
        }
        if self.within_tolerance(usage_ratio) {
            return current_replicas;
        }
        ceil_replicas(usage_ratio * ready_pod_count as f64)
    }

    /// Replica count for a per-pod metric compared against a per-pod target value
    pub fn plain_metric_replicas(
        &self,
        metrics: &PodMetricsInfo,
        current_replicas: i32,
        target_value: i64,
        ready_pod_count: i64,
        missing_pods: &HashSet<String>,
        ignored_pods: &HashSet<String>,
    ) -> EvaluationResult<i32> {
        let ratio_of =
            |m: &PodMetricsInfo| plain_utilization_ratio(m, target_value).map(|u| u.usage_ratio);

        self.rebalanced_replicas(
            metrics,
            current_replicas,
            ready_pod_count,
            missing_pods,
            ignored_pods,
            ratio_of,
            |_, usage_ratio| Some(if usage_ratio < 1.0 { target_value } else { 0 }),
        )
    }

    /// Replica count for resource usage compared against a utilization
    /// percentage of the pods' requests
    #[allow(clippy::too_many_arguments)]
    pub fn resource_utilization_replicas(
        &self,
        metrics: &PodMetricsInfo,
        requests: &PodRequests,
        current_replicas: i32,
        target_utilization: i32,
        ready_pod_count: i64,
        missing_pods: &HashSet<String>,
        ignored_pods: &HashSet<String>,
    ) -> EvaluationResult<i32> {
        let ratio_of = |m: &PodMetricsInfo| {
            resource_utilization_ratio(m, requests, target_utilization).map(|u| u.usage_ratio)
        };

        // A ratio of exactly 1.0 leaves missing pods out of the recomputation
        self.rebalanced_replicas(
            metrics,
            current_replicas,
            ready_pod_count,
            missing_pods,
            ignored_pods,
            ratio_of,
            |pod, usage_ratio| {
                if usage_ratio < 1.0 {
                    Some(requests.get(pod).copied().unwrap_or(0))
                } else if usage_ratio > 1.0 {
                    Some(0)
                } else {
                    None
                }
            },
        )
    }

    /// Replica count for a total value that should be spread across pods at
    /// `target_per_pod` each
    pub fn average_value_replicas(
        &self,
        current_replicas: i32,
        current_total: i64,
        target_per_pod: i64,
    ) -> EvaluationResult<i32> {
        if target_per_pod <= 0 {
            return Err(EvaluationError::DivideByZero("target average value"));
        }

        let usage_ratio =
            current_total as f64 / (target_per_pod as f64 * f64::from(current_replicas));
        if self.within_tolerance(usage_ratio) {
            return Ok(current_replicas);
        }
        Ok(ceil_replicas(current_total as f64 / target_per_pod as f64))
    }

    /// Shared fast-path / rebalance flow.
    ///
    /// `missing_value` receives the pod name and the initial usage ratio and
    /// returns the stand-in value for a missing pod, or `None` to leave it out.
    /// The caller's metrics are only cloned when stand-ins are needed.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn rebalanced_replicas<R, F>(
        &self,
        metrics: &PodMetricsInfo,
        current_replicas: i32,
        ready_pod_count: i64,
        missing_pods: &HashSet<String>,
        ignored_pods: &HashSet<String>,
        ratio_of: R,
        missing_value: F,
    ) -> EvaluationResult<i32>
    where
        R: Fn(&PodMetricsInfo) -> EvaluationResult<f64>,
        F: Fn(&str, f64) -> Option<i64>,
    {
        let usage_ratio = ratio_of(metrics)?;
        let rebalance_ignored = !ignored_pods.is_empty() && usage_ratio > 1.0;

        if !rebalance_ignored && missing_pods.is_empty() {
            if self.within_tolerance(usage_ratio) {
                return Ok(current_replicas);
            }
            return Ok(ceil_replicas(usage_ratio * ready_pod_count as f64));
        }

        let mut adjusted = Cow::Borrowed(metrics);
        for pod in missing_pods {
            if let Some(value) = missing_value(pod, usage_ratio) {
                adjusted
                    .to_mut()
                    .insert(pod.clone(), PodMetric::synthetic(value));
            }
        }
        if rebalance_ignored {
            for pod in ignored_pods {
                adjusted.to_mut().insert(pod.clone(), PodMetric::synthetic(0));
            }
        }

        let new_usage_ratio = ratio_of(&adjusted)?;
        let flipped = (usage_ratio < 1.0 && new_usage_ratio > 1.0)
            || (usage_ratio > 1.0 && new_usage_ratio < 1.0);

        if self.within_tolerance(new_usage_ratio) || flipped {
            return Ok(current_replicas);
        }

        Ok(ceil_replicas(new_usage_ratio * adjusted.len() as f64))
    }
}

/// Round a fractional replica count up, saturating into `0..=i32::MAX`
pub(crate) fn ceil_replicas(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    value.ceil().clamp(0.0, f64::from(i32::MAX)) as i32
}
