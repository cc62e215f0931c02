//! Usage ratio calculations
//!
//! A usage ratio compares observed load against the target: `1.0` is on
//! target, above scales up, below scales down. Averages use integer division
//! over milli-unit values, so sub-milli remainders are dropped before the
//! ratio is taken. Totals are summed as `i128`; a result that does not fit
//! its output type fails with `Overflow`.

use crate::error::{EvaluationError, EvaluationResult};
use crate::models::{PodMetricsInfo, PodRequests};

/// Outcome of comparing pod usage against pod requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUtilization {
    pub usage_ratio: f64,
    /// Observed usage as a whole percentage of the requests
    pub current_utilization: i32,
    /// Mean raw usage of the pods that had a request, in milli-units
    pub raw_average_value: i64,
}

/// Outcome of comparing the mean of a plain metric against a target value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlainUtilization {
    pub usage_ratio: f64,
    /// Mean metric value in milli-units
    pub current_average: i64,
}

/// Compare summed pod usage to summed pod requests against a target percentage.
///
/// Pods with a metric but no request are skipped.
pub fn resource_utilization_ratio(
    metrics: &PodMetricsInfo,
    requests: &PodRequests,
    target_utilization: i32,
) -> EvaluationResult<ResourceUtilization> {
    let mut metrics_total: i128 = 0;
    let mut requests_total: i128 = 0;
    let mut matched: i128 = 0;

    for (pod, metric) in metrics {
        let Some(request) = requests.get(pod) else {
            continue;
        };
        metrics_total += i128::from(metric.value);
        requests_total += i128::from(*request);
        matched += 1;
    }

    if requests_total == 0 {
        return Err(EvaluationError::NoMatchingMetrics);
    }
    if target_utilization <= 0 {
        return Err(EvaluationError::DivideByZero("target utilization"));
    }

    let current_utilization = i32::try_from((metrics_total * 100) / requests_total)
        .map_err(|_| EvaluationError::Overflow("current utilization"))?;
    let raw_average_value = i64::try_from(metrics_total / matched)
        .map_err(|_| EvaluationError::Overflow("raw average value"))?;

    Ok(ResourceUtilization {
        usage_ratio: f64::from(current_utilization) / f64::from(target_utilization),
        current_utilization,
        raw_average_value,
    })
}

/// Compare the mean metric value across pods against a per-pod target
pub fn plain_utilization_ratio(
    metrics: &PodMetricsInfo,
    target_value: i64,
) -> EvaluationResult<PlainUtilization> {
    if metrics.is_empty() {
        return Err(EvaluationError::DivideByZero("average metric value"));
    }
    if target_value <= 0 {
        return Err(EvaluationError::DivideByZero("target value"));
    }

    let total: i128 = metrics.values().map(|m| i128::from(m.value)).sum();
    let current_average = i64::try_from(total / metrics.len() as i128)
        .map_err(|_| EvaluationError::Overflow("average metric value"))?;

    Ok(PlainUtilization {
        usage_ratio: current_average as f64 / target_value as f64,
        current_average,
    })
}

/// Ratio of a single observed value to its target
pub fn value_ratio(current: i64, target: i64) -> EvaluationResult<f64> {
    if target <= 0 {
        return Err(EvaluationError::DivideByZero("target value"));
    }
    Ok(current as f64 / target as f64)
}
