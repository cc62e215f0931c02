//! Object metric evaluation
//!
//! An object metric describes a single Kubernetes object (an Ingress, a
//! Service) rather than the scaled pods themselves.

use crate::error::{EvaluationError, EvaluationResult};
use crate::models::{GatheredMetric, MetricSourceType, MetricTargetType};
use crate::replicas::ReplicaCalculator;
use crate::utilization::value_ratio;

const SOURCE: MetricSourceType = MetricSourceType::Object;

pub fn evaluate(
    calculator: &ReplicaCalculator,
    current_replicas: i32,
    gathered: &GatheredMetric,
) -> EvaluationResult<i32> {
    let invalid = EvaluationError::InvalidMetricSource { source_type: SOURCE };
    let target = &gathered.spec.object.as_ref().ok_or(invalid.clone())?.target;
    let metric = gathered
        .object
        .as_ref()
        .ok_or(EvaluationError::MissingPayload { source_type: SOURCE })?;

    match target.type_ {
        MetricTargetType::Value => {
            let target_value = target.value.ok_or(invalid)?;
            let current = metric.current.value.ok_or(missing("current.value"))?;
            let ready_pod_count = metric.ready_pod_count.ok_or(missing("readyPodCount"))?;

            let usage_ratio = value_ratio(current, target_value)?;
            Ok(calculator.usage_ratio_replicas(current_replicas, usage_ratio, ready_pod_count))
        }
        MetricTargetType::AverageValue => {
            let target_average = target.average_value.ok_or(invalid)?;
            let current = metric
                .current
                .average_value
                .ok_or(missing("current.averageValue"))?;

            calculator.average_value_replicas(current_replicas, current, target_average)
        }
        MetricTargetType::Utilization => Err(invalid),
    }
}

fn missing(field: &'static str) -> EvaluationError {
    EvaluationError::MissingValue {
        source_type: SOURCE,
        field,
    }
}
