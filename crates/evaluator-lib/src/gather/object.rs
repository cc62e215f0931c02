//! Object metric gathering

use super::source::{MetricsSource, PodReadyCounter};
use crate::error::{GatherError, GatherResult};
use crate::models::{CrossVersionObjectReference, MetricValue, ObjectMetric};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

/// Gather an object metric as a total value, with the ready pod count
pub async fn gather(
    metrics: &dyn MetricsSource,
    ready: &dyn PodReadyCounter,
    metric_name: &str,
    namespace: &str,
    object: &CrossVersionObjectReference,
    pod_selector: &LabelSelector,
    metric_selector: Option<&LabelSelector>,
) -> GatherResult<ObjectMetric> {
    let (value, timestamp) =
        fetch(metrics, metric_name, namespace, object, metric_selector).await?;

    let ready_pod_count = ready
        .ready_pod_count(namespace, pod_selector)
        .await
        .map_err(|e| GatherError::upstream("unable to calculate ready pods", e))?;

    Ok(ObjectMetric {
        current: MetricValue {
            value: Some(value),
            average_value: None,
        },
        ready_pod_count: Some(ready_pod_count),
        timestamp,
    })
}

/// Gather an object metric as a value to be spread across pods
pub async fn gather_per_pod(
    metrics: &dyn MetricsSource,
    metric_name: &str,
    namespace: &str,
    object: &CrossVersionObjectReference,
    metric_selector: Option<&LabelSelector>,
) -> GatherResult<ObjectMetric> {
    let (value, timestamp) =
        fetch(metrics, metric_name, namespace, object, metric_selector).await?;

    Ok(ObjectMetric {
        current: MetricValue {
            value: None,
            average_value: Some(value),
        },
        ready_pod_count: None,
        timestamp,
    })
}

async fn fetch(
    metrics: &dyn MetricsSource,
    metric_name: &str,
    namespace: &str,
    object: &CrossVersionObjectReference,
    metric_selector: Option<&LabelSelector>,
) -> GatherResult<(i64, chrono::DateTime<chrono::Utc>)> {
    metrics
        .object_metric(metric_name, namespace, object, metric_selector)
        .await
        .map_err(|e| {
            GatherError::upstream(
                format!(
                    "unable to get metric {metric_name} for {}/{} in namespace {namespace}",
                    object.kind, object.name
                ),
                e,
            )
        })
}
