//! External metric gathering
//!
//! All series matching the metric selector are summed into one value.

use super::source::{MetricsSource, PodReadyCounter};
use crate::error::{GatherError, GatherResult};
use crate::models::{ExternalMetric, MetricValue};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

/// Gather an external metric as a total value, with the ready pod count
pub async fn gather(
    metrics: &dyn MetricsSource,
    ready: &dyn PodReadyCounter,
    metric_name: &str,
    namespace: &str,
    metric_selector: Option<&LabelSelector>,
    pod_selector: &LabelSelector,
) -> GatherResult<ExternalMetric> {
    let (total, timestamp) = fetch_total(metrics, metric_name, namespace, metric_selector).await?;

    let ready_pod_count = ready
        .ready_pod_count(namespace, pod_selector)
        .await
        .map_err(|e| GatherError::upstream("unable to calculate ready pods", e))?;

    Ok(ExternalMetric {
        current: MetricValue {
            value: Some(total),
            average_value: None,
        },
        ready_pod_count: Some(ready_pod_count),
        timestamp,
    })
}

/// Gather an external metric as a value to be spread across pods
pub async fn gather_per_pod(
    metrics: &dyn MetricsSource,
    metric_name: &str,
    namespace: &str,
    metric_selector: Option<&LabelSelector>,
) -> GatherResult<ExternalMetric> {
    let (total, timestamp) = fetch_total(metrics, metric_name, namespace, metric_selector).await?;

    Ok(ExternalMetric {
        current: MetricValue {
            value: None,
            average_value: Some(total),
        },
        ready_pod_count: None,
        timestamp,
    })
}

async fn fetch_total(
    metrics: &dyn MetricsSource,
    metric_name: &str,
    namespace: &str,
    metric_selector: Option<&LabelSelector>,
) -> GatherResult<(i64, DateTime<Utc>)> {
    let (values, timestamp) = metrics
        .external_metric(metric_name, namespace, metric_selector)
        .await
        .map_err(|e| {
            GatherError::upstream(
                format!("unable to get external metric {namespace}/{metric_name}"),
                e,
            )
        })?;

    let total = values
        .iter()
        .try_fold(0i64, |total, value| total.checked_add(*value))
        .ok_or_else(|| GatherError::Overflow(format!("external metric {namespace}/{metric_name}")))?;

    Ok((total, timestamp))
}
