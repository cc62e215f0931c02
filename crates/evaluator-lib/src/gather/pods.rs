//! Custom per-pod metric gathering

use super::podutil::group_pods;
use super::source::{MetricsSource, PodLister};
use crate::error::{GatherError, GatherResult};
use crate::models::{PodMetricsInfo, PodsMetric};
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::HashSet;
use std::time::Duration;

/// Gather a custom metric for every selected pod.
///
/// No readiness rules apply, so no pod is ever ignored. An empty pod list
/// yields an empty metric rather than an error.
pub async fn gather(
    metrics: &dyn MetricsSource,
    pods: &dyn PodLister,
    metric_name: &str,
    namespace: &str,
    pod_selector: &LabelSelector,
    metric_selector: Option<&LabelSelector>,
) -> GatherResult<PodsMetric> {
    let (pod_metrics, timestamp) = metrics
        .raw_metric(metric_name, namespace, pod_selector, metric_selector)
        .await
        .map_err(|e| GatherError::upstream(format!("unable to get metric {metric_name}"), e))?;

    let pod_list = pods.list_pods(namespace, pod_selector).await.map_err(|e| {
        GatherError::upstream("unable to get pods while calculating replica count", e)
    })?;

    if pod_list.is_empty() {
        return Ok(PodsMetric {
            pod_metrics_info: PodMetricsInfo::new(),
            ready_pod_count: 0,
            ignored_pods: HashSet::new(),
            missing_pods: HashSet::new(),
            total_pods: 0,
            timestamp,
        });
    }

    let groups = group_pods(
        &pod_list,
        &pod_metrics,
        None,
        Duration::ZERO,
        Duration::ZERO,
        Utc::now(),
    );

    Ok(PodsMetric {
        pod_metrics_info: pod_metrics,
        ready_pod_count: groups.ready_pod_count,
        ignored_pods: HashSet::new(),
        missing_pods: groups.missing,
        total_pods: pod_list.len(),
        timestamp,
    })
}
