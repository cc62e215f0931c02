//! Resource metric gathering (CPU, memory)

use super::podutil::{calculate_pod_requests, group_pods, remove_metrics_for_pods};
use super::source::{MetricsSource, PodLister};
use super::GatherConfig;
use crate::error::{GatherError, GatherResult};
use crate::models::{PodRequests, ResourceMetric};
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

/// Gather resource usage together with per-pod requests, for utilization targets
pub async fn gather(
    metrics: &dyn MetricsSource,
    pods: &dyn PodLister,
    resource: &str,
    namespace: &str,
    pod_selector: &LabelSelector,
    config: &GatherConfig,
) -> GatherResult<ResourceMetric> {
    gather_with_requests(metrics, pods, resource, namespace, pod_selector, config, true).await
}

/// Gather raw resource usage without requests, for average value targets
pub async fn gather_raw(
    metrics: &dyn MetricsSource,
    pods: &dyn PodLister,
    resource: &str,
    namespace: &str,
    pod_selector: &LabelSelector,
    config: &GatherConfig,
) -> GatherResult<ResourceMetric> {
    gather_with_requests(metrics, pods, resource, namespace, pod_selector, config, false).await
}

async fn gather_with_requests(
    metrics: &dyn MetricsSource,
    pods: &dyn PodLister,
    resource: &str,
    namespace: &str,
    pod_selector: &LabelSelector,
    config: &GatherConfig,
    with_requests: bool,
) -> GatherResult<ResourceMetric> {
    let (mut pod_metrics, timestamp) = metrics
        .resource_metric(resource, namespace, pod_selector)
        .await
        .map_err(|e| {
            GatherError::upstream(format!("unable to get metrics for resource {resource}"), e)
        })?;

    let pod_list = pods.list_pods(namespace, pod_selector).await.map_err(|e| {
        GatherError::upstream("unable to get pods while calculating replica count", e)
    })?;
    if pod_list.is_empty() {
        return Err(GatherError::NoPods);
    }

    let groups = group_pods(
        &pod_list,
        &pod_metrics,
        Some(resource),
        config.cpu_initialization_period,
        config.delay_of_initial_readiness_status,
        Utc::now(),
    );
    remove_metrics_for_pods(&mut pod_metrics, &groups.ignored);

    let requests = if with_requests {
        calculate_pod_requests(&pod_list, resource)?
    } else {
        PodRequests::new()
    };

    Ok(ResourceMetric {
        pod_metrics_info: pod_metrics,
        requests,
        ready_pod_count: groups.ready_pod_count,
        ignored_pods: groups.ignored,
        missing_pods: groups.missing,
        total_pods: pod_list.len(),
        timestamp,
    })
}
