//! Collaborator traits the gatherer pulls telemetry and pods from

use crate::models::{CrossVersionObjectReference, PodMetricsInfo};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::sync::Arc;

/// Source of metric values, mirroring the resource, custom and external
/// metrics APIs
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Per-pod usage of a resource (e.g. `cpu`), summed over containers
    async fn resource_metric(
        &self,
        resource: &str,
        namespace: &str,
        pod_selector: &LabelSelector,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>)>;

    /// Per-pod values of a custom metric
    async fn raw_metric(
        &self,
        metric_name: &str,
        namespace: &str,
        pod_selector: &LabelSelector,
        metric_selector: Option<&LabelSelector>,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>)>;

    /// Value of a custom metric describing a single object
    async fn object_metric(
        &self,
        metric_name: &str,
        namespace: &str,
        object: &CrossVersionObjectReference,
        metric_selector: Option<&LabelSelector>,
    ) -> Result<(i64, DateTime<Utc>)>;

    /// All series of an external metric matching the selector
    async fn external_metric(
        &self,
        metric_name: &str,
        namespace: &str,
        metric_selector: Option<&LabelSelector>,
    ) -> Result<(Vec<i64>, DateTime<Utc>)>;
}

#[async_trait]
pub trait PodLister: Send + Sync {
    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>>;
}

#[async_trait]
pub trait PodReadyCounter: Send + Sync {
    async fn ready_pod_count(&self, namespace: &str, selector: &LabelSelector) -> Result<i64>;
}

/// Counts ready pods using any [`PodLister`]
#[derive(Clone)]
pub struct ListerReadyCounter {
    lister: Arc<dyn PodLister>,
}

impl ListerReadyCounter {
    pub fn new(lister: Arc<dyn PodLister>) -> Self {
        Self { lister }
    }
}

#[async_trait]
impl PodReadyCounter for ListerReadyCounter {
    async fn ready_pod_count(&self, namespace: &str, selector: &LabelSelector) -> Result<i64> {
        let pods = self.lister.list_pods(namespace, selector).await?;
        Ok(pods.iter().filter(|pod| is_pod_ready(pod)).count() as i64)
    }
}

/// A pod is ready when its `Ready` condition reports `True`
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .into_iter()
        .flatten()
        .any(|condition| condition.type_ == "Ready" && condition.status == "True")
}
