//! In-memory cluster snapshot
//!
//! A [`Snapshot`] holds pods and metric values captured from a cluster (or
//! written by hand) and serves them through the gathering traits, so the
//! full gather and evaluate cycle can run without a live API server.

use crate::gather::{MetricsSource, PodLister};
use crate::models::{CrossVersionObjectReference, PodMetricsInfo};
use crate::selector;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Value of a custom metric describing one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetricSample {
    pub kind: String,
    pub name: String,
    pub metric: String,
    /// Milli-units
    pub value: i64,
}

/// One series of an external metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalMetricSample {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Milli-units
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub pods: Vec<Pod>,
    /// Resource name to per-pod usage
    #[serde(default)]
    pub resource_metrics: HashMap<String, PodMetricsInfo>,
    /// Custom metric name to per-pod values
    #[serde(default)]
    pub pod_metrics: HashMap<String, PodMetricsInfo>,
    #[serde(default)]
    pub object_metrics: Vec<ObjectMetricSample>,
    /// External metric name to its series
    #[serde(default)]
    pub external_metrics: HashMap<String, Vec<ExternalMetricSample>>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))
    }

    fn selected_pods<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a LabelSelector,
    ) -> impl Iterator<Item = &'a Pod> + 'a {
        self.pods.iter().filter(move |pod| {
            let pod_namespace = pod.metadata.namespace.as_deref().unwrap_or("default");
            let labels = pod.metadata.labels.clone().unwrap_or_default();
            pod_namespace == namespace && selector::matches(selector, &labels)
        })
    }

    /// Restrict per-pod values to the selected pods
    fn pod_values(
        &self,
        values: &PodMetricsInfo,
        namespace: &str,
        selector: &LabelSelector,
        api: &str,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>)> {
        let selected: PodMetricsInfo = self
            .selected_pods(namespace, selector)
            .filter_map(|pod| pod.metadata.name.as_ref())
            .filter_map(|name| values.get(name).map(|metric| (name.clone(), *metric)))
            .collect();

        if selected.is_empty() {
            bail!("no metrics returned from {api}");
        }

        let timestamp = selected
            .values()
            .map(|m| m.timestamp)
            .max()
            .unwrap_or(self.timestamp);
        Ok((selected, timestamp))
    }
}

/// Per-pod and object samples carry no labels of their own, so a non-empty
/// metric selector on `raw_metric` or `object_metric` is rejected instead of
/// being ignored. External series are filtered by their labels.
#[async_trait]
impl MetricsSource for Snapshot {
    async fn resource_metric(
        &self,
        resource: &str,
        namespace: &str,
        pod_selector: &LabelSelector,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>)> {
        let values = self
            .resource_metrics
            .get(resource)
            .ok_or_else(|| anyhow!("no metrics returned from resource metrics API"))?;
        self.pod_values(values, namespace, pod_selector, "resource metrics API")
    }

    async fn raw_metric(
        &self,
        metric_name: &str,
        namespace: &str,
        pod_selector: &LabelSelector,
        metric_selector: Option<&LabelSelector>,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>)> {
        reject_metric_selector(metric_selector, metric_name)?;
        let values = self
            .pod_metrics
            .get(metric_name)
            .ok_or_else(|| anyhow!("no metrics returned from custom metrics API"))?;
        self.pod_values(values, namespace, pod_selector, "custom metrics API")
    }

    async fn object_metric(
        &self,
        metric_name: &str,
        _namespace: &str,
        object: &CrossVersionObjectReference,
        metric_selector: Option<&LabelSelector>,
    ) -> Result<(i64, DateTime<Utc>)> {
        reject_metric_selector(metric_selector, metric_name)?;
        self.object_metrics
            .iter()
            .find(|s| s.metric == metric_name && s.kind == object.kind && s.name == object.name)
            .map(|s| (s.value, self.timestamp))
            .ok_or_else(|| {
                anyhow!(
                    "no metric {metric_name} returned from custom metrics API for {}/{}",
                    object.kind,
                    object.name
                )
            })
    }

    async fn external_metric(
        &self,
        metric_name: &str,
        _namespace: &str,
        metric_selector: Option<&LabelSelector>,
    ) -> Result<(Vec<i64>, DateTime<Utc>)> {
        let series = self
            .external_metrics
            .get(metric_name)
            .ok_or_else(|| anyhow!("no metrics returned from external metrics API"))?;

        let values: Vec<i64> = series
            .iter()
            .filter(|s| metric_selector.map_or(true, |sel| selector::matches(sel, &s.labels)))
            .map(|s| s.value)
            .collect();
        if values.is_empty() {
            bail!("no metrics returned from external metrics API");
        }
        Ok((values, self.timestamp))
    }
}

#[async_trait]
impl PodLister for Snapshot {
    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>> {
        Ok(self.selected_pods(namespace, selector).cloned().collect())
    }
}

fn reject_metric_selector(selector: Option<&LabelSelector>, metric_name: &str) -> Result<()> {
    let Some(selector) = selector else {
        return Ok(());
    };
    let has_labels = selector.match_labels.as_ref().is_some_and(|l| !l.is_empty());
    let has_expressions = selector
        .match_expressions
        .as_ref()
        .is_some_and(|e| !e.is_empty());
    if has_labels || has_expressions {
        bail!("snapshot samples for metric {metric_name} have no labels to match a metric selector");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "pods": [
            {
                "metadata": { "name": "web-1", "namespace": "shop", "labels": { "app": "web" } },
                "status": { "phase": "Running" }
            },
            {
                "metadata": { "name": "web-2", "namespace": "shop", "labels": { "app": "web" } },
                "status": { "phase": "Running" }
            },
            {
                "metadata": { "name": "db-1", "namespace": "shop", "labels": { "app": "db" } }
            }
        ],
        "resourceMetrics": {
            "cpu": {
                "web-1": { "value": 120, "windowSeconds": 60, "timestamp": "2024-05-01T12:00:00Z" },
                "db-1": { "value": 900, "windowSeconds": 60, "timestamp": "2024-05-01T12:00:00Z" }
            }
        },
        "podMetrics": {
            "requests_per_second": {
                "web-1": { "value": 4000, "windowSeconds": 60, "timestamp": "2024-05-01T12:00:00Z" }
            }
        },
        "externalMetrics": {
            "queue_messages_ready": [
                { "labels": { "queue": "orders" }, "value": 30000 },
                { "labels": { "queue": "emails" }, "value": 5000 }
            ]
        },
        "timestamp": "2024-05-01T12:00:00Z"
    }"#;

    fn load() -> Snapshot {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();
        Snapshot::load(file.path()).unwrap()
    }

    #[tokio::test]
    async fn test_list_pods_filters_by_namespace_and_labels() {
        let snapshot = load();
        let web = selector::parse("app=web").unwrap();

        let pods = snapshot.list_pods("shop", &web).await.unwrap();
        assert_eq!(pods.len(), 2);

        let other = snapshot.list_pods("default", &web).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_resource_metric_only_selected_pods() {
        let snapshot = load();
        let web = selector::parse("app=web").unwrap();

        let (metrics, timestamp) = snapshot.resource_metric("cpu", "shop", &web).await.unwrap();

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics["web-1"].value, 120);
        assert_eq!(timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[tokio::test]
    async fn test_unknown_resource_fails() {
        let snapshot = load();
        let err = snapshot
            .resource_metric("memory", "shop", &LabelSelector::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no metrics returned"));
    }

    #[tokio::test]
    async fn test_external_metric_selector() {
        let snapshot = load();
        let orders = selector::parse("queue=orders").unwrap();

        let (all, _) = snapshot
            .external_metric("queue_messages_ready", "shop", None)
            .await
            .unwrap();
        let (filtered, _) = snapshot
            .external_metric("queue_messages_ready", "shop", Some(&orders))
            .await
            .unwrap();

        assert_eq!(all.iter().sum::<i64>(), 35000);
        assert_eq!(filtered, vec![30000]);
    }

    #[tokio::test]
    async fn test_raw_metric_rejects_metric_selector() {
        let snapshot = load();
        let web = selector::parse("app=web").unwrap();
        let by_path = selector::parse("path=checkout").unwrap();

        let (metrics, _) = snapshot
            .raw_metric("requests_per_second", "shop", &web, Some(&LabelSelector::default()))
            .await
            .unwrap();
        assert_eq!(metrics["web-1"].value, 4000);

        let err = snapshot
            .raw_metric("requests_per_second", "shop", &web, Some(&by_path))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("metric selector"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Snapshot::load("/nonexistent/snapshot.json").unwrap_err();
        assert!(err.to_string().contains("failed to read snapshot"));
    }
}
