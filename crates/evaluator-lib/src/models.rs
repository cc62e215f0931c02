//! Core data models for metric specifications and gathered telemetry
//!
//! Specs follow the Kubernetes `autoscaling/v2` `MetricSpec` layout so they
//! can be read straight from HPA-style JSON. All quantities are stored as
//! milli-units (`i64`), the way the Kubernetes metrics APIs report them.

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

/// Per-pod metric values keyed by pod name
pub type PodMetricsInfo = HashMap<String, PodMetric>;

/// Per-pod requested resource quantity in milli-units, keyed by pod name
pub type PodRequests = HashMap<String, i64>;

/// A single metric sample for one pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMetric {
    /// Metric value in milli-units
    pub value: i64,
    /// Window the sample was aggregated over
    #[serde(default, rename = "windowSeconds", with = "window_secs")]
    pub window: Duration,
    /// When the sample was taken
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

impl PodMetric {
    pub fn new(value: i64, window: Duration, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            window,
            timestamp,
        }
    }

    /// A stand-in sample used when rebalancing missing or unready pods
    pub fn synthetic(value: i64) -> Self {
        Self {
            value,
            window: Duration::ZERO,
            timestamp: DateTime::<Utc>::default(),
        }
    }
}

mod window_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(window: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(window.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Kind of metric source a spec refers to.
///
/// Serialized as its Kubernetes name. A name this crate does not know is
/// kept verbatim in `Unknown` so errors can report it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricSourceType {
    Resource,
    Pods,
    Object,
    External,
    /// Recognised by the Kubernetes API but not evaluated here
    ContainerResource,
    Unknown(String),
}

impl MetricSourceType {
    pub fn as_str(&self) -> &str {
        match self {
            MetricSourceType::Resource => "Resource",
            MetricSourceType::Pods => "Pods",
            MetricSourceType::Object => "Object",
            MetricSourceType::External => "External",
            MetricSourceType::ContainerResource => "ContainerResource",
            MetricSourceType::Unknown(name) => name,
        }
    }
}

impl From<String> for MetricSourceType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Resource" => MetricSourceType::Resource,
            "Pods" => MetricSourceType::Pods,
            "Object" => MetricSourceType::Object,
            "External" => MetricSourceType::External,
            "ContainerResource" => MetricSourceType::ContainerResource,
            _ => MetricSourceType::Unknown(name),
        }
    }
}

impl From<MetricSourceType> for String {
    fn from(source_type: MetricSourceType) -> Self {
        source_type.as_str().to_string()
    }
}

impl fmt::Display for MetricSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a metric target is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricTargetType {
    Value,
    AverageValue,
    Utilization,
}

/// Target value for a metric. Exactly one of the value fields is expected
/// to be set, matching `type_`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTarget {
    #[serde(rename = "type")]
    pub type_: MetricTargetType,
    /// Total target value in milli-units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    /// Per-pod target value in milli-units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_value: Option<i64>,
    /// Target percentage of the requested resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_utilization: Option<i32>,
}

impl MetricTarget {
    pub fn value(value: i64) -> Self {
        Self {
            type_: MetricTargetType::Value,
            value: Some(value),
            average_value: None,
            average_utilization: None,
        }
    }

    pub fn average_value(average_value: i64) -> Self {
        Self {
            type_: MetricTargetType::AverageValue,
            value: None,
            average_value: Some(average_value),
            average_utilization: None,
        }
    }

    pub fn utilization(average_utilization: i32) -> Self {
        Self {
            type_: MetricTargetType::Utilization,
            value: None,
            average_value: None,
            average_utilization: Some(average_utilization),
        }
    }
}

/// Names a metric and optionally narrows it with a label selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricIdentifier {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

impl MetricIdentifier {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: None,
        }
    }
}

/// Reference to the Kubernetes object an object metric describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossVersionObjectReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetricSource {
    /// Resource name, e.g. `cpu` or `memory`
    pub name: String,
    pub target: MetricTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodsMetricSource {
    pub metric: MetricIdentifier,
    pub target: MetricTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetricSource {
    pub described_object: CrossVersionObjectReference,
    pub metric: MetricIdentifier,
    pub target: MetricTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalMetricSource {
    pub metric: MetricIdentifier,
    pub target: MetricTarget,
}

/// A single metric an autoscaler should scale on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    #[serde(rename = "type")]
    pub type_: MetricSourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceMetricSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<PodsMetricSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectMetricSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalMetricSource>,
}

impl MetricSpec {
    fn empty(type_: MetricSourceType) -> Self {
        Self {
            type_,
            resource: None,
            pods: None,
            object: None,
            external: None,
        }
    }

    pub fn resource(name: impl Into<String>, target: MetricTarget) -> Self {
        Self {
            resource: Some(ResourceMetricSource {
                name: name.into(),
                target,
            }),
            ..Self::empty(MetricSourceType::Resource)
        }
    }

    pub fn pods(metric: MetricIdentifier, target: MetricTarget) -> Self {
        Self {
            pods: Some(PodsMetricSource { metric, target }),
            ..Self::empty(MetricSourceType::Pods)
        }
    }

    pub fn object(
        described_object: CrossVersionObjectReference,
        metric: MetricIdentifier,
        target: MetricTarget,
    ) -> Self {
        Self {
            object: Some(ObjectMetricSource {
                described_object,
                metric,
                target,
            }),
            ..Self::empty(MetricSourceType::Object)
        }
    }

    pub fn external(metric: MetricIdentifier, target: MetricTarget) -> Self {
        Self {
            external: Some(ExternalMetricSource { metric, target }),
            ..Self::empty(MetricSourceType::External)
        }
    }

    /// Name of the metric or resource this spec targets, if its source is set
    pub fn metric_name(&self) -> Option<&str> {
        match &self.type_ {
            MetricSourceType::Resource => self.resource.as_ref().map(|r| r.name.as_str()),
            MetricSourceType::Pods => self.pods.as_ref().map(|p| p.metric.name.as_str()),
            MetricSourceType::Object => self.object.as_ref().map(|o| o.metric.name.as_str()),
            MetricSourceType::External => self.external.as_ref().map(|e| e.metric.name.as_str()),
            MetricSourceType::ContainerResource | MetricSourceType::Unknown(_) => None,
        }
    }

    /// Short human-readable label, e.g. `Resource/cpu`
    pub fn label(&self) -> String {
        match self.metric_name() {
            Some(name) => format!("{}/{}", self.type_, name),
            None => self.type_.to_string(),
        }
    }
}

/// Gathered data for a resource metric (e.g. CPU or memory)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetric {
    #[serde(default)]
    pub pod_metrics_info: PodMetricsInfo,
    /// Only populated when the target is a utilization percentage
    #[serde(default)]
    pub requests: PodRequests,
    pub ready_pod_count: i64,
    #[serde(default)]
    pub ignored_pods: HashSet<String>,
    #[serde(default)]
    pub missing_pods: HashSet<String>,
    #[serde(default)]
    pub total_pods: usize,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

/// Gathered data for a custom per-pod metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodsMetric {
    #[serde(default)]
    pub pod_metrics_info: PodMetricsInfo,
    pub ready_pod_count: i64,
    #[serde(default)]
    pub ignored_pods: HashSet<String>,
    #[serde(default)]
    pub missing_pods: HashSet<String>,
    #[serde(default)]
    pub total_pods: usize,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

/// Current value of an object or external metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_value: Option<i64>,
}

/// Gathered data for a metric describing a single Kubernetes object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetric {
    pub current: MetricValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_pod_count: Option<i64>,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

/// Gathered data for a metric coming from outside the cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetric {
    pub current: MetricValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_pod_count: Option<i64>,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

/// A metric spec together with the telemetry gathered for it.
///
/// Exactly one payload is populated, the one matching `spec.type_`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatheredMetric {
    pub spec: MetricSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<PodsMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalMetric>,
}

impl GatheredMetric {
    fn bare(spec: MetricSpec) -> Self {
        Self {
            spec,
            resource: None,
            pods: None,
            object: None,
            external: None,
        }
    }

    pub fn with_resource(spec: MetricSpec, resource: ResourceMetric) -> Self {
        Self {
            resource: Some(resource),
            ..Self::bare(spec)
        }
    }

    pub fn with_pods(spec: MetricSpec, pods: PodsMetric) -> Self {
        Self {
            pods: Some(pods),
            ..Self::bare(spec)
        }
    }

    pub fn with_object(spec: MetricSpec, object: ObjectMetric) -> Self {
        Self {
            object: Some(object),
            ..Self::bare(spec)
        }
    }

    pub fn with_external(spec: MetricSpec, external: ExternalMetric) -> Self {
        Self {
            external: Some(external),
            ..Self::bare(spec)
        }
    }

    pub fn label(&self) -> String {
        self.spec.label()
    }
}
