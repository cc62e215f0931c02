//! Metric gathering
//!
//! Turns metric specs into [`GatheredMetric`]s by querying the collaborator
//! traits in [`source`]. Like evaluation, a spec that fails to gather does not
//! stop the rest; the run only fails when nothing could be gathered.

pub mod external;
pub mod object;
pub mod podutil;
pub mod pods;
pub mod resource;
pub mod source;

pub use source::{is_pod_ready, ListerReadyCounter, MetricsSource, PodLister, PodReadyCounter};

use crate::error::{GatherError, GatherResult, MetricFailure, MultiMetricError};
use crate::models::{GatheredMetric, MetricSourceType, MetricSpec, MetricTargetType};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default window after pod start during which CPU samples are treated with suspicion
pub const DEFAULT_CPU_INITIALIZATION_PERIOD: Duration = Duration::from_secs(300);

/// Default window after pod start during which readiness flaps are ignored
pub const DEFAULT_INITIAL_READINESS_DELAY: Duration = Duration::from_secs(30);

/// Readiness windows applied when grouping pods for CPU metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatherConfig {
    pub cpu_initialization_period: Duration,
    pub delay_of_initial_readiness_status: Duration,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            cpu_initialization_period: DEFAULT_CPU_INITIALIZATION_PERIOD,
            delay_of_initial_readiness_status: DEFAULT_INITIAL_READINESS_DELAY,
        }
    }
}

/// Outcome of gathering a set of specs
#[derive(Debug)]
pub struct Gathered {
    /// Successfully gathered metrics in spec order
    pub metrics: Vec<GatheredMetric>,
    /// Set when some, but not all, specs failed
    pub failures: Option<MultiMetricError<GatherError>>,
}

/// Gathers metrics for autoscaling specs
#[derive(Clone)]
pub struct Gatherer {
    metrics: Arc<dyn MetricsSource>,
    pods: Arc<dyn PodLister>,
    ready: Arc<dyn PodReadyCounter>,
    config: GatherConfig,
}

impl Gatherer {
    pub fn new(
        metrics: Arc<dyn MetricsSource>,
        pods: Arc<dyn PodLister>,
        ready: Arc<dyn PodReadyCounter>,
        config: GatherConfig,
    ) -> Self {
        Self {
            metrics,
            pods,
            ready,
            config,
        }
    }

    /// Build a gatherer from a single type serving metrics and pods, counting
    /// ready pods through its pod listing
    pub fn from_source<S>(source: Arc<S>, config: GatherConfig) -> Self
    where
        S: MetricsSource + PodLister + 'static,
    {
        let pods: Arc<dyn PodLister> = source.clone();
        Self::new(
            source,
            pods.clone(),
            Arc::new(ListerReadyCounter::new(pods)),
            config,
        )
    }

    pub fn config(&self) -> &GatherConfig {
        &self.config
    }

    /// Gather every spec in order.
    ///
    /// Returns `Err` only when no spec could be gathered, including when
    /// `specs` is empty.
    pub async fn gather(
        &self,
        specs: &[MetricSpec],
        namespace: &str,
        pod_selector: &LabelSelector,
    ) -> Result<Gathered, MultiMetricError<GatherError>> {
        let mut metrics = Vec::with_capacity(specs.len());
        let mut errors = Vec::new();

        for spec in specs {
            let label = spec.label();
            match self.gather_single_metric(spec, namespace, pod_selector).await {
                Ok(gathered) => {
                    debug!(metric = %label, namespace, "Gathered metric");
                    metrics.push(gathered);
                }
                Err(error) => {
                    warn!(metric = %label, namespace, error = %error, "Failed to gather metric");
                    errors.push(MetricFailure {
                        metric: label,
                        error,
                    });
                }
            }
        }

        let total = specs.len();
        if metrics.is_empty() {
            return Err(MultiMetricError {
                errors,
                total,
                partial: false,
            });
        }

        Ok(Gathered {
            metrics,
            failures: (!errors.is_empty()).then(|| MultiMetricError {
                errors,
                total,
                partial: true,
            }),
        })
    }

    /// Gather one spec, dispatching on its source and target type
    pub async fn gather_single_metric(
        &self,
        spec: &MetricSpec,
        namespace: &str,
        pod_selector: &LabelSelector,
    ) -> GatherResult<GatheredMetric> {
        let metrics = self.metrics.as_ref();

        match &spec.type_ {
            MetricSourceType::Resource => {
                let source = spec
                    .resource
                    .as_ref()
                    .ok_or_else(|| missing_source(MetricSourceType::Resource))?;
                let gathered = match source.target.type_ {
                    MetricTargetType::AverageValue => {
                        resource::gather_raw(
                            metrics,
                            self.pods.as_ref(),
                            &source.name,
                            namespace,
                            pod_selector,
                            &self.config,
                        )
                        .await?
                    }
                    MetricTargetType::Utilization => {
                        resource::gather(
                            metrics,
                            self.pods.as_ref(),
                            &source.name,
                            namespace,
                            pod_selector,
                            &self.config,
                        )
                        .await?
                    }
                    MetricTargetType::Value => {
                        return Err(GatherError::InvalidMetricSource {
                            source_type: MetricSourceType::Resource,
                            reason: "must be either average value or average utilization".to_string(),
                        })
                    }
                };
                Ok(GatheredMetric::with_resource(spec.clone(), gathered))
            }
            MetricSourceType::Pods => {
                let source = spec
                    .pods
                    .as_ref()
                    .ok_or_else(|| missing_source(MetricSourceType::Pods))?;
                if source.target.type_ != MetricTargetType::AverageValue {
                    return Err(GatherError::InvalidMetricSource {
                        source_type: MetricSourceType::Pods,
                        reason: "must be average value".to_string(),
                    });
                }
                let gathered = pods::gather(
                    metrics,
                    self.pods.as_ref(),
                    &source.metric.name,
                    namespace,
                    pod_selector,
                    source.metric.selector.as_ref(),
                )
                .await?;
                Ok(GatheredMetric::with_pods(spec.clone(), gathered))
            }
            MetricSourceType::Object => {
                let source = spec
                    .object
                    .as_ref()
                    .ok_or_else(|| missing_source(MetricSourceType::Object))?;
                let gathered = match source.target.type_ {
                    MetricTargetType::Value => {
                        object::gather(
                            metrics,
                            self.ready.as_ref(),
                            &source.metric.name,
                            namespace,
                            &source.described_object,
                            pod_selector,
                            source.metric.selector.as_ref(),
                        )
                        .await?
                    }
                    MetricTargetType::AverageValue => {
                        object::gather_per_pod(
                            metrics,
                            &source.metric.name,
                            namespace,
                            &source.described_object,
                            source.metric.selector.as_ref(),
                        )
                        .await?
                    }
                    MetricTargetType::Utilization => {
                        return Err(GatherError::InvalidMetricSource {
                            source_type: MetricSourceType::Object,
                            reason: "must be either value or average value".to_string(),
                        })
                    }
                };
                Ok(GatheredMetric::with_object(spec.clone(), gathered))
            }
            MetricSourceType::External => {
                let source = spec
                    .external
                    .as_ref()
                    .ok_or_else(|| missing_source(MetricSourceType::External))?;
                let gathered = match source.target.type_ {
                    MetricTargetType::AverageValue => {
                        external::gather_per_pod(
                            metrics,
                            &source.metric.name,
                            namespace,
                            source.metric.selector.as_ref(),
                        )
                        .await?
                    }
                    MetricTargetType::Value => {
                        external::gather(
                            metrics,
                            self.ready.as_ref(),
                            &source.metric.name,
                            namespace,
                            source.metric.selector.as_ref(),
                            pod_selector,
                        )
                        .await?
                    }
                    MetricTargetType::Utilization => {
                        return Err(GatherError::InvalidMetricSource {
                            source_type: MetricSourceType::External,
                            reason: "must be either value or average value".to_string(),
                        })
                    }
                };
                Ok(GatheredMetric::with_external(spec.clone(), gathered))
            }
            other => Err(GatherError::UnknownMetricSourceType(other.to_string())),
        }
    }
}

fn missing_source(source_type: MetricSourceType) -> GatherError {
    let reason = format!("spec has type {source_type} but no {source_type} source");
    GatherError::InvalidMetricSource {
        source_type,
        reason,
    }
}
