//! Pod classification and request calculation

use crate::error::{GatherError, GatherResult};
use crate::models::{PodMetricsInfo, PodRequests};
use crate::quantity::parse_milli;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use k8s_openapi::api::core::v1::{Pod, PodCondition};
use std::collections::HashSet;
use std::time::Duration;

/// Partition of the selected pods
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodGroups {
    pub ready_pod_count: i64,
    /// Pods excluded from the calculation: terminating, failed, pending, or
    /// not yet through CPU initialization
    pub ignored: HashSet<String>,
    /// Pods with no metric sample
    pub missing: HashSet<String>,
}

/// Split pods into ready, ignored and missing.
///
/// CPU readiness rules only apply when `resource` is `Some("cpu")`: a pod
/// still inside `cpu_initialization_period` only counts if it is ready and its
/// sample was taken after it became ready, and an older pod is ignored only
/// if it never became ready after `delay_of_initial_readiness_status`.
pub fn group_pods(
    pods: &[Pod],
    metrics: &PodMetricsInfo,
    resource: Option<&str>,
    cpu_initialization_period: Duration,
    delay_of_initial_readiness_status: Duration,
    now: DateTime<Utc>,
) -> PodGroups {
    let mut groups = PodGroups::default();

    for pod in pods {
        let Some(name) = pod.metadata.name.clone() else {
            continue;
        };
        let status = pod.status.as_ref();
        let phase = status.and_then(|s| s.phase.as_deref());

        if pod.metadata.deletion_timestamp.is_some() || phase == Some("Failed") {
            groups.ignored.insert(name);
            continue;
        }
        if phase == Some("Pending") {
            groups.ignored.insert(name);
            continue;
        }

        let Some(metric) = metrics.get(&name) else {
            groups.missing.insert(name);
            continue;
        };

        if resource == Some("cpu") {
            let condition = status
                .and_then(|s| s.conditions.as_ref())
                .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"));
            let start_time = status.and_then(|s| s.start_time.as_ref()).map(|t| t.0);

            let unready = match (condition, start_time) {
                (Some(condition), Some(start)) => {
                    let transitioned = last_transition(condition);
                    if offset(start, cpu_initialization_period) > now {
                        // The sample must cover only time after the pod became ready
                        condition.status == "False"
                            || metric.timestamp < offset(transitioned, metric.window)
                    } else {
                        condition.status == "False"
                            && offset(start, delay_of_initial_readiness_status) > transitioned
                    }
                }
                _ => true,
            };

            if unready {
                groups.ignored.insert(name);
                continue;
            }
        }

        groups.ready_pod_count += 1;
    }

    groups
}

/// Drop the samples of the given pods
pub fn remove_metrics_for_pods(metrics: &mut PodMetricsInfo, pods: &HashSet<String>) {
    metrics.retain(|pod, _| !pods.contains(pod));
}

/// Sum each pod's container requests for `resource`, in milli-units.
///
/// Every container must declare a request.
pub fn calculate_pod_requests(pods: &[Pod], resource: &str) -> GatherResult<PodRequests> {
    let mut requests = PodRequests::with_capacity(pods.len());

    for pod in pods {
        let pod_name = pod.metadata.name.clone().unwrap_or_default();
        let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or_default();

        let mut total = 0i64;
        for container in containers {
            let quantity = container
                .resources
                .as_ref()
                .and_then(|r| r.requests.as_ref())
                .and_then(|r| r.get(resource))
                .ok_or_else(|| GatherError::MissingRequest {
                    pod: pod_name.clone(),
                    container: container.name.clone(),
                    resource: resource.to_string(),
                })?;
            total = total
                .checked_add(parse_milli(&quantity.0)?)
                .ok_or_else(|| GatherError::Overflow(format!("{resource} requests of pod {pod_name}")))?;
        }

        requests.insert(pod_name, total);
    }

    Ok(requests)
}

fn last_transition(condition: &PodCondition) -> DateTime<Utc> {
    condition
        .last_transition_time
        .as_ref()
        .map(|t| t.0)
        .unwrap_or_default()
}

fn offset(time: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    ChronoDuration::from_std(duration)
        .ok()
        .and_then(|d| time.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
pub(crate) mod test_pods {
    //! Pod builders shared by the gathering tests

    use chrono::{DateTime, Utc};
    use k8s_openapi::api::core::v1::{
        Container, Pod, PodCondition, PodSpec, PodStatus, ResourceRequirements,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use std::collections::BTreeMap;

    pub fn running(name: &str, cpu_request: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "app".to_string(),
                    resources: Some(ResourceRequirements {
                        requests: Some(BTreeMap::from([(
                            "cpu".to_string(),
                            Quantity(cpu_request.to_string()),
                        )])),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                start_time: Some(Time(at("2024-01-01T00:00:00Z"))),
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: "True".to_string(),
                    last_transition_time: Some(Time(at("2024-01-01T00:00:20Z"))),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
        }
    }

    pub fn with_phase(mut pod: Pod, phase: &str) -> Pod {
        if let Some(status) = pod.status.as_mut() {
            status.phase = Some(phase.to_string());
        }
        pod
    }

    pub fn with_ready(mut pod: Pod, ready: &str, transitioned: &str) -> Pod {
        if let Some(condition) = pod
            .status
            .as_mut()
            .and_then(|s| s.conditions.as_mut())
            .and_then(|c| c.first_mut())
        {
            condition.status = ready.to_string();
            condition.last_transition_time = Some(Time(at(transitioned)));
        }
        pod
    }

    pub fn at(timestamp: &str) -> DateTime<Utc> {
        timestamp.parse().expect("valid RFC 3339 timestamp")
    }
}
