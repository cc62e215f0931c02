//! Gather from a snapshot and evaluate in one step

use anyhow::Result;
use evaluator_lib::{Evaluator, GatherConfig, GatheredMetric};
use tabled::Tabled;

use super::gather::{gather_metrics, GatherRequest};
use super::{evaluate_and_report, RunContext};
use crate::output::{format_percent, format_quantity, OutputFormat};

/// Row for the per-pod resource usage table
#[derive(Tabled)]
struct PodUsageRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Usage")]
    usage: String,
    #[tabled(rename = "Request")]
    request: String,
    #[tabled(rename = "Of Request")]
    percent: String,
}

pub async fn run(
    evaluator: &Evaluator,
    request: &GatherRequest<'_>,
    config: GatherConfig,
    current_replicas: i32,
    ctx: &RunContext,
) -> Result<()> {
    let metrics = gather_metrics(request, config).await?;

    if ctx.format == OutputFormat::Table {
        print_pod_usage(&metrics);
    }

    let workload = format!("{}/{}", request.namespace, request.selector);
    evaluate_and_report(evaluator, &metrics, current_replicas, &workload, ctx)
}

fn print_pod_usage(metrics: &[GatheredMetric]) {
    let mut rows = Vec::new();

    for gathered in metrics {
        let (Some(resource), Some(source)) = (&gathered.resource, &gathered.spec.resource) else {
            continue;
        };

        let mut pods: Vec<_> = resource.pod_metrics_info.iter().collect();
        pods.sort_by(|a, b| a.0.cmp(b.0));

        for (pod, metric) in pods {
            let request = resource.requests.get(pod).copied();
            rows.push(PodUsageRow {
                metric: gathered.label(),
                pod: pod.clone(),
                usage: format_quantity(metric.value, &source.name),
                request: request
                    .map(|r| format_quantity(r, &source.name))
                    .unwrap_or_else(|| "-".to_string()),
                percent: request
                    .filter(|r| *r > 0)
                    .map(|r| format_percent(metric.value as f64 * 100.0 / r as f64))
                    .unwrap_or_else(|| "-".to_string()),
            });
        }
    }

    if !rows.is_empty() {
        let table = tabled::Table::new(rows)
            .with(tabled::settings::Style::rounded())
            .to_string();
        println!("{}", table);
    }
}
