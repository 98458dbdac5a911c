use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::core::client::monitoring_backend::{MonitoringBackend, QueryOptions};
use crate::domain::monitoring::expressions::{rewrite_prometheus, BackendKind};
use crate::domain::monitoring::model::{
    Metric, MetricData, MetricMetadata, MetricValue, Point,
};

/// Named metrics exposed through the batched endpoints, resolved to plain
/// selectors (recording rule names) so the namespace scope option can be
/// applied with the standard rewrite function.
const NAMED_METRIC_TEMPLATES: &[(&str, &str)] = &[
    ("node_cpu_utilisation", "node:node_cpu_utilisation:avg1m"),
    ("node_memory_utilisation", "node:node_memory_utilisation:"),
    ("node_load1", "node_load1"),
    ("namespace_cpu_usage", "namespace:container_cpu_usage_seconds_total:sum_rate"),
    ("namespace_memory_usage", "namespace:container_memory_usage_bytes:sum"),
    ("pod_cpu_usage", "pod:container_cpu_usage:sum"),
    ("pod_memory_usage", "pod:container_memory_usage_bytes:sum"),
];

/// Prometheus HTTP API client. Speaks `/api/v1/query`, `/query_range`,
/// `/metadata`, `/targets/metadata`, `/label/<name>/values` and `/series`.
pub struct PrometheusClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct PromEnvelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct PromQueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<PromSample>,
}

#[derive(Deserialize)]
struct PromSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    #[serde(default)]
    value: Option<Point>,
    #[serde(default)]
    values: Vec<Point>,
}

#[derive(Deserialize)]
struct PromMetadataEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    help: String,
}

#[derive(Deserialize)]
struct PromTargetMetadata {
    #[serde(default)]
    metric: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    help: String,
}

impl PrometheusClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build Prometheus HTTP client")?;
        Ok(Self { client, endpoint: endpoint.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Fetch a query endpoint and fold any failure (transport, HTTP status,
    /// engine error) into the metric's error slot.
    async fn query(&self, name: &str, path: &str, params: &[(&str, String)]) -> Metric {
        debug!("querying {} with {:?}", path, params);
        let resp = match self.client.get(self.url(path)).query(params).send().await {
            Ok(resp) => resp,
            Err(e) => return Metric::error(name, e.to_string()),
        };
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return Metric::error(name, e.to_string()),
        };
        metric_from_response(name, &body)
    }

    /// Fetch a lookup endpoint, expecting a successful envelope.
    async fn lookup<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let resp = self
            .client
            .get(self.url(path))
            .query(params)
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?;
        let status = resp.status();
        let body = resp.text().await.with_context(|| format!("reading {path} response"))?;
        let envelope: PromEnvelope<T> = serde_json::from_str(&body)
            .with_context(|| format!("{path} returned {status}: unparsable body"))?;
        if envelope.status != "success" {
            return Err(anyhow!(
                "{path} returned {}: {}",
                envelope.status,
                envelope.error.unwrap_or_default()
            ));
        }
        envelope.data.ok_or_else(|| anyhow!("{path} returned no data"))
    }

    fn make_expr(&self, name: &str, opt: &QueryOptions) -> Result<String> {
        let template = NAMED_METRIC_TEMPLATES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
            .ok_or_else(|| anyhow!("unknown named metric {name:?}"))?;
        match opt.scope.as_deref() {
            Some(scope) if !scope.is_empty() => Ok(rewrite_prometheus(template, scope)?),
            _ => Ok(template.to_string()),
        }
    }
}

fn metric_from_response(name: &str, body: &str) -> Metric {
    let envelope: PromEnvelope<PromQueryData> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => return Metric::error(name, format!("unparsable query response: {e}")),
    };
    if envelope.status != "success" {
        return Metric::error(name, envelope.error.unwrap_or_else(|| envelope.status));
    }
    let data = match envelope.data {
        Some(data) => data,
        None => return Metric::error(name, "query response carried no data"),
    };
    let metric_values = data
        .result
        .into_iter()
        .map(|s| MetricValue { metadata: s.metric, sample: s.value, series: s.values })
        .collect();
    Metric::data(name, MetricData { metric_type: data.result_type, metric_values })
}

fn unix(ts: DateTime<Utc>) -> String {
    ts.timestamp().to_string()
}

#[async_trait]
impl MonitoringBackend for PrometheusClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Prometheus
    }

    async fn get_metric(&self, expr: &str, time: DateTime<Utc>) -> Metric {
        self.query("", "/api/v1/query", &[("query", expr.to_string()), ("time", unix(time))])
            .await
    }

    async fn get_metric_over_time(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Metric {
        self.query(
            "",
            "/api/v1/query_range",
            &[
                ("query", expr.to_string()),
                ("start", unix(start)),
                ("end", unix(end)),
                ("step", format!("{}s", step.num_seconds())),
            ],
        )
        .await
    }

    async fn get_named_metrics(
        &self,
        metrics: &[String],
        time: DateTime<Utc>,
        opt: &QueryOptions,
    ) -> Vec<Metric> {
        let mut results = Vec::with_capacity(metrics.len());
        for name in metrics {
            match self.make_expr(name, opt) {
                Ok(expr) => {
                    results.push(
                        self.query(name, "/api/v1/query", &[("query", expr), ("time", unix(time))])
                            .await,
                    );
                }
                Err(e) => results.push(Metric::error(name, e.to_string())),
            }
        }
        results
    }

    async fn get_named_metrics_over_time(
        &self,
        metrics: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
        opt: &QueryOptions,
    ) -> Vec<Metric> {
        let mut results = Vec::with_capacity(metrics.len());
        for name in metrics {
            match self.make_expr(name, opt) {
                Ok(expr) => {
                    results.push(
                        self.query(
                            name,
                            "/api/v1/query_range",
                            &[
                                ("query", expr),
                                ("start", unix(start)),
                                ("end", unix(end)),
                                ("step", format!("{}s", step.num_seconds())),
                            ],
                        )
                        .await,
                    );
                }
                Err(e) => results.push(Metric::error(name, e.to_string())),
            }
        }
        results
    }

    async fn get_metadata(&self, namespace: &str) -> Result<Vec<MetricMetadata>> {
        if namespace.is_empty() {
            let data: BTreeMap<String, Vec<PromMetadataEntry>> =
                self.lookup("/api/v1/metadata", &[]).await?;
            return Ok(data
                .into_iter()
                .filter_map(|(metric, mut entries)| {
                    let first = if entries.is_empty() { return None } else { entries.remove(0) };
                    Some(MetricMetadata { metric, metric_type: first.kind, help: first.help })
                })
                .collect());
        }

        let match_target = format!("{{namespace=\"{namespace}\"}}");
        let data: Vec<PromTargetMetadata> = self
            .lookup("/api/v1/targets/metadata", &[("match_target", match_target)])
            .await?;
        let mut deduped: BTreeMap<String, MetricMetadata> = BTreeMap::new();
        for entry in data {
            if entry.metric.is_empty() {
                continue;
            }
            deduped.entry(entry.metric.clone()).or_insert(MetricMetadata {
                metric: entry.metric,
                metric_type: entry.kind,
                help: entry.help,
            });
        }
        Ok(deduped.into_values().collect())
    }

    async fn get_label_values(
        &self,
        label: &str,
        matchers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut params: Vec<(&str, String)> =
            matchers.iter().map(|m| ("match[]", m.clone())).collect();
        params.push(("start", unix(start)));
        params.push(("end", unix(end)));
        let path = format!("/api/v1/label/{label}/values");
        self.lookup(&path, &params).await
    }

    async fn get_metric_label_set(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HashMap<String, String>>> {
        let params = [
            ("match[]", expr.to_string()),
            ("start", unix(start)),
            ("end", unix(end)),
        ];
        let mut series: Vec<HashMap<String, String>> =
            self.lookup("/api/v1/series", &params).await?;
        for labels in &mut series {
            labels.remove("__name__");
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::monitoring::model::MetricOutcome;

    #[test]
    fn vector_response_becomes_metric_data() {
        let body = r#"{
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {"instance": "n1"}, "value": [1700000000, "0.5"]}
                ]
            }
        }"#;
        let m = metric_from_response("node_load1", body);
        match m.outcome {
            MetricOutcome::Data(data) => {
                assert_eq!(data.metric_type, "vector");
                assert_eq!(data.metric_values.len(), 1);
                let v = &data.metric_values[0];
                assert_eq!(v.metadata["instance"], "n1");
                assert_eq!(v.sample, Some(Point(1700000000.0, 0.5)));
            }
            MetricOutcome::Error(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn matrix_response_keeps_sample_series() {
        let body = r#"{
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [
                    {"metric": {}, "values": [[1, "1"], [2, "2"]]}
                ]
            }
        }"#;
        let m = metric_from_response("node_load1", body);
        match m.outcome {
            MetricOutcome::Data(data) => {
                assert_eq!(data.metric_type, "matrix");
                assert_eq!(data.metric_values[0].series.len(), 2);
            }
            MetricOutcome::Error(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn engine_error_lands_in_error_slot() {
        let body = r#"{"status": "error", "errorType": "bad_data", "error": "parse error"}"#;
        let m = metric_from_response("node_load1", body);
        assert_eq!(m.outcome, MetricOutcome::Error("parse error".to_string()));
    }

    #[test]
    fn named_metric_templates_apply_scope() {
        let client = PrometheusClient::new("http://127.0.0.1:9090").unwrap();
        let expr = client
            .make_expr("pod_cpu_usage", &QueryOptions::scoped("team-a"))
            .unwrap();
        assert_eq!(expr, "pod:container_cpu_usage:sum{namespace=\"team-a\"}");

        let plain = client.make_expr("pod_cpu_usage", &QueryOptions::default()).unwrap();
        assert_eq!(plain, "pod:container_cpu_usage:sum");
    }

    #[test]
    fn unknown_named_metric_is_an_error() {
        let client = PrometheusClient::new("http://127.0.0.1:9090").unwrap();
        assert!(client.make_expr("no_such_metric", &QueryOptions::default()).is_err());
    }

    #[tokio::test]
    async fn batched_results_preserve_order_even_when_unreachable() {
        // Nothing listens on port 1; every query fails, but the response
        // must still be one error element per name, in request order.
        let client = PrometheusClient::new("http://127.0.0.1:1").unwrap();
        let names = vec![
            "node_load1".to_string(),
            "no_such_metric".to_string(),
            "pod_cpu_usage".to_string(),
        ];
        let results = client
            .get_named_metrics(&names, Utc::now(), &QueryOptions::default())
            .await;
        assert_eq!(results.len(), names.len());
        for (metric, name) in results.iter().zip(&names) {
            assert_eq!(&metric.metric_name, name);
            assert!(metric.is_error());
        }
    }
}
