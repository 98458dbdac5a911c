use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::error;

use crate::core::client::monitoring_backend::{MonitoringBackend, QueryOptions};
use crate::domain::monitoring::expressions::ScopeRewriters;
use crate::domain::monitoring::model::{
    LabelValues, Metadata, Metric, MetricLabelSet, Metrics,
};

/// Query façade in front of the monitoring backend. Stateless apart from
/// the backend handle and the rewrite table; performs no caching, no
/// retries and no internal parallelism.
pub struct MonitoringService {
    backend: Arc<dyn MonitoringBackend>,
    rewriters: Arc<ScopeRewriters>,
}

impl MonitoringService {
    pub fn new(backend: Arc<dyn MonitoringBackend>, rewriters: Arc<ScopeRewriters>) -> Self {
        Self { backend, rewriters }
    }

    /// Instant query, delegated verbatim.
    ///
    /// `scope` is accepted for interface symmetry with the label-set lookup
    /// but is not applied to single queries.
    pub async fn get_metric(&self, expr: &str, _scope: &str, time: DateTime<Utc>) -> Result<Metric> {
        Ok(self.backend.get_metric(expr, time).await)
    }

    /// Range query, delegated verbatim. Requires `start <= end` and a
    /// positive step.
    pub async fn get_metric_over_time(
        &self,
        expr: &str,
        _scope: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Metric> {
        validate_window(start, end, step)?;
        Ok(self.backend.get_metric_over_time(expr, start, end, step).await)
    }

    pub async fn get_named_metrics(
        &self,
        metrics: &[String],
        time: DateTime<Utc>,
        opt: &QueryOptions,
    ) -> Metrics {
        Metrics { results: self.backend.get_named_metrics(metrics, time, opt).await }
    }

    pub async fn get_named_metrics_over_time(
        &self,
        metrics: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
        opt: &QueryOptions,
    ) -> Result<Metrics> {
        validate_window(start, end, step)?;
        Ok(Metrics {
            results: self
                .backend
                .get_named_metrics_over_time(metrics, start, end, step, opt)
                .await,
        })
    }

    pub async fn get_metadata(&self, scope: &str) -> Result<Metadata> {
        Ok(Metadata { data: self.backend.get_metadata(scope).await? })
    }

    pub async fn get_label_values(
        &self,
        label: &str,
        matchers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<LabelValues> {
        Ok(LabelValues {
            data: self.backend.get_label_values(label, matchers, start, end).await?,
        })
    }

    /// Label-set lookup. A non-empty scope routes the expression through the
    /// rewrite function for the active backend kind; a rewrite failure is
    /// logged and answered with the empty set so dashboards keep rendering.
    /// An empty scope bypasses rewriting entirely.
    pub async fn get_metric_label_set(
        &self,
        metric: &str,
        scope: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<MetricLabelSet> {
        let expr = if scope.is_empty() {
            metric.to_string()
        } else {
            match self.rewriters.rewrite(self.backend.kind(), metric, scope) {
                Ok(expr) => expr,
                Err(e) => {
                    error!("scoping {metric:?} to {scope:?} failed: {e}");
                    return Ok(MetricLabelSet::default());
                }
            }
        };
        Ok(MetricLabelSet {
            data: self.backend.get_metric_label_set(&expr, start, end).await?,
        })
    }
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<()> {
    if start > end {
        bail!("invalid range: start {start} is after end {end}");
    }
    if step <= Duration::zero() {
        bail!("invalid range: step must be positive");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::domain::monitoring::expressions::BackendKind;
    use crate::domain::monitoring::model::{MetricData, MetricMetadata};

    /// Records every expression it is asked to evaluate and answers with
    /// empty payloads.
    #[derive(Default)]
    struct RecordingBackend {
        seen_exprs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MonitoringBackend for RecordingBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Prometheus
        }

        async fn get_metric(&self, expr: &str, _time: DateTime<Utc>) -> Metric {
            self.seen_exprs.lock().unwrap().push(expr.to_string());
            Metric::data("", MetricData::vector(vec![]))
        }

        async fn get_metric_over_time(
            &self,
            expr: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _step: Duration,
        ) -> Metric {
            self.seen_exprs.lock().unwrap().push(expr.to_string());
            Metric::data("", MetricData::matrix(vec![]))
        }

        async fn get_named_metrics(
            &self,
            metrics: &[String],
            _time: DateTime<Utc>,
            _opt: &QueryOptions,
        ) -> Vec<Metric> {
            metrics
                .iter()
                .map(|name| Metric::data(name, MetricData::vector(vec![])))
                .collect()
        }

        async fn get_named_metrics_over_time(
            &self,
            metrics: &[String],
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _step: Duration,
            _opt: &QueryOptions,
        ) -> Vec<Metric> {
            metrics
                .iter()
                .map(|name| Metric::data(name, MetricData::matrix(vec![])))
                .collect()
        }

        async fn get_metadata(&self, _namespace: &str) -> Result<Vec<MetricMetadata>> {
            Ok(vec![])
        }

        async fn get_label_values(
            &self,
            _label: &str,
            _matchers: &[String],
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<String>> {
            Ok(vec![])
        }

        async fn get_metric_label_set(
            &self,
            expr: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<HashMap<String, String>>> {
            self.seen_exprs.lock().unwrap().push(expr.to_string());
            Ok(vec![])
        }
    }

    fn service(rewriters: ScopeRewriters) -> (Arc<RecordingBackend>, MonitoringService) {
        let backend = Arc::new(RecordingBackend::default());
        let svc = MonitoringService::new(backend.clone(), Arc::new(rewriters));
        (backend, svc)
    }

    #[tokio::test]
    async fn named_metrics_keep_request_order() {
        let (_, svc) = service(ScopeRewriters::with_defaults());
        let names: Vec<String> = ["c", "a", "b"].iter().map(|s| s.to_string()).collect();
        let out = svc
            .get_named_metrics(&names, Utc::now(), &QueryOptions::default())
            .await;
        assert_eq!(out.results.len(), 3);
        let got: Vec<&str> = out.results.iter().map(|m| m.metric_name.as_str()).collect();
        assert_eq!(got, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn range_query_rejects_inverted_window() {
        let (_, svc) = service(ScopeRewriters::with_defaults());
        let now = Utc::now();
        let res = svc
            .get_metric_over_time("up", "", now, now - Duration::hours(1), Duration::seconds(30))
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn range_query_rejects_zero_step() {
        let (_, svc) = service(ScopeRewriters::with_defaults());
        let now = Utc::now();
        let res = svc
            .get_metric_over_time("up", "", now - Duration::hours(1), now, Duration::zero())
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn label_set_scoping_rewrites_expression() {
        let (backend, svc) = service(ScopeRewriters::with_defaults());
        let now = Utc::now();
        let out = svc.get_metric_label_set("up", "team-a", now, now).await.unwrap();
        assert!(out.data.is_empty());
        assert_eq!(
            backend.seen_exprs.lock().unwrap().as_slice(),
            &["up{namespace=\"team-a\"}".to_string()]
        );
    }

    #[tokio::test]
    async fn label_set_empty_scope_bypasses_rewriter() {
        // No function registered; an empty scope must never reach the table.
        let (backend, svc) = service(ScopeRewriters::empty());
        let now = Utc::now();
        svc.get_metric_label_set("up", "", now, now).await.unwrap();
        assert_eq!(backend.seen_exprs.lock().unwrap().as_slice(), &["up".to_string()]);
    }

    #[tokio::test]
    async fn label_set_fails_open_without_rewrite_function() {
        let (backend, svc) = service(ScopeRewriters::empty());
        let now = Utc::now();
        let out = svc.get_metric_label_set("up", "team-a", now, now).await.unwrap();
        assert!(out.data.is_empty());
        // the backend was never consulted
        assert!(backend.seen_exprs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn label_set_fails_open_on_unrewritable_expression() {
        let (backend, svc) = service(ScopeRewriters::with_defaults());
        let now = Utc::now();
        let out = svc
            .get_metric_label_set("sum(rate(up[5m]))", "team-a", now, now)
            .await
            .unwrap();
        assert!(out.data.is_empty());
        assert!(backend.seen_exprs.lock().unwrap().is_empty());
    }
}
