use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::monitoring::expressions::BackendKind;
use crate::domain::monitoring::model::{Metric, MetricMetadata};

/// Options applied when resolving named metrics to backend expressions.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Namespace to restrict evaluation to; `None` queries cluster-wide.
    pub scope: Option<String>,
}

impl QueryOptions {
    pub fn scoped(scope: impl Into<String>) -> Self {
        Self { scope: Some(scope.into()) }
    }
}

/// The query-engine side of the façade. Implementations own all protocol
/// work; this layer only shapes requests and wraps responses.
///
/// Query operations fold failures into the [`Metric`] error variant so a
/// batch can degrade per element. The lookup operations return `Err` on
/// transport failure instead, since their payloads have no error slot.
#[async_trait]
pub trait MonitoringBackend: Send + Sync {
    /// Which scope rewrite function applies to this backend's expressions.
    fn kind(&self) -> BackendKind;

    async fn get_metric(&self, expr: &str, time: DateTime<Utc>) -> Metric;

    async fn get_metric_over_time(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Metric;

    /// Resolve and evaluate each name in order. The returned vector has one
    /// element per requested name, in request order, errors isolated per
    /// element.
    async fn get_named_metrics(
        &self,
        metrics: &[String],
        time: DateTime<Utc>,
        opt: &QueryOptions,
    ) -> Vec<Metric>;

    async fn get_named_metrics_over_time(
        &self,
        metrics: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
        opt: &QueryOptions,
    ) -> Vec<Metric>;

    async fn get_metadata(&self, namespace: &str) -> Result<Vec<MetricMetadata>>;

    async fn get_label_values(
        &self,
        label: &str,
        matchers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    async fn get_metric_label_set(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HashMap<String, String>>>;
}
