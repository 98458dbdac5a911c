use std::collections::HashMap;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const METRIC_TYPE_VECTOR: &str = "vector";
pub const METRIC_TYPE_MATRIX: &str = "matrix";

/// One sample: unix timestamp (seconds) plus value.
///
/// Serialized the Prometheus way, `[ts, "value"]`, with the value carried as
/// a string so that NaN and infinities survive JSON.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point(pub f64, pub f64);

impl Point {
    pub fn timestamp(&self) -> f64 {
        self.0
    }

    pub fn value(&self) -> f64 {
        self.1
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.0, format_sample_value(self.1)).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (ts, raw): (f64, String) = Deserialize::deserialize(deserializer)?;
        let value = parse_sample_value(&raw).map_err(D::Error::custom)?;
        Ok(Point(ts, value))
    }
}

pub fn format_sample_value(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "+Inf".to_string() } else { "-Inf".to_string() }
    } else {
        value.to_string()
    }
}

pub fn parse_sample_value(raw: &str) -> Result<f64, String> {
    match raw {
        "+Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => raw
            .parse::<f64>()
            .map_err(|e| format!("invalid sample value {raw:?}: {e}")),
    }
}

/// One series of a query result: its label set plus either a single sample
/// (instant queries) or a series of samples (range queries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricValue {
    #[serde(rename = "metric", default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(rename = "value", default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Point>,
    #[serde(rename = "values", default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    #[serde(rename = "resultType")]
    pub metric_type: String,
    #[serde(rename = "result")]
    pub metric_values: Vec<MetricValue>,
}

impl MetricData {
    pub fn vector(metric_values: Vec<MetricValue>) -> Self {
        Self { metric_type: METRIC_TYPE_VECTOR.to_string(), metric_values }
    }

    pub fn matrix(metric_values: Vec<MetricValue>) -> Self {
        Self { metric_type: METRIC_TYPE_MATRIX.to_string(), metric_values }
    }
}

/// A query result is either a payload or an error message, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricOutcome {
    Data(MetricData),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "metric_name", default, skip_serializing_if = "String::is_empty")]
    pub metric_name: String,
    #[serde(flatten)]
    pub outcome: MetricOutcome,
}

impl Metric {
    pub fn data(name: impl Into<String>, data: MetricData) -> Self {
        Self { metric_name: name.into(), outcome: MetricOutcome::Data(data) }
    }

    pub fn error(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self { metric_name: name.into(), outcome: MetricOutcome::Error(error.into()) }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, MetricOutcome::Error(_))
    }
}

/// Batched query response. Element order matches request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metrics {
    pub results: Vec<Metric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricMetadata {
    pub metric: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub help: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metadata {
    pub data: Vec<MetricMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LabelValues {
    pub data: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricLabelSet {
    pub data: Vec<HashMap<String, String>>,
}

/// Entity kinds the stats endpoints count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Cluster,
    WorkspaceTemplate,
    User,
    Namespace,
    DevopsProject,
    Member,
    Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountOutcome {
    Count { value: u64, timestamp: i64 },
    Error { error: String },
}

/// A point-in-time count of one entity kind, or the list error that
/// prevented counting it. Computed fresh per call, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCount {
    pub kind: EntityKind,
    #[serde(flatten)]
    pub outcome: CountOutcome,
}

impl EntityCount {
    pub fn counted(kind: EntityKind, value: u64, timestamp: i64) -> Self {
        Self { kind, outcome: CountOutcome::Count { value, timestamp } }
    }

    pub fn error(kind: EntityKind, error: impl Into<String>) -> Self {
        Self { kind, outcome: CountOutcome::Error { error: error.into() } }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn point_serializes_as_prometheus_pair() {
        let p = Point(1700000000.0, 2.5);
        assert_eq!(p.timestamp(), 1700000000.0);
        assert_eq!(serde_json::to_value(p).unwrap(), json!([1700000000.0, "2.5"]));
    }

    #[test]
    fn point_roundtrips_infinities() {
        let p: Point = serde_json::from_value(json!([1.0, "+Inf"])).unwrap();
        assert_eq!(p.value(), f64::INFINITY);
        assert_eq!(serde_json::to_value(p).unwrap(), json!([1.0, "+Inf"]));
    }

    #[test]
    fn metric_carries_data_xor_error() {
        let ok = Metric::data("node_load1", MetricData::vector(vec![]));
        let v = serde_json::to_value(&ok).unwrap();
        assert!(v.get("data").is_some());
        assert!(v.get("error").is_none());

        let failed = Metric::error("node_load1", "query timed out");
        let v = serde_json::to_value(&failed).unwrap();
        assert!(v.get("data").is_none());
        assert_eq!(v["error"], "query timed out");
    }

    #[test]
    fn entity_count_flattens_outcome() {
        let c = EntityCount::counted(EntityKind::WorkspaceTemplate, 3, 1700000000);
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            json!({"kind": "workspace_template", "value": 3, "timestamp": 1700000000})
        );

        let e = EntityCount::error(EntityKind::User, "list failed");
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({"kind": "user", "error": "list failed"})
        );
    }
}
