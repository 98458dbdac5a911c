use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

fn parse_time(ts: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| format!("invalid unix timestamp {ts}"))
}

fn time_or_now(ts: Option<i64>) -> Result<DateTime<Utc>, String> {
    match ts {
        Some(ts) => parse_time(ts),
        None => Ok(Utc::now()),
    }
}

/// Query string of the instant-query endpoints. Times are unix seconds.
#[derive(Debug, Deserialize)]
pub struct InstantQuery {
    pub expr: String,
    #[serde(default)]
    pub scope: String,
    pub time: Option<i64>,
}

impl InstantQuery {
    pub fn time(&self) -> Result<DateTime<Utc>, String> {
        time_or_now(self.time)
    }
}

/// Query string of the range-query endpoints. `step` is in seconds.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub expr: String,
    #[serde(default)]
    pub scope: String,
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl RangeQuery {
    pub fn window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>, Duration), String> {
        window(self.start, self.end, self.step)
    }
}

pub fn window(start: i64, end: i64, step: i64) -> Result<(DateTime<Utc>, DateTime<Utc>, Duration), String> {
    let start = parse_time(start)?;
    let end = parse_time(end)?;
    if start > end {
        return Err(format!("start {start} is after end {end}"));
    }
    if step <= 0 {
        return Err("step must be a positive number of seconds".to_string());
    }
    Ok((start, end, Duration::seconds(step)))
}

/// Batched named-metric lookup; `metrics` is comma-separated.
#[derive(Debug, Deserialize)]
pub struct NamedQuery {
    pub metrics: String,
    #[serde(default)]
    pub scope: String,
    pub time: Option<i64>,
}

impl NamedQuery {
    pub fn names(&self) -> Vec<String> {
        split_csv(&self.metrics)
    }

    pub fn time(&self) -> Result<DateTime<Utc>, String> {
        time_or_now(self.time)
    }
}

#[derive(Debug, Deserialize)]
pub struct NamedRangeQuery {
    pub metrics: String,
    #[serde(default)]
    pub scope: String,
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl NamedRangeQuery {
    pub fn names(&self) -> Vec<String> {
        split_csv(&self.metrics)
    }

    pub fn window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>, Duration), String> {
        window(self.start, self.end, self.step)
    }
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    #[serde(default)]
    pub scope: String,
}

/// `matches` is a comma-separated list of series selectors. The time window
/// defaults to the last hour.
#[derive(Debug, Deserialize)]
pub struct LabelValuesQuery {
    #[serde(default)]
    pub matches: String,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl LabelValuesQuery {
    pub fn matchers(&self) -> Vec<String> {
        split_csv(&self.matches)
    }

    pub fn window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
        default_window(self.start, self.end)
    }
}

#[derive(Debug, Deserialize)]
pub struct LabelSetQuery {
    #[serde(default)]
    pub scope: String,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl LabelSetQuery {
    pub fn window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
        default_window(self.start, self.end)
    }
}

fn default_window(start: Option<i64>, end: Option<i64>) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
    let end = time_or_now(end)?;
    let start = match start {
        Some(ts) => parse_time(ts)?,
        None => end - Duration::hours(1),
    };
    if start > end {
        return Err(format!("start {start} is after end {end}"));
    }
    Ok((start, end))
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_rejects_inverted_range() {
        assert!(window(200, 100, 30).is_err());
    }

    #[test]
    fn window_rejects_non_positive_step() {
        assert!(window(100, 200, 0).is_err());
        assert!(window(100, 200, -15).is_err());
    }

    #[test]
    fn window_accepts_point_range() {
        let (start, end, step) = window(100, 100, 60).unwrap();
        assert_eq!(start, end);
        assert_eq!(step, Duration::seconds(60));
    }

    #[test]
    fn metrics_list_is_trimmed_and_ordered() {
        let q = NamedQuery {
            metrics: " pod_cpu_usage, pod_memory_usage ,,node_load1".to_string(),
            scope: String::new(),
            time: None,
        };
        assert_eq!(q.names(), vec!["pod_cpu_usage", "pod_memory_usage", "node_load1"]);
    }
}
