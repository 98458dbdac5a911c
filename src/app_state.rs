use std::env;
use std::sync::Arc;

use anyhow::Result;

use crate::core::client::kube_client::build_kube_client;
use crate::core::client::prometheus_client::PrometheusClient;
use crate::core::client::stats_source::KubeStatsSource;
use crate::domain::monitoring::expressions::ScopeRewriters;
use crate::domain::monitoring::service::monitoring_service::MonitoringService;
use crate::domain::monitoring::service::stats_service::StatsService;

#[derive(Clone)]
pub struct AppState {
    pub monitoring_service: Arc<MonitoringService>,
    pub stats_service: Arc<StatsService>,
}

pub async fn build_app_state() -> Result<AppState> {
    let prometheus_url = env::var("KUBEMON_PROMETHEUS_URL")
        .unwrap_or_else(|_| "http://prometheus-k8s.monitoring.svc:9090".to_string());
    let backend = Arc::new(PrometheusClient::new(&prometheus_url)?);

    // Rewrite table is built once here and handed to the façade; backends
    // never register themselves globally.
    let rewriters = Arc::new(ScopeRewriters::with_defaults());

    let kube = build_kube_client().await?;
    let stats_source = Arc::new(KubeStatsSource::new(kube));

    Ok(AppState {
        monitoring_service: Arc::new(MonitoringService::new(backend, rewriters)),
        stats_service: Arc::new(StatsService::new(stats_source)),
    })
}
