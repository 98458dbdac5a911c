use axum::{routing::get, Router};

use crate::api::controller::monitoring::{MonitoringController, StatsController};
use crate::app_state::AppState;

pub fn monitoring_routes() -> Router<AppState> {
    Router::new()
        .route("/query", get(MonitoringController::query))
        .route("/query_range", get(MonitoringController::query_range))
        .route("/named_metrics", get(MonitoringController::named_metrics))
        .route("/named_metrics_range", get(MonitoringController::named_metrics_range))
        .route("/metadata", get(MonitoringController::metadata))
        .route("/labels/{label}/values", get(MonitoringController::label_values))
        .route("/labelsets/{metric}", get(MonitoringController::metric_label_set))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/cluster", get(StatsController::cluster_stats))
        .route("/workspaces/{workspace}", get(StatsController::workspace_stats))
}
