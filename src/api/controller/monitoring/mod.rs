use axum::extract::{Path, Query, State};
use axum::Json;

use crate::api::dto::monitoring_dto::{
    InstantQuery, LabelSetQuery, LabelValuesQuery, MetadataQuery, NamedQuery, NamedRangeQuery,
    RangeQuery,
};
use crate::api::dto::ApiResponse;
use crate::api::util::json::to_json;
use crate::app_state::AppState;
use crate::core::client::monitoring_backend::QueryOptions;
use crate::domain::monitoring::model::{
    EntityCount, LabelValues, Metadata, Metric, MetricLabelSet, Metrics,
};
use crate::errors::AppError;

fn query_options(scope: &str) -> QueryOptions {
    if scope.is_empty() {
        QueryOptions::default()
    } else {
        QueryOptions::scoped(scope)
    }
}

pub struct MonitoringController;

impl MonitoringController {
    pub async fn query(
        State(state): State<AppState>,
        Query(q): Query<InstantQuery>,
    ) -> Result<Json<ApiResponse<Metric>>, AppError> {
        let time = q.time().map_err(AppError::InvalidQuery)?;
        to_json(state.monitoring_service.get_metric(&q.expr, &q.scope, time).await)
    }

    pub async fn query_range(
        State(state): State<AppState>,
        Query(q): Query<RangeQuery>,
    ) -> Result<Json<ApiResponse<Metric>>, AppError> {
        let (start, end, step) = q.window().map_err(AppError::InvalidQuery)?;
        to_json(
            state
                .monitoring_service
                .get_metric_over_time(&q.expr, &q.scope, start, end, step)
                .await,
        )
    }

    pub async fn named_metrics(
        State(state): State<AppState>,
        Query(q): Query<NamedQuery>,
    ) -> Result<Json<ApiResponse<Metrics>>, AppError> {
        let time = q.time().map_err(AppError::InvalidQuery)?;
        let metrics = state
            .monitoring_service
            .get_named_metrics(&q.names(), time, &query_options(&q.scope))
            .await;
        Ok(Json(ApiResponse::ok(metrics)))
    }

    pub async fn named_metrics_range(
        State(state): State<AppState>,
        Query(q): Query<NamedRangeQuery>,
    ) -> Result<Json<ApiResponse<Metrics>>, AppError> {
        let (start, end, step) = q.window().map_err(AppError::InvalidQuery)?;
        to_json(
            state
                .monitoring_service
                .get_named_metrics_over_time(&q.names(), start, end, step, &query_options(&q.scope))
                .await,
        )
    }

    pub async fn metadata(
        State(state): State<AppState>,
        Query(q): Query<MetadataQuery>,
    ) -> Result<Json<ApiResponse<Metadata>>, AppError> {
        to_json(state.monitoring_service.get_metadata(&q.scope).await)
    }

    pub async fn label_values(
        State(state): State<AppState>,
        Path(label): Path<String>,
        Query(q): Query<LabelValuesQuery>,
    ) -> Result<Json<ApiResponse<LabelValues>>, AppError> {
        let (start, end) = q.window().map_err(AppError::InvalidQuery)?;
        to_json(
            state
                .monitoring_service
                .get_label_values(&label, &q.matchers(), start, end)
                .await,
        )
    }

    pub async fn metric_label_set(
        State(state): State<AppState>,
        Path(metric): Path<String>,
        Query(q): Query<LabelSetQuery>,
    ) -> Result<Json<ApiResponse<MetricLabelSet>>, AppError> {
        let (start, end) = q.window().map_err(AppError::InvalidQuery)?;
        to_json(
            state
                .monitoring_service
                .get_metric_label_set(&metric, &q.scope, start, end)
                .await,
        )
    }
}

pub struct StatsController;

impl StatsController {
    pub async fn cluster_stats(
        State(state): State<AppState>,
    ) -> Json<ApiResponse<Vec<EntityCount>>> {
        Json(ApiResponse::ok(state.stats_service.count_cluster_stats().await))
    }

    pub async fn workspace_stats(
        State(state): State<AppState>,
        Path(workspace): Path<String>,
    ) -> Json<ApiResponse<Vec<EntityCount>>> {
        Json(ApiResponse::ok(
            state.stats_service.count_workspace_stats(&workspace).await,
        ))
    }
}
