use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::core::client::stats_source::StatsSource;
use crate::domain::monitoring::model::{EntityCount, EntityKind};

/// Point-in-time entity counts for dashboard and statistics views.
///
/// Each kind is counted independently; a failing list call produces an
/// error element for that kind and never blocks the others. Nothing is
/// cached between calls.
pub struct StatsService {
    source: Arc<dyn StatsSource>,
}

impl StatsService {
    pub fn new(source: Arc<dyn StatsSource>) -> Self {
        Self { source }
    }

    /// Cluster-wide counts, in order: clusters, workspace templates, users.
    ///
    /// The cluster count is floored at 1 so downstream ratio displays never
    /// divide by zero.
    pub async fn count_cluster_stats(&self) -> Vec<EntityCount> {
        let now = Utc::now().timestamp();
        let mut results = Vec::with_capacity(3);

        results.push(match self.source.count_clusters().await {
            Ok(n) => EntityCount::counted(EntityKind::Cluster, n.max(1) as u64, now),
            Err(e) => EntityCount::error(EntityKind::Cluster, e.to_string()),
        });

        results.push(match self.source.count_workspace_templates().await {
            Ok(n) => EntityCount::counted(EntityKind::WorkspaceTemplate, n as u64, now),
            Err(e) => EntityCount::error(EntityKind::WorkspaceTemplate, e.to_string()),
        });

        results.push(match self.source.count_users().await {
            Ok(n) => EntityCount::counted(EntityKind::User, n as u64, now),
            Err(e) => EntityCount::error(EntityKind::User, e.to_string()),
        });

        results
    }

    /// Per-workspace counts, in order: namespaces, DevOps projects,
    /// members, roles. Every list is filtered by the workspace label.
    pub async fn count_workspace_stats(&self, workspace: &str) -> Vec<EntityCount> {
        debug!("collecting stats for workspace '{workspace}'");
        let now = Utc::now().timestamp();
        let mut results = Vec::with_capacity(4);

        results.push(match self.source.count_namespaces(workspace).await {
            Ok(n) => EntityCount::counted(EntityKind::Namespace, n as u64, now),
            Err(e) => EntityCount::error(EntityKind::Namespace, e.to_string()),
        });

        results.push(match self.source.count_devops_projects(workspace).await {
            Ok(n) => EntityCount::counted(EntityKind::DevopsProject, n as u64, now),
            Err(e) => EntityCount::error(EntityKind::DevopsProject, e.to_string()),
        });

        results.push(match self.source.count_workspace_members(workspace).await {
            Ok(n) => EntityCount::counted(EntityKind::Member, n as u64, now),
            Err(e) => EntityCount::error(EntityKind::Member, e.to_string()),
        });

        results.push(match self.source.count_workspace_roles(workspace).await {
            Ok(n) => EntityCount::counted(EntityKind::Role, n as u64, now),
            Err(e) => EntityCount::error(EntityKind::Role, e.to_string()),
        });

        results
    }
}
