use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::core::GroupVersionKind;
use kube::Client;
use tracing::debug;

/// Label carrying the owning workspace on namespaces, projects, role
/// bindings and roles.
pub const WORKSPACE_LABEL: &str = "kubemon.io/workspace";

/// Present on workspace role bindings that reference a user; bindings
/// without it (service accounts, groups) are not members.
pub const USER_REFERENCE_LABEL: &str = "iam.kubemon.io/user-ref";

/// List-and-count access to the cluster state store. Implementations only
/// ever surface collection lengths, never object contents.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn count_clusters(&self) -> Result<usize>;
    async fn count_workspace_templates(&self) -> Result<usize>;
    async fn count_users(&self) -> Result<usize>;
    async fn count_namespaces(&self, workspace: &str) -> Result<usize>;
    async fn count_devops_projects(&self, workspace: &str) -> Result<usize>;
    async fn count_workspace_members(&self, workspace: &str) -> Result<usize>;
    async fn count_workspace_roles(&self, workspace: &str) -> Result<usize>;
}

/// Kubernetes-backed [`StatsSource`]. Namespaces are core objects; the
/// platform types are CRDs listed dynamically by group/version/kind.
pub struct KubeStatsSource {
    client: Client,
}

impl KubeStatsSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn count_dynamic(&self, gvk: GroupVersionKind, lp: ListParams) -> Result<usize> {
        let ar = ApiResource::from_gvk(&gvk);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &ar);
        let list = api.list(&lp).await?;
        debug!("Found {} {}(s)", list.items.len(), gvk.kind);
        Ok(list.items.len())
    }
}

fn workspace_selector(workspace: &str) -> String {
    format!("{WORKSPACE_LABEL}={workspace}")
}

fn gvk(group: &str, version: &str, kind: &str) -> GroupVersionKind {
    GroupVersionKind::gvk(group, version, kind)
}

#[async_trait]
impl StatsSource for KubeStatsSource {
    async fn count_clusters(&self) -> Result<usize> {
        self.count_dynamic(
            gvk("cluster.kubemon.io", "v1alpha1", "Cluster"),
            ListParams::default(),
        )
        .await
    }

    async fn count_workspace_templates(&self) -> Result<usize> {
        self.count_dynamic(
            gvk("tenant.kubemon.io", "v1alpha2", "WorkspaceTemplate"),
            ListParams::default(),
        )
        .await
    }

    async fn count_users(&self) -> Result<usize> {
        self.count_dynamic(
            gvk("iam.kubemon.io", "v1alpha2", "User"),
            ListParams::default(),
        )
        .await
    }

    async fn count_namespaces(&self, workspace: &str) -> Result<usize> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let lp = ListParams::default().labels(&workspace_selector(workspace));
        let list = namespaces.list(&lp).await?;
        debug!(
            "Found {} namespace(s) in workspace '{}'",
            list.items.len(),
            workspace
        );
        Ok(list.items.len())
    }

    async fn count_devops_projects(&self, workspace: &str) -> Result<usize> {
        self.count_dynamic(
            gvk("devops.kubemon.io", "v1alpha3", "DevOpsProject"),
            ListParams::default().labels(&workspace_selector(workspace)),
        )
        .await
    }

    async fn count_workspace_members(&self, workspace: &str) -> Result<usize> {
        // Bare label key = existence requirement in selector syntax
        let selector = format!("{},{USER_REFERENCE_LABEL}", workspace_selector(workspace));
        self.count_dynamic(
            gvk("iam.kubemon.io", "v1alpha2", "WorkspaceRoleBinding"),
            ListParams::default().labels(&selector),
        )
        .await
    }

    async fn count_workspace_roles(&self, workspace: &str) -> Result<usize> {
        self.count_dynamic(
            gvk("iam.kubemon.io", "v1alpha2", "WorkspaceRole"),
            ListParams::default().labels(&workspace_selector(workspace)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_selector_is_label_equality() {
        assert_eq!(workspace_selector("team-a"), "kubemon.io/workspace=team-a");
    }

    #[test]
    fn member_selector_adds_existence_requirement() {
        let selector = format!("{},{USER_REFERENCE_LABEL}", workspace_selector("team-a"));
        assert_eq!(
            selector,
            "kubemon.io/workspace=team-a,iam.kubemon.io/user-ref"
        );
    }
}
