use anyhow::Result;
use kube::Client;
use std::env;
use tracing::debug;

/// Creates a Kubernetes client for in-cluster use or local development.
pub async fn build_kube_client() -> Result<Client> {
    if let Ok(api_url) = env::var("KUBEMON_K8S_API_URL") {
        debug!("Using API server override from KUBEMON_K8S_API_URL ({api_url})");
    }
    // try_default picks up kubeconfig locally and the service account
    // token in-cluster
    let client = Client::try_default().await?;

    debug!("Kubernetes client initialized successfully");
    Ok(client)
}
