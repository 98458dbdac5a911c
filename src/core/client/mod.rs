// Kube-rs based Kubernetes client
pub mod kube_client;
pub mod stats_source;

// Monitoring backend clients
pub mod monitoring_backend;
pub mod prometheus_client;
