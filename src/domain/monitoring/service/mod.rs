pub mod monitoring_service;
pub mod stats_service;
