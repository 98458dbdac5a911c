//! API route declarations (e.g., /api/v1/*)

pub mod monitoring_routes;
