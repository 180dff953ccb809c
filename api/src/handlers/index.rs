use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Service name and version
#[tracing::instrument]
pub async fn index() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "bookied",
        version: env!("CARGO_PKG_VERSION"),
    })
}
