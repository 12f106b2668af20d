use serde::Serialize;
use utoipa::ToSchema;

/// Liveness of the backend and of its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Storage is connected.
    Ok,
    /// Running without storage; state-changing calls fail.
    Degraded,
}

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current liveness.
    pub status: HealthStatus,
}
