use serde::Serialize;

/// Health check payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Static status marker.
    pub status: &'static str,
}
