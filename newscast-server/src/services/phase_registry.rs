//! Phase registry client
//!
//! Fetches the authoritative ordered list of classification phases from the
//! external registry service. The pipeline and the subscriber resolver both
//! assert that the registry's phase count matches the number of passes
//! implemented locally; a mismatch fails the request outright.

use crate::models::PhaseDescriptor;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const REGISTRY_TIMEOUT_SECS: u64 = 10;

/// Phase registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Registry service error {0}")]
    Service(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct PhasesResponse {
    phases: Vec<PhaseDescriptor>,
}

/// Client for `GET /phase` on the registry service
pub struct PhaseRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl PhaseRegistryClient {
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REGISTRY_TIMEOUT_SECS))
            .build()
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the ordered phase list
    pub async fn fetch_phases(&self) -> Result<Vec<PhaseDescriptor>, RegistryError> {
        let url = format!("{}/phase", self.base_url);
        tracing::debug!(url = %url, "Fetching phase registry");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Service(status.as_u16()));
        }

        let body: PhasesResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Parse(e.to_string()))?;

        tracing::debug!(count = body.phases.len(), "Registry reported phases");
        Ok(body.phases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_registry(phase_count: i64) -> String {
        let app = Router::new().route(
            "/phase",
            get(move || async move {
                let phases: Vec<_> = (1..=phase_count)
                    .map(|id| json!({"id": id, "name": format!("phase-{}", id)}))
                    .collect();
                Json(json!({ "phases": phases }))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn fetches_ordered_phase_list() {
        let url = spawn_registry(7).await;
        let client = PhaseRegistryClient::new(&url).unwrap();

        let phases = client.fetch_phases().await.unwrap();
        assert_eq!(phases.len(), 7);
        assert_eq!(phases[0].id, 1);
        assert_eq!(phases[6].id, 7);
        assert_eq!(phases[2].name.as_deref(), Some("phase-3"));
    }

    #[tokio::test]
    async fn unreachable_registry_is_a_network_error() {
        let client = PhaseRegistryClient::new("http://127.0.0.1:1").unwrap();
        let err = client.fetch_phases().await.unwrap_err();
        assert!(matches!(err, RegistryError::Network(_)));
    }
}
