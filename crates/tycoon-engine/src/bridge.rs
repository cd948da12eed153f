//! HTTP bridge to the controlled entity.
//!
//! [`HttpBridge`] implements [`Collaborator`] and [`GangSurface`] by
//! exchanging JSON with a small bridge process that owns the real control
//! API. Every request carries the configured timeout.
//!
//! # Endpoints
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `GET` | `/snapshot` | | `Snapshot` |
//! | `POST` | `/cost` | `Action` | `{"cost": f64}` |
//! | `POST` | `/action` | `Action` | `ActionResponse` |
//! | `GET` | `/gang` | | `GangView` |
//! | `POST` | `/gang/action` | `GangAction` | `{"applied": bool}` |
//! | `POST` | `/corporation` | `{"name": str}` | `{"created": bool}` |
//!
//! Connection failures, timeouts, and 5xx answers are
//! [`CollaboratorError::Unavailable`]; 4xx answers and bodies that do not
//! decode are [`CollaboratorError::Malformed`].

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tycoon_core::collaborator::{Collaborator, CollaboratorError, GangSurface};
use tycoon_core::config::BridgeConfig;
use tycoon_types::{Action, ActionResponse, GangAction, GangView, Snapshot};

use crate::error::EngineError;

#[derive(Debug, Deserialize)]
struct CostResponse {
    cost: f64,
}

#[derive(Debug, Deserialize)]
struct GangActionResponse {
    applied: bool,
}

#[derive(Debug, Serialize)]
struct CorporationRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CorporationResponse {
    created: bool,
}

/// JSON-over-HTTP collaborator.
#[derive(Debug, Clone)]
pub struct HttpBridge {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBridge {
    /// Build a bridge client from configuration.
    pub fn new(config: &BridgeConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EngineError::Bridge {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// The bridge's base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CollaboratorError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable(format!("GET {path}: {e}")))?;
        decode(path, response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, CollaboratorError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable(format!("POST {path}: {e}")))?;
        decode(path, response).await
    }

    /// Create the corporation if it does not exist yet.
    ///
    /// Returns `true` if it was created by this call.
    pub async fn create_corporation(&self, name: &str) -> Result<bool, CollaboratorError> {
        let response: CorporationResponse = self
            .post_json("/corporation", &CorporationRequest { name })
            .await?;
        Ok(response.created)
    }
}

async fn decode<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, CollaboratorError> {
    let status = response.status();
    if status.is_server_error() {
        return Err(CollaboratorError::unavailable(format!(
            "{path} answered {status}"
        )));
    }
    if !status.is_success() {
        return Err(CollaboratorError::malformed(format!(
            "{path} answered {status}"
        )));
    }
    debug!(path, %status, "bridge response");
    response
        .json::<T>()
        .await
        .map_err(|e| CollaboratorError::malformed(format!("{path}: {e}")))
}

impl Collaborator for HttpBridge {
    async fn snapshot(&mut self) -> Result<Snapshot, CollaboratorError> {
        self.get_json("/snapshot").await
    }

    async fn action_cost(&mut self, action: &Action) -> Result<f64, CollaboratorError> {
        let response: CostResponse = self.post_json("/cost", action).await?;
        Ok(response.cost)
    }

    async fn attempt(&mut self, action: &Action) -> Result<ActionResponse, CollaboratorError> {
        self.post_json("/action", action).await
    }
}

impl GangSurface for HttpBridge {
    async fn gang(&mut self) -> Result<GangView, CollaboratorError> {
        self.get_json("/gang").await
    }

    async fn attempt_gang(&mut self, action: &GangAction) -> Result<bool, CollaboratorError> {
        let response: GangActionResponse = self.post_json("/gang/action", action).await?;
        Ok(response.applied)
    }
}
