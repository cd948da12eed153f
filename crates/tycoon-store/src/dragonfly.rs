//! `Dragonfly` (Redis-compatible) backend.
//!
//! The record is stored as a JSON string under one key per running plan,
//! by default `tycoon:progress:corporation`.

use fred::prelude::*;
use tycoon_types::ProgressState;

use crate::error::StoreError;

/// Default key for the corporation plan's record.
pub const DEFAULT_KEY: &str = "tycoon:progress:corporation";

/// Progress stored under a single `Dragonfly` key.
#[derive(Clone)]
pub struct DragonflyProgressStore {
    client: Client,
    key: String,
}

impl DragonflyProgressStore {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        let key = key.into();
        tracing::info!(key = %key, "connected to Dragonfly progress store");
        Ok(Self { client, key })
    }

    /// Key the record lives under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read and decode the record. A missing key is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the read fails, or
    /// [`StoreError::Serialization`] if the value is not a record.
    pub async fn load(&self) -> Result<Option<ProgressState>, StoreError> {
        let value: Option<String> = self.client.get(self.key.as_str()).await?;
        value
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Encode and write the record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if encoding fails, or
    /// [`StoreError::Dragonfly`] if the write fails.
    pub async fn save(&self, state: &ProgressState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        let _: () = self
            .client
            .set(self.key.as_str(), json.as_str(), None, None, false)
            .await?;
        Ok(())
    }
}
