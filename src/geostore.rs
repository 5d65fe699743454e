use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeostoreConfig;

#[derive(Debug, Error)]
pub enum GeostoreError {
    #[error("Geostore {0} not found")]
    NotFound(String),

    #[error("Geostore request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Geostore responded with HTTP {0}")]
    HttpStatus(StatusCode),

    #[error("No geostore service configured")]
    Unavailable,
}

/// Resolves a geostore identifier to a GeoJSON FeatureCollection.
#[async_trait]
pub trait GeostoreClient: Send + Sync {
    async fn resolve_geostore(&self, id: &str) -> Result<Value, GeostoreError>;
}

#[derive(Deserialize)]
struct GeostoreResponse {
    data: GeostoreData,
}

#[derive(Deserialize)]
struct GeostoreData {
    attributes: GeostoreAttributes,
}

#[derive(Deserialize)]
struct GeostoreAttributes {
    geojson: Value,
}

/// Client for the `{gateway}/v1/geostore/{id}` endpoint.
#[derive(Debug, Clone)]
pub struct HttpGeostoreClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGeostoreClient {
    pub fn new(config: &GeostoreConfig, base_url: &str) -> Result<Self, GeostoreError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(HttpGeostoreClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// `None` when no gateway URL is configured.
    pub fn from_config(config: &GeostoreConfig) -> Result<Option<Self>, GeostoreError> {
        match config.gateway_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(Some(Self::new(config, url)?)),
            _ => Ok(None),
        }
    }

    fn geostore_url(&self, id: &str) -> String {
        format!("{}/v1/geostore/{id}", self.base_url)
    }
}

#[async_trait]
impl GeostoreClient for HttpGeostoreClient {
    async fn resolve_geostore(&self, id: &str) -> Result<Value, GeostoreError> {
        let url = self.geostore_url(id);
        debug!(geostore = id, url = %url, "Obtaining geostore");

        let mut request = self.client.get(&url);
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key);
        }
        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(GeostoreError::NotFound(id.to_string())),
            status if status.is_success() => {
                let body: GeostoreResponse = response.json().await?;
                Ok(body.data.attributes.geojson)
            }
            status => {
                warn!(geostore = id, status = %status, "Geostore lookup failed");
                Err(GeostoreError::HttpStatus(status))
            }
        }
    }
}

/// Stand-in used when no geostore service is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeostore;

#[async_trait]
impl GeostoreClient for DisabledGeostore {
    async fn resolve_geostore(&self, _id: &str) -> Result<Value, GeostoreError> {
        Err(GeostoreError::Unavailable)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::{GeostoreClient, GeostoreError};

    /// Geostores served from memory.
    #[derive(Default)]
    pub struct InMemoryGeostore {
        pub geostores: HashMap<String, Value>,
    }

    impl InMemoryGeostore {
        pub fn with(id: &str, geojson: Value) -> Self {
            InMemoryGeostore {
                geostores: HashMap::from([(id.to_string(), geojson)]),
            }
        }
    }

    #[async_trait]
    impl GeostoreClient for InMemoryGeostore {
        async fn resolve_geostore(&self, id: &str) -> Result<Value, GeostoreError> {
            self.geostores
                .get(id)
                .cloned()
                .ok_or_else(|| GeostoreError::NotFound(id.to_string()))
        }
    }
}
