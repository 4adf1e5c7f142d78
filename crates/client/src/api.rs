//! HTTP bindings to the catalog backend.

use std::time::Duration;

use pricelist_catalog::Product;
use pricelist_core::ProductId;
use serde::de::DeserializeOwned;

use crate::config::{ApiUrl, ClientConfig};
use crate::export::ExportFormat;

/// Failure talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request failed or the backend answered with a non-2xx status.
    #[error("{message}{}", status_suffix(.status))]
    Network {
        message: String,
        status: Option<u16>,
    },
    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({code})")).unwrap_or_default()
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status: None,
        }
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status: Some(code),
        }
    }

    /// HTTP status of the failed response, when there was one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ApiError::Network { status, .. } => *status,
            ApiError::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if err.is_decode() {
            return ApiError::Decode(err.to_string());
        }
        ApiError::Network {
            message: err.to_string(),
            status,
        }
    }
}

/// Client for the catalog backend endpoints.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct CatalogApi {
    http: reqwest::Client,
    base: ApiUrl,
}

impl CatalogApi {
    pub fn new(base: ApiUrl) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    pub fn with_timeout(base: ApiUrl, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        match config.request_timeout {
            Some(timeout) => Self::with_timeout(config.api_url.clone(), timeout),
            None => Ok(Self::new(config.api_url.clone())),
        }
    }

    pub fn base_url(&self) -> &ApiUrl {
        &self.base
    }

    /// `GET /products`.
    pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let url = self.base.endpoint("/products");
        tracing::debug!(%url, "fetching product listing");
        self.fetch_json(self.http.get(&url)).await
    }

    /// `GET /products`, counting entries without interpreting them.
    pub async fn count_products(&self) -> Result<usize, ApiError> {
        let url = self.base.endpoint("/products");
        let entries: Vec<serde_json::Value> = self.fetch_json(self.http.get(&url)).await?;
        Ok(entries.len())
    }

    /// `GET /export/xlsx`: spreadsheet of the whole catalog.
    pub async fn export_all(&self) -> Result<Vec<u8>, ApiError> {
        let url = self.base.endpoint("/export/xlsx");
        tracing::debug!(%url, "requesting full catalog export");
        self.fetch_bytes(self.http.get(&url)).await
    }

    /// `POST /export/{format}` with the ids as a JSON array body.
    pub async fn export_selected(
        &self,
        format: ExportFormat,
        ids: &[ProductId],
    ) -> Result<Vec<u8>, ApiError> {
        let url = self.base.endpoint(&format!("/export/{}", format.as_str()));
        tracing::debug!(%url, count = ids.len(), "requesting selected products export");
        self.fetch_bytes(self.http.post(&url).json(ids)).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unexpected status");
            return Err(ApiError::status(
                status.as_u16(),
                format!("request failed: {reason}"),
            ));
        }
        Ok(response)
    }

    async fn fetch_bytes(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(body.to_vec())
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.fetch_bytes(request).await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
