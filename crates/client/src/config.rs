//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use pricelist_catalog::{FilterLayer, VisibilityPolicy};

/// Environment variable holding the backend base URL.
pub const API_URL_VAR: &str = "PRICELIST_API_URL";

/// Backend base URL, without a trailing slash.
///
/// An empty value means "same origin": endpoints become relative paths such
/// as `/products`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiUrl(String);

impl ApiUrl {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self(base.trim().trim_end_matches('/').to_string())
    }

    /// Pick the first non-empty value: the runtime one, then the one baked in
    /// at build time, then same-origin.
    pub fn resolve(runtime: Option<&str>, build_time: Option<&str>) -> Self {
        [runtime, build_time]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(Self::new)
            .unwrap_or_default()
    }

    /// Runtime value from the environment, build-time value from the
    /// compile-time environment.
    pub fn from_env() -> Self {
        let runtime = std::env::var(API_URL_VAR).ok();
        Self::resolve(runtime.as_deref(), option_env!("PRICELIST_API_URL"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_same_origin(&self) -> bool {
        self.0.is_empty()
    }

    /// `path` joined onto the base. `path` must start with `/`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl core::fmt::Display for ApiUrl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_same_origin() {
            f.write_str("(same origin)")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Everything the client needs to talk to the backend and store its files.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: ApiUrl,
    /// Delay between health probes.
    pub health_interval: Duration,
    /// Per-request timeout; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Directory that receives exported files.
    pub export_dir: PathBuf,
    /// Key-value file holding the cart token.
    pub storage_path: PathBuf,
    pub policy: VisibilityPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: ApiUrl::default(),
            health_interval: Duration::from_secs(30),
            request_timeout: Some(Duration::from_secs(30)),
            export_dir: PathBuf::from("."),
            storage_path: default_storage_path()
                .unwrap_or_else(|_| PathBuf::from("pricelist-storage.json")),
            policy: VisibilityPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.api_url = ApiUrl::from_env();
        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Recognised keys: `PRICELIST_API_URL`, `PRICELIST_HEALTH_INTERVAL_SECS`,
    /// `PRICELIST_REQUEST_TIMEOUT_SECS` (`0` disables the timeout),
    /// `PRICELIST_EXPORT_DIR`, `PRICELIST_STORAGE_PATH`,
    /// `PRICELIST_FILTER_LAYER` (`store` or `view`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self {
            api_url: ApiUrl::resolve(lookup(API_URL_VAR).as_deref(), None),
            ..Self::default()
        };

        if let Some(secs) = lookup("PRICELIST_HEALTH_INTERVAL_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("invalid PRICELIST_HEALTH_INTERVAL_SECS: {secs:?}"))?;
            anyhow::ensure!(secs > 0, "PRICELIST_HEALTH_INTERVAL_SECS must be positive");
            config.health_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = lookup("PRICELIST_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("invalid PRICELIST_REQUEST_TIMEOUT_SECS: {secs:?}"))?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(dir) = lookup("PRICELIST_EXPORT_DIR") {
            config.export_dir = PathBuf::from(dir);
        }

        if let Some(path) = lookup("PRICELIST_STORAGE_PATH") {
            config.storage_path = PathBuf::from(path);
        }

        if let Some(layer) = lookup("PRICELIST_FILTER_LAYER") {
            let layer: FilterLayer = layer
                .parse()
                .context("invalid PRICELIST_FILTER_LAYER")?;
            config.policy = config.policy.at(layer);
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: ApiUrl) -> Self {
        self.api_url = api_url;
        self
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    pub fn with_policy(mut self, policy: VisibilityPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Resolve the default key-value storage file:
/// `{app_data_dir}/pricelist/storage.json`.
pub fn default_storage_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut path = base;
    path.push("pricelist");
    path.push("storage.json");
    Ok(path)
}
