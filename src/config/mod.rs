//! Configuration for the dashboard core.
//!
//! Supports explicit values, environment variables and a builder. The
//! defaults point at the production marketplace endpoints; tests
//! override the bases to hit a local mock server.

use std::time::Duration;
use url::Url;

use crate::errors::{MeliError, MeliResult, ValidationError};

/// Default REST API base.
pub const DEFAULT_API_BASE: &str = "https://api.mercadolibre.com";

/// Default browser authorization base.
pub const DEFAULT_AUTH_BASE: &str = "https://auth.mercadolivre.com.br";

/// Default request deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cap on item-detail fetches per sync.
pub const DEFAULT_MAX_ITEMS_PER_SYNC: usize = 50;

/// Scopes the dashboard needs for a fully functional token.
pub const REQUIRED_SCOPES: &[&str] = &["read", "write", "offline_access"];

/// Client configuration.
#[derive(Clone, Debug)]
pub struct MeliConfig {
    /// REST API base URL.
    pub api_base: Url,
    /// Authorization (browser redirect) base URL.
    pub auth_base: Url,
    /// Request deadline.
    pub timeout: Duration,
    /// Cap on per-sync item-detail fetches.
    pub max_items_per_sync: usize,
}

impl Default for MeliConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default API base is valid"),
            auth_base: Url::parse(DEFAULT_AUTH_BASE).expect("default auth base is valid"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_items_per_sync: DEFAULT_MAX_ITEMS_PER_SYNC,
        }
    }
}

impl MeliConfig {
    /// Start a builder.
    pub fn builder() -> MeliConfigBuilder {
        MeliConfigBuilder::default()
    }

    /// Read configuration from the environment.
    ///
    /// Recognized variables: `MELI_API_BASE`, `MELI_AUTH_BASE`,
    /// `MELI_TIMEOUT_SECS`, `MELI_MAX_ITEMS_PER_SYNC`. Unset variables
    /// keep their defaults.
    pub fn from_env() -> MeliResult<Self> {
        let mut builder = Self::builder();
        if let Ok(base) = std::env::var("MELI_API_BASE") {
            builder = builder.api_base(&base)?;
        }
        if let Ok(base) = std::env::var("MELI_AUTH_BASE") {
            builder = builder.auth_base(&base)?;
        }
        if let Ok(secs) = std::env::var("MELI_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                builder = builder.timeout(Duration::from_secs(secs));
            }
        }
        if let Ok(max) = std::env::var("MELI_MAX_ITEMS_PER_SYNC") {
            if let Ok(max) = max.parse::<usize>() {
                builder = builder.max_items_per_sync(max);
            }
        }
        Ok(builder.build())
    }

    /// Join an endpoint path onto the API base.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Fluent builder for [`MeliConfig`].
#[derive(Clone, Debug, Default)]
pub struct MeliConfigBuilder {
    api_base: Option<Url>,
    auth_base: Option<Url>,
    timeout: Option<Duration>,
    max_items_per_sync: Option<usize>,
}

impl MeliConfigBuilder {
    /// Override the REST API base.
    pub fn api_base(mut self, base: &str) -> MeliResult<Self> {
        self.api_base = Some(parse_base(base, "api_base")?);
        Ok(self)
    }

    /// Override the authorization base.
    pub fn auth_base(mut self, base: &str) -> MeliResult<Self> {
        self.auth_base = Some(parse_base(base, "auth_base")?);
        Ok(self)
    }

    /// Override the request deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the per-sync item-detail cap.
    pub fn max_items_per_sync(mut self, max: usize) -> Self {
        self.max_items_per_sync = Some(max);
        self
    }

    /// Finish, filling unset fields with defaults.
    pub fn build(self) -> MeliConfig {
        let defaults = MeliConfig::default();
        MeliConfig {
            api_base: self.api_base.unwrap_or(defaults.api_base),
            auth_base: self.auth_base.unwrap_or(defaults.auth_base),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            max_items_per_sync: self
                .max_items_per_sync
                .unwrap_or(defaults.max_items_per_sync),
        }
    }
}

fn parse_base(base: &str, field: &'static str) -> MeliResult<Url> {
    if base.trim().is_empty() {
        return Err(MeliError::Validation(ValidationError::MissingRequired {
            field,
        }));
    }
    Url::parse(base).map_err(|e| {
        MeliError::Validation(ValidationError::Invalid {
            field,
            message: e.to_string(),
        })
    })
}
