// CloudBooks - Digital Book Storefront
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Client configuration
//!
//! [`StoreConfig`] carries everything needed to talk to the hosted backend: the
//! project URL, the public (anon) API key, HTTP behavior and where the local
//! session database lives. Build it with [`StoreConfig::builder`] or load it from
//! the environment with [`StoreConfig::from_env`].
//!
//! # Environment
//! - `CLOUDBOOKS_URL` - backend project URL (required)
//! - `CLOUDBOOKS_ANON_KEY` - public API key (required)
//! - `CLOUDBOOKS_DB_PATH` - session database path (optional)
//! - `CLOUDBOOKS_TIMEOUT_SECS` - request timeout in seconds (optional)

use crate::error::{Result, StoreError};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Maximum number of concurrent requests to the backend
pub const MAX_CONCURRENCY: usize = 10;

/// Attempts per read request; 1 means reads are not retried either
const MAX_RETRY_ATTEMPTS: u32 = 1;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_URL: &str = "CLOUDBOOKS_URL";
pub const ENV_ANON_KEY: &str = "CLOUDBOOKS_ANON_KEY";
pub const ENV_DB_PATH: &str = "CLOUDBOOKS_DB_PATH";
pub const ENV_TIMEOUT_SECS: &str = "CLOUDBOOKS_TIMEOUT_SECS";

/// Configuration for the backend client and local session store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    pub url: String,
    /// Public API key sent as `apikey` on every request
    pub anon_key: String,
    pub timeout: Duration,
    /// Attempts for idempotent reads; writes are always sent once
    pub max_retries: u32,
    pub max_concurrency: usize,
    pub user_agent: String,
    /// Session database path; `None` keeps the session in memory only
    pub database_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRY_ATTEMPTS,
            max_concurrency: MAX_CONCURRENCY,
            user_agent: format!("CloudBooks/{} (cloudbooks-core)", env!("CARGO_PKG_VERSION")),
            database_path: None,
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }

    /// Load configuration from `CLOUDBOOKS_*` environment variables
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if the URL or key is missing, or if the
    /// timeout is not a whole number of seconds.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| StoreError::InvalidConfiguration(format!("{} is not set", ENV_URL)))?;
        let anon_key = lookup(ENV_ANON_KEY)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| StoreError::InvalidConfiguration(format!("{} is not set", ENV_ANON_KEY)))?;

        let mut builder = Self::builder().url(url.trim()).anon_key(anon_key.trim());

        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                StoreError::InvalidConfiguration(format!("{} must be a number of seconds", ENV_TIMEOUT_SECS))
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }

        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            builder = builder.database_path(PathBuf::from(path));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Check that the URL parses and the key is present
    pub fn validate(&self) -> Result<()> {
        if self.anon_key.trim().is_empty() {
            return Err(StoreError::MissingRequiredField("anon_key".to_string()));
        }
        let url = Url::parse(&self.url)?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(StoreError::InvalidConfiguration(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }
        if self.max_retries == 0 || self.max_concurrency == 0 {
            return Err(StoreError::InvalidConfiguration(
                "max_retries and max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL of the table API (`{url}/rest/v1`)
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url.trim_end_matches('/'))
    }

    /// Base URL of the auth API (`{url}/auth/v1`)
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.url.trim_end_matches('/'))
    }
}

/// Builder for StoreConfig
#[derive(Debug)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
        }
    }

    pub fn url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn anon_key<S: Into<String>>(mut self, anon_key: S) -> Self {
        self.config.anon_key = anon_key.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.config.max_concurrency = max_concurrency;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
