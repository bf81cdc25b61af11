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


//! HTTP client for the hosted backend
//!
//! [`BackendClient`] wraps `reqwest::Client` and talks to the two APIs the backend
//! exposes: the table API under `/rest/v1` and the auth API under `/auth/v1`.
//!
//! - `apikey` header with the project's public key on every request
//! - Bearer token of the signed-in user, falling back to the public key
//! - Optional retry with exponential backoff (1s, 2s) for reads only
//! - Concurrency limit through a semaphore
//! - Backend error bodies parsed into [`StoreError::Backend`]
//!
//! Writes (table inserts and every auth `POST`) are sent exactly once: the
//! backend may have committed a row whose reply never arrived. Reads are
//! retried on connect/timeout errors and 5xx only when `max_retries` is raised
//! above 1. No retry on 4xx. A 401 is returned to the caller; refreshing the
//! session is the auth provider's job.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Initial retry delay in seconds (exponential backoff: 1s, 2s, 4s)
const INITIAL_RETRY_DELAY_SECS: u64 = 1;

const APIKEY_HEADER: &str = "apikey";
const PREFER_HEADER: &str = "prefer";

/// Whether a request may be sent more than once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempts {
    /// Non-idempotent: a lost reply must not lead to a second write
    Once,
    /// Up to `max_retries` attempts
    Retry,
}

/// HTTP client for the backend's table and auth APIs
#[derive(Debug)]
pub struct BackendClient {
    client: Client,
    rest_url: String,
    auth_url: String,
    anon_key: String,
    /// Access token of the signed-in user, if any
    access_token: RwLock<Option<String>>,
    config: StoreConfig,
    semaphore: Arc<Semaphore>,
}

impl BackendClient {
    /// Create a client for the configured project
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client cannot be built
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| StoreError::InvalidInput(format!("Invalid user agent: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            APIKEY_HEADER,
            HeaderValue::from_str(&config.anon_key)
                .map_err(|e| StoreError::InvalidConfiguration(format!("Invalid API key: {}", e)))?,
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            rest_url: config.rest_url(),
            auth_url: config.auth_url(),
            anon_key: config.anon_key.clone(),
            access_token: RwLock::new(None),
            semaphore: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
        })
    }

    /// Use `token` as bearer for subsequent requests; `None` reverts to the public key
    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    pub async fn has_access_token(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    // ===== Table API =====

    /// `GET /rest/v1/{table}` with PostgREST query parameters
    ///
    /// # Example
    /// ```rust,no_run
    /// # use cloudbooks_core::api::BackendClient;
    /// # use cloudbooks_core::models::Book;
    /// # async fn example(client: &BackendClient) -> cloudbooks_core::error::Result<()> {
    /// let books: Vec<Book> = client
    ///     .select("books", &[("select", "*".to_string()), ("order", "created_at.desc".to_string())])
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn select<T>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.rest_url, table);
        let endpoint = format!("/{}", table);
        let response = self
            .send_with_retry(&endpoint, Attempts::Retry, |client, headers| {
                client.get(&url).query(query).headers(headers)
            })
            .await?;
        self.parse_json(response).await
    }

    /// `POST /rest/v1/{table}` returning the created row
    ///
    /// Sends `Prefer: return=representation` so the backend answers with the row
    /// it stored, including generated id and timestamps.
    pub async fn insert<T, B>(&self, table: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = format!("{}/{}", self.rest_url, table);
        let endpoint = format!("/{}", table);
        let response = self
            .send_with_retry(&endpoint, Attempts::Once, |client, mut headers| {
                headers.insert(PREFER_HEADER, HeaderValue::from_static("return=representation"));
                client.post(&url).headers(headers).json(body)
            })
            .await?;

        let mut rows: Vec<T> = self.parse_json(response).await?;
        if rows.is_empty() {
            return Err(StoreError::InvalidApiResponse {
                message: format!("Insert into {} returned no rows", table),
                response_body: None,
            });
        }
        Ok(rows.swap_remove(0))
    }

    // ===== Auth API =====

    /// `POST /auth/v1/{path}` with JSON body
    ///
    /// `bearer` overrides the stored access token (sign-out sends the token it revokes).
    pub async fn auth_post<T, B>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
        bearer: Option<&str>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let response = self.auth_post_raw(path, query, body, bearer).await?;
        self.parse_json(response).await
    }

    /// `POST /auth/v1/{path}` ignoring the response body
    pub async fn auth_post_empty<B>(&self, path: &str, body: &B, bearer: Option<&str>) -> Result<()>
    where
        B: Serialize + Sync,
    {
        self.auth_post_raw(path, &[], body, bearer).await?;
        Ok(())
    }

    async fn auth_post_raw<B>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
        bearer: Option<&str>,
    ) -> Result<Response>
    where
        B: Serialize + Sync,
    {
        let url = format!("{}{}", self.auth_url, path);
        self.send_with_retry(path, Attempts::Once, |client, mut headers| {
            if bearer.is_some() {
                headers.remove(AUTHORIZATION);
            }
            let req = client.post(&url).query(query).headers(headers).json(body);
            match bearer {
                Some(token) => req.bearer_auth(token),
                None => req,
            }
        })
        .await
    }

    // ===== Request plumbing =====

    /// Execute request, retrying idempotent ones with exponential backoff
    ///
    /// With [`Attempts::Retry`], connect/timeout errors and 5xx responses are
    /// retried up to `max_retries` attempts. Returns the response for any 2xx
    /// status; everything else becomes a [`StoreError`].
    async fn send_with_retry<F>(
        &self,
        endpoint: &str,
        attempts_allowed: Attempts,
        request_builder: F,
    ) -> Result<Response>
    where
        F: Fn(&Client, HeaderMap) -> reqwest::RequestBuilder,
    {
        let max_attempts = match attempts_allowed {
            Attempts::Once => 1,
            Attempts::Retry => self.config.max_retries,
        };
        let mut attempts = 0;
        let mut last_error = None;

        let _permit = self.semaphore.acquire().await.map_err(|e| {
            StoreError::InternalError(format!("Semaphore acquire failed: {}", e))
        })?;

        while attempts < max_attempts {
            attempts += 1;

            let headers = self.build_auth_headers().await?;
            let request = request_builder(&self.client, headers).build()?;
            debug!(method = %request.method(), endpoint, attempt = attempts, "backend request");

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();

                    match status {
                        s if s.is_success() => return Ok(response),

                        StatusCode::TOO_MANY_REQUESTS => {
                            return Err(StoreError::RateLimitExceeded {
                                retry_after_seconds: extract_retry_after(&response),
                                endpoint: endpoint.to_string(),
                            });
                        }

                        s => {
                            let body = response.text().await.unwrap_or_default();
                            let err = parse_error_body(s.as_u16(), &body, endpoint);
                            if !(err.is_retryable() && attempts < max_attempts) {
                                return Err(err);
                            }
                            warn!(endpoint, status = s.as_u16(), attempt = attempts, "server error, retrying");
                            last_error = Some(err);
                        }
                    }
                }

                Err(e) => {
                    let err = StoreError::network_error(
                        format!("Network request failed: {}", e),
                        is_retryable_network_error(&e),
                    );
                    if !(err.is_retryable() && attempts < max_attempts) {
                        return Err(err);
                    }
                    warn!(endpoint, attempt = attempts, error = %e, "network error, retrying");
                    last_error = Some(err);
                }
            }

            sleep(backoff_delay(attempts)).await;
        }

        Err(last_error.unwrap_or_else(|| {
            StoreError::backend(
                format!("Request failed after {} attempts", attempts),
                None,
                None,
                Some(endpoint.to_string()),
            )
        }))
    }

    /// Bearer header from the current access token, or the public key when signed out
    async fn build_auth_headers(&self) -> Result<HeaderMap> {
        let token = self.access_token.read().await;
        let bearer = token.as_deref().unwrap_or(&self.anon_key);

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|e| StoreError::InvalidInput(format!("Invalid auth token: {}", e)))?,
        );
        Ok(headers)
    }

    async fn parse_json<T>(&self, response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let path = response.url().path().to_string();

        let text = response.text().await.map_err(|e| {
            StoreError::backend(
                format!("Failed to read response body: {}", e),
                Some(status.as_u16()),
                None,
                Some(path),
            )
        })?;

        serde_json::from_str::<T>(&text).map_err(|e| StoreError::InvalidApiResponse {
            message: format!("Parse error: {} at line {} col {}", e, e.line(), e.column()),
            response_body: Some(text.chars().take(800).collect()),
        })
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(INITIAL_RETRY_DELAY_SECS * 2_u64.pow(attempt.saturating_sub(1)))
}

fn is_retryable_network_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn extract_retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(60)
}

/// Turn a non-2xx body into a [`StoreError::Backend`]
///
/// The table API answers `{code, message, details, hint}`; the auth API uses
/// `{error, error_description}`, `{code, msg}` or `{message}` depending on the
/// endpoint. Unknown bodies are passed through verbatim.
pub(crate) fn parse_error_body(status: u16, body: &str, endpoint: &str) -> StoreError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let message = parsed
        .as_ref()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            }
        });

    let code = parsed.as_ref().and_then(|v| {
        v.get("code").and_then(|c| match c {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    });

    StoreError::backend(message, Some(status), code, Some(endpoint.to_string()))
}

// ===== TESTS =====
