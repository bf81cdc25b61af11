//! Error types for CloudBooks
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by where they come from (backend API, auth, local storage,
//! input validation) so callers can decide whether to surface, retry or swallow them.
//!
//! Read failures in the catalog are swallowed and logged; write failures reach the
//! user with the backend's raw message (see [`StoreError::backend_message`]).

use thiserror::Error;

/// Result type alias using our StoreError type
pub type Result<T> = std::result::Result<T, StoreError>;

/// SQLSTATE reported by the backend for a unique constraint violation
pub const UNIQUE_VIOLATION: &str = "23505";

/// Main error type for CloudBooks
#[derive(Error, Debug)]
pub enum StoreError {
    // ===== Backend API Errors =====

    /// The table API rejected a request. `message` is the backend's raw text.
    #[error("{message}")]
    Backend {
        message: String,
        /// HTTP status code if available
        status_code: Option<u16>,
        /// Backend error code (usually a SQLSTATE such as "23505")
        code: Option<String>,
        /// Collection or endpoint that failed
        endpoint: Option<String>,
    },

    /// Backend returned a body we could not interpret
    #[error("Invalid API response: {message}")]
    InvalidApiResponse {
        message: String,
        /// Response body snippet for debugging
        response_body: Option<String>,
    },

    /// Rate limiting (HTTP 429)
    #[error("API rate limit exceeded. Retry after {retry_after_seconds} seconds")]
    RateLimitExceeded {
        retry_after_seconds: u64,
        endpoint: String,
    },

    /// Network connectivity error
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    // ===== Auth Errors =====

    /// Sign-in, sign-up or token refresh was refused
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        message: String,
        /// Masked email if available
        email: Option<String>,
    },

    // ===== Storage Errors =====

    /// Local database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Local schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    // ===== Validation / Configuration =====

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Required field is missing
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Application state is invalid for the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ===== General Errors =====

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    InternalError(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),
}

impl From<url::ParseError> for StoreError {
    fn from(err: url::ParseError) -> Self {
        StoreError::InvalidConfiguration(format!("Invalid backend URL: {}", err))
    }
}

// Helper methods for creating common errors
impl StoreError {
    /// Create an AuthenticationFailed error
    pub fn auth_failed<S: Into<String>>(message: S, email: Option<String>) -> Self {
        StoreError::AuthenticationFailed {
            message: message.into(),
            email,
        }
    }

    /// Create a Backend error
    pub fn backend<S: Into<String>>(
        message: S,
        status_code: Option<u16>,
        code: Option<String>,
        endpoint: Option<String>,
    ) -> Self {
        StoreError::Backend {
            message: message.into(),
            status_code,
            code,
            endpoint,
        }
    }

    /// Create a NetworkError
    pub fn network_error<S: Into<String>>(message: S, is_transient: bool) -> Self {
        StoreError::NetworkError {
            message: message.into(),
            is_transient,
        }
    }

    /// Check if error is retryable (transient network errors, 5xx, rate limiting)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::NetworkError { is_transient: true, .. }
                | StoreError::Backend { status_code: Some(500..=599), .. }
                | StoreError::RateLimitExceeded { .. }
        )
    }

    /// Check if error means the user has to sign in again
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            StoreError::AuthenticationFailed { .. }
                | StoreError::Backend { status_code: Some(401), .. }
        )
    }

    /// Check if the backend refused a write because the row already exists
    pub fn is_conflict(&self) -> bool {
        match self {
            StoreError::Backend { status_code, code, .. } => {
                *status_code == Some(409) || code.as_deref() == Some(UNIQUE_VIOLATION)
            }
            _ => false,
        }
    }

    /// The backend's raw message, falling back to the error's display text
    ///
    /// This is what write failures show to the user.
    pub fn backend_message(&self) -> String {
        match self {
            StoreError::Backend { message, .. } => message.clone(),
            StoreError::AuthenticationFailed { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            StoreError::AuthenticationFailed { message, .. } => {
                format!("Authentication failed: {}. Please check your credentials and try again.", message)
            }
            StoreError::RateLimitExceeded { retry_after_seconds, .. } => {
                format!(
                    "Too many requests. Please wait {} seconds before trying again.",
                    retry_after_seconds
                )
            }
            StoreError::InvalidConfiguration(message) => {
                format!("CloudBooks is not configured: {}", message)
            }
            _ => self.backend_message(),
        }
    }
}
