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


//! Auth API calls and session types
//!
//! Password sign-in, sign-up, refresh-token exchange and sign-out
//! against the backend's auth endpoints (`/auth/v1`). The functions here are
//! stateless; keeping the current session, persisting it and notifying
//! subscribers is done by [`RemoteBackend`](crate::api::RemoteBackend).
//!
//! # Endpoints
//! - `POST /token?grant_type=password` - sign in
//! - `POST /token?grant_type=refresh_token` - refresh
//! - `POST /signup` - create account (may require email confirmation)
//! - `POST /logout` - revoke the refresh token

use crate::api::client::BackendClient;
use crate::error::{Result, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sessions expiring within this window are refreshed before use
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Raw auth identity (not the application profile)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Signed-in session: tokens plus the user they belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl AuthSession {
    /// True if the access token is expired or expires within [`REFRESH_MARGIN_SECS`]
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Utc::now())
    }

    pub fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::seconds(REFRESH_MARGIN_SECS)
    }

    /// Identity summary safe for logs
    pub fn masked_log_entry(&self) -> String {
        format!(
            "UserId={}|Email={}|ExpiresAt={}",
            self.user.id,
            self.user.email.as_deref().map(mask).unwrap_or_else(|| "[empty]".to_string()),
            self.expires_at.to_rfc3339()
        )
    }
}

/// Token grant response from the auth API
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    pub refresh_token: String,
    pub user: AuthUser,
}

impl TokenResponse {
    pub fn into_session(self, issued_at: DateTime<Utc>) -> AuthSession {
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: issued_at + Duration::seconds(self.expires_in),
            user: self.user,
        }
    }
}

/// Sign-up answers with a session, or only a user when email confirmation is on
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(TokenResponse),
    PendingConfirmation(AuthUser),
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpMetadata<'a>,
}

#[derive(Serialize)]
struct SignUpMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<&'a str>,
}

impl BackendClient {
    /// Sign in with email and password
    ///
    /// # Errors
    /// `AuthenticationFailed` with the backend's message when credentials are refused
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(StoreError::MissingRequiredField("email and password".to_string()));
        }

        let response: TokenResponse = self
            .auth_post(
                "/token",
                &[("grant_type", "password")],
                &PasswordGrant { email, password },
                None,
            )
            .await
            .map_err(|e| into_auth_error(e, Some(email)))?;

        Ok(response.into_session(Utc::now()))
    }

    /// Create an account
    ///
    /// Returns `None` when the backend requires email confirmation before the
    /// first sign-in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Option<AuthSession>> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(StoreError::MissingRequiredField("email and password".to_string()));
        }

        let request = SignUpRequest {
            email,
            password,
            data: SignUpMetadata {
                full_name: full_name.map(str::trim).filter(|n| !n.is_empty()),
            },
        };

        let response: SignUpResponse = self
            .auth_post("/signup", &[], &request, None)
            .await
            .map_err(|e| into_auth_error(e, Some(email)))?;

        Ok(match response {
            SignUpResponse::Session(tokens) => Some(tokens.into_session(Utc::now())),
            SignUpResponse::PendingConfirmation(_) => None,
        })
    }

    /// Exchange a refresh token for a new session
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let response: TokenResponse = self
            .auth_post(
                "/token",
                &[("grant_type", "refresh_token")],
                &RefreshGrant { refresh_token },
                None,
            )
            .await
            .map_err(|e| into_auth_error(e, None))?;

        Ok(response.into_session(Utc::now()))
    }

    /// Revoke the session's refresh token on the backend
    pub async fn sign_out_remote(&self, access_token: &str) -> Result<()> {
        self.auth_post_empty("/logout", &serde_json::json!({}), Some(access_token))
            .await
    }
}

/// Credential and token refusals become `AuthenticationFailed`; transport errors pass through
fn into_auth_error(err: StoreError, email: Option<&str>) -> StoreError {
    match err {
        StoreError::Backend {
            message,
            status_code: Some(400..=499),
            ..
        } => StoreError::auth_failed(message, email.map(mask)),
        other => other,
    }
}

/// Mask a string for safe logging
///
/// Shows first 2 and last 2 characters, replaces middle with asterisks
pub fn mask(s: &str) -> String {
    if s.is_empty() {
        "[empty]".to_string()
    } else if s.chars().count() <= 4 {
        "****".to_string()
    } else {
        let chars: Vec<char> = s.chars().collect();
        let first_two: String = chars.iter().take(2).collect();
        let last_two: String = chars.iter().skip(chars.len() - 2).collect();
        format!("{}{}{}", first_two, "*".repeat(chars.len() - 4), last_two)
    }
}
