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


//! Persisted auth session
//!
//! One row in `Sessions` holds the tokens of whoever is signed in on this
//! machine. Saving replaces it; signing out deletes it.

use crate::api::auth::{AuthSession, AuthUser};
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

const CURRENT_SLOT: &str = "current";

/// Save (or replace) the current session
pub async fn save_session(pool: &SqlitePool, session: &AuthSession) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO Sessions (
            slot,
            user_id,
            email,
            access_token,
            refresh_token,
            expires_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(slot) DO UPDATE SET
            user_id = excluded.user_id,
            email = excluded.email,
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            expires_at = excluded.expires_at,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(CURRENT_SLOT)
    .bind(session.user.id.to_string())
    .bind(session.user.email.as_deref())
    .bind(&session.access_token)
    .bind(&session.refresh_token)
    .bind(session.expires_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the stored session, if any
///
/// # Errors
/// `InvalidState` if the stored row cannot be decoded
pub async fn load_session(pool: &SqlitePool) -> Result<Option<AuthSession>> {
    let row: Option<(String, Option<String>, String, String, String)> = sqlx::query_as(
        r#"
        SELECT
            user_id,
            email,
            access_token,
            refresh_token,
            expires_at
        FROM Sessions
        WHERE slot = ?
        "#,
    )
    .bind(CURRENT_SLOT)
    .fetch_optional(pool)
    .await?;

    let Some((user_id, email, access_token, refresh_token, expires_at)) = row else {
        return Ok(None);
    };

    let id = Uuid::parse_str(&user_id)
        .map_err(|e| StoreError::InvalidState(format!("Corrupt user id in session store: {}", e)))?;
    let expires_at = DateTime::parse_from_rfc3339(&expires_at)
        .map_err(|e| StoreError::InvalidState(format!("Corrupt expiry in session store: {}", e)))?
        .with_timezone(&Utc);

    Ok(Some(AuthSession {
        access_token,
        refresh_token,
        expires_at,
        user: AuthUser { id, email },
    }))
}

/// Delete the stored session
pub async fn delete_session(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM Sessions WHERE slot = ?")
        .bind(CURRENT_SLOT)
        .execute(pool)
        .await?;

    Ok(())
}
