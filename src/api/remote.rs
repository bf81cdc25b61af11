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


//! HTTP implementation of the backend seams
//!
//! [`RemoteBackend`] owns the [`BackendClient`], the current [`AuthSession`] and
//! the session notification channel. When a [`Database`] is attached the session
//! is persisted on every change, so `get_session` after a restart restores it
//! (refreshing the access token first if it is about to expire).

use crate::api::auth::{mask, AuthSession};
use crate::api::client::BackendClient;
use crate::api::gateway::{AuthEvent, AuthProvider, Gateway, AUTH_EVENT_CAPACITY};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::models::{Book, NewBook, NewPurchase, Profile, Purchase};
use crate::storage::{sessions, Database};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const BOOKS_TABLE: &str = "books";
pub const PURCHASES_TABLE: &str = "purchases";
pub const PROFILES_TABLE: &str = "profiles";

/// Table and auth access over HTTP
#[derive(Debug)]
pub struct RemoteBackend {
    client: Arc<BackendClient>,
    session: Mutex<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
    store: Option<Database>,
}

impl RemoteBackend {
    /// Build a backend for `config`, opening the session database if one is configured
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let store = match &config.database_path {
            Some(path) => Some(Database::new(path).await?),
            None => None,
        };
        let client = BackendClient::new(config)?;
        Ok(Self::new(Arc::new(client), store))
    }

    pub fn new(client: Arc<BackendClient>, store: Option<Database>) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            client,
            session: Mutex::new(None),
            events,
            store,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    /// Make `session` current: persisted copy, bearer token, notification
    ///
    /// Persisting comes first; if it fails nothing else changes.
    async fn install(&self, session: AuthSession, event: fn(AuthSession) -> AuthEvent) -> Result<()> {
        if let Some(db) = &self.store {
            sessions::save_session(db.pool(), &session).await?;
        }

        self.client
            .set_access_token(Some(session.access_token.clone()))
            .await;
        debug!(session = %session.masked_log_entry(), "session installed");
        *self.session.lock().await = Some(session.clone());
        // no subscribers is fine
        let _ = self.events.send(event(session));
        Ok(())
    }

    /// Forget the session locally
    ///
    /// Always completes the sign-out in memory and notifies subscribers; a
    /// stored copy that cannot be deleted is only logged.
    async fn clear(&self) {
        *self.session.lock().await = None;
        self.client.set_access_token(None).await;

        if let Some(db) = &self.store {
            if let Err(e) = sessions::delete_session(db.pool()).await {
                warn!(error = %e, "failed to delete stored session");
            }
        }

        let _ = self.events.send(AuthEvent::SignedOut);
    }

    async fn stored_session(&self) -> Result<Option<AuthSession>> {
        match &self.store {
            Some(db) => sessions::load_session(db.pool()).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Gateway for RemoteBackend {
    async fn fetch_books(&self) -> Result<Vec<Book>> {
        self.client
            .select(
                BOOKS_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await
    }

    async fn fetch_purchases(&self) -> Result<Vec<Purchase>> {
        self.client
            .select(PURCHASES_TABLE, &[("select", "*".to_string())])
            .await
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let mut rows: Vec<Profile> = self
            .client
            .select(
                PROFILES_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("id", format!("eq.{}", user_id)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.pop())
    }

    async fn insert_purchase(&self, purchase: &NewPurchase) -> Result<Purchase> {
        self.client.insert(PURCHASES_TABLE, purchase).await
    }

    async fn insert_book(&self, book: &NewBook) -> Result<Book> {
        self.client.insert(BOOKS_TABLE, book).await
    }
}

#[async_trait]
impl AuthProvider for RemoteBackend {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        let current = self.session.lock().await.clone();
        let session = match current {
            Some(session) => session,
            None => match self.stored_session().await? {
                Some(stored) => stored,
                None => return Ok(None),
            },
        };

        if !session.needs_refresh() {
            let already_current = self.session.lock().await.is_some();
            if !already_current {
                info!(session = %session.masked_log_entry(), "restored stored session");
                self.install(session.clone(), AuthEvent::SignedIn).await?;
            }
            return Ok(Some(session));
        }

        match self.client.refresh_session(&session.refresh_token).await {
            Ok(refreshed) => {
                info!(session = %refreshed.masked_log_entry(), "refreshed expiring session");
                self.install(refreshed.clone(), AuthEvent::TokenRefreshed).await?;
                Ok(Some(refreshed))
            }
            Err(e) if e.is_auth_error() => {
                warn!(error = %e, "stored session rejected, signing out");
                self.clear().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = self.client.sign_in_with_password(email, password).await?;
        info!(email = %mask(email), "signed in");
        self.install(session.clone(), AuthEvent::SignedIn).await?;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Option<AuthSession>> {
        let session = self.client.sign_up(email, password, full_name).await?;
        match &session {
            Some(session) => {
                info!(email = %mask(email), "signed up");
                self.install(session.clone(), AuthEvent::SignedIn).await?;
            }
            None => info!(email = %mask(email), "signed up, awaiting email confirmation"),
        }
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let current = self.session.lock().await.clone();
        if let Some(session) = current {
            if let Err(e) = self.client.sign_out_remote(&session.access_token).await {
                warn!(error = %e, "remote sign-out failed, clearing local session anyway");
            }
        }
        info!("signed out");
        self.clear().await;
        Ok(())
    }
}
