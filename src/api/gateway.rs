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


//! Backend seams
//!
//! The storefront only ever talks to the backend through these two traits:
//! [`Gateway`] for the `profiles`, `books` and `purchases` collections and
//! [`AuthProvider`] for sessions. [`RemoteBackend`](crate::api::RemoteBackend)
//! implements both over HTTP.

use crate::api::auth::AuthSession;
use crate::error::Result;
use crate::models::{Book, NewBook, NewPurchase, Profile, Purchase};
use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the session notification channel
pub const AUTH_EVENT_CAPACITY: usize = 16;

/// Read/insert access to the remote collections
#[async_trait]
pub trait Gateway: Send + Sync {
    /// All books, newest first (`created_at` descending)
    async fn fetch_books(&self) -> Result<Vec<Book>>;

    /// All purchases visible to the caller (scoped by backend rules)
    async fn fetch_purchases(&self) -> Result<Vec<Purchase>>;

    /// Profile row for an auth user, `None` if the backend has none
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    /// Insert a purchase and return the stored row
    async fn insert_purchase(&self, purchase: &NewPurchase) -> Result<Purchase>;

    /// Insert a book and return the stored row
    async fn insert_book(&self, book: &NewBook) -> Result<Book>;
}

/// Session change notification
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}

impl AuthEvent {
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => Some(session),
            AuthEvent::SignedOut => None,
        }
    }
}

/// Managed auth provider
///
/// Implementations emit an [`AuthEvent`] to every subscriber whenever the
/// current session changes, including changes made by `get_session` refreshing
/// an expired token.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The current session, restoring or refreshing a stored one if needed
    async fn get_session(&self) -> Result<Option<AuthSession>>;

    /// Subscribe to session changes; dropping the receiver unsubscribes
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// `Ok(None)` means the account awaits email confirmation
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Option<AuthSession>>;

    /// End the session locally even if the backend cannot be reached
    async fn sign_out(&self) -> Result<()>;
}
