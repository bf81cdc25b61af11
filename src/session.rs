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


//! Session/auth state
//!
//! [`SessionContext`] tracks who is signed in and their [`Profile`]. It is an
//! explicit object created once at the top of the application with
//! [`SessionContext::initialize`] and ended with [`SessionContext::teardown`];
//! components that need identity get a reference to it.
//!
//! On initialize it asks the [`AuthProvider`] for an existing session and
//! subscribes to session notifications. A background task handles every
//! notification by updating the identity and looking up the profile, unless
//! the notification is for the user whose profile is already loaded (a token
//! refresh, or the restore that `initialize` itself triggered). A failed
//! profile lookup leaves the profile empty but never blocks the state update.
//!
//! State is published through a `tokio::sync::watch` channel; [`watch`]
//! returns a receiver for front ends that re-render on change.
//!
//! [`watch`]: SessionContext::watch

use crate::api::auth::AuthUser;
use crate::api::gateway::{AuthEvent, AuthProvider, Gateway};
use crate::error::{Result, StoreError};
use crate::models::Profile;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Snapshot of the session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub user: Option<AuthUser>,
    pub profile: Option<Profile>,
    /// True until the initial session lookup has finished
    pub loading: bool,
}

impl SessionState {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }
}

/// Explicit session context with initialize/teardown lifecycle
pub struct SessionContext {
    auth: Arc<dyn AuthProvider>,
    state: Arc<watch::Sender<SessionState>>,
    listener: Option<JoinHandle<()>>,
}

impl SessionContext {
    /// Look up the existing session, load its profile and start listening for changes
    ///
    /// Never fails: an auth provider error is logged and leaves the user signed out.
    pub async fn initialize(auth: Arc<dyn AuthProvider>, gateway: Arc<dyn Gateway>) -> Self {
        let (tx, _) = watch::channel(SessionState::loading());
        let state = Arc::new(tx);

        // Subscribe first so a change during the lookup is not lost
        let events = auth.subscribe();

        let user = match auth.get_session().await {
            Ok(session) => session.map(|s| s.user),
            Err(e) => {
                warn!(error = %e, "session lookup failed, continuing signed out");
                None
            }
        };
        apply_identity(&state, gateway.as_ref(), user).await;

        let listener = tokio::spawn(listen(events, Arc::clone(&state), gateway));

        Self {
            auth,
            state,
            listener: Some(listener),
        }
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.state.borrow().user.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every state change
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Sign in and wait until the new identity (and profile lookup) is applied
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionState> {
        let mut rx = self.watch();
        let session = self.auth.sign_in(email, password).await?;
        let id = session.user.id;
        wait_until(&mut rx, |s| s.user.as_ref().map(|u| u.id) == Some(id)).await
    }

    /// Create an account; signs in straight away unless email confirmation is pending
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Option<SessionState>> {
        let mut rx = self.watch();
        match self.auth.sign_up(email, password, full_name).await? {
            Some(session) => {
                let id = session.user.id;
                let state = wait_until(&mut rx, |s| s.user.as_ref().map(|u| u.id) == Some(id)).await?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Sign out and wait until the identity is cleared
    pub async fn sign_out(&self) -> Result<()> {
        let mut rx = self.watch();
        self.auth.sign_out().await?;
        wait_until(&mut rx, |s| s.user.is_none()).await?;
        Ok(())
    }

    /// Stop listening for session notifications
    pub async fn teardown(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
        }
        debug!("session context torn down");
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &*self.state.borrow())
            .field("listening", &self.listener.is_some())
            .finish()
    }
}

async fn listen(
    mut events: broadcast::Receiver<AuthEvent>,
    state: Arc<watch::Sender<SessionState>>,
    gateway: Arc<dyn Gateway>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                debug!(event = event_name(&event), "session notification");
                let user = event.session().map(|s| s.user.clone());
                let unchanged = is_current(&state.borrow(), user.as_ref());
                if unchanged {
                    continue;
                }
                apply_identity(&state, gateway.as_ref(), user).await;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed session notifications");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Same signed-in user with a loaded profile; nothing to look up again
fn is_current(state: &SessionState, user: Option<&AuthUser>) -> bool {
    match (user, state.user.as_ref()) {
        (Some(new), Some(current)) => new.id == current.id && state.profile.is_some(),
        _ => false,
    }
}

/// Set the identity and look up its profile
async fn apply_identity(
    state: &watch::Sender<SessionState>,
    gateway: &dyn Gateway,
    user: Option<AuthUser>,
) {
    let profile = match &user {
        Some(user) => match gateway.fetch_profile(user.id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "profile lookup failed");
                None
            }
        },
        None => None,
    };

    match &user {
        Some(user) => info!(user_id = %user.id, has_profile = profile.is_some(), "session active"),
        None => info!("no active session"),
    }

    state.send_replace(SessionState {
        user,
        profile,
        loading: false,
    });
}

async fn wait_until<F>(rx: &mut watch::Receiver<SessionState>, predicate: F) -> Result<SessionState>
where
    F: Fn(&SessionState) -> bool,
{
    loop {
        {
            let current = rx.borrow_and_update();
            if predicate(&current) {
                return Ok(current.clone());
            }
        }
        rx.changed()
            .await
            .map_err(|_| StoreError::InvalidState("session context closed".to_string()))?;
    }
}

fn event_name(event: &AuthEvent) -> &'static str {
    match event {
        AuthEvent::SignedIn(_) => "signed_in",
        AuthEvent::TokenRefreshed(_) => "token_refreshed",
        AuthEvent::SignedOut => "signed_out",
    }
}
