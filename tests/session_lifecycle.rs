//! Session context lifecycle
//!
//! Run with: cargo test --test session_lifecycle

mod common;

use cloudbooks_core::api::{AuthEvent, BackendClient};
use cloudbooks_core::shell::{self, Screen};
use cloudbooks_core::storage::{sessions, Database};
use cloudbooks_core::{AuthProvider, RemoteBackend, Role, SessionContext, StoreConfig};
use common::{session_for, MemoryBackend};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_initialize_without_session() {
    let backend = Arc::new(MemoryBackend::new());
    let session = SessionContext::initialize(backend.clone(), backend.clone()).await;

    assert!(!session.is_loading());
    assert!(session.user().is_none());
    assert!(session.profile().is_none());
    assert_eq!(shell::route(&session.snapshot()), Screen::SignIn);

    session.teardown().await;
}

#[tokio::test]
async fn test_initialize_restores_existing_session_and_profile() {
    let backend = MemoryBackend::new();
    let author = backend.add_account("author@example.com", "secret", Role::Author);
    let backend = Arc::new(backend.with_session(&author));

    let session = SessionContext::initialize(backend.clone(), backend.clone()).await;

    assert_eq!(session.user().map(|u| u.id), Some(author.id));
    assert_eq!(session.profile(), Some(author));
    assert_eq!(shell::route(&session.snapshot()), Screen::Storefront);

    session.teardown().await;
}

#[tokio::test]
async fn test_profile_failure_leaves_profile_empty() {
    let backend = MemoryBackend::new();
    let reader = backend.add_account("reader@example.com", "secret", Role::User);
    let backend = Arc::new(backend.with_session(&reader));
    backend.fail_profile.store(true, Ordering::SeqCst);

    let session = SessionContext::initialize(backend.clone(), backend.clone()).await;

    assert_eq!(session.user().map(|u| u.id), Some(reader.id));
    assert!(session.profile().is_none());
    assert!(!session.is_loading());
    // Signed in without a profile still reaches the storefront
    assert_eq!(shell::route(&session.snapshot()), Screen::Storefront);

    session.teardown().await;
}

#[tokio::test]
async fn test_sign_in_and_sign_out() {
    let backend = Arc::new(MemoryBackend::new());
    let reader = backend.add_account("reader@example.com", "secret", Role::User);
    let session = SessionContext::initialize(backend.clone(), backend.clone()).await;

    let err = session.sign_in("reader@example.com", "wrong").await.unwrap_err();
    assert!(err.is_auth_error());
    assert!(session.user().is_none());

    let state = timeout(WAIT, session.sign_in("reader@example.com", "secret"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.profile, Some(reader.clone()));
    assert_eq!(session.profile(), Some(reader));

    timeout(WAIT, session.sign_out()).await.unwrap().unwrap();
    assert!(session.user().is_none());
    assert!(session.profile().is_none());

    session.teardown().await;
}

#[tokio::test]
async fn test_sign_up_signs_in_with_new_profile() {
    let backend = Arc::new(MemoryBackend::new());
    let session = SessionContext::initialize(backend.clone(), backend.clone()).await;

    let state = timeout(WAIT, session.sign_up("new@example.com", "secret", Some("New Reader")))
        .await
        .unwrap()
        .unwrap()
        .expect("signed in straight away");

    let profile = state.profile.unwrap();
    assert_eq!(profile.email, "new@example.com");
    assert_eq!(profile.display_name(), "New Reader");
    assert_eq!(profile.role, Role::User);

    session.teardown().await;
}

#[tokio::test]
async fn test_external_notifications_update_state() {
    let backend = Arc::new(MemoryBackend::new());
    let admin = backend.add_account("admin@example.com", "secret", Role::Admin);
    let session = SessionContext::initialize(backend.clone(), backend.clone()).await;
    let mut changes = session.watch();

    backend.emit(AuthEvent::TokenRefreshed(session_for(admin.id, &admin.email)));
    timeout(WAIT, changes.wait_for(|s| s.user.is_some()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.profile().map(|p| p.role), Some(Role::Admin));

    backend.emit(AuthEvent::SignedOut);
    timeout(WAIT, changes.wait_for(|s| s.user.is_none()))
        .await
        .unwrap()
        .unwrap();
    assert!(session.profile().is_none());

    session.teardown().await;
}

#[tokio::test]
async fn test_refresh_for_same_user_keeps_profile() {
    let backend = MemoryBackend::new();
    let reader = backend.add_account("reader@example.com", "secret", Role::User);
    let backend = Arc::new(backend.with_session(&reader));

    let session = SessionContext::initialize(backend.clone(), backend.clone()).await;
    assert_eq!(backend.profile_fetch_count(), 1);
    let mut changes = session.watch();

    backend.emit(AuthEvent::TokenRefreshed(session_for(reader.id, &reader.email)));
    backend.emit(AuthEvent::SignedOut);
    timeout(WAIT, changes.wait_for(|s| s.user.is_none()))
        .await
        .unwrap()
        .unwrap();

    // Notifications are handled in order, so the refresh was seen and skipped
    assert_eq!(backend.profile_fetch_count(), 1);

    session.teardown().await;
}

#[tokio::test]
async fn test_teardown_stops_listening() {
    let backend = Arc::new(MemoryBackend::new());
    let reader = backend.add_account("reader@example.com", "secret", Role::User);
    let session = SessionContext::initialize(backend.clone(), backend.clone()).await;
    let changes = session.watch();

    session.teardown().await;
    backend.emit(AuthEvent::SignedIn(session_for(reader.id, &reader.email)));
    tokio::task::yield_now().await;

    assert!(changes.borrow().user.is_none());
}

#[tokio::test]
async fn test_stored_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.db");
    let config = StoreConfig::builder()
        .url("http://127.0.0.1:9")
        .anon_key("anon-key")
        .max_retries(1)
        .build();

    let saved = session_for(uuid::Uuid::new_v4(), "reader@example.com");
    {
        let db = Database::new(&path).await.unwrap();
        sessions::save_session(db.pool(), &saved).await.unwrap();
        db.close().await.unwrap();
    }

    let db = Database::new(&path).await.unwrap();
    let client = Arc::new(BackendClient::new(config).unwrap());
    let backend = RemoteBackend::new(client, Some(db));

    let restored = backend.get_session().await.unwrap().unwrap();
    assert_eq!(restored.user.id, saved.user.id);
    assert_eq!(restored.access_token, saved.access_token);
    assert!(backend.client().has_access_token().await);
}
