//! In-memory backend shared by the integration tests
//!
//! Implements both `Gateway` and `AuthProvider` over plain vectors so the
//! storefront flows can run without a network. Failure switches let tests
//! exercise the error paths.

#![allow(dead_code)]

pub mod stub;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use cloudbooks_core::api::{AuthEvent, AuthSession, AuthUser};
use cloudbooks_core::error::UNIQUE_VIOLATION;
use cloudbooks_core::models::{NewBook, NewPurchase};
use cloudbooks_core::{AuthProvider, Book, Gateway, Profile, Purchase, Result, Role, StoreError};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

pub struct MemoryBackend {
    pub books: Mutex<Vec<Book>>,
    pub purchases: Mutex<Vec<Purchase>>,
    pub profiles: Mutex<Vec<Profile>>,
    /// email -> (password, user id)
    accounts: Mutex<Vec<(String, String, Uuid)>>,
    session: Mutex<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,

    pub purchase_inserts: AtomicUsize,
    pub book_inserts: AtomicUsize,
    pub profile_fetches: AtomicUsize,

    pub fail_reads: AtomicBool,
    pub fail_profile: AtomicBool,
    /// Message returned by failing writes; `None` lets writes through
    pub write_failure: Mutex<Option<String>>,
    /// Reject a second purchase of the same book like a unique constraint would
    pub enforce_unique_purchase: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            books: Mutex::new(Vec::new()),
            purchases: Mutex::new(Vec::new()),
            profiles: Mutex::new(Vec::new()),
            accounts: Mutex::new(Vec::new()),
            session: Mutex::new(None),
            events,
            purchase_inserts: AtomicUsize::new(0),
            book_inserts: AtomicUsize::new(0),
            profile_fetches: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_profile: AtomicBool::new(false),
            write_failure: Mutex::new(None),
            enforce_unique_purchase: AtomicBool::new(false),
        }
    }

    pub fn with_books(self, books: Vec<Book>) -> Self {
        *self.books.lock().unwrap() = books;
        self
    }

    /// Register an account with a matching profile row
    pub fn add_account(&self, email: &str, password: &str, role: Role) -> Profile {
        let profile = profile(email, role);
        self.accounts
            .lock()
            .unwrap()
            .push((email.to_string(), password.to_string(), profile.id));
        self.profiles.lock().unwrap().push(profile.clone());
        profile
    }

    /// Start with `profile` already signed in
    pub fn with_session(self, profile: &Profile) -> Self {
        *self.session.lock().unwrap() = Some(session_for(profile.id, &profile.email));
        self
    }

    /// Record a purchase made outside the catalog under test
    pub fn add_purchase(&self, user_id: Uuid, book: &Book) -> Purchase {
        let purchase = Purchase {
            id: Uuid::new_v4(),
            user_id,
            book_id: book.id,
            purchase_date: Utc::now(),
            amount_paid: book.price,
        };
        self.purchases.lock().unwrap().push(purchase.clone());
        purchase
    }

    pub fn fail_writes_with(&self, message: &str) {
        *self.write_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn purchase_insert_count(&self) -> usize {
        self.purchase_inserts.load(Ordering::SeqCst)
    }

    pub fn book_insert_count(&self) -> usize {
        self.book_inserts.load(Ordering::SeqCst)
    }

    pub fn profile_fetch_count(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }

    /// Emit a notification as if the session changed elsewhere
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::network_error("connection refused", true));
        }
        Ok(())
    }

    fn check_writes(&self, table: &str) -> Result<()> {
        match self.write_failure.lock().unwrap().as_ref() {
            Some(message) => Err(StoreError::backend(message.clone(), Some(403), None, Some(table.to_string()))),
            None => Ok(()),
        }
    }

    fn install(&self, session: AuthSession) {
        *self.session.lock().unwrap() = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session));
    }
}

#[async_trait]
impl Gateway for MemoryBackend {
    async fn fetch_books(&self) -> Result<Vec<Book>> {
        self.check_reads()?;
        let mut books = self.books.lock().unwrap().clone();
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(books)
    }

    async fn fetch_purchases(&self) -> Result<Vec<Purchase>> {
        self.check_reads()?;
        Ok(self.purchases.lock().unwrap().clone())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_profile.load(Ordering::SeqCst) {
            return Err(StoreError::backend("relation \"profiles\" does not exist", Some(404), None, None));
        }
        Ok(self.profiles.lock().unwrap().iter().find(|p| p.id == user_id).cloned())
    }

    async fn insert_purchase(&self, purchase: &NewPurchase) -> Result<Purchase> {
        self.purchase_inserts.fetch_add(1, Ordering::SeqCst);
        self.check_writes("purchases")?;

        let mut purchases = self.purchases.lock().unwrap();
        if self.enforce_unique_purchase.load(Ordering::SeqCst)
            && purchases
                .iter()
                .any(|p| p.user_id == purchase.user_id && p.book_id == purchase.book_id)
        {
            return Err(StoreError::backend(
                "duplicate key value violates unique constraint \"purchases_user_id_book_id_key\"",
                Some(409),
                Some(UNIQUE_VIOLATION.to_string()),
                Some("purchases".to_string()),
            ));
        }

        let stored = Purchase {
            id: Uuid::new_v4(),
            user_id: purchase.user_id,
            book_id: purchase.book_id,
            purchase_date: Utc::now(),
            amount_paid: purchase.amount_paid,
        };
        purchases.push(stored.clone());
        Ok(stored)
    }

    async fn insert_book(&self, book: &NewBook) -> Result<Book> {
        self.book_inserts.fetch_add(1, Ordering::SeqCst);
        self.check_writes("books")?;

        let stored = Book {
            id: Uuid::new_v4(),
            title: book.title.clone(),
            author: book.author.clone(),
            description: book.description.clone(),
            price: book.price,
            cover_url: book.cover_url.clone(),
            file_url: book.file_url.clone(),
            genre: book.genre.clone(),
            published_date: book.published_date,
            uploaded_by: book.uploaded_by,
            created_at: Utc::now(),
        };
        self.books.lock().unwrap().push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        Ok(self.session.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let user_id = self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|(e, p, _)| e == email && p == password)
            .map(|(_, _, id)| *id)
            .ok_or_else(|| StoreError::auth_failed("Invalid login credentials", Some(email.to_string())))?;

        let session = session_for(user_id, email);
        self.install(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, full_name: Option<&str>) -> Result<Option<AuthSession>> {
        let mut profile = self.add_account(email, password, Role::User);
        profile.full_name = full_name.map(str::to_string);
        if let Some(stored) = self.profiles.lock().unwrap().iter_mut().find(|p| p.id == profile.id) {
            stored.full_name = profile.full_name.clone();
        }

        let session = session_for(profile.id, email);
        self.install(session.clone());
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<()> {
        *self.session.lock().unwrap() = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }
}

// ===== Fixtures =====

pub fn profile(email: &str, role: Role) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        email: email.to_string(),
        full_name: None,
        role,
        created_at: Utc::now(),
    }
}

pub fn session_for(user_id: Uuid, email: &str) -> AuthSession {
    AuthSession {
        access_token: format!("access-{}", user_id),
        refresh_token: format!("refresh-{}", user_id),
        expires_at: Utc::now() + Duration::hours(1),
        user: AuthUser {
            id: user_id,
            email: Some(email.to_string()),
        },
    }
}

/// A book created `age_minutes` ago
pub fn book(title: &str, author: &str, price: &str, genre: Option<&str>, age_minutes: i64) -> Book {
    Book {
        id: Uuid::new_v4(),
        title: title.to_string(),
        author: author.to_string(),
        description: None,
        price: Decimal::from_str(price).unwrap(),
        cover_url: None,
        file_url: None,
        genre: genre.map(str::to_string),
        published_date: NaiveDate::from_ymd_opt(2020, 1, 1),
        uploaded_by: None,
        created_at: Utc::now() - Duration::minutes(age_minutes),
    }
}

pub fn decimal(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}
