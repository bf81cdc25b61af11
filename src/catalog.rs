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


//! Catalog view
//!
//! [`Catalog`] holds the book and purchase lists of the current user, the
//! search text and genre filter, and runs the storefront actions (purchase,
//! read, upload). Derived views (filtered list, library, genres) are computed
//! on demand from the in-memory lists by the free functions at the bottom of
//! this module.
//!
//! Read failures are logged and leave the lists as they were. Writes return an
//! outcome carrying the notice shown to the user; a successful write merges the
//! stored row into the local list instead of reloading everything, and the next
//! full load replaces the local state again.

use crate::api::gateway::Gateway;
use crate::models::{format_price, Book, NewPurchase, Profile, Purchase};
use crate::upload::{UploadForm, UploadOutcome};
use futures_util::future::join;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Genre filter of the store view
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenreFilter {
    #[default]
    All,
    Genre(String),
}

impl GenreFilter {
    /// `None`, empty or "all" select every genre
    pub fn from_option(genre: Option<&str>) -> Self {
        match genre.map(str::trim) {
            None | Some("") => GenreFilter::All,
            Some(g) if g.eq_ignore_ascii_case("all") => GenreFilter::All,
            Some(g) => GenreFilter::Genre(g.to_string()),
        }
    }

    pub fn matches(&self, book: &Book) -> bool {
        match self {
            GenreFilter::All => true,
            GenreFilter::Genre(genre) => book.genre.as_deref() == Some(genre.as_str()),
        }
    }
}

/// Result of [`Catalog::purchase`]
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    /// No profile loaded; nothing happened
    NotSignedIn,
    /// Purchase already in the local list; no backend call was made
    AlreadyOwned,
    /// The user declined the confirmation prompt
    Cancelled,
    Purchased(Purchase),
    /// Backend refused the insert; carries its raw message
    Failed(String),
}

impl PurchaseOutcome {
    /// Notice text for the user, if the outcome has one
    pub fn notice(&self) -> Option<String> {
        match self {
            PurchaseOutcome::NotSignedIn | PurchaseOutcome::Cancelled => None,
            PurchaseOutcome::AlreadyOwned => Some("You already own this book!".to_string()),
            PurchaseOutcome::Purchased(_) => Some("Purchase successful! Check your library.".to_string()),
            PurchaseOutcome::Failed(message) => Some(format!("Purchase failed: {}", message)),
        }
    }
}

/// Result of [`Catalog::view`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOutcome {
    /// Open this content reference in a new browsing context
    Open(String),
    NotAvailable,
}

impl ViewOutcome {
    pub fn notice(&self) -> Option<String> {
        match self {
            ViewOutcome::Open(_) => None,
            ViewOutcome::NotAvailable => Some("Book file not available".to_string()),
        }
    }
}

/// Confirmation prompt shown before a purchase
pub fn purchase_prompt(book: &Book) -> String {
    format!("Purchase \"{}\" for {}?", book.title, format_price(book.price))
}

/// Storefront state for one signed-in user
pub struct Catalog {
    gateway: Arc<dyn Gateway>,
    profile: Option<Profile>,
    books: Vec<Book>,
    purchases: Vec<Purchase>,
    search: String,
    genre: GenreFilter,
    loading: bool,
}

impl Catalog {
    /// New, empty catalog; call [`refresh`](Self::refresh) to load it
    pub fn new(gateway: Arc<dyn Gateway>, profile: Option<Profile>) -> Self {
        Self {
            gateway,
            profile,
            books: Vec::new(),
            purchases: Vec::new(),
            search: String::new(),
            genre: GenreFilter::All,
            loading: true,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Replace the profile after a session change
    pub fn set_profile(&mut self, profile: Option<Profile>) {
        self.profile = profile;
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn purchases(&self) -> &[Purchase] {
        &self.purchases
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search<S: Into<String>>(&mut self, search: S) {
        self.search = search.into();
    }

    pub fn genre_filter(&self) -> &GenreFilter {
        &self.genre
    }

    pub fn set_genre_filter(&mut self, genre: GenreFilter) {
        self.genre = genre;
    }

    pub fn find_book(&self, id: Uuid) -> Option<&Book> {
        self.books.iter().find(|b| b.id == id)
    }

    pub fn can_upload(&self) -> bool {
        self.profile.as_ref().map_or(false, Profile::can_upload)
    }

    // ===== Loading =====

    /// Fetch all books, newest first, replacing the local list
    ///
    /// On failure the list is left unchanged; the error is only logged.
    pub async fn load_books(&mut self) {
        self.loading = true;
        let result = self.gateway.fetch_books().await;
        self.apply_books(result);
        self.loading = false;
    }

    /// Fetch all purchases visible to the caller, replacing the local list
    ///
    /// Same silent failure as [`load_books`](Self::load_books).
    pub async fn load_purchases(&mut self) {
        let result = self.gateway.fetch_purchases().await;
        self.apply_purchases(result);
    }

    /// Load books and purchases concurrently
    pub async fn refresh(&mut self) {
        self.loading = true;
        let (books, purchases) = join(self.gateway.fetch_books(), self.gateway.fetch_purchases()).await;
        self.apply_books(books);
        self.apply_purchases(purchases);
        self.loading = false;
    }

    fn apply_books(&mut self, result: crate::error::Result<Vec<Book>>) {
        match result {
            Ok(books) => {
                debug!(count = books.len(), "books loaded");
                self.books = books;
            }
            Err(e) => warn!(error = %e, "failed to load books, keeping current list"),
        }
    }

    fn apply_purchases(&mut self, result: crate::error::Result<Vec<Purchase>>) {
        match result {
            Ok(purchases) => {
                debug!(count = purchases.len(), "purchases loaded");
                self.purchases = purchases;
            }
            Err(e) => warn!(error = %e, "failed to load purchases, keeping current list"),
        }
    }

    // ===== Actions =====

    /// Buy `book` for the signed-in profile
    ///
    /// `confirm` receives the prompt text and returns whether to go ahead. It is
    /// not asked when the purchase is rejected up front.
    pub async fn purchase<F>(&mut self, book: &Book, confirm: F) -> PurchaseOutcome
    where
        F: FnOnce(&str) -> bool,
    {
        let Some(profile) = self.profile.as_ref() else {
            return PurchaseOutcome::NotSignedIn;
        };
        let user_id = profile.id;

        if self.is_purchased(book.id) {
            return PurchaseOutcome::AlreadyOwned;
        }

        if !confirm(&purchase_prompt(book)) {
            return PurchaseOutcome::Cancelled;
        }

        let request = NewPurchase::for_book(user_id, book);
        match self.gateway.insert_purchase(&request).await {
            Ok(purchase) => {
                info!(book_id = %book.id, amount = %purchase.amount_paid, "purchase recorded");
                self.merge_purchase(purchase.clone());
                PurchaseOutcome::Purchased(purchase)
            }
            Err(e) if e.is_conflict() => {
                // Bought from another session; our list is stale
                info!(book_id = %book.id, "purchase already exists on backend");
                self.load_purchases().await;
                PurchaseOutcome::AlreadyOwned
            }
            Err(e) => {
                warn!(book_id = %book.id, error = %e, "purchase failed");
                PurchaseOutcome::Failed(e.backend_message())
            }
        }
    }

    /// Read `book`: hand back its content reference or report it missing
    pub fn view(&self, book: &Book) -> ViewOutcome {
        match book.content_url() {
            Some(url) => ViewOutcome::Open(url.to_string()),
            None => ViewOutcome::NotAvailable,
        }
    }

    /// Submit `form` as a new catalog entry
    ///
    /// Only authors and admins may upload; everyone else gets `Forbidden`
    /// without a backend call.
    pub async fn upload(&mut self, form: &mut UploadForm) -> UploadOutcome {
        let uploader = match self.profile.as_ref() {
            Some(profile) if profile.can_upload() => profile.id,
            _ => return UploadOutcome::Forbidden,
        };

        let outcome = form.submit(self.gateway.as_ref(), Some(uploader)).await;
        if let UploadOutcome::Uploaded(book) = &outcome {
            self.merge_book(book.clone());
        }
        outcome
    }

    fn merge_purchase(&mut self, purchase: Purchase) {
        self.purchases.retain(|p| p.id != purchase.id);
        self.purchases.push(purchase);
    }

    /// Newest first, so a fresh upload goes to the front
    fn merge_book(&mut self, book: Book) {
        self.books.retain(|b| b.id != book.id);
        self.books.insert(0, book);
    }

    // ===== Derived views =====

    pub fn is_purchased(&self, book_id: Uuid) -> bool {
        self.purchases.iter().any(|p| p.book_id == book_id)
    }

    /// Books matching the current search text and genre filter
    pub fn filtered_books(&self) -> Vec<&Book> {
        filter_books(&self.books, &self.search, &self.genre)
    }

    /// The user's library
    pub fn purchased_books(&self) -> Vec<&Book> {
        purchased_books(&self.books, &self.purchases)
    }

    /// Catalog entries the user does not own yet
    pub fn purchasable_books(&self) -> Vec<&Book> {
        purchasable_books(&self.books, &self.purchases)
    }

    pub fn genres(&self) -> Vec<&str> {
        distinct_genres(&self.books)
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("profile", &self.profile.as_ref().map(|p| p.id))
            .field("books", &self.books.len())
            .field("purchases", &self.purchases.len())
            .field("search", &self.search)
            .field("genre", &self.genre)
            .field("loading", &self.loading)
            .finish()
    }
}

/// Case-insensitive substring match on title or author, intersected with the genre filter
pub fn filter_books<'a>(books: &'a [Book], search: &str, genre: &GenreFilter) -> Vec<&'a Book> {
    let needle = search.to_lowercase();
    books
        .iter()
        .filter(|book| book.matches_search(&needle) && genre.matches(book))
        .collect()
}

/// Books whose id appears in `purchases`
pub fn purchased_books<'a>(books: &'a [Book], purchases: &[Purchase]) -> Vec<&'a Book> {
    let owned: HashSet<Uuid> = purchases.iter().map(|p| p.book_id).collect();
    books.iter().filter(|b| owned.contains(&b.id)).collect()
}

pub fn purchasable_books<'a>(books: &'a [Book], purchases: &[Purchase]) -> Vec<&'a Book> {
    let owned: HashSet<Uuid> = purchases.iter().map(|p| p.book_id).collect();
    books.iter().filter(|b| !owned.contains(&b.id)).collect()
}

/// Distinct non-empty genres, in first-seen order
pub fn distinct_genres(books: &[Book]) -> Vec<&str> {
    let mut seen = HashSet::new();
    books
        .iter()
        .filter_map(|b| b.genre.as_deref())
        .filter(|g| !g.is_empty())
        .filter(|g| seen.insert(*g))
        .collect()
}
