//! CloudBooks core
//!
//! Storefront logic for a digital book shop whose data and auth live in a
//! hosted backend: browse the catalog, buy books, read what you own, and
//! (for authors and admins) upload new titles.
//!
//! ```rust,no_run
//! use cloudbooks_core::{Catalog, RemoteBackend, SessionContext, StoreConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> cloudbooks_core::Result<()> {
//! let backend = Arc::new(RemoteBackend::connect(StoreConfig::from_env()?).await?);
//! let session = SessionContext::initialize(backend.clone(), backend.clone()).await;
//!
//! let mut catalog = Catalog::new(backend.clone(), session.profile());
//! catalog.refresh().await;
//! catalog.set_search("dune");
//! for book in catalog.filtered_books() {
//!     println!("{} - {}", book.title, book.display_price());
//! }
//!
//! session.teardown().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod shell;
pub mod storage;
pub mod upload;

pub use api::{AuthProvider, Gateway, RemoteBackend};
pub use catalog::{Catalog, GenreFilter, PurchaseOutcome, ViewOutcome};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use models::{Book, Profile, Purchase, Role};
pub use session::{SessionContext, SessionState};
pub use shell::{Screen, Tab};
pub use upload::{UploadField, UploadForm, UploadOutcome};
