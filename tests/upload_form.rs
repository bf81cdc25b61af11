//! Upload form submission through the catalog
//!
//! Run with: cargo test --test upload_form

mod common;

use cloudbooks_core::shell::{self, Tab};
use cloudbooks_core::upload::FormError;
use cloudbooks_core::{Catalog, Role, UploadField, UploadForm, UploadOutcome};
use common::{decimal, MemoryBackend};
use std::sync::Arc;

fn dune_form(price: &str) -> UploadForm {
    let mut form = UploadForm::new();
    form.set(UploadField::Title, "Dune");
    form.set(UploadField::Author, "Frank Herbert");
    form.set(UploadField::Price, price);
    form.set(UploadField::Genre, "SciFi");
    form.set(UploadField::FileUrl, "https://files.example.com/dune.epub");
    form.set(UploadField::PublishedDate, "1965-08-01");
    form
}

#[tokio::test]
async fn test_author_upload_stores_numeric_price() {
    let backend = Arc::new(MemoryBackend::new());
    let author = backend.add_account("author@example.com", "secret", Role::Author);
    let mut catalog = Catalog::new(backend.clone(), Some(author.clone()));

    let mut form = dune_form("12.50");
    let outcome = catalog.upload(&mut form).await;

    let UploadOutcome::Uploaded(book) = &outcome else {
        panic!("expected upload, got {:?}", outcome);
    };
    assert_eq!(outcome.notice(), "Book uploaded successfully!");
    assert_eq!(book.price, decimal("12.50"));
    assert_eq!(book.display_price(), "$12.50");
    assert_eq!(book.uploaded_by, Some(author.id));
    assert_eq!(book.description, None);

    // Form is reset and the new book is at the front of the list
    assert!(form.is_empty());
    assert_eq!(catalog.books()[0].id, book.id);

    // The stored row reads back the same after a reload
    catalog.load_books().await;
    let reloaded = catalog.find_book(book.id).unwrap();
    assert_eq!(reloaded.price, decimal("12.50"));
    assert_eq!(reloaded.genre.as_deref(), Some("SciFi"));
    assert_eq!(reloaded.content_url(), Some("https://files.example.com/dune.epub"));
    assert_eq!(backend.book_insert_count(), 1);
}

#[tokio::test]
async fn test_invalid_price_is_rejected_without_insert() {
    let backend = Arc::new(MemoryBackend::new());
    let admin = backend.add_account("admin@example.com", "secret", Role::Admin);
    let mut catalog = Catalog::new(backend.clone(), Some(admin));

    let mut form = dune_form("");
    let outcome = catalog.upload(&mut form).await;
    assert_eq!(outcome, UploadOutcome::Rejected(FormError::Required(UploadField::Price)));

    form.set(UploadField::Price, "twelve");
    let outcome = catalog.upload(&mut form).await;
    assert_eq!(
        outcome,
        UploadOutcome::Rejected(FormError::InvalidPrice("twelve".to_string()))
    );

    form.set(UploadField::Price, "-3");
    assert_eq!(
        catalog.upload(&mut form).await,
        UploadOutcome::Rejected(FormError::NegativePrice)
    );

    assert_eq!(backend.book_insert_count(), 0);
    assert_eq!(form.get(UploadField::Title), "Dune");
    assert!(catalog.books().is_empty());
}

#[tokio::test]
async fn test_reader_cannot_upload() {
    let backend = Arc::new(MemoryBackend::new());
    let reader = backend.add_account("reader@example.com", "secret", Role::User);
    let mut catalog = Catalog::new(backend.clone(), Some(reader.clone()));

    assert!(!catalog.can_upload());
    assert_eq!(shell::select_tab(Tab::Upload, Some(&reader)), Tab::Store);
    assert!(!shell::available_tabs(Some(&reader)).contains(&Tab::Upload));

    let mut form = dune_form("12.50");
    let outcome = catalog.upload(&mut form).await;
    assert_eq!(outcome, UploadOutcome::Forbidden);
    assert_eq!(backend.book_insert_count(), 0);

    let signed_out = Catalog::new(backend.clone(), None);
    assert!(!signed_out.can_upload());
}

#[tokio::test]
async fn test_backend_failure_keeps_form_values() {
    let backend = Arc::new(MemoryBackend::new());
    let author = backend.add_account("author@example.com", "secret", Role::Author);
    backend.fail_writes_with("permission denied for table books");
    let mut catalog = Catalog::new(backend.clone(), Some(author));

    let mut form = dune_form("12.50");
    let before = form.clone();
    let outcome = catalog.upload(&mut form).await;

    assert_eq!(outcome.notice(), "Upload failed: permission denied for table books");
    assert_eq!(form, before);
    assert!(!form.is_submitting());
    assert!(catalog.books().is_empty());
    assert_eq!(backend.book_insert_count(), 1);
}
