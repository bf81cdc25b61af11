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


//! Upload form
//!
//! Local form state for a new catalog entry. Every field is a string until
//! submission. Submitting validates the form, makes one insert and, on success,
//! resets every field. On any failure the entered values stay put.
//!
//! Validation: title, author and price are required; the price must be a
//! non-negative decimal; the published date, if given, must be `YYYY-MM-DD`.
//! Blank optional fields are sent as null.

use crate::api::gateway::Gateway;
use crate::models::{Book, NewBook};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Editable form fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadField {
    Title,
    Author,
    Description,
    Price,
    Genre,
    CoverUrl,
    FileUrl,
    PublishedDate,
}

impl UploadField {
    pub const ALL: [UploadField; 8] = [
        UploadField::Title,
        UploadField::Author,
        UploadField::Description,
        UploadField::Price,
        UploadField::Genre,
        UploadField::CoverUrl,
        UploadField::FileUrl,
        UploadField::PublishedDate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            UploadField::Title => "Title",
            UploadField::Author => "Author",
            UploadField::Description => "Description",
            UploadField::Price => "Price",
            UploadField::Genre => "Genre",
            UploadField::CoverUrl => "Cover URL",
            UploadField::FileUrl => "File URL",
            UploadField::PublishedDate => "Published Date",
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, UploadField::Title | UploadField::Author | UploadField::Price)
    }
}

/// Why a form was rejected before reaching the backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("{} is required", .0.label())]
    Required(UploadField),

    #[error("Price must be a number, got \"{0}\"")]
    InvalidPrice(String),

    #[error("Price cannot be negative")]
    NegativePrice,

    #[error("Published date must be YYYY-MM-DD, got \"{0}\"")]
    InvalidDate(String),
}

/// Result of submitting the form
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Stored by the backend; the form has been reset
    Uploaded(Book),
    /// Rejected locally; no backend call was made
    Rejected(FormError),
    /// Backend refused the insert; carries its raw message
    Failed(String),
    /// Profile may not upload
    Forbidden,
}

impl UploadOutcome {
    pub fn notice(&self) -> String {
        match self {
            UploadOutcome::Uploaded(_) => "Book uploaded successfully!".to_string(),
            UploadOutcome::Rejected(e) => format!("Upload failed: {}", e),
            UploadOutcome::Failed(message) => format!("Upload failed: {}", message),
            UploadOutcome::Forbidden => "Only authors and admins can upload books".to_string(),
        }
    }
}

/// New-book form state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    pub title: String,
    pub author: String,
    pub description: String,
    pub price: String,
    pub genre: String,
    pub cover_url: String,
    pub file_url: String,
    pub published_date: String,
    submitting: bool,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: UploadField) -> &str {
        match field {
            UploadField::Title => &self.title,
            UploadField::Author => &self.author,
            UploadField::Description => &self.description,
            UploadField::Price => &self.price,
            UploadField::Genre => &self.genre,
            UploadField::CoverUrl => &self.cover_url,
            UploadField::FileUrl => &self.file_url,
            UploadField::PublishedDate => &self.published_date,
        }
    }

    pub fn set<S: Into<String>>(&mut self, field: UploadField, value: S) {
        let value = value.into();
        match field {
            UploadField::Title => self.title = value,
            UploadField::Author => self.author = value,
            UploadField::Description => self.description = value,
            UploadField::Price => self.price = value,
            UploadField::Genre => self.genre = value,
            UploadField::CoverUrl => self.cover_url = value,
            UploadField::FileUrl => self.file_url = value,
            UploadField::PublishedDate => self.published_date = value,
        }
    }

    /// True while a submit is waiting for the backend
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_empty(&self) -> bool {
        UploadField::ALL.iter().all(|f| self.get(*f).is_empty())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Validate and convert into the insert payload
    pub fn to_new_book(&self, uploaded_by: Option<Uuid>) -> Result<NewBook, FormError> {
        for field in UploadField::ALL.iter().filter(|f| f.is_required()) {
            if self.get(*field).trim().is_empty() {
                return Err(FormError::Required(*field));
            }
        }

        let price = parse_price(&self.price)?;
        let published_date = match optional(&self.published_date) {
            Some(date) => Some(
                NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| FormError::InvalidDate(date.clone()))?,
            ),
            None => None,
        };

        Ok(NewBook {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            description: optional(&self.description),
            price,
            genre: optional(&self.genre),
            cover_url: optional(&self.cover_url),
            file_url: optional(&self.file_url),
            published_date,
            uploaded_by,
        })
    }

    /// Validate, insert, and reset on success
    pub async fn submit(&mut self, gateway: &dyn Gateway, uploaded_by: Option<Uuid>) -> UploadOutcome {
        let new_book = match self.to_new_book(uploaded_by) {
            Ok(book) => book,
            Err(e) => return UploadOutcome::Rejected(e),
        };

        self.submitting = true;
        let result = gateway.insert_book(&new_book).await;
        self.submitting = false;

        match result {
            Ok(book) => {
                info!(book_id = %book.id, title = %book.title, "book uploaded");
                self.reset();
                UploadOutcome::Uploaded(book)
            }
            Err(e) => {
                warn!(error = %e, "book upload failed");
                UploadOutcome::Failed(e.backend_message())
            }
        }
    }
}

/// Parse a price string into a non-negative decimal
///
/// Accepts an optional leading `$`. Anything else that is not a plain decimal,
/// including an empty string, is rejected.
pub fn parse_price(input: &str) -> Result<Decimal, FormError> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix('$').unwrap_or(trimmed);

    let price = Decimal::from_str(digits).map_err(|_| FormError::InvalidPrice(input.to_string()))?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(FormError::NegativePrice);
    }
    Ok(price)
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
