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


//! Storefront records
//!
//! Plain rows of the three remote collections (`profiles`, `books`, `purchases`)
//! and the insert payloads sent for new books and purchases. Field names match
//! the backend columns so the structs serialize straight onto the wire.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// PROFILES
// ============================================================================

/// Role of a profile; only authors and admins may upload books
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Author,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Author => "author",
            Role::Admin => "admin",
        }
    }

    pub fn can_upload(&self) -> bool {
        matches!(self, Role::Author | Role::Admin)
    }
}

/// Application-level user record, created by the auth backend on signup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Full name if set, otherwise the email address
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }

    pub fn can_upload(&self) -> bool {
        self.role.can_upload()
    }
}

// ============================================================================
// BOOKS
// ============================================================================

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub cover_url: Option<String>,
    /// External locator of the readable file
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub published_date: Option<NaiveDate>,
    #[serde(default)]
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Book {
    /// Price with two decimals, e.g. `$12.50`
    pub fn display_price(&self) -> String {
        format_price(self.price)
    }

    /// Placeholder shown instead of a missing cover
    pub fn cover_initial(&self) -> Option<char> {
        self.title.chars().next()
    }

    /// Content reference, if the book can be read
    pub fn content_url(&self) -> Option<&str> {
        self.file_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    /// Case-insensitive substring match on title or author
    ///
    /// `needle` must already be lowercase.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.author.to_lowercase().contains(needle)
    }
}

/// Insert payload for the `books` collection
///
/// Blank optional fields are sent as null rather than empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub genre: Option<String>,
    pub cover_url: Option<String>,
    pub file_url: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub uploaded_by: Option<Uuid>,
}

// ============================================================================
// PURCHASES
// ============================================================================

/// A one-time grant of access to a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub purchase_date: DateTime<Utc>,
    pub amount_paid: Decimal,
}

/// Insert payload for the `purchases` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPurchase {
    pub user_id: Uuid,
    pub book_id: Uuid,
    /// Copied from the book's price at purchase time
    pub amount_paid: Decimal,
}

impl NewPurchase {
    pub fn for_book(user_id: Uuid, book: &Book) -> Self {
        Self {
            user_id,
            book_id: book.id,
            amount_paid: book.price,
        }
    }
}

pub fn format_price(price: Decimal) -> String {
    format!("${:.2}", price.round_dp(2))
}
