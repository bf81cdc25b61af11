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


//! Local session storage
//!
//! SQLite via sqlx, holding only the signed-in session.
//!
//! # Usage Example
//! ```no_run
//! use cloudbooks_core::storage::{sessions, Database};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Database::get_default_path()).await?;
//! if let Some(session) = sessions::load_session(db.pool()).await? {
//!     println!("signed in as {}", session.user.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod migrations;
pub mod sessions;

pub use database::Database;
