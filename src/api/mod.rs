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


//! Hosted backend access
//!
//! - [`client`] - HTTP plumbing (headers, retries, error bodies)
//! - [`auth`] - auth API calls and session types
//! - [`gateway`] - the `Gateway` / `AuthProvider` traits the storefront uses
//! - [`remote`] - HTTP implementation of both traits

pub mod auth;
pub mod client;
pub mod gateway;
pub mod remote;

// Re-export commonly used types
pub use auth::{AuthSession, AuthUser};
pub use client::BackendClient;
pub use gateway::{AuthEvent, AuthProvider, Gateway};
pub use remote::RemoteBackend;
