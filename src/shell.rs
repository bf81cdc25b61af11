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


//! Root shell routing
//!
//! Decides which screen a front end shows for the current session and which
//! storefront tabs a profile may open.

use crate::models::Profile;
use crate::session::SessionState;

/// Top-level screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Initial session lookup still running
    Loading,
    /// No identity; show the sign-in / sign-up screen
    SignIn,
    Storefront,
}

/// Pick the screen for a session snapshot
pub fn route(state: &SessionState) -> Screen {
    if state.loading {
        Screen::Loading
    } else if state.is_signed_in() {
        Screen::Storefront
    } else {
        Screen::SignIn
    }
}

/// Storefront tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Store,
    Library,
    Upload,
}

impl Tab {
    pub fn label(&self, owned_count: usize) -> String {
        match self {
            Tab::Store => "Browse Store".to_string(),
            Tab::Library => format!("My Library ({})", owned_count),
            Tab::Upload => "Upload Book".to_string(),
        }
    }
}

/// Tabs the profile can see, in display order
pub fn available_tabs(profile: Option<&Profile>) -> Vec<Tab> {
    let mut tabs = vec![Tab::Store, Tab::Library];
    if profile.map_or(false, Profile::can_upload) {
        tabs.push(Tab::Upload);
    }
    tabs
}

/// Resolve a navigation request; tabs the profile may not open fall back to the store
pub fn select_tab(requested: Tab, profile: Option<&Profile>) -> Tab {
    if available_tabs(profile).contains(&requested) {
        requested
    } else {
        Tab::Store
    }
}
