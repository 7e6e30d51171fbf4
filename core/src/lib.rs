/*
 * lib.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Segnalibro, a Nostr bookmarking client.
 *
 * Segnalibro is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Segnalibro is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Segnalibro.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Segnalibro core: a Nostr client for web bookmarks and their comments.
//!
//! Relays are queried and written in parallel through [`protocol::nostr::RelayPool`]; the
//! user's relay set comes from their NIP-65 list via
//! [`protocol::nostr::RelayListRepository`]. Bookmarks and comments sit on top in
//! [`bookmark`].

pub mod bookmark;
pub mod config;
pub mod net;
pub mod protocol;

pub use config::{ClientConfig, ConfigError};
