/*
 * mod.rs
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

//! Nostr client core: relay wire codec, NIP-65 relay lists, relay pool fan-out, relay list
//! discovery and caching, NIP-55 signer replies. Keys and event content are never logged.

pub mod cache;
pub mod error;
pub mod keys;
pub mod message;
pub mod nip55;
pub mod nip65;
pub mod pool;
pub mod relay_list;
pub mod repository;
pub mod transport;
pub mod types;

pub use cache::{FileRelayListStore, RelayListStore};
pub use error::NostrError;
pub use message::{decode, parse_relay_message, DecodeError, RelayMessage};
pub use nip65::parse_relay_list;
pub use pool::RelayPool;
pub use relay_list::RelayListFetcher;
pub use repository::RelayListRepository;
pub use transport::{RelayConnector, RelaySocket, TransportError, WebSocketConnector};
pub use types::{
    retain_secure, Filter, NostrEvent, PublishResult, RelayConfig, UnsignedEvent, KIND_BOOKMARK,
    KIND_COMMENT, KIND_RELAY_LIST,
};
