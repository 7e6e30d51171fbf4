/*
 * error.rs
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

//! Call-level failures of the relay list fetcher, the relay pool and the repository.
//! Per-relay problems never surface here; they are logged and folded into results.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NostrError {
    /// Not 64 hex characters; raised before any network activity.
    #[error("invalid pubkey: {0}")]
    InvalidPubkey(String),

    /// Neither an npub nor a hex key.
    #[error("invalid pubkey format: {0}")]
    InvalidPubkeyFormat(String),

    #[error("no write relays configured")]
    NoWriteRelays,

    #[error("invalid event JSON: {0}")]
    InvalidJson(String),

    #[error("event has no id")]
    MissingEventId,

    /// Every write relay rejected, timed out or failed. Lists "url: reason" pairs.
    #[error("failed to publish to any relay: {0}")]
    AllRelaysFailed(String),

    #[error("relay list cache: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error("relay list cache format: {0}")]
    CacheFormat(#[from] serde_json::Error),
}
