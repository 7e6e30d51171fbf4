/*
 * relay_list.rs
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

//! Cold-start relay discovery: ask the bootstrap relays for a user's kind 10002 event.

use std::time::Duration;

use tracing::debug;

use super::error::NostrError;
use super::keys::is_valid_hex_key;
use super::nip65::parse_relay_list;
use super::pool::RelayPool;
use super::types::{Filter, NostrEvent, RelayConfig};

pub struct RelayListFetcher {
    pool: RelayPool,
    bootstrap_relays: Vec<RelayConfig>,
    timeout: Duration,
}

impl RelayListFetcher {
    pub fn new(pool: RelayPool, bootstrap_relays: Vec<RelayConfig>, timeout: Duration) -> Self {
        Self {
            pool,
            bootstrap_relays,
            timeout,
        }
    }

    /// Relays from the newest relay list the bootstrap relays know for `pubkey_hex`.
    /// `Ok(vec![])` when nobody has one.
    pub async fn fetch_relay_list(&self, pubkey_hex: &str) -> Result<Vec<RelayConfig>, NostrError> {
        if !is_valid_hex_key(pubkey_hex) {
            return Err(NostrError::InvalidPubkey(pubkey_hex.to_string()));
        }
        // relays match authors as lowercase hex only
        let filter = Filter::relay_list(&pubkey_hex.to_ascii_lowercase());
        let events = self
            .pool
            .subscribe_with_timeout(&self.bootstrap_relays, &filter, self.timeout)
            .await;
        let Some(newest) = newest_event(&events) else {
            debug!("no relay list found");
            return Ok(Vec::new());
        };
        let relays = parse_relay_list(newest);
        debug!(
            created_at = newest.created_at,
            count = relays.len(),
            "relay list fetched"
        );
        Ok(relays)
    }
}

/// Largest `created_at`; on a tie the earliest in the list wins.
pub(crate) fn newest_event(events: &[NostrEvent]) -> Option<&NostrEvent> {
    let mut best: Option<&NostrEvent> = None;
    for event in events {
        match best {
            Some(current) if event.created_at <= current.created_at => {}
            _ => best = Some(event),
        }
    }
    best
}
