/*
 * repository.rs
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

//! The user's working relay set: discovered once via NIP-65, filtered down to relays that
//! actually answer, cached, and served from the cache afterwards.

use std::sync::Arc;

use tracing::info;

use crate::config::ClientConfig;

use super::cache::RelayListStore;
use super::error::NostrError;
use super::keys::public_key_to_hex;
use super::pool::RelayPool;
use super::relay_list::RelayListFetcher;
use super::types::RelayConfig;

pub struct RelayListRepository {
    fetcher: RelayListFetcher,
    pool: RelayPool,
    store: Arc<dyn RelayListStore>,
    config: ClientConfig,
}

impl RelayListRepository {
    pub fn new(pool: RelayPool, store: Arc<dyn RelayListStore>, config: ClientConfig) -> Self {
        let fetcher = RelayListFetcher::new(
            pool.clone(),
            config.bootstrap_relays.clone(),
            config.subscribe_timeout,
        );
        Self {
            fetcher,
            pool,
            store,
            config,
        }
    }

    /// Discover the user's relays and cache the ones that connect.
    ///
    /// `pubkey` is an npub or hex key. Read+write relays are probed first; at most
    /// `max_probed_relays` are probed and at most `max_cached_relays` kept. An empty result
    /// leaves the previous cache in place.
    pub async fn fetch_and_cache_user_relays(
        &self,
        pubkey: &str,
    ) -> Result<Vec<RelayConfig>, NostrError> {
        let hex = public_key_to_hex(pubkey)
            .map_err(|e| NostrError::InvalidPubkeyFormat(e.to_string()))?;
        let fetched = self.fetcher.fetch_relay_list(&hex).await?;
        if fetched.is_empty() {
            return Ok(Vec::new());
        }
        let mut candidates = rank_relays(fetched);
        candidates.truncate(self.config.max_probed_relays);
        let mut connectable = self
            .pool
            .check_connectivity(&candidates, self.config.connectivity_timeout)
            .await;
        connectable.truncate(self.config.max_cached_relays);
        info!(
            probed = candidates.len(),
            kept = connectable.len(),
            "user relays filtered"
        );
        if !connectable.is_empty() {
            self.store.save_relay_list(&connectable)?;
        }
        Ok(connectable)
    }

    /// Cached relays, or the configured defaults before anything has been cached.
    pub fn relays(&self) -> Result<Vec<RelayConfig>, NostrError> {
        Ok(self
            .store
            .relay_list()?
            .filter(|relays| !relays.is_empty())
            .unwrap_or_else(|| self.config.default_relays.clone()))
    }

    pub fn pool(&self) -> &RelayPool {
        &self.pool
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

/// Read+write relays first; order otherwise preserved.
pub fn rank_relays(mut relays: Vec<RelayConfig>) -> Vec<RelayConfig> {
    relays.sort_by_key(|r| !(r.read && r.write));
    relays
}
