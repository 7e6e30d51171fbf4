/*
 * nip65.rs
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

//! NIP-65 relay list metadata: `["r", url]` or `["r", url, "read"|"write"]` tags on kind 10002.

use super::types::{NostrEvent, RelayConfig, KIND_RELAY_LIST};

/// Extract relays from a kind 10002 event, in tag order.
///
/// Other kinds yield an empty list. Non-`wss://` URLs are dropped. A marker other than
/// `read` or `write` is treated like no marker (read and write).
pub fn parse_relay_list(event: &NostrEvent) -> Vec<RelayConfig> {
    if event.kind != KIND_RELAY_LIST {
        return Vec::new();
    }
    event
        .tags
        .iter()
        .filter(|tag| tag.first().map(String::as_str) == Some("r"))
        .filter_map(|tag| {
            let url = tag.get(1)?;
            if !url.starts_with("wss://") {
                return None;
            }
            let (read, write) = match tag.get(2).map(String::as_str) {
                Some("read") => (true, false),
                Some("write") => (false, true),
                _ => (true, true),
            };
            Some(RelayConfig::new(url.as_str(), read, write))
        })
        .collect()
}
