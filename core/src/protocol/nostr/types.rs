/*
 * types.rs
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

//! Nostr event, relay and filter types (NIP-01). Serialization for relay REQ/EVENT messages.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// NIP-22: Comment.
pub const KIND_COMMENT: u32 = 1111;
/// NIP-65: Relay list metadata.
pub const KIND_RELAY_LIST: u32 = 10002;
/// NIP-B0: Web bookmark.
pub const KIND_BOOKMARK: u32 = 39701;

/// NIP-01 event as received from a relay or returned by the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NostrEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u32,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl NostrEvent {
    /// Value of the first tag named `name`, if it has one.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    /// Values of every tag named `name`, in tag order.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.first().map(String::as_str) == Some(name))
            .filter_map(|t| t.get(1).map(String::as_str))
    }
}

/// Event template handed to the external signer: no id, no signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

/// One relay and what we use it for. Identity is the URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelayConfig {
    pub url: String,
    #[serde(default = "default_true")]
    pub read: bool,
    #[serde(default = "default_true")]
    pub write: bool,
}

fn default_true() -> bool {
    true
}

impl RelayConfig {
    pub fn new(url: impl Into<String>, read: bool, write: bool) -> Self {
        Self {
            url: url.into(),
            read,
            write,
        }
    }

    pub fn read_write(url: impl Into<String>) -> Self {
        Self::new(url, true, true)
    }

    /// Only TLS relays are ever connected to.
    pub fn is_secure(&self) -> bool {
        self.url.starts_with("wss://")
    }
}

/// Drop relays without a `wss://` URL, e.g. from a hand-edited cache file or a caller's list.
pub fn retain_secure(relays: Vec<RelayConfig>) -> Vec<RelayConfig> {
    relays
        .into_iter()
        .filter(|relay| {
            let secure = relay.is_secure();
            if !secure {
                warn!(url = %relay.url, "ignoring relay without wss:// scheme");
            }
            secure
        })
        .collect()
}

/// Outcome of publishing one event across the write relays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub event_id: String,
    pub successful_relays: BTreeSet<String>,
    /// (relay URL, reason) in relay order.
    pub failed_relays: Vec<(String, String)>,
}

/// Filter for REQ subscription (NIP-01). Absent fields are omitted from the wire form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u32>>,
    #[serde(rename = "#e", skip_serializing_if = "Option::is_none")]
    pub e_tags: Option<Vec<String>>,
    #[serde(rename = "#p", skip_serializing_if = "Option::is_none")]
    pub p_tags: Option<Vec<String>>,
    #[serde(rename = "#d", skip_serializing_if = "Option::is_none")]
    pub d_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Other tag queries (`#t`, `#a`, ...) and extension keys such as `search`, sent as given.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids<I: IntoIterator<Item = S>, S: Into<String>>(mut self, ids: I) -> Self {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn authors<I: IntoIterator<Item = S>, S: Into<String>>(mut self, authors: I) -> Self {
        self.authors = Some(authors.into_iter().map(Into::into).collect());
        self
    }

    pub fn kinds<I: IntoIterator<Item = u32>>(mut self, kinds: I) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn events<I: IntoIterator<Item = S>, S: Into<String>>(mut self, ids: I) -> Self {
        self.e_tags = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn pubkeys<I: IntoIterator<Item = S>, S: Into<String>>(mut self, pubkeys: I) -> Self {
        self.p_tags = Some(pubkeys.into_iter().map(Into::into).collect());
        self
    }

    pub fn identifiers<I: IntoIterator<Item = S>, S: Into<String>>(mut self, d: I) -> Self {
        self.d_tags = Some(d.into_iter().map(Into::into).collect());
        self
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: u64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Newest relay list (kind 10002) of one author.
    pub fn relay_list(pubkey_hex: &str) -> Self {
        Filter::new()
            .kinds([KIND_RELAY_LIST])
            .authors([pubkey_hex])
            .limit(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relay_list_filter_wire_form() {
        let hex = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";
        let value = serde_json::to_value(Filter::relay_list(hex)).unwrap();
        assert_eq!(value, json!({"kinds": [10002], "authors": [hex], "limit": 1}));
    }

    #[test]
    fn tag_filters_use_hash_keys() {
        let filter = Filter::new().kinds([KIND_COMMENT]).events(["abc"]);
        let value = serde_json::to_value(filter).unwrap();
        assert_eq!(value, json!({"kinds": [1111], "#e": ["abc"]}));
    }

    #[test]
    fn caller_filter_keeps_unmodelled_keys() {
        let wire = json!({"kinds": [1], "#t": ["rust"], "search": "relay", "limit": 5});
        let filter: Filter = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(filter.kinds, Some(vec![1]));
        assert_eq!(filter.limit, Some(5));
        assert_eq!(filter.extra.get("#t"), Some(&json!(["rust"])));
        assert_eq!(serde_json::to_value(&filter).unwrap(), wire);
    }

    #[test]
    fn only_wss_relays_are_retained() {
        let relays = vec![
            RelayConfig::read_write("wss://a"),
            RelayConfig::read_write("ws://plain.example"),
            RelayConfig::read_write("http://x"),
            RelayConfig::new("wss://b", true, false),
        ];
        assert_eq!(
            retain_secure(relays),
            vec![RelayConfig::read_write("wss://a"), RelayConfig::new("wss://b", true, false)]
        );
    }

    #[test]
    fn event_without_tags_decodes() {
        let event: NostrEvent = serde_json::from_value(json!({
            "id": "e1", "pubkey": "p1", "created_at": 5, "kind": 1,
            "content": "hi", "sig": "s"
        }))
        .unwrap();
        assert!(event.tags.is_empty());
        assert_eq!(event.tag_value("d"), None);
    }

    #[test]
    fn tag_lookup() {
        let event = NostrEvent {
            id: "e1".into(),
            pubkey: "p1".into(),
            created_at: 1,
            kind: KIND_BOOKMARK,
            tags: vec![
                vec!["d".into(), "example.com".into()],
                vec!["t".into(), "rust".into()],
                vec!["t".into(), "nostr".into()],
                vec!["t".into()],
            ],
            content: String::new(),
            sig: "s".into(),
        };
        assert_eq!(event.tag_value("d"), Some("example.com"));
        assert_eq!(event.tag_values("t").collect::<Vec<_>>(), vec!["rust", "nostr"]);
    }
}
