/*
 * bookmarks.rs
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

//! NIP-B0 web bookmarks. The `d` tag is the URL without its scheme, so one author has at most
//! one live bookmark per URL; relays may still hand us older versions.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::protocol::nostr::{
    Filter, NostrError, NostrEvent, PublishResult, RelayConfig, RelayPool, UnsignedEvent,
    KIND_BOOKMARK,
};

use super::{timestamp, unix_seconds};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bookmark {
    pub event_id: String,
    pub author: String,
    /// `d` tag value: URL without scheme.
    pub identifier: String,
    pub url: String,
    pub title: Option<String>,
    pub description: String,
    pub hashtags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Strip the scheme and any trailing slash: `https://example.com/a/` → `example.com/a`.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_string()
}

/// `None` for other kinds, a missing `d` tag or a bad timestamp.
pub fn bookmark_from_event(event: &NostrEvent) -> Option<Bookmark> {
    if event.kind != KIND_BOOKMARK {
        return None;
    }
    let identifier = event.tag_value("d").filter(|d| !d.trim().is_empty())?;
    Some(Bookmark {
        event_id: event.id.clone(),
        author: event.pubkey.clone(),
        identifier: identifier.to_string(),
        url: format!("https://{}", identifier),
        title: event
            .tag_value("title")
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        description: event.content.clone(),
        hashtags: event
            .tag_values("t")
            .map(|t| t.trim_start_matches('#').to_lowercase())
            .filter(|t| !t.is_empty())
            .collect(),
        created_at: timestamp(event.created_at)?,
        published_at: event
            .tag_value("published_at")
            .and_then(|s| s.parse::<u64>().ok())
            .and_then(timestamp),
    })
}

/// Newest first, one per (author, identifier).
fn collect_bookmarks(events: &[NostrEvent]) -> Vec<Bookmark> {
    let mut bookmarks: Vec<Bookmark> = events.iter().filter_map(bookmark_from_event).collect();
    bookmarks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let mut seen = HashSet::new();
    bookmarks.retain(|b| seen.insert((b.author.clone(), b.identifier.clone())));
    bookmarks
}

pub struct BookmarkRepository {
    pool: RelayPool,
    subscribe_timeout: Duration,
    publish_timeout: Duration,
}

impl BookmarkRepository {
    pub fn new(pool: RelayPool, subscribe_timeout: Duration, publish_timeout: Duration) -> Self {
        Self {
            pool,
            subscribe_timeout,
            publish_timeout,
        }
    }

    /// Latest bookmarks from anyone.
    pub async fn fetch_recent(&self, relays: &[RelayConfig], limit: u32) -> Vec<Bookmark> {
        let filter = Filter::new().kinds([KIND_BOOKMARK]).limit(limit);
        self.fetch(relays, &filter).await
    }

    pub async fn fetch_by_author(
        &self,
        relays: &[RelayConfig],
        author_hex: &str,
        limit: u32,
    ) -> Vec<Bookmark> {
        let filter = Filter::new()
            .kinds([KIND_BOOKMARK])
            .authors([author_hex])
            .limit(limit);
        self.fetch(relays, &filter).await
    }

    /// Everyone's bookmark of one URL.
    pub async fn fetch_for_url(&self, relays: &[RelayConfig], url: &str) -> Vec<Bookmark> {
        let filter = Filter::new()
            .kinds([KIND_BOOKMARK])
            .identifiers([normalize_url(url)]);
        self.fetch(relays, &filter).await
    }

    async fn fetch(&self, relays: &[RelayConfig], filter: &Filter) -> Vec<Bookmark> {
        let read_relays: Vec<RelayConfig> = relays.iter().filter(|r| r.read).cloned().collect();
        let events = self
            .pool
            .subscribe_with_timeout(&read_relays, filter, self.subscribe_timeout)
            .await;
        let bookmarks = collect_bookmarks(&events);
        debug!(events = events.len(), bookmarks = bookmarks.len(), "bookmarks fetched");
        bookmarks
    }

    /// Unsigned kind 39701 event for the signer.
    pub fn bookmark_template(
        &self,
        author_hex: &str,
        url: &str,
        title: Option<&str>,
        description: &str,
        hashtags: &[String],
        now: DateTime<Utc>,
    ) -> UnsignedEvent {
        let created_at = unix_seconds(now);
        let mut tags = vec![
            vec!["d".to_string(), normalize_url(url)],
            vec!["published_at".to_string(), created_at.to_string()],
        ];
        if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
            tags.push(vec!["title".to_string(), title.to_string()]);
        }
        for tag in hashtags {
            let tag = tag.trim().trim_start_matches('#').to_lowercase();
            if !tag.is_empty() {
                tags.push(vec!["t".to_string(), tag]);
            }
        }
        UnsignedEvent {
            pubkey: author_hex.to_string(),
            created_at,
            kind: KIND_BOOKMARK,
            tags,
            content: description.to_string(),
        }
    }

    pub async fn publish(
        &self,
        relays: &[RelayConfig],
        signed_event_json: &str,
    ) -> Result<PublishResult, NostrError> {
        self.pool
            .publish_event(relays, signed_event_json, self.publish_timeout)
            .await
    }
}
