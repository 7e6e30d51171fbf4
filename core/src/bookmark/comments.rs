/*
 * comments.rs
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

//! NIP-22 comments on a bookmark event, looked up by `#e`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::protocol::nostr::{
    Filter, NostrError, NostrEvent, PublishResult, RelayConfig, RelayPool, UnsignedEvent,
    KIND_BOOKMARK, KIND_COMMENT,
};

use super::{timestamp, unix_seconds, Bookmark};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub event_id: String,
    pub author: String,
    pub content: String,
    /// Event the comment replies to (lowercase `e`), the bookmark for top-level comments.
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `None` for other kinds, empty content or a bad timestamp.
pub fn comment_from_event(event: &NostrEvent) -> Option<Comment> {
    if event.kind != KIND_COMMENT || event.content.trim().is_empty() {
        return None;
    }
    Some(Comment {
        event_id: event.id.clone(),
        author: event.pubkey.clone(),
        content: event.content.clone(),
        parent_id: event.tag_value("e").map(str::to_string),
        created_at: timestamp(event.created_at)?,
    })
}

pub struct CommentRepository {
    pool: RelayPool,
    subscribe_timeout: Duration,
    publish_timeout: Duration,
}

impl CommentRepository {
    pub fn new(pool: RelayPool, subscribe_timeout: Duration, publish_timeout: Duration) -> Self {
        Self {
            pool,
            subscribe_timeout,
            publish_timeout,
        }
    }

    /// Comments referencing `bookmark_event_id`, newest first.
    pub async fn fetch_comments(
        &self,
        relays: &[RelayConfig],
        bookmark_event_id: &str,
        limit: u32,
    ) -> Vec<Comment> {
        let filter = Filter::new()
            .kinds([KIND_COMMENT])
            .events([bookmark_event_id])
            .limit(limit);
        let read_relays: Vec<RelayConfig> = relays.iter().filter(|r| r.read).cloned().collect();
        let events = self
            .pool
            .subscribe_with_timeout(&read_relays, &filter, self.subscribe_timeout)
            .await;
        let mut comments: Vec<Comment> = events.iter().filter_map(comment_from_event).collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(
            events = events.len(),
            comments = comments.len(),
            "comments fetched"
        );
        comments
    }

    /// Unsigned top-level comment on `bookmark`: root scope (uppercase) and parent (lowercase)
    /// both point at the bookmark event.
    pub fn comment_template(
        &self,
        author_hex: &str,
        bookmark: &Bookmark,
        content: &str,
        now: DateTime<Utc>,
    ) -> UnsignedEvent {
        let kind = KIND_BOOKMARK.to_string();
        let tags = vec![
            vec!["E".into(), bookmark.event_id.clone(), String::new(), bookmark.author.clone()],
            vec!["K".into(), kind.clone()],
            vec!["P".into(), bookmark.author.clone()],
            vec!["e".into(), bookmark.event_id.clone(), String::new(), bookmark.author.clone()],
            vec!["k".into(), kind],
            vec!["p".into(), bookmark.author.clone()],
        ];
        UnsignedEvent {
            pubkey: author_hex.to_string(),
            created_at: unix_seconds(now),
            kind: KIND_COMMENT,
            tags,
            content: content.to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(content: &str, kind: u32) -> NostrEvent {
        NostrEvent {
            id: "c1".into(),
            pubkey: "bob".into(),
            created_at: 1_700_000_000,
            kind,
            tags: vec![
                vec!["E".into(), "b1".into()],
                vec!["e".into(), "b1".into()],
            ],
            content: content.into(),
            sig: "sig".into(),
        }
    }

    #[test]
    fn decodes_comment() {
        let c = comment_from_event(&comment("nice find", KIND_COMMENT)).unwrap();
        assert_eq!(c.author, "bob");
        assert_eq!(c.parent_id.as_deref(), Some("b1"));
        assert_eq!(c.created_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn skips_empty_and_foreign_kinds() {
        assert!(comment_from_event(&comment("  ", KIND_COMMENT)).is_none());
        assert!(comment_from_event(&comment("hi", 1)).is_none());
    }
}
