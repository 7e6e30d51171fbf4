/*
 * pool.rs
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

//! Relay pool: fan one query or one publish out to many relays at once.
//!
//! Every relay gets its own future with its own socket and buffer. A relay that fails, hangs
//! or sends garbage only loses its own contribution; the futures are joined and the results
//! merged on the calling task. Dropping the returned future drops every relay future and so
//! every socket.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::error::NostrError;
use super::message::{self, DecodeError, RelayMessage};
use super::transport::{RelayConnector, TransportError, WebSocketConnector};
use super::types::{Filter, NostrEvent, PublishResult, RelayConfig};

/// Why one relay stopped contributing before EOSE.
#[derive(Debug, Error)]
enum RelayTaskError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("encode REQ: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("connection closed by relay")]
    Closed,
}

/// How a subscription on one relay ended, short of failure or timeout.
#[derive(Debug)]
enum SubscriptionEnd {
    Eose,
    Closed(String),
    Disconnected,
}

/// Per-relay publish outcome.
#[derive(Debug)]
enum PublishOutcome {
    Accepted,
    Rejected(String),
    Failed(String),
}

#[derive(Clone)]
pub struct RelayPool {
    connector: Arc<dyn RelayConnector>,
}

impl RelayPool {
    pub fn new(connector: Arc<dyn RelayConnector>) -> Self {
        Self { connector }
    }

    /// Pool over real WebSocket connections.
    pub fn websocket(connect_timeout: Duration) -> Self {
        Self::new(Arc::new(WebSocketConnector::new(connect_timeout)))
    }

    /// Query every relay in parallel and return the union of stored events, deduplicated by id
    /// in first-seen order. Each relay contributes what it sent before EOSE, CLOSED, failure or
    /// `timeout`, whichever comes first. Never fails.
    pub async fn subscribe_with_timeout(
        &self,
        relays: &[RelayConfig],
        filter: &Filter,
        timeout: Duration,
    ) -> Vec<NostrEvent> {
        if relays.is_empty() {
            return Vec::new();
        }
        let per_relay = join_all(
            relays
                .iter()
                .map(|relay| self.collect_from_relay(&relay.url, filter, timeout)),
        )
        .await;
        dedup_by_id(per_relay.into_iter().flatten())
    }

    async fn collect_from_relay(
        &self,
        url: &str,
        filter: &Filter,
        timeout: Duration,
    ) -> Vec<NostrEvent> {
        let mut events = Vec::new();
        let outcome =
            tokio::time::timeout(timeout, self.drain_subscription(url, filter, &mut events)).await;
        match outcome {
            Ok(Ok(SubscriptionEnd::Eose)) => {
                debug!(relay = url, count = events.len(), "EOSE");
            }
            Ok(Ok(SubscriptionEnd::Closed(reason))) => {
                info!(relay = url, count = events.len(), %reason, "subscription closed by relay");
            }
            Ok(Ok(SubscriptionEnd::Disconnected)) => {
                debug!(relay = url, count = events.len(), "relay disconnected before EOSE");
            }
            Ok(Err(e)) => {
                warn!(relay = url, count = events.len(), error = %e, "subscription failed");
            }
            Err(_) => {
                debug!(relay = url, count = events.len(), "subscription timed out");
            }
        }
        events
    }

    async fn drain_subscription(
        &self,
        url: &str,
        filter: &Filter,
        events: &mut Vec<NostrEvent>,
    ) -> Result<SubscriptionEnd, RelayTaskError> {
        let mut socket = self.connector.connect(url).await?;
        let subscription_id = new_subscription_id();
        socket
            .send_text(&message::encode_req(&subscription_id, filter)?)
            .await?;
        while let Some(text) = socket.recv_text().await? {
            match message::parse_relay_message(&text)? {
                RelayMessage::Event {
                    subscription_id: sid,
                    event,
                } if sid == subscription_id => events.push(event),
                RelayMessage::Eose {
                    subscription_id: sid,
                } if sid == subscription_id => {
                    let _ = socket.send_text(&message::encode_close(&subscription_id)).await;
                    socket.close().await;
                    return Ok(SubscriptionEnd::Eose);
                }
                RelayMessage::Closed {
                    subscription_id: sid,
                    message,
                } if sid == subscription_id => {
                    return Ok(SubscriptionEnd::Closed(message));
                }
                RelayMessage::Unknown { message_type, .. } => {
                    debug!(relay = url, %message_type, "ignoring relay message");
                }
                _ => {}
            }
        }
        Ok(SubscriptionEnd::Disconnected)
    }

    /// Send a signed event to every write relay in parallel. Succeeds when at least one relay
    /// accepts it; otherwise fails with every relay's reason.
    pub async fn publish_event(
        &self,
        relays: &[RelayConfig],
        signed_event_json: &str,
        timeout: Duration,
    ) -> Result<PublishResult, NostrError> {
        let write_relays: Vec<&RelayConfig> = relays.iter().filter(|r| r.write).collect();
        if write_relays.is_empty() {
            return Err(NostrError::NoWriteRelays);
        }
        let event: Value = serde_json::from_str(signed_event_json)
            .map_err(|e| NostrError::InvalidJson(e.to_string()))?;
        let event_id = event
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or(NostrError::MissingEventId)?
            .to_string();
        let frame = message::encode_event(&event);

        let outcomes = join_all(write_relays.iter().map(|relay| {
            let frame = frame.as_str();
            let event_id = event_id.as_str();
            async move {
                let outcome = self.publish_to_relay(&relay.url, frame, event_id, timeout).await;
                (relay.url.clone(), outcome)
            }
        }))
        .await;

        let mut result = PublishResult {
            event_id,
            ..PublishResult::default()
        };
        for (url, outcome) in outcomes {
            match outcome {
                PublishOutcome::Accepted => {
                    result.successful_relays.insert(url);
                }
                PublishOutcome::Rejected(reason) | PublishOutcome::Failed(reason) => {
                    result.failed_relays.push((url, reason));
                }
            }
        }
        if result.successful_relays.is_empty() {
            let details = result
                .failed_relays
                .iter()
                .map(|(url, reason)| format!("{}: {}", url, reason))
                .collect::<Vec<_>>()
                .join("; ");
            warn!(event_id = %result.event_id, "publish failed on every relay");
            return Err(NostrError::AllRelaysFailed(details));
        }
        info!(
            event_id = %result.event_id,
            accepted = result.successful_relays.len(),
            failed = result.failed_relays.len(),
            "published"
        );
        Ok(result)
    }

    async fn publish_to_relay(
        &self,
        url: &str,
        frame: &str,
        event_id: &str,
        timeout: Duration,
    ) -> PublishOutcome {
        match tokio::time::timeout(timeout, self.await_ok(url, frame, event_id)).await {
            Ok(Ok(outcome)) => {
                if let PublishOutcome::Rejected(reason) = &outcome {
                    info!(relay = url, %reason, "event rejected");
                }
                outcome
            }
            Ok(Err(e)) => {
                warn!(relay = url, error = %e, "publish failed");
                PublishOutcome::Failed(e.to_string())
            }
            Err(_) => {
                debug!(relay = url, "publish timed out");
                PublishOutcome::Failed("Timeout".into())
            }
        }
    }

    async fn await_ok(
        &self,
        url: &str,
        frame: &str,
        event_id: &str,
    ) -> Result<PublishOutcome, RelayTaskError> {
        let mut socket = self.connector.connect(url).await?;
        socket.send_text(frame).await?;
        while let Some(text) = socket.recv_text().await? {
            if let RelayMessage::Ok {
                event_id: id,
                accepted,
                message,
            } = message::parse_relay_message(&text)?
            {
                if id != event_id {
                    continue;
                }
                socket.close().await;
                return Ok(if accepted {
                    PublishOutcome::Accepted
                } else if message.is_empty() {
                    PublishOutcome::Rejected("Rejected".into())
                } else {
                    PublishOutcome::Rejected(message)
                });
            }
        }
        Err(RelayTaskError::Closed)
    }

    /// Probe each relay concurrently and keep, in input order, those that accept a connection
    /// within `timeout`.
    pub async fn check_connectivity(
        &self,
        relays: &[RelayConfig],
        timeout: Duration,
    ) -> Vec<RelayConfig> {
        let reachable = join_all(relays.iter().map(|relay| async move {
            match tokio::time::timeout(timeout, self.connector.connect(&relay.url)).await {
                Ok(Ok(mut socket)) => {
                    socket.close().await;
                    true
                }
                Ok(Err(e)) => {
                    debug!(relay = %relay.url, error = %e, "probe failed");
                    false
                }
                Err(_) => {
                    debug!(relay = %relay.url, "probe timed out");
                    false
                }
            }
        }))
        .await;
        relays
            .iter()
            .zip(reachable)
            .filter(|(_, ok)| *ok)
            .map(|(relay, _)| relay.clone())
            .collect()
    }
}

/// Fresh id per relay per query.
fn new_subscription_id() -> String {
    format!("sl_{:016x}", rand::random::<u64>())
}

/// Keep the first occurrence of each event id.
pub fn dedup_by_id(events: impl IntoIterator<Item = NostrEvent>) -> Vec<NostrEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|event| seen.insert(event.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, content: &str) -> NostrEvent {
        NostrEvent {
            id: id.into(),
            pubkey: "pk".into(),
            created_at: 1,
            kind: 1,
            tags: Vec::new(),
            content: content.into(),
            sig: "sig".into(),
        }
    }

    #[test]
    fn dedup_keeps_first_seen() {
        let merged = dedup_by_id(vec![
            event("a", "first"),
            event("b", ""),
            event("a", "second"),
            event("c", ""),
        ]);
        let ids: Vec<_> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(merged[0].content, "first");
    }

    #[test]
    fn subscription_ids_are_fresh() {
        let a = new_subscription_id();
        let b = new_subscription_id();
        assert!(a.starts_with("sl_"));
        assert_eq!(a.len(), 19);
        assert_ne!(a, b);
    }
}
