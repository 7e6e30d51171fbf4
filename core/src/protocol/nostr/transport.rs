/*
 * transport.rs
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

//! Relay transport seam. The pool talks to relays through `RelayConnector`/`RelaySocket` so
//! that tests can script relay behaviour; `WebSocketConnector` is the real implementation.
//!
//! Relays that fail to connect are put in exponential backoff (10 s doubling to 300 s) so a
//! dead relay in a user's list does not cost a full connect timeout on every query.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::websocket::{Message, WebSocketClient, WebSocketConnection};

const BACKOFF_BASE_SECS: u64 = 10;
const BACKOFF_MAX_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("relay {url} in backoff ({remaining_secs} seconds remaining)")]
    Backoff { url: String, remaining_secs: u64 },
    #[error("connection timeout to {0}")]
    ConnectTimeout(String),
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// An open relay connection carrying text frames.
#[async_trait]
pub trait RelaySocket: Send {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Next text frame; `Ok(None)` once the relay has closed the connection.
    async fn recv_text(&mut self) -> Result<Option<String>, TransportError>;

    /// Graceful close. Dropping the socket also closes it, without the close handshake.
    async fn close(&mut self);
}

#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelaySocket>, TransportError>;
}

struct BackoffState {
    last_failure: Instant,
    consecutive_failures: u32,
}

fn backoff_seconds(failures: u32) -> u64 {
    if failures == 0 {
        return 0;
    }
    let exp = (failures - 1).min(31);
    BACKOFF_BASE_SECS
        .saturating_mul(1u64 << exp)
        .min(BACKOFF_MAX_SECS)
}

/// Connects with our WebSocket client, applying a connect timeout and per-URL backoff.
pub struct WebSocketConnector {
    connect_timeout: Duration,
    backoff: Mutex<HashMap<String, BackoffState>>,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            backoff: Mutex::new(HashMap::new()),
        }
    }

    fn remaining_backoff(&self, url: &str) -> Option<u64> {
        let map = self.backoff.lock().unwrap_or_else(|e| e.into_inner());
        let state = map.get(url)?;
        let wait = backoff_seconds(state.consecutive_failures);
        let elapsed = state.last_failure.elapsed().as_secs();
        (elapsed < wait).then(|| wait - elapsed)
    }

    fn record_failure(&self, url: &str) {
        let mut map = self.backoff.lock().unwrap_or_else(|e| e.into_inner());
        match map.get_mut(url) {
            Some(state) => {
                let wait = backoff_seconds(state.consecutive_failures);
                if state.last_failure.elapsed().as_secs() >= wait {
                    state.consecutive_failures += 1;
                    state.last_failure = Instant::now();
                }
            }
            None => {
                map.insert(
                    url.to_string(),
                    BackoffState {
                        last_failure: Instant::now(),
                        consecutive_failures: 1,
                    },
                );
            }
        }
    }

    fn record_success(&self, url: &str) {
        let mut map = self.backoff.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(url);
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl RelayConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelaySocket>, TransportError> {
        if let Some(remaining_secs) = self.remaining_backoff(url) {
            return Err(TransportError::Backoff {
                url: url.to_string(),
                remaining_secs,
            });
        }
        match tokio::time::timeout(self.connect_timeout, WebSocketClient::connect(url)).await {
            Ok(Ok(conn)) => {
                self.record_success(url);
                debug!(relay = url, "connected");
                Ok(Box::new(WebSocketSocket { conn }))
            }
            Ok(Err(source)) => {
                self.record_failure(url);
                warn!(relay = url, error = %source, "connect failed");
                Err(TransportError::Connect {
                    url: url.to_string(),
                    source,
                })
            }
            Err(_) => {
                self.record_failure(url);
                warn!(relay = url, "connect timed out");
                Err(TransportError::ConnectTimeout(url.to_string()))
            }
        }
    }
}

struct WebSocketSocket {
    conn: WebSocketConnection,
}

#[async_trait]
impl RelaySocket for WebSocketSocket {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        Ok(self.conn.send_text(text).await?)
    }

    async fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.conn.recv().await? {
                Some(Message::Text(text)) => return Ok(Some(text)),
                Some(Message::Binary(_)) => continue,
                Some(Message::Close(..)) | None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.conn.close(1000, "").await;
    }
}
