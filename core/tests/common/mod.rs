/*
 * common/mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Scripted relays for the integration tests. Each URL gets a list of replies that the fake
 * socket plays back after the client's first frame; subscription and event ids are echoed
 * from what the client sent. URLs without a script refuse connections.
 */

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use segnalibro_core::protocol::nostr::{
    NostrError, NostrEvent, RelayConfig, RelayConnector, RelayListStore, RelaySocket,
    TransportError,
};

pub const ALICE: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

#[derive(Clone, Debug)]
pub enum Reply {
    /// `["EVENT", <sub id>, event]`
    Event(Value),
    /// `["EOSE", <sub id>]`
    Eose,
    /// `["CLOSED", <sub id>, message]`
    Closed(&'static str),
    /// `["OK", <event id>, accepted, message]`
    Ok(bool, &'static str),
    /// Sent verbatim.
    Raw(String),
    /// Never answers.
    Hang,
}

#[derive(Default)]
pub struct ScriptedConnector {
    scripts: HashMap<String, Vec<Reply>>,
    connects: Mutex<Vec<String>>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
    closed: Arc<Mutex<Vec<String>>>,
    dropped: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relay(mut self, url: &str, replies: Vec<Reply>) -> Self {
        self.scripts.insert(url.to_string(), replies);
        self
    }

    /// Every URL a connection was attempted to, in order.
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    /// URLs whose socket got a graceful `close()`, in order.
    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }

    /// Number of sockets dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Frames the client sent to `url`.
    pub fn sent_to(&self, url: &str) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, text)| serde_json::from_str(text).unwrap())
            .collect()
    }
}

#[async_trait]
impl RelayConnector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelaySocket>, TransportError> {
        self.connects.lock().unwrap().push(url.to_string());
        match self.scripts.get(url) {
            Some(replies) => Ok(Box::new(ScriptedSocket {
                url: url.to_string(),
                replies: replies.iter().cloned().collect(),
                subscription_id: String::new(),
                event_id: String::new(),
                sent: Arc::clone(&self.sent),
                closed: Arc::clone(&self.closed),
                dropped: Arc::clone(&self.dropped),
            })),
            None => Err(TransportError::Connect {
                url: url.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            }),
        }
    }
}

struct ScriptedSocket {
    url: String,
    replies: VecDeque<Reply>,
    subscription_id: String,
    event_id: String,
    sent: Arc<Mutex<Vec<(String, String)>>>,
    closed: Arc<Mutex<Vec<String>>>,
    dropped: Arc<AtomicUsize>,
}

impl Drop for ScriptedSocket {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RelaySocket for ScriptedSocket {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        let frame: Value = serde_json::from_str(text).unwrap();
        match frame[0].as_str() {
            Some("REQ") => self.subscription_id = frame[1].as_str().unwrap().to_string(),
            Some("EVENT") => self.event_id = frame[1]["id"].as_str().unwrap().to_string(),
            _ => {}
        }
        self.sent.lock().unwrap().push((self.url.clone(), text.to_string()));
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
        let Some(reply) = self.replies.pop_front() else {
            return Ok(None);
        };
        let frame = match reply {
            Reply::Event(event) => json!(["EVENT", self.subscription_id, event]).to_string(),
            Reply::Eose => json!(["EOSE", self.subscription_id]).to_string(),
            Reply::Closed(message) => json!(["CLOSED", self.subscription_id, message]).to_string(),
            Reply::Ok(accepted, message) => {
                json!(["OK", self.event_id, accepted, message]).to_string()
            }
            Reply::Raw(text) => text,
            Reply::Hang => {
                return std::future::pending::<Result<Option<String>, TransportError>>().await
            }
        };
        Ok(Some(frame))
    }

    async fn close(&mut self) {
        self.closed.lock().unwrap().push(self.url.clone());
    }
}

/// Minimal NIP-01 event JSON.
pub fn event(id: &str, kind: u32, created_at: u64, tags: &[&[&str]]) -> Value {
    json!({
        "id": id,
        "pubkey": ALICE,
        "created_at": created_at,
        "kind": kind,
        "tags": tags,
        "content": "",
        "sig": "00",
    })
}

pub fn ids(events: &[NostrEvent]) -> Vec<&str> {
    events.iter().map(|e| e.id.as_str()).collect()
}

pub fn rw(url: &str) -> RelayConfig {
    RelayConfig::read_write(url)
}

#[derive(Default)]
pub struct MemoryStore {
    relays: Mutex<Option<Vec<RelayConfig>>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn with(relays: Vec<RelayConfig>) -> Self {
        Self {
            relays: Mutex::new(Some(relays)),
            saves: Mutex::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl RelayListStore for MemoryStore {
    fn relay_list(&self) -> Result<Option<Vec<RelayConfig>>, NostrError> {
        Ok(self.relays.lock().unwrap().clone())
    }

    fn save_relay_list(&self, relays: &[RelayConfig]) -> Result<(), NostrError> {
        *self.relays.lock().unwrap() = Some(relays.to_vec());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

/// Log output written while the returned guard is alive, at debug level and above.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
