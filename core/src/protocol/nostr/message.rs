/*
 * message.rs
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

//! Relay wire messages (NIP-01). Each WebSocket text frame is one JSON array whose first
//! element names the message type: `["EVENT", sub_id, event]`, `["OK", id, accepted, msg]`,
//! `["EOSE", sub_id]`, `["CLOSED", sub_id, msg]`. Anything else decodes to `Unknown`.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::types::{Filter, NostrEvent};

/// Relay to client message.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Event {
        subscription_id: String,
        event: NostrEvent,
    },
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    Eose {
        subscription_id: String,
    },
    Closed {
        subscription_id: String,
        message: String,
    },
    /// NOTICE, AUTH, COUNT and anything newer.
    Unknown {
        message_type: String,
        raw: Vec<Value>,
    },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty relay message")]
    EmptyMessage,
    #[error("message type is not a string")]
    TypeNotString,
    #[error("malformed EVENT message: {0}")]
    MalformedEvent(&'static str),
    #[error("malformed OK message: {0}")]
    MalformedOk(&'static str),
    #[error("malformed EOSE message: missing subscription id")]
    MalformedEose,
    #[error("malformed CLOSED message: missing subscription id")]
    MalformedClosed,
    #[error("invalid event: {0}")]
    InvalidEvent(#[source] serde_json::Error),
    #[error("relay message is not a JSON array")]
    NotAnArray,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode an already-parsed message array.
pub fn decode(elements: &[Value]) -> Result<RelayMessage, DecodeError> {
    let first = elements.first().ok_or(DecodeError::EmptyMessage)?;
    let message_type = first.as_str().ok_or(DecodeError::TypeNotString)?;
    match message_type {
        "EVENT" => {
            if elements.len() < 3 {
                return Err(DecodeError::MalformedEvent("expected subscription id and event"));
            }
            let subscription_id = elements[1]
                .as_str()
                .ok_or(DecodeError::MalformedEvent("subscription id is not a string"))?;
            let event = NostrEvent::deserialize(&elements[2]).map_err(DecodeError::InvalidEvent)?;
            Ok(RelayMessage::Event {
                subscription_id: subscription_id.to_string(),
                event,
            })
        }
        "OK" => {
            if elements.len() < 3 {
                return Err(DecodeError::MalformedOk("expected event id and status"));
            }
            let event_id = elements[1]
                .as_str()
                .ok_or(DecodeError::MalformedOk("event id is not a string"))?;
            let accepted = elements[2]
                .as_bool()
                .ok_or(DecodeError::MalformedOk("status is not a boolean"))?;
            Ok(RelayMessage::Ok {
                event_id: event_id.to_string(),
                accepted,
                message: optional_string(elements.get(3)),
            })
        }
        "EOSE" => {
            let subscription_id = elements
                .get(1)
                .and_then(Value::as_str)
                .ok_or(DecodeError::MalformedEose)?;
            Ok(RelayMessage::Eose {
                subscription_id: subscription_id.to_string(),
            })
        }
        "CLOSED" => {
            let subscription_id = elements
                .get(1)
                .and_then(Value::as_str)
                .ok_or(DecodeError::MalformedClosed)?;
            Ok(RelayMessage::Closed {
                subscription_id: subscription_id.to_string(),
                message: optional_string(elements.get(2)),
            })
        }
        other => Ok(RelayMessage::Unknown {
            message_type: other.to_string(),
            raw: elements.to_vec(),
        }),
    }
}

fn optional_string(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Parse one text frame.
pub fn parse_relay_message(text: &str) -> Result<RelayMessage, DecodeError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(elements) => decode(&elements),
        _ => Err(DecodeError::NotAnArray),
    }
}

/// `["REQ", sub_id, filter]`
pub fn encode_req(subscription_id: &str, filter: &Filter) -> Result<String, serde_json::Error> {
    serde_json::to_string(&("REQ", subscription_id, filter))
}

/// `["EVENT", event]` with the event forwarded as given.
pub fn encode_event(event: &Value) -> String {
    Value::Array(vec![Value::from("EVENT"), event.clone()]).to_string()
}

/// `["CLOSE", sub_id]`
pub fn encode_close(subscription_id: &str) -> String {
    Value::Array(vec![Value::from("CLOSE"), Value::from(subscription_id)]).to_string()
}
