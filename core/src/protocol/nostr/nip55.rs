/*
 * nip55.rs
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

//! NIP-55 signer replies. The signer app answers either through intent extras or through a
//! content resolver row; both carry the same fields (`result`, `event`, `package`, and
//! `rejected` when the user declined). We only parse them; launching the signer is the
//! platform layer's job.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::keys::{public_key_to_hex, KeyError};

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("request rejected by signer")]
    Rejected,
    #[error("signer reply has no result")]
    MissingResult,
    #[error("signer returned an invalid public key: {0}")]
    InvalidPubkey(#[from] KeyError),
    #[error("signer returned an invalid event: {0}")]
    InvalidEvent(String),
}

/// Fields of one signer reply, whichever channel it came through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignerResponse {
    #[serde(default, alias = "signature")]
    pub result: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub rejected: bool,
}

impl SignerResponse {
    /// From intent extras. A `rejected` extra with any value other than "false" counts.
    pub fn from_extras(extras: &HashMap<String, String>) -> Self {
        Self {
            result: non_empty(extras.get("result").or_else(|| extras.get("signature"))),
            event: non_empty(extras.get("event")),
            package: non_empty(extras.get("package")),
            rejected: extras
                .get("rejected")
                .map(|v| v != "false")
                .unwrap_or(false),
        }
    }

    /// From a content resolver row. A `rejected` column marks a declined request; a row with
    /// no columns at all means the signer had no permission and also counts as rejected.
    pub fn from_row(columns: &[&str], values: &[Option<String>]) -> Self {
        if columns.is_empty() {
            return Self { rejected: true, ..Self::default() };
        }
        let mut response = Self::default();
        for (name, value) in columns.iter().zip(values) {
            match *name {
                "rejected" => response.rejected = true,
                "result" | "signature" => response.result = non_empty(value.as_ref()),
                "event" => response.event = non_empty(value.as_ref()),
                "package" => response.package = non_empty(value.as_ref()),
                _ => {}
            }
        }
        response
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty()).cloned()
}

/// Reply to `get_public_key`: the signer returns npub or hex; we return hex.
pub fn parse_public_key_response(response: &SignerResponse) -> Result<String, SignerError> {
    if response.rejected {
        return Err(SignerError::Rejected);
    }
    let result = response.result.as_deref().ok_or(SignerError::MissingResult)?;
    Ok(public_key_to_hex(result)?)
}

/// Reply to `sign_event`. Prefer the full signed event; otherwise merge the returned signature
/// into `unsigned_event` (which must already carry its id).
pub fn parse_sign_event_response(
    response: &SignerResponse,
    unsigned_event: Option<&str>,
) -> Result<Value, SignerError> {
    if response.rejected {
        return Err(SignerError::Rejected);
    }
    if let Some(event) = &response.event {
        let value: Value =
            serde_json::from_str(event).map_err(|e| SignerError::InvalidEvent(e.to_string()))?;
        check_signed(&value)?;
        return Ok(value);
    }
    let signature = response.result.as_deref().ok_or(SignerError::MissingResult)?;
    if !is_signature(signature) {
        return Err(SignerError::InvalidEvent("signature is not 64 bytes of hex".into()));
    }
    let template = unsigned_event.ok_or(SignerError::MissingResult)?;
    let mut value: Value =
        serde_json::from_str(template).map_err(|e| SignerError::InvalidEvent(e.to_string()))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| SignerError::InvalidEvent("event is not an object".into()))?;
    object.insert("sig".into(), Value::from(signature));
    check_signed(&value)?;
    Ok(value)
}

fn check_signed(value: &Value) -> Result<(), SignerError> {
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .is_some()
    };
    if !value.is_object() {
        return Err(SignerError::InvalidEvent("event is not an object".into()));
    }
    if !field("id") {
        return Err(SignerError::InvalidEvent("missing id".into()));
    }
    if !field("sig") {
        return Err(SignerError::InvalidEvent("missing sig".into()));
    }
    Ok(())
}

fn is_signature(s: &str) -> bool {
    s.len() == 128 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
