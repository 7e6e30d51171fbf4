/*
 * keys.rs
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

//! Public key formats: npub bech32 (NIP-19) and 64-character hex.

use bech32::{Bech32, Hrp};
use thiserror::Error;

const HRP_PUBLIC_KEY: &str = "npub";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid hex key: must be 64 hex characters")]
    InvalidHex,
    #[error("not an npub: must start with 'npub1'")]
    NotNpub,
    #[error("invalid bech32: {0}")]
    Bech32(String),
    #[error("wrong prefix: expected 'npub', got '{0}'")]
    WrongPrefix(String),
    #[error("invalid key length: expected 32 bytes, got {0}")]
    WrongLength(usize),
    #[error("invalid public key: must be npub1... or 64-char hex")]
    Unrecognized,
}

pub fn is_valid_hex_key(key: &str) -> bool {
    key.len() == 64 && key.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn is_npub(key: &str) -> bool {
    key.starts_with("npub1")
}

pub fn hex_to_npub(hex_key: &str) -> Result<String, KeyError> {
    if !is_valid_hex_key(hex_key) {
        return Err(KeyError::InvalidHex);
    }
    let bytes = hex_to_bytes(hex_key).ok_or(KeyError::InvalidHex)?;
    let hrp = Hrp::parse(HRP_PUBLIC_KEY).map_err(|e| KeyError::Bech32(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, &bytes).map_err(|e| KeyError::Bech32(e.to_string()))
}

pub fn npub_to_hex(npub: &str) -> Result<String, KeyError> {
    if !is_npub(npub) {
        return Err(KeyError::NotNpub);
    }
    let (hrp, bytes) = bech32::decode(npub).map_err(|e| KeyError::Bech32(e.to_string()))?;
    if hrp.as_str() != HRP_PUBLIC_KEY {
        return Err(KeyError::WrongPrefix(hrp.to_string()));
    }
    if bytes.len() != 32 {
        return Err(KeyError::WrongLength(bytes.len()));
    }
    Ok(bytes_to_hex(&bytes))
}

/// Accept npub or hex, return lowercase hex.
pub fn public_key_to_hex(key: &str) -> Result<String, KeyError> {
    let trimmed = key.trim();
    if is_npub(trimmed) {
        npub_to_hex(trimmed)
    } else if is_valid_hex_key(trimmed) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(KeyError::Unrecognized)
    }
}

fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| Some((hex_val(pair[0])? << 4) | hex_val(pair[1])?))
        .collect()
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX[(b >> 4) as usize] as char);
        s.push(HEX[(b & 0x0f) as usize] as char);
    }
    s
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
