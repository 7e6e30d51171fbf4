/*
 * handshake.rs
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

//! WebSocket opening handshake (RFC 6455 §4): GET with Upgrade, parse the 101 response head,
//! verify Sec-WebSocket-Accept.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use std::io;

/// GUID appended to the client key before hashing (RFC 6455 §4.2.2).
const WS_ACCEPT_MAGIC: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Upper bound on the response head; anything longer is not a WebSocket server.
const MAX_RESPONSE_HEAD: usize = 16 * 1024;

/// Status and the headers we care about from the server's response head.
#[derive(Debug)]
pub struct HandshakeResponse {
    pub status: u16,
    pub accept: Option<String>,
    pub upgrade: Option<String>,
}

/// Base64 of 16 random bytes for Sec-WebSocket-Key.
pub fn generate_key() -> io::Result<String> {
    let mut raw = [0u8; 16];
    getrandom::getrandom(&mut raw)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    Ok(STANDARD.encode(raw))
}

/// Build the HTTP GET request for the handshake.
pub fn build_handshake_request(host: &str, port: u16, tls: bool, path: &str, key: &str) -> Vec<u8> {
    let default_port = if tls { 443 } else { 80 };
    let host_header = if port == default_port {
        host.to_string()
    } else if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };
    format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
         Sec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n\r\n",
        path, host_header, key
    )
    .into_bytes()
}

/// Expected Sec-WebSocket-Accept: base64(SHA-1(key + GUID)).
pub fn compute_expected_accept(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_ACCEPT_MAGIC);
    STANDARD.encode(hasher.finalize())
}

/// Try to parse the response head from `buf`. Returns `Ok(None)` until the blank line arrives,
/// then the parsed head and the number of bytes it occupied (frames may follow in the same read).
pub fn parse_handshake_response(buf: &[u8]) -> io::Result<Option<(HandshakeResponse, usize)>> {
    let end = match buf.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(pos) => pos + 4,
        None if buf.len() > MAX_RESPONSE_HEAD => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "handshake response head too long",
            ));
        }
        None => return Ok(None),
    };
    let head = std::str::from_utf8(&buf[..end])
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "handshake response not UTF-8"))?;
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected status line: {}", status_line),
        ));
    }
    let status = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing status code"))?;

    let mut response = HandshakeResponse {
        status,
        accept: None,
        upgrade: None,
    };
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.eq_ignore_ascii_case("Sec-WebSocket-Accept") {
            response.accept = Some(value.trim().to_string());
        } else if name.eq_ignore_ascii_case("Upgrade") {
            response.upgrade = Some(value.trim().to_string());
        }
    }
    Ok(Some((response, end)))
}

/// Check status 101, the Upgrade header and the accept hash against our key.
pub fn verify_response(response: &HandshakeResponse, key: &str) -> io::Result<()> {
    if response.status != 101 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("expected 101 Switching Protocols, got {}", response.status),
        ));
    }
    if let Some(upgrade) = &response.upgrade {
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected Upgrade header: {}", upgrade),
            ));
        }
    }
    let expected = compute_expected_accept(key);
    match response.accept.as_deref() {
        Some(accept) if accept == expected => Ok(()),
        Some(_) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Sec-WebSocket-Accept mismatch",
        )),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing Sec-WebSocket-Accept",
        )),
    }
}
