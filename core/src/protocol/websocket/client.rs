/*
 * client.rs
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

//! WebSocket client: connect to a ws:// or wss:// URL, perform the handshake, return a
//! `WebSocketConnection`.

use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::net::NetStream;
use crate::protocol::websocket::connection::WebSocketConnection;
use crate::protocol::websocket::handshake::{
    build_handshake_request, generate_key, parse_handshake_response, verify_response,
};

/// Parsed components of a WebSocket URL.
#[derive(Debug, PartialEq, Eq)]
pub struct WsUrl<'a> {
    pub tls: bool,
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
}

/// Parse a ws:// or wss:// URL. Query strings stay part of the path.
pub fn parse_ws_url(url: &str) -> io::Result<WsUrl<'_>> {
    let (tls, rest) = if let Some(r) = url.strip_prefix("wss://") {
        (true, r)
    } else if let Some(r) = url.strip_prefix("ws://") {
        (false, r)
    } else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "URL scheme must be ws or wss",
        ));
    };
    let default_port: u16 = if tls { 443 } else { 80 };

    let (authority, path) = match rest.find(['/', '?']) {
        Some(i) if rest.as_bytes()[i] == b'/' => (&rest[..i], &rest[i..]),
        // "wss://host?x" has an empty path; the request target still needs the leading slash
        Some(i) => (&rest[..i], "/"),
        None => (rest, "/"),
    };

    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let end = bracketed.find(']').ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "unterminated IPv6 bracket")
        })?;
        let host = &bracketed[..end];
        let port = match bracketed[end + 1..].strip_prefix(':') {
            Some(p) => parse_port(p)?,
            None => default_port,
        };
        (host, port)
    } else {
        match authority.rfind(':') {
            Some(i) => (&authority[..i], parse_port(&authority[i + 1..])?),
            None => (authority, default_port),
        }
    };

    if host.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "URL has no host"));
    }
    Ok(WsUrl {
        tls,
        host,
        port,
        path,
    })
}

fn parse_port(s: &str) -> io::Result<u16> {
    s.parse::<u16>()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid port"))
}

pub struct WebSocketClient;

impl WebSocketClient {
    /// Connect, upgrade, and return the open connection. No timeout here; callers wrap this
    /// in `tokio::time::timeout`.
    pub async fn connect(url: &str) -> io::Result<WebSocketConnection> {
        let parsed = parse_ws_url(url)?;
        let mut stream = NetStream::connect(parsed.host, parsed.port, parsed.tls).await?;

        let key = generate_key()?;
        let request =
            build_handshake_request(parsed.host, parsed.port, parsed.tls, parsed.path, &key);
        stream.write_all(&request).await?;
        stream.flush().await?;

        let mut read_buf = BytesMut::with_capacity(4096);
        loop {
            let mut tmp = [0u8; 4096];
            let n = stream.read(&mut tmp).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed during handshake",
                ));
            }
            read_buf.extend_from_slice(&tmp[..n]);
            if let Some((response, consumed)) = parse_handshake_response(&read_buf)? {
                verify_response(&response, &key)?;
                let leftover = read_buf.split_off(consumed);
                return Ok(WebSocketConnection::new(stream, leftover));
            }
        }
    }
}
