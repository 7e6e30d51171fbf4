/*
 * connection.rs
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

//! WebSocket connection: owns the stream after the handshake, reassembles fragmented
//! messages, answers pings, and exposes `recv`/`send_text`/`close`.
//!
//! Dropping a connection drops the stream, which closes the socket without a close frame;
//! `close()` is the graceful path.

use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::net::NetStream;
use crate::protocol::websocket::frame::{
    encode_frame, FrameParser, MAX_FRAME_PAYLOAD, OP_BINARY, OP_CLOSE, OP_CONTINUATION, OP_PING,
    OP_PONG, OP_TEXT,
};

/// A complete application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    /// Peer closed the connection (optional status code and reason).
    Close(Option<u16>, String),
}

pub struct WebSocketConnection {
    stream: NetStream,
    read_buf: BytesMut,
    frame_parser: FrameParser,
    /// Opcode and payload of a fragmented message in progress.
    partial: Option<(u8, Vec<u8>)>,
    close_sent: bool,
}

impl WebSocketConnection {
    /// `leftover` holds bytes read past the handshake response head.
    pub(crate) fn new(stream: NetStream, leftover: BytesMut) -> Self {
        let mut read_buf = BytesMut::with_capacity(16 * 1024);
        read_buf.extend_from_slice(&leftover);
        Self {
            stream,
            read_buf,
            frame_parser: FrameParser::new(),
            partial: None,
            close_sent: false,
        }
    }

    /// Wait for the next complete message. Returns `Ok(None)` when the peer hangs up
    /// without a close frame.
    pub async fn recv(&mut self) -> io::Result<Option<Message>> {
        loop {
            while let Some(frame) = self.frame_parser.decode(&mut self.read_buf)? {
                match frame.opcode {
                    OP_PING => {
                        self.send_frame(OP_PONG, &frame.payload).await?;
                    }
                    OP_PONG => {}
                    OP_CLOSE => {
                        let (code, reason) = parse_close_payload(&frame.payload);
                        if !self.close_sent {
                            let echoed = &frame.payload[..frame.payload.len().min(2)];
                            let _ = self.send_frame(OP_CLOSE, echoed).await;
                            self.close_sent = true;
                        }
                        return Ok(Some(Message::Close(code, reason)));
                    }
                    OP_TEXT | OP_BINARY => {
                        if self.partial.is_some() {
                            return Err(protocol_error(
                                "new message while a fragmented one is open",
                            ));
                        }
                        if frame.fin {
                            return to_message(frame.opcode, frame.payload.to_vec()).map(Some);
                        }
                        self.partial = Some((frame.opcode, frame.payload.to_vec()));
                    }
                    OP_CONTINUATION => {
                        let Some((opcode, mut data)) = self.partial.take() else {
                            return Err(protocol_error("continuation frame without a message"));
                        };
                        if data.len() + frame.payload.len() > MAX_FRAME_PAYLOAD {
                            return Err(protocol_error("fragmented message too long"));
                        }
                        data.extend_from_slice(&frame.payload);
                        if frame.fin {
                            return to_message(opcode, data).map(Some);
                        }
                        self.partial = Some((opcode, data));
                    }
                    other => {
                        return Err(protocol_error(&format!("unknown opcode {}", other)));
                    }
                }
            }
            let mut tmp = [0u8; 8192];
            let n = self.stream.read(&mut tmp).await?;
            if n == 0 {
                return Ok(None);
            }
            self.read_buf.extend_from_slice(&tmp[..n]);
        }
    }

    pub async fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.send_frame(OP_TEXT, text.as_bytes()).await
    }

    /// Send a close frame (1000 = normal closure) and shut down the write half.
    pub async fn close(&mut self, code: u16, reason: &str) -> io::Result<()> {
        if !self.close_sent {
            let mut payload = Vec::with_capacity(2 + reason.len());
            payload.extend_from_slice(&code.to_be_bytes());
            payload.extend_from_slice(&reason.as_bytes()[..reason.len().min(123)]);
            self.close_sent = true;
            self.send_frame(OP_CLOSE, &payload).await?;
        }
        self.stream.shutdown().await
    }

    async fn send_frame(&mut self, opcode: u8, payload: &[u8]) -> io::Result<()> {
        let mut mask_key = [0u8; 4];
        getrandom::getrandom(&mut mask_key)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        let mut out = BytesMut::with_capacity(14 + payload.len());
        encode_frame(opcode, payload, &mask_key, &mut out)?;
        self.stream.write_all(&out).await?;
        self.stream.flush().await
    }
}

fn to_message(opcode: u8, data: Vec<u8>) -> io::Result<Message> {
    if opcode == OP_TEXT {
        String::from_utf8(data)
            .map(Message::Text)
            .map_err(|_| protocol_error("text message is not valid UTF-8"))
    } else {
        Ok(Message::Binary(data))
    }
}

fn parse_close_payload(data: &[u8]) -> (Option<u16>, String) {
    if data.len() >= 2 {
        let code = u16::from_be_bytes([data[0], data[1]]);
        let reason = String::from_utf8_lossy(&data[2..]).into_owned();
        (Some(code), reason)
    } else {
        (None, String::new())
    }
}

fn protocol_error(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}
