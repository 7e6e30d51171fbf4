/*
 * frame.rs
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

//! WebSocket frame format (RFC 6455 §5): incremental decoder for server frames,
//! encoder for masked client frames.

use bytes::{Buf, BufMut, BytesMut};
use std::io;

pub const OP_CONTINUATION: u8 = 0;
pub const OP_TEXT: u8 = 1;
pub const OP_BINARY: u8 = 2;
pub const OP_CLOSE: u8 = 8;
pub const OP_PING: u8 = 9;
pub const OP_PONG: u8 = 10;

/// Largest data frame payload accepted or sent. Relay events (contact lists in particular)
/// routinely exceed 64 KiB, so this is well above a single event.
pub const MAX_FRAME_PAYLOAD: usize = 4 * 1024 * 1024;

/// One decoded frame.
#[derive(Debug)]
pub struct Frame {
    pub fin: bool,
    pub opcode: u8,
    pub payload: BytesMut,
}

fn is_control(opcode: u8) -> bool {
    opcode == OP_CLOSE || opcode == OP_PING || opcode == OP_PONG
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Header,
    ExtendedLen2,
    ExtendedLen8,
    Payload,
}

/// Incremental decoder for server-to-client frames (never masked).
pub struct FrameParser {
    state: FrameState,
    opcode: u8,
    fin: bool,
    payload_len: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: FrameState::Header,
            opcode: 0,
            fin: false,
            payload_len: 0,
        }
    }

    /// Consume bytes from `buf`. Returns `Ok(None)` when more input is needed, `Ok(Some)` for each
    /// complete frame; call again until `None` to drain the buffer.
    pub fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        loop {
            match self.state {
                FrameState::Header => {
                    if buf.len() < 2 {
                        return Ok(None);
                    }
                    let b0 = buf.get_u8();
                    let b1 = buf.get_u8();
                    if b0 & 0x70 != 0 {
                        return Err(invalid("reserved bits set without negotiated extension"));
                    }
                    if b1 & 0x80 != 0 {
                        return Err(invalid("server frame must not be masked"));
                    }
                    self.fin = b0 & 0x80 != 0;
                    self.opcode = b0 & 0x0f;
                    match b1 & 0x7f {
                        126 => self.state = FrameState::ExtendedLen2,
                        127 => self.state = FrameState::ExtendedLen8,
                        len => self.begin_payload(len as u64)?,
                    }
                }
                FrameState::ExtendedLen2 => {
                    if buf.len() < 2 {
                        return Ok(None);
                    }
                    let len = buf.get_u16() as u64;
                    self.begin_payload(len)?;
                }
                FrameState::ExtendedLen8 => {
                    if buf.len() < 8 {
                        return Ok(None);
                    }
                    let len = buf.get_u64();
                    self.begin_payload(len)?;
                }
                FrameState::Payload => {
                    if buf.len() < self.payload_len {
                        return Ok(None);
                    }
                    let payload = buf.split_to(self.payload_len);
                    self.state = FrameState::Header;
                    return Ok(Some(Frame {
                        fin: self.fin,
                        opcode: self.opcode,
                        payload,
                    }));
                }
            }
        }
    }

    fn begin_payload(&mut self, len: u64) -> io::Result<()> {
        if is_control(self.opcode) {
            if len > 125 {
                return Err(invalid("control frame payload too long"));
            }
            if !self.fin {
                return Err(invalid("control frame must not be fragmented"));
            }
        } else if len > MAX_FRAME_PAYLOAD as u64 {
            return Err(invalid("data frame payload too long"));
        }
        self.payload_len = len as usize;
        self.state = FrameState::Payload;
        Ok(())
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Encode one final frame (client → server frames are always masked with `mask_key`).
pub fn encode_frame(
    opcode: u8,
    payload: &[u8],
    mask_key: &[u8; 4],
    out: &mut BytesMut,
) -> io::Result<()> {
    let len = payload.len();
    if len > MAX_FRAME_PAYLOAD {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "payload too long",
        ));
    }
    out.reserve(14 + len);
    out.put_u8(0x80 | (opcode & 0x0f));
    if len < 126 {
        out.put_u8(0x80 | len as u8);
    } else if len < 65536 {
        out.put_u8(0x80 | 126);
        out.put_u16(len as u16);
    } else {
        out.put_u8(0x80 | 127);
        out.put_u64(len as u64);
    }
    out.put_slice(mask_key);
    for (i, &b) in payload.iter().enumerate() {
        out.put_u8(b ^ mask_key[i % 4]);
    }
    Ok(())
}
