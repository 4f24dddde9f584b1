// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use bytes::{Buf, BufMut, BytesMut};
use std::io::{self, ErrorKind};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Maximum payload length of one frame. Longer frames are not defined by
/// the adapter protocol; rejecting them here keeps a desynchronized stream
/// from driving unbounded allocation.
pub const MAX_FRAME_LEN: usize = 256;

const HEADER_LEN: usize = 4;

/// Length-prefixed frame codec of the adapter IPC.
///
/// A frame is a 4-byte native-endian payload length followed by the ASCII
/// payload. Both sides of the link run on the same host, so the native byte
/// order is part of the protocol. Any decode error closes the channel; the
/// protocol client owns reconnection, not this codec.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&src[..HEADER_LEN]);
        let len = u32::from_ne_bytes(header) as usize;
        if len > MAX_FRAME_LEN {
            warn!("Frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit, closing channel");
            return Err(io::Error::new(ErrorKind::InvalidData, "frame too large"));
        }
        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }
        src.advance(HEADER_LEN);
        let payload = src.split_to(len);
        String::from_utf8(payload.to_vec())
            .map(Some)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
    }
}

impl Encoder<String> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        if item.len() > MAX_FRAME_LEN {
            warn!(
                "Refusing to send frame of {} bytes, limit is {MAX_FRAME_LEN}",
                item.len()
            );
            return Err(io::Error::new(ErrorKind::InvalidData, "frame too large"));
        }
        dst.reserve(HEADER_LEN + item.len());
        dst.put_u32_ne(item.len() as u32);
        dst.put_slice(item.as_bytes());
        Ok(())
    }
}
