//! Transport wire format - physical frames and the connection greeting
//!
//! Every connection opens with a fixed greeting, then carries frames:
//! ┌─────────────┬──────────────────┬─────────────────────────┐
//! │ flags (u8)  │ length (u32, BE) │ frame bytes             │
//! └─────────────┴──────────────────┴─────────────────────────┘
//!
//! Flag bit 0 (MORE) says another frame of the same message follows.
//! Single-frame sockets never set it.

use crate::error::{DomoError, Result};

/// Greeting: "DM", protocol version, socket kind byte
pub const GREETING_SIZE: usize = 4;
pub const GREETING_MAGIC: [u8; 2] = *b"DM";
pub const PROTOCOL_VERSION: u8 = 1;

pub const FRAME_HEADER_SIZE: usize = 5;
pub const FLAG_MORE: u8 = 0x01;

/// Upper bound on a single frame (64MB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Connection greeting announcing the sender's socket kind
#[inline(always)]
pub fn encode_greeting(kind: u8) -> [u8; GREETING_SIZE] {
    [GREETING_MAGIC[0], GREETING_MAGIC[1], PROTOCOL_VERSION, kind]
}

/// Validate a greeting and return the peer's socket kind byte
pub fn parse_greeting(buf: &[u8]) -> Result<u8> {
    if buf.len() < GREETING_SIZE {
        return Err(DomoError::protocol("short greeting"));
    }
    if buf[..2] != GREETING_MAGIC {
        return Err(DomoError::protocol("bad greeting magic"));
    }
    if buf[2] != PROTOCOL_VERSION {
        return Err(DomoError::protocol(format!(
            "unsupported protocol version {}",
            buf[2]
        )));
    }
    Ok(buf[3])
}

/// Append every frame of one message to `out`, MORE set on all but the last
///
/// An empty message still produces a single empty frame.
pub fn encode_message<F: AsRef<[u8]>>(out: &mut Vec<u8>, frames: &[F]) {
    if frames.is_empty() {
        encode_frame(out, &[], false);
        return;
    }
    let last = frames.len() - 1;
    for (i, frame) in frames.iter().enumerate() {
        encode_frame(out, frame.as_ref(), i < last);
    }
}

/// Append one frame; `data` must be at most [`MAX_FRAME_SIZE`] bytes
#[inline(always)]
pub fn encode_frame(out: &mut Vec<u8>, data: &[u8], more: bool) {
    debug_assert!(data.len() <= MAX_FRAME_SIZE, "frame over size limit");
    out.reserve(FRAME_HEADER_SIZE + data.len());
    out.push(if more { FLAG_MORE } else { 0 });
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

/// Incremental decoder over a stream read buffer
///
/// Returns complete frames only; a partial frame at the tail stays unconsumed.
pub struct FrameDecoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
}

impl<'a> FrameDecoder<'a> {
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
        }
    }

    /// Next complete frame as `(more, data)`, or `None` if more bytes are needed
    pub fn next_frame(&mut self) -> Result<Option<(bool, &'a [u8])>> {
        let available = &self.buffer[self.read_pos..];
        if available.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let flags = available[0];
        let mut len = [0u8; 4];
        len.copy_from_slice(&available[1..FRAME_HEADER_SIZE]);
        let len = u32::from_be_bytes(len) as usize;

        if len > MAX_FRAME_SIZE {
            return Err(DomoError::protocol(format!(
                "frame of {} bytes exceeds limit of {}",
                len, MAX_FRAME_SIZE
            )));
        }
        if available.len() < FRAME_HEADER_SIZE + len {
            return Ok(None);
        }

        let data = &available[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + len];
        self.read_pos += FRAME_HEADER_SIZE + len;
        Ok(Some((flags & FLAG_MORE != 0, data)))
    }

    /// Bytes consumed by the frames returned so far
    #[inline(always)]
    pub fn consumed(&self) -> usize {
        self.read_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting() {
        let greeting = encode_greeting(3);
        assert_eq!(&greeting, b"DM\x01\x03");
        assert_eq!(parse_greeting(&greeting).unwrap(), 3);
    }

    #[test]
    fn test_bad_greeting() {
        assert!(parse_greeting(b"DM").is_err());
        assert!(parse_greeting(b"XX\x01\x00").is_err());
        assert!(parse_greeting(b"DM\x09\x00").is_err());
    }

    #[test]
    fn test_multipart_message() {
        let mut out = Vec::new();
        encode_message(&mut out, &[b"id".as_slice(), b"".as_slice(), b"body".as_slice()]);

        let mut decoder = FrameDecoder::new(&out);
        assert_eq!(decoder.next_frame().unwrap(), Some((true, b"id".as_slice())));
        assert_eq!(decoder.next_frame().unwrap(), Some((true, b"".as_slice())));
        assert_eq!(decoder.next_frame().unwrap(), Some((false, b"body".as_slice())));
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.consumed(), out.len());
    }

    #[test]
    fn test_partial_frame_is_left() {
        let mut out = Vec::new();
        encode_frame(&mut out, b"hello", false);
        let cut = &out[..out.len() - 1];

        let mut decoder = FrameDecoder::new(cut);
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.consumed(), 0);
    }

    #[test]
    fn test_empty_message_is_one_frame() {
        let mut out = Vec::new();
        encode_message::<&[u8]>(&mut out, &[]);
        assert_eq!(out, vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_oversize_frame_rejected() {
        let mut out = vec![0u8];
        out.extend_from_slice(&(MAX_FRAME_SIZE as u32 + 1).to_be_bytes());
        assert!(FrameDecoder::new(&out).next_frame().is_err());
    }
}
