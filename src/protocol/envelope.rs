//! Envelope Codec - multi-part messages packed into one buffer
//!
//! Layout (repeated once per part, no separator, no terminator):
//! ┌──────────────────────┬──────────────────────────────┐
//! │ length (u32, BE)     │ part bytes (length bytes)    │
//! └──────────────────────┴──────────────────────────────┘
//!
//! Single-frame sockets carry exactly one physical frame per message, so
//! the parts of an envelope travel inside that frame in this form.

use crate::error::{DomoError, Result};

/// Size of the per-part length header
pub const PART_HEADER_SIZE: usize = 4;

/// Ordered sequence of opaque byte parts
pub type Envelope = Vec<Vec<u8>>;

/// Exact encoded size of `parts`
#[inline(always)]
pub fn encoded_len<P: AsRef<[u8]>>(parts: &[P]) -> usize {
    parts
        .iter()
        .map(|p| PART_HEADER_SIZE + p.as_ref().len())
        .sum()
}

/// Encode parts into one length-prefixed buffer
///
/// An empty sequence encodes to an empty buffer. Each part must be shorter
/// than 4GB to fit its header; callers that put the result on the wire
/// bound the whole buffer by `frame::MAX_FRAME_SIZE` first.
pub fn encode<P: AsRef<[u8]>>(parts: &[P]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(encoded_len(parts));
    for part in parts {
        let part = part.as_ref();
        debug_assert!(part.len() <= u32::MAX as usize, "part too long for header");
        buffer.extend_from_slice(&(part.len() as u32).to_be_bytes());
        buffer.extend_from_slice(part);
    }
    buffer
}

/// Decode a buffer produced by [`encode`] back into its parts
///
/// Fails without a partial result if the buffer is truncated anywhere.
pub fn decode(buffer: &[u8]) -> Result<Envelope> {
    PartDecoder::new(buffer)
        .map(|part| part.map(<[u8]>::to_vec))
        .collect()
}

/// Zero-copy iterator over the parts of an encoded envelope
///
/// Stops after the first error.
pub struct PartDecoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
    failed: bool,
}

impl<'a> PartDecoder<'a> {
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
            failed: false,
        }
    }

    /// Bytes not yet consumed
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    fn next_part(&mut self) -> Result<&'a [u8]> {
        if self.remaining() < PART_HEADER_SIZE {
            return Err(DomoError::CorruptLength);
        }

        let mut header = [0u8; PART_HEADER_SIZE];
        header.copy_from_slice(&self.buffer[self.read_pos..self.read_pos + PART_HEADER_SIZE]);
        let declared = u32::from_be_bytes(header) as usize;
        self.read_pos += PART_HEADER_SIZE;

        let remaining = self.remaining();
        if declared > remaining {
            return Err(DomoError::CorruptBody {
                declared,
                remaining,
            });
        }

        let part = &self.buffer[self.read_pos..self.read_pos + declared];
        self.read_pos += declared;
        Ok(part)
    }
}

impl<'a> Iterator for PartDecoder<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining() == 0 {
            return None;
        }
        let part = self.next_part();
        self.failed = part.is_err();
        Some(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_envelope() {
        let empty: Envelope = Vec::new();
        assert!(encode(&empty).is_empty());
        assert_eq!(decode(&[]).unwrap(), empty);
    }

    #[test]
    fn test_wire_layout() {
        let encoded = encode(&[b"hello".as_slice(), b"".as_slice(), b"ab".as_slice()]);
        let mut expected = Vec::new();
        expected.extend_from_slice(&[0, 0, 0, 5]);
        expected.extend_from_slice(b"hello");
        expected.extend_from_slice(&[0, 0, 0, 0]);
        expected.extend_from_slice(&[0, 0, 0, 2]);
        expected.extend_from_slice(b"ab");
        assert_eq!(encoded, expected);
        assert_eq!(encoded.len(), 7 + 3 * PART_HEADER_SIZE);
    }

    #[test]
    fn test_large_part() {
        let big = vec![0xABu8; 70_000];
        let decoded = decode(&encode(&[&big])).unwrap();
        assert_eq!(decoded, vec![big]);
    }

    #[test]
    fn test_truncated_header() {
        let mut encoded = encode(&[b"hello"]);
        encoded.extend_from_slice(&[0, 0]);
        assert!(matches!(decode(&encoded), Err(DomoError::CorruptLength)));
    }

    #[test]
    fn test_truncated_body() {
        let mut encoded = encode(&[b"hello", b"world"]);
        encoded.pop();
        match decode(&encoded) {
            Err(DomoError::CorruptBody {
                declared,
                remaining,
            }) => {
                assert_eq!(declared, 5);
                assert_eq!(remaining, 4);
            }
            other => panic!("expected CorruptBody, got {:?}", other),
        }
    }

    #[test]
    fn test_decoder_stops_after_error() {
        let mut decoder = PartDecoder::new(&[0u8, 0, 0, 9, 1]);
        assert!(decoder.next().unwrap().is_err());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_decoder_zero_copy() {
        let encoded = encode(&[b"one", b"two"]);
        let parts: Vec<&[u8]> = PartDecoder::new(&encoded)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(parts, vec![b"one".as_slice(), b"two".as_slice()]);
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..300), 0..16)
        ) {
            let encoded = encode(&parts);
            prop_assert_eq!(encoded.len(), encoded_len(&parts));
            prop_assert_eq!(decode(&encoded).unwrap(), parts);
        }
    }
}
