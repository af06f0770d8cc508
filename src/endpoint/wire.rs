//! Wire encodings between raw socket messages and `(id, envelope)` pairs
//!
//! Framed (ROUTER/DEALER):
//!   server side  [id][empty][part]*
//!   client side  [empty][part]*
//!
//! Single-frame (SERVER/CLIENT):
//!   one frame holding the envelope codec output, routing id beside it

use super::ConnectionId;
use crate::error::{DomoError, Result};
use crate::protocol::envelope::encoded_len;
use crate::protocol::frame::MAX_FRAME_SIZE;
use crate::protocol::{self, Envelope};
use crate::transport::{RawMessage, Variant};

/// Converts between a socket's native messages and envelopes
pub trait Wire: Send + Sync {
    fn name(&self) -> &'static str;

    /// Split a server-side receipt into sender id and parts
    fn unpack_server(&self, raw: RawMessage) -> Result<(ConnectionId, Envelope)>;

    /// Build a server-side message addressed to `id`
    fn pack_server(&self, id: &ConnectionId, parts: &[Vec<u8>]) -> Result<RawMessage>;

    fn unpack_client(&self, raw: RawMessage) -> Result<Envelope>;

    fn pack_client(&self, parts: &[Vec<u8>]) -> Result<RawMessage>;
}

pub struct FramedWire;

pub struct SingleFrameWire;

static FRAMED: FramedWire = FramedWire;
static SINGLE_FRAME: SingleFrameWire = SingleFrameWire;

/// The one encoding for a variant
#[inline]
pub fn wire_for(variant: Variant) -> &'static dyn Wire {
    match variant {
        Variant::Framed => &FRAMED,
        Variant::SingleFrame => &SINGLE_FRAME,
    }
}

fn expect_multipart(raw: RawMessage) -> Result<Vec<Vec<u8>>> {
    match raw {
        RawMessage::Multipart(frames) => Ok(frames),
        RawMessage::Frame { .. } => Err(DomoError::protocol("expected a multipart message")),
    }
}

/// Remove the leading empty delimiter frame
fn strip_delimiter(mut frames: Vec<Vec<u8>>) -> Result<Envelope> {
    match frames.first() {
        Some(delimiter) if delimiter.is_empty() => {
            frames.remove(0);
            Ok(frames)
        }
        _ => Err(DomoError::protocol("missing empty delimiter frame")),
    }
}

/// Encode an envelope that has to fit in one physical frame
fn encode_single_frame(parts: &[Vec<u8>]) -> Result<Vec<u8>> {
    let len = encoded_len(parts);
    if len > MAX_FRAME_SIZE {
        return Err(DomoError::protocol(format!(
            "encoded envelope of {} bytes exceeds frame limit of {}",
            len, MAX_FRAME_SIZE
        )));
    }
    Ok(protocol::encode(parts))
}

impl Wire for FramedWire {
    fn name(&self) -> &'static str {
        "framed"
    }

    fn unpack_server(&self, raw: RawMessage) -> Result<(ConnectionId, Envelope)> {
        let mut frames = expect_multipart(raw)?;
        if frames.is_empty() {
            return Err(DomoError::protocol("missing connection id frame"));
        }
        let id = ConnectionId::new(frames.remove(0));
        Ok((id, strip_delimiter(frames)?))
    }

    fn pack_server(&self, id: &ConnectionId, parts: &[Vec<u8>]) -> Result<RawMessage> {
        let mut frames = Vec::with_capacity(parts.len() + 2);
        frames.push(id.as_bytes().to_vec());
        frames.push(Vec::new());
        frames.extend_from_slice(parts);
        Ok(RawMessage::Multipart(frames))
    }

    fn unpack_client(&self, raw: RawMessage) -> Result<Envelope> {
        strip_delimiter(expect_multipart(raw)?)
    }

    fn pack_client(&self, parts: &[Vec<u8>]) -> Result<RawMessage> {
        let mut frames = Vec::with_capacity(parts.len() + 1);
        frames.push(Vec::new());
        frames.extend_from_slice(parts);
        Ok(RawMessage::Multipart(frames))
    }
}

impl Wire for SingleFrameWire {
    fn name(&self) -> &'static str {
        "single-frame"
    }

    fn unpack_server(&self, raw: RawMessage) -> Result<(ConnectionId, Envelope)> {
        match raw {
            RawMessage::Frame {
                data,
                routing_id: Some(routing_id),
            } => Ok((
                ConnectionId::from_routing_id(routing_id),
                protocol::decode(&data)?,
            )),
            RawMessage::Frame {
                routing_id: None, ..
            } => Err(DomoError::protocol("frame without routing id")),
            RawMessage::Multipart(_) => Err(DomoError::protocol("expected a single frame")),
        }
    }

    fn pack_server(&self, id: &ConnectionId, parts: &[Vec<u8>]) -> Result<RawMessage> {
        let routing_id = id.routing_id()?;
        Ok(RawMessage::Frame {
            data: encode_single_frame(parts)?,
            routing_id: Some(routing_id),
        })
    }

    fn unpack_client(&self, raw: RawMessage) -> Result<Envelope> {
        match raw {
            RawMessage::Frame { data, .. } => protocol::decode(&data),
            RawMessage::Multipart(_) => Err(DomoError::protocol("expected a single frame")),
        }
    }

    fn pack_client(&self, parts: &[Vec<u8>]) -> Result<RawMessage> {
        Ok(RawMessage::Frame {
            data: encode_single_frame(parts)?,
            routing_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(items: &[&[u8]]) -> Envelope {
        items.iter().map(|p| p.to_vec()).collect()
    }

    #[test]
    fn test_framed_server_layout() {
        let wire = wire_for(Variant::Framed);
        let id = ConnectionId::new(vec![0, 0, 0, 9]);
        let raw = wire.pack_server(&id, &parts(&[b"echo", b"hi"])).unwrap();
        assert_eq!(
            raw,
            RawMessage::Multipart(parts(&[&[0, 0, 0, 9], b"", b"echo", b"hi"]))
        );

        let (back_id, env) = wire.unpack_server(raw).unwrap();
        assert_eq!(back_id, id);
        assert_eq!(env, parts(&[b"echo", b"hi"]));
    }

    #[test]
    fn test_framed_missing_delimiter() {
        let wire = wire_for(Variant::Framed);
        let raw = RawMessage::Multipart(parts(&[b"id", b"hello"]));
        assert!(matches!(
            wire.unpack_server(raw),
            Err(DomoError::ProtocolViolation(_))
        ));

        let raw = RawMessage::Multipart(parts(&[b"hello"]));
        assert!(matches!(
            wire.unpack_client(raw),
            Err(DomoError::ProtocolViolation(_))
        ));

        assert!(wire.unpack_server(RawMessage::Multipart(Vec::new())).is_err());
    }

    #[test]
    fn test_framed_client_layout() {
        let wire = wire_for(Variant::Framed);
        let raw = wire.pack_client(&parts(&[b"hello"])).unwrap();
        assert_eq!(raw, RawMessage::Multipart(parts(&[b"", b"hello"])));
        assert_eq!(wire.unpack_client(raw).unwrap(), parts(&[b"hello"]));
    }

    #[test]
    fn test_single_frame_server() {
        let wire = wire_for(Variant::SingleFrame);
        let raw = RawMessage::Frame {
            data: protocol::encode(&[b"hello"]),
            routing_id: Some(42),
        };
        let (id, env) = wire.unpack_server(raw).unwrap();
        assert_eq!(id, ConnectionId::from_routing_id(42));
        assert_eq!(env, parts(&[b"hello"]));

        match wire.pack_server(&id, &env).unwrap() {
            RawMessage::Frame { data, routing_id } => {
                assert_eq!(routing_id, Some(42));
                assert_eq!(protocol::decode(&data).unwrap(), env);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_single_frame_bad_id() {
        let wire = wire_for(Variant::SingleFrame);
        let id = ConnectionId::new(b"not-four".to_vec());
        assert!(matches!(
            wire.pack_server(&id, &parts(&[b"x"])),
            Err(DomoError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_single_frame_corrupt_payload() {
        let wire = wire_for(Variant::SingleFrame);
        let raw = RawMessage::Frame {
            data: vec![0, 0],
            routing_id: Some(1),
        };
        assert!(matches!(
            wire.unpack_server(raw),
            Err(DomoError::CorruptLength)
        ));

        let raw = RawMessage::Frame {
            data: vec![0, 0, 0, 8, b'x'],
            routing_id: None,
        };
        assert!(matches!(
            wire.unpack_client(raw),
            Err(DomoError::CorruptBody { .. })
        ));
    }

    #[test]
    fn test_wrong_message_form() {
        let framed = wire_for(Variant::Framed);
        let single = wire_for(Variant::SingleFrame);
        let frame = RawMessage::Frame {
            data: Vec::new(),
            routing_id: Some(1),
        };
        assert!(framed.unpack_server(frame).is_err());
        assert!(single
            .unpack_client(RawMessage::Multipart(Vec::new()))
            .is_err());
    }

    #[test]
    fn test_single_frame_size_limit() {
        let wire = wire_for(Variant::SingleFrame);

        // Fits once the part header is counted
        let fits = vec![vec![0u8; MAX_FRAME_SIZE - 4]];
        assert!(wire.pack_client(&fits).is_ok());

        let too_big = vec![vec![0u8; MAX_FRAME_SIZE - 2]];
        assert!(matches!(
            wire.pack_client(&too_big),
            Err(DomoError::ProtocolViolation(_))
        ));
        assert!(matches!(
            wire.pack_server(&ConnectionId::from_routing_id(1), &too_big),
            Err(DomoError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(wire_for(Variant::Framed).name(), "framed");
        assert_eq!(wire_for(Variant::SingleFrame).name(), "single-frame");
    }
}
