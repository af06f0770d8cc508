//! Protocol Layer: byte-level encodings
//!
//! - `envelope`: multi-part envelope packed into one buffer (single-frame payloads)
//! - `frame`: physical frames and the connection greeting used by the transport

pub mod envelope;
pub mod frame;

pub use envelope::{decode, encode, Envelope, PartDecoder};
