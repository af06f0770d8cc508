//! Domo - minimal request/reply broker
//!
//! Relays envelopes between client-shape peers on the front endpoint and
//! worker peers on the back endpoint. Either endpoint may use the framed
//! (ROUTER/DEALER) or the single-frame (SERVER/CLIENT) transport; the
//! envelope codec makes the two interchangeable.
//!
//! Layers, leaf first:
//! - `protocol`: envelope codec and transport frames
//! - `transport`: mio-driven sockets, one I/O thread each
//! - `endpoint`: server/client endpoints over either wire variant
//! - `broker`: the mediation loop
//! - `driver`: client and echo worker
//! - `tripping`: in-process round-trip benchmark

pub mod broker;
pub mod config;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod transport;
pub mod tripping;

pub use broker::{Broker, BrokerStats, MediationState};
pub use config::{BrokerConfig, TrippingConfig};
pub use endpoint::{ClientEndpoint, ConnectionId, ServerEndpoint};
pub use error::{DomoError, Result};
pub use protocol::Envelope;
pub use transport::{Socket, SocketKind};
