//! Endpoints - one envelope API over both wire variants
//!
//! A server-shape endpoint hands out `(ConnectionId, Envelope)` pairs and
//! replies by id; a client-shape endpoint only sees envelopes. Whether the
//! socket underneath is framed or single-frame is settled once, when the
//! endpoint is built, by picking its [`Wire`].

pub mod wire;

pub use wire::{wire_for, FramedWire, SingleFrameWire, Wire};

use std::fmt;
use std::net::SocketAddr;

use crossbeam::channel::Select;
use tracing::debug;

use crate::error::{DomoError, Result};
use crate::protocol::Envelope;
use crate::transport::{Shape, Socket, SocketKind};

/// Opaque identifier of the peer a server-shape endpoint heard from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(Vec<u8>);

impl ConnectionId {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Id for a single-frame routing id (4 bytes, big-endian)
    #[inline]
    pub fn from_routing_id(routing_id: u32) -> Self {
        Self(routing_id.to_be_bytes().to_vec())
    }

    /// Parse the id back into a single-frame routing id
    pub fn routing_id(&self) -> Result<u32> {
        let bytes: [u8; 4] = self.0.as_slice().try_into().map_err(|_| {
            DomoError::protocol(format!(
                "connection id {} is not a 4-byte routing id",
                self
            ))
        })?;
        Ok(u32::from_be_bytes(bytes))
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

fn require_shape(socket: &Socket, shape: Shape) -> Result<&'static dyn Wire> {
    let kind = socket.kind();
    if kind.shape() != Some(shape) {
        return Err(DomoError::unsupported(format!(
            "{} is not a {:?}-shape socket",
            kind, shape
        )));
    }
    Ok(wire_for(kind.variant()))
}

/// Many peers in, replies addressed by connection id
pub struct ServerEndpoint {
    socket: Socket,
    wire: &'static dyn Wire,
}

impl ServerEndpoint {
    pub fn new(socket: Socket) -> Result<Self> {
        let wire = require_shape(&socket, Shape::Server)?;
        debug!(kind = %socket.kind(), wire = wire.name(), "server endpoint ready");
        Ok(Self { socket, wire })
    }

    pub fn bind(kind: SocketKind, endpoint: &str) -> Result<Self> {
        Self::new(Socket::bind(kind, endpoint)?)
    }

    /// Block until a peer sends an envelope
    pub fn recv(&self) -> Result<(ConnectionId, Envelope)> {
        self.wire.unpack_server(self.socket.recv()?)
    }

    pub fn try_recv(&self) -> Result<Option<(ConnectionId, Envelope)>> {
        match self.socket.try_recv()? {
            Some(raw) => self.wire.unpack_server(raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn send(&self, id: &ConnectionId, parts: &[Vec<u8>]) -> Result<()> {
        self.socket.send(self.wire.pack_server(id, parts)?)
    }

    pub fn kind(&self) -> SocketKind {
        self.socket.kind()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn connect_endpoint(&self) -> Option<String> {
        self.socket.connect_endpoint()
    }

    pub fn register<'a>(&'a self, select: &mut Select<'a>) -> usize {
        self.socket.register(select)
    }
}

/// One counterpart, envelopes only
pub struct ClientEndpoint {
    socket: Socket,
    wire: &'static dyn Wire,
}

impl ClientEndpoint {
    pub fn new(socket: Socket) -> Result<Self> {
        let wire = require_shape(&socket, Shape::Client)?;
        debug!(kind = %socket.kind(), wire = wire.name(), "client endpoint ready");
        Ok(Self { socket, wire })
    }

    pub fn connect(kind: SocketKind, endpoint: &str) -> Result<Self> {
        Self::new(Socket::connect(kind, endpoint)?)
    }

    pub fn recv(&self) -> Result<Envelope> {
        self.wire.unpack_client(self.socket.recv()?)
    }

    pub fn try_recv(&self) -> Result<Option<Envelope>> {
        match self.socket.try_recv()? {
            Some(raw) => self.wire.unpack_client(raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn send(&self, parts: &[Vec<u8>]) -> Result<()> {
        self.socket.send(self.wire.pack_client(parts)?)
    }

    pub fn kind(&self) -> SocketKind {
        self.socket.kind()
    }
}
