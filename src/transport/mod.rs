//! Transport Layer: socket kinds, addressing and the mio-driven sockets
//!
//! Socket model:
//! - Server-shape (ROUTER, SERVER): binds, talks to many peers, replies by id
//! - Client-shape (DEALER, CLIENT): connects, talks to exactly one peer
//! - PAIR: connects two endpoints point-to-point, used for signalling
//!
//! Wire variants:
//! - Framed (ROUTER, DEALER, PAIR): native multi-frame messages
//! - Single-frame (SERVER, CLIENT): one frame per message, routing id attached on receipt
//!
//! Each socket owns one background I/O thread; the owning role only sees
//! channel queues and never touches the TCP streams.

mod connection;
mod reactor;
mod socket;

pub use socket::{identity_frame, peer_from_identity, RawMessage, Socket, IDENTITY_SIZE};

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{DomoError, Result};

/// Which side of a conversation an endpoint plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Many anonymous peers, replies addressed by connection id
    Server,
    /// One peer, one counterpart
    Client,
}

/// How a logical message is laid out on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Framed,
    SingleFrame,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    Router = 1,
    Dealer = 2,
    Server = 3,
    Client = 4,
    Pair = 5,
}

impl SocketKind {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Router),
            2 => Some(Self::Dealer),
            3 => Some(Self::Server),
            4 => Some(Self::Client),
            5 => Some(Self::Pair),
            _ => None,
        }
    }

    /// Shape of this kind; PAIR has none
    pub fn shape(self) -> Option<Shape> {
        match self {
            Self::Router | Self::Server => Some(Shape::Server),
            Self::Dealer | Self::Client => Some(Shape::Client),
            Self::Pair => None,
        }
    }

    pub fn variant(self) -> Variant {
        match self {
            Self::Router | Self::Dealer | Self::Pair => Variant::Framed,
            Self::Server | Self::Client => Variant::SingleFrame,
        }
    }

    /// The kind expected on the other end of a connection
    pub fn peer_kind(self) -> Self {
        match self {
            Self::Router => Self::Dealer,
            Self::Dealer => Self::Router,
            Self::Server => Self::Client,
            Self::Client => Self::Server,
            Self::Pair => Self::Pair,
        }
    }

    /// Client-shape counterpart for a server-shape kind (ROUTER -> DEALER, SERVER -> CLIENT)
    pub fn counterpart(self) -> Result<Self> {
        match self.shape() {
            Some(Shape::Server) => Ok(self.peer_kind()),
            _ => Err(DomoError::unsupported(format!(
                "{} has no client-shape counterpart",
                self
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Router => "router",
            Self::Dealer => "dealer",
            Self::Server => "server",
            Self::Client => "client",
            Self::Pair => "pair",
        }
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for SocketKind {
    type Err = DomoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "router" => Ok(Self::Router),
            "dealer" => Ok(Self::Dealer),
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            "pair" => Ok(Self::Pair),
            other => Err(DomoError::unsupported(format!("unknown socket type {:?}", other))),
        }
    }
}

/// Resolve `tcp://host:port` (or plain `host:port`) into a socket address
///
/// `*` as host means every interface.
pub fn parse_endpoint(endpoint: &str) -> Result<SocketAddr> {
    let rest = match endpoint.split_once("://") {
        Some(("tcp", rest)) => rest,
        Some((scheme, _)) => {
            return Err(DomoError::InvalidEndpoint(format!(
                "unsupported scheme {:?} in {}",
                scheme, endpoint
            )))
        }
        None => endpoint,
    };

    let rest = match rest.strip_prefix("*:") {
        Some(port) => format!("0.0.0.0:{}", port),
        None => rest.to_string(),
    };

    rest.to_socket_addrs()
        .map_err(|e| DomoError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?
        .next()
        .ok_or_else(|| DomoError::InvalidEndpoint(format!("{} resolves to nothing", endpoint)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_axes() {
        assert_eq!(SocketKind::Router.shape(), Some(Shape::Server));
        assert_eq!(SocketKind::Server.shape(), Some(Shape::Server));
        assert_eq!(SocketKind::Dealer.shape(), Some(Shape::Client));
        assert_eq!(SocketKind::Client.shape(), Some(Shape::Client));
        assert_eq!(SocketKind::Pair.shape(), None);

        assert_eq!(SocketKind::Router.variant(), Variant::Framed);
        assert_eq!(SocketKind::Client.variant(), Variant::SingleFrame);
    }

    #[test]
    fn test_kind_byte_roundtrip() {
        for kind in [
            SocketKind::Router,
            SocketKind::Dealer,
            SocketKind::Server,
            SocketKind::Client,
            SocketKind::Pair,
        ] {
            assert_eq!(SocketKind::from_u8(kind as u8), Some(kind));
            assert_eq!(kind.peer_kind().peer_kind(), kind);
        }
        assert_eq!(SocketKind::from_u8(0), None);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("ROUTER".parse::<SocketKind>().unwrap(), SocketKind::Router);
        assert_eq!("client".parse::<SocketKind>().unwrap(), SocketKind::Client);
        assert!(matches!(
            "stream".parse::<SocketKind>(),
            Err(DomoError::UnsupportedSocketKind(_))
        ));
    }

    #[test]
    fn test_counterpart() {
        assert_eq!(SocketKind::Router.counterpart().unwrap(), SocketKind::Dealer);
        assert_eq!(SocketKind::Server.counterpart().unwrap(), SocketKind::Client);
        assert!(SocketKind::Dealer.counterpart().is_err());
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("tcp://127.0.0.1:5555").unwrap(),
            "127.0.0.1:5555".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_endpoint("tcp://*:5556").unwrap(),
            "0.0.0.0:5556".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_endpoint("127.0.0.1:0").unwrap(),
            "127.0.0.1:0".parse::<SocketAddr>().unwrap()
        );
        assert!(matches!(
            parse_endpoint("ipc:///tmp/domo"),
            Err(DomoError::InvalidEndpoint(_))
        ));
        assert!(parse_endpoint("tcp://nonsense").is_err());
    }
}
