//! Socket handle owned by a role
//!
//! All network work happens on the socket's I/O thread. The owner posts
//! outbound messages on a channel and wakes the thread; inbound messages
//! arrive on a second channel that can also take part in a
//! [`Select`](crossbeam::channel::Select) across several sockets.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Select, Sender, TryRecvError};
use mio::net::TcpListener;
use mio::{Poll, Waker};
use tracing::info;

use super::reactor::{Inbound, Outbound, Reactor, Role, WAKER};
use super::{parse_endpoint, SocketKind, Variant};
use crate::error::{DomoError, Result};
use crate::protocol::frame::MAX_FRAME_SIZE;

/// Size of the peer identity frame a ROUTER prepends on receipt
pub const IDENTITY_SIZE: usize = 4;

/// A message as a socket kind natively sends and receives it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMessage {
    /// Ordered frames (ROUTER, DEALER, PAIR)
    Multipart(Vec<Vec<u8>>),
    /// One frame plus the peer it came from or goes to (SERVER, CLIENT)
    Frame {
        data: Vec<u8>,
        routing_id: Option<u32>,
    },
}

impl RawMessage {
    fn form(&self) -> &'static str {
        match self {
            Self::Multipart(_) => "multipart messages",
            Self::Frame { .. } => "single frames",
        }
    }
}

/// Identity frame for a peer as seen by a ROUTER
#[inline(always)]
pub fn identity_frame(peer: u32) -> Vec<u8> {
    peer.to_be_bytes().to_vec()
}

/// Peer number from a ROUTER identity frame
pub fn peer_from_identity(frame: &[u8]) -> Result<u32> {
    let bytes: [u8; IDENTITY_SIZE] = frame.try_into().map_err(|_| {
        DomoError::protocol(format!(
            "identity frame must be {} bytes, got {}",
            IDENTITY_SIZE,
            frame.len()
        ))
    })?;
    Ok(u32::from_be_bytes(bytes))
}

pub struct Socket {
    kind: SocketKind,
    local_addr: Option<SocketAddr>,
    inbound: Receiver<Inbound>,
    outbound: Sender<Outbound>,
    waker: Waker,
    shutdown: Arc<AtomicBool>,
    io_thread: Option<JoinHandle<()>>,
}

impl Socket {
    /// Listen on `endpoint` and accept any number of peers
    ///
    /// Binding happens before this returns, so a port of 0 can be read back
    /// through [`Socket::local_addr`].
    pub fn bind(kind: SocketKind, endpoint: &str) -> Result<Self> {
        let addr = parse_endpoint(endpoint)?;
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        info!(%kind, addr = %local_addr, "socket bound");
        Self::spawn(
            kind,
            Role::Bind(TcpListener::from_std(listener)),
            Some(local_addr),
        )
    }

    /// Connect to `endpoint` in the background
    ///
    /// Returns immediately; the I/O thread keeps retrying until the peer
    /// listens, and messages sent meanwhile wait for the connection.
    pub fn connect(kind: SocketKind, endpoint: &str) -> Result<Self> {
        let addr = parse_endpoint(endpoint)?;
        Self::spawn(kind, Role::Connect(addr), None)
    }

    fn spawn(kind: SocketKind, role: Role, local_addr: Option<SocketAddr>) -> Result<Self> {
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKER)?;
        let (inbound_tx, inbound_rx) = channel::unbounded();
        let (outbound_tx, outbound_rx) = channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let reactor = Reactor::new(kind, poll, inbound_tx, outbound_rx, shutdown.clone());
        let io_thread = thread::Builder::new()
            .name(format!("domo-io-{}", kind))
            .spawn(move || reactor.run(role))?;

        Ok(Self {
            kind,
            local_addr,
            inbound: inbound_rx,
            outbound: outbound_tx,
            waker,
            shutdown,
            io_thread: Some(io_thread),
        })
    }

    #[inline(always)]
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Address the socket listens on, `None` for connecting sockets
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// `tcp://` address a local peer can connect to
    pub fn connect_endpoint(&self) -> Option<String> {
        self.local_addr.map(|addr| {
            if addr.ip().is_unspecified() {
                format!("tcp://127.0.0.1:{}", addr.port())
            } else {
                format!("tcp://{}", addr)
            }
        })
    }

    /// Queue a message for the I/O thread
    ///
    /// ROUTER takes the destination from the leading identity frame, SERVER
    /// from the routing id. Messages for peers that are gone are dropped.
    pub fn send(&self, msg: RawMessage) -> Result<()> {
        let outbound = match (self.kind.variant(), msg) {
            (Variant::Framed, RawMessage::Multipart(mut frames)) => {
                if self.kind == SocketKind::Router {
                    if frames.is_empty() {
                        return Err(DomoError::protocol("router message without identity frame"));
                    }
                    let identity = frames.remove(0);
                    Outbound {
                        peer: Some(peer_from_identity(&identity)?),
                        frames,
                    }
                } else {
                    Outbound { peer: None, frames }
                }
            }
            (Variant::SingleFrame, RawMessage::Frame { data, routing_id }) => {
                let peer = match (self.kind, routing_id) {
                    (SocketKind::Server, None) => {
                        return Err(DomoError::protocol("server frame without routing id"));
                    }
                    (SocketKind::Server, id) => id,
                    _ => None,
                };
                Outbound {
                    peer,
                    frames: vec![data],
                }
            }
            (_, msg) => {
                return Err(DomoError::unsupported(format!(
                    "{} cannot send {}",
                    self.kind,
                    msg.form()
                )));
            }
        };

        if let Some(frame) = outbound.frames.iter().find(|f| f.len() > MAX_FRAME_SIZE) {
            return Err(DomoError::protocol(format!(
                "frame of {} bytes exceeds limit of {}",
                frame.len(),
                MAX_FRAME_SIZE
            )));
        }

        self.outbound
            .send(outbound)
            .map_err(|_| DomoError::Disconnected)?;
        self.waker.wake()?;
        Ok(())
    }

    /// Block until a message arrives
    ///
    /// A connecting socket whose link was dropped for a protocol error
    /// reports that error once, then `Disconnected`.
    pub fn recv(&self) -> Result<RawMessage> {
        let msg = self.inbound.recv().map_err(|_| DomoError::Disconnected)?;
        self.deliver(msg)
    }

    /// Take a message if one is waiting
    pub fn try_recv(&self) -> Result<Option<RawMessage>> {
        match self.inbound.try_recv() {
            Ok(msg) => self.deliver(msg).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(DomoError::Disconnected),
        }
    }

    /// Add this socket's inbound queue to a multi-socket wait
    ///
    /// The returned index identifies the socket in
    /// [`Select::ready`](crossbeam::channel::Select::ready).
    pub fn register<'a>(&'a self, select: &mut Select<'a>) -> usize {
        select.recv(&self.inbound)
    }

    fn deliver(&self, msg: Inbound) -> Result<RawMessage> {
        let (peer, frames) = match msg {
            Inbound::Message { peer, frames } => (peer, frames),
            Inbound::Fault(e) => return Err(e),
        };
        Ok(match self.kind {
            SocketKind::Router => {
                let mut routed = Vec::with_capacity(frames.len() + 1);
                routed.push(identity_frame(peer));
                routed.extend(frames);
                RawMessage::Multipart(routed)
            }
            SocketKind::Dealer | SocketKind::Pair => RawMessage::Multipart(frames),
            SocketKind::Server => RawMessage::Frame {
                data: frames.into_iter().next().unwrap_or_default(),
                routing_id: Some(peer),
            },
            SocketKind::Client => RawMessage::Frame {
                data: frames.into_iter().next().unwrap_or_default(),
                routing_id: None,
            },
        })
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        let _ = self.waker.wake();
        if let Some(handle) = self.io_thread.take() {
            let _ = handle.join();
        }
    }
}
