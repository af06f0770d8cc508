//! I/O thread: one mio event loop per socket
//!
//! Listens (or connects), greets peers, pushes complete inbound messages to
//! the owner's channel and writes whatever the owner posts on the outbound
//! channel. Stops when the owner drops the socket, or for a connecting
//! socket when its single peer hangs up.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, error, info, warn};

use super::connection::Connection;
use super::SocketKind;
use crate::error::DomoError;

pub(crate) const LISTENER: Token = Token(0);
pub(crate) const WAKER: Token = Token(1);
const FIRST_PEER: usize = 2;
const EVENTS_CAPACITY: usize = 1024;

/// Delay between connection attempts while the peer is not listening
pub(crate) const RECONNECT_INTERVAL: Duration = Duration::from_millis(100);

/// Unsent data gets this many flush attempts on shutdown
const LINGER_ROUNDS: usize = 100;
const LINGER_STEP: Duration = Duration::from_millis(10);

pub(crate) enum Inbound {
    /// A complete message read from a peer
    Message { peer: u32, frames: Vec<Vec<u8>> },
    /// A connecting socket's only link was dropped for this error
    Fault(DomoError),
}

/// A message to write; `peer: None` means the single connected peer
pub(crate) struct Outbound {
    pub peer: Option<u32>,
    pub frames: Vec<Vec<u8>>,
}

pub(crate) enum Role {
    Bind(TcpListener),
    Connect(SocketAddr),
}

pub(crate) struct Reactor {
    kind: SocketKind,
    poll: Poll,
    listener: Option<TcpListener>,
    peers: HashMap<Token, Connection>,
    next_token: usize,
    inbound: Sender<Inbound>,
    outbound: Receiver<Outbound>,
    shutdown: Arc<AtomicBool>,
}

impl Reactor {
    pub fn new(
        kind: SocketKind,
        poll: Poll,
        inbound: Sender<Inbound>,
        outbound: Receiver<Outbound>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            kind,
            poll,
            listener: None,
            peers: HashMap::new(),
            next_token: FIRST_PEER,
            inbound,
            outbound,
            shutdown,
        }
    }

    /// Run the event loop until shutdown
    pub fn run(mut self, role: Role) {
        match role {
            Role::Bind(mut listener) => {
                if let Err(e) = self
                    .poll
                    .registry()
                    .register(&mut listener, LISTENER, Interest::READABLE)
                {
                    error!(kind = %self.kind, error = %e, "failed to register listener");
                    return;
                }
                self.listener = Some(listener);
            }
            Role::Connect(addr) => {
                let stream = match self.connect(addr) {
                    Some(stream) => stream,
                    None => return,
                };
                if let Err(e) = self.add_peer(stream, addr) {
                    error!(kind = %self.kind, %addr, error = %e, "failed to set up connection");
                    return;
                }
                info!(kind = %self.kind, %addr, "connected");
            }
        }

        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        while !self.shutdown.load(Ordering::Acquire) {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!(kind = %self.kind, error = %e, "poll failed");
                break;
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_connections(),
                    WAKER => {}
                    token => {
                        if event.is_readable() || event.is_read_closed() {
                            self.handle_read(token);
                        }
                        if event.is_writable() {
                            self.handle_write(token);
                        }
                    }
                }
            }

            self.drain_outbound();

            if self.listener.is_none() && self.peers.is_empty() {
                debug!(kind = %self.kind, "peer gone, stopping I/O thread");
                break;
            }
        }

        self.linger();
    }

    /// Block until the peer accepts, retrying while it is not listening yet
    fn connect(&self, addr: SocketAddr) -> Option<TcpStream> {
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }
            // Bounded so a silent host cannot hold off shutdown
            match std::net::TcpStream::connect_timeout(&addr, RECONNECT_INTERVAL) {
                Ok(stream) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        error!(kind = %self.kind, %addr, error = %e, "failed to set non-blocking");
                        return None;
                    }
                    return Some(TcpStream::from_std(stream));
                }
                Err(e) => {
                    debug!(kind = %self.kind, %addr, error = %e, "connect failed, retrying");
                    thread::sleep(RECONNECT_INTERVAL);
                }
            }
        }
    }

    fn add_peer(&mut self, mut stream: TcpStream, addr: SocketAddr) -> io::Result<()> {
        let token = Token(self.next_token);
        self.next_token += 1;

        // Writable stays registered; edge-triggered events only fire on transitions
        self.poll.registry().register(
            &mut stream,
            token,
            Interest::READABLE | Interest::WRITABLE,
        )?;

        let conn = Connection::new(stream, addr, self.kind)?;
        self.peers.insert(token, conn);
        debug!(kind = %self.kind, peer = token.0, %addr, "peer attached");
        Ok(())
    }

    fn accept_connections(&mut self) {
        loop {
            let accepted = match self.listener.as_ref() {
                Some(listener) => listener.accept(),
                None => return,
            };
            match accepted {
                Ok((stream, addr)) => {
                    if let Err(e) = self.add_peer(stream, addr) {
                        warn!(kind = %self.kind, %addr, error = %e, "failed to set up peer");
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(kind = %self.kind, error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn handle_read(&mut self, token: Token) {
        let conn = match self.peers.get_mut(&token) {
            Some(conn) => conn,
            None => return,
        };

        let open = match conn.fill_read_buffer() {
            Ok(open) => open,
            Err(e) => {
                debug!(kind = %self.kind, peer = token.0, error = %e, "read failed");
                self.close(token);
                return;
            }
        };

        let messages = match conn.take_messages() {
            Ok(messages) => messages,
            Err(e) => {
                warn!(kind = %self.kind, peer = token.0, error = %e, "dropping peer");
                if self.listener.is_none() {
                    let _ = self.inbound.send(Inbound::Fault(e));
                }
                self.close(token);
                return;
            }
        };

        for frames in messages {
            let msg = Inbound::Message {
                peer: token.0 as u32,
                frames,
            };
            if self.inbound.send(msg).is_err() {
                // Owner is gone, nothing left to deliver to
                return;
            }
        }

        if !open {
            self.close(token);
        }
    }

    fn handle_write(&mut self, token: Token) {
        let result = match self.peers.get_mut(&token) {
            Some(conn) => conn.flush_write_buffer(),
            None => return,
        };
        if let Err(e) = result {
            debug!(kind = %self.kind, peer = token.0, error = %e, "write failed");
            self.close(token);
        }
    }

    fn drain_outbound(&mut self) {
        while let Ok(msg) = self.outbound.try_recv() {
            self.dispatch(msg);
        }
    }

    fn dispatch(&mut self, msg: Outbound) {
        let token = match msg.peer {
            Some(peer) => Token(peer as usize),
            None => match self.peers.keys().next() {
                Some(token) => *token,
                None => {
                    warn!(kind = %self.kind, "no peer connected, dropping message");
                    return;
                }
            },
        };

        let result = match self.peers.get_mut(&token) {
            Some(conn) => {
                conn.queue_message(&msg.frames);
                conn.flush_write_buffer()
            }
            None => {
                debug!(kind = %self.kind, peer = token.0, "unknown peer, dropping message");
                return;
            }
        };
        if let Err(e) = result {
            debug!(kind = %self.kind, peer = token.0, error = %e, "write failed");
            self.close(token);
        }
    }

    fn close(&mut self, token: Token) {
        if let Some(mut conn) = self.peers.remove(&token) {
            let _ = self.poll.registry().deregister(conn.stream_mut());
            debug!(kind = %self.kind, peer = token.0, addr = %conn.addr(), "peer disconnected");
        }
    }

    /// Give already-posted messages a bounded chance to reach the wire
    fn linger(&mut self) {
        self.drain_outbound();

        for _ in 0..LINGER_ROUNDS {
            let tokens: Vec<Token> = self.peers.keys().copied().collect();
            for token in &tokens {
                self.handle_write(*token);
            }
            if self.peers.values().all(|conn| conn.write_pending() == 0) {
                return;
            }
            thread::sleep(LINGER_STEP);
        }
    }
}
