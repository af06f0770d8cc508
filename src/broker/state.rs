//! Mediation state: one pending queue and one last-peer slot per side
//!
//! Every receipt overwrites its side's peer slot, and a flush addresses the
//! whole queue to whoever wrote last. With several clients only the most
//! recent one gets the replies.

use std::mem;

use crate::endpoint::ConnectionId;
use crate::protocol::Envelope;

/// Handshake a worker sends once after connecting
pub const GREETING: &[u8] = b"greetings";

/// Whether `env` is exactly the worker greeting
#[inline]
pub fn is_greeting(env: &[Vec<u8>]) -> bool {
    env.len() == 1 && env[0] == GREETING
}

#[derive(Debug, Default)]
pub struct MediationState {
    front_peer: Option<ConnectionId>,
    back_peer: Option<ConnectionId>,
    /// Replies waiting for the front peer
    front_queue: Vec<Envelope>,
    /// Requests waiting for the back peer
    back_queue: Vec<Envelope>,
}

impl MediationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client request arrived on the front endpoint
    pub fn accept_front(&mut self, id: ConnectionId, env: Envelope) {
        self.front_peer = Some(id);
        self.back_queue.push(env);
    }

    /// A worker message arrived on the back endpoint
    ///
    /// Returns `false` when it was the greeting and got discarded.
    pub fn accept_back(&mut self, id: ConnectionId, env: Envelope) -> bool {
        self.back_peer = Some(id);
        if is_greeting(&env) {
            return false;
        }
        self.front_queue.push(env);
        true
    }

    /// Replies for the front peer, if there is one to send to
    pub fn take_front_batch(&mut self) -> Option<(ConnectionId, Vec<Envelope>)> {
        take_batch(&self.front_peer, &mut self.front_queue)
    }

    /// Requests for the back peer, if there is one to send to
    pub fn take_back_batch(&mut self) -> Option<(ConnectionId, Vec<Envelope>)> {
        take_batch(&self.back_peer, &mut self.back_queue)
    }

    pub fn front_peer(&self) -> Option<&ConnectionId> {
        self.front_peer.as_ref()
    }

    pub fn back_peer(&self) -> Option<&ConnectionId> {
        self.back_peer.as_ref()
    }

    pub fn front_pending(&self) -> usize {
        self.front_queue.len()
    }

    pub fn back_pending(&self) -> usize {
        self.back_queue.len()
    }
}

fn take_batch(
    peer: &Option<ConnectionId>,
    queue: &mut Vec<Envelope>,
) -> Option<(ConnectionId, Vec<Envelope>)> {
    match peer {
        Some(peer) if !queue.is_empty() => Some((peer.clone(), mem::take(queue))),
        _ => None,
    }
}

/// Counters kept by the mediation loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BrokerStats {
    pub front_received: u64,
    pub back_received: u64,
    pub greetings_suppressed: u64,
    pub forwarded_to_front: u64,
    pub forwarded_to_back: u64,
}
