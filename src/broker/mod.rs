//! Broker: relays requests from the front endpoint to the back endpoint and
//! replies the other way
//!
//! Loop, single-threaded:
//! 1. Block until front, back or the interrupt channel is ready
//! 2. Take at most one envelope from each endpoint
//! 3. Flush each pending queue to its side's last peer

mod state;

pub use state::{is_greeting, BrokerStats, MediationState, GREETING};

use crossbeam::channel::{Receiver, Select, TryRecvError};
use tracing::{debug, info};

use crate::config::BrokerConfig;
use crate::endpoint::ServerEndpoint;
use crate::error::Result;

pub struct Broker {
    front: ServerEndpoint,
    back: ServerEndpoint,
    state: MediationState,
    interrupt: Option<Receiver<()>>,
    stats: BrokerStats,
}

impl Broker {
    pub fn new(front: ServerEndpoint, back: ServerEndpoint) -> Self {
        Self {
            front,
            back,
            state: MediationState::new(),
            interrupt: None,
            stats: BrokerStats::default(),
        }
    }

    /// Bind both endpoints as configured
    pub fn bind(config: &BrokerConfig) -> Result<Self> {
        let front = ServerEndpoint::bind(config.front_kind, &config.front_address)?;
        let back = ServerEndpoint::bind(config.back_kind, &config.back_address)?;
        Ok(Self::new(front, back))
    }

    /// Stop the loop when a message arrives on `interrupt` or its senders hang up
    pub fn with_interrupt(mut self, interrupt: Receiver<()>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn front(&self) -> &ServerEndpoint {
        &self.front
    }

    pub fn back(&self) -> &ServerEndpoint {
        &self.back
    }

    pub fn state(&self) -> &MediationState {
        &self.state
    }

    pub fn stats(&self) -> BrokerStats {
        self.stats
    }

    /// Run until interrupted
    ///
    /// Interruption ends with `Ok(())`; any endpoint error ends the loop
    /// and is returned as is.
    pub fn mediate(&mut self) -> Result<()> {
        info!(
            front = %self.front.kind(),
            back = %self.back.kind(),
            "broker mediating"
        );

        let result = self.mediate_loop();

        info!(
            front_received = self.stats.front_received,
            back_received = self.stats.back_received,
            greetings = self.stats.greetings_suppressed,
            to_front = self.stats.forwarded_to_front,
            to_back = self.stats.forwarded_to_back,
            "broker stopped"
        );
        result
    }

    fn mediate_loop(&mut self) -> Result<()> {
        loop {
            // === PHASE 1: Wait for readiness ===
            if self.wait_ready() {
                debug!("broker interrupted");
                return Ok(());
            }

            // === PHASE 2: At most one receipt per side ===
            if let Some((id, env)) = self.front.try_recv()? {
                debug!(peer = %id, parts = env.len(), "front receipt");
                self.stats.front_received += 1;
                self.state.accept_front(id, env);
            }

            if let Some((id, env)) = self.back.try_recv()? {
                debug!(peer = %id, parts = env.len(), "back receipt");
                self.stats.back_received += 1;
                if !self.state.accept_back(id, env) {
                    self.stats.greetings_suppressed += 1;
                    info!("worker greeting received");
                }
            }

            // === PHASE 3: Flush pending queues ===
            if let Some((peer, batch)) = self.state.take_front_batch() {
                for env in &batch {
                    self.front.send(&peer, env)?;
                }
                self.stats.forwarded_to_front += batch.len() as u64;
            }

            if let Some((peer, batch)) = self.state.take_back_batch() {
                for env in &batch {
                    self.back.send(&peer, env)?;
                }
                self.stats.forwarded_to_back += batch.len() as u64;
            }
        }
    }

    /// Block until something is ready; `true` means interrupted
    fn wait_ready(&self) -> bool {
        let mut select = Select::new();
        self.front.register(&mut select);
        self.back.register(&mut select);
        let interrupt = self.interrupt.as_ref().map(|rx| select.recv(rx));

        let ready = select.ready();
        match (&self.interrupt, interrupt) {
            // ready() may wake spuriously, so confirm before stopping
            (Some(rx), Some(index)) if index == ready => {
                !matches!(rx.try_recv(), Err(TryRecvError::Empty))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::ClientEndpoint;
    use crate::error::DomoError;
    use crate::protocol::frame::MAX_FRAME_SIZE;
    use crate::transport::{RawMessage, Socket, SocketKind};
    use crossbeam::channel;
    use std::thread;
    use std::time::Duration;

    fn local_config(front: SocketKind, back: SocketKind) -> BrokerConfig {
        BrokerConfig {
            front_kind: front,
            back_kind: back,
            front_address: "tcp://127.0.0.1:0".to_string(),
            back_address: "tcp://127.0.0.1:0".to_string(),
        }
    }

    #[test]
    fn test_interrupt_by_message() {
        let (tx, rx) = channel::bounded(1);
        let mut broker = Broker::bind(&local_config(SocketKind::Router, SocketKind::Router))
            .unwrap()
            .with_interrupt(rx);

        tx.send(()).unwrap();
        assert!(broker.mediate().is_ok());
        assert_eq!(broker.stats(), BrokerStats::default());
    }

    #[test]
    fn test_interrupt_by_hangup() {
        let (tx, rx) = channel::bounded::<()>(1);
        let mut broker = Broker::bind(&local_config(SocketKind::Server, SocketKind::Server))
            .unwrap()
            .with_interrupt(rx);

        drop(tx);
        assert!(broker.mediate().is_ok());
    }

    #[test]
    fn test_relays_and_suppresses_greeting() {
        let (tx, rx) = channel::bounded(1);
        let mut broker = Broker::bind(&local_config(SocketKind::Router, SocketKind::Server))
            .unwrap()
            .with_interrupt(rx);
        let front = broker.front().connect_endpoint().unwrap();
        let back = broker.back().connect_endpoint().unwrap();

        let handle = thread::spawn(move || {
            broker.mediate().unwrap();
            broker
        });

        let worker = ClientEndpoint::connect(SocketKind::Client, &back).unwrap();
        worker.send(&[GREETING.to_vec()]).unwrap();

        let client = ClientEndpoint::connect(SocketKind::Dealer, &front).unwrap();
        client.send(&[b"hello".to_vec()]).unwrap();

        let request = worker.recv().unwrap();
        assert_eq!(request, vec![b"hello".to_vec()]);
        worker.send(&request).unwrap();

        assert_eq!(client.recv().unwrap(), vec![b"hello".to_vec()]);

        tx.send(()).unwrap();
        let broker = handle.join().unwrap();
        assert!(broker.state().front_peer().is_some());
        assert!(broker.state().back_peer().is_some());
        assert_eq!(broker.state().back_pending(), 0);
        assert_eq!(broker.state().front_pending(), 0);

        let stats = broker.stats();
        assert_eq!(stats.front_received, 1);
        assert_eq!(stats.back_received, 2);
        assert_eq!(stats.greetings_suppressed, 1);
        assert_eq!(stats.forwarded_to_back, 1);
        assert_eq!(stats.forwarded_to_front, 1);
    }

    #[test]
    fn test_missing_delimiter_ends_mediation() {
        let mut broker =
            Broker::bind(&local_config(SocketKind::Router, SocketKind::Router)).unwrap();
        let front = broker.front().connect_endpoint().unwrap();

        // Raw dealer, so no empty delimiter frame goes in front of the body
        let dealer = Socket::connect(SocketKind::Dealer, &front).unwrap();
        dealer
            .send(RawMessage::Multipart(vec![b"hello".to_vec()]))
            .unwrap();

        assert!(matches!(
            broker.mediate(),
            Err(DomoError::ProtocolViolation(_))
        ));
        assert_eq!(broker.stats().front_received, 0);
    }

    #[test]
    fn test_oversize_request_for_single_frame_back() {
        let mut broker =
            Broker::bind(&local_config(SocketKind::Router, SocketKind::Server)).unwrap();
        let front = broker.front().connect_endpoint().unwrap();
        let back = broker.back().connect_endpoint().unwrap();

        let worker = ClientEndpoint::connect(SocketKind::Client, &back).unwrap();
        worker.send(&[GREETING.to_vec()]).unwrap();

        // One framed part that fits a frame, but not once envelope-encoded
        let client = ClientEndpoint::connect(SocketKind::Dealer, &front).unwrap();
        client.send(&[vec![0u8; MAX_FRAME_SIZE - 2]]).unwrap();

        assert!(matches!(
            broker.mediate(),
            Err(DomoError::ProtocolViolation(_))
        ));
        assert_eq!(broker.stats().front_received, 1);
        assert_eq!(broker.stats().forwarded_to_back, 0);

        // Nothing reached the worker; its link is still up while the broker lives
        thread::sleep(Duration::from_millis(100));
        assert_eq!(worker.try_recv().unwrap(), None);
        drop(broker);
    }
}
