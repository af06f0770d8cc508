//! Client driver: requests through the broker's front endpoint
//!
//! Two timing modes:
//! - Sync: send one, wait for its reply, repeat
//! - Async: send all, then collect all replies

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::endpoint::ClientEndpoint;
use crate::error::Result;
use crate::protocol::Envelope;
use crate::transport::SocketKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTripMode {
    Sync,
    Async,
}

impl fmt::Display for RoundTripMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => f.pad("synchronous"),
            Self::Async => f.pad("asynchronous"),
        }
    }
}

/// Outcome of one batch of round trips
#[derive(Debug, Clone, Copy)]
pub struct RoundTripReport {
    pub mode: RoundTripMode,
    pub requests: usize,
    pub elapsed: Duration,
}

impl RoundTripReport {
    pub fn calls_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.requests as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct Client {
    endpoint: ClientEndpoint,
}

impl Client {
    /// Connect a client-shape socket to the broker's front address
    pub fn connect(kind: SocketKind, address: &str) -> Result<Self> {
        Ok(Self::from_endpoint(ClientEndpoint::connect(kind, address)?))
    }

    pub fn from_endpoint(endpoint: ClientEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn send(&self, env: &[Vec<u8>]) -> Result<()> {
        self.endpoint.send(env)
    }

    pub fn recv(&self) -> Result<Envelope> {
        self.endpoint.recv()
    }

    /// Send `[service, args...]` as one envelope
    pub fn request<A: AsRef<[u8]>>(&self, service: &str, args: &[A]) -> Result<()> {
        let mut env = Vec::with_capacity(args.len() + 1);
        env.push(service.as_bytes().to_vec());
        env.extend(args.iter().map(|a| a.as_ref().to_vec()));
        self.send(&env)
    }

    pub fn sync_round_trips(&self, n: usize, env: &[Vec<u8>]) -> Result<RoundTripReport> {
        let start = Instant::now();
        for _ in 0..n {
            self.send(env)?;
            self.recv()?;
        }
        Ok(self.report(RoundTripMode::Sync, n, start))
    }

    pub fn async_round_trips(&self, n: usize, env: &[Vec<u8>]) -> Result<RoundTripReport> {
        let start = Instant::now();
        for _ in 0..n {
            self.send(env)?;
        }
        for _ in 0..n {
            self.recv()?;
        }
        Ok(self.report(RoundTripMode::Async, n, start))
    }

    fn report(&self, mode: RoundTripMode, requests: usize, start: Instant) -> RoundTripReport {
        let report = RoundTripReport {
            mode,
            requests,
            elapsed: start.elapsed(),
        };
        debug!(
            %mode,
            requests,
            calls_per_second = report.calls_per_second() as u64,
            "round trips done"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_per_second() {
        let report = RoundTripReport {
            mode: RoundTripMode::Sync,
            requests: 500,
            elapsed: Duration::from_millis(250),
        };
        assert!((report.calls_per_second() - 2000.0).abs() < 1e-6);

        let instant = RoundTripReport {
            elapsed: Duration::ZERO,
            ..report
        };
        assert_eq!(instant.calls_per_second(), 0.0);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(RoundTripMode::Sync.to_string(), "synchronous");
        assert_eq!(RoundTripMode::Async.to_string(), "asynchronous");
    }
}
