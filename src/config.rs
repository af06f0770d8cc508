//! Runtime configuration for the broker and the round-trip benchmark

use crate::transport::SocketKind;

pub const DEFAULT_FRONT_BIND: &str = "tcp://*:5555";
pub const DEFAULT_BACK_BIND: &str = "tcp://*:5556";
pub const DEFAULT_FRONT_CONNECT: &str = "tcp://127.0.0.1:5555";
pub const DEFAULT_BACK_CONNECT: &str = "tcp://127.0.0.1:5556";

/// Round trips per client mode when nothing else is asked for
pub const DEFAULT_ROUND_TRIPS: usize = 10_000;

/// Broker configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub front_kind: SocketKind,
    pub back_kind: SocketKind,
    pub front_address: String,
    pub back_address: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            front_kind: SocketKind::Router,
            back_kind: SocketKind::Router,
            front_address: DEFAULT_FRONT_BIND.to_string(),
            back_address: DEFAULT_BACK_BIND.to_string(),
        }
    }
}

/// In-process benchmark: broker, echo worker and client on their own threads
#[derive(Debug, Clone)]
pub struct TrippingConfig {
    pub broker: BrokerConfig,
    /// Round trips per client mode
    pub requests: usize,
    pub payload: Vec<Vec<u8>>,
}

impl Default for TrippingConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            requests: DEFAULT_ROUND_TRIPS,
            payload: vec![b"hello".to_vec()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrippingConfig::default();
        assert_eq!(config.requests, 10_000);
        assert_eq!(config.payload, vec![b"hello".to_vec()]);
        assert_eq!(config.broker.front_kind, SocketKind::Router);
        assert_eq!(config.broker.front_address, "tcp://*:5555");
        assert_eq!(config.broker.back_address, "tcp://*:5556");
    }
}
