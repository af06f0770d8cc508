//! Echo worker: greets the broker once, then sends every request straight back

use tracing::{debug, info, warn};

use crate::broker::GREETING;
use crate::endpoint::ClientEndpoint;
use crate::error::{DomoError, Result};
use crate::transport::SocketKind;

pub struct EchoWorker {
    endpoint: ClientEndpoint,
    served: u64,
}

impl EchoWorker {
    /// Connect to the broker's back address and announce ourselves
    pub fn connect(kind: SocketKind, address: &str) -> Result<Self> {
        Self::from_endpoint(ClientEndpoint::connect(kind, address)?)
    }

    pub fn from_endpoint(endpoint: ClientEndpoint) -> Result<Self> {
        endpoint.send(&[GREETING.to_vec()])?;
        info!(kind = %endpoint.kind(), "echo worker ready");
        Ok(Self {
            endpoint,
            served: 0,
        })
    }

    /// Receive one envelope and send it back unchanged
    pub fn serve_one(&mut self) -> Result<()> {
        let env = self.endpoint.recv()?;
        self.endpoint.send(&env)?;
        self.served += 1;
        Ok(())
    }

    /// Serve until the broker goes away
    ///
    /// Only a clean hang-up ends with `Ok(())`. A link dropped for a
    /// protocol error is returned as that error.
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.serve_one() {
                Ok(()) => {}
                Err(DomoError::Disconnected) => {
                    debug!(served = self.served, "broker hung up");
                    return Ok(());
                }
                Err(e) => {
                    warn!(served = self.served, error = %e, "worker stopped");
                    return Err(e);
                }
            }
        }
    }

    pub fn served(&self) -> u64 {
        self.served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::ServerEndpoint;
    use crate::protocol::frame::encode_greeting;
    use std::io::Write;

    #[test]
    fn test_greets_then_echoes() {
        let server = ServerEndpoint::bind(SocketKind::Server, "tcp://127.0.0.1:0").unwrap();
        let mut worker =
            EchoWorker::connect(SocketKind::Client, &server.connect_endpoint().unwrap()).unwrap();

        let (id, greeting) = server.recv().unwrap();
        assert_eq!(greeting, vec![GREETING.to_vec()]);

        let request = vec![b"echo".to_vec(), b"hi".to_vec()];
        server.send(&id, &request).unwrap();
        worker.serve_one().unwrap();
        assert_eq!(server.recv().unwrap(), (id, request));
        assert_eq!(worker.served(), 1);
    }

    #[test]
    fn test_run_ends_on_hangup() {
        let server = ServerEndpoint::bind(SocketKind::Router, "tcp://127.0.0.1:0").unwrap();
        let mut worker =
            EchoWorker::connect(SocketKind::Dealer, &server.connect_endpoint().unwrap()).unwrap();
        server.recv().unwrap();

        drop(server);
        assert!(worker.run().is_ok());
    }

    #[test]
    fn test_run_reports_protocol_drop() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("tcp://{}", listener.local_addr().unwrap());
        let mut worker = EchoWorker::connect(SocketKind::Dealer, &endpoint).unwrap();

        let (mut stream, _) = listener.accept().unwrap();
        stream
            .write_all(&encode_greeting(SocketKind::Router as u8))
            .unwrap();
        // Frame header announcing 4GB - 1 bytes
        stream.write_all(&[0, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();

        assert!(matches!(
            worker.run(),
            Err(DomoError::ProtocolViolation(_))
        ));
        assert_eq!(worker.served(), 0);
    }
}
