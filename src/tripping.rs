//! Round-trip benchmark: broker, echo worker and client in one process
//!
//! Each role runs on its own thread and talks to the others only through
//! sockets. The controller binds the broker endpoints itself, waits for the
//! client's `done` over a PAIR socket, then interrupts the broker and joins
//! every role.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam::channel;
use tracing::info;

use crate::broker::{Broker, BrokerStats};
use crate::config::TrippingConfig;
use crate::driver::{Client, EchoWorker, RoundTripReport};
use crate::endpoint::ServerEndpoint;
use crate::error::{DomoError, Result};
use crate::transport::{RawMessage, Socket, SocketKind};

/// Signal the client sends once both timing modes are through
pub const DONE: &[u8] = b"done";

const SIGNAL_ADDRESS: &str = "tcp://127.0.0.1:0";

#[derive(Debug, Clone, Copy)]
pub struct TrippingReport {
    pub sync_report: RoundTripReport,
    pub async_report: RoundTripReport,
    pub broker: BrokerStats,
}

pub fn run(config: &TrippingConfig) -> Result<TrippingReport> {
    let client_kind = config.broker.front_kind.counterpart()?;
    let worker_kind = config.broker.back_kind.counterpart()?;

    let (interrupt_tx, interrupt_rx) = channel::bounded(1);
    let broker = Broker::bind(&config.broker)?.with_interrupt(interrupt_rx);
    let front = connect_address(broker.front())?;
    let back = connect_address(broker.back())?;

    let signal = Socket::bind(SocketKind::Pair, SIGNAL_ADDRESS)?;
    let signal_address = signal.connect_endpoint().ok_or_else(|| {
        DomoError::InvalidEndpoint("signal socket has no local address".to_string())
    })?;

    info!(
        front = %config.broker.front_kind,
        back = %config.broker.back_kind,
        requests = config.requests,
        "tripping started"
    );

    let broker_thread = spawn_role("broker", move || {
        let mut broker = broker;
        broker.mediate()?;
        Ok(broker.stats())
    })?;

    let worker_thread = spawn_role("worker", move || {
        EchoWorker::connect(worker_kind, &back)?.run()
    })?;

    let requests = config.requests;
    let payload = config.payload.clone();
    let client_thread = spawn_role("client", move || {
        let result = client_task(client_kind, &front, requests, &payload);
        // Signal even on failure so the controller never waits forever
        let done = Socket::connect(SocketKind::Pair, &signal_address)?;
        done.send(RawMessage::Multipart(vec![DONE.to_vec()]))?;
        result
    })?;

    let signalled = signal.recv();

    // A closed channel stops the broker just as well as a message
    let _ = interrupt_tx.send(());
    drop(interrupt_tx);

    let client_result = join_role("client", client_thread);
    let broker_result = join_role("broker", broker_thread);
    let worker_result = join_role("worker", worker_thread);

    let (sync_report, async_report) = client_result?;
    let broker = broker_result?;
    worker_result?;
    signalled?;

    info!(
        sync_rate = sync_report.calls_per_second() as u64,
        async_rate = async_report.calls_per_second() as u64,
        "tripping finished"
    );

    Ok(TrippingReport {
        sync_report,
        async_report,
        broker,
    })
}

fn client_task(
    kind: SocketKind,
    address: &str,
    requests: usize,
    payload: &[Vec<u8>],
) -> Result<(RoundTripReport, RoundTripReport)> {
    let client = Client::connect(kind, address)?;
    info!(%kind, "client running");

    let sync_report = client.sync_round_trips(requests, payload)?;
    let async_report = client.async_round_trips(requests, payload)?;
    Ok((sync_report, async_report))
}

fn connect_address(endpoint: &ServerEndpoint) -> Result<String> {
    endpoint.connect_endpoint().ok_or_else(|| {
        DomoError::InvalidEndpoint(format!("{} endpoint has no local address", endpoint.kind()))
    })
}

fn spawn_role<T, F>(name: &str, task: F) -> Result<JoinHandle<Result<T>>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    Ok(thread::Builder::new()
        .name(format!("domo-{}", name))
        .spawn(task)?)
}

fn join_role<T>(name: &str, handle: JoinHandle<Result<T>>) -> Result<T> {
    handle.join().map_err(|_| {
        DomoError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("{} thread panicked", name),
        ))
    })?
}
