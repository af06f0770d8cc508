//! Drivers - the client and the echo worker that sit at either end of the broker

mod client;
mod worker;

pub use client::{Client, RoundTripMode, RoundTripReport};
pub use worker::EchoWorker;
