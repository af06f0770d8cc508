//! Domo Broker Binary
//!
//! Binds the front endpoint for clients and the back endpoint for workers,
//! then mediates until Ctrl-C.
//!
//! Usage:
//!   cargo run --release --bin domo_broker -- [OPTIONS]

use std::io;
use std::net::SocketAddr;

use clap::Parser;
use crossbeam::channel;

use domo::config::{DEFAULT_BACK_BIND, DEFAULT_FRONT_BIND};
use domo::{logging, Broker, BrokerConfig, DomoError, SocketKind};

#[derive(Parser, Debug)]
#[command(name = "domo_broker", version, about = "Run the domo broker")]
struct Args {
    /// Socket type for the front end, and the back end unless overridden (router or server)
    #[arg(short, long, default_value = "router")]
    socket: SocketKind,

    /// Socket type for the back end
    #[arg(long)]
    backend_socket: Option<SocketKind>,

    /// Front-end address clients connect to
    #[arg(short, long, default_value = DEFAULT_FRONT_BIND)]
    address: String,

    /// Back-end address workers connect to
    #[arg(long, default_value = DEFAULT_BACK_BIND)]
    backend_address: String,

    #[arg(short, long)]
    verbose: bool,
}

fn bound_addr(addr: Option<SocketAddr>, configured: &str) -> String {
    addr.map(|a| format!("tcp://{}", a))
        .unwrap_or_else(|| configured.to_string())
}

fn run_broker(config: BrokerConfig) -> domo::Result<()> {
    println!("🚀 DOMO BROKER");
    println!("==============\n");

    let (interrupt_tx, interrupt_rx) = channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .map_err(|e| DomoError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;

    let mut broker = Broker::bind(&config)?.with_interrupt(interrupt_rx);
    println!(
        "🔌 Front: {} on {}",
        config.front_kind,
        bound_addr(broker.front().local_addr(), &config.front_address)
    );
    println!(
        "🔌 Back:  {} on {}",
        config.back_kind,
        bound_addr(broker.back().local_addr(), &config.back_address)
    );
    println!("\n📡 Mediating (Ctrl-C to stop)...\n");

    broker.mediate()?;

    let stats = broker.stats();
    println!("\n📊 FINAL STATS");
    println!("  Front received:       {}", stats.front_received);
    println!("  Back received:        {}", stats.back_received);
    println!("  Greetings:            {}", stats.greetings_suppressed);
    println!("  Forwarded to workers: {}", stats.forwarded_to_back);
    println!("  Forwarded to clients: {}", stats.forwarded_to_front);
    Ok(())
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = BrokerConfig {
        front_kind: args.socket,
        back_kind: args.backend_socket.unwrap_or(args.socket),
        front_address: args.address,
        back_address: args.backend_address,
    };

    if let Err(e) = run_broker(config) {
        eprintln!("❌ Broker error: {}", e);
        std::process::exit(1);
    }
}
