//! Domo round-trip benchmark
//!
//! Runs broker, echo worker and client on their own threads, then reports
//! synchronous and asynchronous round-trip rates.
//!
//! Usage:
//!   cargo run --release -- -n 10000 -f router -b server

use clap::Parser;

use domo::config::{DEFAULT_BACK_BIND, DEFAULT_FRONT_BIND, DEFAULT_ROUND_TRIPS};
use domo::{logging, tripping, BrokerConfig, SocketKind, TrippingConfig};

#[derive(Parser, Debug)]
#[command(name = "domo", version, about = "Round-trip benchmark through the domo broker")]
struct Args {
    /// Round trips per client mode
    #[arg(short = 'n', long, default_value_t = DEFAULT_ROUND_TRIPS)]
    number: usize,

    /// Front-end socket type (router or server)
    #[arg(short, long, default_value = "router")]
    frontend: SocketKind,

    /// Back-end socket type (router or server)
    #[arg(short, long, default_value = "router")]
    backend: SocketKind,

    #[arg(long, default_value = DEFAULT_FRONT_BIND)]
    front_address: String,

    #[arg(long, default_value = DEFAULT_BACK_BIND)]
    back_address: String,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: Args) -> domo::Result<()> {
    println!("🚀 Domo Tripping");
    println!("================\n");
    println!(
        "🔌 Broker: {} @ {} <--> {} @ {}",
        args.frontend, args.front_address, args.backend, args.back_address
    );

    let config = TrippingConfig {
        broker: BrokerConfig {
            front_kind: args.frontend,
            back_kind: args.backend,
            front_address: args.front_address,
            back_address: args.back_address,
        },
        requests: args.number,
        ..TrippingConfig::default()
    };

    let report = tripping::run(&config)?;

    println!("\n📊 Round trips ({} each)", config.requests);
    println!("-----------------------");
    for trip in [report.sync_report, report.async_report] {
        println!(
            "  {:<13} {:>10.0} calls/second ({:.3} s)",
            trip.mode,
            trip.calls_per_second(),
            trip.elapsed.as_secs_f64()
        );
    }
    println!(
        "  Broker: {} in / {} out front, {} in / {} out back",
        report.broker.front_received,
        report.broker.forwarded_to_front,
        report.broker.back_received,
        report.broker.forwarded_to_back
    );

    println!("\n✅ Tripping complete!");
    Ok(())
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("❌ Tripping error: {}", e);
        std::process::exit(1);
    }
}
