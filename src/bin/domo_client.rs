//! Domo Client
//!
//! Sends a service request through the broker `n` times and collects the
//! replies.
//!
//! Usage:
//!   cargo run --release --bin domo_client -- -n 3 echo hello world

use clap::Parser;

use domo::config::DEFAULT_FRONT_CONNECT;
use domo::driver::Client;
use domo::{logging, SocketKind};

#[derive(Parser, Debug)]
#[command(name = "domo_client", version, about = "Send requests through the domo broker")]
struct Args {
    /// Socket type (dealer or client)
    #[arg(short, long, default_value = "dealer")]
    socket: SocketKind,

    /// Number of requests
    #[arg(short = 'n', long, default_value_t = 1)]
    number: usize,

    /// Broker front-end address
    #[arg(short, long, default_value = DEFAULT_FRONT_CONNECT)]
    address: String,

    #[arg(short, long)]
    verbose: bool,

    /// Service name, sent as the first part
    service: String,

    /// Remaining parts
    args: Vec<String>,
}

fn run_client(args: &Args) -> domo::Result<()> {
    let client = Client::connect(args.socket, &args.address)?;

    let mut sent = 0;
    for _ in 0..args.number {
        client.request(&args.service, &args.args)?;
        sent += 1;
    }

    let mut received = 0;
    for _ in 0..args.number {
        let reply = client.recv()?;
        if args.verbose {
            let parts: Vec<String> = reply
                .iter()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .collect();
            println!("📨 {:?}", parts);
        }
        received += 1;
    }

    println!("{} sent, {} recv", sent, received);
    Ok(())
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(e) = run_client(&args) {
        eprintln!("❌ Client error: {}", e);
        std::process::exit(1);
    }
}
