//! Domo Echo Worker
//!
//! Connects to the broker's back end, greets it, and echoes every request
//! until the broker goes away.
//!
//! Usage:
//!   cargo run --release --bin domo_worker -- -s client -a tcp://127.0.0.1:5556

use clap::Parser;

use domo::config::DEFAULT_BACK_CONNECT;
use domo::driver::EchoWorker;
use domo::{logging, SocketKind};

#[derive(Parser, Debug)]
#[command(name = "domo_worker", version, about = "Run an echo worker behind the domo broker")]
struct Args {
    /// Socket type (dealer or client)
    #[arg(short, long, default_value = "dealer")]
    socket: SocketKind,

    /// Broker back-end address
    #[arg(short, long, default_value = DEFAULT_BACK_CONNECT)]
    address: String,

    #[arg(short, long)]
    verbose: bool,
}

fn run_worker(args: Args) -> domo::Result<()> {
    println!("🔧 Echo worker ({}) -> {}", args.socket, args.address);

    let mut worker = EchoWorker::connect(args.socket, &args.address)?;
    worker.run()?;

    println!("✅ Broker gone after {} requests", worker.served());
    Ok(())
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(e) = run_worker(args) {
        eprintln!("❌ Worker error: {}", e);
        std::process::exit(1);
    }
}
