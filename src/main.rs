//! CLI bootstrap: `replica <port> <id> <other-id>...`. Binds an ephemeral
//! UDP socket, sends datagrams to the shared simulator port given on the
//! command line (§6), and runs the replica forever. Deliberately not
//! clap-based -- argument parsing beyond "three or more positional
//! strings" is out of scope for this binary.

extern crate replica;

use replica::errors::{Result, ResultExt};
use replica::{Replica, UdpTransport};
use std::env;
use std::process;

/// Positional config assembled once at startup and never mutated afterward --
/// there are no flags, no environment variables and no config file to reload.
struct ReplicaConfig {
    port: u16,
    id: String,
    others: Vec<String>,
}

fn parse_args() -> Result<ReplicaConfig> {
    let mut args = env::args().skip(1);

    let port_arg = args.next().ok_or("usage: replica <port> <id> <other-id>...")?;
    let port: u16 = port_arg.parse().chain_err(|| format!("invalid port: {}", port_arg))?;

    let id = args.next().ok_or("usage: replica <port> <id> <other-id>...")?;
    let others: Vec<String> = args.collect();

    Ok(ReplicaConfig { port, id, others })
}

fn run() -> Result<()> {
    let config = parse_args()?;
    println!(
        "replica {}: listening for the simulator on port {}, peers = {:?}",
        config.id, config.port, config.others
    );

    let transport = UdpTransport::bind(config.port)?;
    let mut replica = Replica::new(config.id, config.others, transport)?;
    replica.run()
}

fn main() {
    if let Err(e) = run() {
        eprintln!("replica: fatal error: {}", e);
        for cause in e.iter().skip(1) {
            eprintln!("caused by: {}", cause);
        }
        process::exit(1);
    }
}
