//! A single replica's consensus engine for a replicated, in-memory key-value
//! store: leader election, log replication and client dispatch over a
//! datagram transport. No snapshots, no cluster membership changes, no
//! linearizable reads and no client-request deduplication -- see
//! `SPEC_FULL.md` for the full contract.

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate serde_derive;

pub mod consensus;
pub mod errors;
pub mod log;
pub mod message;
pub mod replica;
pub mod state;
pub mod timer;
pub mod transport;

pub use consensus::ConsensusModule;
pub use message::{Body, Envelope};
pub use replica::Replica;
pub use transport::{Transport, UdpTransport};
