//! Datagram transport. Grounded on the teacher's `NetworkServer`/RPC-client
//! split in `rpc.rs` (a thin trait boundary around the actual socket so
//! `ConsensusModule` never touches `std::net` directly), narrowed to the one
//! operation this protocol's wire model (§6) actually needs: send one JSON
//! datagram, receive one JSON datagram.

use crate::errors::{Result, ResultExt};
use crate::message::Envelope;
use std::net::UdpSocket;
use std::time::Duration;

/// The boundary between the consensus engine's event loop and the outside
/// world. A real binary implements this with `UdpTransport`; tests implement
/// it with an in-memory fake so the election/replication logic can run
/// without a socket.
pub trait Transport {
    fn send(&self, env: &Envelope) -> Result<()>;

    /// Blocks for up to `timeout` waiting for the next inbound datagram.
    /// Returns `Ok(None)` on timeout, never on a malformed datagram -- those
    /// are logged and skipped internally so one corrupt packet can't wedge
    /// the event loop.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Envelope>>;
}

/// Every outbound message -- whether unicast or `BROADCAST` -- is a single
/// `sendto` of one JSON datagram to the one shared simulator port passed on
/// the command line. This socket never resolves `dst` to a peer address and
/// never loops over a peer list: routing a datagram to the right replica(s)
/// is the job of the external simulator process on the other end of that
/// shared port, which is out of scope here.
pub struct UdpTransport {
    socket: UdpSocket,
    simulator_addr: String,
}

impl UdpTransport {
    /// Binds an ephemeral local endpoint for receiving and remembers the
    /// shared simulator port all sends go to.
    pub fn bind(simulator_port: u16) -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").chain_err(|| "failed to bind replica socket")?;
        Ok(UdpTransport { socket, simulator_addr: format!("127.0.0.1:{}", simulator_port) })
    }
}

impl Transport for UdpTransport {
    fn send(&self, env: &Envelope) -> Result<()> {
        let payload = serde_json::to_vec(env)?;
        self.socket.send_to(&payload, &self.simulator_addr).chain_err(|| "failed to send datagram")?;
        Ok(())
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Envelope>> {
        self.socket.set_read_timeout(Some(timeout)).chain_err(|| "failed to set read timeout")?;

        // 65535 bytes: the largest possible UDP payload, reused across calls
        // rather than allocated per-datagram.
        let mut buf = [0u8; 65535];
        match self.socket.recv(&mut buf) {
            Ok(n) => match serde_json::from_slice::<Envelope>(&buf[..n]) {
                Ok(env) => Ok(Some(env)),
                Err(e) => {
                    eprintln!("dropping malformed datagram: {}", e);
                    Ok(None)
                }
            },
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e).chain_err(|| "failed to receive datagram"),
        }
    }
}
