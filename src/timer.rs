//! Monotonic deadline tracker. Grounded on the teacher's own use of
//! `std::time::Instant`/`Duration` arithmetic for timeouts in
//! `consensus.rs` (`ELECTION_TIMEOUT`, `HEARTBEAT_TIMEOUT`, `new_election_timeout`),
//! factored out into its own leaf component per the spec's component breakdown.

use rand::Rng;
use std::time::{Duration, Instant};

/// Lower/upper bounds (half-open) for a randomized election timeout.
pub const ELECTION_TIMEOUT_MIN_MS: u64 = 200;
pub const ELECTION_TIMEOUT_MAX_MS: u64 = 300;

/// Fixed leader heartbeat interval. Strictly below the election lower bound so a
/// healthy leader always refreshes followers before any of them time out.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(170);

/// A single advisory deadline. `expired()` is only ever checked by the event
/// loop at the top of an iteration -- there is no background wakeup.
#[derive(Debug, Clone)]
pub struct Timer {
    deadline: Instant,
}

impl Timer {
    /// Starts already expired, so the very first event-loop iteration fires
    /// an election timeout immediately unless something resets it sooner.
    pub fn new() -> Self {
        Timer { deadline: Instant::now() }
    }

    pub fn reset(&mut self, duration: Duration) {
        self.deadline = Instant::now() + duration;
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time remaining until the deadline, or `Duration::ZERO` if already past.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Draws a fresh election timeout uniformly from `[200ms, 300ms)`.
///
/// Randomness here is mandatory, not cosmetic: it is what breaks symmetric
/// candidacies between followers that time out at the same moment.
pub fn random_election_timeout() -> Duration {
    let millis = rand::thread_rng().gen_range(ELECTION_TIMEOUT_MIN_MS..ELECTION_TIMEOUT_MAX_MS);
    Duration::from_millis(millis)
}
