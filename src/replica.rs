//! The event loop driver: owns the one inbound queue, the one timer and the
//! one outbound channel described by the spec's overview, and wires them to
//! the pure `ConsensusModule` state machine. Grounded on the teacher's
//! `Server::run` loop in `rpc.rs` / `main.rs` (poll-with-timeout, dispatch,
//! repeat), collapsed from the teacher's async/tokio reactor down to a
//! single blocking `recv_timeout` per the spec's single-threaded,
//! non-async execution model (§1, §5).

use crate::consensus::{ConsensusModule, EventOutcome, Tick};
use crate::message::Envelope;
use crate::timer::Timer;
use crate::transport::Transport;
use std::collections::VecDeque;
use std::time::Duration;

pub struct Replica<T: Transport> {
    consensus: ConsensusModule,
    timer: Timer,
    transport: T,
    /// Client `put`/`get` envelopes received while CANDIDATE. Owned here,
    /// not inside `ConsensusModule`, so the consensus engine stays a pure
    /// state machine with no I/O-adjacent queues of its own.
    deferred: VecDeque<Envelope>,
}

impl<T: Transport> Replica<T> {
    pub fn new(id: String, others: Vec<String>, transport: T) -> crate::errors::Result<Self> {
        let (consensus, tick) = ConsensusModule::new(id, others);
        let mut replica = Replica { consensus, timer: Timer::new(), transport, deferred: VecDeque::new() };
        replica.apply(tick)?;
        Ok(replica)
    }

    /// Runs forever. Each iteration: if the timer has expired, fire it;
    /// otherwise drain one deferred request if any are queued; otherwise
    /// block on the transport for up to the remaining time until the
    /// deadline.
    pub fn run(&mut self) -> crate::errors::Result<()> {
        loop {
            self.step()?;
        }
    }

    /// Runs a single iteration of the loop. Exposed separately from `run`
    /// so tests can drive the loop deterministically one step at a time.
    pub fn step(&mut self) -> crate::errors::Result<()> {
        if self.timer.expired() {
            let mut tick = Tick::empty();
            self.consensus.on_timer_expired(&mut tick);
            self.apply(tick)?;
            return Ok(());
        }

        if let Some(env) = self.deferred.pop_front() {
            self.dispatch(env)?;
            return Ok(());
        }

        if let Some(env) = self.transport.recv_timeout(self.timer.remaining())? {
            self.dispatch(env)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, env: Envelope) -> crate::errors::Result<()> {
        let mut tick = Tick::empty();
        let outcome = self.consensus.handle_envelope(env, &mut tick);
        self.apply(tick)?;
        if let EventOutcome::Deferred(env) = outcome {
            self.deferred.push_back(env);
        }
        Ok(())
    }

    /// Sends every message in the tick's outbox, resets the timer if asked,
    /// and -- if a role transition just left CANDIDATE -- re-feeds every
    /// previously deferred request back through the consensus engine now
    /// that it can answer them.
    fn apply(&mut self, tick: Tick) -> crate::errors::Result<()> {
        for env in &tick.outbox {
            self.transport.send(env)?;
        }
        if let Some(duration) = tick.reset_timer {
            self.timer.reset(duration);
        }
        if tick.drain_deferred {
            self.drain_deferred_queue()?;
        }
        Ok(())
    }

    /// Re-dispatches every deferred request in receipt order. If the role
    /// somehow flips back to CANDIDATE partway through (only possible if a
    /// higher-term message arrives mid-drain), the remaining requests are
    /// simply deferred again and wait for the next drain.
    fn drain_deferred_queue(&mut self) -> crate::errors::Result<()> {
        let pending: Vec<Envelope> = self.deferred.drain(..).collect();
        for env in pending {
            self.dispatch(env)?;
        }
        Ok(())
    }
}
