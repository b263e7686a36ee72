//! The FOLLOWER / CANDIDATE / LEADER automaton. Grounded on the teacher's
//! `ServerState` enum in `consensus.rs` (`ServerState::{Follower, Candidate,
//! Leader}` each carrying their own state struct), trimmed to exactly the
//! per-role state this spec calls for: leader-only tables exist structurally
//! only inside `LeaderState`, so the type system forbids touching them from
//! any other role.

use crate::message::{LogIndex, Mid, ReplicaId};
use std::collections::{HashMap, HashSet, VecDeque};

/// A client write appended to the leader's log but not yet known-replicated
/// to a majority. Queue order matches log order.
#[derive(Debug, Clone)]
pub struct UnackedPut {
    pub log_index: LogIndex,
    pub mid: Mid,
    /// Id of the client that sent the original `put` (the envelope's `src`),
    /// so the eventual `ok`/`redirect` can be routed back to it.
    pub client: ReplicaId,
}

#[derive(Debug, Default, Clone)]
pub struct CandidateState {
    /// Ids of other replicas that have voted for us this candidacy. Our own
    /// vote is implicit and not stored here -- see `votes_received.len() + 1`.
    pub votes_received: HashSet<ReplicaId>,
}

#[derive(Debug, Clone)]
pub struct LeaderState {
    /// Next log index the leader will attempt to append on each other replica.
    /// Initialized to the leader's log length on election, floored at 1
    /// everywhere else so the decrement-on-`blunder` walk never underflows
    /// past the always-matching index-0 sentinel.
    pub next_indices: HashMap<ReplicaId, LogIndex>,
    pub unacked_puts: VecDeque<UnackedPut>,
}

impl LeaderState {
    pub fn new(others: &[ReplicaId], log_len: LogIndex) -> Self {
        let next_indices = others.iter().cloned().map(|id| (id, log_len)).collect();
        LeaderState { next_indices, unacked_puts: VecDeque::new() }
    }

    pub fn next_index_for(&self, id: &str) -> LogIndex {
        self.next_indices.get(id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub enum Role {
    Follower,
    Candidate(CandidateState),
    Leader(LeaderState),
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Follower => "follower",
            Role::Candidate(_) => "candidate",
            Role::Leader(_) => "leader",
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader(_))
    }

    pub fn is_candidate(&self) -> bool {
        matches!(self, Role::Candidate(_))
    }
}
