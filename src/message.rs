//! Wire schema: a tagged envelope shared by every message type, per the message
//! codec component. Grounded on the shape of `raft::protos` in the teacher
//! codebase (plain serde structs/enums, `ServerId`/`Term`/`LogIndex` type aliases),
//! adapted from the teacher's `rmp_serde` RPC framing to a flat JSON object per
//! datagram, which is what this protocol's transport (§6 of the spec) requires.

use crate::log::LogEntry;

/// Reserved id meaning "no specific destination" or "no known leader".
pub const BROADCAST: &str = "FFFF";

pub type ReplicaId = String;
pub type Term = u64;
pub type LogIndex = u64;
pub type Mid = String;

/// Every message on the wire: common routing fields plus a tagged payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub src: ReplicaId,
    pub dst: ReplicaId,
    /// Sender's currently believed leader (or `BROADCAST` if unknown).
    pub leader: ReplicaId,
    #[serde(flatten)]
    pub body: Body,
}

/// Per-type payload. `type` is the serde tag and must serialize to exactly the
/// literal strings in the wire contract -- these are part of the contract
/// every replica in a cluster must agree on, not an implementation detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Body {
    #[serde(rename = "hello")]
    Hello,

    #[serde(rename = "put")]
    Put {
        #[serde(rename = "MID")]
        mid: Mid,
        key: String,
        value: String,
    },

    #[serde(rename = "get")]
    Get {
        #[serde(rename = "MID")]
        mid: Mid,
        key: String,
    },

    #[serde(rename = "ok")]
    Ok {
        #[serde(rename = "MID")]
        mid: Mid,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        value: Option<String>,
    },

    #[serde(rename = "redirect")]
    Redirect {
        #[serde(rename = "MID")]
        mid: Mid,
    },

    #[serde(rename = "ReqVote")]
    ReqVote {
        term: Term,
        /// `[log_length, last_log_term]`.
        entry: (LogIndex, Term),
    },

    #[serde(rename = "AckVote")]
    AckVote,

    #[serde(rename = "AppendRPC")]
    AppendRPC {
        term: Term,
        /// `(prev_index, prev_term)`, or absent for a bare heartbeat.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        entry: Option<(LogIndex, Term)>,
        logs: Vec<LogEntry>,
    },

    #[serde(rename = "success")]
    Success { next_idx: LogIndex },

    #[serde(rename = "blunder")]
    Blunder,
}

impl Body {
    /// A short discriminator, mainly useful for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Hello => "hello",
            Body::Put { .. } => "put",
            Body::Get { .. } => "get",
            Body::Ok { .. } => "ok",
            Body::Redirect { .. } => "redirect",
            Body::ReqVote { .. } => "ReqVote",
            Body::AckVote => "AckVote",
            Body::AppendRPC { .. } => "AppendRPC",
            Body::Success { .. } => "success",
            Body::Blunder => "blunder",
        }
    }
}
