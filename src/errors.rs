//! Crate-wide error type.
//!
//! Grounded on `raft::errors` in the teacher codebase (`pkg/raft/src/lib.rs`), which
//! wraps `error_chain!` around the foreign error types its I/O layer actually produces.
//! Protocol-level rejections (stale term, failed consistency check, ...) are never
//! represented here — those are ordinary `blunder`/`redirect` replies, not failures.

error_chain! {
    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
    }

    errors {
        BadAddress(what: String) {
            description("invalid replica address")
            display("invalid replica address: {}", what)
        }
    }
}
