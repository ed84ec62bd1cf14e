//! Vote transaction construction and dispatch (C9).

mod compact_u64;
pub mod submitter;
pub mod vote_transaction;

pub use submitter::{
    resolve_blockhash, synthesize_fallback_blockhash, BlockhashSource, SubmitterHandles,
    TickOutcome, VoteSubmitter, DEFAULT_REDUNDANT_LEADERS, DEFAULT_TICK_INTERVAL,
};
pub use vote_transaction::{build_vote_transaction, COMPACT_UPDATE_VOTE_STATE_DISCRIMINANT};
