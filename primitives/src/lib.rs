//! Byte-oriented primitives shared by every tile: pubkeys, hashes,
//! signatures, and the slot/epoch identifiers that thread through the
//! replay-and-consensus core.

mod hash;
mod keypair;
mod pubkey;
mod signature;

pub use {hash::Hash, keypair::Keypair, pubkey::Pubkey, signature::Signature};

/// Monotonic slot identifier. Not necessarily contiguous: leaders may skip.
pub type Slot = u64;

/// Epoch identifier, derived deterministically from a slot by the bank's
/// epoch schedule.
pub type Epoch = u64;

/// Lamports: the base unit of account balances.
pub type Lamports = u64;
