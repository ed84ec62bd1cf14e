//! Entry and transaction decoding, and the compact-u16 codec they share
//! with the rest of the wire format (C4).

pub mod compact_u16;
pub mod entry;
pub mod transaction;

pub use {
    entry::{decode_entries, Entry, EntryParseError, MAX_ENTRY_BYTES, MAX_TRANSACTIONS_PER_ENTRY},
    transaction::{
        Instruction, Message, MessageHeader, Transaction, TransactionParseError, MAX_ACCOUNTS,
        MAX_INSTRUCTIONS,
    },
};
