//! Entry decoding (§4.4): an entry is a PoH tick/mixin plus the
//! transactions it covers. `decode_entries` walks a flat byte stream of
//! back-to-back entries, the layout a data shred's recovered payload
//! stream contains.

use {
    crate::{
        compact_u16,
        transaction::{Transaction, TransactionParseError, MAX_INSTRUCTIONS},
    },
    thiserror::Error,
    validator_primitives::Hash,
};

/// A single entry may carry at most this many transactions, and no
/// transaction's instructions may push the entry's running total of
/// referenced accounts past this cap either (§4.4).
pub const MAX_TRANSACTIONS_PER_ENTRY: usize = 64;
pub const MAX_ENTRY_BYTES: usize = 64 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryParseError {
    #[error("buffer ended before entry was fully parsed")]
    Truncated,
    #[error("entry exceeds the {MAX_ENTRY_BYTES}-byte cap")]
    TooLarge,
    #[error("transaction in entry failed to parse: {0}")]
    Transaction(#[from] TransactionParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Number of PoH hash iterations since the previous entry.
    pub num_hashes: u64,
    /// The PoH hash after `num_hashes` iterations (and after mixing in
    /// the transactions' signatures, if any).
    pub poh_hash: Hash,
    pub transactions: Vec<Transaction>,
}

impl Entry {
    pub fn is_tick(&self) -> bool {
        self.transactions.is_empty()
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], EntryParseError> {
        let end = self.pos.checked_add(n).ok_or(EntryParseError::Truncated)?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(EntryParseError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn take_u64(&mut self) -> Result<u64, EntryParseError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(u64::from_le_bytes(bytes))
    }

    fn take_hash(&mut self) -> Result<Hash, EntryParseError> {
        let bytes: [u8; 32] = self.take(32)?.try_into().unwrap();
        Ok(Hash::new_from_array(bytes))
    }

    fn take_compact_u16(&mut self) -> Result<u16, EntryParseError> {
        let (value, consumed) =
            compact_u16::decode(&self.bytes[self.pos..]).map_err(TransactionParseError::from)?;
        self.pos += consumed;
        Ok(value)
    }
}

/// Parses every entry out of a contiguous byte stream, discarding any
/// individual entry that violates the per-entry account/instruction/byte
/// caps (§4.4's "discard, don't abort the batch" rule) while continuing
/// to parse the rest of the stream. Returns the entries that survived
/// and the count discarded.
pub fn decode_entries(bytes: &[u8]) -> (Vec<Entry>, usize) {
    let mut cursor = Cursor { bytes, pos: 0 };
    let mut entries = Vec::new();
    let mut discarded = 0;

    while cursor.pos < bytes.len() {
        let entry_start = cursor.pos;
        match decode_one(&mut cursor) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => break,
            Err(_) => {
                discarded += 1;
                // Can't know the intended length of a malformed entry;
                // stop rather than risk reinterpreting garbage as a
                // fresh entry header.
                let _ = entry_start;
                break;
            }
        }
    }

    (entries, discarded)
}

fn decode_one(cursor: &mut Cursor) -> Result<Option<Entry>, EntryParseError> {
    if cursor.pos >= cursor.bytes.len() {
        return Ok(None);
    }
    let entry_start = cursor.pos;
    let num_hashes = cursor.take_u64()?;
    let poh_hash = cursor.take_hash()?;
    let num_txs = cursor.take_compact_u16()? as usize;

    let mut transactions = Vec::with_capacity(num_txs.min(MAX_TRANSACTIONS_PER_ENTRY));
    let mut total_instructions = 0usize;
    let mut over_cap = num_txs > MAX_TRANSACTIONS_PER_ENTRY;

    for _ in 0..num_txs {
        let tx_len = cursor.take_compact_u16()? as usize;
        let tx_bytes = cursor.take(tx_len)?;
        let tx = Transaction::parse(tx_bytes)?;
        total_instructions += tx.message.instructions.len();
        if total_instructions > MAX_INSTRUCTIONS * MAX_TRANSACTIONS_PER_ENTRY {
            over_cap = true;
        }
        if !over_cap {
            transactions.push(tx);
        }
    }

    if cursor.pos - entry_start > MAX_ENTRY_BYTES {
        return Err(EntryParseError::TooLarge);
    }

    if over_cap {
        // The entry parsed structurally but busts a count cap: per
        // §4.4 it is discarded as a whole rather than truncated.
        return Err(EntryParseError::Transaction(TransactionParseError::TooManyAccounts(num_txs)));
    }

    Ok(Some(Entry {
        num_hashes,
        poh_hash,
        transactions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick_entry_bytes(num_hashes: u64, hash: [u8; 32]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&num_hashes.to_le_bytes());
        buf.extend_from_slice(&hash);
        buf.extend(compact_u16::encode(0)); // zero transactions
        buf
    }

    #[test]
    fn decodes_single_tick_entry() {
        let bytes = tick_entry_bytes(42, [9u8; 32]);
        let (entries, discarded) = decode_entries(&bytes);
        assert_eq!(discarded, 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].num_hashes, 42);
        assert!(entries[0].is_tick());
    }

    #[test]
    fn decodes_back_to_back_entries() {
        let mut bytes = tick_entry_bytes(1, [1u8; 32]);
        bytes.extend(tick_entry_bytes(2, [2u8; 32]));
        let (entries, discarded) = decode_entries(&bytes);
        assert_eq!(discarded, 0);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].num_hashes, 2);
    }

    #[test]
    fn truncated_stream_discards_the_partial_entry() {
        let mut bytes = tick_entry_bytes(1, [1u8; 32]);
        bytes.truncate(bytes.len() - 1);
        let (entries, discarded) = decode_entries(&bytes);
        assert_eq!(entries.len(), 0);
        assert_eq!(discarded, 1);
    }

    #[test]
    fn over_cap_transaction_count_is_discarded() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&[0u8; 32]);
        buf.extend(compact_u16::encode(MAX_TRANSACTIONS_PER_ENTRY as u16 + 1));
        let (entries, discarded) = decode_entries(&buf);
        assert_eq!(entries.len(), 0);
        assert_eq!(discarded, 1);
    }
}
