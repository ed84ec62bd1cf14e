//! Transaction wire layout (§6.3) and the writable/readonly determination
//! convention used by the bank's account loader.

use {
    crate::compact_u16,
    thiserror::Error,
    validator_primitives::{Hash, Pubkey, Signature},
};

pub const MAX_ACCOUNTS: usize = 64;
pub const MAX_INSTRUCTIONS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionParseError {
    #[error("buffer ended before transaction was fully parsed")]
    Truncated,
    #[error("transaction declares {0} accounts, over the {MAX_ACCOUNTS} cap")]
    TooManyAccounts(usize),
    #[error("transaction declares {0} instructions, over the {MAX_INSTRUCTIONS} cap")]
    TooManyInstructions(usize),
    #[error("compact-u16 field was malformed: {0}")]
    CompactU16(#[from] compact_u16::CompactU16Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
}

impl MessageHeader {
    /// Writable determination (§6.3): among the first `required_sigs`
    /// keys, the first `required_sigs - readonly_signed` are writable;
    /// among the unsigned remainder, the first
    /// `total - required_sigs - readonly_unsigned` are writable.
    pub fn is_writable(&self, index: usize, num_account_keys: usize) -> bool {
        let required = self.num_required_signatures as usize;
        if index < required {
            index < required.saturating_sub(self.num_readonly_signed as usize)
        } else {
            let unsigned_writable =
                num_account_keys.saturating_sub(required + self.num_readonly_unsigned as usize);
            index < required + unsigned_writable
        }
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < self.num_required_signatures as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id_index: u8,
    pub account_indexes: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<Instruction>,
}

impl Message {
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    /// Serializes the message per §6.3, the inverse of the parser below.
    /// Used both by tests and by collaborators (the vote submitter) that
    /// build transactions rather than decode them.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed);
        out.push(self.header.num_readonly_unsigned);

        out.extend(compact_u16::encode(self.account_keys.len() as u16));
        for key in &self.account_keys {
            out.extend_from_slice(key.as_ref());
        }

        out.extend_from_slice(self.recent_blockhash.as_bytes());

        out.extend(compact_u16::encode(self.instructions.len() as u16));
        for instruction in &self.instructions {
            out.push(instruction.program_id_index);
            out.extend(compact_u16::encode(instruction.account_indexes.len() as u16));
            out.extend_from_slice(&instruction.account_indexes);
            out.extend(compact_u16::encode(instruction.data.len() as u16));
            out.extend_from_slice(&instruction.data);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
    pub message_bytes: Vec<u8>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TransactionParseError> {
        let end = self.pos.checked_add(n).ok_or(TransactionParseError::Truncated)?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(TransactionParseError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, TransactionParseError> {
        Ok(self.take(1)?[0])
    }

    fn take_compact_u16(&mut self) -> Result<u16, TransactionParseError> {
        let (value, consumed) = compact_u16::decode(&self.bytes[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }
}

impl Transaction {
    pub fn parse(bytes: &[u8]) -> Result<Self, TransactionParseError> {
        let mut cursor = Cursor::new(bytes);
        let sig_count = cursor.take_u8()? as usize;
        let mut signatures = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            let sig_bytes: [u8; 64] = cursor.take(64)?.try_into().unwrap();
            signatures.push(Signature::new_from_array(sig_bytes));
        }

        let message_start = cursor.pos;
        let header = MessageHeader {
            num_required_signatures: cursor.take_u8()?,
            num_readonly_signed: cursor.take_u8()?,
            num_readonly_unsigned: cursor.take_u8()?,
        };

        let num_keys = cursor.take_compact_u16()? as usize;
        if num_keys > MAX_ACCOUNTS {
            return Err(TransactionParseError::TooManyAccounts(num_keys));
        }
        let mut account_keys = Vec::with_capacity(num_keys);
        for _ in 0..num_keys {
            let key_bytes: [u8; 32] = cursor.take(32)?.try_into().unwrap();
            account_keys.push(Pubkey::new_from_array(key_bytes));
        }

        let blockhash_bytes: [u8; 32] = cursor.take(32)?.try_into().unwrap();
        let recent_blockhash = Hash::new_from_array(blockhash_bytes);

        let num_instructions = cursor.take_compact_u16()? as usize;
        if num_instructions > MAX_INSTRUCTIONS {
            return Err(TransactionParseError::TooManyInstructions(num_instructions));
        }
        let mut instructions = Vec::with_capacity(num_instructions);
        for _ in 0..num_instructions {
            let program_id_index = cursor.take_u8()?;
            let num_account_indexes = cursor.take_compact_u16()? as usize;
            let account_indexes = cursor.take(num_account_indexes)?.to_vec();
            let data_len = cursor.take_compact_u16()? as usize;
            let data = cursor.take(data_len)?.to_vec();
            instructions.push(Instruction {
                program_id_index,
                account_indexes,
                data,
            });
        }
        let message_bytes = bytes[message_start..cursor.pos].to_vec();

        Ok(Self {
            signatures,
            message: Message {
                header,
                account_keys,
                recent_blockhash,
                instructions,
            },
            message_bytes,
        })
    }

    /// Builds a transaction from a message and its signatures, the
    /// inverse of `parse`.
    pub fn from_parts(signatures: Vec<Signature>, message: Message) -> Self {
        let message_bytes = message.serialize();
        Self {
            signatures,
            message,
            message_bytes,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.signatures.len() * 64 + self.message_bytes.len());
        out.push(self.signatures.len() as u8);
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_bytes());
        }
        out.extend_from_slice(&self.message_bytes);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_instruction_transaction() -> Vec<u8> {
        let mut buf = vec![1u8]; // sig count
        buf.extend_from_slice(&[7u8; 64]); // one signature
        buf.push(1); // required sigs
        buf.push(0); // readonly signed
        buf.push(1); // readonly unsigned
        buf.push(2); // 2 account keys
        buf.extend_from_slice(&[1u8; 32]);
        buf.extend_from_slice(&[2u8; 32]);
        buf.extend_from_slice(&[3u8; 32]); // blockhash
        buf.push(0); // 0 instructions
        buf
    }

    #[test]
    fn parses_minimal_transaction() {
        let bytes = empty_instruction_transaction();
        let tx = Transaction::parse(&bytes).unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(tx.message.account_keys.len(), 2);
        assert_eq!(tx.message.instructions.len(), 0);
    }

    #[test]
    fn writable_determination_matches_header_convention() {
        let header = MessageHeader {
            num_required_signatures: 2,
            num_readonly_signed: 1,
            num_readonly_unsigned: 1,
        };
        // 4 keys total: [signer-writable, signer-readonly, unsigned-writable, unsigned-readonly]
        assert!(header.is_writable(0, 4));
        assert!(!header.is_writable(1, 4));
        assert!(header.is_writable(2, 4));
        assert!(!header.is_writable(3, 4));
    }

    #[test]
    fn too_many_accounts_is_rejected() {
        let mut buf = vec![0u8]; // no signatures
        buf.push(0);
        buf.push(0);
        buf.push(0);
        buf.extend(compact_u16::encode(65));
        let err = Transaction::parse(&buf).unwrap_err();
        assert_eq!(err, TransactionParseError::TooManyAccounts(65));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let err = Transaction::parse(&[1]).unwrap_err();
        assert_eq!(err, TransactionParseError::Truncated);
    }

    #[test]
    fn serialize_then_parse_round_trips() {
        let message = Message {
            header: MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed: 0,
                num_readonly_unsigned: 1,
            },
            account_keys: vec![
                Pubkey::new_from_array([1; 32]),
                Pubkey::new_from_array([2; 32]),
            ],
            recent_blockhash: Hash::new_from_array([3; 32]),
            instructions: vec![Instruction {
                program_id_index: 1,
                account_indexes: vec![0],
                data: vec![9, 9, 9],
            }],
        };
        let tx = Transaction::from_parts(vec![Signature::new_from_array([7; 64])], message.clone());
        let bytes = tx.serialize();
        let parsed = Transaction::parse(&bytes).unwrap();
        assert_eq!(parsed.message, message);
        assert_eq!(parsed.signatures, tx.signatures);
    }
}
