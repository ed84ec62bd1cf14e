//! TowerSync / compact-update-vote-state instruction builder (§6.4).

use {
    crate::compact_u64,
    validator_consensus::Tower,
    validator_entry::{
        compact_u16, Instruction, Message, MessageHeader, Transaction,
    },
    validator_primitives::{Hash, Keypair, Pubkey},
};

pub const COMPACT_UPDATE_VOTE_STATE_DISCRIMINANT: u32 = 12;

/// Three accounts in a fixed order (§6.4): identity (signer, writable),
/// vote account (writable), vote program id (readonly).
pub fn build_vote_transaction(
    identity: &Keypair,
    vote_account: Pubkey,
    vote_program_id: Pubkey,
    tower: &Tower,
    candidate_bank_hash: Hash,
    recent_blockhash: Hash,
    timestamp_seconds: i64,
) -> Transaction {
    let instruction_data = build_instruction_data(tower, candidate_bank_hash, timestamp_seconds);

    let message = Message {
        header: MessageHeader {
            num_required_signatures: 1,
            num_readonly_signed: 0,
            num_readonly_unsigned: 1,
        },
        account_keys: vec![identity.pubkey(), vote_account, vote_program_id],
        recent_blockhash,
        instructions: vec![Instruction {
            program_id_index: 2,
            account_indexes: vec![1, 0],
            data: instruction_data,
        }],
    };

    let signature = identity.sign(&message.serialize());
    Transaction::from_parts(vec![signature], message)
}

/// Instruction data per §6.4: `u32 discriminant=12`, `u64 root`,
/// `compact-u16 lockout_count`, per-lockout `{compact-u64
/// offset_from_root, u8 confirmation_count}`, `[u8;32] bank_hash`, `u8
/// has_timestamp=1`, `i64 timestamp`. The minimal form carries exactly
/// the latest lockout (`lockout_count = 1`).
fn build_instruction_data(tower: &Tower, bank_hash: Hash, timestamp_seconds: i64) -> Vec<u8> {
    let root = tower.root_slot.unwrap_or(0);
    let latest = tower.votes.last();

    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&COMPACT_UPDATE_VOTE_STATE_DISCRIMINANT.to_le_bytes());
    data.extend_from_slice(&root.to_le_bytes());
    data.extend(compact_u16::encode(1));

    let offset_from_root = latest.map(|l| l.slot.saturating_sub(root)).unwrap_or(0);
    let confirmation_count = latest.map(|l| l.confirmation_count as u8).unwrap_or(1);
    data.extend(compact_u64::encode(offset_from_root));
    data.push(confirmation_count);

    data.extend_from_slice(bank_hash.as_bytes());
    data.push(1); // has_timestamp
    data.extend_from_slice(&timestamp_seconds.to_le_bytes());
    data
}
