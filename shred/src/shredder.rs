//! Shredder (C11): the leader path, inverse of the assembler/verifier.
//! Sketched per spec §4.11 — chunk entry bytes into data shreds, emit
//! parity via a data-count → parity-count table, sign the Merkle root
//! once, and stamp it into every shred in the set.

use {
    crate::{
        merkle::MerkleTree,
        wire::{
            CodeShredHeader, DataShredHeader, Shred, FLAG_LAST_IN_FEC_SET, FLAG_LAST_IN_SLOT,
        },
    },
    validator_fec::{matrix, CODE_REGION_OFFSET, DATA_REGION_OFFSET, REGION_LEN, SHRED_PAYLOAD_SIZE},
    validator_primitives::{Keypair, Slot},
};

pub const DATA_SHRED_PAYLOAD_SIZE: usize = 1051;

/// Parity shred count for a given data shred count in one FEC set, k <= 32
/// mapped to p <= 32. A conservative fixed ratio (roughly 1 parity per
/// data shred, capped at 32) — exact production tables vary by cluster
/// parameter and are out of scope here.
pub fn parity_count_for(num_data: usize) -> usize {
    num_data.clamp(1, 32)
}

pub struct ShredderOutput {
    pub data_shreds: Vec<Shred>,
    pub code_shreds: Vec<Shred>,
    pub merkle_root: validator_primitives::Hash,
}

/// Splits `entry_bytes` into one FEC set's worth of data shreds (no
/// multi-FEC-set chunking — the full multi-set leader path belongs to the
/// out-of-scope block-production pipeline per spec §1).
pub fn shred_entries(
    slot: Slot,
    shred_version: u16,
    fec_set_index: u32,
    entry_bytes: &[u8],
    keypair: &Keypair,
) -> ShredderOutput {
    let chunks: Vec<&[u8]> = entry_bytes.chunks(DATA_SHRED_PAYLOAD_SIZE).collect();
    let num_data = chunks.len().max(1);
    let num_code = parity_count_for(num_data);

    let mut data_payloads: Vec<[u8; REGION_LEN]> = Vec::with_capacity(num_data);
    let mut data_headers: Vec<([u8; SHRED_PAYLOAD_SIZE], DataShredHeader)> =
        Vec::with_capacity(num_data);

    for (i, chunk) in chunks.iter().enumerate() {
        let mut raw = [0u8; SHRED_PAYLOAD_SIZE];
        raw[64] = 0x80;
        raw[65..73].copy_from_slice(&slot.to_le_bytes());
        raw[73..77].copy_from_slice(&((fec_set_index + i as u32).to_le_bytes()));
        raw[77..79].copy_from_slice(&shred_version.to_le_bytes());
        raw[79..83].copy_from_slice(&fec_set_index.to_le_bytes());

        let is_last = i + 1 == chunks.len();
        let mut flags = 0u8;
        if is_last {
            flags |= FLAG_LAST_IN_SLOT;
        }
        raw[85] = flags;
        raw[86..88].copy_from_slice(&(chunk.len() as u16).to_le_bytes());
        raw[88..88 + chunk.len()].copy_from_slice(chunk);

        let mut region = [0u8; REGION_LEN];
        let n = (SHRED_PAYLOAD_SIZE - DATA_REGION_OFFSET).min(REGION_LEN);
        region[..n].copy_from_slice(&raw[DATA_REGION_OFFSET..DATA_REGION_OFFSET + n]);
        data_payloads.push(region);

        data_headers.push((
            raw,
            DataShredHeader {
                parent_offset: 0,
                flags,
                size: chunk.len() as u16,
            },
        ));
    }

    let code_payloads: Vec<[u8; REGION_LEN]> = (0..num_code)
        .map(|i| {
            let row = matrix::generator_row(num_data + i, num_data);
            let mut acc = [0u8; REGION_LEN];
            for (j, coeff) in row.iter().enumerate() {
                for (a, b) in acc.iter_mut().zip(data_payloads[j].iter()) {
                    *a ^= validator_fec::gf256::mul(*coeff, *b);
                }
            }
            acc
        })
        .collect();

    // Build the Merkle tree over every shred's logical payload region
    // (data and code both contribute leaves, in data-then-code order).
    let leaves: Vec<&[u8]> = data_payloads
        .iter()
        .map(|p| p.as_slice())
        .chain(code_payloads.iter().map(|p| p.as_slice()))
        .collect();
    let tree = MerkleTree::from_payloads(leaves);
    let root = tree.root();
    let signature = keypair.sign(root.as_bytes());

    let mut data_shreds = Vec::with_capacity(num_data);
    for (raw, _header) in data_headers {
        let mut raw = raw;
        raw[0..64].copy_from_slice(signature.as_bytes());
        data_shreds.push(Shred::parse(&raw).expect("shredder always builds well-formed shreds"));
    }

    let mut code_shreds = Vec::with_capacity(num_code);
    for (i, payload) in code_payloads.iter().enumerate() {
        let mut raw = [0u8; SHRED_PAYLOAD_SIZE];
        raw[0..64].copy_from_slice(signature.as_bytes());
        raw[64] = 0x60;
        raw[65..73].copy_from_slice(&slot.to_le_bytes());
        raw[73..77].copy_from_slice(&(fec_set_index + i as u32).to_le_bytes());
        raw[77..79].copy_from_slice(&shred_version.to_le_bytes());
        raw[79..83].copy_from_slice(&fec_set_index.to_le_bytes());
        let header = CodeShredHeader {
            num_data: num_data as u16,
            num_code: num_code as u16,
            position: i as u16,
        };
        raw[83..85].copy_from_slice(&header.num_data.to_le_bytes());
        raw[85..87].copy_from_slice(&header.num_code.to_le_bytes());
        raw[87..89].copy_from_slice(&header.position.to_le_bytes());
        let n = (SHRED_PAYLOAD_SIZE - CODE_REGION_OFFSET).min(REGION_LEN);
        raw[CODE_REGION_OFFSET..CODE_REGION_OFFSET + n].copy_from_slice(&payload[..n]);
        code_shreds.push(Shred::parse(&raw).expect("shredder always builds well-formed shreds"));
    }

    ShredderOutput {
        data_shreds,
        code_shreds,
        merkle_root: root,
    }
}
