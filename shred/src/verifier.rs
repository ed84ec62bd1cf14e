//! Merkle Verifier (C3): the producer signs one Merkle root per FEC set
//! and copies the signature into every shred of the set. On ingest a
//! shred is authentic iff that signature verifies against the slot's
//! leader, either over the reconstructed Merkle root (merkle-variant
//! shreds) or over the raw bytes minus the signature (legacy shreds,
//! §4.3).

use {
    crate::{
        merkle::{leaf_hash, MerkleTree},
        wire::{Shred, ShredKind, LEGACY_CODE_TYPE, LEGACY_DATA_TYPE},
    },
    validator_fec::{CODE_REGION_OFFSET, DATA_REGION_OFFSET, REGION_LEN},
    validator_primitives::Pubkey,
};

fn logical_region(shred: &Shred) -> &[u8] {
    let offset = match shred.kind() {
        ShredKind::Data => DATA_REGION_OFFSET,
        ShredKind::Code => CODE_REGION_OFFSET,
    };
    let end = (offset + REGION_LEN).min(shred.raw.len());
    &shred.raw[offset..end]
}

fn is_legacy(shred: &Shred) -> bool {
    matches!(shred.type_byte, LEGACY_DATA_TYPE | LEGACY_CODE_TYPE)
}

/// Verifies a complete FEC set's signature by rebuilding the Merkle tree
/// over every shred's logical payload region and checking the (shared)
/// signature against the leader's key. Returns `false` on any mismatch —
/// caller is responsible for discarding the set and incrementing a
/// counter (§4.3, §7).
pub fn verify_fec_set(shreds: &[Shred], leader: &Pubkey) -> bool {
    let Some(first) = shreds.first() else {
        return false;
    };
    if is_legacy(first) {
        return shreds
            .iter()
            .all(|s| s.signature == first.signature && s.verify_signature_legacy(leader));
    }

    let leaves: Vec<_> = shreds.iter().map(|s| leaf_hash(logical_region(s))).collect();
    let tree = MerkleTree::new(leaves);
    let root = tree.root();
    shreds
        .iter()
        .all(|s| s.signature == first.signature && s.verify_signature_over_root(leader, &root))
}

#[cfg(test)]
mod tests {
    use {super::*, crate::shredder::shred_entries, validator_primitives::Keypair};

    #[test]
    fn verifies_genuine_set_and_rejects_wrong_leader() {
        let keypair = Keypair::new();
        let entry_bytes = vec![1u8; 1051 * 3];
        let out = shred_entries(1, 1, 0, &entry_bytes, &keypair);
        let mut all: Vec<Shred> = out.data_shreds;
        all.extend(out.code_shreds);

        assert!(verify_fec_set(&all, &keypair.pubkey()));

        let impostor = Keypair::new();
        assert!(!verify_fec_set(&all, &impostor.pubkey()));
    }

    #[test]
    fn empty_set_fails_closed() {
        assert!(!verify_fec_set(&[], &Keypair::new().pubkey()));
    }
}
