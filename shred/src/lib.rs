//! Shred ingestion, Merkle verification, and the leader-side shredder
//! (C1, C3, C11).

pub mod assembler;
pub mod merkle;
pub mod shredder;
pub mod verifier;
pub mod wire;

pub use {
    assembler::{AssemblerStats, InsertOutcome, ShredAssembler},
    merkle::{InclusionProof, MerkleTree},
    shredder::{shred_entries, ShredderOutput},
    verifier::verify_fec_set,
    wire::{
        classify_type_byte, CodeShredHeader, DataShredHeader, Shred, ShredKind, ShredParseError,
        ShredVariant,
    },
};
