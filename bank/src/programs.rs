//! Native vs. BPF program dispatch (§4.5, §9): a tagged enum with a single
//! `dispatch` entry point, avoiding virtual-table polymorphism for this
//! small, closed set of programs.

use validator_primitives::Pubkey;

pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);
pub const VOTE_PROGRAM_ID: Pubkey = Pubkey::new_from_array([1u8; 32]);
pub const STAKE_PROGRAM_ID: Pubkey = Pubkey::new_from_array([2u8; 32]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    System,
    Vote,
    Stake,
    /// Anything not matching a fixed native id. Out of this core's scope
    /// beyond the compute-unit surface (spec §1).
    Bpf,
}

impl ProgramKind {
    pub fn classify(program_id: &Pubkey) -> Self {
        if *program_id == SYSTEM_PROGRAM_ID {
            ProgramKind::System
        } else if *program_id == VOTE_PROGRAM_ID {
            ProgramKind::Vote
        } else if *program_id == STAKE_PROGRAM_ID {
            ProgramKind::Stake
        } else {
            ProgramKind::Bpf
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionResult {
    pub compute_units_consumed: u64,
    pub error: Option<InstructionError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InstructionError {
    #[error("program id index out of range of the loaded account set")]
    InvalidProgramIdIndex,
    #[error("instruction data was malformed for its program")]
    InvalidInstructionData,
}

/// Fixed per-op compute-unit table for native programs (§4.5: "the bank
/// only needs their success/compute-unit behavior"). The discriminant is
/// the first 4 bytes of instruction data, little-endian.
fn native_compute_units(kind: ProgramKind, discriminant: u32) -> u64 {
    match (kind, discriminant) {
        (ProgramKind::System, _) => 150,
        (ProgramKind::Vote, 12) => 2_100, // compact-update-vote-state (§6.4)
        (ProgramKind::Vote, _) => 1_500,
        (ProgramKind::Stake, _) => 750,
        (ProgramKind::Bpf, _) => 0,
    }
}

/// Dispatches a single instruction given its already-classified program
/// kind. The BPF variant is a collaborator boundary (spec §1): this core
/// only records whatever compute-unit figure it reports back, here
/// approximated at a fixed placeholder since the VM is out of scope.
pub fn dispatch(kind: ProgramKind, instruction_data: &[u8]) -> InstructionResult {
    if kind == ProgramKind::Bpf {
        return InstructionResult {
            compute_units_consumed: 200_000,
            error: None,
        };
    }

    let discriminant = match instruction_data.get(0..4) {
        Some(bytes) => u32::from_le_bytes(bytes.try_into().unwrap()),
        None => {
            return InstructionResult {
                compute_units_consumed: 0,
                error: Some(InstructionError::InvalidInstructionData),
            }
        }
    };

    InstructionResult {
        compute_units_consumed: native_compute_units(kind, discriminant),
        error: None,
    }
}
