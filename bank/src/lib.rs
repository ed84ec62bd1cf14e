//! Per-slot transaction execution against an account map; freeze to a
//! bank hash (C5).

pub mod accounts;
pub mod bank;
pub mod epoch;
pub mod programs;

pub use {
    accounts::{accounts_delta_hash, Account, AccountsStore, InMemoryAccountsStore},
    bank::{Bank, BankError, BatchResult, TransactionError, BASE_FEE_LAMPORTS},
    epoch::{EpochSchedule, RentParams, DEFAULT_SLOTS_PER_EPOCH},
    programs::{dispatch, InstructionError, InstructionResult, ProgramKind},
};
