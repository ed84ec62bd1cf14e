//! The Bank (C5): per-slot transaction execution, fee accounting, and
//! state hashing.

use {
    crate::{
        accounts::{accounts_delta_hash, Account, AccountsStore, InMemoryAccountsStore},
        epoch::{EpochSchedule, RentParams},
        programs::{dispatch, InstructionError, ProgramKind},
    },
    log::warn,
    std::collections::HashSet,
    thiserror::Error,
    validator_entry::Transaction,
    validator_primitives::{Hash, Pubkey},
};

pub const BASE_FEE_LAMPORTS: u64 = 5_000;
const MAX_LOADED_ACCOUNTS: usize = 64;
const MAX_COMPUTE_UNITS_PER_TX: u64 = 1_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("transaction signatures were not verified")]
    SignatureFailure,
    #[error("fee payer balance is below the required fee")]
    InsufficientFundsForFee,
    #[error("an account referenced by the transaction was not found")]
    AccountNotFound,
    #[error("an instruction referenced an invalid program id index")]
    InvalidInstruction,
    #[error("compute budget exceeded")]
    ComputeBudgetExceeded,
    #[error("recent blockhash was not found")]
    BlockhashNotFound,
    #[error("transaction was already processed")]
    AlreadyProcessed,
}

#[derive(Debug, Error)]
pub enum BankError {
    #[error("bank is frozen and accepts no further mutation")]
    Frozen,
    #[error("accounts-delta hash could not be computed")]
    DeltaHashUnavailable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub n_successful: u64,
    pub n_failed: u64,
    pub fees: u64,
}

#[derive(Clone)]
pub struct Bank {
    pub slot: u64,
    pub parent_slot: Option<u64>,
    pub parent_bank_hash: Hash,
    pub block_height: u64,
    pub recent_blockhash: Hash,
    pub tx_count: u64,
    pub sig_count: u64,
    pub fees_collected: u64,
    pub epoch_schedule: EpochSchedule,
    pub rent_params: RentParams,
    bank_hash: Option<Hash>,
    accounts: InMemoryAccountsStore,
    modified: HashSet<Pubkey>,
    signatures_preverified: bool,
}

impl Bank {
    /// Creates the root bank at bootstrap (§4.10 step 6): no parent.
    pub fn new_root(slot: u64, recent_blockhash: Hash, accounts: InMemoryAccountsStore) -> Self {
        Self {
            slot,
            parent_slot: None,
            parent_bank_hash: Hash::default(),
            block_height: 0,
            recent_blockhash,
            tx_count: 0,
            sig_count: 0,
            fees_collected: 0,
            epoch_schedule: EpochSchedule::default(),
            rent_params: RentParams::default(),
            bank_hash: None,
            accounts,
            modified: HashSet::new(),
            signatures_preverified: true,
        }
    }

    /// `new_child(parent, new_slot)`: non-frozen, inherits the parent's
    /// accounts view via copy-on-write fork (§4.5).
    pub fn new_child(parent: &Bank, new_slot: u64) -> Self {
        Self {
            slot: new_slot,
            parent_slot: Some(parent.slot),
            parent_bank_hash: parent.bank_hash.unwrap_or(parent.parent_bank_hash),
            block_height: parent.block_height + 1,
            recent_blockhash: parent.recent_blockhash,
            tx_count: 0,
            sig_count: 0,
            fees_collected: 0,
            epoch_schedule: parent.epoch_schedule,
            rent_params: parent.rent_params,
            bank_hash: None,
            accounts: parent.accounts.fork(),
            modified: HashSet::new(),
            signatures_preverified: true,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.bank_hash.is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch_schedule.epoch(self.slot)
    }

    pub fn get_account(&self, pubkey: &Pubkey) -> Option<Account> {
        self.accounts.get_account(pubkey)
    }

    pub fn get_balance(&self, pubkey: &Pubkey) -> u64 {
        self.accounts
            .get_account(pubkey)
            .map(|a| a.lamports)
            .unwrap_or(0)
    }

    /// Test/bootstrap helper: seeds an account directly (genesis/snapshot
    /// load path), bypassing transaction execution.
    pub fn set_account(&mut self, pubkey: Pubkey, account: Account) -> Result<(), BankError> {
        if self.is_frozen() {
            return Err(BankError::Frozen);
        }
        self.accounts.set_account(pubkey, account);
        Ok(())
    }

    /// By default transactions arriving here are assumed pre-verified by
    /// an inline signature-verification stage (spec §5); tests that want
    /// to exercise `SignatureFailure` use [`Bank::mark_signatures_unverified`].
    #[cfg(test)]
    pub fn mark_signatures_unverified(&mut self) {
        self.signatures_preverified = false;
    }

    /// `process_batch(txs) → {n_successful, n_failed, fees}` (§4.5).
    pub fn process_batch(&mut self, txs: &[Transaction]) -> Result<BatchResult, BankError> {
        if self.is_frozen() {
            return Err(BankError::Frozen);
        }

        let mut result = BatchResult::default();
        for tx in txs {
            match self.process_one(tx) {
                Ok(fee) => {
                    result.n_successful += 1;
                    result.fees += fee;
                }
                Err(_) => {
                    result.n_failed += 1;
                }
            }
        }
        Ok(result)
    }

    fn process_one(&mut self, tx: &Transaction) -> Result<u64, TransactionError> {
        if !self.signatures_preverified {
            return Err(TransactionError::SignatureFailure);
        }

        let sig_count = tx.signatures.len() as u64;
        let fee = BASE_FEE_LAMPORTS * sig_count.max(1);

        let Some(fee_payer) = tx.message.fee_payer().copied() else {
            return Err(TransactionError::AccountNotFound);
        };
        let payer_balance = self.get_balance(&fee_payer);
        if payer_balance < fee {
            return Err(TransactionError::InsufficientFundsForFee);
        }

        let loaded = match self.load_accounts(&tx.message.account_keys) {
            Ok(loaded) => loaded,
            Err(err) => {
                self.charge_fee(&fee_payer, fee);
                return Err(err);
            }
        };

        let mut total_compute_units: u64 = 0;
        for instruction in &tx.message.instructions {
            let program_id = loaded
                .get(instruction.program_id_index as usize)
                .ok_or(TransactionError::InvalidInstruction)?;
            let kind = ProgramKind::classify(program_id);
            let outcome = dispatch(kind, &instruction.data);
            if let Some(err) = outcome.error {
                warn!("instruction failed: {err}");
                self.charge_fee(&fee_payer, fee);
                return Err(TransactionError::InvalidInstruction);
            }
            total_compute_units = total_compute_units
                .checked_add(outcome.compute_units_consumed)
                .ok_or(TransactionError::ComputeBudgetExceeded)?;
            if total_compute_units > MAX_COMPUTE_UNITS_PER_TX {
                self.charge_fee(&fee_payer, fee);
                return Err(TransactionError::ComputeBudgetExceeded);
            }
        }

        self.charge_fee(&fee_payer, fee);
        self.tx_count += 1;
        self.sig_count += sig_count;
        self.fees_collected += fee;
        Ok(fee)
    }

    /// Loads and dedups the transaction's account set, bounded by
    /// `MAX_LOADED_ACCOUNTS` (§4.5 step 3). First occurrence is kept.
    fn load_accounts(&self, keys: &[Pubkey]) -> Result<Vec<Pubkey>, TransactionError> {
        if keys.len() > MAX_LOADED_ACCOUNTS {
            return Err(TransactionError::InvalidInstruction);
        }
        let mut seen = HashSet::with_capacity(keys.len());
        let mut loaded = Vec::with_capacity(keys.len());
        for key in keys {
            if seen.insert(*key) {
                loaded.push(*key);
            }
        }
        Ok(loaded)
    }

    fn charge_fee(&mut self, payer: &Pubkey, fee: u64) {
        let mut account = self.accounts.get_account(payer).unwrap_or_default();
        account.lamports = account.lamports.saturating_sub(fee);
        self.accounts.set_account(*payer, account);
        self.modified.insert(*payer);
    }

    /// `freeze() → BankHash`, idempotent (§4.5):
    /// `SHA256(parent_bank_hash ‖ accounts_delta_hash ‖ signature_count_le ‖ recent_blockhash)`.
    pub fn freeze(&mut self) -> Hash {
        if let Some(hash) = self.bank_hash {
            return hash;
        }
        let modified: Vec<Pubkey> = self.modified.iter().copied().collect();
        let delta_hash = accounts_delta_hash(&self.accounts, &modified);
        let hash = Hash::hash_parts(&[
            self.parent_bank_hash.as_bytes(),
            delta_hash.as_bytes(),
            &self.sig_count.to_le_bytes(),
            self.recent_blockhash.as_bytes(),
        ]);
        self.bank_hash = Some(hash);
        hash
    }

    pub fn bank_hash(&self) -> Option<Hash> {
        self.bank_hash
    }
}
