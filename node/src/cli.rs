//! CLI entry point (clap derive), matching the teacher's move from
//! hand-built `clap::App`/`Arg` wiring to the derive style for a fresh
//! binary.

use {clap::Parser, std::path::PathBuf};

#[derive(Debug, Parser)]
#[command(name = "validator-node", about = "Replay-and-consensus validator core")]
pub struct Cli {
    /// Path to the validator identity keypair file (§6.1).
    #[arg(long)]
    pub identity: PathBuf,

    /// Path to the vote-account keypair file. Voting is disabled if
    /// omitted.
    #[arg(long)]
    pub vote_account: Option<PathBuf>,

    #[arg(long, default_value = "ledger")]
    pub ledger_dir: PathBuf,

    #[arg(long, default_value = "accounts")]
    pub accounts_dir: PathBuf,

    #[arg(long, default_value = "tower")]
    pub tower_dir: PathBuf,

    #[arg(long, default_value = "snapshots")]
    pub snapshots_dir: PathBuf,

    /// Slot to start from when no snapshot is found locally (§4.10 step 3).
    #[arg(long, default_value_t = 0)]
    pub genesis_slot: u64,

    /// The vote program's well-known pubkey, base58-encoded. Required
    /// only when `--vote-account` is set.
    #[arg(long)]
    pub vote_program_id: Option<String>,
}
