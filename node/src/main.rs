//! Binary entry point: parses the CLI, runs the bootstrap sequence, wires
//! the runtime, and starts the vote submitter tile if voting is enabled.

mod cli;
mod runtime;

use {
    anyhow::{Context, Result},
    clap::Parser,
    cli::Cli,
    log::{error, info},
    runtime::Runtime,
    std::sync::atomic::Ordering,
    validator_bootstrap::BootstrapConfig,
    validator_primitives::Pubkey,
};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = BootstrapConfig {
        identity_path: cli.identity.clone(),
        vote_account_path: cli.vote_account.clone(),
        accounts_dir: cli.accounts_dir.clone(),
        ledger_dir: cli.ledger_dir.clone(),
        tower_dir: cli.tower_dir.clone(),
        snapshots_dir: cli.snapshots_dir.clone(),
        genesis_slot: cli.genesis_slot,
    };

    let outcome = validator_bootstrap::run(&config, |phase| {
        info!("bootstrap phase: {}", phase.name());
    })
    .context("bootstrap sequence failed")?;
    info!(
        "bootstrap complete at slot {}, {} account(s) loaded",
        outcome.start_slot, outcome.accounts_loaded
    );

    let vote_account = outcome.vote_account;
    let identity = outcome.identity.clone();
    let mut rt = Runtime::new(outcome, cli.tower_dir.clone());

    let tile = match vote_account {
        Some(vote_account) => {
            let vote_program_id = parse_pubkey(
                cli.vote_program_id
                    .as_deref()
                    .context("--vote-program-id is required when --vote-account is set")?,
            )?;
            rt.set_vote_submitter(identity, vote_account, vote_program_id);
            info!("voting enabled for vote account {vote_account}");

            let shutdown = rt.handles.shutdown.clone();
            ctrlc::set_handler(move || {
                info!("shutdown signal received");
                shutdown.store(true, Ordering::Release);
            })
            .context("installing shutdown signal handler")?;

            rt.spawn_vote_submitter_tile()
        }
        None => {
            info!("voting disabled: no --vote-account configured; nothing further to run");
            return Ok(());
        }
    };

    match tile.join().expect("vote submitter tile panicked") {
        Ok(_) => Ok(()),
        Err(err) => {
            error!("tower persistence failed after vote, aborting: {err}");
            std::process::exit(1);
        }
    }
}

fn parse_pubkey(encoded: &str) -> Result<Pubkey> {
    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| anyhow::anyhow!("invalid base58 in --vote-program-id"))?;
    let bytes: [u8; 32] = decoded
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("--vote-program-id must decode to 32 bytes"))?;
    Ok(Pubkey::new_from_array(bytes))
}
