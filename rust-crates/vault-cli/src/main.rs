use chrono::Utc;
use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ledger_rpc::JsonRpcLedger;
use std::{
    process::ExitCode,
    sync::Arc,
    time::Duration,
};
use tokio::time;
use tracing::{
    info,
    warn,
};
use vault_sync::{
    LedgerWriter,
    ReadSynchronizer,
    Receipt,
    ShutdownTrigger,
    Store,
    StoreSnapshot,
    SyncService,
    TransactionExecutor,
    WriteError,
    WriteReport,
    referral::{
        JsonFileStorage,
        capture_referral,
    },
    shutdown_channel,
    views::CountdownState,
};

use crate::config::{
    Cli,
    Command,
    Config,
    WriteCommand,
};

mod config;
mod logging;
mod render;

type Executor = TransactionExecutor<JsonRpcLedger, JsonRpcLedger, JsonFileStorage>;

const RENDER_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let Cli { config, command } = Cli::parse();
    let _log_guard = logging::init(config.log_dir.as_deref())?;
    info!(rpc = %config.rpc_url, contract = %config.contract, "starting basevault client");

    let state_path = config.state_path()?;
    let storage = Arc::new(
        JsonFileStorage::open(&state_path).map_err(|e| eyre!("opening client state: {e:#}"))?,
    );
    if let Some(entry_url) = &config.entry_url {
        if let Err(err) = capture_referral(entry_url, storage.as_ref()) {
            warn!(error = %format!("{err:#}"), "could not store referral code");
        }
    }

    let ledger = Arc::new(
        JsonRpcLedger::new(config.ledger_config())
            .map_err(|e| eyre!("connecting to RPC node: {e:#}"))?,
    );
    let store = Store::new();
    store.set_account(ledger.session());
    let (trigger, shutdown) = shutdown_channel();
    let sync = ReadSynchronizer::new(ledger.clone(), store.clone(), shutdown.clone())
        .with_read_timeout(config.read_timeout());

    match command {
        Command::Watch => {
            watch(sync, trigger, &config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            sync.refresh_all(store.account()).await;
            print_status(&store.snapshot(), &config);
            Ok(ExitCode::SUCCESS)
        }
        Command::Write(write) => {
            // validation runs against the local store, so fill it first
            sync.refresh_all(store.account()).await;
            let executor = TransactionExecutor::new(
                sync,
                ledger,
                storage,
                config.executor_config(),
                shutdown,
            );
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, no longer waiting for confirmation");
                    trigger.trigger();
                }
            });

            let result = run_write(&executor, write).await;
            let report = WriteReport::from(&result);
            let json =
                serde_json::to_string_pretty(&report).wrap_err("serializing write result")?;
            println!("{json}");
            Ok(if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn run_write(executor: &Executor, command: WriteCommand) -> Result<Receipt, WriteError> {
    match command {
        WriteCommand::Deposit { amount, referrer } => {
            executor.deposit(&amount, referrer.as_deref()).await
        }
        WriteCommand::Withdraw { amount } => executor.withdraw(&amount).await,
        WriteCommand::ClaimRewards => executor.claim_rewards().await,
        WriteCommand::FinalizeLottery => executor.finalize_lottery().await,
        WriteCommand::CreateCircle {
            name,
            target_amount,
            duration_days,
            max_members,
        } => {
            executor
                .create_circle(&name, &target_amount, duration_days, max_members)
                .await
        }
        WriteCommand::JoinCircle { circle_id } => executor.join_circle(circle_id).await,
        WriteCommand::ContributeToCircle { circle_id, amount } => {
            executor.contribute_to_circle(circle_id, &amount).await
        }
        WriteCommand::WithdrawFromCircle { circle_id } => {
            executor.withdraw_from_circle(circle_id).await
        }
    }
}

async fn watch(
    sync: ReadSynchronizer<JsonRpcLedger>,
    trigger: ShutdownTrigger,
    config: &Config,
) -> Result<()> {
    let mut changes = sync.store().subscribe();
    let service = SyncService::spawn(sync, trigger, config.sync_config());
    let mut countdown = service.countdown();
    let mut render = time::interval(RENDER_INTERVAL);
    let mut last_state = None;
    let mut dirty = false;

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.wrap_err("listening for Ctrl-C")?;
                info!("interrupt received, stopping");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                dirty = true;
            }
            changed = countdown.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = (*countdown.borrow_and_update()).map(|view| view.state);
                if state != last_state {
                    if state == Some(CountdownState::Ended) {
                        info!("current round has ended");
                    }
                    last_state = state;
                    dirty = true;
                }
            }
            _ = render.tick() => {
                if dirty {
                    let snapshot = changes.borrow_and_update().clone();
                    print_status(&snapshot, config);
                    dirty = false;
                }
            }
        }
    }

    service.shutdown().await;
    Ok(())
}

fn print_status(snapshot: &StoreSnapshot, config: &Config) {
    let lines = render::status_lines(snapshot, Utc::now(), config.app_url.as_deref());
    println!("{}\n", lines.join("\n"));
}
