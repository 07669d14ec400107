//! Background workers that keep the [`Store`] fresh and the countdown ticking.

use crate::{
    ledger::LedgerReader,
    shutdown::{
        Shutdown,
        ShutdownTrigger,
    },
    store::Store,
    sync::ReadSynchronizer,
    views::{
        Countdown,
        CountdownState,
        CountdownView,
    },
};
use chrono::Utc;
use std::time::Duration;
use tokio::{
    sync::{
        mpsc,
        watch,
    },
    task::JoinHandle,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub refresh_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

#[derive(Debug)]
pub enum SyncCommand {
    FetchNow,
    Shutdown,
}

/// Owns the refresh and countdown workers. Dropping the service stops both.
pub struct SyncService {
    commands: mpsc::UnboundedSender<SyncCommand>,
    countdown: watch::Receiver<Option<CountdownView>>,
    trigger: ShutdownTrigger,
    refresh_handle: Option<JoinHandle<()>>,
    countdown_handle: Option<JoinHandle<()>>,
}

impl SyncService {
    /// `trigger` must own the signal `sync` was built with, so stopping the
    /// service also abandons reads that are still in flight.
    pub fn spawn<R: LedgerReader>(
        sync: ReadSynchronizer<R>,
        trigger: ShutdownTrigger,
        config: SyncConfig,
    ) -> Self {
        let (commands, cmd_rx) = mpsc::unbounded_channel();
        let (countdown_tx, countdown) = watch::channel(None);
        let store = sync.store().clone();
        let refresh_handle = tokio::spawn(refresh_worker(
            sync,
            cmd_rx,
            trigger.subscribe(),
            config.refresh_interval,
        ));
        let countdown_handle = tokio::spawn(countdown_worker(
            store,
            countdown_tx,
            trigger.subscribe(),
            config.tick_interval,
        ));
        Self {
            commands,
            countdown,
            trigger,
            refresh_handle: Some(refresh_handle),
            countdown_handle: Some(countdown_handle),
        }
    }

    /// Runs a full refresh now, outside the regular interval.
    pub fn fetch_now(&self) {
        if self.commands.send(SyncCommand::FetchNow).is_err() {
            debug!("refresh worker already stopped");
        }
    }

    pub fn countdown(&self) -> watch::Receiver<Option<CountdownView>> {
        self.countdown.clone()
    }

    pub async fn shutdown(mut self) {
        let _ = self.commands.send(SyncCommand::Shutdown);
        self.trigger.trigger();
        for handle in [self.refresh_handle.take(), self.countdown_handle.take()]
            .into_iter()
            .flatten()
        {
            if let Err(err) = handle.await {
                warn!(?err, "sync worker ended abnormally");
            }
        }
        info!("sync service stopped");
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.trigger.trigger();
        for handle in [self.refresh_handle.take(), self.countdown_handle.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

async fn refresh_worker<R: LedgerReader>(
    sync: ReadSynchronizer<R>,
    mut cmd_rx: mpsc::UnboundedReceiver<SyncCommand>,
    shutdown: Shutdown,
    refresh_interval: Duration,
) {
    let mut ticker = time::interval(refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut changes = sync.store().subscribe();
    let mut last_account = changes.borrow_and_update().account;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                sync.refresh_all(sync.store().account()).await;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let account = changes.borrow_and_update().account;
                if account == last_account {
                    continue;
                }
                last_account = account;
                if let Some(account) = account {
                    debug!(%account, "account changed, fetching its stats");
                    futures::join!(
                        sync.fetch_user_stats(account),
                        sync.fetch_wallet_balance(account),
                    );
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SyncCommand::FetchNow) => {
                        sync.refresh_all(sync.store().account()).await;
                    }
                    Some(SyncCommand::Shutdown) | None => break,
                }
            }
        }
    }
    debug!("refresh worker stopped");
}

async fn countdown_worker(
    store: Store,
    views: watch::Sender<Option<CountdownView>>,
    shutdown: Shutdown,
    tick_interval: Duration,
) {
    let mut ticker = time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut countdown: Option<Countdown> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(round) = store.snapshot().current_round {
                    match countdown.as_mut() {
                        Some(countdown) => countdown.observe_round(&round),
                        None => countdown = Some(Countdown::for_round(&round)),
                    }
                }
                let Some(countdown) = countdown.as_mut() else {
                    continue;
                };
                let before = countdown.state();
                let view = countdown.tick(Utc::now());
                if before == CountdownState::Counting && view.state == CountdownState::Ended {
                    info!(round = view.round_id, "round ended");
                }
                views.send_if_modified(|current| {
                    let changed = current.as_ref() != Some(&view);
                    *current = Some(view);
                    changed
                });
            }
        }
    }
    debug!("countdown worker stopped");
}
