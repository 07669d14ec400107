use crate::{
    address::Address,
    ledger::{
        LedgerReader,
        RemoteError,
    },
    model::{
        DecodeError,
        ProtocolStats,
        Round,
        UserStats,
        leaderboard_from_tokens,
    },
    shutdown::Shutdown,
    store::Store,
};
use std::{
    future::Future,
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::time;
use tracing::{
    debug,
    warn,
};

/// Upper bound on a single view read before it counts as failed.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
enum ReadFault {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Shape(#[from] DecodeError),
    #[error("no response within {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// Pulls contract views into the [`Store`].
///
/// Every fetch is self-contained: a failure is logged and leaves the store as it
/// was, and nothing is ever returned to the caller. Fetches may overlap freely;
/// the last completed one wins. A read that outlives the read timeout is
/// abandoned and logged like any other failure.
pub struct ReadSynchronizer<R> {
    reader: Arc<R>,
    store: Store,
    shutdown: Shutdown,
    read_timeout: Duration,
}

impl<R> Clone for ReadSynchronizer<R> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
            store: self.store.clone(),
            shutdown: self.shutdown.clone(),
            read_timeout: self.read_timeout,
        }
    }
}

impl<R: LedgerReader> ReadSynchronizer<R> {
    pub fn new(reader: Arc<R>, store: Store, shutdown: Shutdown) -> Self {
        Self {
            reader,
            store,
            shutdown,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    pub async fn fetch_user_stats(&self, account: Address) {
        let fetched = self
            .read("getUserStats", self.reader.get_user_stats(&account))
            .await;
        let Some(tokens) = fetched else {
            return;
        };
        match UserStats::from_tokens(&tokens) {
            Ok(stats) => {
                if !self.store.set_user_stats(&account, stats) {
                    debug!(%account, "dropping user stats for an account that is no longer active");
                }
            }
            Err(err) => Self::log_fault("getUserStats", &err.into()),
        }
    }

    pub async fn fetch_wallet_balance(&self, account: Address) {
        let fetched = self
            .read("getBalance", self.reader.get_balance(&account))
            .await;
        if let Some(balance) = fetched {
            if !self.store.set_wallet_balance(&account, balance) {
                debug!(%account, "dropping balance for an account that is no longer active");
            }
        }
    }

    pub async fn fetch_protocol_stats(&self) {
        let fetched = self
            .read("getProtocolStats", self.reader.get_protocol_stats())
            .await;
        if let Some(tokens) = fetched {
            match ProtocolStats::from_tokens(&tokens) {
                Ok(stats) => self.store.set_protocol_stats(stats),
                Err(err) => Self::log_fault("getProtocolStats", &err.into()),
            }
        }
    }

    pub async fn fetch_current_round(&self) {
        let fetched = self
            .read("getCurrentRound", self.reader.get_current_round())
            .await;
        if let Some(tokens) = fetched {
            match Round::from_tokens(&tokens) {
                Ok(round) => self.store.set_current_round(round),
                Err(err) => Self::log_fault("getCurrentRound", &err.into()),
            }
        }
    }

    pub async fn fetch_leaderboard(&self) {
        let fetched = self
            .read("getLeaderboard", self.reader.get_leaderboard())
            .await;
        if let Some(tokens) = fetched {
            match leaderboard_from_tokens(&tokens) {
                Ok(entries) => self.store.set_leaderboard(entries),
                Err(err) => Self::log_fault("getLeaderboard", &err.into()),
            }
        }
    }

    /// Runs every global fetch, plus the account fetches when one is given, side by side.
    pub async fn refresh_all(&self, account: Option<Address>) {
        let user = async {
            if let Some(account) = account {
                futures::join!(
                    self.fetch_user_stats(account),
                    self.fetch_wallet_balance(account),
                );
            }
        };
        futures::join!(
            self.fetch_protocol_stats(),
            self.fetch_current_round(),
            self.fetch_leaderboard(),
            user,
        );
    }

    async fn read<T>(
        &self,
        view: &'static str,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Option<T> {
        tokio::select! {
            res = time::timeout(self.read_timeout, call) => match res {
                Ok(Ok(value)) => Some(value),
                Ok(Err(err)) => {
                    Self::log_fault(view, &err.into());
                    None
                }
                Err(_) => {
                    Self::log_fault(view, &ReadFault::TimedOut(self.read_timeout));
                    None
                }
            },
            _ = self.shutdown.cancelled() => {
                debug!(view, "read cancelled by shutdown");
                None
            }
        }
    }

    fn log_fault(view: &'static str, fault: &ReadFault) {
        match fault {
            ReadFault::Remote(err) => warn!(view, error = %err, "remote read failed"),
            ReadFault::Shape(err) => warn!(view, error = %err, "unexpected response shape"),
            ReadFault::TimedOut(_) => warn!(view, error = %fault, "remote read timed out"),
        }
    }
}

#[cfg(test)]
mod tests;
