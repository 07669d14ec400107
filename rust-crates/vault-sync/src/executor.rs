use crate::{
    address::{
        Address,
        TxHash,
    },
    amount::{
        Amount,
        AmountError,
    },
    ledger::{
        LedgerReader,
        LedgerWriter,
        Receipt,
        RemoteError,
        WriteCall,
    },
    referral::{
        DurableStorage,
        stored_referrer,
    },
    shutdown::Shutdown,
    store::{
        Store,
        StoreSnapshot,
    },
    sync::ReadSynchronizer,
};
use primitive_types::U256;
use serde::Serialize;
use std::{
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::time;
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
pub const MAX_CIRCLE_NAME_BYTES: usize = 32;
pub const MIN_CIRCLE_MEMBERS: u64 = 2;
pub const MAX_CIRCLE_MEMBERS: u64 = 50;

/// Native amount left in the wallet for fees when depositing "max" (0.001).
pub fn gas_reserve() -> Amount {
    Amount::from_raw(U256::exp10(15))
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Wallet not connected")]
    NotConnected,
    #[error("Another transaction is already pending")]
    Busy,
    #[error("{0}")]
    Invalid(String),
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Timed out after {}s waiting for {tx} to be confirmed", .waited.as_secs())]
    ConfirmationTimeout { tx: TxHash, waited: Duration },
    #[error("Stopped waiting for {tx}: client is shutting down")]
    Cancelled { tx: TxHash },
}

impl From<AmountError> for WriteError {
    fn from(err: AmountError) -> Self {
        WriteError::Invalid(format!("Please enter a valid amount: {err}"))
    }
}

/// The caller-facing outcome of a write, in the shape shown to users.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<Receipt, WriteError>> for WriteReport {
    fn from(result: &Result<Receipt, WriteError>) -> Self {
        match result {
            Ok(receipt) => Self {
                success: true,
                transaction_id: Some(receipt.tx_hash),
                error: None,
            },
            Err(err) => Self {
                success: false,
                transaction_id: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Holds the store's pending-write slot and releases it on drop, whichever
/// way the write ended.
#[derive(Debug)]
pub struct WriteGuard {
    store: Store,
}

impl WriteGuard {
    pub fn acquire(store: &Store) -> Option<Self> {
        store.try_begin_write().then(|| Self {
            store: store.clone(),
        })
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.store.end_write();
    }
}

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    pub confirmation_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Refresh {
    UserStats,
    WalletBalance,
    ProtocolStats,
    CurrentRound,
}

/// Submits state-changing calls one at a time and refreshes what they affect.
pub struct TransactionExecutor<R, W, S: ?Sized> {
    sync: ReadSynchronizer<R>,
    writer: Arc<W>,
    referrals: Arc<S>,
    config: ExecutorConfig,
    shutdown: Shutdown,
}

impl<R, W, S: ?Sized> Clone for TransactionExecutor<R, W, S> {
    fn clone(&self) -> Self {
        Self {
            sync: self.sync.clone(),
            writer: self.writer.clone(),
            referrals: self.referrals.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<R, W, S> TransactionExecutor<R, W, S>
where
    R: LedgerReader,
    W: LedgerWriter,
    S: DurableStorage + ?Sized,
{
    pub fn new(
        sync: ReadSynchronizer<R>,
        writer: Arc<W>,
        referrals: Arc<S>,
        config: ExecutorConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            sync,
            writer,
            referrals,
            config,
            shutdown,
        }
    }

    pub fn store(&self) -> &Store {
        self.sync.store()
    }

    /// Deposits `amount` native units. Without an explicit `referrer` the stored
    /// referral code is used, and failing that the zero address.
    pub async fn deposit(
        &self,
        amount: &str,
        referrer: Option<&str>,
    ) -> Result<Receipt, WriteError> {
        let account = self.session()?;
        let value = parse_positive(amount)?;
        if let Some(available) = self.known(account, |s| s.wallet_balance) {
            if value > available {
                return Err(WriteError::InsufficientBalance {
                    requested: value,
                    available,
                });
            }
        }
        let referrer = self.resolve_referrer(referrer);
        self.execute(
            account,
            WriteCall::Deposit { referrer, value },
            &[
                Refresh::UserStats,
                Refresh::ProtocolStats,
                Refresh::CurrentRound,
                Refresh::WalletBalance,
            ],
        )
        .await
    }

    pub async fn withdraw(&self, amount: &str) -> Result<Receipt, WriteError> {
        let account = self.session()?;
        let amount = parse_positive(amount)?;
        if let Some(deposited) = self.known(account, |s| max_withdraw(&s)) {
            if amount > deposited {
                return Err(WriteError::InsufficientBalance {
                    requested: amount,
                    available: deposited,
                });
            }
        }
        self.execute(
            account,
            WriteCall::Withdraw { amount },
            &[
                Refresh::UserStats,
                Refresh::ProtocolStats,
                Refresh::WalletBalance,
            ],
        )
        .await
    }

    pub async fn claim_rewards(&self) -> Result<Receipt, WriteError> {
        let account = self.session()?;
        self.execute(
            account,
            WriteCall::ClaimRewards,
            &[Refresh::UserStats, Refresh::WalletBalance],
        )
        .await
    }

    pub async fn finalize_lottery(&self) -> Result<Receipt, WriteError> {
        let account = self.session()?;
        self.execute(
            account,
            WriteCall::FinalizeLottery,
            &[Refresh::CurrentRound, Refresh::ProtocolStats],
        )
        .await
    }

    pub async fn create_circle(
        &self,
        name: &str,
        target_amount: &str,
        duration_days: u64,
        max_members: u64,
    ) -> Result<Receipt, WriteError> {
        let account = self.session()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(WriteError::Invalid("Circle name is required".to_string()));
        }
        if name.len() > MAX_CIRCLE_NAME_BYTES {
            return Err(WriteError::Invalid(format!(
                "Circle name must be at most {MAX_CIRCLE_NAME_BYTES} bytes"
            )));
        }
        let target_amount = parse_positive(target_amount)?;
        if duration_days == 0 {
            return Err(WriteError::Invalid(
                "Duration must be at least one day".to_string(),
            ));
        }
        if !(MIN_CIRCLE_MEMBERS..=MAX_CIRCLE_MEMBERS).contains(&max_members) {
            return Err(WriteError::Invalid(format!(
                "Max members must be between {MIN_CIRCLE_MEMBERS} and {MAX_CIRCLE_MEMBERS}"
            )));
        }
        self.execute(
            account,
            WriteCall::CreateCircle {
                name: name.to_string(),
                target_amount,
                duration_days: U256::from(duration_days),
                max_members: U256::from(max_members),
            },
            &[Refresh::ProtocolStats],
        )
        .await
    }

    pub async fn join_circle(&self, circle_id: u64) -> Result<Receipt, WriteError> {
        let account = self.session()?;
        self.execute(
            account,
            WriteCall::JoinCircle {
                circle_id: U256::from(circle_id),
            },
            &[Refresh::ProtocolStats],
        )
        .await
    }

    pub async fn contribute_to_circle(
        &self,
        circle_id: u64,
        amount: &str,
    ) -> Result<Receipt, WriteError> {
        let account = self.session()?;
        let value = parse_positive(amount)?;
        self.execute(
            account,
            WriteCall::ContributeToCircle {
                circle_id: U256::from(circle_id),
                value,
            },
            &[
                Refresh::ProtocolStats,
                Refresh::UserStats,
                Refresh::WalletBalance,
            ],
        )
        .await
    }

    pub async fn withdraw_from_circle(&self, circle_id: u64) -> Result<Receipt, WriteError> {
        let account = self.session()?;
        self.execute(
            account,
            WriteCall::WithdrawFromCircle {
                circle_id: U256::from(circle_id),
            },
            &[Refresh::ProtocolStats, Refresh::WalletBalance],
        )
        .await
    }

    fn session(&self) -> Result<Address, WriteError> {
        self.writer.session().ok_or(WriteError::NotConnected)
    }

    /// A stored value, but only while the store tracks `account`.
    fn known<T>(&self, account: Address, pick: impl FnOnce(StoreSnapshot) -> Option<T>) -> Option<T> {
        let snapshot = self.store().snapshot();
        if snapshot.account != Some(account) {
            return None;
        }
        pick(snapshot)
    }

    fn resolve_referrer(&self, explicit: Option<&str>) -> String {
        if let Some(referrer) = explicit.map(str::trim).filter(|r| !r.is_empty()) {
            return referrer.to_string();
        }
        match stored_referrer(self.referrals.as_ref()) {
            Ok(Some(stored)) => stored,
            Ok(None) => Address::ZERO.to_string(),
            Err(err) => {
                warn!(error = %err, "could not read stored referral code");
                Address::ZERO.to_string()
            }
        }
    }

    async fn execute(
        &self,
        account: Address,
        call: WriteCall,
        cascade: &[Refresh],
    ) -> Result<Receipt, WriteError> {
        let function = call.function_name();
        let Some(_guard) = WriteGuard::acquire(self.store()) else {
            warn!(function, "rejected: another transaction is pending");
            return Err(WriteError::Busy);
        };

        info!(function, %account, "submitting transaction");
        let tx_hash = self.writer.submit(call).await.map_err(|err| {
            warn!(function, error = %err, "submission failed");
            WriteError::Remote(err)
        })?;
        debug!(function, tx = %tx_hash, "awaiting confirmation");

        let receipt = self.await_confirmation(function, &tx_hash).await?;
        info!(
            function,
            tx = %receipt.tx_hash,
            block = receipt.block_number,
            "transaction confirmed"
        );
        if self.store().account() != Some(account) {
            debug!(%account, "adopting session account in store");
            self.store().set_account(Some(account));
        }
        self.cascade(account, cascade).await;
        Ok(receipt)
    }

    async fn await_confirmation(
        &self,
        function: &'static str,
        tx_hash: &TxHash,
    ) -> Result<Receipt, WriteError> {
        let waited = self.config.confirmation_timeout;
        let confirmation = time::timeout(waited, self.writer.wait_for_confirmation(tx_hash));
        tokio::select! {
            res = confirmation => match res {
                Ok(Ok(receipt)) => Ok(receipt),
                Ok(Err(err)) => {
                    warn!(function, tx = %tx_hash, error = %err, "transaction failed");
                    Err(WriteError::Remote(err))
                }
                Err(_) => {
                    warn!(function, tx = %tx_hash, ?waited, "confirmation timed out");
                    Err(WriteError::ConfirmationTimeout { tx: *tx_hash, waited })
                }
            },
            _ = self.shutdown.cancelled() => {
                warn!(function, tx = %tx_hash, "confirmation wait cancelled");
                Err(WriteError::Cancelled { tx: *tx_hash })
            }
        }
    }

    async fn cascade(&self, account: Address, cascade: &[Refresh]) {
        let wants = |refresh: Refresh| cascade.contains(&refresh);
        futures::join!(
            async {
                if wants(Refresh::UserStats) {
                    self.sync.fetch_user_stats(account).await;
                }
            },
            async {
                if wants(Refresh::WalletBalance) {
                    self.sync.fetch_wallet_balance(account).await;
                }
            },
            async {
                if wants(Refresh::ProtocolStats) {
                    self.sync.fetch_protocol_stats().await;
                }
            },
            async {
                if wants(Refresh::CurrentRound) {
                    self.sync.fetch_current_round().await;
                }
            },
        );
    }
}

fn parse_positive(amount: &str) -> Result<Amount, WriteError> {
    let amount = Amount::parse_decimal(amount)?;
    if amount.is_zero() {
        return Err(WriteError::Invalid(
            "Please enter a valid amount: must be greater than zero".to_string(),
        ));
    }
    Ok(amount)
}

/// Largest deposit that still leaves [`gas_reserve`] in the wallet.
pub fn max_deposit(balance: Amount) -> Amount {
    balance.saturating_sub(gas_reserve())
}

/// Everything currently deposited, if known.
pub fn max_withdraw(snapshot: &StoreSnapshot) -> Option<Amount> {
    snapshot.user_stats.as_ref().map(|stats| stats.deposited)
}
