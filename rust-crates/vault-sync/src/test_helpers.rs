//! In-memory stand-ins for the remote vault contract.

use crate::{
    address::{
        Address,
        TxHash,
    },
    amount::Amount,
    ledger::{
        LedgerReader,
        LedgerWriter,
        Receipt,
        RemoteError,
        Token,
        WriteCall,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use primitive_types::U256;
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    future::pending,
    sync::{
        Arc,
        Mutex,
    },
};
use tokio::sync::Semaphore;

pub const GET_USER_STATS: &str = "getUserStats";
pub const GET_PROTOCOL_STATS: &str = "getProtocolStats";
pub const GET_CURRENT_ROUND: &str = "getCurrentRound";
pub const GET_LEADERBOARD: &str = "getLeaderboard";
pub const GET_BALANCE: &str = "getBalance";

type Response = Result<Vec<Token>, RemoteError>;

fn unset(view: &str) -> Response {
    Err(RemoteError::new(format!("{view} not configured")))
}

struct FakeLedgerState {
    session: Option<Address>,
    user_stats: HashMap<Address, Response>,
    protocol_stats: Response,
    current_round: Response,
    leaderboard: Response,
    balance: Result<Amount, RemoteError>,
    hanging: HashSet<&'static str>,
    reads: Vec<&'static str>,
    submitted: Vec<WriteCall>,
    submit_error: Option<RemoteError>,
    confirm_error: Option<RemoteError>,
    hold_confirmations: bool,
    tx_counter: u8,
}

/// Fake contract implementing both the read and the write side.
///
/// Reads return whatever was configured last; writes are recorded and, unless
/// [`hold_confirmations`](FakeLedger::hold_confirmations) was called, confirm
/// immediately.
#[derive(Clone)]
pub struct FakeLedger {
    state: Arc<Mutex<FakeLedgerState>>,
    confirmations: Arc<Semaphore>,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeLedgerState {
                session: None,
                user_stats: HashMap::new(),
                protocol_stats: unset(GET_PROTOCOL_STATS),
                current_round: unset(GET_CURRENT_ROUND),
                leaderboard: unset(GET_LEADERBOARD),
                balance: Ok(Amount::from_units(1_000)),
                hanging: HashSet::new(),
                reads: Vec::new(),
                submitted: Vec::new(),
                submit_error: None,
                confirm_error: None,
                hold_confirmations: false,
                tx_counter: 0,
            })),
            confirmations: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn with_session(self, account: Address) -> Self {
        self.state.lock().unwrap().session = Some(account);
        self
    }

    pub fn set_session(&self, account: Option<Address>) {
        self.state.lock().unwrap().session = account;
    }

    pub fn set_user_stats(&self, account: Address, tokens: Vec<Token>) {
        self.state.lock().unwrap().user_stats.insert(account, Ok(tokens));
    }

    pub fn fail_user_stats(&self, account: Address, message: &str) {
        self.state
            .lock()
            .unwrap()
            .user_stats
            .insert(account, Err(RemoteError::new(message)));
    }

    pub fn set_protocol_stats(&self, tokens: Vec<Token>) {
        self.state.lock().unwrap().protocol_stats = Ok(tokens);
    }

    pub fn fail_protocol_stats(&self, message: &str) {
        self.state.lock().unwrap().protocol_stats = Err(RemoteError::new(message));
    }

    pub fn set_current_round(&self, tokens: Vec<Token>) {
        self.state.lock().unwrap().current_round = Ok(tokens);
    }

    pub fn fail_current_round(&self, message: &str) {
        self.state.lock().unwrap().current_round = Err(RemoteError::new(message));
    }

    pub fn set_leaderboard(&self, tokens: Vec<Token>) {
        self.state.lock().unwrap().leaderboard = Ok(tokens);
    }

    pub fn set_balance(&self, balance: Result<Amount, RemoteError>) {
        self.state.lock().unwrap().balance = balance;
    }

    /// The named view never answers until the caller gives up on it.
    pub fn hang(&self, view: &'static str) {
        self.state.lock().unwrap().hanging.insert(view);
    }

    pub fn unhang(&self, view: &'static str) {
        self.state.lock().unwrap().hanging.remove(view);
    }

    pub fn fail_submit(&self, message: &str) {
        self.state.lock().unwrap().submit_error = Some(RemoteError::new(message));
    }

    pub fn fail_confirmation(&self, message: &str) {
        self.state.lock().unwrap().confirm_error = Some(RemoteError::new(message));
    }

    /// Confirmations block until [`release_confirmation`](Self::release_confirmation).
    pub fn hold_confirmations(&self) {
        self.state.lock().unwrap().hold_confirmations = true;
    }

    pub fn release_confirmation(&self) {
        self.confirmations.add_permits(1);
    }

    pub fn submitted(&self) -> Vec<WriteCall> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn reads(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().reads.clone()
    }

    pub fn clear_reads(&self) {
        self.state.lock().unwrap().reads.clear();
    }

    fn begin_read(&self, view: &'static str) -> bool {
        let mut state = self.state.lock().unwrap();
        state.reads.push(view);
        state.hanging.contains(view)
    }

    async fn respond(
        &self,
        view: &'static str,
        pick: impl FnOnce(&FakeLedgerState) -> Response,
    ) -> Response {
        if self.begin_read(view) {
            return pending().await;
        }
        let state = self.state.lock().unwrap();
        pick(&state)
    }
}

impl LedgerReader for FakeLedger {
    async fn get_user_stats(&self, account: &Address) -> Result<Vec<Token>, RemoteError> {
        let account = *account;
        self.respond(GET_USER_STATS, |state| {
            state
                .user_stats
                .get(&account)
                .cloned()
                .unwrap_or_else(|| unset(GET_USER_STATS))
        })
        .await
    }

    async fn get_protocol_stats(&self) -> Result<Vec<Token>, RemoteError> {
        self.respond(GET_PROTOCOL_STATS, |state| state.protocol_stats.clone())
            .await
    }

    async fn get_current_round(&self) -> Result<Vec<Token>, RemoteError> {
        self.respond(GET_CURRENT_ROUND, |state| state.current_round.clone())
            .await
    }

    async fn get_leaderboard(&self) -> Result<Vec<Token>, RemoteError> {
        self.respond(GET_LEADERBOARD, |state| state.leaderboard.clone())
            .await
    }

    async fn get_balance(&self, _account: &Address) -> Result<Amount, RemoteError> {
        if self.begin_read(GET_BALANCE) {
            return pending().await;
        }
        self.state.lock().unwrap().balance.clone()
    }
}

impl LedgerWriter for FakeLedger {
    fn session(&self) -> Option<Address> {
        self.state.lock().unwrap().session
    }

    async fn submit(&self, call: WriteCall) -> Result<TxHash, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push(call);
        if let Some(err) = state.submit_error.clone() {
            return Err(err);
        }
        state.tx_counter = state.tx_counter.wrapping_add(1);
        Ok(TxHash::new([state.tx_counter; 32]))
    }

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<Receipt, RemoteError> {
        let hold = self.state.lock().unwrap().hold_confirmations;
        if hold {
            let permit = self
                .confirmations
                .acquire()
                .await
                .map_err(|_| RemoteError::new("confirmation source closed"))?;
            permit.forget();
        }
        if let Some(err) = self.state.lock().unwrap().confirm_error.clone() {
            return Err(err);
        }
        Ok(Receipt {
            tx_hash: *tx_hash,
            block_number: 1,
        })
    }
}

pub fn user_stats_tokens(deposited: Amount, tickets: u64, achievement_flags: U256) -> Vec<Token> {
    vec![
        Token::Uint(deposited.raw()),
        Token::uint(tickets),
        Token::uint(0u64),
        Token::uint(0u64),
        Token::uint(0u64),
        Token::uint(0u64),
        Token::Uint(achievement_flags),
    ]
}

pub fn protocol_stats_tokens(total_users: u64, total_deposits: Amount) -> Vec<Token> {
    vec![
        Token::uint(total_users),
        Token::Uint(total_deposits.raw()),
        Token::uint(0u64),
        Token::uint(0u64),
        Token::uint(0u64),
        Token::uint(0u64),
        Token::uint(0u64),
    ]
}

pub fn round_tokens(
    id: u64,
    end_time: DateTime<Utc>,
    total_tickets: u64,
    finalized: bool,
) -> Vec<Token> {
    let end = end_time.timestamp().max(0) as u64;
    vec![
        Token::uint(id),
        Token::uint(end.saturating_sub(7 * 24 * 60 * 60)),
        Token::uint(end),
        Token::uint(total_tickets),
        Token::uint(0u64),
        Token::Bool(finalized),
    ]
}

pub fn leaderboard_tokens(rows: &[(Address, u64)]) -> Vec<Token> {
    vec![
        Token::Array(rows.iter().map(|(a, _)| Token::Address(*a)).collect()),
        Token::Array(rows.iter().map(|(_, v)| Token::uint(*v)).collect()),
    ]
}
