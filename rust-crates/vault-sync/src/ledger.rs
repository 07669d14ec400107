//! Boundary with the remote vault contract.
//!
//! The read side mirrors the contract's view functions and hands back loosely
//! typed [`Token`] lists; shaping them into entities is the synchronizer's job.
//! The write side submits a [`WriteCall`] and separately waits for inclusion.

use crate::{
    address::{
        Address,
        TxHash,
    },
    amount::Amount,
};
use primitive_types::U256;
use std::future::Future;
use thiserror::Error;

/// A single decoded value returned by a contract view.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Token {
    Uint(U256),
    Bool(bool),
    Address(Address),
    Array(Vec<Token>),
}

impl Token {
    pub fn uint(value: impl Into<U256>) -> Self {
        Token::Uint(value.into())
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Token::Uint(value) => Some(*value),
            _ => None,
        }
    }

    /// The contract ABI encodes booleans as a word, so a `Uint` of 0 or 1 is accepted too.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Token::Bool(value) => Some(*value),
            Token::Uint(value) if value.is_zero() => Some(false),
            Token::Uint(value) if *value == U256::one() => Some(true),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Token::Address(address) => Some(*address),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Token]> {
        match self {
            Token::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Failure reported by the remote side. `Display` is the remote message, untouched.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{message}")]
pub struct RemoteError {
    message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Every state-mutating contract call, with arguments already in ledger encoding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WriteCall {
    /// `referrer` is passed through as text; the remote side decides if it is a valid address.
    Deposit { referrer: String, value: Amount },
    Withdraw { amount: Amount },
    ClaimRewards,
    FinalizeLottery,
    CreateCircle {
        name: String,
        target_amount: Amount,
        duration_days: U256,
        max_members: U256,
    },
    JoinCircle { circle_id: U256 },
    ContributeToCircle { circle_id: U256, value: Amount },
    WithdrawFromCircle { circle_id: U256 },
}

impl WriteCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            WriteCall::Deposit { .. } => "deposit",
            WriteCall::Withdraw { .. } => "withdraw",
            WriteCall::ClaimRewards => "claimRewards",
            WriteCall::FinalizeLottery => "finalizeLottery",
            WriteCall::CreateCircle { .. } => "createCircle",
            WriteCall::JoinCircle { .. } => "joinCircle",
            WriteCall::ContributeToCircle { .. } => "contributeToCircle",
            WriteCall::WithdrawFromCircle { .. } => "withdrawFromCircle",
        }
    }

    /// Native value attached to the call, if it is payable.
    pub fn value(&self) -> Option<Amount> {
        match self {
            WriteCall::Deposit { value, .. } | WriteCall::ContributeToCircle { value, .. } => {
                Some(*value)
            }
            _ => None,
        }
    }
}

/// Durable inclusion of a submitted write.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

pub trait LedgerReader: Send + Sync + 'static {
    /// `getUserStats(address)`
    fn get_user_stats(
        &self,
        account: &Address,
    ) -> impl Future<Output = Result<Vec<Token>, RemoteError>> + Send;

    /// `getProtocolStats()`
    fn get_protocol_stats(
        &self,
    ) -> impl Future<Output = Result<Vec<Token>, RemoteError>> + Send;

    /// `getCurrentRound()`
    fn get_current_round(
        &self,
    ) -> impl Future<Output = Result<Vec<Token>, RemoteError>> + Send;

    /// `getLeaderboard()`: two parallel arrays, addresses then amounts.
    fn get_leaderboard(
        &self,
    ) -> impl Future<Output = Result<Vec<Token>, RemoteError>> + Send;

    /// Native balance of an account, used to pre-check deposits.
    fn get_balance(
        &self,
        account: &Address,
    ) -> impl Future<Output = Result<Amount, RemoteError>> + Send;
}

pub trait LedgerWriter: Send + Sync + 'static {
    /// The account writes are signed for, or `None` without an authenticated session.
    fn session(&self) -> Option<Address>;

    fn submit(
        &self,
        call: WriteCall,
    ) -> impl Future<Output = Result<TxHash, RemoteError>> + Send;

    fn wait_for_confirmation(
        &self,
        tx_hash: &TxHash,
    ) -> impl Future<Output = Result<Receipt, RemoteError>> + Send;
}
