use crate::{
    address::Address,
    amount::Amount,
    ledger::Token,
};
use chrono::{
    DateTime,
    Utc,
};
use primitive_types::U256;
use thiserror::Error;

/// Number of leaderboard rows kept in the read model.
pub const LEADERBOARD_CAP: usize = 20;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DecodeError {
    #[error("{view}: expected at least {expected} values, got {actual}")]
    Arity {
        view: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{view}: value {index} has an unexpected type")]
    Kind { view: &'static str, index: usize },
    #[error("{view}: value {index} does not fit in 64 bits")]
    Overflow { view: &'static str, index: usize },
    #[error("{view}: value {index} is not a valid timestamp")]
    Timestamp { view: &'static str, index: usize },
    #[error("getLeaderboard: {addresses} addresses but only {amounts} amounts")]
    LeaderboardLength { addresses: usize, amounts: usize },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserStats {
    pub deposited: Amount,
    pub tickets: U256,
    pub total_winnings: Amount,
    pub referral_earnings: Amount,
    pub pending_rewards: Amount,
    pub referral_count: u64,
    pub achievement_flags: U256,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProtocolStats {
    pub total_users: u64,
    pub total_deposits: Amount,
    pub total_tickets: U256,
    pub total_protocol_fees: Amount,
    pub total_prizes_distributed: Amount,
    pub total_circles: u64,
    pub current_prize_pool: Amount,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Round {
    pub id: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_tickets: U256,
    pub prize_pool: Amount,
    pub finalized: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaderboardEntry {
    pub address: Address,
    pub deposited: Amount,
}

struct Fields<'a> {
    view: &'static str,
    tokens: &'a [Token],
}

impl<'a> Fields<'a> {
    fn new(
        view: &'static str,
        tokens: &'a [Token],
        expected: usize,
    ) -> Result<Self, DecodeError> {
        if tokens.len() < expected {
            return Err(DecodeError::Arity {
                view,
                expected,
                actual: tokens.len(),
            });
        }
        Ok(Self { view, tokens })
    }

    fn uint(&self, index: usize) -> Result<U256, DecodeError> {
        self.tokens[index].as_uint().ok_or(DecodeError::Kind {
            view: self.view,
            index,
        })
    }

    fn amount(&self, index: usize) -> Result<Amount, DecodeError> {
        self.uint(index).map(Amount::from_raw)
    }

    fn count(&self, index: usize) -> Result<u64, DecodeError> {
        let value = self.uint(index)?;
        if value > U256::from(u64::MAX) {
            return Err(DecodeError::Overflow {
                view: self.view,
                index,
            });
        }
        Ok(value.low_u64())
    }

    fn timestamp(&self, index: usize) -> Result<DateTime<Utc>, DecodeError> {
        let seconds = self.count(index)?;
        i64::try_from(seconds)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or(DecodeError::Timestamp {
                view: self.view,
                index,
            })
    }

    fn boolean(&self, index: usize) -> Result<bool, DecodeError> {
        self.tokens[index].as_bool().ok_or(DecodeError::Kind {
            view: self.view,
            index,
        })
    }

    fn array(&self, index: usize) -> Result<&'a [Token], DecodeError> {
        self.tokens[index].as_array().ok_or(DecodeError::Kind {
            view: self.view,
            index,
        })
    }
}

impl UserStats {
    pub fn from_tokens(tokens: &[Token]) -> Result<Self, DecodeError> {
        let fields = Fields::new("getUserStats", tokens, 7)?;
        Ok(Self {
            deposited: fields.amount(0)?,
            tickets: fields.uint(1)?,
            total_winnings: fields.amount(2)?,
            referral_earnings: fields.amount(3)?,
            pending_rewards: fields.amount(4)?,
            referral_count: fields.count(5)?,
            achievement_flags: fields.uint(6)?,
        })
    }
}

impl ProtocolStats {
    pub fn from_tokens(tokens: &[Token]) -> Result<Self, DecodeError> {
        let fields = Fields::new("getProtocolStats", tokens, 7)?;
        Ok(Self {
            total_users: fields.count(0)?,
            total_deposits: fields.amount(1)?,
            total_tickets: fields.uint(2)?,
            total_protocol_fees: fields.amount(3)?,
            total_prizes_distributed: fields.amount(4)?,
            total_circles: fields.count(5)?,
            current_prize_pool: fields.amount(6)?,
        })
    }
}

impl Round {
    pub fn from_tokens(tokens: &[Token]) -> Result<Self, DecodeError> {
        let fields = Fields::new("getCurrentRound", tokens, 6)?;
        Ok(Self {
            id: fields.count(0)?,
            start_time: fields.timestamp(1)?,
            end_time: fields.timestamp(2)?,
            total_tickets: fields.uint(3)?,
            prize_pool: fields.amount(4)?,
            finalized: fields.boolean(5)?,
        })
    }
}

/// Zips the two arrays of `getLeaderboard`, drops the zero-address padding and
/// keeps the first [`LEADERBOARD_CAP`] rows in the order the contract returned.
pub fn leaderboard_from_tokens(
    tokens: &[Token],
) -> Result<Vec<LeaderboardEntry>, DecodeError> {
    let fields = Fields::new("getLeaderboard", tokens, 2)?;
    let addresses = fields.array(0)?;
    let amounts = fields.array(1)?;
    if amounts.len() != addresses.len() {
        return Err(DecodeError::LeaderboardLength {
            addresses: addresses.len(),
            amounts: amounts.len(),
        });
    }

    let mut entries = Vec::with_capacity(LEADERBOARD_CAP);
    for (index, (address, amount)) in addresses.iter().zip(amounts).enumerate() {
        let kind = DecodeError::Kind {
            view: "getLeaderboard",
            index,
        };
        let address = address.as_address().ok_or(kind.clone())?;
        let deposited = amount.as_uint().map(Amount::from_raw).ok_or(kind)?;
        if address.is_zero() {
            continue;
        }
        if entries.len() < LEADERBOARD_CAP {
            entries.push(LeaderboardEntry { address, deposited });
        }
    }
    Ok(entries)
}
