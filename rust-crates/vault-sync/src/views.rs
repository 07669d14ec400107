//! Presentation values derived from a [`StoreSnapshot`](crate::store::StoreSnapshot).
//!
//! Nothing here holds hidden state or touches the store. [`Countdown`] is the
//! one stateful piece and its state is owned by whoever drives the tick.

use crate::{
    address::Address,
    amount::Amount,
    model::{
        Round,
        UserStats,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use primitive_types::U256;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Achievement {
    pub id: usize,
    pub name: &'static str,
    pub description: &'static str,
}

/// Bit `i` of the on-chain achievement mask unlocks `ACHIEVEMENTS[i]`.
pub const ACHIEVEMENTS: [Achievement; 7] = [
    Achievement {
        id: 0,
        name: "First Deposit",
        description: "Made your first deposit",
    },
    Achievement {
        id: 1,
        name: "Committed",
        description: "Deposited 0.1+ ETH",
    },
    Achievement {
        id: 2,
        name: "Serious",
        description: "Deposited 1+ ETH",
    },
    Achievement {
        id: 3,
        name: "Whale",
        description: "Deposited 10+ ETH",
    },
    Achievement {
        id: 4,
        name: "Influencer",
        description: "Referred 5+ users",
    },
    Achievement {
        id: 5,
        name: "Lottery Winner",
        description: "Won a lottery round",
    },
    Achievement {
        id: 6,
        name: "Circle Creator",
        description: "Created a savings circle",
    },
];

pub fn unlocked_achievements(flags: U256) -> Vec<Achievement> {
    ACHIEVEMENTS
        .iter()
        .filter(|achievement| flags.bit(achievement.id))
        .copied()
        .collect()
}

/// Chance of winning the current round, in hundredths of a percent.
///
/// Can exceed 100% if the inputs are inconsistent; only [`WinChance::bar_percent`]
/// is clamped.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct WinChance {
    hundredths: U256,
}

impl WinChance {
    pub fn new(user_tickets: U256, round_tickets: U256) -> Self {
        if round_tickets.is_zero() {
            return Self::default();
        }
        let ten_thousand = U256::from(10_000u32);
        let hundredths = match user_tickets.checked_mul(ten_thousand) {
            Some(scaled) => {
                let (quotient, remainder) = scaled.div_mod(round_tickets);
                if remainder.saturating_mul(U256::from(2u8)) >= round_tickets {
                    quotient.saturating_add(U256::one())
                } else {
                    quotient
                }
            }
            // only reachable with a ticket count near 2^256
            None => (user_tickets / round_tickets).saturating_mul(ten_thousand),
        };
        Self { hundredths }
    }

    pub fn from_snapshot(user: Option<&UserStats>, round: Option<&Round>) -> Self {
        match (user, round) {
            (Some(user), Some(round)) => Self::new(user.tickets, round.total_tickets),
            _ => Self::default(),
        }
    }

    pub fn hundredths(&self) -> U256 {
        self.hundredths
    }

    /// Whole percent for a progress bar, clamped to `0..=100`.
    pub fn bar_percent(&self) -> u8 {
        let whole = self.hundredths / U256::from(100u8);
        if whole > U256::from(100u8) {
            100
        } else {
            whole.low_u32() as u8
        }
    }
}

impl fmt::Display for WinChance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, fraction) = self.hundredths.div_mod(U256::from(100u8));
        write!(f, "{whole}.{:02}", fraction.low_u32())
    }
}

pub fn win_chance(user_tickets: U256, round_tickets: U256) -> WinChance {
    WinChance::new(user_tickets, round_tickets)
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TimeLeft {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

impl TimeLeft {
    pub fn from_millis(remaining: i64) -> Self {
        if remaining <= 0 {
            return Self::default();
        }
        Self {
            days: (remaining / DAY_MS) as u64,
            hours: ((remaining % DAY_MS) / HOUR_MS) as u64,
            minutes: ((remaining % HOUR_MS) / MINUTE_MS) as u64,
            seconds: ((remaining % MINUTE_MS) / SECOND_MS) as u64,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CountdownState {
    Counting,
    Ended,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CountdownView {
    pub round_id: u64,
    pub state: CountdownState,
    pub time_left: TimeLeft,
}

/// Counts down to the end of one round. Once `Ended` it stays ended until a
/// round with a different id is observed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Countdown {
    round_id: u64,
    end_time: DateTime<Utc>,
    state: CountdownState,
}

impl Countdown {
    pub fn new(round_id: u64, end_time: DateTime<Utc>) -> Self {
        Self {
            round_id,
            end_time,
            state: CountdownState::Counting,
        }
    }

    pub fn for_round(round: &Round) -> Self {
        Self::new(round.id, round.end_time)
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn round_id(&self) -> u64 {
        self.round_id
    }

    /// A refreshed copy of the same round may move the end time; a new round restarts.
    pub fn observe_round(&mut self, round: &Round) {
        if round.id != self.round_id {
            *self = Self::for_round(round);
        } else {
            self.end_time = round.end_time;
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> CountdownView {
        let remaining = (self.end_time - now).num_milliseconds();
        if remaining <= 0 {
            self.state = CountdownState::Ended;
        }
        let time_left = match self.state {
            CountdownState::Ended => TimeLeft::default(),
            CountdownState::Counting => TimeLeft::from_millis(remaining),
        };
        CountdownView {
            round_id: self.round_id,
            state: self.state,
            time_left,
        }
    }

    /// Finalizing is offered exactly when the round has ended but is not yet finalized.
    pub fn can_finalize(&self, round: &Round) -> bool {
        round.id == self.round_id && self.state == CountdownState::Ended && !round.finalized
    }
}

/// Four decimals, the precision used for every balance on screen.
pub fn format_amount(amount: &Amount) -> String {
    amount.to_fixed(4)
}

/// Link that pre-fills `account` as referrer for whoever opens it.
pub fn referral_link(base_url: &str, account: &Address) -> String {
    format!("{}?ref={}", base_url.trim_end_matches('/'), account)
}
