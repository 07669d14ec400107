use crate::{
    address::Address,
    amount::Amount,
    model::{
        LEADERBOARD_CAP,
        LeaderboardEntry,
        ProtocolStats,
        Round,
        UserStats,
    },
};
use std::sync::Arc;
use tokio::sync::watch;

/// Immutable view of everything the client knows about the ledger.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoreSnapshot {
    pub account: Option<Address>,
    pub user_stats: Option<UserStats>,
    /// Native balance of `account`, used to bound deposits.
    pub wallet_balance: Option<Amount>,
    pub protocol_stats: Option<ProtocolStats>,
    pub current_round: Option<Round>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub pending_write: bool,
}

impl StoreSnapshot {
    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }
}

/// Shared read model. Entities are only ever replaced whole; readers get owned
/// snapshots and can [`subscribe`](Store::subscribe) to be woken on change.
#[derive(Clone, Debug)]
pub struct Store {
    state: Arc<watch::Sender<StoreSnapshot>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let (state, _) = watch::channel(StoreSnapshot::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.state.subscribe()
    }

    pub fn account(&self) -> Option<Address> {
        self.state.borrow().account
    }

    /// Switching to a different account drops the previous account's stats.
    pub fn set_account(&self, account: Option<Address>) {
        self.state.send_if_modified(|state| {
            if state.account == account {
                return false;
            }
            state.account = account;
            state.user_stats = None;
            state.wallet_balance = None;
            true
        });
    }

    pub fn disconnect(&self) {
        self.set_account(None);
    }

    /// Returns `false` (and changes nothing) when `account` is no longer current.
    pub fn set_user_stats(&self, account: &Address, stats: UserStats) -> bool {
        self.state.send_if_modified(|state| {
            if state.account.as_ref() != Some(account) {
                return false;
            }
            state.user_stats = Some(stats);
            true
        })
    }

    pub fn set_wallet_balance(&self, account: &Address, balance: Amount) -> bool {
        self.state.send_if_modified(|state| {
            if state.account.as_ref() != Some(account) {
                return false;
            }
            state.wallet_balance = Some(balance);
            true
        })
    }

    pub fn set_protocol_stats(&self, stats: ProtocolStats) {
        self.state
            .send_if_modified(|state| replace(&mut state.protocol_stats, Some(stats)));
    }

    pub fn set_current_round(&self, round: Round) {
        self.state
            .send_if_modified(|state| replace(&mut state.current_round, Some(round)));
    }

    pub fn set_leaderboard(&self, mut entries: Vec<LeaderboardEntry>) {
        entries.truncate(LEADERBOARD_CAP);
        self.state
            .send_if_modified(|state| replace(&mut state.leaderboard, entries));
    }

    /// Claims the process-wide write slot. Returns `false` when a write is
    /// already pending; every executor sharing this store sees the same slot.
    pub fn try_begin_write(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.pending_write {
                return false;
            }
            state.pending_write = true;
            true
        })
    }

    pub fn end_write(&self) {
        self.state
            .send_if_modified(|state| replace(&mut state.pending_write, false));
    }
}

/// Assigns `value` and reports whether anything changed.
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use primitive_types::U256;

    fn stats(deposited: u64) -> UserStats {
        UserStats {
            deposited: Amount::from_units(deposited),
            tickets: U256::zero(),
            total_winnings: Amount::ZERO,
            referral_earnings: Amount::ZERO,
            pending_rewards: Amount::ZERO,
            referral_count: 0,
            achievement_flags: U256::zero(),
        }
    }

    #[test]
    fn set_user_stats__for_stale_account__is_discarded() {
        // given
        let store = Store::new();
        let alice = Address::repeat_byte(1);
        let bob = Address::repeat_byte(2);
        store.set_account(Some(bob));

        // when
        let applied = store.set_user_stats(&alice, stats(1));

        // then
        assert!(!applied);
        assert_eq!(store.snapshot().user_stats, None);
    }

    #[test]
    fn set_account__to_new_account__clears_user_stats() {
        // given
        let store = Store::new();
        let alice = Address::repeat_byte(1);
        store.set_account(Some(alice));
        store.set_user_stats(&alice, stats(5));

        store.set_wallet_balance(&alice, Amount::from_units(3));

        // when
        store.set_account(Some(Address::repeat_byte(2)));

        // then
        let snapshot = store.snapshot();
        assert_eq!(snapshot.user_stats, None);
        assert_eq!(snapshot.wallet_balance, None);
    }

    #[test]
    fn set_account__same_account__keeps_user_stats() {
        let store = Store::new();
        let alice = Address::repeat_byte(1);
        store.set_account(Some(alice));
        store.set_user_stats(&alice, stats(5));

        store.set_account(Some(alice));

        assert_eq!(store.snapshot().user_stats, Some(stats(5)));
    }

    #[test]
    fn set_leaderboard__longer_than_cap__is_truncated() {
        let store = Store::new();
        let entries = (0..25u8)
            .map(|i| LeaderboardEntry {
                address: Address::repeat_byte(i + 1),
                deposited: Amount::ZERO,
            })
            .collect();

        store.set_leaderboard(entries);

        assert_eq!(store.snapshot().leaderboard.len(), LEADERBOARD_CAP);
    }

    #[test]
    fn try_begin_write__already_pending__is_refused_until_ended() {
        let store = Store::new();

        assert!(store.try_begin_write());
        assert!(!store.try_begin_write());
        assert!(store.snapshot().pending_write);

        store.end_write();
        assert!(!store.snapshot().pending_write);
        assert!(store.try_begin_write());
    }

    #[test]
    fn set_protocol_stats__unchanged_value__does_not_notify() {
        // given
        let store = Store::new();
        let stats = ProtocolStats::from_tokens(&crate::test_helpers::protocol_stats_tokens(
            3,
            Amount::from_units(7),
        ))
        .unwrap();
        store.set_protocol_stats(stats.clone());
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        // when
        store.set_protocol_stats(stats);
        store.set_leaderboard(Vec::new());

        // then
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn subscribe__wakes_on_account_change() {
        // given
        let store = Store::new();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        // when
        store.set_account(Some(Address::repeat_byte(9)));

        // then
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().account, Some(Address::repeat_byte(9)));
    }
}
