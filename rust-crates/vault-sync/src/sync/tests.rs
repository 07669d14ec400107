#![allow(non_snake_case)]

use super::*;
use crate::{
    amount::Amount,
    model::LeaderboardEntry,
    shutdown::shutdown_channel,
    test_helpers::*,
};
use chrono::Utc;
use primitive_types::U256;
use std::time::Duration;

fn synchronizer(ledger: &FakeLedger) -> ReadSynchronizer<FakeLedger> {
    ReadSynchronizer::new(Arc::new(ledger.clone()), Store::new(), Shutdown::never())
}

#[tokio::test]
async fn fetch_user_stats__success__replaces_entity() {
    // given
    let ledger = FakeLedger::new();
    let alice = Address::repeat_byte(0xa1);
    ledger.set_user_stats(alice, user_stats_tokens(Amount::from_units(2), 40, U256::from(5u8)));
    let sync = synchronizer(&ledger);
    sync.store().set_account(Some(alice));

    // when
    sync.fetch_user_stats(alice).await;

    // then
    let stats = sync.store().snapshot().user_stats.unwrap();
    assert_eq!(stats.deposited, Amount::from_units(2));
    assert_eq!(stats.tickets, U256::from(40u8));
    assert_eq!(stats.achievement_flags, U256::from(5u8));
}

#[tokio::test]
async fn fetch_user_stats__remote_failure__keeps_existing_entity() {
    // given
    let ledger = FakeLedger::new();
    let alice = Address::repeat_byte(0xa1);
    ledger.set_user_stats(alice, user_stats_tokens(Amount::from_units(2), 40, U256::zero()));
    let sync = synchronizer(&ledger);
    sync.store().set_account(Some(alice));
    sync.fetch_user_stats(alice).await;
    let before = sync.store().snapshot();

    // when
    ledger.fail_user_stats(alice, "connection reset");
    sync.fetch_user_stats(alice).await;

    // then
    assert_eq!(sync.store().snapshot(), before);
}

#[tokio::test]
async fn fetch_user_stats__short_tuple__keeps_existing_entity() {
    // given
    let ledger = FakeLedger::new();
    let alice = Address::repeat_byte(0xa1);
    ledger.set_user_stats(alice, user_stats_tokens(Amount::from_units(1), 1, U256::zero()));
    let sync = synchronizer(&ledger);
    sync.store().set_account(Some(alice));
    sync.fetch_user_stats(alice).await;
    let before = sync.store().snapshot().user_stats;

    // when
    let mut short = user_stats_tokens(Amount::from_units(9), 9, U256::zero());
    short.pop();
    ledger.set_user_stats(alice, short);
    sync.fetch_user_stats(alice).await;

    // then
    assert_eq!(sync.store().snapshot().user_stats, before);
}

#[tokio::test]
async fn refresh_all__user_failure__does_not_stop_protocol_stats() {
    // given
    let ledger = FakeLedger::new();
    let alice = Address::repeat_byte(0xa1);
    ledger.fail_user_stats(alice, "boom");
    ledger.set_protocol_stats(protocol_stats_tokens(12, Amount::from_units(30)));
    let sync = synchronizer(&ledger);
    sync.store().set_account(Some(alice));

    // when
    sync.refresh_all(Some(alice)).await;

    // then
    let snapshot = sync.store().snapshot();
    assert_eq!(snapshot.user_stats, None);
    let protocol = snapshot.protocol_stats.unwrap();
    assert_eq!(protocol.total_users, 12);
    assert_eq!(protocol.total_deposits, Amount::from_units(30));
}

#[tokio::test]
async fn refresh_all__without_account__skips_user_view() {
    let ledger = FakeLedger::new();
    let sync = synchronizer(&ledger);

    sync.refresh_all(None).await;

    let reads = ledger.reads();
    assert!(!reads.contains(&GET_USER_STATS));
    assert!(reads.contains(&GET_PROTOCOL_STATS));
    assert!(reads.contains(&GET_CURRENT_ROUND));
    assert!(reads.contains(&GET_LEADERBOARD));
}

#[tokio::test]
async fn refresh_all__slow_view__does_not_delay_other_views() {
    // given
    let ledger = FakeLedger::new();
    ledger.hang(GET_LEADERBOARD);
    ledger.set_protocol_stats(protocol_stats_tokens(1, Amount::ZERO));
    let (trigger, shutdown) = shutdown_channel();
    let sync = ReadSynchronizer::new(Arc::new(ledger.clone()), Store::new(), shutdown);
    let mut changes = sync.store().subscribe();

    // when
    let task = tokio::spawn({
        let sync = sync.clone();
        async move { sync.refresh_all(None).await }
    });

    // then
    tokio::time::timeout(
        Duration::from_secs(5),
        changes.wait_for(|s| s.protocol_stats.is_some()),
    )
    .await
    .expect("protocol stats should land while the leaderboard hangs")
    .unwrap();
    assert!(!task.is_finished());
    trigger.trigger();
    task.await.unwrap();
    assert!(sync.store().snapshot().leaderboard.is_empty());
}

#[tokio::test(start_paused = true)]
async fn fetch_leaderboard__no_response__gives_up_after_read_timeout() {
    // given
    let ledger = FakeLedger::new();
    ledger.hang(GET_LEADERBOARD);
    let sync = synchronizer(&ledger).with_read_timeout(Duration::from_secs(3));

    // when
    let started = tokio::time::Instant::now();
    sync.fetch_leaderboard().await;

    // then
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(sync.store().snapshot().leaderboard.is_empty());
}

#[tokio::test(start_paused = true)]
async fn fetch_wallet_balance__no_response__keeps_previous_balance() {
    // given
    let ledger = FakeLedger::new();
    let alice = Address::repeat_byte(0xa1);
    let sync = synchronizer(&ledger).with_read_timeout(Duration::from_secs(3));
    sync.store().set_account(Some(alice));
    sync.fetch_wallet_balance(alice).await;
    let before = sync.store().snapshot();

    // when
    ledger.hang(GET_BALANCE);
    ledger.set_balance(Ok(Amount::from_units(1)));
    sync.fetch_wallet_balance(alice).await;

    // then
    assert_eq!(sync.store().snapshot(), before);
    assert_eq!(before.wallet_balance, Some(Amount::from_units(1_000)));
}

#[tokio::test]
async fn fetch_leaderboard__filters_sentinel_and_preserves_order() {
    // given
    let ledger = FakeLedger::new();
    let a = Address::repeat_byte(0x0a);
    let b = Address::repeat_byte(0x0b);
    ledger.set_leaderboard(leaderboard_tokens(&[(Address::ZERO, 5), (a, 3), (b, 1)]));
    let sync = synchronizer(&ledger);

    // when
    sync.fetch_leaderboard().await;

    // then
    assert_eq!(
        sync.store().snapshot().leaderboard,
        vec![
            LeaderboardEntry {
                address: a,
                deposited: Amount::from_raw(U256::from(3u8)),
            },
            LeaderboardEntry {
                address: b,
                deposited: Amount::from_raw(U256::from(1u8)),
            },
        ]
    );
}

#[tokio::test]
async fn fetch_current_round__success__stores_round() {
    let ledger = FakeLedger::new();
    let end = Utc::now() + chrono::Duration::days(2);
    ledger.set_current_round(round_tokens(7, end, 100, false));
    let sync = synchronizer(&ledger);

    sync.fetch_current_round().await;

    let round = sync.store().snapshot().current_round.unwrap();
    assert_eq!(round.id, 7);
    assert_eq!(round.end_time.timestamp(), end.timestamp());
    assert!(!round.finalized);
}

#[tokio::test]
async fn fetch_protocol_stats__after_shutdown__leaves_store_untouched() {
    // given
    let ledger = FakeLedger::new();
    ledger.hang(GET_PROTOCOL_STATS);
    let (trigger, shutdown) = shutdown_channel();
    let sync = ReadSynchronizer::new(Arc::new(ledger.clone()), Store::new(), shutdown);

    // when
    trigger.trigger();
    sync.fetch_protocol_stats().await;

    // then
    assert_eq!(sync.store().snapshot().protocol_stats, None);
}
