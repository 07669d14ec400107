#![allow(non_snake_case)]

use primitive_types::U256;
use proptest::prelude::*;
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::runtime::Builder;
use vault_sync::{
    Address,
    Amount,
    ExecutorConfig,
    ReadSynchronizer,
    Shutdown,
    Store,
    TransactionExecutor,
    WriteCall,
    WriteError,
    executor::max_deposit,
    referral::MemoryStorage,
    test_helpers::*,
};

type Executor = TransactionExecutor<FakeLedger, FakeLedger, MemoryStorage>;

fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

fn executor(ledger: &FakeLedger) -> Executor {
    let ledger = Arc::new(ledger.clone());
    let sync = ReadSynchronizer::new(ledger.clone(), Store::new(), Shutdown::never());
    TransactionExecutor::new(
        sync,
        ledger,
        Arc::new(MemoryStorage::new()),
        ExecutorConfig::default(),
        Shutdown::never(),
    )
}

#[tokio::test]
async fn writes__one_in_flight__every_other_kind_is_busy() {
    // given
    let ledger = FakeLedger::new().with_session(alice());
    ledger.hold_confirmations();
    let executor = executor(&ledger);
    let mut changes = executor.store().subscribe();
    let first = tokio::spawn({
        let executor = executor.clone();
        async move { executor.claim_rewards().await }
    });
    changes.wait_for(|s| s.pending_write).await.unwrap();

    // when
    let attempts = vec![
        executor.deposit("1", None).await,
        executor.withdraw("1").await,
        executor.finalize_lottery().await,
        executor.create_circle("Trip", "3", 10, 4).await,
        executor.join_circle(1).await,
        executor.contribute_to_circle(1, "0.1").await,
        executor.withdraw_from_circle(1).await,
    ];

    // then
    for attempt in attempts {
        assert!(matches!(attempt, Err(WriteError::Busy)), "{attempt:?}");
    }
    assert_eq!(ledger.submitted(), vec![WriteCall::ClaimRewards]);

    ledger.release_confirmation();
    first.await.unwrap().unwrap();
    assert!(!executor.store().snapshot().pending_write);

    ledger.release_confirmation();
    executor.deposit("1", None).await.unwrap();
    assert_eq!(ledger.submitted().len(), 2);
}

#[tokio::test]
async fn deposit__confirmed__store_reflects_new_position() {
    // given
    let ledger = FakeLedger::new().with_session(alice());
    let executor = executor(&ledger);
    ledger.set_user_stats(
        alice(),
        user_stats_tokens(Amount::from_units(2), 200, U256::one()),
    );
    ledger.set_protocol_stats(protocol_stats_tokens(1, Amount::from_units(2)));
    ledger.set_current_round(round_tokens(
        1,
        chrono::Utc::now() + chrono::Duration::days(6),
        400,
        false,
    ));

    // when
    executor.deposit("2", None).await.unwrap();

    // then
    let snapshot = executor.store().snapshot();
    let stats = snapshot.user_stats.clone().unwrap();
    assert_eq!(stats.deposited, Amount::from_units(2));
    assert_eq!(
        vault_sync::views::WinChance::from_snapshot(Some(&stats), snapshot.current_round.as_ref())
            .to_string(),
        "50.00"
    );
    assert_eq!(
        vault_sync::views::unlocked_achievements(stats.achievement_flags)[0].name,
        "First Deposit"
    );
}

#[tokio::test(start_paused = true)]
async fn deposit__never_confirmed__times_out_and_unlocks() {
    // given
    let ledger = FakeLedger::new().with_session(alice());
    ledger.hold_confirmations();
    let executor = executor(&ledger);

    // when
    let started = tokio::time::Instant::now();
    let result = executor.deposit("1", None).await;

    // then
    assert!(matches!(result, Err(WriteError::ConfirmationTimeout { .. })));
    assert!(started.elapsed() >= Duration::from_secs(120));
    assert!(!executor.store().snapshot().pending_write);
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn deposit__amount_against_balance__only_affordable_amounts_are_submitted(
        balance in 1u64..1_000_000,
        requested in 1u64..2_000_000,
    ) {
        let rt = Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            // given
            let ledger = FakeLedger::new().with_session(alice());
            let wallet = Amount::from_raw(U256::from(balance) * U256::exp10(12));
            ledger.set_balance(Ok(wallet));
            let executor = executor(&ledger);
            executor.store().set_account(Some(alice()));
            executor.store().set_wallet_balance(&alice(), wallet);
            let amount = Amount::from_raw(U256::from(requested) * U256::exp10(12));

            // when
            let result = executor.deposit(&amount.to_string(), None).await;

            // then
            if amount <= wallet {
                prop_assert!(result.is_ok());
                prop_assert_eq!(ledger.submitted().len(), 1);
                prop_assert_eq!(ledger.submitted()[0].value(), Some(amount));
            } else {
                let is_insufficient = matches!(result, Err(WriteError::InsufficientBalance { .. }));
                prop_assert!(is_insufficient);
                prop_assert!(ledger.submitted().is_empty());
            }
            prop_assert!(max_deposit(wallet) <= wallet);
            Ok(())
        })?;
    }
}
