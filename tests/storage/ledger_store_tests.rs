//! LedgerStore interface tests.
//!
//! These tests verify the contract of the LedgerStore trait.
//! Each storage implementation should run these tests. Tests share one
//! store, so every test uses its own logins and order numbers.

use loyalty_ledger::ledger::{AccrualStatus, Amount, OrderOwnership, OrderStatus, Verdict};
use loyalty_ledger::storage::{LedgerStore, StorageError, VerdictOutcome};

async fn user<S: LedgerStore>(store: &S, login: &str) {
    store
        .create_user(login, "hash")
        .await
        .expect("create_user should succeed");
}

fn processed(number: &str, points: i64) -> Verdict {
    Verdict::from_accrual(number, AccrualStatus::Processed, Some(Amount::from_points(points)))
}

// =============================================================================
// Users
// =============================================================================

pub async fn test_create_user<S: LedgerStore>(store: &S) {
    user(store, "users_alice").await;

    assert!(store.is_login_taken("users_alice").await.unwrap());
    assert!(!store.is_login_taken("users_nobody").await.unwrap());
    assert_eq!(
        store.password_hash("users_alice").await.unwrap().as_deref(),
        Some("hash")
    );
    assert_eq!(store.password_hash("users_nobody").await.unwrap(), None);

    let balance = store.balance("users_alice").await.unwrap();
    assert_eq!(balance.current, Amount::ZERO);
    assert_eq!(balance.withdrawn, Amount::ZERO);
}

pub async fn test_duplicate_login<S: LedgerStore>(store: &S) {
    user(store, "dup_alice").await;

    let err = store.create_user("dup_alice", "other").await.unwrap_err();
    assert!(
        matches!(err, StorageError::LoginTaken(ref login) if login == "dup_alice"),
        "unexpected error: {err:?}"
    );
    assert_eq!(
        store.password_hash("dup_alice").await.unwrap().as_deref(),
        Some("hash"),
        "original credentials must survive"
    );
}

pub async fn test_balance_unknown_user<S: LedgerStore>(store: &S) {
    let err = store.balance("ghost_user").await.unwrap_err();
    assert!(matches!(err, StorageError::UserNotFound(_)), "unexpected error: {err:?}");
}

// =============================================================================
// Orders
// =============================================================================

pub async fn test_order_ownership<S: LedgerStore>(store: &S) {
    user(store, "own_alice").await;
    user(store, "own_bob").await;

    assert_eq!(
        store.check_order_owner("100001", "own_alice").await.unwrap(),
        OrderOwnership::NotPresent
    );
    assert!(store.store_order("100001", "own_alice").await.unwrap());
    assert!(
        !store.store_order("100001", "own_bob").await.unwrap(),
        "second insert of the same number must not succeed"
    );

    assert_eq!(
        store.order_owner("100001").await.unwrap().as_deref(),
        Some("own_alice")
    );
    assert_eq!(
        store.check_order_owner("100001", "own_alice").await.unwrap(),
        OrderOwnership::OwnedByRequester
    );
    assert_eq!(
        store.check_order_owner("100001", "own_bob").await.unwrap(),
        OrderOwnership::OwnedByOther
    );
    assert!(store.orders("own_bob").await.unwrap().is_empty());
}

pub async fn test_orders_newest_first<S: LedgerStore>(store: &S) {
    user(store, "list_alice").await;
    for number in ["200001", "200002", "200003"] {
        assert!(store.store_order(number, "list_alice").await.unwrap());
    }

    let orders = store.orders("list_alice").await.unwrap();
    let numbers: Vec<_> = orders.iter().map(|o| o.number.as_str()).collect();
    assert_eq!(numbers, ["200003", "200002", "200001"]);
    assert!(orders.iter().all(|o| o.status == OrderStatus::New));
    assert!(orders.iter().all(|o| o.accrual.is_none()));
    assert!(orders[0].uploaded_at >= orders[2].uploaded_at);
}

pub async fn test_unsettled_oldest_first<S: LedgerStore>(store: &S) {
    user(store, "unsettled_alice").await;
    for number in ["300001", "300002", "300003"] {
        store.store_order(number, "unsettled_alice").await.unwrap();
    }
    store
        .apply_verdict(&Verdict::from_accrual("300002", AccrualStatus::Invalid, None))
        .await
        .unwrap();
    store
        .apply_verdict(&Verdict::from_accrual("300003", AccrualStatus::Processing, None))
        .await
        .unwrap();

    let unsettled: Vec<_> = store
        .unsettled_orders()
        .await
        .unwrap()
        .into_iter()
        .filter(|o| o.number.starts_with("3000"))
        .map(|o| (o.number, o.status))
        .collect();
    assert_eq!(
        unsettled,
        [
            ("300001".to_string(), OrderStatus::New),
            ("300003".to_string(), OrderStatus::Processing),
        ]
    );
}

// =============================================================================
// Verdicts
// =============================================================================

pub async fn test_processed_verdict_credits_once<S: LedgerStore>(store: &S) {
    user(store, "credit_alice").await;
    store.store_order("400001", "credit_alice").await.unwrap();

    let verdict = processed("400001", 500);
    assert_eq!(
        store.apply_verdict(&verdict).await.unwrap(),
        VerdictOutcome::Applied {
            credited: Some(Amount::from_points(500))
        }
    );
    assert_eq!(
        store.apply_verdict(&verdict).await.unwrap(),
        VerdictOutcome::Skipped,
        "settled orders must not be credited twice"
    );

    let balance = store.balance("credit_alice").await.unwrap();
    assert_eq!(balance.current, Amount::from_points(500));

    let order = &store.orders("credit_alice").await.unwrap()[0];
    assert_eq!(order.status, OrderStatus::Processed);
    assert_eq!(order.accrual, Some(Amount::from_points(500)));
}

pub async fn test_fractional_accrual<S: LedgerStore>(store: &S) {
    user(store, "frac_alice").await;
    store.store_order("400101", "frac_alice").await.unwrap();

    let verdict = Verdict::from_accrual(
        "400101",
        AccrualStatus::Processed,
        Some(Amount::from_hundredths(72998)),
    );
    store.apply_verdict(&verdict).await.unwrap();

    let balance = store.balance("frac_alice").await.unwrap();
    assert_eq!(balance.current, Amount::from_hundredths(72998));
}

pub async fn test_non_crediting_verdicts<S: LedgerStore>(store: &S) {
    user(store, "nocredit_alice").await;
    store.store_order("400201", "nocredit_alice").await.unwrap();
    store.store_order("400202", "nocredit_alice").await.unwrap();

    assert_eq!(
        store
            .apply_verdict(&Verdict::from_accrual("400201", AccrualStatus::Invalid, None))
            .await
            .unwrap(),
        VerdictOutcome::Applied { credited: None }
    );
    assert_eq!(
        store
            .apply_verdict(&Verdict::from_accrual(
                "400202",
                AccrualStatus::Processed,
                Some(Amount::ZERO)
            ))
            .await
            .unwrap(),
        VerdictOutcome::Applied { credited: None }
    );

    assert_eq!(store.balance("nocredit_alice").await.unwrap().current, Amount::ZERO);
    assert_eq!(
        store
            .apply_verdict(&processed("400201", 10))
            .await
            .unwrap(),
        VerdictOutcome::Skipped,
        "INVALID is terminal"
    );
}

pub async fn test_processing_then_processed<S: LedgerStore>(store: &S) {
    user(store, "progress_alice").await;
    store.store_order("400301", "progress_alice").await.unwrap();

    let processing = Verdict::from_accrual("400301", AccrualStatus::Registered, None);
    assert_eq!(
        store.apply_verdict(&processing).await.unwrap(),
        VerdictOutcome::Applied { credited: None }
    );
    assert_eq!(
        store.apply_verdict(&processing).await.unwrap(),
        VerdictOutcome::Applied { credited: None },
        "PROCESSING may be reported repeatedly"
    );
    assert_eq!(
        store.apply_verdict(&processed("400301", 7)).await.unwrap(),
        VerdictOutcome::Applied {
            credited: Some(Amount::from_points(7))
        }
    );
}

pub async fn test_verdict_for_missing_order<S: LedgerStore>(store: &S) {
    assert_eq!(
        store.apply_verdict(&processed("499999", 10)).await.unwrap(),
        VerdictOutcome::Skipped
    );
}

// =============================================================================
// Withdrawals
// =============================================================================

pub async fn test_withdraw<S: LedgerStore>(store: &S) {
    user(store, "wd_alice").await;
    store.store_order("500001", "wd_alice").await.unwrap();
    store.apply_verdict(&processed("500001", 100)).await.unwrap();

    store
        .withdraw("wd_alice", "2377225624", Amount::from_hundredths(6050))
        .await
        .expect("withdraw should succeed");

    let balance = store.balance("wd_alice").await.unwrap();
    assert_eq!(balance.current, Amount::from_hundredths(3950));
    assert_eq!(balance.withdrawn, Amount::from_hundredths(6050));

    let withdrawals = store.withdrawals("wd_alice").await.unwrap();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].order, "2377225624");
    assert_eq!(withdrawals[0].sum, Amount::from_hundredths(6050));
}

pub async fn test_withdraw_insufficient<S: LedgerStore>(store: &S) {
    user(store, "poor_alice").await;
    store.store_order("500101", "poor_alice").await.unwrap();
    store.apply_verdict(&processed("500101", 10)).await.unwrap();

    let err = store
        .withdraw("poor_alice", "2377225624", Amount::from_points(11))
        .await
        .unwrap_err();
    match err {
        StorageError::InsufficientFunds { balance, requested } => {
            assert_eq!(balance, Amount::from_points(10));
            assert_eq!(requested, Amount::from_points(11));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let balance = store.balance("poor_alice").await.unwrap();
    assert_eq!(balance.current, Amount::from_points(10));
    assert_eq!(balance.withdrawn, Amount::ZERO);
    assert!(store.withdrawals("poor_alice").await.unwrap().is_empty());

    store
        .withdraw("poor_alice", "2377225624", Amount::from_points(10))
        .await
        .expect("withdrawing the exact balance should succeed");
    assert_eq!(store.balance("poor_alice").await.unwrap().current, Amount::ZERO);
}

pub async fn test_withdraw_unknown_user<S: LedgerStore>(store: &S) {
    let err = store
        .withdraw("ghost_withdrawer", "2377225624", Amount::from_points(1))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::UserNotFound(_)), "unexpected error: {err:?}");
}

pub async fn test_withdrawals_newest_first<S: LedgerStore>(store: &S) {
    user(store, "wdlist_alice").await;
    store.store_order("500201", "wdlist_alice").await.unwrap();
    store.apply_verdict(&processed("500201", 100)).await.unwrap();

    for order in ["111", "222", "333"] {
        store
            .withdraw("wdlist_alice", order, Amount::from_points(1))
            .await
            .unwrap();
    }

    let orders: Vec<_> = store
        .withdrawals("wdlist_alice")
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.order)
        .collect();
    assert_eq!(orders, ["333", "222", "111"]);
}

// =============================================================================
// Concurrency
// =============================================================================

pub async fn test_concurrent_uploads<S: LedgerStore>(store: &S) {
    user(store, "race_alice").await;
    user(store, "race_bob").await;

    let (a, b) = tokio::join!(
        store.store_order("600001", "race_alice"),
        store.store_order("600001", "race_bob"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a ^ b, "exactly one upload must win: alice={a} bob={b}");

    let winner = if a { "race_alice" } else { "race_bob" };
    assert_eq!(
        store.order_owner("600001").await.unwrap().as_deref(),
        Some(winner)
    );
}

pub async fn test_concurrent_withdrawals<S: LedgerStore>(store: &S) {
    user(store, "spend_alice").await;
    store.store_order("600101", "spend_alice").await.unwrap();
    store.apply_verdict(&processed("600101", 100)).await.unwrap();

    let (a, b) = tokio::join!(
        store.withdraw("spend_alice", "2377225624", Amount::from_points(60)),
        store.withdraw("spend_alice", "4561261212345467", Amount::from_points(60)),
    );

    let succeeded = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1, "results: {a:?} {b:?}");
    let failure = if a.is_err() { a } else { b };
    assert!(matches!(failure, Err(StorageError::InsufficientFunds { .. })));

    let balance = store.balance("spend_alice").await.unwrap();
    assert_eq!(balance.current, Amount::from_points(40));
    assert_eq!(balance.withdrawn, Amount::from_points(60));
    assert_eq!(store.withdrawals("spend_alice").await.unwrap().len(), 1);
}

pub async fn test_concurrent_verdicts_credit_once<S: LedgerStore>(store: &S) {
    user(store, "dupverdict_alice").await;
    store.store_order("600201", "dupverdict_alice").await.unwrap();

    let verdict = processed("600201", 25);
    let (a, b) = tokio::join!(store.apply_verdict(&verdict), store.apply_verdict(&verdict));
    let applied = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|o| matches!(o, VerdictOutcome::Applied { .. }))
        .count();
    assert_eq!(applied, 1);
    assert_eq!(
        store.balance("dupverdict_alice").await.unwrap().current,
        Amount::from_points(25)
    );
}

/// Run all LedgerStore interface tests against a store.
#[macro_export]
macro_rules! run_ledger_store_tests {
    ($store:expr) => {
        use $crate::storage::ledger_store_tests::*;

        // users
        test_create_user($store).await;
        println!("  test_create_user: PASSED");

        test_duplicate_login($store).await;
        println!("  test_duplicate_login: PASSED");

        test_balance_unknown_user($store).await;
        println!("  test_balance_unknown_user: PASSED");

        // orders
        test_order_ownership($store).await;
        println!("  test_order_ownership: PASSED");

        test_orders_newest_first($store).await;
        println!("  test_orders_newest_first: PASSED");

        test_unsettled_oldest_first($store).await;
        println!("  test_unsettled_oldest_first: PASSED");

        // verdicts
        test_processed_verdict_credits_once($store).await;
        println!("  test_processed_verdict_credits_once: PASSED");

        test_fractional_accrual($store).await;
        println!("  test_fractional_accrual: PASSED");

        test_non_crediting_verdicts($store).await;
        println!("  test_non_crediting_verdicts: PASSED");

        test_processing_then_processed($store).await;
        println!("  test_processing_then_processed: PASSED");

        test_verdict_for_missing_order($store).await;
        println!("  test_verdict_for_missing_order: PASSED");

        // withdrawals
        test_withdraw($store).await;
        println!("  test_withdraw: PASSED");

        test_withdraw_insufficient($store).await;
        println!("  test_withdraw_insufficient: PASSED");

        test_withdraw_unknown_user($store).await;
        println!("  test_withdraw_unknown_user: PASSED");

        test_withdrawals_newest_first($store).await;
        println!("  test_withdrawals_newest_first: PASSED");

        // concurrency
        test_concurrent_uploads($store).await;
        println!("  test_concurrent_uploads: PASSED");

        test_concurrent_withdrawals($store).await;
        println!("  test_concurrent_withdrawals: PASSED");

        test_concurrent_verdicts_credit_once($store).await;
        println!("  test_concurrent_verdicts_credit_once: PASSED");
    };
}
