//! Integration tests for the wallet ledger.
//!
//! Require a `PostgreSQL` server reachable through `DATABASE_URL`.
//!
//! Run with: cargo test -p atelier-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use sqlx::PgPool;

use atelier_api::db::wallets::TransactionFilter;
use atelier_api::services::ServiceError;
use atelier_core::{Money, TransactionKind};
use atelier_integration_tests::{customer, dec, state};

fn money(s: &str) -> Money {
    Money::new(dec(s)).unwrap()
}

// ============================================================================
// Deposits and withdrawals
// ============================================================================

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_balance_matches_ledger(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();

    wallet.deposit(user.id, dec("100.00"), None, "Top up").await.unwrap();
    wallet.deposit(user.id, dec("0.50"), None, "Top up").await.unwrap();
    wallet.withdraw(user.id, dec("40.25"), None, "Cash out").await.unwrap();

    let current = wallet.get_wallet(user.id).await.unwrap();
    assert_eq!(current.balance, money("60.25"));

    let audit = wallet.audit_wallet(current.id).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.entries, 3);
    assert_eq!(audit.ledger_balance, dec("60.25"));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_overdraw_rejected_and_balance_unchanged(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();
    wallet.deposit(user.id, dec("30.00"), None, "Top up").await.unwrap();

    let result = wallet.withdraw(user.id, dec("30.01"), None, "Cash out").await;
    assert!(matches!(
        result,
        Err(ServiceError::InsufficientFunds { balance, requested })
            if balance == money("30.00") && requested == money("30.01")
    ));

    let current = wallet.get_wallet(user.id).await.unwrap();
    assert_eq!(current.balance, money("30.00"));
    let history = wallet
        .list_transactions(user.id, TransactionFilter::default(), 20, 0)
        .await
        .unwrap();
    assert_eq!(history.count, 1);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_non_positive_amounts_rejected(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();

    for amount in ["0", "-5.00", "1.005"] {
        assert!(matches!(
            wallet.deposit(user.id, dec(amount), None, "Top up").await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            wallet.withdraw(user.id, dec(amount), None, "Cash out").await,
            Err(ServiceError::Validation(_))
        ));
    }
    assert!(wallet.get_wallet(user.id).await.unwrap().balance.is_zero());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_withdrawals_never_overdraw(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();
    wallet.deposit(user.id, dec("100.00"), None, "Top up").await.unwrap();

    let (a, b, c) = tokio::join!(
        wallet.withdraw(user.id, dec("40.00"), None, "A"),
        wallet.withdraw(user.id, dec("40.00"), None, "B"),
        wallet.withdraw(user.id, dec("40.00"), None, "C"),
    );
    let succeeded = [a.is_ok(), b.is_ok(), c.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(succeeded, 2);

    let current = wallet.get_wallet(user.id).await.unwrap();
    assert_eq!(current.balance, money("20.00"));
    assert!(wallet.audit_wallet(current.id).await.unwrap().is_consistent());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_deposit_for_missing_user(pool: PgPool) {
    let state = state(pool);
    let result = state
        .wallet()
        .deposit(12_345.into(), dec("10.00"), None, "Top up")
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_amounts_beyond_money_bound_rejected(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();

    let huge = wallet
        .deposit(user.id, dec("1000000000000.00"), None, "Top up")
        .await;
    assert!(matches!(huge, Err(ServiceError::Validation(_))));

    wallet
        .deposit(user.id, dec("9999999999.00"), None, "Top up")
        .await
        .unwrap();
    let past_max = wallet.deposit(user.id, dec("1.00"), None, "Top up").await;
    assert!(matches!(past_max, Err(ServiceError::Validation(_))));

    let current = wallet.get_wallet(user.id).await.unwrap();
    assert_eq!(current.balance, money("9999999999.00"));
    assert!(wallet.audit_wallet(current.id).await.unwrap().is_consistent());
}

// ============================================================================
// Idempotent references
// ============================================================================

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_repeated_deposit_reference_posts_once(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();

    let first = wallet
        .deposit(user.id, dec("25.00"), Some("bank-7781"), "Top up")
        .await
        .unwrap();
    let retry = wallet
        .deposit(user.id, dec("25.00"), Some(" bank-7781 "), "Top up")
        .await
        .unwrap();
    assert_eq!(retry.id, first.id);
    assert_eq!(first.reference_id.as_deref(), Some("bank-7781"));

    let mismatch = wallet
        .deposit(user.id, dec("30.00"), Some("bank-7781"), "Top up")
        .await;
    assert!(matches!(mismatch, Err(ServiceError::Conflict(_))));

    let current = wallet.get_wallet(user.id).await.unwrap();
    assert_eq!(current.balance, money("25.00"));
    let history = wallet
        .list_transactions(user.id, TransactionFilter::default(), 20, 0)
        .await
        .unwrap();
    assert_eq!(history.count, 1);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_repeated_withdrawal_reference_posts_once(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();
    wallet.deposit(user.id, dec("50.00"), None, "Top up").await.unwrap();

    let (a, b) = tokio::join!(
        wallet.withdraw(user.id, dec("20.00"), Some("payout-3"), "Cash out"),
        wallet.withdraw(user.id, dec("20.00"), Some("payout-3"), "Cash out"),
    );
    assert_eq!(a.unwrap().id, b.unwrap().id);

    // The same key on a different kind is a separate request
    wallet
        .deposit(user.id, dec("5.00"), Some("payout-3"), "Top up")
        .await
        .unwrap();

    let current = wallet.get_wallet(user.id).await.unwrap();
    assert_eq!(current.balance, money("35.00"));
    assert!(wallet.audit_wallet(current.id).await.unwrap().is_consistent());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_blank_or_long_reference_rejected(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();

    let long = "r".repeat(256);
    for reference in ["   ", long.as_str()] {
        let result = wallet
            .deposit(user.id, dec("5.00"), Some(reference), "Top up")
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}

// ============================================================================
// Audits
// ============================================================================

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_audit_reads_current_state_by_id(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();

    let stale = wallet.get_wallet(user.id).await.unwrap();
    wallet.deposit(user.id, dec("12.00"), None, "Top up").await.unwrap();

    let audit = wallet.audit_wallet(stale.id).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.stored_balance, money("12.00"));
    assert_eq!(audit.entries, 1);

    let missing = wallet.audit_wallet(99_999.into()).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_audit_consistent_under_concurrent_deposits(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();
    let id = wallet.get_wallet(user.id).await.unwrap().id;

    for _ in 0..5 {
        let (deposit, audit) = tokio::join!(
            wallet.deposit(user.id, dec("1.00"), None, "Top up"),
            wallet.audit_wallet(id),
        );
        deposit.unwrap();
        assert!(audit.unwrap().is_consistent());
    }
}

// ============================================================================
// History
// ============================================================================

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_history_newest_first_with_filters(pool: PgPool) {
    let state = state(pool);
    let user = customer(&state, "buyer@atelier.test").await;
    let wallet = state.wallet();

    let first = wallet.deposit(user.id, dec("10.00"), None, "First").await.unwrap();
    let second = wallet.withdraw(user.id, dec("3.00"), None, "Second").await.unwrap();
    let third = wallet.deposit(user.id, dec("5.00"), None, "Third").await.unwrap();

    let all = wallet
        .list_transactions(user.id, TransactionFilter::default(), 20, 0)
        .await
        .unwrap();
    assert_eq!(all.count, 3);
    let ids: Vec<_> = all.results.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);

    let deposits = wallet
        .list_transactions(
            user.id,
            TransactionFilter {
                kind: Some(TransactionKind::Deposit),
                ..TransactionFilter::default()
            },
            20,
            0,
        )
        .await
        .unwrap();
    assert_eq!(deposits.count, 2);

    let paged = wallet
        .list_transactions(user.id, TransactionFilter::default(), 1, 1)
        .await
        .unwrap();
    assert_eq!(paged.count, 3);
    assert_eq!(paged.results[0].id, second.id);

    let inverted = wallet
        .list_transactions(
            user.id,
            TransactionFilter {
                from: Some(third.created_at),
                to: Some(first.created_at),
                ..TransactionFilter::default()
            },
            20,
            0,
        )
        .await;
    assert!(matches!(inverted, Err(ServiceError::Validation(_))));
}
