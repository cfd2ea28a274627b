mod common;

use common::*;
use ledger_core::error::LedgerError;
use ledger_core::rail::MockRail;
use ledger_core::services::{ConfirmOutcome, PendingService};
use std::sync::Arc;
use uuid::Uuid;

fn pending_service(pool: &sqlx::PgPool) -> PendingService {
    PendingService::new(pool.clone(), Arc::new(MockRail))
}

struct DepositFixture {
    alice: Uuid,
    operator: Uuid,
    wallet: Uuid,
    service_wallet: Uuid,
    external_wallet: Uuid,
}

async fn deposit_fixture(pool: &sqlx::PgPool, commission_rate: &str) -> DepositFixture {
    let alice = create_user(pool).await;
    let operator = create_service_user(pool).await;
    let usd = create_currency(pool, "US Dollar", "USD").await;

    let wallet = create_wallet(pool, alice, usd, "0").await;
    let service_wallet = create_service_wallet(pool, operator, usd, "0", commission_rate).await;
    let external_wallet = create_external_wallet(pool, operator, usd, "1000", "0").await;

    DepositFixture {
        alice,
        operator,
        wallet,
        service_wallet,
        external_wallet,
    }
}

#[tokio::test]
async fn staging_a_deposit_moves_no_balances() {
    let (pool, _container) = setup_pool().await;
    let fx = deposit_fixture(&pool, "0.01").await;

    let service = pending_service(&pool);
    let pending = service
        .create_pending_deposit(fx.wallet, dec("100"), fx.alice, fx.operator)
        .await
        .unwrap();

    assert_eq!(pending.status, "pending");
    assert_eq!(pending.kind, "deposit");
    assert_eq!(pending.external_wallet_id, fx.external_wallet);

    let (balance, reserved) = wallet_balances(&pool, fx.wallet).await;
    assert_eq!(balance, dec("0"));
    assert_eq!(reserved, dec("0"));
    assert_eq!(service_wallet_balance(&pool, fx.service_wallet).await, dec("0"));
    assert_eq!(ledger_count(&pool).await, 0);
}

#[tokio::test]
async fn paid_deposit_credits_user_and_splits_commission() {
    let (pool, _container) = setup_pool().await;
    let fx = deposit_fixture(&pool, "0.01").await;

    let service = pending_service(&pool);
    let pending = service
        .create_pending_deposit(fx.wallet, dec("100"), fx.alice, fx.operator)
        .await
        .unwrap();

    let outcome = service
        .confirm_deposit(pending.id, "paid", fx.operator)
        .await
        .unwrap();

    let transaction = match outcome {
        ConfirmOutcome::Settled { transaction, pending } => {
            assert_eq!(pending.status, "paid");
            transaction
        }
        ConfirmOutcome::Rejected { .. } => panic!("expected settlement"),
    };
    assert_eq!(transaction.kind, "transfer");
    assert_eq!(transaction.converted_amount, dec("100"));

    // User receives converted * (1 - commission_rate); the operator keeps
    // the commission leg.
    let (balance, _) = wallet_balances(&pool, fx.wallet).await;
    assert_eq!(balance, dec("99"));
    assert_eq!(service_wallet_balance(&pool, fx.service_wallet).await, dec("1"));

    let rows = ledger_rows(&pool, fx.alice).await;
    assert_eq!(rows.len(), 2);
    let commission = rows
        .iter()
        .find(|(kind, _, _)| kind.as_str() == "commission")
        .unwrap();
    assert_eq!(commission.1, dec("1"));
    assert!(rows.iter().any(|(kind, _, _)| kind.as_str() == "transfer"));

    let service_rows = service_ledger_rows(&pool).await;
    assert_eq!(service_rows.len(), 1);
    assert_eq!(service_rows[0].0, "deposit");
    assert_eq!(service_rows[0].1, dec("100"));
}

#[tokio::test]
async fn second_confirmation_fails_and_mutates_nothing() {
    let (pool, _container) = setup_pool().await;
    let fx = deposit_fixture(&pool, "0.01").await;

    let service = pending_service(&pool);
    let pending = service
        .create_pending_deposit(fx.wallet, dec("100"), fx.alice, fx.operator)
        .await
        .unwrap();

    service
        .confirm_deposit(pending.id, "paid", fx.operator)
        .await
        .unwrap();

    let err = service
        .confirm_deposit(pending.id, "paid", fx.operator)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidStatusTransition(_)));

    // Settled exactly once.
    let (balance, _) = wallet_balances(&pool, fx.wallet).await;
    assert_eq!(balance, dec("99"));
    assert_eq!(service_wallet_balance(&pool, fx.service_wallet).await, dec("1"));
    assert_eq!(ledger_rows(&pool, fx.alice).await.len(), 2);
}

#[tokio::test]
async fn rejected_deposit_is_terminal_with_no_movement() {
    let (pool, _container) = setup_pool().await;
    let fx = deposit_fixture(&pool, "0.01").await;

    let service = pending_service(&pool);
    let pending = service
        .create_pending_deposit(fx.wallet, dec("100"), fx.alice, fx.operator)
        .await
        .unwrap();

    let outcome = service
        .confirm_deposit(pending.id, "rejected", fx.operator)
        .await
        .unwrap();
    assert!(matches!(outcome, ConfirmOutcome::Rejected { .. }));
    assert_eq!(pending_status(&pool, pending.id).await, "rejected");

    let (balance, reserved) = wallet_balances(&pool, fx.wallet).await;
    assert_eq!(balance, dec("0"));
    assert_eq!(reserved, dec("0"));
    assert_eq!(ledger_count(&pool).await, 0);

    // Terminal is terminal, in both directions.
    let err = service
        .confirm_deposit(pending.id, "paid", fx.operator)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidStatusTransition(_)));
}

#[tokio::test]
async fn confirming_with_unknown_status_is_invalid() {
    let (pool, _container) = setup_pool().await;
    let fx = deposit_fixture(&pool, "0.01").await;

    let service = pending_service(&pool);
    let pending = service
        .create_pending_deposit(fx.wallet, dec("100"), fx.alice, fx.operator)
        .await
        .unwrap();

    for status in ["pending", "completed", ""] {
        let err = service
            .confirm_deposit(pending.id, status, fx.operator)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStatusTransition(_)));
    }
    assert_eq!(pending_status(&pool, pending.id).await, "pending");
}

#[tokio::test]
async fn withdraw_endpoint_rejects_deposit_transaction() {
    let (pool, _container) = setup_pool().await;
    let fx = deposit_fixture(&pool, "0.01").await;

    let service = pending_service(&pool);
    let pending = service
        .create_pending_deposit(fx.wallet, dec("100"), fx.alice, fx.operator)
        .await
        .unwrap();

    let err = service
        .confirm_withdraw(pending.id, "paid", fx.operator)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransactionType(_)));
    assert_eq!(pending_status(&pool, pending.id).await, "pending");
}

#[tokio::test]
async fn unknown_operator_is_unauthorized() {
    let (pool, _container) = setup_pool().await;
    let fx = deposit_fixture(&pool, "0.01").await;

    let service = pending_service(&pool);
    let pending = service
        .create_pending_deposit(fx.wallet, dec("100"), fx.alice, fx.operator)
        .await
        .unwrap();

    let err = service
        .confirm_deposit(pending.id, "paid", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
    assert_eq!(pending_status(&pool, pending.id).await, "pending");
}

#[tokio::test]
async fn rail_tokens_are_unique_per_pending_transaction() {
    let (pool, _container) = setup_pool().await;
    let fx = deposit_fixture(&pool, "0.01").await;

    let service = pending_service(&pool);
    let first = service
        .create_pending_deposit(fx.wallet, dec("10"), fx.alice, fx.operator)
        .await
        .unwrap();
    let second = service
        .create_pending_deposit(fx.wallet, dec("10"), fx.alice, fx.operator)
        .await
        .unwrap();

    assert_ne!(
        first.external_transaction_id,
        second.external_transaction_id
    );
}
