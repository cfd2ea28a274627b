mod common;

use common::*;
use ledger_core::error::LedgerError;
use ledger_core::services::TransferService;
use uuid::Uuid;

#[tokio::test]
async fn cross_currency_transfer_converts_and_truncates() {
    let (pool, _container) = setup_pool().await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    let usd = create_currency(&pool, "US Dollar", "USD").await;
    let eur = create_currency(&pool, "Euro", "EUR").await;
    set_rate(&pool, usd, eur, "0.9").await;

    let w1 = create_wallet(&pool, alice, usd, "10").await;
    let w2 = create_wallet(&pool, bob, eur, "0").await;

    let service = TransferService::new(pool.clone());
    let tx = service.transfer(dec("5"), w1, w2, alice).await.unwrap();

    assert_eq!(tx.kind, "transfer");
    assert_eq!(tx.rate, dec("0.9"));
    assert_eq!(tx.converted_amount, dec("4.5"));

    let (w1_balance, _) = wallet_balances(&pool, w1).await;
    let (w2_balance, _) = wallet_balances(&pool, w2).await;
    assert_eq!(w1_balance, dec("5"));
    assert_eq!(w2_balance, dec("4.5"));
}

#[tokio::test]
async fn same_currency_transfer_moves_exact_amount() {
    let (pool, _container) = setup_pool().await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    let usd = create_currency(&pool, "US Dollar", "USD").await;

    let w1 = create_wallet(&pool, alice, usd, "100").await;
    let w2 = create_wallet(&pool, bob, usd, "25").await;

    let service = TransferService::new(pool.clone());
    let tx = service.transfer(dec("40"), w1, w2, alice).await.unwrap();

    assert_eq!(tx.rate, dec("1"));
    assert_eq!(tx.converted_amount, dec("40"));

    let (w1_balance, _) = wallet_balances(&pool, w1).await;
    let (w2_balance, _) = wallet_balances(&pool, w2).await;
    assert_eq!(w1_balance, dec("60"));
    assert_eq!(w2_balance, dec("65"));
}

#[tokio::test]
async fn conversion_never_rounds_up() {
    let (pool, _container) = setup_pool().await;
    let alice = create_user(&pool).await;
    let usd = create_currency(&pool, "US Dollar", "USD").await;
    let eur = create_currency(&pool, "Euro", "EUR").await;
    set_rate(&pool, usd, eur, "0.3333333333").await;

    let w1 = create_wallet(&pool, alice, usd, "1").await;
    let w2 = create_wallet(&pool, alice, eur, "0").await;

    let service = TransferService::new(pool.clone());
    // 0.5 * 0.3333333333 = 0.16666666665, one digit past the money scale.
    let tx = service.transfer(dec("0.5"), w1, w2, alice).await.unwrap();

    assert_eq!(tx.converted_amount, dec("0.1666666666"));
    assert!(tx.converted_amount <= dec("0.5") * dec("0.3333333333"));

    let (w2_balance, _) = wallet_balances(&pool, w2).await;
    assert_eq!(w2_balance, dec("0.1666666666"));
}

#[tokio::test]
async fn insufficient_funds_mutates_nothing() {
    let (pool, _container) = setup_pool().await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    let usd = create_currency(&pool, "US Dollar", "USD").await;

    let w1 = create_wallet(&pool, alice, usd, "5").await;
    let w2 = create_wallet(&pool, bob, usd, "0").await;

    let service = TransferService::new(pool.clone());
    let err = service.transfer(dec("10"), w1, w2, alice).await.unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds));

    let (w1_balance, _) = wallet_balances(&pool, w1).await;
    let (w2_balance, _) = wallet_balances(&pool, w2).await;
    assert_eq!(w1_balance, dec("5"));
    assert_eq!(w2_balance, dec("0"));
    assert_eq!(ledger_count(&pool).await, 0);
}

#[tokio::test]
async fn ownership_mismatch_mutates_nothing() {
    let (pool, _container) = setup_pool().await;
    let alice = create_user(&pool).await;
    let mallory = create_user(&pool).await;
    let usd = create_currency(&pool, "US Dollar", "USD").await;

    let w1 = create_wallet(&pool, alice, usd, "50").await;
    let w2 = create_wallet(&pool, mallory, usd, "0").await;

    let service = TransferService::new(pool.clone());
    let err = service
        .transfer(dec("10"), w1, w2, mallory)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::OwnershipMismatch));

    let (w1_balance, _) = wallet_balances(&pool, w1).await;
    assert_eq!(w1_balance, dec("50"));
    assert_eq!(ledger_count(&pool).await, 0);
}

#[tokio::test]
async fn missing_rate_pair_is_not_derived_from_reciprocal() {
    let (pool, _container) = setup_pool().await;
    let alice = create_user(&pool).await;
    let usd = create_currency(&pool, "US Dollar", "USD").await;
    let eur = create_currency(&pool, "Euro", "EUR").await;
    // Only the opposite direction exists.
    set_rate(&pool, eur, usd, "1.1").await;

    let w1 = create_wallet(&pool, alice, usd, "10").await;
    let w2 = create_wallet(&pool, alice, eur, "0").await;

    let service = TransferService::new(pool.clone());
    let err = service.transfer(dec("5"), w1, w2, alice).await.unwrap_err();

    assert!(matches!(err, LedgerError::ExchangeRateNotFound(_)));

    let (w1_balance, _) = wallet_balances(&pool, w1).await;
    assert_eq!(w1_balance, dec("10"));
}

#[tokio::test]
async fn unknown_target_wallet_is_not_found() {
    let (pool, _container) = setup_pool().await;
    let alice = create_user(&pool).await;
    let usd = create_currency(&pool, "US Dollar", "USD").await;

    let w1 = create_wallet(&pool, alice, usd, "10").await;

    let service = TransferService::new(pool.clone());
    let err = service
        .transfer(dec("5"), w1, Uuid::new_v4(), alice)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::NotFound(_)));
}
