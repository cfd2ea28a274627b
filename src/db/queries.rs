use sqlx::types::BigDecimal;
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{
    Currency, ExchangeRate, ExternalWallet, PendingTransaction, ServiceTransaction, ServiceWallet,
    Transaction, UserExternalWallet, Wallet,
};

// --- Wallet locking ---
//
// Multi-wallet operations must take their row locks in ascending-id order,
// independent of which wallet is source and which is target. Two transfers
// moving funds in opposite directions over the same wallet pair would
// otherwise deadlock. `ORDER BY id FOR UPDATE` gives that canonical order
// inside a single statement.

pub async fn lock_wallets(
    executor: &mut SqlxTransaction<'_, Postgres>,
    ids: &[Uuid],
) -> Result<Vec<Wallet>> {
    sqlx::query_as::<_, Wallet>(
        r#"
        SELECT id, user_id, currency_id, balance, reserved_balance
        FROM wallets
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(ids)
    .fetch_all(&mut **executor)
    .await
}

pub async fn lock_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, currency_id, balance, reserved_balance FROM wallets WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn find_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, currency_id, balance, reserved_balance FROM wallets WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn get_wallet(pool: &PgPool, id: Uuid) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, currency_id, balance, reserved_balance FROM wallets WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn wallets_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Wallet>> {
    sqlx::query_as::<_, Wallet>(
        "SELECT id, user_id, currency_id, balance, reserved_balance FROM wallets WHERE user_id = $1 ORDER BY currency_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

// --- Balance mutation ---
//
// Callers check the non-negative invariant on the locked row first and fail
// with a typed error; the CHECK constraints in the schema are the backstop.

pub async fn apply_balance_delta(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    delta: &BigDecimal,
) -> Result<Wallet> {
    sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets SET balance = balance + $2
        WHERE id = $1
        RETURNING id, user_id, currency_id, balance, reserved_balance
        "#,
    )
    .bind(wallet_id)
    .bind(delta)
    .fetch_one(&mut **executor)
    .await
}

/// Hold: spendable -> reserved.
pub async fn move_to_reserved(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    amount: &BigDecimal,
) -> Result<Wallet> {
    sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets SET balance = balance - $2, reserved_balance = reserved_balance + $2
        WHERE id = $1
        RETURNING id, user_id, currency_id, balance, reserved_balance
        "#,
    )
    .bind(wallet_id)
    .bind(amount)
    .fetch_one(&mut **executor)
    .await
}

/// Undo of a hold: reserved -> spendable.
pub async fn move_from_reserved(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    amount: &BigDecimal,
) -> Result<Wallet> {
    sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets SET reserved_balance = reserved_balance - $2, balance = balance + $2
        WHERE id = $1
        RETURNING id, user_id, currency_id, balance, reserved_balance
        "#,
    )
    .bind(wallet_id)
    .bind(amount)
    .fetch_one(&mut **executor)
    .await
}

/// Settlement of a hold: reserved decreases, nothing returns to spendable.
pub async fn consume_reserved(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    amount: &BigDecimal,
) -> Result<Wallet> {
    sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets SET reserved_balance = reserved_balance - $2
        WHERE id = $1
        RETURNING id, user_id, currency_id, balance, reserved_balance
        "#,
    )
    .bind(wallet_id)
    .bind(amount)
    .fetch_one(&mut **executor)
    .await
}

// --- Service / external / user-external wallets ---

pub async fn lock_service_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<ServiceWallet>> {
    sqlx::query_as::<_, ServiceWallet>(
        r#"
        SELECT id, user_id, currency_id, balance, reserved_balance, commission_rate
        FROM service_wallets WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn lock_service_wallet_for(
    executor: &mut SqlxTransaction<'_, Postgres>,
    service_user_id: Uuid,
    currency_id: i32,
) -> Result<Option<ServiceWallet>> {
    sqlx::query_as::<_, ServiceWallet>(
        r#"
        SELECT id, user_id, currency_id, balance, reserved_balance, commission_rate
        FROM service_wallets WHERE user_id = $1 AND currency_id = $2
        FOR UPDATE
        "#,
    )
    .bind(service_user_id)
    .bind(currency_id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn find_service_wallet_for(
    executor: &mut SqlxTransaction<'_, Postgres>,
    service_user_id: Uuid,
    currency_id: i32,
) -> Result<Option<ServiceWallet>> {
    sqlx::query_as::<_, ServiceWallet>(
        r#"
        SELECT id, user_id, currency_id, balance, reserved_balance, commission_rate
        FROM service_wallets WHERE user_id = $1 AND currency_id = $2
        "#,
    )
    .bind(service_user_id)
    .bind(currency_id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn apply_service_balance_delta(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    delta: &BigDecimal,
) -> Result<ServiceWallet> {
    sqlx::query_as::<_, ServiceWallet>(
        r#"
        UPDATE service_wallets SET balance = balance + $2
        WHERE id = $1
        RETURNING id, user_id, currency_id, balance, reserved_balance, commission_rate
        "#,
    )
    .bind(wallet_id)
    .bind(delta)
    .fetch_one(&mut **executor)
    .await
}

// External-wallet balances are never mutated by the settlement paths, so
// these reads take no row lock and stay out of the canonical lock order.

pub async fn find_external_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<ExternalWallet>> {
    sqlx::query_as::<_, ExternalWallet>(
        r#"
        SELECT id, user_id, currency_id, balance, reserved_balance, commission_rate
        FROM external_wallets WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn find_external_wallet_for(
    executor: &mut SqlxTransaction<'_, Postgres>,
    service_user_id: Uuid,
    currency_id: i32,
) -> Result<Option<ExternalWallet>> {
    sqlx::query_as::<_, ExternalWallet>(
        r#"
        SELECT id, user_id, currency_id, balance, reserved_balance, commission_rate
        FROM external_wallets WHERE user_id = $1 AND currency_id = $2
        "#,
    )
    .bind(service_user_id)
    .bind(currency_id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn find_user_external_wallet_for(
    executor: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
    currency_id: i32,
) -> Result<Option<UserExternalWallet>> {
    sqlx::query_as::<_, UserExternalWallet>(
        r#"
        SELECT id, user_id, currency_id, wallet_name, cumulative_withdrawn
        FROM user_external_wallets WHERE user_id = $1 AND currency_id = $2
        "#,
    )
    .bind(user_id)
    .bind(currency_id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn lock_user_external_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<UserExternalWallet>> {
    sqlx::query_as::<_, UserExternalWallet>(
        r#"
        SELECT id, user_id, currency_id, wallet_name, cumulative_withdrawn
        FROM user_external_wallets WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn add_cumulative_withdrawn(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    amount: &BigDecimal,
) -> Result<UserExternalWallet> {
    sqlx::query_as::<_, UserExternalWallet>(
        r#"
        UPDATE user_external_wallets SET cumulative_withdrawn = cumulative_withdrawn + $2
        WHERE id = $1
        RETURNING id, user_id, currency_id, wallet_name, cumulative_withdrawn
        "#,
    )
    .bind(id)
    .bind(amount)
    .fetch_one(&mut **executor)
    .await
}

// --- Operator accounts ---

pub async fn service_user_exists(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<bool> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM service_users WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await?;
    Ok(row.is_some())
}

// --- Ledger inserts ---

pub async fn insert_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &Transaction,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, from_wallet_id, from_currency_id, amount, to_wallet_id, to_currency_id,
            rate, converted_amount, type, status, created_at, user_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.from_wallet_id)
    .bind(tx.from_currency_id)
    .bind(&tx.amount)
    .bind(tx.to_wallet_id)
    .bind(tx.to_currency_id)
    .bind(&tx.rate)
    .bind(&tx.converted_amount)
    .bind(&tx.kind)
    .bind(&tx.status)
    .bind(tx.created_at)
    .bind(tx.user_id)
    .fetch_one(&mut **executor)
    .await
}

pub async fn insert_service_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &ServiceTransaction,
) -> Result<ServiceTransaction> {
    sqlx::query_as::<_, ServiceTransaction>(
        r#"
        INSERT INTO service_transactions (
            id, from_wallet_id, from_currency_id, amount, to_wallet_id, to_currency_id,
            rate, converted_amount, type, status, created_at, user_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.from_wallet_id)
    .bind(tx.from_currency_id)
    .bind(&tx.amount)
    .bind(tx.to_wallet_id)
    .bind(tx.to_currency_id)
    .bind(&tx.rate)
    .bind(&tx.converted_amount)
    .bind(&tx.kind)
    .bind(&tx.status)
    .bind(tx.created_at)
    .bind(tx.user_id)
    .fetch_one(&mut **executor)
    .await
}

pub async fn insert_pending_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &PendingTransaction,
) -> Result<PendingTransaction> {
    sqlx::query_as::<_, PendingTransaction>(
        r#"
        INSERT INTO pending_transactions (
            id, from_wallet_id, from_currency_id, amount, to_wallet_id, to_currency_id,
            rate, converted_amount, type, status, created_at, user_id,
            external_wallet_id, external_transaction_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.from_wallet_id)
    .bind(tx.from_currency_id)
    .bind(&tx.amount)
    .bind(tx.to_wallet_id)
    .bind(tx.to_currency_id)
    .bind(&tx.rate)
    .bind(&tx.converted_amount)
    .bind(&tx.kind)
    .bind(&tx.status)
    .bind(tx.created_at)
    .bind(tx.user_id)
    .bind(tx.external_wallet_id)
    .bind(tx.external_transaction_id)
    .fetch_one(&mut **executor)
    .await
}

// --- Pending transaction state machine ---

/// Locks the pending row so concurrent confirmations of the same transaction
/// serialize; exactly one of them sees `pending`.
pub async fn lock_pending_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<PendingTransaction>> {
    sqlx::query_as::<_, PendingTransaction>(
        "SELECT * FROM pending_transactions WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn set_pending_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    status: &str,
) -> Result<PendingTransaction> {
    sqlx::query_as::<_, PendingTransaction>(
        "UPDATE pending_transactions SET status = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_one(&mut **executor)
    .await
}

pub async fn get_pending_transaction(pool: &PgPool, id: Uuid) -> Result<Option<PendingTransaction>> {
    sqlx::query_as::<_, PendingTransaction>("SELECT * FROM pending_transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

// --- Exchange-rate catalog ---

pub async fn get_rate(
    executor: &mut SqlxTransaction<'_, Postgres>,
    from_currency_id: i32,
    to_currency_id: i32,
) -> Result<Option<BigDecimal>> {
    let row: Option<(BigDecimal,)> = sqlx::query_as(
        "SELECT rate FROM exchange_rates WHERE from_currency_id = $1 AND to_currency_id = $2",
    )
    .bind(from_currency_id)
    .bind(to_currency_id)
    .fetch_optional(&mut **executor)
    .await?;
    Ok(row.map(|r| r.0))
}

pub async fn get_rate_from_pool(
    pool: &PgPool,
    from_currency_id: i32,
    to_currency_id: i32,
) -> Result<Option<BigDecimal>> {
    let row: Option<(BigDecimal,)> = sqlx::query_as(
        "SELECT rate FROM exchange_rates WHERE from_currency_id = $1 AND to_currency_id = $2",
    )
    .bind(from_currency_id)
    .bind(to_currency_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}

pub async fn get_currency_by_symbol(pool: &PgPool, symbol: &str) -> Result<Option<Currency>> {
    sqlx::query_as::<_, Currency>("SELECT id, name, symbol FROM currencies WHERE symbol = $1")
        .bind(symbol)
        .fetch_optional(pool)
        .await
}

// Catalog ingestion is an idempotent upsert so the external feed can replay
// without creating duplicates.

pub async fn upsert_currency(pool: &PgPool, name: &str, symbol: &str) -> Result<Currency> {
    sqlx::query_as::<_, Currency>(
        r#"
        INSERT INTO currencies (name, symbol) VALUES ($1, $2)
        ON CONFLICT (symbol) DO UPDATE SET name = EXCLUDED.name
        RETURNING id, name, symbol
        "#,
    )
    .bind(name)
    .bind(symbol)
    .fetch_one(pool)
    .await
}

pub async fn upsert_rate(
    pool: &PgPool,
    from_currency_id: i32,
    to_currency_id: i32,
    rate: &BigDecimal,
) -> Result<ExchangeRate> {
    sqlx::query_as::<_, ExchangeRate>(
        r#"
        INSERT INTO exchange_rates (from_currency_id, to_currency_id, rate)
        VALUES ($1, $2, $3)
        ON CONFLICT (from_currency_id, to_currency_id)
        DO UPDATE SET rate = EXCLUDED.rate, updated_at = NOW()
        RETURNING id, from_currency_id, to_currency_id, rate, updated_at
        "#,
    )
    .bind(from_currency_id)
    .bind(to_currency_id)
    .bind(rate)
    .fetch_one(pool)
    .await
}

// --- Ledger reads ---

pub async fn transactions_by_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn transactions_by_wallet(
    pool: &PgPool,
    user_id: Uuid,
    wallet_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE user_id = $1 AND (from_wallet_id = $2 OR to_wallet_id = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(wallet_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}
