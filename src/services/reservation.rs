use sqlx::PgPool;
use sqlx::types::BigDecimal;
use sqlx::{Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{Transaction, Wallet};
use crate::db::queries;
use crate::error::LedgerError;

/// Holds and releases funds within one wallet (balance <-> reserved_balance).
/// The withdraw workflow composes the `_in_tx` variants inside its own
/// transaction; the service methods wrap them for standalone use.
pub struct ReservationService {
    pool: PgPool,
}

impl ReservationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn reserve(
        &self,
        wallet_id: Uuid,
        amount: BigDecimal,
        acting_user_id: Uuid,
    ) -> Result<Transaction, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let wallet = queries::lock_wallet(&mut tx, wallet_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {wallet_id}")))?;
        if wallet.user_id != acting_user_id {
            return Err(LedgerError::OwnershipMismatch);
        }

        let record = reserve_in_tx(&mut tx, &wallet, &amount).await?;
        tx.commit().await?;
        Ok(record)
    }

    pub async fn release(
        &self,
        wallet_id: Uuid,
        amount: BigDecimal,
        acting_user_id: Uuid,
    ) -> Result<Transaction, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let wallet = queries::lock_wallet(&mut tx, wallet_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {wallet_id}")))?;
        if wallet.user_id != acting_user_id {
            return Err(LedgerError::OwnershipMismatch);
        }

        let record = release_in_tx(&mut tx, &wallet, &amount).await?;
        tx.commit().await?;
        Ok(record)
    }
}

/// Hold on an already-locked wallet: balance -= amount, reserved += amount,
/// plus the `reserve` ledger row.
pub(crate) async fn reserve_in_tx(
    tx: &mut SqlxTransaction<'_, Postgres>,
    wallet: &Wallet,
    amount: &BigDecimal,
) -> Result<Transaction, LedgerError> {
    if wallet.balance < *amount {
        return Err(LedgerError::InsufficientFunds);
    }

    queries::move_to_reserved(tx, wallet.id, amount).await?;
    let record = Transaction::reserve(wallet, amount.clone());
    Ok(queries::insert_transaction(tx, &record).await?)
}

/// Undo of a hold on an already-locked wallet: reserved -= amount,
/// balance += amount, plus the `release` ledger row.
pub(crate) async fn release_in_tx(
    tx: &mut SqlxTransaction<'_, Postgres>,
    wallet: &Wallet,
    amount: &BigDecimal,
) -> Result<Transaction, LedgerError> {
    if wallet.reserved_balance < *amount {
        return Err(LedgerError::InsufficientReservedFunds);
    }

    queries::move_from_reserved(tx, wallet.id, amount).await?;
    let record = Transaction::release(wallet, amount.clone());
    Ok(queries::insert_transaction(tx, &record).await?)
}
