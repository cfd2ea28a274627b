use sqlx::PgPool;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::db::models::{Transaction, TransactionType};
use crate::db::queries;
use crate::error::LedgerError;
use crate::services::amount::truncate_amount;

/// Direct wallet-to-wallet movement, converting through the rate catalog
/// when the currencies differ.
pub struct TransferService {
    pool: PgPool,
}

impl TransferService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Moves `amount` (caller-validated positive) from `from_wallet_id` to
    /// `to_wallet_id`. Both wallets are locked in canonical ascending-id
    /// order; everything commits atomically or not at all.
    pub async fn transfer(
        &self,
        amount: BigDecimal,
        from_wallet_id: Uuid,
        to_wallet_id: Uuid,
        acting_user_id: Uuid,
    ) -> Result<Transaction, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let wallets = queries::lock_wallets(&mut tx, &[from_wallet_id, to_wallet_id]).await?;
        let from = wallets
            .iter()
            .find(|w| w.id == from_wallet_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {from_wallet_id}")))?;
        let to = wallets
            .iter()
            .find(|w| w.id == to_wallet_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {to_wallet_id}")))?;

        if from.user_id != acting_user_id {
            return Err(LedgerError::OwnershipMismatch);
        }
        if from.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }

        let rate = if from.currency_id == to.currency_id {
            BigDecimal::from(1)
        } else {
            queries::get_rate(&mut tx, from.currency_id, to.currency_id)
                .await?
                .ok_or_else(|| {
                    LedgerError::ExchangeRateNotFound(format!(
                        "{} -> {}",
                        from.currency_id, to.currency_id
                    ))
                })?
        };
        let converted = truncate_amount(&(&amount * &rate));

        let debit = -&amount;
        queries::apply_balance_delta(&mut tx, from.id, &debit).await?;
        queries::apply_balance_delta(&mut tx, to.id, &converted).await?;

        let record = Transaction::new(
            TransactionType::Transfer,
            Some(from.id),
            Some(from.currency_id),
            amount,
            Some(to.id),
            Some(to.currency_id),
            rate,
            converted,
            acting_user_id,
        );
        let inserted = queries::insert_transaction(&mut tx, &record).await?;

        tx.commit().await?;

        tracing::info!(
            "transfer {} settled: {} -> {} amount {} converted {}",
            inserted.id,
            from.id,
            to.id,
            inserted.amount,
            inserted.converted_amount
        );

        Ok(inserted)
    }
}
