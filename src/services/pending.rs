use serde::Serialize;
use sqlx::PgPool;
use sqlx::types::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{
    PendingStatus, PendingTransaction, ServiceTransaction, Transaction, TransactionType,
};
use crate::db::queries;
use crate::error::LedgerError;
use crate::rail::PaymentRail;
use crate::services::amount::truncate_amount;
use crate::services::reservation;

/// Result of an operator confirmation. A paid settlement yields the primary
/// ledger row; a rejection only closes the pending record.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ConfirmOutcome {
    Settled {
        transaction: Transaction,
        pending: PendingTransaction,
    },
    Rejected {
        pending: PendingTransaction,
    },
}

/// Stages externally-initiated deposits and withdrawals, then settles them
/// into ledger entries and commission splits once a trusted operator
/// confirms.
///
/// Lock order inside a confirmation, always: pending row, then user wallet,
/// then service wallet, then user-external wallet. External-wallet rows are
/// read without locks (their balances never move here). Keeping one order
/// across the deposit and withdraw paths is what rules out deadlock between
/// concurrent confirmations sharing wallets.
pub struct PendingService {
    pool: PgPool,
    rail: Arc<dyn PaymentRail>,
}

impl PendingService {
    pub fn new(pool: PgPool, rail: Arc<dyn PaymentRail>) -> Self {
        Self { pool, rail }
    }

    /// Stages an external deposit. No balances move until the operator
    /// confirms; the rail token is acquired first so a rail failure leaves
    /// nothing behind.
    pub async fn create_pending_deposit(
        &self,
        wallet_id: Uuid,
        amount: BigDecimal,
        user_id: Uuid,
        service_user_id: Uuid,
    ) -> Result<PendingTransaction, LedgerError> {
        let external_transaction_id = self
            .rail
            .acquire_transaction_id(wallet_id, &amount)
            .await
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        let wallet = queries::find_wallet(&mut tx, wallet_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {wallet_id}")))?;
        if wallet.user_id != user_id {
            return Err(LedgerError::OwnershipMismatch);
        }

        let service_wallet =
            queries::find_service_wallet_for(&mut tx, service_user_id, wallet.currency_id)
                .await?
                .ok_or_else(|| {
                    LedgerError::NotFound(format!(
                        "service wallet for currency {}",
                        wallet.currency_id
                    ))
                })?;
        let external_wallet =
            queries::find_external_wallet_for(&mut tx, service_user_id, wallet.currency_id)
                .await?
                .ok_or_else(|| {
                    LedgerError::NotFound(format!(
                        "external wallet for currency {}",
                        wallet.currency_id
                    ))
                })?;

        // Service and user wallets share the deposit currency, so there is
        // no conversion leg here.
        let rate = BigDecimal::from(1);
        let converted = truncate_amount(&amount);

        let pending = PendingTransaction::new(
            TransactionType::Deposit,
            service_wallet.id,
            service_wallet.currency_id,
            amount,
            wallet.id,
            wallet.currency_id,
            rate,
            converted,
            user_id,
            external_wallet.id,
            external_transaction_id,
        );
        let inserted = queries::insert_pending_transaction(&mut tx, &pending).await?;

        tx.commit().await?;

        tracing::info!(
            "pending deposit {} staged for wallet {} amount {}",
            inserted.id,
            wallet_id,
            inserted.amount
        );

        Ok(inserted)
    }

    /// Stages an external withdrawal. The amount is held immediately
    /// (balance -> reserved) so it cannot be double-spent while the rail
    /// settles; rejection undoes the hold in full.
    pub async fn create_pending_withdraw(
        &self,
        wallet_id: Uuid,
        amount: BigDecimal,
        user_id: Uuid,
        service_user_id: Uuid,
    ) -> Result<PendingTransaction, LedgerError> {
        let external_transaction_id = self
            .rail
            .acquire_transaction_id(wallet_id, &amount)
            .await
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        let wallet = queries::lock_wallet(&mut tx, wallet_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {wallet_id}")))?;
        if wallet.user_id != user_id {
            return Err(LedgerError::OwnershipMismatch);
        }
        if wallet.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }

        reservation::reserve_in_tx(&mut tx, &wallet, &amount).await?;

        let user_external =
            queries::find_user_external_wallet_for(&mut tx, user_id, wallet.currency_id)
                .await?
                .ok_or_else(|| {
                    LedgerError::NotFound(format!(
                        "external destination for currency {}",
                        wallet.currency_id
                    ))
                })?;
        let external_wallet =
            queries::find_external_wallet_for(&mut tx, service_user_id, wallet.currency_id)
                .await?
                .ok_or_else(|| {
                    LedgerError::NotFound(format!(
                        "external wallet for currency {}",
                        wallet.currency_id
                    ))
                })?;

        // The rail must be able to pay the withdrawal out.
        if external_wallet.balance <= amount {
            return Err(LedgerError::InsufficientExternalLiquidity);
        }

        let rate = BigDecimal::from(1);
        let converted = truncate_amount(&amount);

        let pending = PendingTransaction::new(
            TransactionType::Withdraw,
            wallet.id,
            wallet.currency_id,
            amount,
            user_external.id,
            user_external.currency_id,
            rate,
            converted,
            user_id,
            external_wallet.id,
            external_transaction_id,
        );
        let inserted = queries::insert_pending_transaction(&mut tx, &pending).await?;

        tx.commit().await?;

        tracing::info!(
            "pending withdraw {} staged for wallet {} amount {} (held)",
            inserted.id,
            wallet_id,
            inserted.amount
        );

        Ok(inserted)
    }

    pub async fn confirm_deposit(
        &self,
        transaction_id: Uuid,
        new_status: &str,
        service_user_id: Uuid,
    ) -> Result<ConfirmOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let (pending, requested) = gate_confirmation(
            &mut tx,
            transaction_id,
            new_status,
            service_user_id,
            TransactionType::Deposit,
        )
        .await?;

        if requested == PendingStatus::Rejected {
            // Nothing moved at staging time, so closing the record is all
            // there is to do.
            let updated =
                queries::set_pending_status(&mut tx, pending.id, requested.as_str()).await?;
            tx.commit().await?;
            tracing::info!("pending deposit {} rejected", updated.id);
            return Ok(ConfirmOutcome::Rejected { pending: updated });
        }

        let user_wallet = queries::lock_wallet(&mut tx, pending.to_wallet_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {}", pending.to_wallet_id)))?;
        let service_wallet = queries::lock_service_wallet(&mut tx, pending.from_wallet_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("service wallet {}", pending.from_wallet_id))
            })?;

        let converted = pending.converted_amount.clone();

        // Leg 1: the rail credits the operator's service wallet.
        queries::apply_service_balance_delta(&mut tx, service_wallet.id, &converted).await?;
        let rail_leg = ServiceTransaction::new(
            TransactionType::Deposit,
            Some(pending.external_wallet_id),
            Some(pending.from_currency_id),
            pending.amount.clone(),
            Some(service_wallet.id),
            Some(service_wallet.currency_id),
            BigDecimal::from(1),
            pending.amount.clone(),
            service_wallet.user_id,
        );
        queries::insert_service_transaction(&mut tx, &rail_leg).await?;

        // Leg 2: pass the full converted amount through to the user.
        let debit = -&converted;
        queries::apply_service_balance_delta(&mut tx, service_wallet.id, &debit).await?;
        queries::apply_balance_delta(&mut tx, user_wallet.id, &converted).await?;
        let transfer = Transaction::new(
            TransactionType::Transfer,
            Some(service_wallet.id),
            Some(service_wallet.currency_id),
            converted.clone(),
            Some(user_wallet.id),
            Some(pending.to_currency_id),
            pending.rate.clone(),
            converted.clone(),
            pending.user_id,
        );
        let transfer = queries::insert_transaction(&mut tx, &transfer).await?;

        // Leg 3: commission comes back out of the user's proceeds.
        let commission = truncate_amount(&(&converted * &service_wallet.commission_rate));
        if &user_wallet.balance + &converted < commission {
            return Err(LedgerError::InsufficientFunds);
        }
        let commission_debit = -&commission;
        queries::apply_balance_delta(&mut tx, user_wallet.id, &commission_debit).await?;
        queries::apply_service_balance_delta(&mut tx, service_wallet.id, &commission).await?;
        let commission_row = Transaction::new(
            TransactionType::Commission,
            Some(user_wallet.id),
            Some(user_wallet.currency_id),
            commission.clone(),
            Some(service_wallet.id),
            Some(service_wallet.currency_id),
            BigDecimal::from(1),
            commission,
            pending.user_id,
        );
        queries::insert_transaction(&mut tx, &commission_row).await?;

        let updated = queries::set_pending_status(&mut tx, pending.id, requested.as_str()).await?;
        tx.commit().await?;

        tracing::info!(
            "pending deposit {} settled: user wallet {} credited {} less commission",
            updated.id,
            user_wallet.id,
            updated.converted_amount
        );

        Ok(ConfirmOutcome::Settled {
            transaction: transfer,
            pending: updated,
        })
    }

    pub async fn confirm_withdraw(
        &self,
        transaction_id: Uuid,
        new_status: &str,
        service_user_id: Uuid,
    ) -> Result<ConfirmOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let (pending, requested) = gate_confirmation(
            &mut tx,
            transaction_id,
            new_status,
            service_user_id,
            TransactionType::Withdraw,
        )
        .await?;

        let user_wallet = queries::lock_wallet(&mut tx, pending.from_wallet_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {}", pending.from_wallet_id)))?;
        let held = pending.converted_amount.clone();

        if user_wallet.reserved_balance < held {
            return Err(LedgerError::InsufficientReservedFunds);
        }

        if requested == PendingStatus::Rejected {
            // Undo the hold in full; the only durable trace is the terminal
            // status.
            queries::move_from_reserved(&mut tx, user_wallet.id, &held).await?;
            let updated =
                queries::set_pending_status(&mut tx, pending.id, requested.as_str()).await?;
            tx.commit().await?;
            tracing::info!("pending withdraw {} rejected, hold undone", updated.id);
            return Ok(ConfirmOutcome::Rejected { pending: updated });
        }

        let external_wallet = queries::find_external_wallet(&mut tx, pending.external_wallet_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("external wallet {}", pending.external_wallet_id))
            })?;
        let service_wallet = queries::lock_service_wallet_for(
            &mut tx,
            external_wallet.user_id,
            pending.from_currency_id,
        )
        .await?
        .ok_or_else(|| {
            LedgerError::NotFound(format!(
                "service wallet for currency {}",
                pending.from_currency_id
            ))
        })?;
        let user_external = queries::lock_user_external_wallet(&mut tx, pending.to_wallet_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("external destination {}", pending.to_wallet_id))
            })?;

        let commission = truncate_amount(&(&held * &external_wallet.commission_rate));
        let net = &held - &commission;

        queries::apply_service_balance_delta(&mut tx, service_wallet.id, &commission).await?;
        queries::add_cumulative_withdrawn(&mut tx, user_external.id, &net).await?;
        // The hold settles: reserved decreases, nothing returns to spendable.
        queries::consume_reserved(&mut tx, user_wallet.id, &held).await?;

        let withdraw_row = Transaction::new(
            TransactionType::Withdraw,
            Some(user_wallet.id),
            Some(user_wallet.currency_id),
            net.clone(),
            Some(user_external.id),
            Some(user_external.currency_id),
            pending.rate.clone(),
            net.clone(),
            pending.user_id,
        );
        let withdraw_row = queries::insert_transaction(&mut tx, &withdraw_row).await?;

        let commission_row = Transaction::new(
            TransactionType::Commission,
            Some(user_wallet.id),
            Some(user_wallet.currency_id),
            commission.clone(),
            Some(service_wallet.id),
            Some(service_wallet.currency_id),
            BigDecimal::from(1),
            commission,
            pending.user_id,
        );
        queries::insert_transaction(&mut tx, &commission_row).await?;

        let rail_leg = ServiceTransaction::new(
            TransactionType::Withdraw,
            Some(service_wallet.id),
            Some(service_wallet.currency_id),
            net.clone(),
            Some(external_wallet.id),
            Some(external_wallet.currency_id),
            BigDecimal::from(1),
            net,
            service_wallet.user_id,
        );
        queries::insert_service_transaction(&mut tx, &rail_leg).await?;

        let updated = queries::set_pending_status(&mut tx, pending.id, requested.as_str()).await?;
        tx.commit().await?;

        tracing::info!(
            "pending withdraw {} settled: wallet {} paid out {} net of commission",
            updated.id,
            user_wallet.id,
            withdraw_row.amount
        );

        Ok(ConfirmOutcome::Settled {
            transaction: withdraw_row,
            pending: updated,
        })
    }
}

/// Shared confirmation gates: operator authorization, pending-row lock,
/// status transition validity, and endpoint/type agreement. Returns the
/// locked pending row and the parsed terminal status, ready for settlement.
async fn gate_confirmation(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    transaction_id: Uuid,
    new_status: &str,
    service_user_id: Uuid,
    expected_kind: TransactionType,
) -> Result<(PendingTransaction, PendingStatus), LedgerError> {
    if !queries::service_user_exists(tx, service_user_id).await? {
        return Err(LedgerError::Unauthorized(format!(
            "service user {service_user_id} is not a known operator"
        )));
    }

    let pending = queries::lock_pending_transaction(tx, transaction_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("pending transaction {transaction_id}")))?;

    let requested: PendingStatus = new_status
        .parse()
        .map_err(|_| LedgerError::InvalidStatusTransition(format!("unknown status {new_status}")))?;
    if !requested.is_terminal() {
        return Err(LedgerError::InvalidStatusTransition(format!(
            "cannot move to {requested}"
        )));
    }
    if pending.status != PendingStatus::Pending.as_str() {
        return Err(LedgerError::InvalidStatusTransition(format!(
            "{} -> {}",
            pending.status, requested
        )));
    }
    if pending.kind != expected_kind.as_str() {
        return Err(LedgerError::InvalidTransactionType(format!(
            "expected {}, got {}",
            expected_kind, pending.kind
        )));
    }

    Ok((pending, requested))
}
