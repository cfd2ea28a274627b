use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::BigDecimal;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of a ledger movement. Stored as text in `transactions.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Transfer,
    Reserve,
    Release,
    Commission,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::Transfer => "transfer",
            TransactionType::Reserve => "reserve",
            TransactionType::Release => "release",
            TransactionType::Commission => "commission",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a staged external movement: `pending` until the operator
/// confirms, then terminally `paid` or `rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Pending,
    Paid,
    Rejected,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::Pending => "pending",
            PendingStatus::Paid => "paid",
            PendingStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PendingStatus::Paid | PendingStatus::Rejected)
    }
}

impl FromStr for PendingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PendingStatus::Pending),
            "paid" => Ok(PendingStatus::Paid),
            "rejected" => Ok(PendingStatus::Rejected),
            other => Err(format!("unknown pending status: {other}")),
        }
    }
}

impl fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger rows are written settled and never revisited.
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Currency {
    pub id: i32,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub id: i32,
    pub from_currency_id: i32,
    pub to_currency_id: i32,
    pub rate: BigDecimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency_id: i32,
    pub balance: BigDecimal,
    pub reserved_balance: BigDecimal,
}

/// Operator-owned wallet used to book commission and rail-side settlement.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServiceWallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency_id: i32,
    pub balance: BigDecimal,
    pub reserved_balance: BigDecimal,
    pub commission_rate: BigDecimal,
}

/// Operator-side mirror of an external payment rail's balance.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExternalWallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency_id: i32,
    pub balance: BigDecimal,
    pub reserved_balance: BigDecimal,
    pub commission_rate: BigDecimal,
}

/// User-side record of an external destination; tracks lifetime withdrawals
/// for limit checks.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserExternalWallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency_id: i32,
    pub wallet_name: String,
    pub cumulative_withdrawn: BigDecimal,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub from_wallet_id: Option<Uuid>,
    pub from_currency_id: Option<i32>,
    pub amount: BigDecimal,
    pub to_wallet_id: Option<Uuid>,
    pub to_currency_id: Option<i32>,
    pub rate: BigDecimal,
    pub converted_amount: BigDecimal,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TransactionType,
        from_wallet_id: Option<Uuid>,
        from_currency_id: Option<i32>,
        amount: BigDecimal,
        to_wallet_id: Option<Uuid>,
        to_currency_id: Option<i32>,
        rate: BigDecimal,
        converted_amount: BigDecimal,
        user_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_wallet_id,
            from_currency_id,
            amount,
            to_wallet_id,
            to_currency_id,
            rate,
            converted_amount,
            kind: kind.as_str().to_string(),
            status: STATUS_COMPLETED.to_string(),
            created_at: Utc::now(),
            user_id,
        }
    }

    /// Hold: funds leave the spendable balance, no receiving wallet.
    pub fn reserve(wallet: &Wallet, amount: BigDecimal) -> Self {
        Self::new(
            TransactionType::Reserve,
            Some(wallet.id),
            Some(wallet.currency_id),
            amount.clone(),
            None,
            None,
            BigDecimal::from(1),
            amount,
            wallet.user_id,
        )
    }

    /// Undo of a hold: funds return to the spendable balance.
    pub fn release(wallet: &Wallet, amount: BigDecimal) -> Self {
        Self::new(
            TransactionType::Release,
            None,
            None,
            amount.clone(),
            Some(wallet.id),
            Some(wallet.currency_id),
            BigDecimal::from(1),
            amount,
            wallet.user_id,
        )
    }
}

/// Operator-internal movement, same shape as `Transaction` but kept in its
/// own append-only table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServiceTransaction {
    pub id: Uuid,
    pub from_wallet_id: Option<Uuid>,
    pub from_currency_id: Option<i32>,
    pub amount: BigDecimal,
    pub to_wallet_id: Option<Uuid>,
    pub to_currency_id: Option<i32>,
    pub rate: BigDecimal,
    pub converted_amount: BigDecimal,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
}

impl ServiceTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TransactionType,
        from_wallet_id: Option<Uuid>,
        from_currency_id: Option<i32>,
        amount: BigDecimal,
        to_wallet_id: Option<Uuid>,
        to_currency_id: Option<i32>,
        rate: BigDecimal,
        converted_amount: BigDecimal,
        service_user_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_wallet_id,
            from_currency_id,
            amount,
            to_wallet_id,
            to_currency_id,
            rate,
            converted_amount,
            kind: kind.as_str().to_string(),
            status: STATUS_COMPLETED.to_string(),
            created_at: Utc::now(),
            user_id: service_user_id,
        }
    }
}

/// Staged external movement awaiting operator confirmation.
/// `external_transaction_id` is the rail-issued idempotency key.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: Uuid,
    pub from_wallet_id: Uuid,
    pub from_currency_id: i32,
    pub amount: BigDecimal,
    pub to_wallet_id: Uuid,
    pub to_currency_id: i32,
    pub rate: BigDecimal,
    pub converted_amount: BigDecimal,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub external_wallet_id: Uuid,
    pub external_transaction_id: Uuid,
}

impl PendingTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TransactionType,
        from_wallet_id: Uuid,
        from_currency_id: i32,
        amount: BigDecimal,
        to_wallet_id: Uuid,
        to_currency_id: i32,
        rate: BigDecimal,
        converted_amount: BigDecimal,
        user_id: Uuid,
        external_wallet_id: Uuid,
        external_transaction_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_wallet_id,
            from_currency_id,
            amount,
            to_wallet_id,
            to_currency_id,
            rate,
            converted_amount,
            kind: kind.as_str().to_string(),
            status: PendingStatus::Pending.as_str().to_string(),
            created_at: Utc::now(),
            user_id,
            external_wallet_id,
            external_transaction_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_status_round_trip() {
        for status in [
            PendingStatus::Pending,
            PendingStatus::Paid,
            PendingStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<PendingStatus>().unwrap(), status);
        }
        assert!("closed".parse::<PendingStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!PendingStatus::Pending.is_terminal());
        assert!(PendingStatus::Paid.is_terminal());
        assert!(PendingStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_reserve_transaction_shape() {
        let wallet = Wallet {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            currency_id: 1,
            balance: BigDecimal::from(100),
            reserved_balance: BigDecimal::from(0),
        };
        let tx = Transaction::reserve(&wallet, BigDecimal::from(25));

        assert_eq!(tx.kind, "reserve");
        assert_eq!(tx.status, STATUS_COMPLETED);
        assert_eq!(tx.from_wallet_id, Some(wallet.id));
        assert_eq!(tx.to_wallet_id, None);
        assert_eq!(tx.amount, BigDecimal::from(25));
    }

    #[test]
    fn test_release_transaction_shape() {
        let wallet = Wallet {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            currency_id: 1,
            balance: BigDecimal::from(100),
            reserved_balance: BigDecimal::from(25),
        };
        let tx = Transaction::release(&wallet, BigDecimal::from(25));

        assert_eq!(tx.kind, "release");
        assert_eq!(tx.from_wallet_id, None);
        assert_eq!(tx.to_wallet_id, Some(wallet.id));
    }

    #[test]
    fn test_new_pending_transaction_starts_pending() {
        let pt = PendingTransaction::new(
            TransactionType::Deposit,
            Uuid::new_v4(),
            1,
            BigDecimal::from(100),
            Uuid::new_v4(),
            1,
            BigDecimal::from(1),
            BigDecimal::from(100),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );

        assert_eq!(pt.status, "pending");
        assert_eq!(pt.kind, "deposit");
    }
}
