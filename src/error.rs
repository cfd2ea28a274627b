use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Closed set of failure kinds surfaced by the ledger engine. Every mutating
/// operation runs in one database transaction, so any of these implies a full
/// rollback; `Persistence` is the only kind a caller may retry.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("wallet is not owned by the acting user")]
    OwnershipMismatch,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("insufficient reserved funds")]
    InsufficientReservedFunds,

    #[error("insufficient external liquidity")]
    InsufficientExternalLiquidity,

    #[error("exchange rate not found: {0}")]
    ExchangeRateNotFound(String),

    #[error("invalid status transition: {0}")]
    InvalidStatusTransition(String),

    #[error("invalid transaction type: {0}")]
    InvalidTransactionType(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Persistence(e.to_string())
    }
}

impl LedgerError {
    /// Stable machine-readable kind, independent of the human message.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "not_found",
            LedgerError::OwnershipMismatch => "ownership_mismatch",
            LedgerError::InsufficientFunds => "insufficient_funds",
            LedgerError::InsufficientReservedFunds => "insufficient_reserved_funds",
            LedgerError::InsufficientExternalLiquidity => "insufficient_external_liquidity",
            LedgerError::ExchangeRateNotFound(_) => "exchange_rate_not_found",
            LedgerError::InvalidStatusTransition(_) => "invalid_status_transition",
            LedgerError::InvalidTransactionType(_) => "invalid_transaction_type",
            LedgerError::Unauthorized(_) => "unauthorized",
            LedgerError::Persistence(_) => "persistence_failure",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::OwnershipMismatch => StatusCode::FORBIDDEN,
            LedgerError::InsufficientFunds
            | LedgerError::InsufficientReservedFunds
            | LedgerError::InsufficientExternalLiquidity => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::ExchangeRateNotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::InvalidStatusTransition(_) => StatusCode::CONFLICT,
            LedgerError::InvalidTransactionType(_) => StatusCode::BAD_REQUEST,
            LedgerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LedgerError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status_code() {
        let error = LedgerError::NotFound("wallet".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_ownership_mismatch_status_code() {
        assert_eq!(
            LedgerError::OwnershipMismatch.status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_insufficient_funds_status_code() {
        assert_eq!(
            LedgerError::InsufficientFunds.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_invalid_status_transition_status_code() {
        let error = LedgerError::InvalidStatusTransition("paid -> rejected".to_string());
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_unauthorized_status_code() {
        let error = LedgerError::Unauthorized("unknown operator".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_persistence_status_code() {
        let error = LedgerError::from(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(LedgerError::InsufficientFunds.kind(), "insufficient_funds");
        assert_eq!(
            LedgerError::ExchangeRateNotFound("USD->EUR".to_string()).kind(),
            "exchange_rate_not_found"
        );
    }

    #[tokio::test]
    async fn test_error_response_shape() {
        let error = LedgerError::InsufficientFunds;
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
