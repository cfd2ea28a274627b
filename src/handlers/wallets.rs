use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use sqlx::types::BigDecimal;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::db::queries;
use crate::error::LedgerError;
use crate::middleware::TrustedUser;
use crate::services::{PendingService, TransferService};

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferRequest {
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub from_wallet_id: Uuid,
    pub to_wallet_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExternalMovementRequest {
    pub wallet_id: Uuid,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    /// Operator whose service and external wallets settle this movement.
    pub service_user_id: Uuid,
}

/// Non-positive amounts are a malformed request, rejected at the boundary
/// before the engine is involved.
fn reject_non_positive(amount: &BigDecimal) -> Option<Response> {
    if *amount <= BigDecimal::from(0) {
        let body = Json(json!({
            "error": "invalid_amount",
            "message": "amount must be positive",
            "status": StatusCode::BAD_REQUEST.as_u16(),
        }));
        return Some((StatusCode::BAD_REQUEST, body).into_response());
    }
    None
}

pub async fn transfer(
    State(state): State<AppState>,
    TrustedUser(user_id): TrustedUser,
    Json(payload): Json<TransferRequest>,
) -> Result<Response, LedgerError> {
    if let Some(rejection) = reject_non_positive(&payload.amount) {
        return Ok(rejection);
    }

    let service = TransferService::new(state.db.clone());
    let transaction = service
        .transfer(
            payload.amount,
            payload.from_wallet_id,
            payload.to_wallet_id,
            user_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(transaction)).into_response())
}

pub async fn deposit(
    State(state): State<AppState>,
    TrustedUser(user_id): TrustedUser,
    Json(payload): Json<ExternalMovementRequest>,
) -> Result<Response, LedgerError> {
    if let Some(rejection) = reject_non_positive(&payload.amount) {
        return Ok(rejection);
    }

    let service = PendingService::new(state.db.clone(), state.rail.clone());
    let pending = service
        .create_pending_deposit(
            payload.wallet_id,
            payload.amount,
            user_id,
            payload.service_user_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(pending)).into_response())
}

pub async fn withdraw(
    State(state): State<AppState>,
    TrustedUser(user_id): TrustedUser,
    Json(payload): Json<ExternalMovementRequest>,
) -> Result<Response, LedgerError> {
    if let Some(rejection) = reject_non_positive(&payload.amount) {
        return Ok(rejection);
    }

    let service = PendingService::new(state.db.clone(), state.rail.clone());
    let pending = service
        .create_pending_withdraw(
            payload.wallet_id,
            payload.amount,
            user_id,
            payload.service_user_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(pending)).into_response())
}

pub async fn list_wallets(
    State(state): State<AppState>,
    TrustedUser(user_id): TrustedUser,
) -> Result<impl IntoResponse, LedgerError> {
    let wallets = queries::wallets_by_user(&state.db, user_id).await?;
    Ok(Json(wallets))
}

#[derive(Debug, Deserialize)]
pub struct Paging {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Paging {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 500)
    }

    fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

pub async fn list_transactions(
    State(state): State<AppState>,
    TrustedUser(user_id): TrustedUser,
    Query(paging): Query<Paging>,
) -> Result<impl IntoResponse, LedgerError> {
    let transactions =
        queries::transactions_by_user(&state.db, user_id, paging.limit(), paging.offset()).await?;
    Ok(Json(transactions))
}

pub async fn get_pending_transaction(
    State(state): State<AppState>,
    TrustedUser(user_id): TrustedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, LedgerError> {
    let pending = queries::get_pending_transaction(&state.db, id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("pending transaction {id}")))?;
    if pending.user_id != user_id {
        return Err(LedgerError::OwnershipMismatch);
    }
    Ok(Json(pending))
}

pub async fn wallet_transactions(
    State(state): State<AppState>,
    TrustedUser(user_id): TrustedUser,
    Path(wallet_id): Path<Uuid>,
    Query(paging): Query<Paging>,
) -> Result<impl IntoResponse, LedgerError> {
    let wallet = queries::get_wallet(&state.db, wallet_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("wallet {wallet_id}")))?;
    if wallet.user_id != user_id {
        return Err(LedgerError::OwnershipMismatch);
    }

    let transactions = queries::transactions_by_wallet(
        &state.db,
        user_id,
        wallet_id,
        paging.limit(),
        paging.offset(),
    )
    .await?;
    Ok(Json(transactions))
}
