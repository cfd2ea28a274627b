use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::error::LedgerError;
use crate::middleware::TrustedUser;
use crate::services::PendingService;

/// Operator decision on a staged external movement. `new_status` must be
/// `paid` or `rejected`; anything else is an invalid transition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    pub transaction_id: Uuid,
    pub new_status: String,
}

pub async fn confirm_deposit(
    State(state): State<AppState>,
    TrustedUser(service_user_id): TrustedUser,
    Json(payload): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let service = PendingService::new(state.db.clone(), state.rail.clone());
    let outcome = service
        .confirm_deposit(payload.transaction_id, &payload.new_status, service_user_id)
        .await?;
    Ok(Json(outcome))
}

pub async fn confirm_withdraw(
    State(state): State<AppState>,
    TrustedUser(service_user_id): TrustedUser,
    Json(payload): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let service = PendingService::new(state.db.clone(), state.rail.clone());
    let outcome = service
        .confirm_withdraw(payload.transaction_id, &payload.new_status, service_user_id)
        .await?;
    Ok(Json(outcome))
}
