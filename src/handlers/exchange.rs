use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::types::BigDecimal;
use utoipa::IntoParams;

use crate::AppState;
use crate::error::LedgerError;
use crate::services::RateService;
use crate::services::rates::ConversionPreview;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PreviewParams {
    /// Amount in the source currency.
    #[param(value_type = String)]
    pub amount: BigDecimal,
    /// Source currency symbol, e.g. "USD".
    pub from: String,
    /// Target currency symbol, e.g. "EUR".
    pub to: String,
}

#[utoipa::path(
    get,
    path = "/exchange/preview",
    params(PreviewParams),
    responses(
        (status = 200, description = "Conversion preview", body = ConversionPreview),
        (status = 404, description = "Unknown currency or missing rate pair")
    ),
    tag = "Exchange"
)]
pub async fn preview(
    State(state): State<AppState>,
    Query(params): Query<PreviewParams>,
) -> Result<impl IntoResponse, LedgerError> {
    let service = RateService::new(state.db.clone());
    let preview = service
        .preview_conversion(params.amount, &params.from, &params.to)
        .await?;
    Ok(Json(preview))
}
