use serde::Serialize;
use sqlx::PgPool;
use sqlx::types::BigDecimal;
use utoipa::ToSchema;

use crate::db::models::{Currency, ExchangeRate};
use crate::db::queries;
use crate::error::LedgerError;
use crate::services::amount::truncate_amount;

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversionPreview {
    #[schema(value_type = String)]
    pub rate: BigDecimal,
    #[schema(value_type = String)]
    pub converted_amount: BigDecimal,
}

/// Read side of the exchange-rate catalog plus the idempotent upserts the
/// external feed ingester writes through. Lookups are strictly directional:
/// a missing (to, from) pair is never derived from (from, to).
pub struct RateService {
    pool: PgPool,
}

impl RateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn preview_conversion(
        &self,
        amount: BigDecimal,
        from_symbol: &str,
        to_symbol: &str,
    ) -> Result<ConversionPreview, LedgerError> {
        let from = queries::get_currency_by_symbol(&self.pool, from_symbol)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("currency {from_symbol}")))?;
        let to = queries::get_currency_by_symbol(&self.pool, to_symbol)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("currency {to_symbol}")))?;

        let rate = if from.id == to.id {
            BigDecimal::from(1)
        } else {
            queries::get_rate_from_pool(&self.pool, from.id, to.id)
                .await?
                .ok_or_else(|| {
                    LedgerError::ExchangeRateNotFound(format!("{from_symbol} -> {to_symbol}"))
                })?
        };

        let converted_amount = truncate_amount(&(&amount * &rate));
        Ok(ConversionPreview {
            rate,
            converted_amount,
        })
    }

    /// Upsert keyed on symbol; replaying the feed is harmless.
    pub async fn ingest_currency(&self, name: &str, symbol: &str) -> Result<Currency, LedgerError> {
        Ok(queries::upsert_currency(&self.pool, name, symbol).await?)
    }

    /// Upsert keyed on the directed (from, to) pair. The reciprocal pair is
    /// written only if the feed supplies it.
    pub async fn ingest_rate(
        &self,
        from_symbol: &str,
        to_symbol: &str,
        rate: BigDecimal,
    ) -> Result<ExchangeRate, LedgerError> {
        let from = queries::get_currency_by_symbol(&self.pool, from_symbol)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("currency {from_symbol}")))?;
        let to = queries::get_currency_by_symbol(&self.pool, to_symbol)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("currency {to_symbol}")))?;

        let updated = queries::upsert_rate(&self.pool, from.id, to.id, &rate).await?;
        tracing::info!(
            "exchange rate {} -> {} updated to {}",
            from_symbol,
            to_symbol,
            updated.rate
        );
        Ok(updated)
    }
}
