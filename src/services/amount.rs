//! Money rounding. Every conversion and commission path goes through
//! `truncate_amount` so no two code paths round differently.

use sqlx::types::BigDecimal;

/// Scale of every money column in the schema.
pub const MONEY_SCALE: i64 = 10;

/// Truncates toward zero at `MONEY_SCALE` decimal places. A converted amount
/// must never exceed `amount * rate`; dropping digits instead of rounding
/// guarantees no value is minted on conversion.
pub fn truncate_amount(value: &BigDecimal) -> BigDecimal {
    // `with_scale` drops excess digits via integer division, which rounds
    // toward zero; it pads zeros when the value is shorter than the scale.
    value.with_scale(MONEY_SCALE)
}
