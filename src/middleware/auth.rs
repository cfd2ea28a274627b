use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::LedgerError;

/// Acting-user id injected by the upstream identity provider. The gateway
/// authenticates the caller and forwards the id in `x-user-id`; the core
/// trusts that value and never re-derives it.
#[derive(Debug, Clone, Copy)]
pub struct TrustedUser(pub Uuid);

pub const USER_ID_HEADER: &str = "x-user-id";

#[async_trait]
impl<S> FromRequestParts<S> for TrustedUser
where
    S: Send + Sync,
{
    type Rejection = LedgerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(TrustedUser)
            .ok_or_else(|| {
                LedgerError::Unauthorized(format!("missing or invalid {USER_ID_HEADER} header"))
            })
    }
}
