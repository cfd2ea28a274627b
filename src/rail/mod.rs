//! Payment-rail boundary. The core never drives the rail; it only asks it
//! for the opaque transaction token that keys a pending settlement, and the
//! rail's operator later calls the confirm endpoints.

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{Config, Error as FailsafeError, StateMachine, backoff, failure_policy};
use reqwest::Client;
use serde::Deserialize;
use sqlx::types::BigDecimal;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RailError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("invalid response from payment rail: {0}")]
    InvalidResponse(String),
    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[async_trait]
pub trait PaymentRail: Send + Sync {
    /// Registers the intent to move `amount` for `wallet_id` and returns the
    /// rail-side transaction id used as the settlement idempotency key.
    async fn acquire_transaction_id(
        &self,
        wallet_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<Uuid, RailError>;
}

#[derive(Debug, Deserialize)]
struct RailTokenResponse {
    transaction_id: Uuid,
}

/// HTTP client for the external payment rail.
#[derive(Clone)]
pub struct RailClient {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl RailClient {
    /// Creates a new RailClient with the specified base URL
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        RailClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }
}

#[async_trait]
impl PaymentRail for RailClient {
    async fn acquire_transaction_id(
        &self,
        wallet_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<Uuid, RailError> {
        let url = format!("{}/transactions", self.base_url.trim_end_matches('/'));
        let client = self.client.clone();
        let body = serde_json::json!({
            "wallet_id": wallet_id,
            "amount": amount.to_string(),
        });

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).json(&body).send().await?;

                if !response.status().is_success() {
                    return Err(RailError::InvalidResponse(format!(
                        "unexpected status {}",
                        response.status()
                    )));
                }

                let token = response.json::<RailTokenResponse>().await?;
                Ok(token.transaction_id)
            })
            .await;

        match result {
            Ok(id) => Ok(id),
            Err(FailsafeError::Rejected) => Err(RailError::CircuitBreakerOpen(
                "payment rail circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

/// In-process stand-in used by local runs and the test suite; mints a fresh
/// token per call, which is exactly the contract the core relies on.
#[derive(Debug, Clone, Default)]
pub struct MockRail;

#[async_trait]
impl PaymentRail for MockRail {
    async fn acquire_transaction_id(
        &self,
        _wallet_id: Uuid,
        _amount: &BigDecimal,
    ) -> Result<Uuid, RailError> {
        Ok(Uuid::new_v4())
    }
}
