pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rail;
pub mod services;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::rail::PaymentRail;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub rail: Arc<dyn PaymentRail>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/wallet/transfer", post(handlers::wallets::transfer))
        .route("/wallet/deposit", post(handlers::wallets::deposit))
        .route("/wallet/withdraw", post(handlers::wallets::withdraw))
        .route("/wallets", get(handlers::wallets::list_wallets))
        .route(
            "/wallets/:id/transactions",
            get(handlers::wallets::wallet_transactions),
        )
        .route("/transactions", get(handlers::wallets::list_transactions))
        .route(
            "/transactions/pending/:id",
            get(handlers::wallets::get_pending_transaction),
        )
        .route("/exchange/preview", get(handlers::exchange::preview))
        .route(
            "/service/deposit/confirm",
            post(handlers::operator::confirm_deposit),
        )
        .route(
            "/service/withdraw/confirm",
            post(handlers::operator::confirm_withdraw),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
