//! HTTP ingress for the payment pipeline.
//!
//! Translates incoming requests into the wallet domain and back: validates
//! and normalizes transfer requests, hands them to a transfer publisher, and
//! maps failures to stable error bodies.
//!
//! # Endpoints
//!
//! - `POST /api/v1/transfers` — accepts a transfer request, responds 201 with
//!   the normalized transfer
//! - `GET /healthz` — liveness probe

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::config::Config;
use crate::log::TransferPublisher;

pub mod health;
pub mod transfers;

pub use health::health_handler;
pub use transfers::create_transfer_handler;

/// Shared application state, passed to handlers via axum's `State`.
pub struct AppState<T> {
    inner: Arc<AppStateInner<T>>,
}

struct AppStateInner<T> {
    transfers: T,
    config: Config,
}

// Manual impl: cloning the handle must not require `T: Clone`.
impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> AppState<T> {
    /// Creates state over a transfer publisher and pipeline configuration.
    pub fn new(transfers: T, config: Config) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { transfers, config }),
        }
    }

    /// The transfer publisher.
    pub fn transfers(&self) -> &T {
        &self.inner.transfers
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

/// Builds the axum router with all endpoints.
pub fn build_router<T>(state: AppState<T>) -> Router
where
    T: TransferPublisher + 'static,
{
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/v1/transfers", post(create_transfer_handler::<T>))
        .with_state(state)
}
