//! Transfer creation endpoint.
//!
//! The body is decoded by hand rather than through an extractor so malformed
//! JSON (including numeric amounts) maps to the stable
//! `{"message":"problems parsing JSON"}` body. Validation runs in a fixed
//! order — request id, sender, amount, recipient — and each failure carries a
//! stable `code` for clients.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::DomainError;
use crate::log::{PublishError, TransferPublisher};
use crate::types::{AccountId, Amount, RequestId, Transfer};

use super::AppState;

/// A wallet API error: a message plus an optional stable code clients can
/// key UI behavior off.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,

    message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl ApiError {
    fn validation(message: impl Into<String>, code: &'static str) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: Some(code),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: None,
        }
    }

    fn internal() -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
            code: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Incoming transfer request, before validation. Fields default so that a
/// missing party or amount reports a validation code rather than a decode
/// failure.
#[derive(Debug, Deserialize)]
struct TransferRequest {
    #[serde(default)]
    request_id: String,

    #[serde(default)]
    from: String,

    #[serde(default)]
    to: String,

    #[serde(default)]
    amount: Amount,
}

/// Handles `POST /api/v1/transfers`.
pub async fn create_transfer_handler<T>(
    State(app): State<AppState<T>>,
    body: Bytes,
) -> Response
where
    T: TransferPublisher,
{
    match create_transfer(&app, &body).await {
        Ok(transfer) => (StatusCode::CREATED, Json(transfer)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn create_transfer<T>(app: &AppState<T>, body: &[u8]) -> Result<Transfer, ApiError>
where
    T: TransferPublisher,
{
    let request: TransferRequest =
        serde_json::from_slice(body).map_err(|_| ApiError::bad_request("problems parsing JSON"))?;

    let id = validate_request_id(&request.request_id)?;
    let from = validate_sender(&request.from)?;
    let amount = validate_amount(request.amount, app.config())?;
    let to = validate_recipient(&request.to)?;

    let transfer = Transfer {
        id,
        from,
        to,
        amount,
        partition: 0,
        sequence_id: 0,
    };

    match app.transfers().create_transfer(&transfer).await {
        Ok(_) => Ok(transfer),
        Err(PublishError::Domain(err @ DomainError::TransferExists)) => {
            Err(ApiError::bad_request(err.to_string()))
        }
        Err(err) => {
            debug!(error = %err, handler = "create_transfer", "transfer not created");
            Err(ApiError::internal())
        }
    }
}

fn validate_request_id(raw: &str) -> Result<RequestId, ApiError> {
    RequestId::parse(raw).map_err(|_| {
        ApiError::validation("transfer request ID must be valid UUID", "request_id_invalid")
    })
}

fn validate_sender(raw: &str) -> Result<AccountId, ApiError> {
    AccountId::parse(raw)
        .map_err(|_| ApiError::validation("transfer sender account is required", "from_required"))
}

fn validate_amount(amount: Amount, config: &Config) -> Result<Amount, ApiError> {
    if amount < config.min_amount {
        return Err(ApiError::validation(
            format!("ensure this value is greater than {}", config.min_amount),
            "amount_lt_min",
        ));
    }

    let quantized = amount.quantize(config.decimal_places);
    if quantized.significant_digits() > config.decimal_max_digits {
        return Err(ApiError::validation(
            format!(
                "invalid amount: more than {} significant digits",
                config.decimal_max_digits
            ),
            "amount_invalid",
        ));
    }

    Ok(quantized)
}

fn validate_recipient(raw: &str) -> Result<AccountId, ApiError> {
    AccountId::parse(raw)
        .map_err(|_| ApiError::validation("transfer recipient account is required", "to_required"))
}
