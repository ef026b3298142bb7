use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No wallet provider available")]
    WalletUnavailable,

    #[error("Unsupported network: chain id {0}")] UnsupportedNetwork(u64),

    #[error("Payment failed: {0}")] PaymentFailed(String),

    #[error("Transaction check failed: {0}")] ReconciliationTransientFailure(String),

    #[error("Failed to record entitlement: {0}")] EntitlementWriteFailure(String),

    #[error("Store unavailable: {0}")] StoreUnavailable(#[from] sea_orm::DbErr),

    #[error("Invalid input: {0}")] InvalidInput(String),

    #[error("Not found: {0}")] NotFound(String),

    #[error("Unauthorized: {0}")] Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Configuration error: {0}")] Config(String),

    #[error("Internal error: {0}")] Internal(String),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// Whether a background job should simply wait for its next tick.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            AppError::ReconciliationTransientFailure(_) |
                AppError::EntitlementWriteFailure(_) |
                AppError::StoreUnavailable(_)
        )
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let (code, message, field) = match self {
            AppError::WalletUnavailable =>
                (
                    "WALLET_UNAVAILABLE",
                    "No wallet detected. Install a wallet such as MetaMask to continue.".to_string(),
                    None,
                ),
            AppError::UnsupportedNetwork(chain_id) =>
                (
                    "UNSUPPORTED_NETWORK",
                    format!("Chain {} is not supported. Please switch networks.", chain_id),
                    Some("chain_id".to_string()),
                ),
            AppError::PaymentFailed(msg) => ("PAYMENT_FAILED", format!("Payment failed: {}", msg), None),
            AppError::ReconciliationTransientFailure(_) =>
                (
                    "TRANSACTION_CHECK_FAILED",
                    "Could not verify the transaction right now. It will be retried.".to_string(),
                    None,
                ),
            AppError::EntitlementWriteFailure(_) =>
                (
                    "ENTITLEMENT_WRITE_FAILED",
                    "Your payment was confirmed but access could not be recorded yet. It will be retried.".to_string(),
                    None,
                ),
            AppError::StoreUnavailable(_) =>
                ("STORE_UNAVAILABLE", "Something went wrong. Please try again.".to_string(), None),
            AppError::InvalidInput(msg) => ("INVALID_INPUT", msg.clone(), None),
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone(), None),
            AppError::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone(), None),
            AppError::Forbidden => ("FORBIDDEN", "This wallet is not allowed to do that".to_string(), None),
            AppError::Config(msg) => ("CONFIG_ERROR", msg.clone(), None),
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg.clone(), None),
        };

        ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                field,
            },
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => axum::http::StatusCode::UNAUTHORIZED,
            AppError::Forbidden => axum::http::StatusCode::FORBIDDEN,
            | AppError::InvalidInput(_)
            | AppError::UnsupportedNetwork(_)
            | AppError::WalletUnavailable => {
                axum::http::StatusCode::BAD_REQUEST
            }
            AppError::PaymentFailed(_) => axum::http::StatusCode::PAYMENT_REQUIRED,
            | AppError::ReconciliationTransientFailure(_)
            | AppError::StoreUnavailable(_) => {
                axum::http::StatusCode::SERVICE_UNAVAILABLE
            }
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let response = self.to_error_response();
        (status, axum::Json(response)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
