use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::engine::{LedgerError, ProjectError, RiskError};

/// Application-level error taxonomy.
///
/// Validation and risk failures are rejected at the boundary before any
/// ledger mutation. `Consistency` means the stored aggregates diverged from
/// an event replay; it aborts the operation and is never downgraded.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Risk rejected: {0}")]
    RiskRejected(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Exit quantity {requested} exceeds remaining position {remaining}")]
    OverExit { requested: i64, remaining: i64 },
    #[error("Unknown plan: {0}")]
    UnknownPlan(i64),
    #[error("Ledger consistency fault: {0}")]
    Consistency(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for the response body.
    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::RiskRejected(_) => "RISK_REJECTED",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::OverExit { .. } => "OVER_EXIT",
            AppError::UnknownPlan(_) => "UNKNOWN_PLAN",
            AppError::Consistency(_) => "CONSISTENCY_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::RiskRejected(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidState(_) | AppError::OverExit { .. } => StatusCode::CONFLICT,
            AppError::UnknownPlan(_) => StatusCode::NOT_FOUND,
            AppError::Config(_) | AppError::Consistency(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<RiskError> for AppError {
    fn from(err: RiskError) -> Self {
        match err {
            RiskError::ZeroRiskDistance => AppError::Validation(err.to_string()),
            RiskError::CriticalRiskReward(_) => AppError::RiskRejected(err.to_string()),
            RiskError::InvalidLot { .. } => AppError::Validation(err.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::OverExit {
                requested,
                remaining,
            } => AppError::OverExit {
                requested,
                remaining,
            },
            LedgerError::NonPositiveQuantity(_) => AppError::Validation(err.to_string()),
            LedgerError::SellBeforeEntry => AppError::InvalidState(err.to_string()),
        }
    }
}

impl From<ProjectError> for AppError {
    fn from(err: ProjectError) -> Self {
        AppError::InvalidState(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
