use chrono::NaiveTime;
use thiserror::Error;

use grid::error::GridError;

use crate::order::model::OrderStatus;

/// Caller-visible failures of the booking core.
///
/// Every variant carries a stable machine-readable code next to its
/// message; callers never see a bare panic.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("bucket starting {bucket} is already taken")]
    Conflict { bucket: NaiveTime },

    #[error("illegal order transition: {from} -> {to}")]
    IllegalTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("payment gateway failure: {0}")]
    ExternalService(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("compensation failed: {0}")]
    Compensation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BookingError {
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "VALIDATION",
            BookingError::Conflict { .. } => "SLOT_CONFLICT",
            BookingError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            BookingError::ExternalService(_) => "GATEWAY_FAILURE",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::Compensation(_) => "COMPENSATION_FAILURE",
            BookingError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether retrying the whole request can succeed. Conflicts clear
    /// when the competing hold settles or expires; gateway failures are
    /// transient by assumption.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            BookingError::Conflict { .. } | BookingError::ExternalService(_)
        )
    }
}

impl From<GridError> for BookingError {
    fn from(e: GridError) -> Self {
        match e {
            GridError::BucketUnavailable { start } => BookingError::Conflict { bucket: start },
            GridError::UnknownBucket { start } => {
                BookingError::Validation(format!("no bucket starts at {start}"))
            }
            other => BookingError::Internal(anyhow::Error::new(other)),
        }
    }
}
