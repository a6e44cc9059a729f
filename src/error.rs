// src/error.rs

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

use crate::domain::refund::InvalidRefundTransition;
use crate::domain::state::{InvalidTransition, StateDecodeError};
use crate::razorpay::RazorpayError;

/// Every failure leaving this subsystem carries a specific kind so the
/// caller can render an accurate message.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Forbidden(String),
    NotFound(&'static str),
    InvalidStateTransition { from: &'static str, action: &'static str },
    DuplicateRefundRequest,
    RefundWindowExpired,
    InvalidSignature,
    PaymentRecordNotFound,
    Gateway(RazorpayError),
    Db(sqlx::Error),
    CorruptRecord(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidStateTransition { .. } => "invalid_state_transition",
            ApiError::DuplicateRefundRequest => "duplicate_refund_request",
            ApiError::RefundWindowExpired => "refund_window_expired",
            ApiError::InvalidSignature => "invalid_signature",
            ApiError::PaymentRecordNotFound => "payment_record_not_found",
            ApiError::Gateway(_) => "gateway_error",
            ApiError::Db(_) | ApiError::CorruptRecord(_) => "internal",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(msg) => write!(f, "{msg}"),
            ApiError::Forbidden(msg) => write!(f, "{msg}"),
            ApiError::NotFound(what) => write!(f, "{what} not found"),
            ApiError::InvalidStateTransition { from, action } => {
                write!(f, "action '{action}' is not allowed while the record is '{from}'")
            }
            ApiError::DuplicateRefundRequest => {
                write!(f, "an open refund request already exists")
            }
            ApiError::RefundWindowExpired => write!(f, "the refund window has expired"),
            ApiError::InvalidSignature => write!(f, "payment signature verification failed"),
            ApiError::PaymentRecordNotFound => {
                write!(f, "no payment record matches this order")
            }
            ApiError::Gateway(e) => write!(f, "payment gateway error: {e}"),
            ApiError::Db(e) => write!(f, "database error: {e}"),
            ApiError::CorruptRecord(msg) => write!(f, "corrupt record: {msg}"),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidSignature => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::PaymentRecordNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidStateTransition { .. }
            | ApiError::DuplicateRefundRequest
            | ApiError::RefundWindowExpired => StatusCode::CONFLICT,
            // A timed-out gateway call is worth retrying; a rejected one
            // is not.
            ApiError::Gateway(e) if e.is_retryable() => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Db(_) | ApiError::CorruptRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, ApiError::Db(_) | ApiError::CorruptRecord(_)) {
            log::error!("internal error: {self}");
        }
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        ApiError::Db(value)
    }
}

impl From<RazorpayError> for ApiError {
    fn from(value: RazorpayError) -> Self {
        ApiError::Gateway(value)
    }
}

impl From<InvalidTransition> for ApiError {
    fn from(value: InvalidTransition) -> Self {
        ApiError::InvalidStateTransition {
            from: value.from,
            action: value.event,
        }
    }
}

impl From<InvalidRefundTransition> for ApiError {
    fn from(value: InvalidRefundTransition) -> Self {
        ApiError::InvalidStateTransition {
            from: value.from,
            action: value.action,
        }
    }
}

impl From<StateDecodeError> for ApiError {
    fn from(value: StateDecodeError) -> Self {
        ApiError::CorruptRecord(value.to_string())
    }
}
