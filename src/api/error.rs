//! API error envelope with structured JSON responses.
//!
//! Every service error funnels into [`ApiError`] through a `From` impl that
//! picks the HTTP status, a stable machine code, and the client-facing copy.
//! Internal failures are logged server-side and surfaced as an opaque 500;
//! remote-provider failures keep their typed copy but map to 502/504.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::admin::AdminError;
use crate::attachments::AttachmentError;
use crate::auth::AuthError;
use crate::cases::CaseError;
use crate::dashboard::DashboardError;
use crate::db::DatabaseError;
use crate::messaging::MessagingError;
use crate::payments::PaymentError;
use crate::triage::TriageError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("{1}")]
    AuthRejected(&'static str, String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{1}")]
    NotFound(&'static str, String),
    #[error("{1}")]
    Conflict(&'static str, String),
    #[error("{1}")]
    BadRequest(&'static str, String),
    #[error("{0}")]
    PaymentIncomplete(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("{1}")]
    BadGateway(&'static str, String),
    #[error("{1}")]
    GatewayTimeout(&'static str, String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            ApiError::AuthRejected(code, message) => {
                (StatusCode::UNAUTHORIZED, *code, message.clone())
            }
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, "FORBIDDEN", message.clone()),
            ApiError::NotFound(code, message) => (StatusCode::NOT_FOUND, *code, message.clone()),
            ApiError::Conflict(code, message) => (StatusCode::CONFLICT, *code, message.clone()),
            ApiError::BadRequest(code, message) => {
                (StatusCode::BAD_REQUEST, *code, message.clone())
            }
            ApiError::PaymentIncomplete(message) => (
                StatusCode::PAYMENT_REQUIRED,
                "PAYMENT_INCOMPLETE",
                message.clone(),
            ),
            ApiError::PayloadTooLarge(message) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
                message.clone(),
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
            ),
            ApiError::BadGateway(code, message) => (StatusCode::BAD_GATEWAY, *code, message.clone()),
            ApiError::GatewayTimeout(code, message) => {
                (StatusCode::GATEWAY_TIMEOUT, *code, message.clone())
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::AccountNotFound => ApiError::AuthRejected("ACCOUNT_NOT_FOUND", message),
            AuthError::InvalidCredentials => {
                ApiError::AuthRejected("INVALID_CREDENTIALS", message)
            }
            AuthError::AccountSuspended { .. } => ApiError::Forbidden(message),
            AuthError::EmailTaken => ApiError::Conflict("EMAIL_TAKEN", message),
            AuthError::InvalidEmail => ApiError::BadRequest("INVALID_EMAIL", message),
            AuthError::WeakPassword => ApiError::BadRequest("WEAK_PASSWORD", message),
            AuthError::PasswordMismatch => ApiError::BadRequest("PASSWORD_MISMATCH", message),
            AuthError::RoleNotAllowed => ApiError::BadRequest("ROLE_NOT_ALLOWED", message),
            AuthError::Hashing(detail) => ApiError::Internal(detail),
            AuthError::Database(e) => e.into(),
        }
    }
}

impl From<CaseError> for ApiError {
    fn from(err: CaseError) -> Self {
        let message = err.to_string();
        match err {
            CaseError::NotFound => ApiError::NotFound("CASE_NOT_FOUND", message),
            CaseError::Forbidden => ApiError::Forbidden(message),
            CaseError::AlreadyClaimed => ApiError::Conflict("CASE_TAKEN", message),
            CaseError::NotCancellable => ApiError::Conflict("CASE_NOT_CANCELLABLE", message),
            CaseError::Database(e) => e.into(),
        }
    }
}

impl From<MessagingError> for ApiError {
    fn from(err: MessagingError) -> Self {
        let message = err.to_string();
        match err {
            MessagingError::NotFound => ApiError::NotFound("CONVERSATION_NOT_FOUND", message),
            MessagingError::CounterpartNotFound => ApiError::NotFound("USER_NOT_FOUND", message),
            MessagingError::Forbidden => ApiError::Forbidden(message),
            MessagingError::EmptyMessage => ApiError::BadRequest("EMPTY_MESSAGE", message),
            MessagingError::Database(e) => e.into(),
        }
    }
}

impl From<AttachmentError> for ApiError {
    fn from(err: AttachmentError) -> Self {
        let message = err.to_string();
        match err {
            AttachmentError::TooLarge { .. } => ApiError::PayloadTooLarge(message),
            AttachmentError::BadName => ApiError::BadRequest("BAD_FILE_NAME", message),
            AttachmentError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        let message = err.to_string();
        match err {
            TriageError::MissingSymptoms => ApiError::BadRequest("MISSING_SYMPTOMS", message),
            TriageError::MissingQuestion => ApiError::BadRequest("MISSING_QUESTION", message),
            TriageError::InvalidRating => ApiError::BadRequest("INVALID_RATING", message),
            TriageError::SessionNotFound => ApiError::NotFound("SESSION_NOT_FOUND", message),
            TriageError::Forbidden => ApiError::Forbidden(message),
            TriageError::Timeout(_) => ApiError::GatewayTimeout("AI_TIMEOUT", message),
            TriageError::ModelUnavailable => ApiError::BadGateway("AI_UNAVAILABLE", message),
            TriageError::AuthFailed => ApiError::BadGateway("AI_AUTH_FAILED", message),
            TriageError::Unreachable(_) => ApiError::BadGateway(
                "AI_UNREACHABLE",
                "AI model currently unavailable. Please try again later.".to_string(),
            ),
            TriageError::Upstream { status, body } => {
                tracing::warn!(status, body, "AI provider returned an error");
                ApiError::BadGateway(
                    "AI_UPSTREAM",
                    "AI model currently unavailable. Please try again later.".to_string(),
                )
            }
            TriageError::Http(detail) | TriageError::MalformedReply(detail) => {
                tracing::warn!(detail, "AI request failed");
                ApiError::BadGateway(
                    "AI_UPSTREAM",
                    "AI model currently unavailable. Please try again later.".to_string(),
                )
            }
            TriageError::Database(e) => e.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        let message = err.to_string();
        match err {
            PaymentError::MissingItemName => ApiError::BadRequest("MISSING_ITEM_NAME", message),
            PaymentError::InvalidAmount => ApiError::BadRequest("INVALID_AMOUNT", message),
            PaymentError::ProfileNotFound => ApiError::NotFound("PROFILE_NOT_FOUND", message),
            PaymentError::OrderNotFound => ApiError::NotFound("ORDER_NOT_FOUND", message),
            PaymentError::SessionUnknown(_) => {
                ApiError::NotFound("PAYMENT_SESSION_UNKNOWN", message)
            }
            PaymentError::NotVerified => ApiError::PaymentIncomplete(message),
            PaymentError::Forbidden => ApiError::Forbidden(message),
            PaymentError::Timeout(_) => ApiError::GatewayTimeout("PAYMENT_TIMEOUT", message),
            PaymentError::AuthFailed => ApiError::BadGateway("PAYMENT_AUTH_FAILED", message),
            PaymentError::Unreachable(_)
            | PaymentError::Upstream { .. }
            | PaymentError::Http(_)
            | PaymentError::MalformedReply(_) => {
                tracing::warn!(detail = message, "payment provider request failed");
                ApiError::BadGateway(
                    "PAYMENT_UPSTREAM",
                    "Payment provider is currently unavailable. Please try again later."
                        .to_string(),
                )
            }
            PaymentError::Database(e) => e.into(),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::Forbidden => ApiError::Forbidden(err.to_string()),
            DashboardError::Database(e) => e.into(),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        let message = err.to_string();
        match err {
            AdminError::Forbidden => ApiError::Forbidden(message),
            AdminError::UserNotFound => ApiError::NotFound("USER_NOT_FOUND", message),
            AdminError::SelfSuspension => ApiError::BadRequest("SELF_SUSPENSION", message),
            AdminError::MedicationNotFound => ApiError::NotFound("MEDICATION_NOT_FOUND", message),
            AdminError::MissingName => ApiError::BadRequest("MISSING_NAME", message),
            AdminError::NegativePrice => ApiError::BadRequest("INVALID_PRICE", message),
            AdminError::NegativeStock => ApiError::BadRequest("INVALID_STOCK", message),
            AdminError::Database(e) => e.into(),
        }
    }
}
