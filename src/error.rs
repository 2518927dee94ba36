// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::service::ServiceError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
    /// Stable machine-readable code
    pub error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error")
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        use ServiceError as E;
        match err {
            E::Validation(msg) => ApiError::bad_request(msg),
            E::DuplicateIdentity => ApiError::new(
                StatusCode::CONFLICT,
                "duplicate_identity",
                "An account with this email already exists",
            ),
            E::InvalidCredentials => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid email or password",
            ),
            E::TokenMalformed | E::TokenExpired | E::TokenBadSignature => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid or expired token",
            ),
            E::ExchangeFailed(_) | E::ProfileFetchFailed(_) => ApiError::new(
                StatusCode::BAD_GATEWAY,
                "provider_error",
                "Sign-in with the identity provider failed",
            ),
            E::InvalidOAuthState => ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_oauth_state",
                "Authorization request is invalid or expired",
            ),
            E::InvalidOrExpiredToken => ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_confirmation_token",
                "Confirmation link is invalid or expired",
            ),
            E::TokenOwnershipMismatch => ApiError::new(
                StatusCode::FORBIDDEN,
                "confirmation_token_mismatch",
                "Confirmation link does not belong to this account",
            ),
            E::UnknownIdentity => ApiError::not_found("Account not found"),
            E::EmailAlreadyConfirmed => ApiError::new(
                StatusCode::CONFLICT,
                "email_already_confirmed",
                "Email is already confirmed",
            ),
            E::LedgerWriteFailed(_) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "temporarily_unavailable",
                "Service temporarily unavailable, please retry",
            ),
            E::Cancelled | E::DeadlineExceeded => ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                "Request timed out",
            ),
            E::SigningFailure(_) | E::Internal(_) => ApiError::internal(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}
