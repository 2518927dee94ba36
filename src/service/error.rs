// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::auth::TokenError;

/// Errors returned by [`super::AuthService`].
///
/// Variants carrying a `String` hold the internal cause for server-side
/// logging; the HTTP layer never echoes it to callers.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("identity already exists")]
    DuplicateIdentity,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("session token is malformed")]
    TokenMalformed,

    #[error("session token has expired")]
    TokenExpired,

    #[error("session token signature is invalid")]
    TokenBadSignature,

    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("provider profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    #[error("OAuth state is invalid or expired")]
    InvalidOAuthState,

    #[error("confirmation token is invalid or expired")]
    InvalidOrExpiredToken,

    #[error("confirmation token belongs to another identity")]
    TokenOwnershipMismatch,

    #[error("ledger write failed: {0}")]
    LedgerWriteFailed(String),

    #[error("token signing failed: {0}")]
    SigningFailure(String),

    #[error("identity not found")]
    UnknownIdentity,

    #[error("email is already confirmed")]
    EmailAlreadyConfirmed,

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::EmptySecret => ServiceError::SigningFailure("signing secret is empty".to_string()),
            TokenError::SigningFailure(msg) => ServiceError::SigningFailure(msg),
            TokenError::Malformed => ServiceError::TokenMalformed,
            TokenError::BadSignature => ServiceError::TokenBadSignature,
            TokenError::Expired => ServiceError::TokenExpired,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_map_to_service_categories() {
        assert!(matches!(
            ServiceError::from(TokenError::Expired),
            ServiceError::TokenExpired
        ));
        assert!(matches!(
            ServiceError::from(TokenError::BadSignature),
            ServiceError::TokenBadSignature
        ));
        assert!(matches!(
            ServiceError::from(TokenError::SigningFailure("boom".into())),
            ServiceError::SigningFailure(msg) if msg == "boom"
        ));
    }
}
