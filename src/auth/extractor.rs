// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require a session token:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedUser, TokenService};
use crate::state::AppState;

/// Extractor for authenticated users.
///
/// Validates the bearer token from the Authorization header against the
/// service's `TokenService` and yields the typed principal.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;

        let user = authenticate(token, &state.tokens)?;

        // Later extractors on the same request reuse the verified principal.
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

/// Verify a bearer token and build the principal.
pub fn authenticate(token: &str, tokens: &TokenService) -> Result<AuthenticatedUser, AuthError> {
    let claims = tokens.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AuthError::InvalidToken
    })?;

    AuthenticatedUser::from_claims(claims).map_err(|e| {
        tracing::debug!(error = %e, "Session token subject is not an identity id");
        AuthError::InvalidToken
    })
}
