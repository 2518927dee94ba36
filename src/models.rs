// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. All types derive the serde
//! traits they need and `ToSchema` for the OpenAPI document.
//!
//! Requests are validated here, at the HTTP edge, before anything reaches
//! the auth service.
//!
//! ## Model Categories
//!
//! - **Credentials**: register / login
//! - **Federated login**: Google consent URL and callback
//! - **Email confirmation**: confirm token submission
//! - **Profile**: the caller's identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::identity::{is_valid_email, Identity, Provider};
use crate::service::{AuthSession, AuthorizationUrl};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 32;

/// Longest accepted confirmation token (base64url of 32 bytes is 43 chars).
const MAX_CONFIRMATION_TOKEN_LEN: usize = 128;
const MAX_OAUTH_PARAM_LEN: usize = 2048;

// =============================================================================
// Credential Models
// =============================================================================

/// Email + password, used for both registration and login.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    /// Account email address.
    #[schema(example = "a@x.com")]
    pub email: String,
    /// Plaintext password, 8 to 32 characters.
    #[schema(example = "pw123456")]
    pub password: String,
}

impl CredentialsRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_email(&self.email) {
            return Err(ApiError::bad_request("Invalid email address"));
        }
        let len = self.password.chars().count();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
            return Err(ApiError::bad_request(format!(
                "Password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Issued session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    /// Bearer token for the `Authorization` header.
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            token: session.token,
            user_id: session.user_id,
            email: session.email,
        }
    }
}

// =============================================================================
// Federated Login Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationUrlResponse {
    /// Provider consent page to redirect the user to.
    pub url: String,
    /// Anti-forgery state; must be echoed back with the code.
    pub state: String,
}

impl From<AuthorizationUrl> for AuthorizationUrlResponse {
    fn from(value: AuthorizationUrl) -> Self {
        Self {
            url: value.url,
            state: value.state,
        }
    }
}

/// Provider callback parameters.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GoogleAuthRequest {
    pub code: String,
    pub state: String,
}

impl GoogleAuthRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        for (name, value) in [("code", &self.code), ("state", &self.state)] {
            if value.trim().is_empty() {
                return Err(ApiError::bad_request(format!("`{name}` is required")));
            }
            if value.len() > MAX_OAUTH_PARAM_LEN {
                return Err(ApiError::bad_request(format!("`{name}` is too long")));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Email Confirmation Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmEmailRequest {
    /// Token from the confirmation link.
    pub token: String,
}

impl ConfirmEmailRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let token = self.token.as_str();
        if token.is_empty() {
            return Err(ApiError::bad_request("`token` is required"));
        }
        if token.len() > MAX_CONFIRMATION_TOKEN_LEN
            || !token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ApiError::bad_request("Malformed confirmation token"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = "ok")]
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

// =============================================================================
// Profile Models
// =============================================================================

/// The caller's identity, without credential material.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    pub provider: Provider,
    pub email_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for UserProfile {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.id,
            provider: identity.provider(),
            email: identity.email,
            email_confirmed: identity.email_confirmed,
            created_at: identity.created_at,
        }
    }
}
