// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External identity providers (OAuth authorization-code flow).
//!
//! A provider does three things: build the consent URL, exchange the returned
//! code for an access token, and fetch a normalized profile with that token.
//! Nothing here touches local state.

pub mod google;

use async_trait::async_trait;

pub use google::{GoogleConfig, GoogleProvider};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider configuration invalid: {0}")]
    Config(String),

    #[error("authorization code exchange failed: {0}")]
    Exchange(String),

    #[error("profile fetch failed: {0}")]
    Profile(String),

    #[error("provider email is not verified")]
    UnverifiedEmail,
}

/// Consent URL plus the secrets that must be kept until the callback.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    /// CSRF state echoed back by the provider.
    pub state: String,
    pub pkce_verifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub external_id: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorization_url(&self) -> AuthorizationRequest;

    /// Exchange an authorization code for a provider access token.
    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<String, ProviderError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, ProviderError>;
}
