// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Google OAuth 2.0 (authorization code + PKCE).

use std::time::Duration;

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{AuthorizationRequest, IdentityProvider, ProviderError, ProviderProfile};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Google userinfo v2 response.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: String,
    #[serde(default)]
    verified_email: bool,
}

pub struct GoogleProvider {
    client: ConfiguredClient,
    /// Token endpoint client; must not follow redirects.
    token_http: Client,
    api_http: Client,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Result<Self, ProviderError> {
        let auth_url = AuthUrl::new(AUTH_URL.to_string())
            .map_err(|e| ProviderError::Config(format!("auth url: {e}")))?;
        let token_url = TokenUrl::new(TOKEN_URL.to_string())
            .map_err(|e| ProviderError::Config(format!("token url: {e}")))?;
        let redirect_url = RedirectUrl::new(config.redirect_url)
            .map_err(|e| ProviderError::Config(format!("redirect url: {e}")))?;

        let client = BasicClient::new(ClientId::new(config.client_id))
            .set_client_secret(ClientSecret::new(config.client_secret))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let token_http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))?;
        let api_http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token_http,
            api_http,
        })
    }
}

fn into_profile(user: GoogleUser) -> Result<ProviderProfile, ProviderError> {
    if !user.verified_email {
        return Err(ProviderError::UnverifiedEmail);
    }
    if user.id.is_empty() || user.email.is_empty() {
        return Err(ProviderError::Profile("userinfo missing id or email".to_string()));
    }
    Ok(ProviderProfile {
        external_id: user.id,
        email: user.email,
    })
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);
        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (url, csrf_state) = request.url();

        AuthorizationRequest {
            url: url.to_string(),
            state: csrf_state.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        }
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<String, ProviderError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.token_http)
            .await
            .map_err(|e| ProviderError::Exchange(e.to_string()))?;

        debug!("Google authorization code exchanged");
        Ok(token.access_token().secret().clone())
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, ProviderError> {
        let response = self
            .api_http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Profile(format!("userinfo request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Profile(format!("userinfo returned {status}")));
        }

        let user: GoogleUser = response
            .json()
            .await
            .map_err(|e| ProviderError::Profile(format!("userinfo body invalid: {e}")))?;
        into_profile(user)
    }
}
