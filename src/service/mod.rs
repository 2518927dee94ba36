// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auth Orchestrator
//!
//! [`AuthService`] composes the credential store, token service, short-lived
//! ledger, identity provider and email dispatcher into the caller-facing
//! operations:
//!
//! | Operation | Result |
//! |-----------|--------|
//! | `register` | new local identity + session |
//! | `login` | session for an existing local identity |
//! | `generate_authorization_url` | provider consent URL + bound state |
//! | `federated_login` | session for a (possibly new) federated identity |
//! | `send_confirmation` | confirmation token issued, email intent published |
//! | `confirm_email` | identity marked confirmed, token consumed |
//!
//! ## Confirmation states
//!
//! `Unconfirmed → PendingConfirmation → Confirmed`. Re-sending while pending
//! supersedes the previous token. `Confirmed` is terminal.
//!
//! Every outbound call runs under the caller's [`RequestContext`].

mod context;
mod error;

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

pub use context::RequestContext;
pub use error::{ServiceError, ServiceResult};

use crate::auth::password::{hash_password, verify_password, PasswordError};
use crate::auth::{AuthenticatedUser, TokenService};
use crate::email::{EmailDispatcher, EmailIntent};
use crate::identity::{is_valid_email, normalize_email, Credentials, Identity, Provider};
use crate::ledger::{ConfirmationLedger, KeyValueLedger, LedgerError, OAuthStateStore};
use crate::providers::{IdentityProvider, ProviderProfile};
use crate::storage::{CredentialStore, StoreError};

/// Session handed back after register or login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct AuthorizationUrl {
    pub url: String,
    pub state: String,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    confirmations: ConfirmationLedger,
    oauth_states: OAuthStateStore,
    provider: Arc<dyn IdentityProvider>,
    mailer: Arc<dyn EmailDispatcher>,
    confirmation_url: Url,
    /// Throwaway hash verified against when the email is unknown.
    decoy_hash: OnceCell<String>,
}

const DECOY_PASSWORD: &str = "meetly-decoy-password";

/// Log an unexpected collaborator failure and hide its cause from callers.
fn internal(what: &str, err: impl std::fmt::Display) -> ServiceError {
    error!(error = %err, "{what}");
    ServiceError::Internal(format!("{what}: {err}"))
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        ledger: Arc<dyn KeyValueLedger>,
        provider: Arc<dyn IdentityProvider>,
        mailer: Arc<dyn EmailDispatcher>,
        confirmation_url: Url,
    ) -> Self {
        Self {
            store,
            tokens,
            confirmations: ConfirmationLedger::new(ledger.clone()),
            oauth_states: OAuthStateStore::new(ledger),
            provider,
            mailer,
            confirmation_url,
            decoy_hash: OnceCell::new(),
        }
    }

    // =========================================================================
    // Local credentials
    // =========================================================================

    /// Create a local identity and open a session for it.
    ///
    /// The identity starts unconfirmed; no confirmation email is sent.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> ServiceResult<AuthSession> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(ServiceError::Validation("invalid email address".to_string()));
        }
        if password.is_empty() {
            return Err(ServiceError::Validation("password is required".to_string()));
        }

        let password_hash = ctx
            .run(hash_password(password))
            .await?
            .map_err(|e| internal("Failed to hash password", e))?;
        let identity = Identity::local(&email, password_hash);

        let id = ctx
            .run(self.store.create_identity(&identity))
            .await?
            .map_err(|e| match e {
                StoreError::DuplicateIdentity(_) => {
                    debug!("Registration for existing email rejected");
                    ServiceError::DuplicateIdentity
                }
                other => internal("Failed to create identity", other),
            })?;

        info!(user_id = %id, "Identity registered");
        self.open_session(id, &identity.email)
    }

    /// Authenticate a local identity by email and password.
    ///
    /// Unknown email, missing hash and wrong password all yield
    /// `InvalidCredentials`.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> ServiceResult<AuthSession> {
        let email = normalize_email(email);

        let identity = match ctx
            .run(self.store.find_by_email_and_provider(&email, Provider::Local))
            .await?
        {
            Ok(identity) => identity,
            Err(StoreError::NotFound(_)) => {
                debug!("Login for unknown email");
                self.verify_decoy(ctx, password).await?;
                return Err(ServiceError::InvalidCredentials);
            }
            Err(e) => return Err(internal("Failed to look up identity", e)),
        };

        let Some(password_hash) = identity.password_hash() else {
            return Err(ServiceError::InvalidCredentials);
        };

        let matches = match ctx.run(verify_password(password, password_hash)).await? {
            Ok(matches) => matches,
            Err(PasswordError::InvalidHash(e)) => {
                error!(user_id = %identity.id, error = %e, "Stored password hash is unusable");
                false
            }
            Err(e) => return Err(internal("Password verification failed", e)),
        };
        if !matches {
            debug!(user_id = %identity.id, "Login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        info!(user_id = %identity.id, "Login succeeded");
        self.open_session(identity.id, &identity.email)
    }

    /// Spend one Argon2 verification so an unknown email costs the same as a
    /// wrong password.
    async fn verify_decoy(&self, ctx: &RequestContext, password: &str) -> ServiceResult<()> {
        let decoy = ctx
            .run(self.decoy_hash.get_or_try_init(|| hash_password(DECOY_PASSWORD)))
            .await?
            .map_err(|e| internal("Failed to prepare decoy hash", e))?;
        ctx.run(verify_password(password, decoy))
            .await?
            .map_err(|e| internal("Password verification failed", e))?;
        Ok(())
    }

    // =========================================================================
    // Federated login
    // =========================================================================

    /// Build the provider consent URL and remember its state for the callback.
    pub async fn generate_authorization_url(&self, ctx: &RequestContext) -> ServiceResult<AuthorizationUrl> {
        let request = self.provider.authorization_url();

        ctx.run(self.oauth_states.remember(&request.state, &request.pkce_verifier))
            .await?
            .map_err(|e| {
                error!(error = %e, "Failed to store OAuth state");
                ServiceError::LedgerWriteFailed(e.to_string())
            })?;

        Ok(AuthorizationUrl {
            url: request.url,
            state: request.state,
        })
    }

    /// Complete the provider callback.
    ///
    /// The state is redeemed before any provider call. Returning users keep
    /// their identity id; their row is refreshed with provider data.
    pub async fn federated_login(
        &self,
        ctx: &RequestContext,
        code: &str,
        state: &str,
    ) -> ServiceResult<AuthSession> {
        let pkce_verifier = ctx
            .run(self.oauth_states.take(state))
            .await?
            .map_err(|e| internal("Failed to redeem OAuth state", e))?
            .ok_or_else(|| {
                warn!("OAuth callback with unknown or reused state");
                ServiceError::InvalidOAuthState
            })?;

        let access_token = ctx
            .run(self.provider.exchange_code(code, &pkce_verifier))
            .await?
            .map_err(|e| {
                warn!(error = %e, "OAuth code exchange failed");
                ServiceError::ExchangeFailed(e.to_string())
            })?;

        let profile = ctx
            .run(self.provider.fetch_profile(&access_token))
            .await?
            .map_err(|e| {
                warn!(error = %e, "OAuth profile fetch failed");
                ServiceError::ProfileFetchFailed(e.to_string())
            })?;

        let identity = self.upsert_federated(ctx, profile).await?;

        info!(user_id = %identity.id, "Federated login succeeded");
        self.open_session(identity.id, &identity.email)
    }

    async fn upsert_federated(&self, ctx: &RequestContext, profile: ProviderProfile) -> ServiceResult<Identity> {
        let email = normalize_email(&profile.email);

        match ctx
            .run(self.store.find_by_email_and_provider(&email, Provider::Federated))
            .await?
        {
            Ok(mut existing) => {
                existing.credentials = Credentials::Federated {
                    external_id: profile.external_id,
                };
                existing.email_confirmed = true;
                ctx.run(self.store.update_identity(&existing))
                    .await?
                    .map_err(|e| internal("Failed to refresh federated identity", e))?;
                Ok(existing)
            }
            Err(StoreError::NotFound(_)) => {
                let identity = Identity::federated(&email, profile.external_id);
                match ctx.run(self.store.create_identity(&identity)).await? {
                    Ok(id) => {
                        info!(user_id = %id, "Federated identity created");
                        Ok(identity)
                    }
                    // A concurrent first login won the insert; use its row.
                    Err(StoreError::DuplicateIdentity(_)) => ctx
                        .run(self.store.find_by_email_and_provider(&email, Provider::Federated))
                        .await?
                        .map_err(|e| internal("Failed to re-read federated identity", e)),
                    Err(e) => Err(internal("Failed to create federated identity", e)),
                }
            }
            Err(e) => Err(internal("Failed to look up federated identity", e)),
        }
    }

    // =========================================================================
    // Email confirmation
    // =========================================================================

    /// Issue a confirmation token and publish the confirmation email.
    ///
    /// Delivery is fire-and-forget: a publish failure is logged and the call
    /// still succeeds because the token is already stored.
    pub async fn send_confirmation(&self, ctx: &RequestContext, user_id: Uuid, email: &str) -> ServiceResult<()> {
        let identity = ctx
            .run(self.store.find_by_id(user_id))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound(_) => ServiceError::UnknownIdentity,
                other => internal("Failed to load identity", other),
            })?;

        if identity.email_confirmed {
            return Err(ServiceError::EmailAlreadyConfirmed);
        }
        if normalize_email(email) != identity.email {
            warn!(user_id = %user_id, "Confirmation requested for an address not on the identity");
            return Err(ServiceError::Validation("email does not match identity".to_string()));
        }

        let token = ctx
            .run(self.confirmations.issue(user_id))
            .await?
            .map_err(|e| {
                error!(user_id = %user_id, error = %e, "Failed to store confirmation token");
                ServiceError::LedgerWriteFailed(e.to_string())
            })?;

        let link = self.confirmation_link(&token);
        if let Err(e) = self.mailer.publish(EmailIntent::confirmation(&identity.email, link.as_str())) {
            warn!(user_id = %user_id, error = %e, "Failed to publish confirmation email");
        }

        info!(user_id = %user_id, "Confirmation link issued");
        Ok(())
    }

    /// Redeem a confirmation token on behalf of the authenticated caller.
    pub async fn confirm_email(
        &self,
        ctx: &RequestContext,
        token: &str,
        caller: &AuthenticatedUser,
    ) -> ServiceResult<()> {
        let owner = match ctx.run(self.confirmations.owner_of(token)).await? {
            Ok(owner) => owner,
            Err(LedgerError::NotFound) => {
                info!(user_id = %caller.user_id, "Invalid or expired confirmation token");
                return Err(ServiceError::InvalidOrExpiredToken);
            }
            Err(e) => return Err(internal("Failed to resolve confirmation token", e)),
        };

        if owner != caller.user_id {
            warn!(
                token_owner = %owner,
                caller = %caller.user_id,
                "Security alert: confirmation token presented by another identity"
            );
            return Err(ServiceError::TokenOwnershipMismatch);
        }

        ctx.run(self.store.mark_email_confirmed(owner))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound(_) => ServiceError::UnknownIdentity,
                other => internal("Failed to mark email confirmed", other),
            })?;

        // The store is authoritative; a leftover ledger entry only lingers
        // until its expiry.
        match ctx.run(self.confirmations.consume(owner, token)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(user_id = %owner, error = %e, "Failed to delete used confirmation token"),
            Err(e) => warn!(user_id = %owner, error = %e, "Confirmation token cleanup abandoned"),
        }

        info!(user_id = %owner, "Email confirmed");
        Ok(())
    }

    // =========================================================================
    // Identity
    // =========================================================================

    pub async fn identity(&self, ctx: &RequestContext, user_id: Uuid) -> ServiceResult<Identity> {
        ctx.run(self.store.find_by_id(user_id))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound(_) => ServiceError::UnknownIdentity,
                other => internal("Failed to load identity", other),
            })
    }

    fn open_session(&self, user_id: Uuid, email: &str) -> ServiceResult<AuthSession> {
        let token = self.tokens.issue(user_id, email).map_err(|e| {
            error!(user_id = %user_id, error = %e, "Failed to sign session token");
            ServiceError::from(e)
        })?;
        Ok(AuthSession {
            token,
            user_id,
            email: email.to_string(),
        })
    }

    fn confirmation_link(&self, token: &str) -> Url {
        let mut link = self.confirmation_url.clone();
        link.query_pairs_mut().append_pair("token", token);
        link
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::ledger::ConfirmationLedger;
    use crate::storage::CredentialStore;
    use crate::test_support::TestHarness;

    fn principal(user_id: Uuid, email: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id,
            email: email.to_string(),
            expires_at: 0,
        }
    }

    // =============================================================================
    // Register / login
    // =============================================================================

    #[tokio::test]
    async fn register_then_login_yields_token_for_same_identity() {
        let h = TestHarness::new();
        let ctx = h.ctx();

        let registered = h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap();
        let logged_in = h.service.login(&ctx, "a@x.com", "pw123456").await.unwrap();

        assert_eq!(logged_in.user_id, registered.user_id);
        let claims = h.tokens.verify(&logged_in.token).unwrap();
        assert_eq!(claims.sub, registered.user_id.to_string());
        assert_eq!(claims.email, "a@x.com");
    }

    #[tokio::test]
    async fn register_starts_unconfirmed_and_sends_nothing() {
        let h = TestHarness::new();
        let session = h.service.register(&h.ctx(), "A@X.com ", "pw123456").await.unwrap();

        assert_eq!(session.email, "a@x.com");
        let stored = h.store.find_by_id(session.user_id).await.unwrap();
        assert!(!stored.email_confirmed);
        assert!(h.mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap();

        let result = h.service.register(&ctx, "a@x.com", "other-pass").await;
        assert!(matches!(result, Err(ServiceError::DuplicateIdentity)));
    }

    #[tokio::test]
    async fn register_rejects_bad_email() {
        let h = TestHarness::new();
        let result = h.service.register(&h.ctx(), "not-an-email", "pw123456").await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap();

        let wrong_password = h.service.login(&ctx, "a@x.com", "nope-nope").await.unwrap_err();
        let unknown_email = h.service.login(&ctx, "b@x.com", "pw123456").await.unwrap_err();

        assert!(matches!(wrong_password, ServiceError::InvalidCredentials));
        assert!(matches!(unknown_email, ServiceError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn unknown_email_still_pays_for_a_password_check() {
        let h = TestHarness::new();
        assert!(h.service.decoy_hash.get().is_none());

        let result = h.service.login(&h.ctx(), "ghost@x.com", "pw123456").await;

        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
        let decoy = h.service.decoy_hash.get().expect("decoy hash prepared");
        assert!(decoy.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn federated_identity_cannot_log_in_with_password() {
        let h = TestHarness::new();
        h.store
            .create_identity(&Identity::federated("a@x.com", "g-1".to_string()))
            .await
            .unwrap();

        let result = h.service.login(&h.ctx(), "a@x.com", "pw123456").await;
        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn cancelled_register_persists_nothing() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        ctx.cancellation().cancel();

        let result = h.service.register(&ctx, "a@x.com", "pw123456").await;
        assert!(matches!(result, Err(ServiceError::Cancelled)));
        assert!(h.store.is_empty().await);
    }

    // =============================================================================
    // Federated login
    // =============================================================================

    #[tokio::test]
    async fn federated_login_creates_confirmed_identity() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        h.provider.set_profile("g-1", "a@x.com");

        let auth = h.service.generate_authorization_url(&ctx).await.unwrap();
        let session = h.service.federated_login(&ctx, "code-1", &auth.state).await.unwrap();

        let stored = h.store.find_by_id(session.user_id).await.unwrap();
        assert!(stored.email_confirmed);
        assert_eq!(stored.provider(), Provider::Federated);
        assert_eq!(h.tokens.verify(&session.token).unwrap().sub, session.user_id.to_string());
    }

    #[tokio::test]
    async fn repeated_federated_login_reuses_identity() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        h.provider.set_profile("g-1", "a@x.com");

        let first_state = h.service.generate_authorization_url(&ctx).await.unwrap().state;
        let first = h.service.federated_login(&ctx, "c1", &first_state).await.unwrap();

        h.provider.set_profile("g-2", "a@x.com");
        let second_state = h.service.generate_authorization_url(&ctx).await.unwrap().state;
        let second = h.service.federated_login(&ctx, "c2", &second_state).await.unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert_eq!(h.store.len().await, 1);
        let stored = h.store.find_by_id(first.user_id).await.unwrap();
        assert_eq!(
            stored.credentials,
            Credentials::Federated {
                external_id: "g-2".to_string()
            }
        );
    }

    #[tokio::test]
    async fn oauth_state_is_bound_and_single_use() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        h.provider.set_profile("g-1", "a@x.com");

        let forged = h.service.federated_login(&ctx, "code", "forged-state").await;
        assert!(matches!(forged, Err(ServiceError::InvalidOAuthState)));
        assert_eq!(h.provider.exchange_calls.load(Ordering::SeqCst), 0);

        let state = h.service.generate_authorization_url(&ctx).await.unwrap().state;
        h.service.federated_login(&ctx, "code", &state).await.unwrap();
        assert!(h.provider.last_verifier.lock().unwrap().is_some());

        let replayed = h.service.federated_login(&ctx, "code", &state).await;
        assert!(matches!(replayed, Err(ServiceError::InvalidOAuthState)));
    }

    #[tokio::test]
    async fn provider_failures_leave_no_identity() {
        let h = TestHarness::new();
        let ctx = h.ctx();

        h.provider.fail_exchange.store(true, Ordering::SeqCst);
        let state = h.service.generate_authorization_url(&ctx).await.unwrap().state;
        let exchange = h.service.federated_login(&ctx, "code", &state).await;
        assert!(matches!(exchange, Err(ServiceError::ExchangeFailed(_))));

        h.provider.fail_exchange.store(false, Ordering::SeqCst);
        let state = h.service.generate_authorization_url(&ctx).await.unwrap().state;
        let profile = h.service.federated_login(&ctx, "code", &state).await;
        assert!(matches!(profile, Err(ServiceError::ProfileFetchFailed(_))));

        assert!(h.store.is_empty().await);
    }

    // =============================================================================
    // Email confirmation
    // =============================================================================

    #[tokio::test]
    async fn confirmation_round_trip() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        let session = h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap();
        let u1 = session.user_id;

        h.service.send_confirmation(&ctx, u1, "a@x.com").await.unwrap();
        let token = h.mailer.last_token().expect("confirmation email published");

        let confirmations = ConfirmationLedger::new(h.ledger.clone());
        assert_eq!(confirmations.owner_of(&token).await.unwrap(), u1);

        h.service
            .confirm_email(&ctx, &token, &principal(u1, "a@x.com"))
            .await
            .unwrap();

        assert!(h.store.find_by_id(u1).await.unwrap().email_confirmed);
        assert!(confirmations.owner_of(&token).await.is_err());
        assert!(h.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn confirmation_email_carries_link_and_template() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        let u1 = h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap().user_id;
        h.service.send_confirmation(&ctx, u1, "a@x.com").await.unwrap();

        let sent = h.mailer.sent.lock().unwrap();
        let intent = sent.last().unwrap();
        assert_eq!(intent.recipient, "a@x.com");
        assert_eq!(intent.template_id, "email_confirmation");
        assert!(intent.data["confirmation_url"].starts_with("https://meetlyplus.ru/confirm?token="));
        assert_eq!(intent.data["user_email"], "a@x.com");
    }

    #[tokio::test]
    async fn confirmation_by_another_identity_is_rejected() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        let user_a = h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap().user_id;
        let user_b = h.service.register(&ctx, "b@x.com", "pw123456").await.unwrap().user_id;

        h.service.send_confirmation(&ctx, user_a, "a@x.com").await.unwrap();
        let token = h.mailer.last_token().unwrap();

        let result = h
            .service
            .confirm_email(&ctx, &token, &principal(user_b, "b@x.com"))
            .await;
        assert!(matches!(result, Err(ServiceError::TokenOwnershipMismatch)));
        assert!(!h.store.find_by_id(user_a).await.unwrap().email_confirmed);
        assert!(!h.store.find_by_id(user_b).await.unwrap().email_confirmed);

        // The rightful owner can still redeem it.
        h.service
            .confirm_email(&ctx, &token, &principal(user_a, "a@x.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn confirmation_token_is_single_use() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        let u1 = h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap().user_id;
        h.service.send_confirmation(&ctx, u1, "a@x.com").await.unwrap();
        let token = h.mailer.last_token().unwrap();
        let caller = principal(u1, "a@x.com");

        h.service.confirm_email(&ctx, &token, &caller).await.unwrap();
        let again = h.service.confirm_email(&ctx, &token, &caller).await;
        assert!(matches!(again, Err(ServiceError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn only_latest_confirmation_token_resolves() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        let u1 = h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap().user_id;

        let (first, second) = tokio::join!(
            h.service.send_confirmation(&ctx, u1, "a@x.com"),
            h.service.send_confirmation(&ctx, u1, "a@x.com"),
        );
        first.unwrap();
        second.unwrap();

        let sent: Vec<String> = h
            .mailer
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|intent| intent.data["confirmation_url"].clone())
            .collect();
        assert_eq!(sent.len(), 2);
        assert_ne!(sent[0], sent[1]);

        let confirmations = ConfirmationLedger::new(h.ledger.clone());
        let mut resolved = 0;
        for link in &sent {
            let token = url::Url::parse(link)
                .unwrap()
                .query_pairs()
                .find(|(k, _)| k == "token")
                .map(|(_, v)| v.into_owned())
                .unwrap();
            match confirmations.owner_of(&token).await {
                Ok(owner) => {
                    assert_eq!(owner, u1);
                    resolved += 1;
                }
                Err(e) => assert!(matches!(e, crate::ledger::LedgerError::NotFound)),
            }
        }
        assert_eq!(resolved, 1);
    }

    #[tokio::test]
    async fn send_confirmation_guards() {
        let h = TestHarness::new();
        let ctx = h.ctx();

        let unknown = h.service.send_confirmation(&ctx, Uuid::new_v4(), "a@x.com").await;
        assert!(matches!(unknown, Err(ServiceError::UnknownIdentity)));

        let u1 = h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap().user_id;
        let other_address = h.service.send_confirmation(&ctx, u1, "evil@x.com").await;
        assert!(matches!(other_address, Err(ServiceError::Validation(_))));

        h.store.mark_email_confirmed(u1).await.unwrap();
        let confirmed = h.service.send_confirmation(&ctx, u1, "a@x.com").await;
        assert!(matches!(confirmed, Err(ServiceError::EmailAlreadyConfirmed)));
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_send() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        let u1 = h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap().user_id;
        h.mailer.fail.store(true, Ordering::SeqCst);

        h.service.send_confirmation(&ctx, u1, "a@x.com").await.unwrap();
        assert_eq!(h.ledger.len().await, 2);
    }

    #[tokio::test]
    async fn ledger_write_failure_fails_send_without_email() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        let u1 = h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap().user_id;
        h.faults.fail_writes.store(true, Ordering::SeqCst);

        let result = h.service.send_confirmation(&ctx, u1, "a@x.com").await;

        assert!(matches!(result, Err(ServiceError::LedgerWriteFailed(_))));
        assert!(h.mailer.sent.lock().unwrap().is_empty());
        assert!(h.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn cleanup_failure_keeps_confirmation() {
        let h = TestHarness::new();
        let ctx = h.ctx();
        let u1 = h.service.register(&ctx, "a@x.com", "pw123456").await.unwrap().user_id;
        h.service.send_confirmation(&ctx, u1, "a@x.com").await.unwrap();
        let token = h.mailer.last_token().unwrap();
        h.faults.fail_deletes.store(true, Ordering::SeqCst);

        h.service
            .confirm_email(&ctx, &token, &principal(u1, "a@x.com"))
            .await
            .unwrap();

        assert!(h.store.find_by_id(u1).await.unwrap().email_confirmed);
        // The entry lingers until its expiry.
        let confirmations = ConfirmationLedger::new(h.ledger.clone());
        assert_eq!(confirmations.owner_of(&token).await.unwrap(), u1);
    }

    #[tokio::test]
    async fn unknown_confirmation_token_rejected() {
        let h = TestHarness::new();
        let result = h
            .service
            .confirm_email(&h.ctx(), "never-issued", &principal(Uuid::new_v4(), "a@x.com"))
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn expired_deadline_stops_confirmation() {
        let h = TestHarness::new();
        let ctx = RequestContext::new(Duration::ZERO);
        let result = h
            .service
            .confirm_email(&ctx, "token", &principal(Uuid::new_v4(), "a@x.com"))
            .await;
        assert!(matches!(result, Err(ServiceError::DeadlineExceeded)));
    }
}
