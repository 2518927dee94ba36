// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests: an in-memory service wired to a stub
//! identity provider, a recording email dispatcher and a ledger that can be
//! told to fail.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::auth::TokenService;
use crate::email::{DispatchError, EmailDispatcher, EmailIntent};
use crate::ledger::{KeyValueLedger, LedgerError, LedgerResult, MemoryLedger};
use crate::providers::{AuthorizationRequest, IdentityProvider, ProviderError, ProviderProfile};
use crate::service::{AuthService, RequestContext};
use crate::state::AppState;
use crate::storage::InMemoryCredentialStore;

pub const TEST_SECRET: &[u8] = b"test-secret-for-session-tokens";
pub const TEST_ISSUER: &str = "meetly-api";
pub const CONFIRMATION_BASE: &str = "https://meetlyplus.ru/confirm";

#[derive(Default)]
pub struct StubProvider {
    pub profile: Mutex<Option<ProviderProfile>>,
    pub fail_exchange: AtomicBool,
    pub exchange_calls: AtomicUsize,
    pub last_verifier: Mutex<Option<String>>,
}

impl StubProvider {
    pub fn set_profile(&self, external_id: &str, email: &str) {
        *self.profile.lock().unwrap() = Some(ProviderProfile {
            external_id: external_id.to_string(),
            email: email.to_string(),
        });
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    fn authorization_url(&self) -> AuthorizationRequest {
        let state = Uuid::new_v4().simple().to_string();
        AuthorizationRequest {
            url: format!("https://accounts.example.com/auth?state={state}"),
            state,
            pkce_verifier: Uuid::new_v4().simple().to_string(),
        }
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<String, ProviderError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_verifier.lock().unwrap() = Some(pkce_verifier.to_string());
        if self.fail_exchange.load(Ordering::SeqCst) {
            return Err(ProviderError::Exchange("provider said no".to_string()));
        }
        Ok(format!("access-{code}"))
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<ProviderProfile, ProviderError> {
        self.profile
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::Profile("no profile".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    pub sent: Mutex<Vec<EmailIntent>>,
    pub fail: AtomicBool,
}

impl EmailDispatcher for RecordingDispatcher {
    fn publish(&self, intent: EmailIntent) -> Result<(), DispatchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Closed);
        }
        self.sent.lock().unwrap().push(intent);
        Ok(())
    }
}

impl RecordingDispatcher {
    /// Token embedded in the most recent confirmation link.
    pub fn last_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let link = sent.last()?.data.get("confirmation_url")?;
        Url::parse(link)
            .ok()?
            .query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned())
    }
}

/// Ledger that forwards to a `MemoryLedger` until a write or delete fault is
/// switched on.
pub struct FaultyLedger {
    pub inner: Arc<MemoryLedger>,
    pub fail_writes: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FaultyLedger {
    pub fn new(inner: Arc<MemoryLedger>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    fn check_write(&self) -> LedgerResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::WriteFailed("MULTI aborted".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueLedger for FaultyLedger {
    async fn set_pair(&self, first: (&str, &str), second: (&str, &str), ttl: Duration) -> LedgerResult<()> {
        self.check_write()?;
        self.inner.set_pair(first, second, ttl).await
    }

    async fn get(&self, key: &str) -> LedgerResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn delete_pair(&self, first: &str, second: &str) -> LedgerResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(LedgerError::Backend("connection reset".to_string()));
        }
        self.inner.delete_pair(first, second).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> LedgerResult<()> {
        self.check_write()?;
        self.inner.set(key, value, ttl).await
    }

    async fn take(&self, key: &str) -> LedgerResult<Option<String>> {
        self.inner.take(key).await
    }

    async fn ping(&self) -> LedgerResult<()> {
        self.inner.ping().await
    }
}

pub struct TestHarness {
    pub state: AppState,
    pub service: Arc<AuthService>,
    pub tokens: Arc<TokenService>,
    pub store: Arc<InMemoryCredentialStore>,
    /// Backing entries, for inspection.
    pub ledger: Arc<MemoryLedger>,
    /// Fault switches over `ledger`; this is what the service talks to.
    pub faults: Arc<FaultyLedger>,
    pub provider: Arc<StubProvider>,
    pub mailer: Arc<RecordingDispatcher>,
}

impl TestHarness {
    pub fn new() -> Self {
        let tokens = Arc::new(
            TokenService::new(TEST_SECRET, TEST_ISSUER, ChronoDuration::hours(24)).unwrap(),
        );
        let store = Arc::new(InMemoryCredentialStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let faults = Arc::new(FaultyLedger::new(ledger.clone()));
        let provider = Arc::new(StubProvider::default());
        let mailer = Arc::new(RecordingDispatcher::default());

        let service = Arc::new(AuthService::new(
            store.clone(),
            tokens.clone(),
            faults.clone(),
            provider.clone(),
            mailer.clone(),
            Url::parse(CONFIRMATION_BASE).unwrap(),
        ));
        let state = AppState::new(
            service.clone(),
            tokens.clone(),
            faults.clone(),
            Duration::from_secs(10),
            CancellationToken::new(),
        );

        Self {
            state,
            service,
            tokens,
            store,
            ledger,
            faults,
            provider,
            mailer,
        }
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::new(Duration::from_secs(10))
    }
}
