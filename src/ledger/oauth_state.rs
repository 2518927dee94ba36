// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pending OAuth authorizations, keyed by the CSRF `state` value.

use std::sync::Arc;
use std::time::Duration;

use super::{KeyValueLedger, LedgerResult};

/// How long a user has to complete the provider consent screen.
pub const OAUTH_STATE_TTL: Duration = Duration::from_secs(10 * 60);

fn state_key(state: &str) -> String {
    format!("oauth_state:{state}")
}

#[derive(Clone)]
pub struct OAuthStateStore {
    ledger: Arc<dyn KeyValueLedger>,
}

impl OAuthStateStore {
    pub fn new(ledger: Arc<dyn KeyValueLedger>) -> Self {
        Self { ledger }
    }

    pub async fn remember(&self, state: &str, pkce_verifier: &str) -> LedgerResult<()> {
        self.ledger
            .set(&state_key(state), pkce_verifier, OAUTH_STATE_TTL)
            .await
    }

    /// Redeem a state; each value can be taken once.
    pub async fn take(&self, state: &str) -> LedgerResult<Option<String>> {
        self.ledger.take(&state_key(state)).await
    }
}
