// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::TokenService;
use crate::ledger::KeyValueLedger;
use crate::service::{AuthService, RequestContext};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub tokens: Arc<TokenService>,
    /// Shared with `auth`; probed by the readiness endpoint.
    pub ledger: Arc<dyn KeyValueLedger>,
    pub request_timeout: Duration,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        auth: Arc<AuthService>,
        tokens: Arc<TokenService>,
        ledger: Arc<dyn KeyValueLedger>,
        request_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            auth,
            tokens,
            ledger,
            request_timeout,
            shutdown,
        }
    }

    /// Context for one request: cancelled on server shutdown, bounded by the
    /// configured timeout.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_cancellation(self.shutdown.child_token(), self.request_timeout)
    }
}
