// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::ServiceError;

/// Bounds every outbound call a request makes.
///
/// Store and ledger mutations are single atomic calls, so a call abandoned
/// here has either fully committed or not happened at all.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Instant,
}

impl RequestContext {
    pub fn new(timeout: Duration) -> Self {
        Self::with_cancellation(CancellationToken::new(), timeout)
    }

    pub fn with_cancellation(cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn ensure_active(&self) -> Result<(), ServiceError> {
        if self.cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(ServiceError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` unless the request is cancelled or runs out of time first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = T>,
    {
        self.ensure_active()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ServiceError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(ServiceError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
