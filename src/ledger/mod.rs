// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Short-lived Ledger
//!
//! A time-bounded key-value store holding single-use secrets: email
//! confirmation tokens and pending OAuth authorization states. Every entry
//! carries an expiry and is garbage-collected by the store itself.
//!
//! ## Backends
//!
//! - `RedisLedger` - production; pair writes and deletes go through one
//!   `MULTI`/`EXEC` transaction
//! - `MemoryLedger` - single process; all pair operations happen under one lock
//!
//! ## Keyspaces
//!
//! - `ConfirmationLedger` - `email_confirm:user:{id}` ↔ `email_confirm:token:{token}`
//! - `OAuthStateStore` - `oauth_state:{state}` → PKCE verifier

pub mod confirmation;
pub mod memory;
pub mod oauth_state;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use confirmation::ConfirmationLedger;
pub use memory::MemoryLedger;
pub use oauth_state::OAuthStateStore;
pub use self::redis::RedisLedger;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger entry not found")]
    NotFound,

    #[error("ledger write failed: {0}")]
    WriteFailed(String),

    #[error("ledger backend error: {0}")]
    Backend(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[async_trait]
pub trait KeyValueLedger: Send + Sync {
    /// Write both entries with the same expiry, all-or-nothing.
    async fn set_pair(
        &self,
        first: (&str, &str),
        second: (&str, &str),
        ttl: Duration,
    ) -> LedgerResult<()>;

    /// Read a live entry.
    async fn get(&self, key: &str) -> LedgerResult<Option<String>>;

    /// Delete both keys, all-or-nothing.
    async fn delete_pair(&self, first: &str, second: &str) -> LedgerResult<()>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> LedgerResult<()>;

    /// Read and delete in one step; a second `take` of the same key sees nothing.
    async fn take(&self, key: &str) -> LedgerResult<Option<String>>;

    /// Backend reachability, used by readiness probes.
    async fn ping(&self) -> LedgerResult<()>;
}
