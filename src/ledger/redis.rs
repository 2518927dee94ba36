// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Redis-backed ledger.
//!
//! Pair operations are issued as one `MULTI`/`EXEC` pipeline, so either both
//! keys are written (or deleted) or neither is.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{KeyValueLedger, LedgerError, LedgerResult};

#[derive(Clone)]
pub struct RedisLedger {
    conn: ConnectionManager,
}

impl RedisLedger {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> LedgerResult<Self> {
        let client = redis::Client::open(url).map_err(backend)?;
        let conn = ConnectionManager::new(client).await.map_err(backend)?;
        Ok(Self { conn })
    }
}

fn backend(err: redis::RedisError) -> LedgerError {
    LedgerError::Backend(err.to_string())
}

/// Redis expiry granularity is seconds; never round a TTL down to zero.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KeyValueLedger for RedisLedger {
    async fn set_pair(
        &self,
        first: (&str, &str),
        second: (&str, &str),
        ttl: Duration,
    ) -> LedgerResult<()> {
        let mut conn = self.conn.clone();
        let secs = ttl_secs(ttl);
        redis::pipe()
            .atomic()
            .set_ex(first.0, first.1, secs)
            .ignore()
            .set_ex(second.0, second.1, secs)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| LedgerError::WriteFailed(e.to_string()))
    }

    async fn get(&self, key: &str) -> LedgerResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(backend)
    }

    async fn delete_pair(&self, first: &str, second: &str) -> LedgerResult<()> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .del(first)
            .ignore()
            .del(second)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> LedgerResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl))
            .await
            .map_err(|e| LedgerError::WriteFailed(e.to_string()))
    }

    async fn take(&self, key: &str) -> LedgerResult<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GETDEL")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn ping(&self) -> LedgerResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_never_rounds_to_zero() {
        assert_eq!(ttl_secs(Duration::from_millis(300)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(86_400)), 86_400);
    }

    #[tokio::test]
    async fn connect_rejects_invalid_url() {
        let result = RedisLedger::connect("not a url").await;
        assert!(matches!(result, Err(LedgerError::Backend(_))));
    }
}
