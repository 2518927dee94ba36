// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Email confirmation tokens.
//!
//! Each pending confirmation is stored as two entries sharing one expiry:
//!
//! - `email_confirm:user:{id}` → token
//! - `email_confirm:token:{token}` → id
//!
//! Re-issuing overwrites the user entry, which makes any earlier token
//! unresolvable even while its own entry is still live.

use std::sync::Arc;
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};
use uuid::Uuid;

use super::{KeyValueLedger, LedgerError, LedgerResult};

/// How long a confirmation link stays valid.
pub const CONFIRMATION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const TOKEN_BYTES: usize = 32;

fn user_key(user_id: Uuid) -> String {
    format!("email_confirm:user:{user_id}")
}

fn token_key(token: &str) -> String {
    format!("email_confirm:token:{token}")
}

#[derive(Clone)]
pub struct ConfirmationLedger {
    ledger: Arc<dyn KeyValueLedger>,
    rng: SystemRandom,
    ttl: Duration,
}

impl ConfirmationLedger {
    pub fn new(ledger: Arc<dyn KeyValueLedger>) -> Self {
        Self::with_ttl(ledger, CONFIRMATION_TTL)
    }

    pub fn with_ttl(ledger: Arc<dyn KeyValueLedger>, ttl: Duration) -> Self {
        Self {
            ledger,
            rng: SystemRandom::new(),
            ttl,
        }
    }

    /// Mint a fresh token for `user_id` and store both directions.
    pub async fn issue(&self, user_id: Uuid) -> LedgerResult<String> {
        let token = self.generate_token()?;
        self.ledger
            .set_pair(
                (&user_key(user_id), &token),
                (&token_key(&token), &user_id.to_string()),
                self.ttl,
            )
            .await?;
        Ok(token)
    }

    /// Resolve a token to its owner.
    ///
    /// Fails with `NotFound` when the token is unknown, expired, or has been
    /// superseded by a newer one for the same user.
    pub async fn owner_of(&self, token: &str) -> LedgerResult<Uuid> {
        let owner = self
            .ledger
            .get(&token_key(token))
            .await?
            .ok_or(LedgerError::NotFound)?;
        let user_id = Uuid::parse_str(&owner)
            .map_err(|_| LedgerError::Backend(format!("corrupt confirmation owner: {owner}")))?;

        match self.ledger.get(&user_key(user_id)).await? {
            Some(current) if current == token => Ok(user_id),
            _ => Err(LedgerError::NotFound),
        }
    }

    /// Remove both entries for a redeemed token.
    pub async fn consume(&self, user_id: Uuid, token: &str) -> LedgerResult<()> {
        self.ledger
            .delete_pair(&user_key(user_id), &token_key(token))
            .await
    }

    fn generate_token(&self) -> LedgerResult<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| LedgerError::Backend("system RNG unavailable".to_string()))?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }
}
