// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity records.
//!
//! An identity is distinguished by `(email, provider)`. The provider-specific
//! credential is a tagged variant, so a local identity always carries a
//! password hash and a federated one always carries the provider's user id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Where an identity authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Email + password held by this service
    Local,
    /// Delegated to the external OAuth provider
    Federated,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Federated => "federated",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum Credentials {
    Local { password_hash: String },
    Federated { external_id: String },
}

impl Credentials {
    pub fn provider(&self) -> Provider {
        match self {
            Credentials::Local { .. } => Provider::Local,
            Credentials::Federated { .. } => Provider::Federated,
        }
    }
}

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub credentials: Credentials,
    pub email_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// New local identity. Email confirmation is a separate, explicit step.
    pub fn local(email: &str, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            credentials: Credentials::Local { password_hash },
            email_confirmed: false,
            created_at: Utc::now(),
        }
    }

    /// New federated identity, confirmed on creation since the provider has
    /// already verified the address.
    pub fn federated(email: &str, external_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            credentials: Credentials::Federated { external_id },
            email_confirmed: true,
            created_at: Utc::now(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.credentials.provider()
    }

    /// Stored password hash, only present for local identities.
    pub fn password_hash(&self) -> Option<&str> {
        match &self.credentials {
            Credentials::Local { password_hash } => Some(password_hash),
            Credentials::Federated { .. } => None,
        }
    }
}

/// Canonical form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic shape check: one `@`, non-empty local part, dotted domain, no
/// whitespace, within the RFC 5321 length limit.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
