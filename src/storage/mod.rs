// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Credential Store
//!
//! Durable identity records keyed by `(email, provider)`.
//!
//! ## Implementations
//!
//! - `InMemoryCredentialStore` - process-local map, used in tests and local
//!   development
//! - `IdentityDatabase` - embedded redb file; identity rows and the
//!   `(provider, email)` index are written in one ACID transaction
//!
//! The confirmed flag is the only field this service flips after creation;
//! federated identities may be refreshed in place with provider data.
//! Identities are never deleted here.

pub mod identity_db;
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::identity::{Identity, Provider};

pub use identity_db::IdentityDatabase;
pub use memory::InMemoryCredentialStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("identity already exists: {0}")]
    DuplicateIdentity(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new identity. Fails with `DuplicateIdentity` if the
    /// `(email, provider)` pair is taken.
    async fn create_identity(&self, identity: &Identity) -> StoreResult<Uuid>;

    async fn find_by_email_and_provider(&self, email: &str, provider: Provider) -> StoreResult<Identity>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Identity>;

    /// Overwrite an existing identity in place, keeping its id.
    async fn update_identity(&self, identity: &Identity) -> StoreResult<()>;

    async fn mark_email_confirmed(&self, id: Uuid) -> StoreResult<()>;
}

/// Index key for the `(provider, email)` uniqueness constraint.
pub(crate) fn index_key(email: &str, provider: Provider) -> String {
    format!("{}|{}", provider.as_str(), crate::identity::normalize_email(email))
}
