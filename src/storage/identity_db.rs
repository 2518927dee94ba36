// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded identity database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `identities`: identity id → serialized Identity (JSON bytes)
//! - `identity_index`: `provider|email` → identity id

use std::path::Path;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use uuid::Uuid;

use super::{index_key, CredentialStore, StoreError, StoreResult};
use crate::identity::{Identity, Provider};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: identity id → serialized Identity (JSON bytes).
const IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");

/// Uniqueness index: `provider|email` → identity id.
const IDENTITY_INDEX: TableDefinition<&str, &str> = TableDefinition::new("identity_index");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IdentityDbError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("identity already exists: {0}")]
    Duplicate(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<IdentityDbError> for StoreError {
    fn from(err: IdentityDbError) -> Self {
        match err {
            IdentityDbError::Duplicate(key) => StoreError::DuplicateIdentity(key),
            IdentityDbError::NotFound(what) => StoreError::NotFound(what),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

type DbResult<T> = Result<T, IdentityDbError>;

// =============================================================================
// IdentityDatabase
// =============================================================================

/// Durable credential store.
pub struct IdentityDatabase {
    db: Database,
}

impl IdentityDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(IDENTITIES)?;
            let _ = write_txn.open_table(IDENTITY_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn insert(&self, identity: &Identity) -> DbResult<Uuid> {
        let key = index_key(&identity.email, identity.provider());
        let id = identity.id.to_string();
        let json = serde_json::to_vec(identity)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut index = write_txn.open_table(IDENTITY_INDEX)?;
            if index.get(key.as_str())?.is_some() {
                return Err(IdentityDbError::Duplicate(key));
            }
            let mut identities = write_txn.open_table(IDENTITIES)?;
            if identities.get(id.as_str())?.is_some() {
                return Err(IdentityDbError::Duplicate(id));
            }

            index.insert(key.as_str(), id.as_str())?;
            identities.insert(id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(identity.id)
    }

    fn get(&self, id: &str) -> DbResult<Identity> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(IDENTITIES)?;
        match table.get(id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(IdentityDbError::NotFound(format!("Identity {id}"))),
        }
    }

    fn get_by_index(&self, email: &str, provider: Provider) -> DbResult<Identity> {
        let key = index_key(email, provider);
        let id = {
            let read_txn = self.db.begin_read()?;
            let index = read_txn.open_table(IDENTITY_INDEX)?;
            let found = index.get(key.as_str())?.map(|v| v.value().to_string());
            found.ok_or(IdentityDbError::NotFound(key))?
        };
        self.get(&id)
    }

    fn replace(&self, identity: &Identity) -> DbResult<()> {
        let id = identity.id.to_string();
        let new_key = index_key(&identity.email, identity.provider());
        let json = serde_json::to_vec(identity)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut identities = write_txn.open_table(IDENTITIES)?;
            let existing: Identity = {
                let value = identities
                    .get(id.as_str())?
                    .ok_or_else(|| IdentityDbError::NotFound(format!("Identity {id}")))?;
                serde_json::from_slice(value.value())?
            };

            let old_key = index_key(&existing.email, existing.provider());
            if old_key != new_key {
                let mut index = write_txn.open_table(IDENTITY_INDEX)?;
                if index.get(new_key.as_str())?.is_some() {
                    return Err(IdentityDbError::Duplicate(new_key));
                }
                index.remove(old_key.as_str())?;
                index.insert(new_key.as_str(), id.as_str())?;
            }

            identities.insert(id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn set_confirmed(&self, id: &str) -> DbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(IDENTITIES)?;

            // Read existing value and deserialize before mutating
            let existing_bytes = {
                let existing = table
                    .get(id)?
                    .ok_or_else(|| IdentityDbError::NotFound(format!("Identity {id}")))?;
                existing.value().to_vec()
            };

            let mut identity: Identity = serde_json::from_slice(&existing_bytes)?;
            identity.email_confirmed = true;

            let json = serde_json::to_vec(&identity)?;
            table.insert(id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for IdentityDatabase {
    async fn create_identity(&self, identity: &Identity) -> StoreResult<Uuid> {
        Ok(self.insert(identity)?)
    }

    async fn find_by_email_and_provider(&self, email: &str, provider: Provider) -> StoreResult<Identity> {
        Ok(self.get_by_index(email, provider)?)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Identity> {
        Ok(self.get(&id.to_string())?)
    }

    async fn update_identity(&self, identity: &Identity) -> StoreResult<()> {
        Ok(self.replace(identity)?)
    }

    async fn mark_email_confirmed(&self, id: Uuid) -> StoreResult<()> {
        Ok(self.set_confirmed(&id.to_string())?)
    }
}
