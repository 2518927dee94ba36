// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{index_key, CredentialStore, StoreError, StoreResult};
use crate::identity::{Identity, Provider};

#[derive(Default)]
struct Tables {
    identities: HashMap<Uuid, Identity>,
    index: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.identities.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_identity(&self, identity: &Identity) -> StoreResult<Uuid> {
        let key = index_key(&identity.email, identity.provider());
        let mut tables = self.tables.write().await;

        if tables.index.contains_key(&key) {
            return Err(StoreError::DuplicateIdentity(key));
        }
        if tables.identities.contains_key(&identity.id) {
            return Err(StoreError::DuplicateIdentity(identity.id.to_string()));
        }

        tables.index.insert(key, identity.id);
        tables.identities.insert(identity.id, identity.clone());
        Ok(identity.id)
    }

    async fn find_by_email_and_provider(&self, email: &str, provider: Provider) -> StoreResult<Identity> {
        let key = index_key(email, provider);
        let tables = self.tables.read().await;
        tables
            .index
            .get(&key)
            .and_then(|id| tables.identities.get(id))
            .cloned()
            .ok_or(StoreError::NotFound(key))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Identity> {
        self.tables
            .read()
            .await
            .identities
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Identity {id}")))
    }

    async fn update_identity(&self, identity: &Identity) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.identities.get(&identity.id) else {
            return Err(StoreError::NotFound(format!("Identity {}", identity.id)));
        };

        let old_key = index_key(&existing.email, existing.provider());
        let new_key = index_key(&identity.email, identity.provider());
        if old_key != new_key {
            if tables.index.contains_key(&new_key) {
                return Err(StoreError::DuplicateIdentity(new_key));
            }
            tables.index.remove(&old_key);
            tables.index.insert(new_key, identity.id);
        }

        tables.identities.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn mark_email_confirmed(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let identity = tables
            .identities
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Identity {id}")))?;
        identity.email_confirmed = true;
        Ok(())
    }
}
