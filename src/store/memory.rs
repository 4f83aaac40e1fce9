//! In-memory document store.
//!
//! Reference [`DocumentStore`] implementation backed by a single map under
//! a tokio `RwLock`. Commit batches are checked and applied under one
//! write guard, so a batch is never partially visible.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::document::{DocumentKey, Version, VersionedDocument};
use crate::store::{ConditionalWrite, DocumentStore, StoreError};

struct StoredEntry {
    payload: Value,
    version: Version,
}

/// In-memory document store with per-document version tags.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<DocumentKey, StoredEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document directly, bypassing version
    /// conditions. Seeding helper for tests and fixtures; returns the
    /// version the document ends up at.
    pub async fn insert(&self, key: DocumentKey, payload: Value) -> Version {
        let mut entries = self.entries.write().await;
        let version = entries
            .get(&key)
            .map(|entry| entry.version.next())
            .unwrap_or_else(Version::first);
        entries.insert(key, StoredEntry { payload, version });
        version
    }

    /// Returns the current payload of a document, if present.
    pub async fn document(&self, key: &DocumentKey) -> Option<Value> {
        let entries = self.entries.read().await;
        entries.get(key).map(|entry| entry.payload.clone())
    }

    /// Returns the current version of a document, if present.
    pub async fn version_of(&self, key: &DocumentKey) -> Option<Version> {
        let entries = self.entries.read().await;
        entries.get(key).map(|entry| entry.version)
    }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<VersionedDocument>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .map(|entry| VersionedDocument::new(entry.payload.clone(), entry.version)))
    }

    async fn commit(&self, writes: &[ConditionalWrite]) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;

        // Validate every expectation before touching anything.
        for write in writes {
            let current = entries.get(&write.key).map(|entry| entry.version);
            if !write.expected.matches(current) {
                return Ok(false);
            }
        }

        for write in writes {
            let version = entries
                .get(&write.key)
                .map(|entry| entry.version.next())
                .unwrap_or_else(Version::first);
            entries.insert(
                write.key.clone(),
                StoredEntry {
                    payload: write.document.clone(),
                    version,
                },
            );
        }

        Ok(true)
    }
}
