//! Record Storage
//!
//! CRUD interface to the record backend. The controller only talks to
//! storage through [`RecordStore`]; [`MemoryRecordStore`] is the in-process
//! backend for tests and the CLI.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::item::{Domain, ItemId, NewItem, PipelineItem, Record};

/// Persistence trait for board items.
///
/// Implementations assign ids on create and must never reuse one. Errors
/// whose message mentions "permission" or "403" are treated as an expired
/// session by the controller.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, domain: Domain) -> Result<Vec<PipelineItem>>;
    async fn create(&self, domain: Domain, record: &NewItem) -> Result<PipelineItem>;
    /// Returns the stored item as the backend now sees it
    async fn update(&self, domain: Domain, id: &ItemId, record: &PipelineItem)
        -> Result<PipelineItem>;
    async fn delete(&self, domain: Domain, id: &ItemId) -> Result<()>;
}

/// In-memory RecordStore.
///
/// Mirrors the backend's schema checks: `null` anywhere inside `fields` is
/// rejected, and `owner_identity` cannot change after creation.
pub struct MemoryRecordStore {
    inner: RwLock<HashMap<Domain, Vec<PipelineItem>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Store pre-existing items as-is, keeping their ids
    pub fn with_items(items: impl IntoIterator<Item = PipelineItem>) -> Self {
        let mut by_domain: HashMap<Domain, Vec<PipelineItem>> = HashMap::new();
        for item in items {
            by_domain.entry(item.domain).or_default().push(item);
        }
        Self {
            inner: RwLock::new(by_domain),
        }
    }

    /// Direct read, bypassing the async interface
    pub fn get(&self, domain: Domain, id: &ItemId) -> Option<PipelineItem> {
        let store = self.inner.read().ok()?;
        store
            .get(&domain)
            .and_then(|items| items.iter().find(|i| &i.id == id))
            .cloned()
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn reject_nulls(fields: &Record) -> Result<()> {
    fn contains_null(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Array(items) => items.iter().any(contains_null),
            Value::Object(map) => map.values().any(contains_null),
            _ => false,
        }
    }

    if let Some((key, _)) = fields.iter().find(|(_, v)| contains_null(v)) {
        bail!("Invalid record: field '{}' contains null", key);
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list(&self, domain: Domain) -> Result<Vec<PipelineItem>> {
        let store = self.inner.read().map_err(|e| anyhow!("Lock: {}", e))?;
        Ok(store.get(&domain).cloned().unwrap_or_default())
    }

    async fn create(&self, domain: Domain, record: &NewItem) -> Result<PipelineItem> {
        reject_nulls(&record.fields)?;
        let item = record
            .clone()
            .into_item(ItemId::new(Uuid::new_v4().to_string()));

        let mut store = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        store.entry(domain).or_default().push(item.clone());
        Ok(item)
    }

    async fn update(
        &self,
        domain: Domain,
        id: &ItemId,
        record: &PipelineItem,
    ) -> Result<PipelineItem> {
        reject_nulls(&record.fields)?;

        let mut store = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        let existing = store
            .get_mut(&domain)
            .and_then(|items| items.iter_mut().find(|i| &i.id == id))
            .ok_or_else(|| anyhow!("Record not found: {}/{}", domain, id))?;

        existing.stage = record.stage.clone();
        existing.fields = record.fields.clone();
        existing.history = record.history.clone();
        Ok(existing.clone())
    }

    async fn delete(&self, domain: Domain, id: &ItemId) -> Result<()> {
        let mut store = self.inner.write().map_err(|e| anyhow!("Lock: {}", e))?;
        let items = store.entry(domain).or_default();
        let before = items.len();
        items.retain(|i| &i.id != id);
        if items.len() == before {
            bail!("Record not found: {}/{}", domain, id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_task(owner: &str) -> NewItem {
        NewItem {
            domain: Domain::Tasks,
            stage: "in_queue".into(),
            owner_identity: owner.into(),
            fields: Record::new(),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let store = MemoryRecordStore::new();
        let a = store.create(Domain::Tasks, &new_task("a")).await.unwrap();
        let b = store.create(Domain::Tasks, &new_task("a")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.list(Domain::Tasks).await.unwrap().len(), 2);
        assert!(store.list(Domain::Ideas).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_owner() {
        let store = MemoryRecordStore::new();
        let created = store.create(Domain::Tasks, &new_task("a")).await.unwrap();

        let mut candidate = created.clone();
        candidate.stage = "done".into();
        candidate.owner_identity = "mallory".into();

        let echoed = store
            .update(Domain::Tasks, &created.id, &candidate)
            .await
            .unwrap();
        assert_eq!(echoed.stage, "done");
        assert_eq!(echoed.owner_identity, "a");
    }

    #[tokio::test]
    async fn test_rejects_null_fields() {
        let store = MemoryRecordStore::new();
        let mut record = new_task("a");
        record
            .fields
            .insert("artist_handles".into(), json!({"vgen": null}));
        assert!(store.create(Domain::Tasks, &record).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_record() {
        let store = MemoryRecordStore::new();
        let ghost = new_task("a").into_item(ItemId::new("ghost"));
        assert!(store.update(Domain::Tasks, &ghost.id, &ghost).await.is_err());
        assert!(store.delete(Domain::Tasks, &ghost.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let store = MemoryRecordStore::new();
        let created = store.create(Domain::Tasks, &new_task("a")).await.unwrap();
        store.delete(Domain::Tasks, &created.id).await.unwrap();
        assert!(store.get(Domain::Tasks, &created.id).is_none());
    }
}
