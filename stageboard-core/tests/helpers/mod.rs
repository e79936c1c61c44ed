//! Store and identity doubles for controller integration tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use stageboard_core::{
    Actor, AuthError, Domain, IdentityProvider, ItemId, MemoryRecordStore, NewItem,
    PipelineConfig, PipelineController, PipelineItem, Record, RecordStore, RegistryCatalog,
};

/// MemoryRecordStore that records every call and can be told to fail or pause
pub struct ScriptedStore {
    inner: MemoryRecordStore,
    calls: Mutex<Vec<String>>,
    fail_with: Mutex<Option<String>>,
    hold: Mutex<Option<Hold>>,
}

/// Pauses the next update until released
#[derive(Clone)]
pub struct Hold {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
    /// Error the held update returns once released
    fail_with: Option<String>,
}

impl ScriptedStore {
    pub fn new(items: Vec<PipelineItem>) -> Self {
        Self {
            inner: MemoryRecordStore::with_items(items),
            calls: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
            hold: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than the initial `list`
    pub fn mutation_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("list"))
            .collect()
    }

    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn hold_next_update(&self) -> Hold {
        self.install_hold(None)
    }

    /// Hold the next update, then fail only that call
    pub fn hold_next_update_then_fail(&self, message: &str) -> Hold {
        self.install_hold(Some(message.to_string()))
    }

    fn install_hold(&self, fail_with: Option<String>) -> Hold {
        let hold = Hold {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            fail_with,
        };
        *self.hold.lock().unwrap() = Some(hold.clone());
        hold
    }

    pub fn stored(&self, domain: Domain, id: &str) -> Option<PipelineItem> {
        self.inner.get(domain, &ItemId::new(id))
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.fail_with.lock().unwrap().clone() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn list(&self, domain: Domain) -> Result<Vec<PipelineItem>> {
        self.calls.lock().unwrap().push(format!("list {}", domain));
        self.inner.list(domain).await
    }

    async fn create(&self, domain: Domain, record: &NewItem) -> Result<PipelineItem> {
        self.record(format!("create {}", domain))?;
        self.inner.create(domain, record).await
    }

    async fn update(
        &self,
        domain: Domain,
        id: &ItemId,
        record: &PipelineItem,
    ) -> Result<PipelineItem> {
        let hold = self.hold.lock().unwrap().take();
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
            if let Some(message) = hold.fail_with {
                self.calls.lock().unwrap().push(format!("update {} {}", domain, id));
                return Err(anyhow!(message));
            }
        }
        self.record(format!("update {} {}", domain, id))?;
        self.inner.update(domain, id, record).await
    }

    async fn delete(&self, domain: Domain, id: &ItemId) -> Result<()> {
        self.record(format!("delete {} {}", domain, id))?;
        self.inner.delete(domain, id).await
    }
}

/// Identity double that remembers login redirects
#[derive(Default)]
pub struct RecordingIdentity {
    pub redirects: Mutex<Vec<String>>,
}

impl RecordingIdentity {
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for RecordingIdentity {
    async fn current_actor(&self) -> Result<Actor, AuthError> {
        Err(AuthError::NotSignedIn)
    }

    async fn redirect_to_login(&self, return_url: &str) {
        self.redirects.lock().unwrap().push(return_url.to_string());
    }
}

pub struct Harness {
    pub controller: Arc<PipelineController>,
    pub store: Arc<ScriptedStore>,
    pub identity: Arc<RecordingIdentity>,
}

pub async fn harness(domain: Domain, items: Vec<PipelineItem>, optimistic: bool) -> Harness {
    let store = Arc::new(ScriptedStore::new(items));
    let identity = Arc::new(RecordingIdentity::default());
    let config = PipelineConfig {
        optimistic_updates: optimistic,
        return_url: format!("/boards/{}", domain),
        ..PipelineConfig::default()
    };
    let controller = PipelineController::new(
        domain,
        &RegistryCatalog::builtin(),
        store.clone(),
        identity.clone(),
        &config,
    );
    controller.load().await.unwrap();

    Harness {
        controller: Arc::new(controller),
        store,
        identity,
    }
}

pub fn item(domain: Domain, id: &str, owner: &str, stage: &str) -> PipelineItem {
    PipelineItem {
        id: ItemId::new(id),
        domain,
        stage: stage.into(),
        owner_identity: owner.into(),
        fields: Record::new(),
        history: Vec::new(),
    }
}
