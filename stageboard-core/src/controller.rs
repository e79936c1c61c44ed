//! Pipeline Controller
//!
//! Orchestrates every board mutation:
//!
//! 1. permission gate (no network call, no local change on denial)
//! 2. stage / field change on a candidate copy
//! 3. one history event
//! 4. sanitize
//! 5. storage call
//! 6. reconcile the local view with the storage echo, or revert it
//!
//! The view lock is never held across a storage call, so overlapping gestures
//! on different items proceed independently. Overlapping gestures on the same
//! item are not serialized: the last write to storage wins.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::config::PipelineConfig;
use crate::drag::{interpret, DragGesture, DragOutcome, StageTransition};
use crate::error::PipelineError;
use crate::history::{append_event, record_event, HistoryEvent};
use crate::identity::IdentityProvider;
use crate::item::{Domain, ItemId, NewItem, PipelineItem, Record};
use crate::permission::{can_mutate, Actor};
use crate::registry::{RegistryCatalog, StageRegistry};
use crate::sanitize::Sanitizer;
use crate::store::RecordStore;

/// Local copy of the board, in display order.
///
/// `shown` is what the board renders and `confirmed` is the last value storage
/// accepted. Mutations are always built from `confirmed`. `pending` holds the
/// ticket of the optimistic write that currently owns an item's display.
#[derive(Debug, Default)]
struct ViewState {
    order: Vec<ItemId>,
    shown: HashMap<ItemId, PipelineItem>,
    confirmed: HashMap<ItemId, PipelineItem>,
    pending: HashMap<ItemId, u64>,
    next_ticket: u64,
}

impl ViewState {
    fn replace_all(&mut self, items: Vec<PipelineItem>) {
        self.order.clear();
        self.shown.clear();
        self.confirmed.clear();
        self.pending.clear();
        for item in items {
            self.confirm(item, None);
        }
    }

    /// Replace in place, or append when new
    fn show(&mut self, item: PipelineItem) {
        if !self.shown.contains_key(&item.id) {
            self.order.push(item.id.clone());
        }
        self.shown.insert(item.id.clone(), item);
    }

    /// Display an unconfirmed candidate
    fn show_pending(&mut self, item: PipelineItem) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.pending.insert(item.id.clone(), ticket);
        self.show(item);
        ticket
    }

    /// Record a storage echo. The display follows it unless a newer
    /// optimistic write for the same item is still in flight.
    fn confirm(&mut self, item: PipelineItem, ticket: Option<u64>) {
        let superseded = match (self.pending.get(&item.id), ticket) {
            (None, _) => false,
            (Some(current), Some(mine)) => *current != mine,
            (Some(_), None) => true,
        };
        if !superseded {
            self.pending.remove(&item.id);
            self.show(item.clone());
        }
        self.confirmed.insert(item.id.clone(), item);
    }

    /// Undo a rejected optimistic write. A newer write that owns the display
    /// is left alone.
    fn revert(&mut self, id: &ItemId, ticket: u64) -> bool {
        if self.pending.get(id) != Some(&ticket) {
            return false;
        }
        self.pending.remove(id);
        if let Some(confirmed) = self.confirmed.get(id).cloned() {
            self.show(confirmed);
        }
        true
    }

    /// Take an item off the board, returning its slot
    fn hide(&mut self, id: &ItemId) -> Option<(usize, PipelineItem)> {
        let item = self.shown.remove(id)?;
        let position = self.order.iter().position(|i| i == id)?;
        self.order.remove(position);
        Some((position, item))
    }

    fn restore(&mut self, position: usize, item: PipelineItem) {
        if self.shown.contains_key(&item.id) {
            return;
        }
        let position = position.min(self.order.len());
        self.order.insert(position, item.id.clone());
        self.shown.insert(item.id.clone(), item);
    }

    fn forget(&mut self, id: &ItemId) {
        self.hide(id);
        self.confirmed.remove(id);
        self.pending.remove(id);
    }

    fn ordered(&self) -> impl Iterator<Item = &PipelineItem> {
        self.order.iter().filter_map(|id| self.shown.get(id))
    }
}

/// Board engine for one domain
pub struct PipelineController {
    domain: Domain,
    registry: StageRegistry,
    sanitizer: Sanitizer,
    store: Arc<dyn RecordStore>,
    identity: Arc<dyn IdentityProvider>,
    optimistic: bool,
    return_url: String,
    view: RwLock<ViewState>,
}

impl PipelineController {
    pub fn new(
        domain: Domain,
        catalog: &RegistryCatalog,
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            domain,
            registry: catalog.registry(domain).clone(),
            sanitizer: Sanitizer::new(catalog.sanitize_rules(domain).clone()),
            store,
            identity,
            optimistic: config.optimistic_updates,
            return_url: config.return_url.clone(),
            view: RwLock::new(ViewState::default()),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Signed-in actor, anonymous viewer otherwise
    pub async fn current_actor(&self) -> Actor {
        self.identity.actor_or_anonymous().await
    }

    /// Whether edit/delete affordances should be shown
    pub fn can_mutate(&self, actor: &Actor, item: &PipelineItem) -> bool {
        can_mutate(actor, item)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the local view with the storage listing
    pub async fn load(&self) -> Result<usize, PipelineError> {
        let items = match self.store.list(self.domain).await {
            Ok(items) => items,
            Err(err) => return Err(self.storage_failed(&err).await),
        };
        let count = items.len();
        self.view.write().await.replace_all(items);
        debug!(domain = %self.domain, count, "Board loaded");
        Ok(count)
    }

    pub async fn board(&self) -> Board {
        let view = self.view.read().await;
        Board::project(&self.registry, view.ordered())
    }

    /// Item as currently displayed, optimistic changes included
    pub async fn item(&self, id: &ItemId) -> Option<PipelineItem> {
        self.view.read().await.shown.get(id).cloned()
    }

    /// History for display, oldest first
    pub async fn history_of(&self, id: &ItemId) -> Option<Vec<HistoryEvent>> {
        self.view
            .read()
            .await
            .shown
            .get(id)
            .map(|item| item.history.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stage transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Interpret a drag and apply it when it is a stage change.
    /// Returns `None` for no-ops and invalid drops.
    pub async fn handle_gesture(
        &self,
        actor: &Actor,
        gesture: &DragGesture,
    ) -> Result<Option<PipelineItem>, PipelineError> {
        let outcome = interpret(gesture, &self.registry);
        self.apply_outcome(actor, &outcome).await
    }

    /// Act on an already interpreted gesture
    pub async fn apply_outcome(
        &self,
        actor: &Actor,
        outcome: &DragOutcome,
    ) -> Result<Option<PipelineItem>, PipelineError> {
        match outcome {
            DragOutcome::StageTransition(transition) => {
                self.apply_transition(actor, transition).await.map(Some)
            }
            outcome => {
                debug!(?outcome, "Gesture ignored");
                Ok(None)
            }
        }
    }

    /// Move an item to `transition.to_stage`
    pub async fn apply_transition(
        &self,
        actor: &Actor,
        transition: &StageTransition,
    ) -> Result<PipelineItem, PipelineError> {
        let item = self.require_item(&transition.item_id).await?;
        self.require_permission(actor, &item)?;

        if !self.registry.is_valid_stage(&transition.to_stage) {
            return Err(PipelineError::UnknownStage {
                domain: self.domain,
                stage: transition.to_stage.clone(),
            });
        }

        // The stored stage is authoritative over whatever column the card was drawn in
        let from = item.stage.clone();
        if from != transition.from_stage {
            debug!(
                item_id = %item.id,
                gesture_from = %transition.from_stage,
                stored_from = %from,
                "Gesture source differs from stored stage"
            );
        }
        if from == transition.to_stage {
            return Ok(item);
        }

        let to = transition.to_stage.clone();
        let mut candidate = item.clone();
        candidate.stage = to.clone();
        let event = HistoryEvent::new(
            actor,
            self.registry.describe_transition(&from, &to),
            Utc::now(),
        )
        .with_stage_change(from.as_str(), to.as_str());
        let candidate = append_event(&candidate, event);

        let saved = self.commit_update(candidate).await?;
        info!(domain = %self.domain, item_id = %saved.id, %from, %to, "Stage changed");
        Ok(saved)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Other mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an item in the default stage, owned by `actor`
    pub async fn create_item(
        &self,
        actor: &Actor,
        fields: Record,
    ) -> Result<PipelineItem, PipelineError> {
        let owner = match actor.identity.as_deref() {
            Some(id) if actor.is_authenticated() => id.to_string(),
            _ => {
                return Err(PipelineError::Unauthenticated {
                    action: format!("create a {}", self.domain.noun()),
                })
            }
        };

        let action = format!("Created {}", self.domain.noun());
        let event = HistoryEvent::new(actor, action, Utc::now());
        let record = NewItem {
            domain: self.domain,
            stage: self.registry.default_stage().to_string(),
            owner_identity: owner,
            fields: self.sanitizer.sanitize(fields),
            history: vec![event],
        };

        let created = match self.store.create(self.domain, &record).await {
            Ok(item) => item,
            Err(err) => return Err(self.storage_failed(&err).await),
        };
        self.view.write().await.confirm(created.clone(), None);
        info!(domain = %self.domain, item_id = %created.id, "Item created");
        Ok(created)
    }

    /// Merge `patch` into the item's fields. A `null` patch value removes the field.
    pub async fn edit_fields(
        &self,
        actor: &Actor,
        id: &ItemId,
        patch: Record,
    ) -> Result<PipelineItem, PipelineError> {
        let action = format!("Edited {}", self.domain.noun());
        self.apply_edit(actor, id, &action, patch).await
    }

    /// History-only mutation such as "Voted up"
    pub async fn record_action(
        &self,
        actor: &Actor,
        id: &ItemId,
        action: &str,
    ) -> Result<PipelineItem, PipelineError> {
        self.apply_edit(actor, id, action, Record::new()).await
    }

    /// Field patch plus an arbitrary history action
    pub async fn apply_edit(
        &self,
        actor: &Actor,
        id: &ItemId,
        action: &str,
        patch: Record,
    ) -> Result<PipelineItem, PipelineError> {
        let item = self.require_item(id).await?;
        self.require_permission(actor, &item)?;

        let mut candidate = item.clone();
        for (key, value) in patch {
            if value.is_null() {
                candidate.fields.remove(&key);
            } else {
                candidate.fields.insert(key, value);
            }
        }
        let candidate = record_event(&candidate, actor, action);

        let saved = self.commit_update(candidate).await?;
        debug!(domain = %self.domain, item_id = %saved.id, action, "Item updated");
        Ok(saved)
    }

    /// Delete an item from storage and from the view
    pub async fn delete_item(&self, actor: &Actor, id: &ItemId) -> Result<(), PipelineError> {
        let item = self.require_item(id).await?;
        self.require_permission(actor, &item)?;

        let hidden = if self.optimistic {
            self.view.write().await.hide(id)
        } else {
            None
        };

        if let Err(err) = self.store.delete(self.domain, id).await {
            if let Some((position, item)) = hidden {
                self.view.write().await.restore(position, item);
            }
            return Err(self.storage_failed(&err).await);
        }

        self.view.write().await.forget(id);
        info!(domain = %self.domain, item_id = %id, "Item deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Last confirmed value of an item, the base of every mutation
    async fn require_item(&self, id: &ItemId) -> Result<PipelineItem, PipelineError> {
        self.view
            .read()
            .await
            .confirmed
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::ItemNotFound(id.clone()))
    }

    fn require_permission(&self, actor: &Actor, item: &PipelineItem) -> Result<(), PipelineError> {
        if can_mutate(actor, item) {
            return Ok(());
        }
        warn!(
            domain = %self.domain,
            item_id = %item.id,
            actor = actor.label(),
            role = %actor.role,
            "Mutation denied"
        );
        Err(PipelineError::PermissionDenied {
            actor: actor.label().to_string(),
            item_id: item.id.clone(),
        })
    }

    /// Sanitize, persist and reconcile with the storage echo
    async fn commit_update(
        &self,
        mut candidate: PipelineItem,
    ) -> Result<PipelineItem, PipelineError> {
        candidate.fields = self.sanitizer.sanitize(std::mem::take(&mut candidate.fields));

        let ticket = if self.optimistic {
            Some(self.view.write().await.show_pending(candidate.clone()))
        } else {
            None
        };

        match self.store.update(self.domain, &candidate.id, &candidate).await {
            Ok(echo) => {
                self.view.write().await.confirm(echo.clone(), ticket);
                Ok(echo)
            }
            Err(err) => {
                if let Some(ticket) = ticket {
                    let reverted = self.view.write().await.revert(&candidate.id, ticket);
                    debug!(item_id = %candidate.id, reverted, "Optimistic update rejected");
                }
                Err(self.storage_failed(&err).await)
            }
        }
    }

    async fn storage_failed(&self, err: &anyhow::Error) -> PipelineError {
        let classified = PipelineError::from_storage(err);
        if classified.is_auth_expired() {
            warn!(domain = %self.domain, error = %err, "Storage rejected credentials");
            self.identity.redirect_to_login(&self.return_url).await;
        } else {
            warn!(domain = %self.domain, error = %err, "Storage call failed");
        }
        classified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use crate::permission::Role;
    use crate::store::MemoryRecordStore;
    use serde_json::json;

    fn commission(id: &str, owner: &str, stage: &str) -> PipelineItem {
        PipelineItem {
            id: ItemId::new(id),
            domain: Domain::Commissions,
            stage: stage.into(),
            owner_identity: owner.into(),
            fields: Record::new(),
            history: Vec::new(),
        }
    }

    async fn controller(items: Vec<PipelineItem>, optimistic: bool) -> PipelineController {
        let config = PipelineConfig {
            optimistic_updates: optimistic,
            ..PipelineConfig::default()
        };
        let ctl = PipelineController::new(
            Domain::Commissions,
            &RegistryCatalog::builtin(),
            Arc::new(MemoryRecordStore::with_items(items)),
            Arc::new(StaticIdentity::signed_out()),
            &config,
        );
        ctl.load().await.unwrap();
        ctl
    }

    #[tokio::test]
    async fn test_admin_drag_changes_stage() {
        let ctl = controller(vec![commission("c-1", "ana@example.com", "requested")], false).await;
        let admin = Actor::new("boss@example.com", Role::Admin);
        let gesture = DragGesture::new("c-1", "requested", 0).dropped_on("accepted", 0);

        let saved = ctl.handle_gesture(&admin, &gesture).await.unwrap().unwrap();

        assert_eq!(saved.stage, "accepted");
        assert_eq!(saved.history.len(), 1);
        assert_eq!(saved.history[0].action, "Changed stage to accepted");
        assert_eq!(saved.history[0].actor, "boss@example.com");
        assert_eq!(ctl.board().await.locate(&saved.id), Some(("accepted", 0)));
    }

    #[tokio::test]
    async fn test_same_stage_transition_is_idempotent() {
        let ctl = controller(vec![commission("c-1", "ana@example.com", "accepted")], false).await;
        let owner = Actor::new("ana@example.com", Role::User);
        let transition = StageTransition {
            item_id: ItemId::new("c-1"),
            from_stage: crate::board::UNKNOWN_COLUMN.into(),
            to_stage: "accepted".into(),
        };

        let saved = ctl.apply_transition(&owner, &transition).await.unwrap();
        assert!(saved.history.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_target_stage() {
        let ctl = controller(vec![commission("c-1", "ana@example.com", "requested")], false).await;
        let admin = Actor::new("boss@example.com", Role::Admin);
        let transition = StageTransition {
            item_id: ItemId::new("c-1"),
            from_stage: "requested".into(),
            to_stage: "archived".into(),
        };

        let err = ctl.apply_transition(&admin, &transition).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStage { .. }));
    }

    #[tokio::test]
    async fn test_missing_item() {
        let ctl = controller(vec![], false).await;
        let admin = Actor::new("boss@example.com", Role::Admin);
        let gesture = DragGesture::new("nope", "requested", 0).dropped_on("accepted", 0);

        let err = ctl.handle_gesture(&admin, &gesture).await.unwrap_err();
        assert!(matches!(err, PipelineError::ItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_edit_vote_delete() {
        let ctl = controller(vec![], false).await;
        let ana = Actor::new("ana@example.com", Role::User);

        let created = ctl
            .create_item(&ana, Record::from_iter([("payment".to_string(), json!("40"))]))
            .await
            .unwrap();
        assert_eq!(created.stage, "requested");
        assert_eq!(created.owner_identity, "ana@example.com");
        assert_eq!(created.fields["payment"], json!(40));
        assert_eq!(created.history[0].action, "Created Commission");

        let edited = ctl
            .edit_fields(
                &ana,
                &created.id,
                Record::from_iter([("title".to_string(), json!("Ref sheet"))]),
            )
            .await
            .unwrap();
        assert_eq!(edited.field_str("title"), Some("Ref sheet"));
        assert_eq!(edited.history.last().unwrap().action, "Edited Commission");

        let voted = ctl.record_action(&ana, &created.id, "Voted up").await.unwrap();
        assert_eq!(voted.history.len(), 3);

        ctl.delete_item(&ana, &created.id).await.unwrap();
        assert!(ctl.item(&created.id).await.is_none());
        assert!(ctl.board().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_identity() {
        let ctl = controller(vec![], false).await;
        let err = ctl
            .create_item(&Actor::anonymous(), Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_null_patch_value_removes_field() {
        let mut item = commission("c-1", "ana@example.com", "requested");
        item.fields.insert("budget".into(), json!(10));
        let ctl = controller(vec![item], false).await;
        let ana = Actor::new("ana@example.com", Role::User);

        let edited = ctl
            .edit_fields(
                &ana,
                &ItemId::new("c-1"),
                Record::from_iter([("budget".to_string(), serde_json::Value::Null)]),
            )
            .await
            .unwrap();
        assert!(!edited.fields.contains_key("budget"));
    }

    #[test]
    fn test_view_state_keeps_slot_on_update() {
        let mut view = ViewState::default();
        view.confirm(commission("a", "x", "requested"), None);
        view.confirm(commission("b", "x", "requested"), None);
        view.confirm(commission("a", "x", "accepted"), None);

        let ids: Vec<_> = view.ordered().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let (position, hidden) = view.hide(&ItemId::new("a")).unwrap();
        assert_eq!(position, 0);
        view.restore(position, hidden);
        let ids: Vec<_> = view.ordered().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_view_state_revert_respects_newer_writes() {
        let id = ItemId::new("a");
        let mut view = ViewState::default();
        view.confirm(commission("a", "x", "requested"), None);

        let first = view.show_pending(commission("a", "x", "accepted"));
        let second = view.show_pending(commission("a", "x", "delivered"));

        // The newer write owns the display, so the older one cannot undo it
        assert!(!view.revert(&id, first));
        assert_eq!(view.shown[&id].stage, "delivered");

        // An echo for the older write updates the confirmed copy only
        view.confirm(commission("a", "x", "accepted"), Some(first));
        assert_eq!(view.shown[&id].stage, "delivered");
        assert_eq!(view.confirmed[&id].stage, "accepted");

        assert!(view.revert(&id, second));
        assert_eq!(view.shown[&id].stage, "accepted");
        assert!(view.pending.is_empty());
    }
}
