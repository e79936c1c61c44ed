//! Audit History
//!
//! Every accepted mutation appends exactly one [`HistoryEvent`]. Recording is
//! pure: the input item is left untouched so an optimistic copy can be shown
//! and later reconciled or thrown away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::PipelineItem;
use crate::permission::Actor;

/// Actor label recorded when the mutating actor has no identity
pub const ANONYMOUS_ACTOR: &str = "anonymous";

/// One immutable audit-log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Who caused the event
    pub actor: String,
    /// When the engine accepted the mutation (RFC 3339)
    pub timestamp: DateTime<Utc>,
    /// Human-readable description ("Moved from Draft to Approved", "Voted up")
    pub action: String,
    /// Structured stage move, present only on stage transitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_change: Option<StageChange>,
}

/// Source and target stage of a transition event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChange {
    pub from: String,
    pub to: String,
}

impl HistoryEvent {
    pub fn new(actor: &Actor, action: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            actor: actor.label().to_string(),
            timestamp,
            action: action.into(),
            stage_change: None,
        }
    }

    pub fn with_stage_change(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.stage_change = Some(StageChange {
            from: from.into(),
            to: to.into(),
        });
        self
    }
}

/// Return a copy of `item` with one more history entry, stamped now
pub fn record_event(item: &PipelineItem, actor: &Actor, action: impl Into<String>) -> PipelineItem {
    append_event(item, HistoryEvent::new(actor, action, Utc::now()))
}

/// Return a copy of `item` with `event` appended
pub fn append_event(item: &PipelineItem, event: HistoryEvent) -> PipelineItem {
    let mut next = item.clone();
    next.history.push(event);
    next
}
