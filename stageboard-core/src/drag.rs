//! Drag-Reorder Interpreter
//!
//! Turns a completed drag into a command. Only column membership is durable
//! state; moving a card up or down inside its column is visual feedback and
//! never reaches storage.

use serde::{Deserialize, Serialize};

use crate::item::ItemId;
use crate::registry::StageRegistry;

/// Drop location reported by the drag source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTarget {
    pub column: String,
    pub index: usize,
}

/// Raw drag-end gesture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragGesture {
    pub item_id: ItemId,
    pub source_column: String,
    pub source_index: usize,
    /// `None` when the card was dropped outside every column
    #[serde(default)]
    pub destination: Option<DropTarget>,
}

impl DragGesture {
    pub fn new(
        item_id: impl Into<ItemId>,
        source_column: impl Into<String>,
        source_index: usize,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            source_column: source_column.into(),
            source_index,
            destination: None,
        }
    }

    pub fn dropped_on(mut self, column: impl Into<String>, index: usize) -> Self {
        self.destination = Some(DropTarget {
            column: column.into(),
            index,
        });
        self
    }
}

/// A validated stage change request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub item_id: ItemId,
    pub from_stage: String,
    pub to_stage: String,
}

/// What a gesture means
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DragOutcome {
    /// Nothing to persist
    NoOp { reason: NoOpReason },
    /// Dropped on something that is not a stage of this board
    Invalid { column: String },
    StageTransition(StageTransition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// Dropped outside any column
    NoDestination,
    /// Dropped back where it started
    SamePosition,
    /// Reordered within its own column
    SameColumn,
}

impl DragOutcome {
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::StageTransition(_))
    }
}

/// Classify a gesture against the board's registry
pub fn interpret(gesture: &DragGesture, registry: &StageRegistry) -> DragOutcome {
    let Some(destination) = &gesture.destination else {
        return DragOutcome::NoOp {
            reason: NoOpReason::NoDestination,
        };
    };

    if destination.column == gesture.source_column {
        let reason = if destination.index == gesture.source_index {
            NoOpReason::SamePosition
        } else {
            NoOpReason::SameColumn
        };
        return DragOutcome::NoOp { reason };
    }

    if !registry.is_valid_stage(&destination.column) {
        return DragOutcome::Invalid {
            column: destination.column.clone(),
        };
    }

    DragOutcome::StageTransition(StageTransition {
        item_id: gesture.item_id.clone(),
        from_stage: gesture.source_column.clone(),
        to_stage: destination.column.clone(),
    })
}
