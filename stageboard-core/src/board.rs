//! Board projection
//!
//! Read-only column view handed to the view layer. Columns follow registry
//! order; items keep the order the controller holds them in. Items whose stage
//! is not in the registry land in a trailing unknown bucket instead of
//! vanishing.

use serde::Serialize;

use crate::item::{Domain, ItemId, PipelineItem};
use crate::registry::StageRegistry;

/// Column id of the bucket for unrecognized stages
pub const UNKNOWN_COLUMN: &str = "__unknown__";

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub stage: String,
    pub label: String,
    pub items: Vec<PipelineItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub domain: Domain,
    pub columns: Vec<Column>,
    /// Items whose stage is not a registry member
    pub unknown: Column,
}

impl Board {
    pub fn project<'a>(
        registry: &StageRegistry,
        items: impl IntoIterator<Item = &'a PipelineItem>,
    ) -> Self {
        let mut columns: Vec<Column> = registry
            .stages()
            .iter()
            .map(|s| Column {
                stage: s.id.clone(),
                label: s.display_label().to_string(),
                items: Vec::new(),
            })
            .collect();
        let mut unknown = Column {
            stage: UNKNOWN_COLUMN.to_string(),
            label: "Unknown".to_string(),
            items: Vec::new(),
        };

        for item in items {
            match registry.position(&item.stage) {
                Some(index) => columns[index].items.push(item.clone()),
                None => unknown.items.push(item.clone()),
            }
        }

        Self {
            domain: registry.domain(),
            columns,
            unknown,
        }
    }

    pub fn column(&self, stage: &str) -> Option<&Column> {
        if stage == UNKNOWN_COLUMN {
            return Some(&self.unknown);
        }
        self.columns.iter().find(|c| c.stage == stage)
    }

    /// Column id and index of an item
    pub fn locate(&self, id: &ItemId) -> Option<(&str, usize)> {
        self.columns
            .iter()
            .chain(std::iter::once(&self.unknown))
            .find_map(|c| {
                c.items
                    .iter()
                    .position(|i| &i.id == id)
                    .map(|index| (c.stage.as_str(), index))
            })
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.items.len()).sum::<usize>() + self.unknown.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
