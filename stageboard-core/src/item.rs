//! Pipeline Item Types
//!
//! The generalized Idea / Commission / Task record managed by the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::history::HistoryEvent;

/// Loosely-typed domain attributes (title, payment, links, handles, ...)
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Board domain. Each domain owns one stage registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Ideas,
    Commissions,
    Tasks,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Ideas, Domain::Commissions, Domain::Tasks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ideas => "ideas",
            Self::Commissions => "commissions",
            Self::Tasks => "tasks",
        }
    }

    /// Singular noun used in history text ("Edited Idea")
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Ideas => "Idea",
            Self::Commissions => "Commission",
            Self::Tasks => "Task",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ideas" | "idea" => Ok(Self::Ideas),
            "commissions" | "commission" => Ok(Self::Commissions),
            "tasks" | "task" => Ok(Self::Tasks),
            other => Err(format!("Unknown domain: {}", other)),
        }
    }
}

/// Storage-assigned identifier. Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A persisted board item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineItem {
    pub id: ItemId,
    pub domain: Domain,
    /// Current stage (column) id
    pub stage: String,
    /// Stable identifier of the creating actor
    pub owner_identity: String,
    /// Domain-specific attributes
    #[serde(default)]
    pub fields: Record,
    /// Append-only audit log
    #[serde(default)]
    pub history: Vec<HistoryEvent>,
}

impl PipelineItem {
    /// Look up a string field, e.g. `title`
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }
}

/// Item payload before storage assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub domain: Domain,
    pub stage: String,
    pub owner_identity: String,
    #[serde(default)]
    pub fields: Record,
    #[serde(default)]
    pub history: Vec<HistoryEvent>,
}

impl NewItem {
    /// Attach the id handed out by storage
    pub fn into_item(self, id: ItemId) -> PipelineItem {
        PipelineItem {
            id,
            domain: self.domain,
            stage: self.stage,
            owner_identity: self.owner_identity,
            fields: self.fields,
            history: self.history,
        }
    }
}
