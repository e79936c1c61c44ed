//! Permission Gate
//!
//! Mutation rights come from role or ownership. Reads are never gated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::history::ANONYMOUS_ACTOR;
use crate::item::PipelineItem;

/// Dashboard role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(alias = "lead_mod", alias = "lead-mod")]
    LeadMod,
    Mod,
    User,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::LeadMod => "leadmod",
            Self::Mod => "mod",
            Self::User => "user",
            Self::Viewer => "viewer",
        }
    }

    /// Roles allowed to mutate any item regardless of owner
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Admin | Self::LeadMod)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "leadmod" | "lead_mod" | "lead-mod" => Ok(Self::LeadMod),
            "mod" => Ok(Self::Mod),
            "user" => Ok(Self::User),
            "viewer" => Ok(Self::Viewer),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The user behind a gesture. Passed explicitly into every gated call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable identifier (email). `None` when unauthenticated.
    pub identity: Option<String>,
    pub role: Role,
}

impl Actor {
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        Self {
            identity: Some(identity.into()),
            role,
        }
    }

    /// Unauthenticated viewer
    pub fn anonymous() -> Self {
        Self {
            identity: None,
            role: Role::Viewer,
        }
    }

    /// Name recorded in history and denial messages
    pub fn label(&self) -> &str {
        self.identity.as_deref().unwrap_or(ANONYMOUS_ACTOR)
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.as_deref().is_some_and(|id| !id.trim().is_empty())
    }

    pub fn owns(&self, item: &PipelineItem) -> bool {
        match self.identity.as_deref() {
            Some(id) if !id.trim().is_empty() => id == item.owner_identity,
            _ => false,
        }
    }
}

/// True iff the actor may change or delete `item`
pub fn can_mutate(actor: &Actor, item: &PipelineItem) -> bool {
    actor.role.is_elevated() || actor.owns(item)
}
