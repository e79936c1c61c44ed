//! Stage Registry
//!
//! Per-domain ordered stage lists. Order drives column rendering only: any
//! stage may move to any other stage, the single legality check is registry
//! membership.
//!
//! Built-in registries cover the three boards. A YAML catalog can replace the
//! registry (and sanitize rules) of any domain:
//!
//! ```yaml
//! domains:
//!   - domain: tasks
//!     default_stage: in_queue
//!     wording: moved
//!     stages:
//!       - { id: in_queue, label: In Queue }
//!       - { id: done, label: Done }
//!     sanitize:
//!       link_lists: [reference_links]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::board::UNKNOWN_COLUMN;
use crate::item::Domain;
use crate::sanitize::SanitizeRules;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Registry for {0} has no stages")]
    Empty(Domain),

    #[error("Registry for {domain} has a blank stage id at position {index}")]
    BlankStage { domain: Domain, index: usize },

    #[error("Registry for {domain} lists stage '{stage}' twice")]
    DuplicateStage { domain: Domain, stage: String },

    #[error("Default stage '{stage}' is not a stage of {domain}")]
    UnknownDefault { domain: Domain, stage: String },

    #[error("Registry for {domain} uses reserved stage id '{stage}'")]
    ReservedStage { domain: Domain, stage: String },
}

/// One stage column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDef {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl StageDef {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Label, falling back to the id
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// How a stage change is phrased in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionWording {
    /// "Moved from X to Y"
    #[default]
    Moved,
    /// "Changed stage to Y"
    Changed,
}

impl TransitionWording {
    pub fn describe(&self, from: &str, to: &str) -> String {
        match self {
            Self::Moved => format!("Moved from {} to {}", from, to),
            Self::Changed => format!("Changed stage to {}", to),
        }
    }
}

/// Validated stage list for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRegistry {
    domain: Domain,
    stages: Vec<StageDef>,
    default_stage: String,
    wording: TransitionWording,
}

impl StageRegistry {
    pub fn new(
        domain: Domain,
        stages: Vec<StageDef>,
        default_stage: impl Into<String>,
        wording: TransitionWording,
    ) -> Result<Self, RegistryError> {
        let default_stage = default_stage.into();

        if stages.is_empty() {
            return Err(RegistryError::Empty(domain));
        }

        let mut seen = HashSet::new();
        for (index, stage) in stages.iter().enumerate() {
            if stage.id.trim().is_empty() {
                return Err(RegistryError::BlankStage { domain, index });
            }
            if stage.id == UNKNOWN_COLUMN {
                return Err(RegistryError::ReservedStage {
                    domain,
                    stage: stage.id.clone(),
                });
            }
            if !seen.insert(stage.id.as_str()) {
                return Err(RegistryError::DuplicateStage {
                    domain,
                    stage: stage.id.clone(),
                });
            }
        }

        if !seen.contains(default_stage.as_str()) {
            return Err(RegistryError::UnknownDefault {
                domain,
                stage: default_stage,
            });
        }

        Ok(Self {
            domain,
            stages,
            default_stage,
            wording,
        })
    }

    /// Built-in registry for a domain
    pub fn builtin(domain: Domain) -> Self {
        let (stages, default_stage, wording) = match domain {
            Domain::Ideas => (
                vec![
                    StageDef::new("Draft", "Draft"),
                    StageDef::new("Under Review", "Under Review"),
                    StageDef::new("Approved", "Approved"),
                    StageDef::new("Implemented", "Implemented"),
                    StageDef::new("Rejected", "Rejected"),
                ],
                "Draft",
                TransitionWording::Moved,
            ),
            Domain::Commissions => (
                vec![
                    StageDef::new("requested", "Requested"),
                    StageDef::new("accepted", "Accepted"),
                    StageDef::new("in_progress", "In Progress"),
                    StageDef::new("delivered", "Delivered"),
                    StageDef::new("completed", "Completed"),
                    StageDef::new("cancelled", "Cancelled"),
                ],
                "requested",
                TransitionWording::Changed,
            ),
            Domain::Tasks => (
                vec![
                    StageDef::new("in_queue", "In Queue"),
                    StageDef::new("in_progress", "In Progress"),
                    StageDef::new("blocked", "Blocked"),
                    StageDef::new("done", "Done"),
                ],
                "in_queue",
                TransitionWording::Moved,
            ),
        };

        Self {
            domain,
            stages,
            default_stage: default_stage.to_string(),
            wording,
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn stages(&self) -> &[StageDef] {
        &self.stages
    }

    /// Stage ids in column order
    pub fn stage_ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn is_valid_stage(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| s.id == stage)
    }

    pub fn stage(&self, stage: &str) -> Option<&StageDef> {
        self.stages.iter().find(|s| s.id == stage)
    }

    /// Column position of a stage
    pub fn position(&self, stage: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == stage)
    }

    pub fn default_stage(&self) -> &str {
        &self.default_stage
    }

    pub fn wording(&self) -> TransitionWording {
        self.wording
    }

    /// History text for a stage change
    pub fn describe_transition(&self, from: &str, to: &str) -> String {
        self.wording.describe(from, to)
    }
}

/// YAML shape of one domain entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainDef {
    pub domain: Domain,
    pub stages: Vec<StageDef>,
    /// Defaults to the first stage
    #[serde(default)]
    pub default_stage: Option<String>,
    #[serde(default)]
    pub wording: TransitionWording,
    #[serde(default)]
    pub sanitize: Option<SanitizeRules>,
}

/// YAML catalog file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDef {
    #[serde(default)]
    pub domains: Vec<DomainDef>,
}

/// Registries and sanitize rules for every domain
#[derive(Debug, Clone)]
pub struct RegistryCatalog {
    registries: BTreeMap<Domain, StageRegistry>,
    rules: BTreeMap<Domain, SanitizeRules>,
}

impl Default for RegistryCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RegistryCatalog {
    pub fn builtin() -> Self {
        let registries = Domain::ALL
            .iter()
            .map(|d| (*d, StageRegistry::builtin(*d)))
            .collect();
        let rules = Domain::ALL
            .iter()
            .map(|d| (*d, SanitizeRules::builtin(*d)))
            .collect();
        Self { registries, rules }
    }

    /// Built-ins with the domains named in `def` replaced
    pub fn from_def(def: &CatalogDef) -> Result<Self, RegistryError> {
        let mut catalog = Self::builtin();
        for entry in &def.domains {
            let default_stage = entry
                .default_stage
                .clone()
                .or_else(|| entry.stages.first().map(|s| s.id.clone()))
                .ok_or(RegistryError::Empty(entry.domain))?;
            let registry = StageRegistry::new(
                entry.domain,
                entry.stages.clone(),
                default_stage,
                entry.wording,
            )?;
            catalog.registries.insert(entry.domain, registry);
            if let Some(rules) = &entry.sanitize {
                catalog.rules.insert(entry.domain, rules.clone());
            }
        }
        Ok(catalog)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, RegistryError> {
        let def: CatalogDef = serde_yaml::from_str(content)?;
        Self::from_def(&def)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn registry(&self, domain: Domain) -> &StageRegistry {
        // Every domain is seeded by builtin() and never removed
        &self.registries[&domain]
    }

    pub fn sanitize_rules(&self, domain: Domain) -> &SanitizeRules {
        &self.rules[&domain]
    }

    pub fn stages_for(&self, domain: Domain) -> Vec<&str> {
        self.registry(domain).stage_ids()
    }

    pub fn is_valid_stage(&self, domain: Domain, stage: &str) -> bool {
        self.registry(domain).is_valid_stage(stage)
    }
}
