//! Stageboard Core
//!
//! Stage pipeline engine shared by the Ideas, Commissions and Tasks boards.
//!
//! A board is an ordered set of stage columns. Every mutation flows through the
//! [`PipelineController`]:
//!
//! ```text
//! drag gesture ─► drag::interpret ─► PipelineController
//!                                        ├─ permission::can_mutate
//!                                        ├─ registry (stage membership)
//!                                        ├─ history::record_event
//!                                        ├─ sanitize::Sanitizer
//!                                        └─ store::RecordStore ─► reconcile view
//! ```

pub mod board;
pub mod config;
pub mod controller;
pub mod drag;
pub mod error;
pub mod history;
pub mod identity;
pub mod item;
pub mod permission;
pub mod registry;
pub mod sanitize;
pub mod store;

pub use board::{Board, Column, UNKNOWN_COLUMN};
pub use config::{ConfigError, PipelineConfig};
pub use controller::PipelineController;
pub use drag::{interpret, DragGesture, DragOutcome, DropTarget, NoOpReason, StageTransition};
pub use error::PipelineError;
pub use history::{append_event, record_event, HistoryEvent, StageChange};
pub use identity::{AuthError, IdentityProvider, StaticIdentity};
pub use item::{Domain, ItemId, NewItem, PipelineItem, Record};
pub use permission::{can_mutate, Actor, Role};
pub use registry::{
    CatalogDef, DomainDef, RegistryCatalog, RegistryError, StageDef, StageRegistry,
    TransitionWording,
};
pub use sanitize::{SanitizeRules, Sanitizer};
pub use store::{MemoryRecordStore, RecordStore};
