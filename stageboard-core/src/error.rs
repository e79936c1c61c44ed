//! Pipeline errors
//!
//! Gesture no-ops are not errors; they surface as [`crate::DragOutcome`]
//! values. Sanitization has no error path at all.

use crate::item::{Domain, ItemId};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Permission denied: {actor} cannot modify {item_id}")]
    PermissionDenied { actor: String, item_id: ItemId },

    #[error("Sign in required to {action}")]
    Unauthenticated { action: String },

    #[error("Session expired, sign in again: {0}")]
    AuthExpired(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Stage '{stage}' is not a stage of {domain}")]
    UnknownStage { domain: Domain, stage: String },

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),
}

impl PipelineError {
    /// Classify a storage failure. Messages mentioning "permission" or "403"
    /// mean the session needs re-authentication.
    pub fn from_storage(err: &anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        if is_authorization_message(&message) {
            Self::AuthExpired(message)
        } else {
            Self::Storage(message)
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }
}

pub(crate) fn is_authorization_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("permission") || message.contains("403")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_permission_message_is_auth_expired() {
        let err = anyhow!("Missing or insufficient permissions.");
        assert!(PipelineError::from_storage(&err).is_auth_expired());

        let err = anyhow!("request failed with status 403");
        assert!(PipelineError::from_storage(&err).is_auth_expired());
    }

    #[test]
    fn test_other_failures_are_storage_errors() {
        let err = anyhow!("connection reset by peer");
        let classified = PipelineError::from_storage(&err);
        assert!(matches!(classified, PipelineError::Storage(_)));
        assert!(!classified.is_auth_expired());
    }

    #[test]
    fn test_context_chain_is_inspected() {
        let err = anyhow!("PERMISSION_DENIED").context("update commissions/c-1");
        assert!(PipelineError::from_storage(&err).is_auth_expired());
    }
}
