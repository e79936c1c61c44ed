//! Identity collaborator
//!
//! Supplies the signed-in actor and sends the user back through login when a
//! storage call fails with an authorization-shaped error.

use async_trait::async_trait;

use crate::permission::Actor;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Not signed in")]
    NotSignedIn,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in actor
    async fn current_actor(&self) -> Result<Actor, AuthError>;

    /// Start re-authentication, returning to `return_url` afterwards
    async fn redirect_to_login(&self, return_url: &str);

    /// Signed-in actor, or an anonymous viewer when nobody is signed in
    async fn actor_or_anonymous(&self) -> Actor {
        self.current_actor().await.unwrap_or_else(|_| Actor::anonymous())
    }
}

/// Provider for headless use: fixed actor, redirects are only logged
pub struct StaticIdentity {
    actor: Option<Actor>,
}

impl StaticIdentity {
    pub fn signed_in(actor: Actor) -> Self {
        Self { actor: Some(actor) }
    }

    pub fn signed_out() -> Self {
        Self { actor: None }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_actor(&self) -> Result<Actor, AuthError> {
        self.actor.clone().ok_or(AuthError::NotSignedIn)
    }

    async fn redirect_to_login(&self, return_url: &str) {
        tracing::warn!(return_url, "Re-authentication requested");
    }
}
