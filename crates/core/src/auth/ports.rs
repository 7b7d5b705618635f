//! Port interface for the auth collaborator

use async_trait::async_trait;
use jiffy_domain::Identity;

/// Supplies the identity attached to deliveries
///
/// Implementations own credential storage; callers only read.
#[async_trait]
pub trait AuthContext: Send + Sync {
    /// Current identity, or `None` when signed out.
    async fn current_identity(&self) -> Option<Identity>;

    /// Called by delivery when the endpoint rejects the identity.
    async fn on_auth_failure(&self);
}
