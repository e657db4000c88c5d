//! Collaborator seams.
//!
//! The validator talks to the outside world only through these traits, so
//! tests (and alternative deployments) swap implementations without touching
//! decision logic. Every call through them is wrapped in a timeout by the
//! caller and denies on expiry.

use async_trait::async_trait;

use crate::core::errors::WardenError;
use crate::core::events::AuditEvent;
use crate::core::models::{SessionId, UserContext};

/// Resolves a caller to an authenticated identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` means the user is unknown; errors mean the identity system
    /// itself failed and the request must be denied.
    async fn resolve(
        &self,
        user_id: &str,
        session_id: Option<&SessionId>,
    ) -> Result<Option<UserContext>, WardenError>;
}

/// Answers whether the underlying resource still exists and is deliverable.
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn exists(&self, resource_id: &str) -> Result<bool, WardenError>;
}

/// Receives audit events. Implementations must not block the caller
/// materially; remote transports should enqueue and flush on their own time.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}
