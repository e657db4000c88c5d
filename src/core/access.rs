//! RBAC permission evaluation, session and revocation registries.
//!
//! The role→permission table is fixed at construction and exhaustive over the
//! closed `Role` enum. Each registry sits behind its own lock, so session
//! churn never serializes against revocation checks and unrelated users never
//! wait on one another.

use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

use crate::core::models::{
    Condition, Operation, Permission, PermissionContext, Role, SessionId, UserContext,
};
use crate::utils::audit_logger::AuditLogger;
use crate::utils::time::Clock;

#[derive(Debug, Clone)]
struct SessionEntry {
    context: UserContext,
    last_seen: i64,
}

/// Role-based access control with in-memory session and revocation state.
pub struct AccessControl {
    table: HashMap<Role, Vec<Permission>>,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    revoked_tokens: RwLock<HashMap<String, i64>>,
    revoked_users: RwLock<HashMap<String, i64>>,
    clock: Clock,
    audit: AuditLogger,
    session_idle_ttl_secs: i64,
}

impl AccessControl {
    pub fn new(clock: Clock, audit: AuditLogger, session_idle_ttl_secs: i64) -> Self {
        Self {
            table: Self::role_table(),
            sessions: RwLock::new(HashMap::new()),
            revoked_tokens: RwLock::new(HashMap::new()),
            revoked_users: RwLock::new(HashMap::new()),
            clock,
            audit,
            session_idle_ttl_secs,
        }
    }

    /// The fixed permission table. Admin holds every operation
    /// unconditionally; Customer is owner-scoped; Support can assist without
    /// ownership but shares sparingly; Viewer is read-only.
    fn role_table() -> HashMap<Role, Vec<Permission>> {
        let mut table = HashMap::new();
        table.insert(
            Role::Admin,
            Operation::ALL
                .into_iter()
                .map(Permission::unconditional)
                .collect(),
        );
        table.insert(
            Role::Customer,
            vec![
                Permission::with_conditions(Operation::View, vec![Condition::OwnerOnly]),
                Permission::with_conditions(Operation::Download, vec![Condition::OwnerOnly]),
                Permission::with_conditions(
                    Operation::Share,
                    vec![Condition::OwnerOnly, Condition::MaxShares(5)],
                ),
            ],
        );
        table.insert(
            Role::Support,
            vec![
                Permission::unconditional(Operation::View),
                Permission::unconditional(Operation::Download),
                Permission::with_conditions(Operation::Share, vec![Condition::MaxShares(3)]),
            ],
        );
        table.insert(
            Role::Viewer,
            vec![Permission::with_conditions(
                Operation::View,
                vec![Condition::ReadOnly],
            )],
        );
        table
    }

    /// Evaluate whether `ctx` may perform `operation`.
    ///
    /// Order: session validity (when a session is claimed), then role table
    /// membership, then every condition on the matched entry. Emits no audit
    /// events itself; the caller records the outcome. Revocation is likewise
    /// the caller's responsibility, checked before this is invoked.
    pub fn check_permission(
        &self,
        ctx: &UserContext,
        operation: Operation,
        resource_id: &str,
        resource_owner_id: Option<&str>,
        extra: Option<&PermissionContext>,
    ) -> bool {
        if let Some(session_id) = &ctx.session_id {
            if !self.validate_session(session_id, &ctx.user_id) {
                trace!(
                    user_id = %ctx.user_id,
                    resource_id,
                    "permission refused: stale or foreign session"
                );
                return false;
            }
        }

        let permission = match self
            .table
            .get(&ctx.role)
            .and_then(|perms| perms.iter().find(|p| p.operation == operation))
        {
            Some(p) => p,
            None => {
                trace!(
                    user_id = %ctx.user_id,
                    role = ctx.role.as_str(),
                    operation = operation.as_str(),
                    resource_id,
                    "permission refused: operation not in role table"
                );
                return false;
            }
        };

        permission.conditions.iter().all(|condition| match condition {
            Condition::OwnerOnly => resource_owner_id == Some(ctx.user_id.as_str()),
            // Fail closed when share counts were not supplied.
            Condition::MaxShares(limit) => {
                extra.is_some_and(|e| e.current_shares < *limit)
            }
            Condition::ReadOnly => true,
        })
    }

    // --- sessions ---

    pub fn create_session(&self, ctx: &UserContext) -> SessionId {
        let session_id = SessionId::generate();
        let entry = SessionEntry {
            context: ctx.clone(),
            last_seen: self.clock.now_unix(),
        };
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(session_id, entry);
        self.audit.log_session_created(ctx, &session_id);
        session_id
    }

    /// A session is valid only for the user it was created for and only while
    /// it has been seen within the idle TTL. Validation refreshes `last_seen`.
    pub fn validate_session(&self, session_id: &SessionId, user_id: &str) -> bool {
        let now = self.clock.now_unix();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match sessions.get_mut(session_id) {
            Some(entry)
                if entry.context.user_id == user_id
                    && now - entry.last_seen <= self.session_idle_ttl_secs =>
            {
                entry.last_seen = now;
                true
            }
            _ => false,
        }
    }

    pub fn revoke_session(&self, session_id: &SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session_id)
            .is_some();
        if removed {
            self.audit.log_session_revoked(session_id);
        }
        removed
    }

    /// Drop sessions idle past the TTL; returns how many were removed.
    pub fn cleanup_expired_sessions(&self) -> usize {
        let now = self.clock.now_unix();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = sessions.len();
        sessions.retain(|_, entry| now - entry.last_seen <= self.session_idle_ttl_secs);
        before - sessions.len()
    }

    // --- revocations ---

    pub fn revoke_token(&self, token: &str) -> bool {
        let now = self.clock.now_unix();
        self.revoked_tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token.to_string(), now)
            .is_none()
    }

    pub fn is_token_revoked(&self, token: &str) -> bool {
        self.revoked_tokens
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(token)
    }

    pub fn revoke_user(&self, user_id: &str) -> bool {
        let now = self.clock.now_unix();
        self.revoked_users
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user_id.to_string(), now)
            .is_none()
    }

    pub fn is_user_revoked(&self, user_id: &str) -> bool {
        self.revoked_users
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(user_id)
    }

    /// Sweep revocation entries older than the retention window. Entries are
    /// only dropped once any token they could refer to has long expired.
    pub fn cleanup_expired_revocations(&self, days_to_keep: u32) -> usize {
        let cutoff = self.clock.now_unix() - i64::from(days_to_keep) * 86_400;
        let mut removed = 0;
        {
            let mut tokens = self
                .revoked_tokens
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let before = tokens.len();
            tokens.retain(|_, revoked_at| *revoked_at > cutoff);
            removed += before - tokens.len();
        }
        {
            let mut users = self
                .revoked_users
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let before = users.len();
            users.retain(|_, revoked_at| *revoked_at > cutoff);
            removed += before - users.len();
        }
        removed
    }

    pub fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "active_sessions": self
                .sessions
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len(),
            "revoked_tokens": self
                .revoked_tokens
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len(),
            "revoked_users": self
                .revoked_users
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len(),
        })
    }
}
