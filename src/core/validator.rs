//! Access validation orchestration.
//!
//! `AccessValidator` is the single entry surface the report-delivery layer
//! calls. It composes the rate limiter, revocation registries, identity
//! resolution, RBAC evaluation and the resource probe into one fixed decision
//! order, short-circuiting and auditing at the first failure. It is the trust
//! boundary: every outcome, including an internal fault, leaves as a uniform
//! `ValidationResult` and nothing ever fails open.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::timeout;

use crate::config::Config;
use crate::core::access::AccessControl;
use crate::core::crypto::LinkSigner;
use crate::core::errors::WardenError;
use crate::core::models::{
    AccessRequest, AccessType, Operation, PermissionContext, ValidationResult,
};
use crate::core::rate_limit::{RateLimitDecision, RateLimiter};
use crate::core::traits::{AuditSink, IdentityResolver, ResourceProbe};
use crate::utils::audit_logger::AuditLogger;
use crate::utils::time::Clock;

pub struct AccessValidator {
    access: Arc<AccessControl>,
    limiter: Arc<RateLimiter>,
    signer: Arc<LinkSigner>,
    audit: AuditLogger,
    identity: Arc<dyn IdentityResolver>,
    resources: Arc<dyn ResourceProbe>,
    /// Validator-local revocation store; `is_access_revoked` is the OR of
    /// this and the access-control registry.
    revoked: RwLock<HashMap<String, i64>>,
    collaborator_timeout: Duration,
    clock: Clock,
}

impl AccessValidator {
    pub fn new(
        config: &Config,
        identity: Arc<dyn IdentityResolver>,
        resources: Arc<dyn ResourceProbe>,
        sink: Arc<dyn AuditSink>,
    ) -> Result<Self, WardenError> {
        Self::with_clock(config, identity, resources, sink, Clock::system())
    }

    /// Like [`AccessValidator::new`] with an injected clock. Tests pin the
    /// clock to exercise expiry without sleeping.
    pub fn with_clock(
        config: &Config,
        identity: Arc<dyn IdentityResolver>,
        resources: Arc<dyn ResourceProbe>,
        sink: Arc<dyn AuditSink>,
        clock: Clock,
    ) -> Result<Self, WardenError> {
        let audit = AuditLogger::new(sink, clock.clone());
        let signer = Arc::new(LinkSigner::from_config(config, clock.clone())?);
        let access = Arc::new(AccessControl::new(
            clock.clone(),
            audit.clone(),
            config.session_idle_ttl_secs,
        ));
        let limiter = Arc::new(RateLimiter::new(config.rate_limits.clone(), clock.clone()));
        Ok(Self {
            access,
            limiter,
            signer,
            audit,
            identity,
            resources,
            revoked: RwLock::new(HashMap::new()),
            collaborator_timeout: Duration::from_millis(config.collaborator_timeout_ms),
            clock,
        })
    }

    /// Session and revocation management surface for the delivery layer.
    pub fn access_control(&self) -> &AccessControl {
        &self.access
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn signer(&self) -> &LinkSigner {
        &self.signer
    }

    /// Decide one access attempt. Order: rate limit, revocation, token
    /// integrity, identity, RBAC, resource probe; the first refusal wins and
    /// is audited at a severity matched to its risk.
    pub async fn validate_access_request(&self, request: &AccessRequest) -> ValidationResult {
        // 1. Rate limit before any other work: throttled callers learn
        // nothing about the resource.
        let remaining = match self.limiter.check_rate_limit(
            &request.user_id,
            request.operation,
            request.ip.as_deref(),
        ) {
            RateLimitDecision::Denied {
                retry_after_secs, ..
            } => {
                self.audit.log_rate_limit_exceeded(
                    &request.user_id,
                    request.operation,
                    retry_after_secs,
                );
                return ValidationResult::denied(&WardenError::RateLimitExceeded {
                    retry_after_secs,
                });
            }
            RateLimitDecision::Allowed { remaining } => remaining,
        };

        // 2. Revocation dominates everything else, including a token whose
        // signature and expiry are still individually valid.
        if self.access.is_user_revoked(&request.user_id) {
            self.audit
                .log_security_violation(&request.user_id, "request from revoked user");
            return ValidationResult::denied(&WardenError::RevokedAccess(
                "user access has been revoked".to_string(),
            ));
        }
        if let Some(token) = &request.token {
            if self.is_access_revoked(token) {
                self.audit
                    .log_security_violation(&request.user_id, "attempted use of revoked token");
                return ValidationResult::denied(&WardenError::RevokedAccess(
                    "token has been revoked".to_string(),
                ));
            }
            match self.signer.validate(token) {
                Ok(payload) if payload.user_id != request.user_id => {
                    self.audit.log_security_violation(
                        &request.user_id,
                        "token presented by a different user than it was minted for",
                    );
                    return ValidationResult::denied(&WardenError::InvalidToken(
                        "token user mismatch".to_string(),
                    ));
                }
                Ok(_) => {}
                Err(WardenError::ExpiredToken) => {
                    self.audit.log_access_denied(
                        &request.user_id,
                        &request.resource_id,
                        Some(request.operation),
                        "token expired",
                    );
                    return ValidationResult::denied(&WardenError::ExpiredToken);
                }
                Err(err @ WardenError::InvalidToken(_)) => {
                    self.audit
                        .log_security_violation(&request.user_id, "malformed or forged token");
                    return ValidationResult::denied(&err);
                }
                Err(err) => {
                    self.audit
                        .log_internal_fault(&request.user_id, "token validation fault");
                    return ValidationResult::denied(&WardenError::Internal(err.to_string()));
                }
            }
        }

        // 3. Identity resolution, fail closed on timeout or fault.
        let ctx = match timeout(
            self.collaborator_timeout,
            self.identity
                .resolve(&request.user_id, request.session_id.as_ref()),
        )
        .await
        {
            Err(_elapsed) => {
                self.audit
                    .log_internal_fault(&request.user_id, "identity resolution timed out");
                return ValidationResult::denied(&WardenError::Internal(
                    "identity resolution timed out".to_string(),
                ));
            }
            Ok(Err(err)) => {
                self.audit
                    .log_internal_fault(&request.user_id, "identity resolution failed");
                return ValidationResult::denied(&WardenError::Internal(err.to_string()));
            }
            Ok(Ok(None)) => {
                self.audit.log_access_denied(
                    &request.user_id,
                    &request.resource_id,
                    Some(request.operation),
                    "unknown identity",
                );
                return ValidationResult::denied(&WardenError::Internal(
                    "could not resolve caller identity".to_string(),
                ));
            }
            Ok(Ok(Some(ctx))) => ctx,
        };

        // 4. RBAC.
        let share_context = request
            .current_shares
            .map(|current_shares| PermissionContext { current_shares });
        if !self.access.check_permission(
            &ctx,
            request.operation,
            &request.resource_id,
            request.resource_owner_id.as_deref(),
            share_context.as_ref(),
        ) {
            self.audit.log_access_denied(
                &request.user_id,
                &request.resource_id,
                Some(request.operation),
                "permission denied",
            );
            return ValidationResult::denied(&WardenError::PermissionDenied(format!(
                "{} is not permitted for this caller",
                request.operation
            )));
        }

        // 5. Resource probe, fail closed on timeout or fault.
        match timeout(
            self.collaborator_timeout,
            self.resources.exists(&request.resource_id),
        )
        .await
        {
            Err(_elapsed) => {
                self.audit
                    .log_internal_fault(&request.user_id, "resource check timed out");
                return ValidationResult::denied(&WardenError::Internal(
                    "resource check timed out".to_string(),
                ));
            }
            Ok(Err(err)) => {
                self.audit
                    .log_internal_fault(&request.user_id, "resource check failed");
                return ValidationResult::denied(&WardenError::Internal(err.to_string()));
            }
            Ok(Ok(false)) => {
                self.audit.log_access_denied(
                    &request.user_id,
                    &request.resource_id,
                    Some(request.operation),
                    "resource unavailable or expired",
                );
                return ValidationResult::denied(&WardenError::PermissionDenied(
                    "resource unavailable or expired".to_string(),
                ));
            }
            Ok(Ok(true)) => {}
        }

        // 6. Grant.
        self.audit
            .log_access_granted(&ctx, &request.resource_id, request.operation);
        ValidationResult::granted(ctx, remaining)
    }

    /// Mint a signed delivery URL after running the same gate as a normal
    /// request for `Operation::Generate`. Caller-input errors (a lifetime
    /// beyond the cap) surface directly; they are programming mistakes, not
    /// security denials.
    #[allow(clippy::too_many_arguments)]
    pub async fn generate_secure_url(
        &self,
        user_id: &str,
        resource_id: &str,
        access_type: AccessType,
        base_url: &str,
        expiry_hours: u32,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<String, WardenError> {
        let lifetime_secs = i64::from(expiry_hours) * 3_600;

        match self
            .limiter
            .check_rate_limit(user_id, Operation::Generate, ip)
        {
            RateLimitDecision::Denied {
                retry_after_secs, ..
            } => {
                self.audit
                    .log_rate_limit_exceeded(user_id, Operation::Generate, retry_after_secs);
                return Err(WardenError::RateLimitExceeded { retry_after_secs });
            }
            RateLimitDecision::Allowed { .. } => {}
        }

        if self.access.is_user_revoked(user_id) {
            self.audit
                .log_security_violation(user_id, "link generation by revoked user");
            return Err(WardenError::RevokedAccess(
                "user access has been revoked".to_string(),
            ));
        }

        let mut ctx = match timeout(
            self.collaborator_timeout,
            self.identity.resolve(user_id, None),
        )
        .await
        {
            Err(_elapsed) => {
                self.audit
                    .log_internal_fault(user_id, "identity resolution timed out");
                return Err(WardenError::Internal(
                    "identity resolution timed out".to_string(),
                ));
            }
            Ok(Err(err)) => {
                self.audit
                    .log_internal_fault(user_id, "identity resolution failed");
                return Err(WardenError::Internal(err.to_string()));
            }
            Ok(Ok(None)) => {
                self.audit.log_access_denied(
                    user_id,
                    resource_id,
                    Some(Operation::Generate),
                    "unknown identity",
                );
                return Err(WardenError::Internal(
                    "could not resolve caller identity".to_string(),
                ));
            }
            Ok(Ok(Some(ctx))) => ctx,
        };
        if let Some(ip) = ip {
            ctx.ip = Some(ip.to_string());
        }
        if let Some(user_agent) = user_agent {
            ctx.user_agent = Some(user_agent.to_string());
        }

        if !self
            .access
            .check_permission(&ctx, Operation::Generate, resource_id, None, None)
        {
            self.audit.log_access_denied(
                user_id,
                resource_id,
                Some(Operation::Generate),
                "permission denied",
            );
            return Err(WardenError::PermissionDenied(
                "link generation is not permitted for this caller".to_string(),
            ));
        }

        let link = self.signer.mint_with_lifetime(
            resource_id,
            user_id,
            None,
            base_url,
            lifetime_secs,
            access_type,
            BTreeMap::new(),
        )?;
        self.audit
            .log_token_generated(user_id, resource_id, access_type, link.expires_at);
        Ok(link.url)
    }

    /// Revoke a token in both the validator-local store and the
    /// access-control registry. Returns whether the token was newly revoked.
    pub fn revoke_access(&self, token: &str, reason: &str, revoked_by: Option<&str>) -> bool {
        let now = self.clock.now_unix();
        let newly = self
            .revoked
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token.to_string(), now)
            .is_none();
        self.access.revoke_token(token);
        self.audit.log_token_revoked(revoked_by, reason);
        newly
    }

    pub fn is_access_revoked(&self, token: &str) -> bool {
        self.revoked
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(token)
            || self.access.is_token_revoked(token)
    }

    /// Sweep revocation entries past the retention window in both stores,
    /// bounding memory over long uptimes.
    pub fn cleanup_expired_revocations(&self, days_to_keep: u32) -> usize {
        let cutoff = self.clock.now_unix() - i64::from(days_to_keep) * 86_400;
        let mut removed = {
            let mut revoked = self
                .revoked
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let before = revoked.len();
            revoked.retain(|_, revoked_at| *revoked_at > cutoff);
            before - revoked.len()
        };
        removed += self.access.cleanup_expired_revocations(days_to_keep);
        removed
    }

    pub fn get_access_stats(&self, user_id: &str) -> serde_json::Value {
        serde_json::json!({
            "rate_limiting": self.limiter.get_user_stats(user_id),
            "access_control": self.access.stats(),
        })
    }
}
