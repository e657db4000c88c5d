//! Warden: security gating for sensitive report delivery.
//!
//! This library decides, for every operation on a report resource, whether a
//! caller may proceed: role-based access control, multi-window rate limiting,
//! signed time-limited capability links, revocation and tamper-evident audit
//! logging. The [`AccessValidator`] is the single entry surface; everything
//! else is the machinery behind it.

pub mod config;
pub mod constants;
pub mod core;
pub mod utils;

pub use crate::config::Config;
pub use crate::core::access::AccessControl;
pub use crate::core::crypto::{LinkSigner, MintedLink};
pub use crate::core::errors::WardenError;
pub use crate::core::events::{AuditEvent, AuditEventKind, Severity};
pub use crate::core::models::{
    AccessRequest, AccessType, Condition, Operation, Permission, PermissionContext, RateLimitInfo,
    Role, SessionId, TokenPayload, UserContext, ValidationResult,
};
pub use crate::core::rate_limit::{LimitWindow, RateLimitConfig, RateLimitDecision, RateLimiter};
pub use crate::core::traits::{AuditSink, IdentityResolver, ResourceProbe};
pub use crate::core::validator::AccessValidator;
pub use crate::utils::audit_logger::{AuditLogger, ChannelSink, MemorySink, TracingSink};
pub use crate::utils::time::Clock;
