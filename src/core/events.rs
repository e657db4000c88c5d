//! Security audit events.
//!
//! The internal event stream every gating decision is recorded on. Events are
//! immutable once built and carry enough context for forensic review without
//! a lookup into any other registry.

use crate::core::models::Operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of security event being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventKind {
    AccessGranted,
    AccessDenied,
    TokenGenerated,
    TokenRevoked,
    RateLimitExceeded,
    SecurityViolation,
    SessionCreated,
    SessionRevoked,
    InternalFault,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::AccessGranted => "access_granted",
            AuditEventKind::AccessDenied => "access_denied",
            AuditEventKind::TokenGenerated => "token_generated",
            AuditEventKind::TokenRevoked => "token_revoked",
            AuditEventKind::RateLimitExceeded => "rate_limit_exceeded",
            AuditEventKind::SecurityViolation => "security_violation",
            AuditEventKind::SessionCreated => "session_created",
            AuditEventKind::SessionRevoked => "session_revoked",
            AuditEventKind::InternalFault => "internal_fault",
        }
    }
}

/// Risk weight of an event. Grants and session creation are Low, ordinary
/// denials and revocations Medium, rate-limit violations High, and anything
/// that looks like an attack (revoked/malformed token use) Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub severity: Severity,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub additional_data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_matches_risk() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn event_serializes_without_empty_fields() {
        let event = AuditEvent {
            kind: AuditEventKind::AccessGranted,
            severity: Severity::Low,
            user_id: "u1".to_string(),
            resource_id: None,
            operation: None,
            timestamp: Utc::now(),
            ip: None,
            user_agent: None,
            session_id: None,
            success: true,
            error_message: None,
            additional_data: Value::Null,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("resource_id"));
        assert!(!json.contains("additional_data"));
    }
}
