//! Structured audit logging.
//!
//! Every gating decision passes through one of the canonical constructors
//! below, which pin the event kind to its severity and hand the finished
//! event to an [`AuditSink`]. The bundled sinks: `TracingSink` emits
//! `target: "audit"` events at the severity-matched level, `MemorySink` keeps
//! a bounded ring for tests and the stats surface, and `ChannelSink` feeds a
//! queue so a remote transport can drain without ever blocking a request.

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

use crate::constants::AUDIT_TARGET;
use crate::core::events::{AuditEvent, AuditEventKind, Severity};
use crate::core::models::{AccessType, Operation, SessionId, UserContext};
use crate::core::traits::AuditSink;
use crate::utils::time::Clock;

#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    clock: Clock,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>, clock: Clock) -> Self {
        Self { sink, clock }
    }

    fn base(&self, kind: AuditEventKind, severity: Severity, user_id: &str) -> AuditEvent {
        AuditEvent {
            kind,
            severity,
            user_id: user_id.to_string(),
            resource_id: None,
            operation: None,
            timestamp: self.clock.now(),
            ip: None,
            user_agent: None,
            session_id: None,
            success: false,
            error_message: None,
            additional_data: Value::Null,
        }
    }

    pub fn log_access_granted(&self, ctx: &UserContext, resource_id: &str, operation: Operation) {
        let mut event = self.base(AuditEventKind::AccessGranted, Severity::Low, &ctx.user_id);
        event.resource_id = Some(resource_id.to_string());
        event.operation = Some(operation);
        event.ip = ctx.ip.clone();
        event.user_agent = ctx.user_agent.clone();
        event.session_id = ctx.session_id.map(|s| s.to_string());
        event.success = true;
        self.sink.record(&event);
    }

    pub fn log_access_denied(
        &self,
        user_id: &str,
        resource_id: &str,
        operation: Option<Operation>,
        reason: &str,
    ) {
        let mut event = self.base(AuditEventKind::AccessDenied, Severity::Medium, user_id);
        event.resource_id = Some(resource_id.to_string());
        event.operation = operation;
        event.error_message = Some(reason.to_string());
        self.sink.record(&event);
    }

    pub fn log_token_generated(
        &self,
        user_id: &str,
        resource_id: &str,
        access_type: AccessType,
        expires_at: i64,
    ) {
        let mut event = self.base(AuditEventKind::TokenGenerated, Severity::Low, user_id);
        event.resource_id = Some(resource_id.to_string());
        event.operation = Some(Operation::Generate);
        event.success = true;
        event.additional_data = json!({
            "access_type": access_type.as_str(),
            "expires_at": expires_at,
        });
        self.sink.record(&event);
    }

    pub fn log_token_revoked(&self, revoked_by: Option<&str>, reason: &str) {
        let mut event = self.base(
            AuditEventKind::TokenRevoked,
            Severity::Medium,
            revoked_by.unwrap_or("system"),
        );
        event.operation = Some(Operation::RevokeAccess);
        event.success = true;
        event.additional_data = json!({ "reason": reason });
        self.sink.record(&event);
    }

    pub fn log_rate_limit_exceeded(
        &self,
        user_id: &str,
        operation: Operation,
        retry_after_secs: u64,
    ) {
        let mut event = self.base(AuditEventKind::RateLimitExceeded, Severity::High, user_id);
        event.operation = Some(operation);
        event.error_message = Some("rate limit exceeded".to_string());
        event.additional_data = json!({ "retry_after_secs": retry_after_secs });
        self.sink.record(&event);
    }

    /// Possible attack traffic: revoked or malformed credentials in play.
    pub fn log_security_violation(&self, user_id: &str, detail: &str) {
        let mut event = self.base(AuditEventKind::SecurityViolation, Severity::Critical, user_id);
        event.error_message = Some(detail.to_string());
        self.sink.record(&event);
    }

    pub fn log_session_created(&self, ctx: &UserContext, session_id: &SessionId) {
        let mut event = self.base(AuditEventKind::SessionCreated, Severity::Low, &ctx.user_id);
        event.session_id = Some(session_id.to_string());
        event.ip = ctx.ip.clone();
        event.user_agent = ctx.user_agent.clone();
        event.success = true;
        self.sink.record(&event);
    }

    pub fn log_session_revoked(&self, session_id: &SessionId) {
        let mut event = self.base(AuditEventKind::SessionRevoked, Severity::Medium, "system");
        event.session_id = Some(session_id.to_string());
        event.success = true;
        self.sink.record(&event);
    }

    /// Collaborator faults. High rather than Critical: the system failed
    /// closed, but somebody should look at why.
    pub fn log_internal_fault(&self, user_id: &str, detail: &str) {
        let mut event = self.base(AuditEventKind::InternalFault, Severity::High, user_id);
        event.error_message = Some(detail.to_string());
        self.sink.record(&event);
    }
}

/// Emits audit events as structured `tracing` records under
/// `target: "audit"`, at the level matching the event severity.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, event: &AuditEvent) {
        let details = serde_json::to_string(event).unwrap_or_default();
        match event.severity {
            Severity::Low => info!(
                target: AUDIT_TARGET,
                event_type = event.kind.as_str(),
                severity = event.severity.as_str(),
                user_id = %event.user_id,
                success = event.success,
                details = %details,
            ),
            Severity::Medium => warn!(
                target: AUDIT_TARGET,
                event_type = event.kind.as_str(),
                severity = event.severity.as_str(),
                user_id = %event.user_id,
                success = event.success,
                details = %details,
            ),
            Severity::High | Severity::Critical => error!(
                target: AUDIT_TARGET,
                event_type = event.kind.as_str(),
                severity = event.severity.as_str(),
                user_id = %event.user_id,
                success = event.success,
                details = %details,
            ),
        }
    }
}

/// Bounded in-memory ring of recent events.
pub struct MemorySink {
    events: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// The most recent `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<AuditEvent> {
        let events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.iter().rev().take(n).rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemorySink {
    fn record(&self, event: &AuditEvent) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

/// Hands events to an unbounded queue. The send never waits, so a slow or
/// absent consumer cannot stall a request; wire the receiver to whatever
/// transport ships events off-process.
pub struct ChannelSink {
    tx: UnboundedSender<AuditEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<AuditEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelSink {
    fn record(&self, event: &AuditEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.tx.send(event.clone());
    }
}
