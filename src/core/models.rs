//! Domain models for the gating subsystem.
//!
//! Pure data structures: roles, operations, permission conditions, request
//! and result shapes, and the capability-token payload. No I/O side effects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Newtype wrapper around Uuid for type-safe session identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Generate a new random SessionId
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SessionId)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0.to_string()
    }
}

impl TryFrom<String> for SessionId {
    type Error = uuid::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Uuid::parse_str(&s).map(SessionId)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller roles. Closed set; the permission table is exhaustive over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Customer,
    Support,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
            Role::Support => "support",
            Role::Viewer => "viewer",
        }
    }
}

/// Operations a caller can attempt on a report resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Generate,
    View,
    Download,
    Delete,
    Share,
    RevokeAccess,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Generate,
        Operation::View,
        Operation::Download,
        Operation::Delete,
        Operation::Share,
        Operation::RevokeAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Generate => "generate",
            Operation::View => "view",
            Operation::Download => "download",
            Operation::Delete => "delete",
            Operation::Share => "share",
            Operation::RevokeAccess => "revoke_access",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a minted capability link authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    View,
    Download,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::View => "view",
            AccessType::Download => "download",
        }
    }
}

/// Condition attached to a permission entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Caller must own the resource.
    OwnerOnly,
    /// Resource may not already be shared with `n` or more parties.
    MaxShares(u32),
    /// Informational marker; non-view operations are simply absent from the
    /// permission entry, so nothing extra is enforced here.
    ReadOnly,
}

/// A permitted operation with its condition set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub operation: Operation,
    pub conditions: Vec<Condition>,
}

impl Permission {
    pub fn unconditional(operation: Operation) -> Self {
        Self {
            operation,
            conditions: Vec::new(),
        }
    }

    pub fn with_conditions(operation: Operation, conditions: Vec<Condition>) -> Self {
        Self {
            operation,
            conditions,
        }
    }
}

/// Ephemeral per-request caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            session_id: None,
            ip: None,
            user_agent: None,
        }
    }
}

/// Side context consulted by conditional permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionContext {
    pub current_shares: u32,
}

/// An access attempt presented to the validator.
///
/// `resource_owner_id` and `current_shares` are caller-supplied facts about
/// the resource; the delivery layer knows them at call time, and passing them
/// here keeps the decision order fixed (permissions are evaluated before the
/// resource probe runs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub user_id: String,
    pub resource_id: String,
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_shares: Option<u32>,
}

impl AccessRequest {
    pub fn new(
        user_id: impl Into<String>,
        resource_id: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            resource_id: resource_id.into(),
            operation,
            ip: None,
            user_agent: None,
            session_id: None,
            token: None,
            resource_owner_id: None,
            current_shares: None,
        }
    }
}

/// Rate-limit information attached to a validation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Uniform outcome of `validate_access_request`: every failure, including an
/// internal fault, becomes `valid = false` with a caller-safe message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_context: Option<UserContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_info: Option<RateLimitInfo>,
}

impl ValidationResult {
    pub fn granted(user_context: UserContext, remaining: u64) -> Self {
        Self {
            valid: true,
            error_message: None,
            user_context: Some(user_context),
            rate_limit_info: Some(RateLimitInfo {
                remaining: Some(remaining),
                retry_after_secs: None,
            }),
        }
    }

    pub fn denied(error: &crate::core::errors::WardenError) -> Self {
        Self {
            valid: false,
            error_message: Some(error.user_message()),
            user_context: None,
            rate_limit_info: error.retry_after().map(|secs| RateLimitInfo {
                remaining: None,
                retry_after_secs: Some(secs),
            }),
        }
    }
}

/// Signed capability-token payload.
///
/// `exp` mirrors `expires_at` on the wire for parity with the original link
/// format; `expires_at` is authoritative at validation and a mismatch between
/// the two is rejected as tampering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub report_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_id: Option<String>,
    pub expires_at: i64,
    pub access_type: AccessType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    pub exp: i64,
}
