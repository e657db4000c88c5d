// Domain error types - every failure path is a named variant, no catch-all unwinding

use thiserror::Error;

/// Closed error taxonomy for the gating subsystem.
///
/// The validator is the trust boundary: it converts every variant into a
/// uniform denial before anything escapes to a caller, so no internal fault
/// can fail open.
#[derive(Error, Debug)]
pub enum WardenError {
    /// Bad caller input (HTTP 400 class). A programming mistake, not an attack.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Token expiry time is in the past.
    #[error("Token has expired")]
    ExpiredToken,

    /// Malformed token or bad signature.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Role/condition evaluation refused the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Request throttled; carries the wait hint in seconds.
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Token or user was explicitly revoked.
    #[error("Access revoked: {0}")]
    RevokedAccess(String),

    /// Unexpected collaborator fault (timeout, transport error, ...).
    #[error("Internal validation error: {0}")]
    Internal(String),
}

impl WardenError {
    /// Get user-friendly error message.
    ///
    /// Internal faults are mapped to neutral text so the message can be
    /// returned to an untrusted caller without information disclosure.
    pub fn user_message(&self) -> String {
        match self {
            WardenError::Validation(reason) => format!("Validation failed: {}", reason),
            WardenError::ExpiredToken => "Access link has expired".to_string(),
            WardenError::InvalidToken(_) => "Access link is not valid".to_string(),
            WardenError::PermissionDenied(reason) => format!("Permission denied: {}", reason),
            WardenError::RateLimitExceeded { retry_after_secs } => {
                format!("Too many requests, retry after {} seconds", retry_after_secs)
            }
            WardenError::RevokedAccess(_) => "Access has been revoked".to_string(),
            WardenError::Internal(_) => "Access could not be verified".to_string(),
        }
    }

    /// Wait hint for throttled requests, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            WardenError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}
