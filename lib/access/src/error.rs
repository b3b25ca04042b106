//! Error types for the access crate.
//!
//! These errors are per-request outcomes. None of them is fatal to the
//! gateway process; the server renders them at its error boundary.

use std::fmt;

/// Errors from identity and session checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The authenticated email is not accepted by the trust policy.
    UntrustedIdentity { email: String },
    /// The session cookie could not be decrypted or decoded.
    ///
    /// Callers treat this exactly like a missing session.
    MalformedSession { reason: String },
}

impl AccessError {
    /// Returns true if this error should be shown to the user.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::UntrustedIdentity { .. })
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UntrustedIdentity { email } => {
                write!(f, "untrusted email: {email}")
            }
            Self::MalformedSession { reason } => {
                write!(f, "malformed session: {reason}")
            }
        }
    }
}

impl std::error::Error for AccessError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrusted_identity_display() {
        let err = AccessError::UntrustedIdentity {
            email: "mallory@example.org".to_string(),
        };
        assert!(err.to_string().contains("untrusted email"));
        assert!(err.to_string().contains("mallory@example.org"));
        assert!(err.is_user_facing());
    }

    #[test]
    fn malformed_session_display() {
        let err = AccessError::MalformedSession {
            reason: "bad signature".to_string(),
        };
        assert!(err.to_string().contains("malformed session"));
        assert!(err.to_string().contains("bad signature"));
        assert!(!err.is_user_facing());
    }
}
