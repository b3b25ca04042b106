//! Trust policy deciding which authenticated identities may reach the backend.
//!
//! An identity is trusted when its email ends with the configured domain
//! suffix or appears verbatim in the allowlist. Both checks are
//! case-sensitive, and a policy with neither configured trusts nobody.

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::AccessError;

/// Allow/deny policy over authenticated email addresses.
///
/// The policy is built once at startup and only read afterwards, so it can
/// be shared between concurrent requests without synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrustPolicy {
    /// Suffix every trusted address must end with, including the `@`
    /// (e.g. `@example.com`).
    #[serde(default, rename = "trusted_domain")]
    domain_suffix: Option<String>,
    /// Addresses trusted regardless of domain.
    #[serde(default, rename = "trusted_emails")]
    allowed_emails: HashSet<String>,
}

impl TrustPolicy {
    /// Creates a policy from a domain suffix and an allowlist.
    ///
    /// An empty suffix is treated the same as no suffix.
    #[must_use]
    pub fn new(
        domain_suffix: Option<String>,
        allowed_emails: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            domain_suffix: domain_suffix.filter(|suffix| !suffix.is_empty()),
            allowed_emails: allowed_emails.into_iter().collect(),
        }
    }

    /// Creates a policy that trusts nobody.
    #[must_use]
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Returns the configured domain suffix, if any.
    #[must_use]
    pub fn domain_suffix(&self) -> Option<&str> {
        self.domain_suffix.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns the explicitly allowed addresses.
    #[must_use]
    pub fn allowed_emails(&self) -> &HashSet<String> {
        &self.allowed_emails
    }

    /// Returns true if neither a suffix nor any allowed address is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domain_suffix().is_none() && self.allowed_emails.is_empty()
    }

    /// Returns true if `email` may be forwarded to the backend.
    #[must_use]
    pub fn is_trusted(&self, email: &str) -> bool {
        if email.is_empty() {
            return false;
        }

        if let Some(suffix) = self.domain_suffix() {
            if email.ends_with(suffix) {
                return true;
            }
        }

        self.allowed_emails.contains(email)
    }

    /// Checks `email` against the policy.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::UntrustedIdentity`] if the address is not trusted.
    pub fn authorize(&self, email: &str) -> Result<(), AccessError> {
        if self.is_trusted(email) {
            Ok(())
        } else {
            tracing::info!(email, "rejected untrusted email");
            Err(AccessError::UntrustedIdentity {
                email: email.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corp_policy() -> TrustPolicy {
        TrustPolicy::new(Some("@corp.com".to_string()), ["a@x.com".to_string()])
    }

    #[test]
    fn suffix_match_is_trusted() {
        assert!(corp_policy().is_trusted("bob@corp.com"));
    }

    #[test]
    fn allowlisted_address_is_trusted() {
        assert!(corp_policy().is_trusted("a@x.com"));
    }

    #[test]
    fn other_address_is_untrusted() {
        assert!(!corp_policy().is_trusted("bob@x.com"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let policy = corp_policy();
        assert!(!policy.is_trusted("bob@CORP.COM"));
        assert!(!policy.is_trusted("A@x.com"));
    }

    #[test]
    fn suffix_is_literal() {
        // Without the `@` any address ending in the text matches.
        let policy = TrustPolicy::new(Some("corp.com".to_string()), []);
        assert!(policy.is_trusted("bob@evilcorp.com"));

        let policy = TrustPolicy::new(Some("@corp.com".to_string()), []);
        assert!(!policy.is_trusted("bob@evilcorp.com"));
    }

    #[test]
    fn empty_email_is_never_trusted() {
        assert!(!corp_policy().is_trusted(""));
        let policy = TrustPolicy::new(Some(String::new()), [String::new()]);
        assert!(!policy.is_trusted(""));
    }

    #[test]
    fn empty_policy_trusts_nothing() {
        let policy = TrustPolicy::deny_all();
        assert!(policy.is_empty());
        assert!(!policy.is_trusted("bob@corp.com"));

        let policy = TrustPolicy::new(Some(String::new()), []);
        assert!(policy.is_empty());
        assert!(!policy.is_trusted("bob@corp.com"));
    }

    #[test]
    fn allowlist_only_policy() {
        let policy = TrustPolicy::new(None, ["ops@partner.org".to_string()]);
        assert!(policy.domain_suffix().is_none());
        assert!(policy.is_trusted("ops@partner.org"));
        assert!(!policy.is_trusted("dev@partner.org"));
    }

    #[test]
    fn authorize_reports_rejected_email() {
        let err = corp_policy()
            .authorize("mallory@x.com")
            .expect_err("should reject");
        assert_eq!(
            err,
            AccessError::UntrustedIdentity {
                email: "mallory@x.com".to_string()
            }
        );
        assert!(corp_policy().authorize("bob@corp.com").is_ok());
    }

    #[test]
    fn deserializes_from_config_keys() {
        let json = r#"{
            "trusted_domain": "@corp.com",
            "trusted_emails": ["a@x.com", "b@y.com"]
        }"#;
        let policy: TrustPolicy = serde_json::from_str(json).expect("deserialize");
        assert_eq!(policy.domain_suffix(), Some("@corp.com"));
        assert_eq!(policy.allowed_emails().len(), 2);
        assert!(policy.is_trusted("b@y.com"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let policy: TrustPolicy = serde_json::from_str("{}").expect("deserialize");
        assert!(policy.is_empty());
    }
}
