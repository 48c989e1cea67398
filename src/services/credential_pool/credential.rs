//! Credential types
//!
//! A credential is an opaque secret plus its ordinal position in the pool.
//! Secrets never appear in `Debug` or `Display` output; only a short
//! fingerprint is printed so attempts can be correlated in logs.

use std::fmt;

// ============================================================================
// Secret String
// ============================================================================

/// A string that must never be logged
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the raw secret (only for building outbound requests)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First four characters followed by an ellipsis, or `-` when empty
    pub fn fingerprint(&self) -> String {
        if self.0.is_empty() {
            return "-".to_string();
        }
        let head: String = self.0.chars().take(4).collect();
        format!("{}…", head)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString({})", self.fingerprint())
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Credential
// ============================================================================

/// An API key together with its position in the owning pool
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    secret: SecretString,
    index: usize,
}

impl Credential {
    pub(crate) fn new(secret: SecretString, index: usize) -> Self {
        Self { secret, index }
    }

    /// Zero-based position in the pool
    pub fn index(&self) -> usize {
        self.index
    }

    /// The raw key, for the `Authorization`/`x-goog-api-key` header
    pub fn secret(&self) -> &str {
        self.secret.expose()
    }

    /// True for the placeholder credential of keyless services
    pub fn is_anonymous(&self) -> bool {
        self.secret.is_empty()
    }

    /// Log-safe label, e.g. `AIza…#1`
    pub fn fingerprint(&self) -> String {
        format!("{}#{}", self.secret.fingerprint(), self.index + 1)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("secret", &self.secret)
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secret() {
        let cred = Credential::new(SecretString::new("AIzaSyVerySecretValue"), 0);
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("VerySecretValue"));
        assert!(debug.contains("AIza"));
    }

    #[test]
    fn test_fingerprint() {
        let cred = Credential::new(SecretString::new("hf_abcdef"), 2);
        assert_eq!(cred.fingerprint(), "hf_a…#3");
        assert_eq!(cred.to_string(), "hf_a…#3");
    }

    #[test]
    fn test_anonymous_credential() {
        let cred = Credential::new(SecretString::new(""), 0);
        assert!(cred.is_anonymous());
        assert_eq!(cred.fingerprint(), "-#1");
    }
}
