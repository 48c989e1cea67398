//! Credential Pool Implementation
//!
//! An ordered, deduplicated, read-only list of credentials for one logical
//! service. Pools are built once at startup (or per request for
//! caller-supplied keys) and shared behind an `Arc`.

use super::credential::{Credential, SecretString};
use crate::error::ConfigError;
use std::collections::HashSet;

// ============================================================================
// Credential Pool
// ============================================================================

/// A non-empty, ordered pool of interchangeable credentials
#[derive(Debug, Clone)]
pub struct CredentialPool {
    /// Logical service name, used in logs and configuration errors
    service: String,
    /// Credentials in insertion order
    credentials: Vec<Credential>,
}

impl CredentialPool {
    /// Build a pool from raw key strings
    ///
    /// Entries are trimmed, blank entries dropped and duplicates removed
    /// (first occurrence wins). An empty result is a configuration error.
    pub fn load<I, S>(service: impl Into<String>, source: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<SecretString>,
    {
        let service = service.into();
        let mut seen = HashSet::new();
        let mut credentials = Vec::new();

        for raw in source {
            let secret: SecretString = raw.into();
            let trimmed = secret.expose().trim();
            if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
                continue;
            }
            credentials.push(Credential::new(
                SecretString::new(trimmed),
                credentials.len(),
            ));
        }

        if credentials.is_empty() {
            return Err(ConfigError::EmptyPool { service });
        }

        tracing::debug!(
            service = %service,
            key_count = credentials.len(),
            "Loaded credential pool"
        );

        Ok(Self {
            service,
            credentials,
        })
    }

    /// A pool holding a single placeholder credential for keyless services
    pub fn anonymous(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            credentials: vec![Credential::new(SecretString::new(""), 0)],
        }
    }

    /// Iterate credentials in pool order; restartable and side-effect free
    pub fn iterate(&self) -> impl Iterator<Item = &Credential> + '_ {
        self.credentials.iter()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false for a loaded pool
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// The credential that backoff rounds retry
    pub fn last(&self) -> &Credential {
        // A pool is never empty once constructed.
        &self.credentials[self.credentials.len() - 1]
    }
}

/// Collect raw keys from `list_var` (comma separated) followed by `single_var`
///
/// `lookup` resolves a variable name, normally to the process environment.
pub fn collect_keys<F>(lookup: F, list_var: &str, single_var: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut keys: Vec<String> = lookup(list_var)
        .map(|value| split_keys(&value))
        .unwrap_or_default();
    if let Some(single) = lookup(single_var) {
        keys.push(single);
    }
    keys
}

/// Split a comma separated key list
pub fn split_keys(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_preserves_order() {
        let pool = CredentialPool::load("gemini", ["key-a", "key-b", "key-c"]).unwrap();
        let secrets: Vec<&str> = pool.iterate().map(|c| c.secret()).collect();
        assert_eq!(secrets, vec!["key-a", "key-b", "key-c"]);
        let indices: Vec<usize> = pool.iterate().map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_load_deduplicates_and_trims() {
        let pool =
            CredentialPool::load("gemini", [" key-a ", "key-b", "key-a", "", "   "]).unwrap();
        assert_eq!(pool.len(), 2);
        let secrets: Vec<&str> = pool.iterate().map(|c| c.secret()).collect();
        assert_eq!(secrets, vec!["key-a", "key-b"]);
        assert_eq!(pool.last().index(), 1);
    }

    #[test]
    fn test_load_empty_is_config_error() {
        let err = CredentialPool::load("huggingface", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPool { ref service } if service == "huggingface"));

        let err = CredentialPool::load("gemini", [" ", ""]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPool { .. }));
    }

    #[test]
    fn test_iterate_is_restartable() {
        let pool = CredentialPool::load("gemini", ["a", "b"]).unwrap();
        let first: Vec<usize> = pool.iterate().map(|c| c.index()).collect();
        let second: Vec<usize> = pool.iterate().map(|c| c.index()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_anonymous_pool() {
        let pool = CredentialPool::anonymous("pollinations");
        assert_eq!(pool.len(), 1);
        assert!(pool.last().is_anonymous());
        assert_eq!(pool.service(), "pollinations");
    }

    #[test]
    fn test_split_keys() {
        assert_eq!(split_keys("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_keys("").is_empty());
    }

    #[test]
    fn test_collect_keys_appends_single_key() {
        let lookup = |name: &str| match name {
            "GEMINI_API_KEYS" => Some("k1,k2".to_string()),
            "GEMINI_API_KEY" => Some("k3".to_string()),
            _ => None,
        };
        assert_eq!(
            collect_keys(lookup, "GEMINI_API_KEYS", "GEMINI_API_KEY"),
            vec!["k1", "k2", "k3"]
        );
        assert!(collect_keys(|_| None, "A", "B").is_empty());
    }

    #[test]
    fn test_pool_debug_hides_secrets() {
        let pool = CredentialPool::load("gemini", ["AIzaSyTopSecret"]).unwrap();
        assert!(!format!("{:?}", pool).contains("TopSecret"));
    }
}
