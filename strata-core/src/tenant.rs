//! Tenant identity
//!
//! A [`TenantKey`] is the partition selector attached to every record store
//! request. It is derived from a user identifier and a secret, so re-running
//! setup with the same inputs lands in the same partition. It is not an
//! authentication credential.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// HTTP header carrying the tenant key
pub const TENANT_HEADER: &str = "x-tenant-key";

/// Number of hex characters kept from the digest
pub const KEY_LEN: usize = 16;

const SECRET_PREFIX_LEN: usize = 4;
const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TenantError {
    #[error("{0} is required to derive a tenant key")]
    Missing(&'static str),

    #[error("identifier contains unsupported character {0:?}")]
    InvalidIdentifier(char),

    #[error("tenant key must be {KEY_LEN} lowercase hex characters")]
    MalformedKey,
}

/// Opaque, fixed-length partition key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantKey(String);

impl TenantKey {
    /// Validate a key received from elsewhere (config file, request header)
    pub fn parse(raw: &str) -> Result<Self, TenantError> {
        let well_formed = raw.len() == KEY_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));

        if well_formed {
            Ok(Self(raw.to_string()))
        } else {
            Err(TenantError::MalformedKey)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantKey {
    type Error = TenantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantKey> for String {
    fn from(key: TenantKey) -> Self {
        key.0
    }
}

/// Derive the tenant key for `identifier`
///
/// `sha256(secret[..4] + ":" + identifier)`, hex encoded and truncated to
/// [`KEY_LEN`] characters.
pub fn derive(identifier: &str, secret: &str) -> Result<TenantKey, TenantError> {
    if identifier.is_empty() {
        return Err(TenantError::Missing("identifier"));
    }
    if secret.is_empty() {
        return Err(TenantError::Missing("secret"));
    }
    if let Some(bad) = identifier.chars().find(|c| !is_identifier_char(*c)) {
        return Err(TenantError::InvalidIdentifier(bad));
    }

    let prefix: String = secret.chars().take(SECRET_PREFIX_LEN).collect();

    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update([SEPARATOR as u8]);
    hasher.update(identifier.as_bytes());
    let digest = hasher.finalize();

    let hex: String = digest
        .iter()
        .take(KEY_LEN / 2)
        .map(|b| format!("{:02x}", b))
        .collect();

    Ok(TenantKey(hex))
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '+' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive("alice@example.com", "ghp_secret").unwrap();
        let b = derive("alice@example.com", "ghp_secret").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), KEY_LEN);
    }

    #[test]
    fn test_only_secret_prefix_matters() {
        let a = derive("alice", "abcd-first").unwrap();
        let b = derive("alice", "abcd-second").unwrap();
        let c = derive("alice", "abce-first").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_known_vector() {
        // sha256("abcd:alice")
        let key = derive("alice", "abcdef").unwrap();
        let expected = {
            let digest = Sha256::digest(b"abcd:alice");
            digest
                .iter()
                .take(8)
                .map(|b| format!("{:02x}", b))
                .collect::<String>()
        };
        assert_eq!(key.as_str(), expected);
    }

    #[test]
    fn test_distinct_inputs_give_distinct_keys() {
        let mut keys = HashSet::new();
        for i in 0..1000 {
            let identifier = format!("user-{i}@example.com");
            let secret = format!("{:04}-token", i * 7919 % 10_000);
            keys.insert(derive(&identifier, &secret).unwrap());
        }
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert_eq!(derive("", "secret"), Err(TenantError::Missing("identifier")));
        assert_eq!(derive("alice", ""), Err(TenantError::Missing("secret")));
    }

    #[test]
    fn test_identifier_charset() {
        assert_eq!(
            derive("alice smith", "secret"),
            Err(TenantError::InvalidIdentifier(' '))
        );
        assert!(derive("alice.smith+dev@example.com", "secret").is_ok());
    }

    #[test]
    fn test_short_secret_is_used_whole() {
        assert!(derive("alice", "ab").is_ok());
    }

    #[test]
    fn test_parse_key() {
        let key = derive("alice", "secret").unwrap();
        assert_eq!(TenantKey::parse(key.as_str()).unwrap(), key);
        assert!(TenantKey::parse("short").is_err());
        assert!(TenantKey::parse("ABCDEF0123456789").is_err());
        assert!(TenantKey::parse("zzzzzzzzzzzzzzzz").is_err());
    }

    #[test]
    fn test_key_serde_validates() {
        let key = derive("alice", "secret").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        let back: TenantKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<TenantKey>("\"nope\"").is_err());
    }
}
