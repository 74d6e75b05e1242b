//! Client identifiers and quota key derivation.
//!
//! Collision policy is a property of the deriver, not of the gate:
//! - [`VerbatimKey`] uses the identifier as the key. Clients sharing an address share a
//!   counter, and an identifier equal to some unrelated key in the same store index
//!   shares that key too.
//! - [`NamespacedKey`] prefixes the identifier (`prefix:identifier`), so only identical
//!   identifiers under the same prefix collide.

use crate::ConfigError;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Stable per-client token, usually the originating IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IpAddr> for ClientId {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

/// Uses the IP only; the ephemeral port would give every connection its own quota.
impl From<SocketAddr> for ClientId {
    fn from(addr: SocketAddr) -> Self {
        Self::from(addr.ip())
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Maps a client identifier to the key its counter lives under.
pub trait KeyDeriver: Send + Sync + 'static {
    fn derive(&self, client: &ClientId) -> String;
}

/// The identifier is the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerbatimKey;

impl KeyDeriver for VerbatimKey {
    fn derive(&self, client: &ClientId) -> String {
        client.as_str().to_string()
    }
}

/// Keys of the form `prefix:identifier`.
#[derive(Debug, Clone)]
pub struct NamespacedKey {
    prefix: String,
}

impl NamespacedKey {
    /// Build a namespaced deriver. Surrounding whitespace and trailing `:` are stripped.
    ///
    /// # Errors
    /// Returns `Err` if the prefix is empty after trimming or contains control characters.
    pub fn new(prefix: impl Into<String>) -> Result<Self, ConfigError> {
        let raw: String = prefix.into();
        let p = raw.trim().trim_end_matches(':').to_string();

        if p.is_empty() {
            return Err(ConfigError::InvalidKeyPrefix { prefix: raw, reason: "prefix cannot be empty" });
        }
        if p.chars().any(|c| c.is_control()) {
            return Err(ConfigError::InvalidKeyPrefix {
                prefix: raw,
                reason: "prefix cannot contain control characters",
            });
        }

        Ok(Self { prefix: p })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl KeyDeriver for NamespacedKey {
    fn derive(&self, client: &ClientId) -> String {
        format!("{}:{}", self.prefix, client.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_addr_drops_port() {
        let a: SocketAddr = "198.51.100.4:51000".parse().unwrap();
        let b: SocketAddr = "198.51.100.4:51001".parse().unwrap();
        assert_eq!(ClientId::from(a), ClientId::from(b));
        assert_eq!(ClientId::from(a).as_str(), "198.51.100.4");
    }

    #[test]
    fn ipv6_renders_without_brackets() {
        let addr: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        assert_eq!(ClientId::from(addr).as_str(), "2001:db8::1");
    }

    #[test]
    fn verbatim_key_is_identity() {
        assert_eq!(VerbatimKey.derive(&ClientId::new("10.0.0.1")), "10.0.0.1");
    }

    #[test]
    fn namespaced_key_prefixes_identifier() {
        let keys = NamespacedKey::new("  quota: ").unwrap();
        assert_eq!(keys.prefix(), "quota");
        assert_eq!(keys.derive(&ClientId::new("10.0.0.1")), "quota:10.0.0.1");
    }

    #[test]
    fn namespaced_key_rejects_empty_prefix() {
        let err = NamespacedKey::new(" : ").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKeyPrefix { .. }));
    }

    #[test]
    fn namespaced_key_rejects_control_characters() {
        assert!(NamespacedKey::new("quota\n").is_ok(), "trailing whitespace is trimmed");
        assert!(NamespacedKey::new("quo\tta").is_err());
    }
}
