use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque account / validator identifier.
///
/// The engine never interprets the contents; the signing capability decides
/// how an address maps to a public key. Ordering is lexicographic, which is
/// the order used for the state digest and the active validator set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Address(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shortened form for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Address(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_order_lexicographically() {
        let mut addrs = vec![Address::from("carol"), Address::from("alice"), Address::from("bob")];
        addrs.sort();
        let names: Vec<&str> = addrs.iter().map(Address::as_str).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn json_encoding_is_a_plain_string() {
        let addr = Address::from("validator-1");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"validator-1\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn short_form_truncates_long_identifiers() {
        let addr = Address::from("abcdef0123456789abcdef");
        assert_eq!(addr.short(), "abcdef012345");
        assert_eq!(Address::from("tiny").short(), "tiny");
    }
}
