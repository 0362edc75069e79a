//! Content fingerprints for atoms.
//!
//! Provides deterministic structural hashing via SHA-256 with domain
//! separation and length prefixing, so that structurally equal atoms receive
//! identical fingerprints across fresh builds and across stores. The
//! fingerprint of an atom is the interning key of the store.
//!
//! # Citations
//! - SHA-256: NIST FIPS 180-4 (2015)
//! - Domain separation & length prefixing: Bernstein et al., "How to hash into elliptic curves" (2009)
//! - Content addressing of DAGs: Merkle, "A digital signature based on a conventional encryption function" (1987)

use crate::registry::TypeId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 256-bit hash value.
///
/// Wraps a byte array for type safety. Equality of fingerprints stands in for
/// structural equality of the hashed content.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Creates a hash from a raw byte array.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of the given data with domain separation.
    ///
    /// The digest input is `b"WEFT:<domain>:v1" || length_prefix(data) || data`
    /// where the length prefix is a 64-bit little-endian byte count.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"WEFT:");
        hasher.update(domain);
        hasher.update(b":v1");
        let len = data.len() as u64;
        hasher.update(len.to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 4 bytes in hex for readability
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Computes the content fingerprint of a named leaf atom.
///
/// The hash depends on the type tag and the UTF-8 name. Nodes and links hash
/// under distinct domains, so a node can never collide with a link.
pub fn node_fingerprint(ty: TypeId, name: &str) -> HashValue {
    let mut data = Vec::with_capacity(2 + 8 + name.len());
    data.extend_from_slice(&ty.as_u16().to_le_bytes());
    data.extend_from_slice(&(name.len() as u64).to_le_bytes());
    data.extend_from_slice(name.as_bytes());
    HashValue::hash_with_domain(b"NODE", &data)
}

/// Computes the content fingerprint of a link from its children's fingerprints.
///
/// The hash depends on the type tag and the **ordered** child fingerprints;
/// links are ordered sequences, so no sorting is applied.
pub fn link_fingerprint(ty: TypeId, children: &[HashValue]) -> HashValue {
    let mut data = Vec::with_capacity(2 + 8 + 32 * children.len());
    data.extend_from_slice(&ty.as_u16().to_le_bytes());
    data.extend_from_slice(&(children.len() as u64).to_le_bytes());
    for child in children {
        data.extend_from_slice(child.as_bytes());
    }
    HashValue::hash_with_domain(b"LINK", &data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = node_fingerprint(TypeId::new(3), "forty-two");
        let b = node_fingerprint(TypeId::new(3), "forty-two");
        assert_eq!(a, b);
    }

    #[test]
    fn name_and_type_sensitive() {
        let base = node_fingerprint(TypeId::new(3), "x");
        assert_ne!(base, node_fingerprint(TypeId::new(3), "y"));
        assert_ne!(base, node_fingerprint(TypeId::new(4), "x"));
    }

    #[test]
    fn node_link_domains_disjoint() {
        // A link with no children must not collide with a node with an empty name.
        let node = node_fingerprint(TypeId::new(7), "");
        let link = link_fingerprint(TypeId::new(7), &[]);
        assert_ne!(node, link);
    }

    #[test]
    fn child_order_matters() {
        let x = node_fingerprint(TypeId::new(4), "x");
        let y = node_fingerprint(TypeId::new(4), "y");
        let xy = link_fingerprint(TypeId::new(9), &[x, y]);
        let yx = link_fingerprint(TypeId::new(9), &[y, x]);
        assert_ne!(xy, yx);
    }
}
