//! Shared value types
//!
//! - [`CollectionKind`]: discriminates Hash and List namespaces in the registry
//! - [`Prefix`]: the key-space slice owned by one collection
//! - [`VersionedValue`]: a stored value plus the commit version that wrote it

use std::fmt;

use crate::keys;

/// Kind of a named collection.
///
/// Names are unique per kind; a Hash and a List may share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKind {
    /// Field to value map
    Hash,
    /// Append/pop sequence with integer indices
    List,
}

impl CollectionKind {
    /// Single-byte tag used in registry keys
    pub fn tag(self) -> u8 {
        match self {
            CollectionKind::Hash => b'h',
            CollectionKind::List => b'l',
        }
    }

    /// Lowercase name, used in log fields and error messages
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKind::Hash => "hash",
            CollectionKind::List => "list",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value read from storage together with its commit version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    /// Raw value bytes
    pub value: Vec<u8>,
    /// Version of the commit that last wrote this key
    pub version: u64,
}

impl VersionedValue {
    /// Create a new versioned value
    pub fn new(value: Vec<u8>, version: u64) -> Self {
        Self { value, version }
    }
}

/// The key-space prefix owned by one collection.
///
/// Encoded as [`keys::DATA_PREFIX`] followed by the 8-byte big-endian
/// allocation id. All prefixes have the same length, so no prefix is a
/// prefix of another and entries of two collections never interleave.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix(Vec<u8>);

impl Prefix {
    /// Encoded length of every prefix
    pub const LEN: usize = keys::DATA_PREFIX.len() + 8;

    /// Build the prefix for an allocation id
    pub fn from_id(id: u64) -> Self {
        let mut bytes = Vec::with_capacity(Self::LEN);
        bytes.extend_from_slice(keys::DATA_PREFIX);
        bytes.extend_from_slice(&id.to_be_bytes());
        Prefix(bytes)
    }

    /// Decode a persisted prefix, rejecting anything not produced by [`Prefix::from_id`]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() == Self::LEN && bytes.starts_with(keys::DATA_PREFIX) {
            Some(Prefix(bytes.to_vec()))
        } else {
            None
        }
    }

    /// Allocation id this prefix was derived from
    pub fn id(&self) -> u64 {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[keys::DATA_PREFIX.len()..]);
        u64::from_be_bytes(id)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Inclusive lower bound of the collection's entries
    pub fn first_key(&self) -> &[u8] {
        &self.0
    }

    /// Exclusive upper bound of the collection's entries.
    ///
    /// This is the lexicographic successor of the prefix, so every
    /// `prefix ++ subkey` sorts strictly below it regardless of the subkey's
    /// first byte.
    pub fn end_key(&self) -> Vec<u8> {
        keys::prefix_successor(&self.0)
            .unwrap_or_else(|| keys::prefix_successor(keys::DATA_PREFIX).unwrap_or_default())
    }

    /// Full storage key for a subkey
    pub fn entry_key(&self, subkey: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.0.len() + subkey.len());
        key.extend_from_slice(&self.0);
        key.extend_from_slice(subkey);
        key
    }

    /// Strip the prefix from a storage key, if the key belongs to this prefix
    pub fn strip<'a>(&self, key: &'a [u8]) -> Option<&'a [u8]> {
        key.strip_prefix(self.0.as_slice())
    }

    /// Key holding the collection's element count
    pub fn count_key(&self) -> Vec<u8> {
        keys::count_key(self)
    }

    /// Key holding a list's next append index
    pub fn seq_key(&self) -> Vec<u8> {
        keys::seq_key(self)
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prefix({})", self.id())
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@@:{}", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_round_trip() {
        let p = Prefix::from_id(42);
        assert_eq!(p.id(), 42);
        assert_eq!(p.as_bytes().len(), Prefix::LEN);
        assert_eq!(Prefix::from_bytes(p.as_bytes()), Some(p));
    }

    #[test]
    fn test_prefix_from_bytes_rejects_foreign_keys() {
        assert!(Prefix::from_bytes(b"px:h:name").is_none());
        assert!(Prefix::from_bytes(b"@@:short").is_none());
    }

    #[test]
    fn test_entry_keys_sit_inside_bounds() {
        let p = Prefix::from_id(7);
        let end = p.end_key();
        let subkeys: [&[u8]; 5] = [b"", b"a", b"\xff", b"\xff\xff\xff", b"zzzz"];
        for sub in subkeys {
            let k = p.entry_key(sub);
            assert!(k.as_slice() >= p.first_key());
            assert!(k < end, "subkey {:?} escaped the range", sub);
            assert_eq!(p.strip(&k), Some(sub));
        }
    }

    #[test]
    fn test_neighbouring_prefixes_do_not_overlap() {
        let a = Prefix::from_id(255);
        let b = Prefix::from_id(256);
        assert!(a.entry_key(b"\xff\xff") < b.first_key().to_vec());
        assert!(a.end_key().as_slice() <= b.first_key());
        assert!(a.strip(&b.entry_key(b"x")).is_none());
    }

    #[test]
    fn test_max_prefix_end_key() {
        let p = Prefix::from_id(u64::MAX);
        let k = p.entry_key(b"\xff");
        assert!(k < p.end_key());
    }

    #[test]
    fn test_collection_kind_display() {
        assert_eq!(CollectionKind::Hash.to_string(), "hash");
        assert_eq!(CollectionKind::List.tag(), b'l');
    }
}
