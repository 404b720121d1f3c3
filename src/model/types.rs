//! Core tree types: [`Key`], [`Identity`], [`ValueRecord`], and [`Range`].
//!
//! Keys and identities are opaque byte strings. Keys order lexicographically
//! on raw bytes with no normalization; identities are content addresses
//! produced by an external addressing scheme — equality implies semantic
//! equality of the addressed record or range, and the engine never interprets
//! them beyond comparison.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// An opaque byte-string key.
///
/// Ordering is the derived lexicographic order on the raw bytes — the one
/// global sort order the merge engine maintains.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(Vec<u8>);

impl Key {
    /// Create a key from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the key, returning the raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for Key {
    /// Lossy UTF-8 rendering, for diagnostics only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A content address for a record or a range.
///
/// Produced by an external addressing scheme. Equal identities address
/// byte-for-byte identical content; unequal identities address different
/// content. Identities deliberately carry no ordering — only equality is
/// meaningful.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(Vec<u8>);

impl Identity {
    /// Create an identity from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw identity bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Identity {
    /// Hex rendering, for diagnostics only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<Vec<u8>> for Identity {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Identity {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

// ---------------------------------------------------------------------------
// ValueRecord
// ---------------------------------------------------------------------------

/// A single key→value record.
///
/// The engine reads `key` and `identity`; `value` is carried through to the
/// writer opaquely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    /// The record's key.
    pub key: Key,
    /// Content address of the record.
    pub identity: Identity,
    /// Opaque value bytes.
    pub value: Vec<u8>,
}

impl ValueRecord {
    /// Create a new record.
    pub fn new(
        key: impl Into<Key>,
        identity: impl Into<Identity>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            key: key.into(),
            identity: identity.into(),
            value: value.into(),
        }
    }

    /// The record's key.
    #[must_use]
    pub const fn key(&self) -> &Key {
        &self.key
    }

    /// The record's content address.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }
}

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

/// Header of an immutable, content-addressed run of sorted records.
///
/// `min_key` is the key of the first record in the run and `max_key` the key
/// of the last. Within one iterator, ranges appear in strictly increasing
/// `min_key` order and their `[min_key, max_key]` intervals never overlap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Content address of the whole run.
    pub id: Identity,
    /// Key of the first record.
    pub min_key: Key,
    /// Key of the last record.
    pub max_key: Key,
}

impl Range {
    /// Create a range header.
    pub fn new(id: impl Into<Identity>, min_key: impl Into<Key>, max_key: impl Into<Key>) -> Self {
        let range = Self {
            id: id.into(),
            min_key: min_key.into(),
            max_key: max_key.into(),
        };
        debug_assert!(
            range.min_key <= range.max_key,
            "range bounds out of order: {} > {}",
            range.min_key,
            range.max_key
        );
        range
    }

    /// Content address of the range.
    #[must_use]
    pub const fn id(&self) -> &Identity {
        &self.id
    }

    /// Key of the first record.
    #[must_use]
    pub const fn min_key(&self) -> &Key {
        &self.min_key
    }

    /// Key of the last record.
    #[must_use]
    pub const fn max_key(&self) -> &Key {
        &self.max_key
    }

    /// Returns `true` if `key` falls within `[min_key, max_key]`.
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        *key >= self.min_key && *key <= self.max_key
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_orders_by_raw_bytes() {
        assert!(Key::from("a") < Key::from("b"));
        assert!(Key::from("a") < Key::from("aa"));
        // Byte order, not numeric or locale order.
        assert!(Key::from("10") < Key::from("9"));
        assert!(Key::new(vec![0x00]) < Key::new(vec![0xff]));
    }

    #[test]
    fn key_display_is_lossy_utf8() {
        assert_eq!(format!("{}", Key::from("files/readme")), "files/readme");
        let non_utf8 = Key::new(vec![0x66, 0xff, 0x6f]);
        assert_eq!(format!("{non_utf8}"), "f\u{fffd}o");
    }

    #[test]
    fn identity_display_is_hex() {
        let id = Identity::new(vec![0xde, 0xad, 0x00]);
        assert_eq!(format!("{id}"), "dead00");
    }

    #[test]
    fn identity_equality_is_byte_equality() {
        assert_eq!(Identity::from("x"), Identity::from("x"));
        assert_ne!(Identity::from("x"), Identity::from("y"));
    }

    #[test]
    fn range_contains_is_inclusive() {
        let range = Range::new("id-1", "b", "d");
        assert!(!range.contains(&Key::from("a")));
        assert!(range.contains(&Key::from("b")));
        assert!(range.contains(&Key::from("c")));
        assert!(range.contains(&Key::from("d")));
        assert!(!range.contains(&Key::from("e")));
    }

    #[test]
    fn single_key_range_contains_itself() {
        let range = Range::new("id-1", "k", "k");
        assert!(range.contains(&Key::from("k")));
    }

    #[test]
    fn record_accessors() {
        let rec = ValueRecord::new("k", "id", b"payload".to_vec());
        assert_eq!(rec.key(), &Key::from("k"));
        assert_eq!(rec.identity(), &Identity::from("id"));
        assert_eq!(rec.value, b"payload");
    }

    #[test]
    fn key_serde_round_trip() {
        let key = Key::new(vec![0x01, 0xfe, 0x61]);
        let json = serde_json::to_string(&key).expect("serialize");
        let back: Key = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(key, back);
    }

    #[test]
    fn range_serde_round_trip() {
        let range = Range::new("abc", "k1", "k9");
        let json = serde_json::to_string(&range).expect("serialize");
        let back: Range = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(range, back);
    }
}
