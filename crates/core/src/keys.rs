//! Physical key layout
//!
//! Every collection shares one ordered key space. The layout is:
//!
//! ```text
//! px:<kind>:<name>   -> prefix bytes          (registry)
//! px#alloc           -> u64 BE next id         (allocation counter)
//! pxb:<prefix>       -> "ok"                   (free list)
//! <prefix><subkey>   -> value                  (entries, prefix = "@@:" + u64 BE id)
//! cnt:<prefix>       -> varint                 (element count)
//! seq:<prefix>       -> varint                 (next list index)
//! ```
//!
//! The metadata key spaces begin with byte strings that are distinct from
//! each other and from `@@:`, so no metadata key can be read as an entry.

use crate::types::{CollectionKind, Prefix};

/// Registry table: collection name to prefix
pub const REGISTRY_PREFIX: &[u8] = b"px:";

/// Allocation counter for fresh prefixes
pub const ALLOC_KEY: &[u8] = b"px#alloc";

/// Free list of reclaimed prefixes
pub const FREELIST_PREFIX: &[u8] = b"pxb:";

/// Marker value stored in free-list entries
pub const FREELIST_MARKER: &[u8] = b"ok";

/// Leading bytes of every collection prefix
pub const DATA_PREFIX: &[u8] = b"@@:";

/// Element counters
pub const COUNT_PREFIX: &[u8] = b"cnt:";

/// List append sequence counters
pub const SEQ_PREFIX: &[u8] = b"seq:";

/// Registry key for a named collection
pub fn registry_key(kind: CollectionKind, name: &[u8]) -> Vec<u8> {
    let mut key = registry_scan_prefix(kind);
    key.extend_from_slice(name);
    key
}

/// Common prefix of all registry keys of one kind
pub fn registry_scan_prefix(kind: CollectionKind) -> Vec<u8> {
    let mut key = Vec::with_capacity(REGISTRY_PREFIX.len() + 2);
    key.extend_from_slice(REGISTRY_PREFIX);
    key.push(kind.tag());
    key.push(b':');
    key
}

/// Free-list key for a released prefix
pub fn freelist_key(prefix: &Prefix) -> Vec<u8> {
    concat(FREELIST_PREFIX, prefix.as_bytes())
}

/// Count key for a prefix
pub fn count_key(prefix: &Prefix) -> Vec<u8> {
    concat(COUNT_PREFIX, prefix.as_bytes())
}

/// Sequence key for a prefix
pub fn seq_key(prefix: &Prefix) -> Vec<u8> {
    concat(SEQ_PREFIX, prefix.as_bytes())
}

/// Subkey for a list index. Big-endian so byte order equals numeric order.
pub fn encode_index(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

/// Decode a list subkey produced by [`encode_index`]
pub fn decode_index(subkey: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = subkey.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Smallest key strictly greater than every key starting with `prefix`.
///
/// Returns `None` when `prefix` is empty or all `0xFF`, in which case the
/// range is unbounded above.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last != 0xFF {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// LEB128-encode `value` into `buf`
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a varint from a byte slice, returning (value, bytes_consumed).
pub fn decode_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        if shift == 63 && byte > 1 {
            return None; // overflow
        }
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        shift += 7;
        if shift > 63 {
            return None;
        }
    }
    None
}

/// Varint-encode a counter value as a standalone stored value
pub fn counter_bytes(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    encode_varint(value, &mut buf);
    buf
}

/// Decode a stored counter; trailing bytes make it invalid
pub fn parse_counter(bytes: &[u8]) -> Option<u64> {
    match decode_varint(bytes) {
        Some((value, used)) if used == bytes.len() => Some(value),
        _ => None,
    }
}

fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(a.len() + b.len());
    key.extend_from_slice(a);
    key.extend_from_slice(b);
    key
}
