//! Whole-store checkpoint files
//!
//! A checkpoint is a complete image of the store at one version. It is written
//! with the write-fsync-rename pattern so a crash leaves either the previous
//! checkpoint or the new one, never a torn file:
//!
//! 1. Write to `kdb.chk.tmp`
//! 2. fsync the temporary file
//! 3. Atomic rename to `kdb.chk`
//! 4. fsync the parent directory
//!
//! # File Structure
//!
//! ```text
//! +------------------+
//! | Magic "KDBC"     | 4 bytes
//! | Format version   | u32
//! | Store version    | u64
//! | Entry count      | u64
//! +------------------+
//! | Entry 1..N       | u32 key_len | key | u64 version | u32 value_len | value
//! +------------------+
//! | Footer CRC32     | 4 bytes, over everything above
//! +------------------+
//! ```
//!
//! All integers are little-endian.

use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use kdb_core::{KdbError, KdbResult, SnapshotView, VersionedValue};

use crate::snapshot::SharedSnapshotView;
use crate::unified::UnifiedStore;

/// Magic bytes: "KDBC"
pub const CHECKPOINT_MAGIC: [u8; 4] = *b"KDBC";

/// Checkpoint format version
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// File name of the checkpoint inside a data directory
pub const CHECKPOINT_FILE: &str = "kdb.chk";

const HEADER_SIZE: usize = 4 + 4 + 8 + 8;
const FOOTER_SIZE: usize = 4;

/// Summary of a written checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointInfo {
    /// Store version captured by the checkpoint
    pub version: u64,
    /// Number of entries written
    pub entries: u64,
    /// File size in bytes
    pub bytes: u64,
}

/// Path of the checkpoint file in `dir`
pub fn checkpoint_path(dir: &Path) -> PathBuf {
    dir.join(CHECKPOINT_FILE)
}

/// Serialize a snapshot into checkpoint bytes
pub fn encode_checkpoint(snapshot: &SharedSnapshotView) -> KdbResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + FOOTER_SIZE);
    buf.write_all(&CHECKPOINT_MAGIC)?;
    buf.write_u32::<LittleEndian>(CHECKPOINT_FORMAT_VERSION)?;
    buf.write_u64::<LittleEndian>(snapshot.version())?;
    buf.write_u64::<LittleEndian>(snapshot.len() as u64)?;

    for (key, vv) in snapshot.iter() {
        buf.write_u32::<LittleEndian>(len_u32(key.len())?)?;
        buf.write_all(key)?;
        buf.write_u64::<LittleEndian>(vv.version)?;
        buf.write_u32::<LittleEndian>(len_u32(vv.value.len())?)?;
        buf.write_all(&vv.value)?;
    }

    let crc = crc32fast::hash(&buf);
    buf.write_u32::<LittleEndian>(crc)?;
    Ok(buf)
}

/// Parse checkpoint bytes into a store version and its entries
pub fn decode_checkpoint(bytes: &[u8]) -> KdbResult<(u64, Vec<(Vec<u8>, VersionedValue)>)> {
    if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(KdbError::corruption(format!(
            "checkpoint truncated: {} bytes",
            bytes.len()
        )));
    }

    let (body, footer) = bytes.split_at(bytes.len() - FOOTER_SIZE);
    let stored_crc = Cursor::new(footer).read_u32::<LittleEndian>()?;
    let actual_crc = crc32fast::hash(body);
    if stored_crc != actual_crc {
        return Err(KdbError::corruption(format!(
            "checkpoint CRC mismatch: stored {:#010x}, computed {:#010x}",
            stored_crc, actual_crc
        )));
    }

    let mut cursor = Cursor::new(body);
    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic)?;
    if magic != CHECKPOINT_MAGIC {
        return Err(KdbError::corruption(format!(
            "invalid checkpoint magic: {:?}",
            magic
        )));
    }
    let format_version = cursor.read_u32::<LittleEndian>()?;
    if format_version != CHECKPOINT_FORMAT_VERSION {
        return Err(KdbError::corruption(format!(
            "unsupported checkpoint version {}, expected {}",
            format_version, CHECKPOINT_FORMAT_VERSION
        )));
    }
    let store_version = cursor.read_u64::<LittleEndian>()?;
    let count = cursor.read_u64::<LittleEndian>()?;

    let mut entries = Vec::new();
    for _ in 0..count {
        let key = read_chunk(&mut cursor, body.len())?;
        let version = read_field(cursor.read_u64::<LittleEndian>())?;
        let value = read_chunk(&mut cursor, body.len())?;
        entries.push((key, VersionedValue::new(value, version)));
    }

    if cursor.position() as usize != body.len() {
        return Err(KdbError::corruption("trailing bytes after checkpoint entries"));
    }

    Ok((store_version, entries))
}

/// Write the store's current state to `dir` atomically
pub fn write_checkpoint(dir: &Path, store: &UnifiedStore) -> KdbResult<CheckpointInfo> {
    let snapshot = store.create_snapshot();
    let bytes = encode_checkpoint(&snapshot)?;

    let path = checkpoint_path(dir);
    let temp_path = path.with_extension("chk.tmp");

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, &path)?;

    if let Some(parent) = path.parent() {
        if parent.exists() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }

    let info = CheckpointInfo {
        version: snapshot.version(),
        entries: snapshot.len() as u64,
        bytes: bytes.len() as u64,
    };
    debug!(target: "kdb::db", version = info.version, entries = info.entries, bytes = info.bytes, "Checkpoint written");
    Ok(info)
}

/// Load the checkpoint in `dir` into a fresh store.
///
/// A missing file yields `None`; a damaged one is a `Corruption` error.
pub fn read_checkpoint(dir: &Path) -> KdbResult<Option<UnifiedStore>> {
    let path = checkpoint_path(dir);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let (version, entries) = decode_checkpoint(&bytes)?;
    debug!(target: "kdb::db", version, entries = entries.len(), "Checkpoint loaded");
    Ok(Some(UnifiedStore::from_entries(entries, version)))
}

fn len_u32(len: usize) -> KdbResult<u32> {
    u32::try_from(len).map_err(|_| KdbError::invalid_input(format!("entry of {} bytes is too large to checkpoint", len)))
}

fn read_field<T>(result: std::io::Result<T>) -> KdbResult<T> {
    result.map_err(|e| KdbError::corruption(format!("checkpoint entry truncated: {}", e)))
}

fn read_chunk(cursor: &mut Cursor<&[u8]>, limit: usize) -> KdbResult<Vec<u8>> {
    let len = read_field(cursor.read_u32::<LittleEndian>())? as usize;
    let remaining = limit.saturating_sub(cursor.position() as usize);
    if len > remaining {
        return Err(KdbError::corruption(format!(
            "checkpoint entry length {} exceeds remaining {} bytes",
            len, remaining
        )));
    }
    let mut chunk = vec![0u8; len];
    read_field(cursor.read_exact(&mut chunk))?;
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdb_core::Storage;
    use tempfile::TempDir;

    fn populated_store() -> UnifiedStore {
        let store = UnifiedStore::new();
        store
            .apply_batch(
                &[
                    (b"alpha".to_vec(), b"1".to_vec()),
                    (b"beta".to_vec(), Vec::new()),
                ],
                &[],
                3,
            )
            .unwrap();
        store
            .apply_batch(&[(b"gamma".to_vec(), vec![0xFF; 300])], &[], 8)
            .unwrap();
        store
    }

    #[test]
    fn test_write_then_read_restores_state() {
        let dir = TempDir::new().unwrap();
        let store = populated_store();

        let info = write_checkpoint(dir.path(), &store).unwrap();
        assert_eq!(info.version, 8);
        assert_eq!(info.entries, 3);

        let restored = read_checkpoint(dir.path()).unwrap().unwrap();
        assert_eq!(restored.current_version(), 8);
        assert_eq!(restored.get(b"alpha").unwrap().unwrap().version, 3);
        assert_eq!(restored.get(b"beta").unwrap().unwrap().value, Vec::<u8>::new());
        assert_eq!(restored.get(b"gamma").unwrap().unwrap().value.len(), 300);
        assert!(!dir.path().join("kdb.chk.tmp").exists());
    }

    #[test]
    fn test_missing_checkpoint_is_fresh_store() {
        let dir = TempDir::new().unwrap();
        assert!(read_checkpoint(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_checkpoint(&UnifiedStore::new().create_snapshot()).unwrap();
        assert_eq!(&bytes[0..4], b"KDBC");
        assert_eq!(bytes.len(), HEADER_SIZE + FOOTER_SIZE);
        assert_eq!(decode_checkpoint(&bytes).unwrap(), (0, Vec::new()));
    }

    #[test]
    fn test_flipped_byte_is_corruption() {
        let mut bytes = encode_checkpoint(&populated_store().create_snapshot()).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        let err = decode_checkpoint(&bytes).unwrap_err();
        assert!(matches!(err, KdbError::Corruption { .. }), "got {:?}", err);
    }

    #[test]
    fn test_bad_magic_with_valid_crc_is_corruption() {
        let mut bytes = encode_checkpoint(&populated_store().create_snapshot()).unwrap();
        bytes[0] = b'X';
        let body_len = bytes.len() - FOOTER_SIZE;
        let crc = crc32fast::hash(&bytes[..body_len]);
        bytes[body_len..].copy_from_slice(&crc.to_le_bytes());
        let err = decode_checkpoint(&bytes).unwrap_err();
        assert!(err.to_string().contains("magic"), "got {}", err);
    }

    #[test]
    fn test_truncated_file_is_corruption() {
        let bytes = encode_checkpoint(&populated_store().create_snapshot()).unwrap();
        assert!(matches!(
            decode_checkpoint(&bytes[..10]),
            Err(KdbError::Corruption { .. })
        ));
    }

    #[test]
    fn test_rewrite_replaces_previous_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = populated_store();
        write_checkpoint(dir.path(), &store).unwrap();

        store.apply_batch(&[], &[b"alpha".to_vec()], 9).unwrap();
        write_checkpoint(dir.path(), &store).unwrap();

        let restored = read_checkpoint(dir.path()).unwrap().unwrap();
        assert!(restored.get(b"alpha").unwrap().is_none());
        assert_eq!(restored.current_version(), 9);
    }
}
