//! Storage layer for kdb
//!
//! This crate implements the reference ordered key-value engine:
//! - UnifiedStore: BTreeMap-based storage with RwLock and copy-on-write snapshots
//! - SharedSnapshotView: immutable point-in-time views for transactions
//! - Checkpoint: crash-safe whole-store image on disk
//! - Version management with AtomicU64

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod snapshot;
pub mod unified;

pub use checkpoint::{read_checkpoint, write_checkpoint, CheckpointInfo};
pub use snapshot::SharedSnapshotView;
pub use unified::UnifiedStore;
