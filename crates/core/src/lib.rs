//! Core types and traits for kdb
//!
//! This crate defines the foundational pieces shared by every layer:
//! - Error: the [`KdbError`] hierarchy and [`KdbResult`] alias
//! - Json: path lookups into values that hold JSON documents
//! - Keys: the physical key layout (registry, free list, counters, entries)
//! - Types: [`CollectionKind`], [`Prefix`], [`VersionedValue`]
//! - Traits: [`Storage`] and [`SnapshotView`], the engine contract

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod json;
pub mod keys;
pub mod traits;
pub mod types;

pub use error::{KdbError, KdbResult};
pub use traits::{ScanItem, SnapshotView, Storage};
pub use types::{CollectionKind, Prefix, VersionedValue};
