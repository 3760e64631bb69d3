//! # Storage Module
//!
//! The redb-backed Entity Store.
//!
//! Every state change runs inside one write transaction opened by
//! [`RedbStore::write`]. The closure's `Ok` commits, its `Err` aborts, so a
//! failed operation leaves the store exactly as it found it.

mod redb_store;

pub use redb_store::{ReadTxn, Reader, Record, RedbStore, StoreTxn};
