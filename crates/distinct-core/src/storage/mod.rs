//! # Storage Module
//!
//! Durable session storage on top of redb.

mod redb_store;

pub use redb_store::{RedbSessionLog, RedbStore};
