//! Database access for castlink-pr
//!
//! Thin operation modules over the shared SQLite pool. Schema creation
//! lives in `castlink_common::db`; everything here is upsert-style so the
//! batch jobs stay idempotent and safe under concurrent writers.

pub mod lookup_cache;
pub mod performers;
pub mod product_performers;
pub mod products;
