//! castlink-pr library interface
//!
//! Performer resolution pipeline: normalizes ASP product codes into canonical
//! search variants, resolves performer-name candidates through a
//! cache-then-network cascade over prioritized external indexes, validates
//! the names, and links products to performer identities.
//!
//! Exposed as a library so integration tests can drive each component
//! against an in-memory database.

pub mod config;
pub mod db;
pub mod normalize;
pub mod services;

pub use castlink_common::{Error, Result};
