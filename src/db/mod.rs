//! Optional SQLite journal of cycles and failed return batches.
//!
//! This module provides:
//! - Journal initialization and schema
//! - SQLite pragma configuration
//! - Repository layer for journal operations

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
