//! # authstore Shared Library
//!
//! This crate contains the storage contract of the authentication service:
//! the collection and index catalog, the provisioning routine that applies
//! it to a PostgreSQL server, the record models, and the expiry sweeper that
//! enforces time-to-live indexes.
//!
//! ## Module Organization
//!
//! - `schema`: Declarative collection/index catalog and DDL rendering
//! - `provision`: Idempotent provisioning of database, role, tables, indexes and seed
//! - `expiry`: Time-to-live enforcement
//! - `models`: Record types and their writes
//! - `db`: Connection pool and database lifecycle helpers
//! - `auth`: Password hashing for the seed credential
//! - `config`: Environment configuration
//! - `error`: Store error classification

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod expiry;
pub mod models;
pub mod provision;
pub mod schema;

/// Current version of the authstore shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
