//! Cadence Storage - Campaign persistence layer
//!
//! This crate provides the PostgreSQL-backed store the dispatcher and the
//! command interface operate on: campaign rows, per-recipient message rows,
//! atomic claims and the monotone sent counter.

pub mod db;
pub mod models;
pub mod repository;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
