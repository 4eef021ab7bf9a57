//! # SongTeam Shared Library
//!
//! Types and business logic shared by the API server and the worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `ledger`: Credit grants, consumption and refunds
//! - `join_code`: Team join code generation and normalization
//! - `genre`: Supported song genres
//! - `pricing`: Purchasable credit packs
//! - `auth`: Token validation and authorization checks
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod genre;
pub mod join_code;
pub mod ledger;
pub mod models;
pub mod pricing;

/// Current version of the SongTeam shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
