//! Primary store (MySQL) access.
//!
//! - [`MysqlStore`]: SQLx-backed [`PrimaryStore`](crate::core::PrimaryStore)
//! - [`query`]: statement builders

mod mysql;
pub mod query;

pub use mysql::MysqlStore;
