//! Common test infrastructure
//!
//! End-to-end tests run the real HTTP client and SQLite cache against a
//! fake index server. Tests should only import from this module.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{FakeIndexServer, TestCatalog};
//!
//! #[tokio::test]
//! async fn test_list() {
//!     let server = FakeIndexServer::spawn().await;
//!     let catalog = TestCatalog::online(&server).await;
//!     assert!(catalog.service.list(false).await.is_empty());
//! }
//! ```

#![allow(dead_code)]

mod constants;
mod fixtures;
mod server;

pub use constants::*;
pub use fixtures::TestCatalog;
pub use server::FakeIndexServer;
