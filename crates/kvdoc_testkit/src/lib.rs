//! # kvdoc Testkit
//!
//! Test utilities for kvdoc.
//!
//! This crate provides:
//! - Test fixtures and database helpers (the "books" data set)
//! - Property-based test generators using proptest
//! - Tracing initialisation for tests
//!
//! ## Usage
//!
//! ```rust
//! use kvdoc_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     db.set(&Value::from("k"), Value::from(1)).unwrap();
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use kvdoc_core::{Database, Value};
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
