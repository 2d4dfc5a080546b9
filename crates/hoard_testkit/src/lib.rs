//! # Hoard Testkit
//!
//! Test utilities for hoard.
//!
//! This crate provides:
//! - Record builders and temporary file stores
//! - Canonical reconciliation scenarios
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use hoard_core::{reconcile, MergeOptions};
//! use hoard_testkit::scenarios;
//!
//! let (local, remote) = scenarios::goblin_king();
//! let merged = reconcile(local, remote, MergeOptions::default());
//! assert_eq!(merged.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
