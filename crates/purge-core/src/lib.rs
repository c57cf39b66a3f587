//! # purge-core
//!
//! Core abstractions shared by the purge deletion-job services.
//!
//! This crate provides the foundational types used across all purge components:
//!
//! - **Identifiers**: Strongly-typed job identifiers and event sort keys
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `purge-core` is the **only** crate allowed to define shared primitives.
//! Domain behaviour (status folding, execution triggering, query generation)
//! lives in `purge-jobs`.
//!
//! ## Example
//!
//! ```rust
//! use purge_core::prelude::*;
//!
//! let job_id = JobId::generate();
//! let sort_key = SortKey::generate(chrono::Utc::now());
//! assert_ne!(job_id.as_str(), sort_key.to_string());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use purge_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{JobId, SortKey};
    pub use crate::observability::{LogFormat, init_logging};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use id::{JobId, SortKey};
pub use observability::{LogFormat, init_logging, job_span};
