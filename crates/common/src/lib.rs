//! castkit Common Utilities
//!
//! Shared infrastructure for all castkit crates:
//! - Error types and result aliases
//! - Sandboxed file paths and sibling-artifact naming
//! - Single-flight job status tracking
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod sandbox;

pub use config::*;
pub use error::*;
pub use jobs::*;
pub use sandbox::*;
