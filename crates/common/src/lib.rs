//! Netkeeper Common Library
//!
//! Shared types and errors for the netkeeper connectivity supervisor.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Netkeeper version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
