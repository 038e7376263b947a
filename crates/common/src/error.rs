//! Error types for netkeeper

use thiserror::Error;

/// Result type alias using netkeeper Error
pub type Result<T> = std::result::Result<T, Error>;

/// Netkeeper error types
///
/// Controller and probe failures deliberately do not appear here: they are
/// outcomes, not faults (a failed connect or an unanswerable probe resolves
/// into a state transition), so they travel as `Outcome` values and
/// fail-closed booleans instead of errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("A connection attempt is already in progress")]
    Busy,

    #[error("Internal error: {0}")]
    Internal(String),
}
