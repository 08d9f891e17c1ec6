//! Crate error type.
//!
//! The directive engine itself never fails: malformed markup degrades to
//! defaults. Errors only surface from configuration parsing, id lookups and
//! query decoding.

use thiserror::Error;

/// Errors produced by `elx_core`.
#[derive(Debug, Error)]
pub enum Error {
    /// Engine configuration could not be parsed.
    #[error("invalid engine config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// No element with the given id exists in the document.
    #[error("no element found with id '{0}'")]
    UnknownElement(String),

    /// A query string component could not be decoded.
    #[error("invalid url component '{component}': {reason}")]
    InvalidUrl { component: String, reason: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
