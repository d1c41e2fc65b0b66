//! Error types.
//!
//! The reactive core almost never fails: writes to readonly proxies and other
//! misuse are discarded with a `tracing` diagnostic instead. The variants here
//! cover the few operations that must report failure to the caller.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReactivityError>;

#[derive(Debug, Error)]
pub enum ReactivityError {
    /// Assignment to a ref that has no setter (a getter-derived ref).
    #[error("cannot assign to a readonly ref")]
    ReadonlyRef,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
