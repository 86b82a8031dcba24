// src/error.rs
use thiserror::Error;

/// Failure taxonomy for one fetch or one decode.
///
/// Every error is caught at the boundary of the operation that produced it
/// and converted into feed-local state (flags/messages); nothing here is
/// fatal to the session. The worst outcome of any single failure is "this
/// one feed did not update this one time."
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http status {0}")]
    Http(u16),

    #[error("decode error: {0}")]
    Decode(String),
}
