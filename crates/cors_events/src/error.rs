//! Errors of the cross-context event channel.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Failures surfaced by the cross-context event channel.
pub enum CorsError {
    /// The tab id lookup failed.
    #[error("tab lookup failed: {0}")]
    Tab(String),
    /// A channel read or write failed.
    #[error("value store error: {0}")]
    Store(String),
    /// The event name is empty or contains `,`.
    #[error("invalid event name `{0}`")]
    InvalidEventName(String),
    /// The queue kept changing underneath every compare-and-set attempt.
    #[error("queue `{key}` still contended after {attempts} attempts")]
    QueueContention {
        /// Queue key being updated.
        key: String,
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// The call was abandoned before a response arrived (the emitter or its store went away).
    #[error("call dropped before a response arrived")]
    Dropped,
}
