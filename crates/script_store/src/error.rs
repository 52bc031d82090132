use thiserror::Error;

#[derive(Debug, Error)]
/// Failures while reading or persisting the script store.
pub enum StoreError {
    /// The store content could not be converted to or from JSON.
    #[error("store serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The value store rejected a write.
    #[error("store write failed: {0}")]
    Store(String),
}
