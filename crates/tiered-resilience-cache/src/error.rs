//! Cache tier errors.

/// A fault reported by a cache tier or a remote store.
///
/// The built-in backends log and absorb these themselves. [`TieredCache`]
/// only ever sees them from third-party tiers, counts them, and moves on;
/// they never reach the code calling the cache.
///
/// [`TieredCache`]: crate::TieredCache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend or its transport failed.
    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    /// A stored entry could not be encoded or decoded.
    #[error("cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        CacheError::Backend {
            backend,
            message: message.into(),
        }
    }
}
