/// Boxed error returned by pluggable storage backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// The scope name is empty or its storage key is too long.
    #[error("invalid scope {key:?}: {reason}")]
    InvalidScope { key: String, reason: &'static str },

    /// A range that violates `1 <= start <= end`, or that does not start after
    /// the previously installed range.
    #[error("invalid range [{start}, {end}] for scope {scope:?}: {reason}")]
    InvalidRange {
        scope: String,
        start: i64,
        end: i64,
        reason: &'static str,
    },

    /// The repository failed. Nothing was installed; the call may be retried.
    #[error("segment repository failed for scope {scope:?}")]
    Repository {
        scope: String,
        #[source]
        source: BoxError,
    },
}
