use crate::{BoxError, PublicIdError, Ulid128};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("tenant id must be positive, got {0}")]
    InvalidTenant(i64),

    #[error(transparent)]
    InvalidPublicId(#[from] PublicIdError),

    #[error("public id type {got:?} does not match resource prefix {expected:?}")]
    PrefixMismatch { expected: String, got: String },

    /// The key is already mapped to a different internal id.
    #[error("{public_id} is mapped to {existing}, refusing {requested}")]
    Conflict {
        public_id: String,
        existing: Ulid128,
        requested: Ulid128,
    },

    /// The mapping table failed. Cache tier failures never surface here.
    #[error("public id mapping repository failed")]
    Repository(#[source] BoxError),
}

impl ResolveError {
    pub(crate) fn repository<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Repository(Box::new(err))
    }
}
