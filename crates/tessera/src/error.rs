//! Crate-level error aggregate.
//!
//! Each component owns a narrow error enum describing its own failure modes.
//! [`Error`] folds them together for callers that drive several components
//! and only want a single `?`-compatible type.

use crate::{
    DecodeError, GeneratorError, NodeIdError, PublicIdError, ResolveError, SegmentError,
};

/// Result alias defaulting to the crate-level [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors `tessera` can surface.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Startup configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The node id could not be resolved.
    #[error(transparent)]
    NodeId(#[from] NodeIdError),

    /// Id generation escalated a clock anomaly.
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// A segment could not be allocated.
    #[error(transparent)]
    Segment(#[from] SegmentError),

    /// A public id failed to encode or decode.
    #[error(transparent)]
    PublicId(#[from] PublicIdError),

    /// Resolution or registration failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A raw identifier representation could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Invalid static configuration. Always fatal at construction time.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("segment step must be greater than 0")]
    SegmentStep,

    #[error("separator {0:?} collides with the type or payload alphabet")]
    Separator(char),

    #[error("resource type prefix {0:?} must match [a-z0-9]{{2,10}}")]
    ResourcePrefix(String),

    #[error("resource type name must not be blank")]
    ResourceName,

    #[error("{field} must be greater than 0")]
    Zero { field: &'static str },
}
