use crate::DecodeError;

/// Why a public id was rejected. Checked in declaration order; the first
/// failing check wins.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PublicIdError {
    #[error("type {0:?} must match [a-z0-9]{{2,10}}")]
    InvalidType(String),

    #[error("missing separator {0:?}")]
    MissingSeparator(char),

    #[error("separator {0:?} appears more than once")]
    ExtraSeparator(char),

    #[error("expected {expected} characters after the separator, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] DecodeError),

    /// Well-formed, but minted for another resource type.
    #[error("expected a {expected:?} id, got {got:?}")]
    UnexpectedType { expected: String, got: String },
}
