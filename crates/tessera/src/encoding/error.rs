/// Errors raised while decoding a fixed-width text or binary id.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input was not exactly the width the encoding requires.
    #[error("expected {expected} characters/bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    /// A byte outside the accepted alphabet.
    #[error("invalid character {:?} at index {index}", char::from(*byte))]
    InvalidAscii { byte: u8, index: usize },

    /// The decoded value does not fit in 128 bits.
    #[error("decoded value overflows 128 bits")]
    Overflow,
}
