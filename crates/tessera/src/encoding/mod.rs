mod base62;
mod crockford;
mod error;

pub use base62::*;
pub use crockford::*;
pub use error::*;
