mod codec;
mod error;
mod types;


pub use codec::*;
pub use error::*;
pub use types::*;
