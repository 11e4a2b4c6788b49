#![doc = include_str!("../README.md")]

mod checksum;
mod encoding;
mod error;
mod generator;
mod id;
mod metrics;
mod node;
mod public_id;
mod rand;
mod resolve;
mod segment;
#[cfg(feature = "serde")]
mod serde;
mod service;
mod time;

pub use crate::checksum::*;
pub use crate::encoding::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::metrics::*;
pub use crate::node::*;
pub use crate::public_id::*;
pub use crate::rand::*;
pub use crate::resolve::*;
pub use crate::segment::*;
#[cfg(feature = "serde")]
pub use crate::serde::*;
pub use crate::service::*;
pub use crate::time::*;

#[cfg(feature = "serde")]
#[doc(hidden)]
pub mod __private {
    pub use ::serde;
}
