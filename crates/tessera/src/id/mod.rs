mod typed;
mod ulid;

pub use ulid::*;
