mod config;
mod error;
mod snowflake;
mod ulid;


pub use config::*;
pub use error::*;
pub use snowflake::*;
pub use ulid::*;
