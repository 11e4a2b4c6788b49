mod config;
mod error;
mod l1;
mod l2;
mod repository;
mod resolver;
mod service;
mod types;


pub use config::*;
pub use error::*;
pub use l2::*;
pub use repository::*;
pub use resolver::*;
pub use service::*;
pub use types::*;
