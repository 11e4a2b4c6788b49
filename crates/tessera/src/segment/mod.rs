mod allocator;
mod error;
mod repository;
mod scope;


pub use allocator::*;
pub use error::*;
pub use repository::*;
pub use scope::*;
