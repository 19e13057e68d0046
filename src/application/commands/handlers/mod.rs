//! Command Handlers 实现

mod cache_handlers;
mod library_handlers;

pub use cache_handlers::*;
pub use library_handlers::*;
