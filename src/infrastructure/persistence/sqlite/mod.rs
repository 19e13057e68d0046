//! SQLite Persistence - 本地文档库

mod database;
mod document_repo;

pub use database::*;
pub use document_repo::*;
