//! Document Context - 文档限界上下文
//!
//! 职责:
//! - 文档指纹（缓存分区键）
//! - 页码与分页

mod aggregate;
mod value_objects;

pub use aggregate::{Document, PAGE_BREAK};
pub use value_objects::{DocumentFingerprint, PageNumber, FINGERPRINT_HEX_LEN};
