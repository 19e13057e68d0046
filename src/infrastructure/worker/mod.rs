//! Worker Layer - Background Task Processing
//!
//! 预读合成与过期缓存清理

mod cache_sweeper;
mod prefetch_worker;

pub use cache_sweeper::CacheSweeper;
pub use prefetch_worker::{PrefetchRequest, PrefetchSummary, PrefetchWorker, PrefetchWorkerConfig};
