//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod clock;
pub mod events;
pub mod memory;
pub mod persistence;
pub mod worker;

pub use clock::{ManualClock, SystemClock};
pub use events::{EventPublisher, ReaderEvent};
pub use memory::InMemoryTtsCache;
pub use persistence::{SledTtsCache, SqliteDocumentLibrary};
pub use worker::{CacheSweeper, PrefetchRequest, PrefetchWorker, PrefetchWorkerConfig};
