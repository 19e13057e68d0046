//! Events - 朗读进度事件发布

mod publisher;

pub use publisher::{EventPublisher, ReaderEvent};
