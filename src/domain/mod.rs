//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Document Context: 文档指纹与分页
//! - Playback Context: 流式分片播放
//!
//! 以及两个纯函数组件: 文本分割器、版面文本提取器

pub mod document;
pub mod playback;

pub mod layout_extractor;
pub mod text_segmenter;

pub use layout_extractor::{extract_readable_text, LayoutConfig, TextItem};
pub use text_segmenter::{resume_from, segment_text, SegmentConfig, TextChunk};
