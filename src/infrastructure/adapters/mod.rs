//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod media;
pub mod ocr;
pub mod tts;

pub use media::*;
pub use ocr::*;
pub use tts::*;
